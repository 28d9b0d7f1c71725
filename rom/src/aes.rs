// Licensed under the Apache-2.0 license

//! Driver for the Latte AES-128-CBC DMA engine.
//!
//! The engine reads its source and writes its destination by DMA, so every
//! operation is bracketed by cache maintenance and bus barriers. Encrypt and
//! decrypt run in chunks of at most [`MAX_CRYPT_BLOCKS`] blocks, chaining the
//! IV between chunks. Copies bypass the cipher.

use latte_config::{EngineConfig, LatteMemoryMap};
use latte_error::{BootError, BootResult};
use log::{debug, error, trace};
use romtime::regs::AesCtrl;
use romtime::{poll_until, AhbSource, AhbTarget, Platform};
use tock_registers::fields::FieldValue;
use tock_registers::LocalRegisterCopy;

pub const AES_BLOCK_SIZE: usize = 16;
/// Chunk limit for encrypt and decrypt commands.
pub const MAX_CRYPT_BLOCKS: usize = 0x80;
/// Chunk limit for copy commands, bounded by the 12-bit count field.
pub const MAX_COPY_BLOCKS: usize = 0xfff;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Encrypt,
    Decrypt,
    Copy,
}

impl Op {
    fn command(self) -> FieldValue<u32, AesCtrl::Register> {
        match self {
            Op::Encrypt => AesCtrl::EXEC::SET + AesCtrl::ENA::SET,
            Op::Decrypt => AesCtrl::EXEC::SET + AesCtrl::ENA::SET + AesCtrl::DEC::SET,
            Op::Copy => AesCtrl::EXEC::SET,
        }
    }

    fn max_blocks(self) -> usize {
        match self {
            Op::Copy => MAX_COPY_BLOCKS,
            _ => MAX_CRYPT_BLOCKS,
        }
    }
}

/// Control word for one chunk of `blocks` blocks.
fn control_word(op: Op, keep_iv: bool, blocks: usize) -> u32 {
    let iv = if keep_iv {
        AesCtrl::IV::SET
    } else {
        AesCtrl::IV::CLEAR
    };
    (op.command() + iv + AesCtrl::BLOCKS.val(blocks.saturating_sub(1) as u32)).value
}

/// Exclusive handle on the AES engine for the duration of a borrow.
pub struct Aes<'a, P: Platform> {
    platform: &'a mut P,
    map: &'a LatteMemoryMap,
    config: EngineConfig,
}

impl<'a, P: Platform> Aes<'a, P> {
    pub fn new(platform: &'a mut P, map: &'a LatteMemoryMap, config: EngineConfig) -> Self {
        Self {
            platform,
            map,
            config,
        }
    }

    /// Clears the control register and waits for the engine to go idle.
    pub fn reset(&mut self) -> BootResult<()> {
        self.platform.write32(self.map.aes_ctrl, 0);
        let ctrl = self.map.aes_ctrl;
        let platform = &mut *self.platform;
        if !poll_until(self.config.poll_limit, || platform.read32(ctrl) == 0) {
            error!("[latte-rom] AES engine did not reset");
            return Err(BootError::DecryptionEngineFault);
        }
        Ok(())
    }

    pub fn set_key(&mut self, key: &[u8; 16]) {
        self.write_fifo(self.map.aes_key, key);
    }

    pub fn set_iv(&mut self, iv: &[u8; 16]) {
        self.write_fifo(self.map.aes_iv, iv);
    }

    pub fn clear_iv(&mut self) {
        self.write_fifo(self.map.aes_iv, &[0u8; 16]);
    }

    fn write_fifo(&mut self, addr: u32, bytes: &[u8; 16]) {
        for word in bytes.chunks_exact(4) {
            self.platform
                .write32(addr, u32::from_be_bytes([word[0], word[1], word[2], word[3]]));
        }
    }

    pub fn encrypt(&mut self, src: &[u8], dst: &mut [u8], keep_iv: bool) -> BootResult<()> {
        check_lengths(src.len(), dst.len())?;
        self.run(Op::Encrypt, src.as_ptr(), dst.as_mut_ptr(), src.len(), keep_iv)
    }

    pub fn decrypt(&mut self, src: &[u8], dst: &mut [u8], keep_iv: bool) -> BootResult<()> {
        check_lengths(src.len(), dst.len())?;
        self.run(Op::Decrypt, src.as_ptr(), dst.as_mut_ptr(), src.len(), keep_iv)
    }

    /// DMA copy through the engine without touching the cipher state.
    pub fn copy(&mut self, src: &[u8], dst: &mut [u8]) -> BootResult<()> {
        check_lengths(src.len(), dst.len())?;
        self.run(Op::Copy, src.as_ptr(), dst.as_mut_ptr(), src.len(), false)
    }

    pub fn encrypt_in_place(&mut self, buf: &mut [u8], keep_iv: bool) -> BootResult<()> {
        check_lengths(buf.len(), buf.len())?;
        let ptr = buf.as_mut_ptr();
        self.run(Op::Encrypt, ptr, ptr, buf.len(), keep_iv)
    }

    pub fn decrypt_in_place(&mut self, buf: &mut [u8], keep_iv: bool) -> BootResult<()> {
        check_lengths(buf.len(), buf.len())?;
        let ptr = buf.as_mut_ptr();
        self.run(Op::Decrypt, ptr, ptr, buf.len(), keep_iv)
    }

    fn run(
        &mut self,
        op: Op,
        src: *const u8,
        dst: *mut u8,
        len: usize,
        mut keep_iv: bool,
    ) -> BootResult<()> {
        let mut blocks = len / AES_BLOCK_SIZE;
        debug!("[latte-rom] AES {:?} of {} blocks", op, blocks);

        self.platform.flush_range(src, len);
        self.platform.invalidate_range(dst, len);
        self.platform.ahb_flush_to(AhbTarget::Aes);

        let mut offset = 0;
        let mut result = Ok(());
        while blocks > 0 {
            let count = blocks.min(op.max_blocks());
            let src_addr = self.platform.dma_addr(src.wrapping_add(offset));
            let dst_addr = self.platform.dma_addr(dst.wrapping_add(offset));
            self.platform.write32(self.map.aes_src, src_addr);
            self.platform.write32(self.map.aes_dest, dst_addr);
            result = self.command(control_word(op, keep_iv, count));
            if result.is_err() {
                break;
            }

            blocks -= count;
            offset += count * AES_BLOCK_SIZE;
            if op != Op::Copy {
                keep_iv = true;
            }
        }

        // Barriers close the operation even when the engine faulted.
        self.platform.ahb_flush_from(AhbSource::Aes);
        self.platform.ahb_flush_to(AhbTarget::Iod);
        result
    }

    fn command(&mut self, word: u32) -> BootResult<()> {
        trace!("[latte-rom] AES_CTRL <- {:#010x}", word);
        self.platform.write32(self.map.aes_ctrl, word);
        let ctrl = self.map.aes_ctrl;
        let platform = &mut *self.platform;
        let done = poll_until(self.config.poll_limit, || {
            !LocalRegisterCopy::<u32, AesCtrl::Register>::new(platform.read32(ctrl))
                .is_set(AesCtrl::EXEC)
        });
        if !done {
            error!(
                "[latte-rom] AES engine still busy after {} polls",
                self.config.poll_limit
            );
            return Err(BootError::DecryptionEngineFault);
        }
        Ok(())
    }
}

fn check_lengths(src: usize, dst: usize) -> BootResult<()> {
    if src != dst || src == 0 || src % AES_BLOCK_SIZE != 0 {
        return Err(BootError::AesInvalidLength);
    }
    Ok(())
}
