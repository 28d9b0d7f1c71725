/*++

Licensed under the Apache-2.0 license.

File Name:

    aes.rs

Abstract:

    Latte AES-128-CBC DMA engine emulated device.

--*/

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use romtime::regs::AesCtrl;
use tock_registers::LocalRegisterCopy;

const BLOCK_SIZE: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AesOp {
    Encrypt,
    Decrypt,
    Copy,
}

/// A command latched by a write to CTRL with EXEC set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AesCommand {
    pub op: AesOp,
    pub keep_iv: bool,
    pub blocks: usize,
    pub src: u32,
    pub dest: u32,
}

impl AesCommand {
    pub fn byte_len(&self) -> usize {
        self.blocks * BLOCK_SIZE
    }
}

#[derive(Default)]
pub struct AesEngine {
    ctrl: u32,
    src: u32,
    dest: u32,
    key: [u8; 16],
    iv: [u8; 16],
    /// Chaining value left by the last encrypt or decrypt.
    chain: [u8; 16],
    latency: u32,
    busy_reads: u32,
    stuck: bool,
    commands: Vec<u32>,
    resets: usize,
}

impl AesEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of CTRL reads that still report busy after each command.
    pub fn set_latency(&mut self, reads: u32) {
        self.latency = reads;
    }

    /// A stuck engine never clears EXEC, not even after a reset.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    /// Every control word written with EXEC set, in order.
    pub fn commands(&self) -> &[u32] {
        &self.commands
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn write_src(&mut self, value: u32) {
        self.src = value;
    }

    pub fn write_dest(&mut self, value: u32) {
        self.dest = value;
    }

    pub fn src(&self) -> u32 {
        self.src
    }

    pub fn dest(&self) -> u32 {
        self.dest
    }

    /// KEY is a FIFO; four writes replace the whole key.
    pub fn write_key(&mut self, value: u32) {
        shift_in(&mut self.key, value);
    }

    pub fn write_iv(&mut self, value: u32) {
        shift_in(&mut self.iv, value);
    }

    /// Returns the command to run if `value` starts one.
    pub fn write_ctrl(&mut self, value: u32) -> Option<AesCommand> {
        self.ctrl = value;
        let ctrl = LocalRegisterCopy::<u32, AesCtrl::Register>::new(value);
        if !ctrl.is_set(AesCtrl::EXEC) {
            if value == 0 {
                self.resets += 1;
                self.busy_reads = 0;
            }
            return None;
        }
        self.commands.push(value);
        self.busy_reads = self.latency;
        let op = if !ctrl.is_set(AesCtrl::ENA) {
            AesOp::Copy
        } else if ctrl.is_set(AesCtrl::DEC) {
            AesOp::Decrypt
        } else {
            AesOp::Encrypt
        };
        Some(AesCommand {
            op,
            keep_iv: ctrl.is_set(AesCtrl::IV),
            blocks: ctrl.read(AesCtrl::BLOCKS) as usize + 1,
            src: self.src,
            dest: self.dest,
        })
    }

    pub fn read_ctrl(&mut self) -> u32 {
        let exec = AesCtrl::EXEC::SET.value;
        if self.stuck {
            return self.ctrl | exec;
        }
        if self.busy_reads > 0 {
            self.busy_reads -= 1;
            return self.ctrl;
        }
        self.ctrl &= !exec;
        self.ctrl
    }

    /// Leaves the current command running forever, e.g. after a DMA fault.
    pub fn wedge(&mut self) {
        self.stuck = true;
    }

    /// Runs `cmd` over `data`, which holds the source blocks on entry and the
    /// destination blocks on return.
    pub fn process(&mut self, cmd: &AesCommand, data: &mut [u8]) {
        let iv = if cmd.keep_iv { self.chain } else { self.iv };
        match cmd.op {
            AesOp::Copy => {}
            AesOp::Encrypt => {
                let mut enc = cbc::Encryptor::<Aes128>::new(&self.key.into(), &iv.into());
                for block in data.chunks_exact_mut(BLOCK_SIZE) {
                    enc.encrypt_block_mut(block.into());
                }
                if let Some(last) = data.chunks_exact(BLOCK_SIZE).last() {
                    self.chain.copy_from_slice(last);
                }
            }
            AesOp::Decrypt => {
                let mut next = iv;
                if let Some(last) = data.chunks_exact(BLOCK_SIZE).last() {
                    next.copy_from_slice(last);
                }
                let mut dec = cbc::Decryptor::<Aes128>::new(&self.key.into(), &iv.into());
                for block in data.chunks_exact_mut(BLOCK_SIZE) {
                    dec.decrypt_block_mut(block.into());
                }
                self.chain = next;
            }
        }
    }
}

fn shift_in(fifo: &mut [u8; 16], value: u32) {
    fifo.copy_within(4.., 0);
    fifo[12..].copy_from_slice(&value.to_be_bytes());
}
