/*++

Licensed under the Apache-2.0 license.

File Name:

    otp.rs

Abstract:

    Latte OTP fuse array emulated device. Eight banks of 32 words, read one
    word at a time through a command/data register pair.

--*/

use romtime::regs::OtpCmd;
use std::path::Path;
use tock_registers::LocalRegisterCopy;

pub const OTP_SIZE: usize = 1024;
const WORDS_PER_BANK: usize = 0x20;

pub struct Otp {
    fuses: [u8; OTP_SIZE],
    cmd: LocalRegisterCopy<u32, OtpCmd::Register>,
    reads: usize,
}

impl Otp {
    pub fn new(fuses: [u8; OTP_SIZE]) -> Self {
        Self {
            fuses,
            cmd: LocalRegisterCopy::new(0),
            reads: 0,
        }
    }

    /// Loads a raw OTP dump. Shorter dumps are zero-filled.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let raw = std::fs::read(path)?;
        if raw.len() > OTP_SIZE {
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "OTP dump is too large",
            ))?;
        }
        let mut fuses = [0u8; OTP_SIZE];
        fuses[..raw.len()].copy_from_slice(&raw);
        Ok(Self::new(fuses))
    }

    /// Replaces the fuse contents, as if the device had been reprogrammed.
    pub fn program(&mut self, fuses: [u8; OTP_SIZE]) {
        self.fuses = fuses;
    }

    pub fn fuses(&self) -> &[u8; OTP_SIZE] {
        &self.fuses
    }

    /// Number of data register reads that returned a fuse word.
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn write_cmd(&mut self, value: u32) {
        self.cmd.set(value);
    }

    pub fn read_data(&mut self) -> u32 {
        if !self.cmd.is_set(OtpCmd::RD) {
            return 0;
        }
        let bank = self.cmd.read(OtpCmd::BANK) as usize;
        let word = self.cmd.read(OtpCmd::WORD) as usize;
        let offset = (bank * WORDS_PER_BANK + word) * 4;
        self.reads += 1;
        let b = &self.fuses[offset..offset + 4];
        u32::from_be_bytes([b[0], b[1], b[2], b[3]])
    }
}
