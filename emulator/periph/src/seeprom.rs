/*++

Licensed under the Apache-2.0 license.

File Name:

    seeprom.rs

Abstract:

    Serial EEPROM holding the persisted board configuration.

--*/

use latte_error::StorageError;
use romtime::SeepromStorage;
use std::path::Path;

pub const SEEPROM_SIZE: usize = 0x200;

pub struct Seeprom {
    words: Vec<u16>,
    fail: bool,
}

impl Seeprom {
    pub fn new(bytes: [u8; SEEPROM_SIZE]) -> Self {
        Self {
            words: bytes
                .chunks_exact(2)
                .map(|w| u16::from_be_bytes([w[0], w[1]]))
                .collect(),
            fail: false,
        }
    }

    /// Loads a raw SEEPROM dump. Shorter dumps are zero-filled.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let raw = std::fs::read(path)?;
        if raw.len() > SEEPROM_SIZE {
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "SEEPROM dump is too large",
            ))?;
        }
        let mut bytes = [0u8; SEEPROM_SIZE];
        bytes[..raw.len()].copy_from_slice(&raw);
        Ok(Self::new(bytes))
    }

    /// Makes every subsequent read fail with a device error.
    pub fn fail_reads(&mut self, fail: bool) {
        self.fail = fail;
    }
}

impl SeepromStorage for Seeprom {
    fn read_words(&mut self, offset: usize, buf: &mut [u16]) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Device);
        }
        let end = offset
            .checked_add(buf.len())
            .ok_or(StorageError::OutOfRange)?;
        let words = self
            .words
            .get(offset..end)
            .ok_or(StorageError::OutOfRange)?;
        buf.copy_from_slice(words);
        Ok(())
    }
}
