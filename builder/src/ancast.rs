// Licensed under the Apache-2.0 license

use aes::Aes128;
use ancast_image::{
    AncastInfo, AncastPrefix, ConsoleType, SignatureType, Target, ANCAST_MAGIC, SIGNATURE_OFFSET,
};
use anyhow::{bail, Result};
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zerocopy::{FromZeros, IntoBytes};

const BLOCK_SIZE: usize = 16;

/// Builds encrypted Ancast containers.
#[derive(Clone)]
pub struct AncastImageBuilder {
    target: Target,
    signature_type: SignatureType,
    variant: u8,
    console_type: ConsoleType,
    version: u32,
    key: [u8; 16],
    iv: [u8; 16],
    pad: bool,
}

impl AncastImageBuilder {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            signature_type: SignatureType::for_target(target),
            variant: 1,
            console_type: ConsoleType::Retail,
            version: 0,
            key: [0u8; 16],
            iv: [0u8; 16],
            pad: false,
        }
    }

    pub fn key(mut self, key: [u8; 16]) -> Self {
        self.key = key;
        self
    }

    pub fn iv(mut self, iv: [u8; 16]) -> Self {
        self.iv = iv;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn signature_type(mut self, signature_type: SignatureType) -> Self {
        self.signature_type = signature_type;
        self
    }

    pub fn console_type(mut self, console_type: ConsoleType) -> Self {
        self.console_type = console_type;
        self
    }

    /// Low nibble of the device field.
    pub fn variant(mut self, variant: u8) -> Self {
        self.variant = variant & 0xf;
        self
    }

    /// Zero-pad bodies that are not a whole number of blocks.
    pub fn pad(mut self, pad: bool) -> Self {
        self.pad = pad;
        self
    }

    pub fn build(&self, body: &[u8]) -> Result<Vec<u8>> {
        let mut plain = body.to_vec();
        if plain.is_empty() {
            bail!("ancast body is empty");
        }
        if plain.len() % BLOCK_SIZE != 0 {
            if !self.pad {
                bail!(
                    "ancast body of {} bytes is not a multiple of {}",
                    plain.len(),
                    BLOCK_SIZE
                );
            }
            plain.resize(plain.len().next_multiple_of(BLOCK_SIZE), 0);
        }
        let Ok(body_size) = u32::try_from(plain.len()) else {
            bail!("ancast body of {} bytes is too large", plain.len());
        };

        let sig = self.signature_type;
        let mut image = vec![0u8; sig.body_offset()];

        let mut prefix = AncastPrefix::new_zeroed();
        prefix.magic = ANCAST_MAGIC.into();
        prefix.signature_offset = SIGNATURE_OFFSET.into();
        prefix.signature_type = (sig as u32).into();
        image[..prefix.as_bytes().len()].copy_from_slice(prefix.as_bytes());

        let mut info = AncastInfo::new_zeroed();
        info.device = (((self.target as u32) << 4) | self.variant as u32).into();
        info.console_type = (self.console_type as u32).into();
        info.body_size = body_size.into();
        info.body_hash.copy_from_slice(&Sha1::digest(&plain));
        info.version = self.version.into();
        image[sig.info_offset()..sig.body_offset()].copy_from_slice(info.as_bytes());

        let mut enc = cbc::Encryptor::<Aes128>::new(&self.key.into(), &self.iv.into());
        for block in plain.chunks_exact_mut(BLOCK_SIZE) {
            enc.encrypt_block_mut(block.into());
        }
        image.extend_from_slice(&plain);
        Ok(image)
    }

    pub fn write_to_file(&self, body: &[u8], path: &Path) -> Result<()> {
        let image = self.build(body)?;
        let mut file = File::create(path)?;
        file.write_all(&image)?;
        Ok(())
    }
}
