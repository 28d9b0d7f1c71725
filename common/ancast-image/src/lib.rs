// Licensed under the Apache-2.0 license
#![cfg_attr(not(test), no_std)]

//! Wire layout of Ancast boot-image containers and boot patch files.
//!
//! All multi-byte fields are big-endian. A container is a fixed prefix, a
//! signature block whose size depends on the signature type, an info header
//! describing the body, and the encrypted body itself.

use core::mem::size_of;

use latte_error::BootError;
use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

mod patch;
pub use patch::*;

pub const ANCAST_MAGIC: u32 = 0xefa2_82d9;
pub const SIGNATURE_OFFSET: u32 = 0x20;
pub const SHA1_DIGEST_SIZE: usize = 20;

/// Largest header across both layouts; the body never starts later than this.
pub const MAX_HEADER_SIZE: usize = 0x200;

/// Marker left at the start of the scratch region for the next boot stage.
pub const PASSALONG_MAGIC_BOOT1: [u8; 8] = *b"MINTBT01";

/// Processor a container is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Target {
    Ppc = 0x01,
    Iop = 0x02,
}

impl Target {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Target::Ppc),
            0x02 => Some(Target::Iop),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum SignatureType {
    /// ECDSA signature, used for PPC images.
    Ecdsa = 1,
    /// RSA-2048 signature, used for IOP images.
    Rsa2048 = 2,
}

impl SignatureType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(SignatureType::Ecdsa),
            2 => Some(SignatureType::Rsa2048),
            _ => None,
        }
    }

    pub const fn signature_len(self) -> usize {
        match self {
            SignatureType::Ecdsa => 0x38,
            SignatureType::Rsa2048 => 0x100,
        }
    }

    /// Byte offset of the info header within the container.
    pub const fn info_offset(self) -> usize {
        match self {
            SignatureType::Ecdsa => 0xa0,
            SignatureType::Rsa2048 => 0x1a0,
        }
    }

    /// Byte offset of the body within the container.
    pub const fn body_offset(self) -> usize {
        self.info_offset() + size_of::<AncastInfo>()
    }

    /// Signature layout conventionally used for `target`.
    pub const fn for_target(target: Target) -> Self {
        match target {
            Target::Ppc => SignatureType::Ecdsa,
            Target::Iop => SignatureType::Rsa2048,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ConsoleType {
    Debug = 1,
    Retail = 2,
}

/// Fixed start of every container, up to and including the signature type.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct AncastPrefix {
    pub magic: U32,
    pub reserved0: U32,
    pub signature_offset: U32,
    pub reserved1: U32,
    pub reserved2: [u8; 16],
    pub signature_type: U32,
}

/// Describes the body that follows it.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct AncastInfo {
    pub reserved0: U16,
    pub reserved1: u8,
    pub reserved2: u8,
    /// Target code in bits 4..8, variant in bits 0..4.
    pub device: U32,
    pub console_type: U32,
    pub body_size: U32,
    pub body_hash: [u8; SHA1_DIGEST_SIZE],
    pub version: U32,
    pub padding: [u8; 0x38],
}

impl AncastInfo {
    pub fn target_code(&self) -> u8 {
        ((self.device.get() >> 4) & 0xf) as u8
    }

    pub fn target(&self) -> Option<Target> {
        Target::from_code(self.target_code())
    }
}

/// A parsed and structurally checked container header.
#[derive(Debug, Clone, Copy)]
pub struct AncastHeader {
    pub signature_type: SignatureType,
    pub info: AncastInfo,
}

impl AncastHeader {
    /// Parses the header at the start of `image`.
    ///
    /// Only structure is checked here: magic, signature type and that the header
    /// bytes are present. Target policy is up to the caller.
    pub fn parse(image: &[u8]) -> Result<Self, BootError> {
        let (prefix, _) =
            AncastPrefix::ref_from_prefix(image).map_err(|_| BootError::InvalidImage)?;
        if prefix.magic.get() != ANCAST_MAGIC {
            return Err(BootError::InvalidImage);
        }
        if prefix.signature_offset.get() != SIGNATURE_OFFSET {
            return Err(BootError::InvalidImage);
        }
        let signature_type = SignatureType::from_u32(prefix.signature_type.get())
            .ok_or(BootError::InvalidImage)?;
        let info_bytes = image
            .get(signature_type.info_offset()..signature_type.body_offset())
            .ok_or(BootError::InvalidImage)?;
        let info = AncastInfo::read_from_bytes(info_bytes).map_err(|_| BootError::InvalidImage)?;
        Ok(Self {
            signature_type,
            info,
        })
    }

    pub fn body_offset(&self) -> usize {
        self.signature_type.body_offset()
    }

    pub fn body_size(&self) -> usize {
        self.info.body_size.get() as usize
    }

    /// Total container size: header plus body. Fails if it does not fit the
    /// 32-bit address space.
    pub fn image_size(&self) -> Result<usize, BootError> {
        u32::try_from(self.body_offset())
            .ok()
            .and_then(|offset| offset.checked_add(self.info.body_size.get()))
            .map(|size| size as usize)
            .ok_or(BootError::InvalidImage)
    }
}

/// Returns true if `image` starts with the container magic.
pub fn has_ancast_magic(image: &[u8]) -> bool {
    image
        .get(..4)
        .map(|m| u32::from_be_bytes([m[0], m[1], m[2], m[3]]) == ANCAST_MAGIC)
        .unwrap_or(false)
}
