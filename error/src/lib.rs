// Licensed under the Apache-2.0 license

//! Error kinds and status codes shared by the Latte boot chain.
//!
//! Every failed load maps to exactly one [`BootError`], and every
//! [`BootError`] maps to a stable 32-bit status code that the boot
//! orchestrator can pass along or print. Success is [`STATUS_OK`].

#![no_std]

use thiserror::Error;

/// Status code reported for a successful load.
pub const STATUS_OK: u32 = 0;

pub type BootResult<T> = Result<T, BootError>;

#[repr(u32)]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// Container magic did not match, or the header is malformed/truncated.
    #[error("invalid ancast image")]
    InvalidImage = 0xb000_0001,
    /// Container target does not match the entry point that was used.
    #[error("ancast image built for another target")]
    WrongTarget = 0xb000_0002,
    /// Fused key material is unusable.
    #[error("key derivation failed")]
    KeyDerivationFailure = 0xb000_0003,
    /// The AES engine did not return to idle within the poll bound.
    #[error("AES engine did not complete")]
    DecryptionEngineFault = 0xb000_0004,
    /// The decrypted body did not pass verification.
    #[error("image verification failed")]
    VerificationFailure = 0xb000_0005,
    /// The underlying file or sector read failed.
    #[error("storage read failed")]
    StorageIoError = 0xb000_0006,
    /// The image does not fit in the load region.
    #[error("image larger than the load region")]
    ImageTooLarge = 0xb000_0007,
    /// Patch file is malformed or writes outside of the image.
    #[error("invalid patch")]
    InvalidPatch = 0xb000_0008,
    /// OTP was read before the fuse store was initialized.
    #[error("fuses not loaded")]
    FusesNotLoaded = 0xb000_0009,
    /// AES source/destination are not equal-length whole blocks.
    #[error("invalid AES buffer length")]
    AesInvalidLength = 0xb000_000a,
}

impl BootError {
    pub const fn status(self) -> u32 {
        self as u32
    }
}

impl From<BootError> for u32 {
    fn from(err: BootError) -> u32 {
        err.status()
    }
}

/// Collapse a load result into the status code returned to the orchestrator.
pub fn status_of<T>(result: &BootResult<T>) -> u32 {
    match result {
        Ok(_) => STATUS_OK,
        Err(err) => err.status(),
    }
}

/// Errors reported by storage collaborators.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("no such file")]
    NotFound,
    #[error("read past end of medium")]
    OutOfRange,
    #[error("device error")]
    Device,
}

impl From<StorageError> for BootError {
    fn from(_: StorageError) -> Self {
        BootError::StorageIoError
    }
}
