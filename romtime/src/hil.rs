// Licensed under the Apache-2.0 license

//! Narrow interfaces to the hardware and storage collaborators of the boot chain.
//!
//! Drivers in the ROM only ever touch the platform through these traits, so the
//! same code runs against real registers or against the emulated peripherals.

use latte_error::StorageError;

/// 32-bit register access at fixed platform addresses.
pub trait Mmio {
    fn read32(&mut self, addr: u32) -> u32;
    fn write32(&mut self, addr: u32, value: u32);
}

/// Bus agents that can be the target of an AHB flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AhbTarget {
    /// Read buffer in front of the AES engine.
    Aes,
    /// Downstream I/O domain.
    Iod,
}

/// Write-back domains that can be drained with an AHB flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AhbSource {
    /// Write buffer behind the AES engine.
    Aes,
}

/// Cache and bus maintenance needed before and after a DMA master touches memory.
pub trait Coherency {
    /// Write back any dirty cache lines covering `len` bytes at `addr`.
    fn flush_range(&mut self, addr: *const u8, len: usize);

    /// Drop cached copies of `len` bytes at `addr`.
    fn invalidate_range(&mut self, addr: *const u8, len: usize);

    /// Make sure pending writes are visible to `target`.
    fn ahb_flush_to(&mut self, target: AhbTarget);

    /// Make sure writes issued by `source` have reached memory.
    fn ahb_flush_from(&mut self, source: AhbSource);

    /// Bus address a DMA master must use to reach `addr`.
    fn dma_addr(&self, addr: *const u8) -> u32;
}

/// Everything a driver needs from the platform.
pub trait Platform: Mmio + Coherency {}

impl<T: Mmio + Coherency> Platform for T {}

/// Persisted configuration storage, addressed in 16-bit words.
pub trait SeepromStorage {
    /// Read `buf.len()` words starting at word `offset`.
    fn read_words(&mut self, offset: usize, buf: &mut [u16]) -> Result<(), StorageError>;
}

/// Size of a raw storage sector in bytes.
pub const SECTOR_SIZE: usize = 0x200;

/// Sources an Ancast container can be read from.
pub trait ImageStorage {
    /// Size of the file at `path` in bytes.
    fn file_size(&mut self, path: &str) -> Result<usize, StorageError>;

    /// Fill `buf` from the file at `path`, starting at byte `offset`.
    fn read_file(&mut self, path: &str, offset: usize, buf: &mut [u8])
        -> Result<(), StorageError>;

    /// Fill `buf` from the raw medium starting at `sector`. `buf.len()` must be a
    /// multiple of [`SECTOR_SIZE`].
    fn read_sectors(&mut self, sector: u32, buf: &mut [u8]) -> Result<(), StorageError>;
}
