// Licensed under the Apache-2.0 license

//! Persisted board configuration.

use core::mem::size_of;

use latte_error::{BootError, BootResult};
use log::{debug, warn};
use romtime::{hex_dump_lines, SeepromStorage};
use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const SEEPROM_SIZE: usize = 0x200;
pub const SEEPROM_WORDS: usize = SEEPROM_SIZE / 2;

/// Size tag a valid board config carries.
pub const BOARD_CONFIG_SIZE: u16 = 0x24;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct BoardConfig {
    pub library_version: U16,
    pub author: U16,
    pub board_type: U16,
    pub board_revision: U16,
    pub boot_source: U16,
    pub ddr3_size: U16,
    pub ddr3_speed: U16,
    pub ppc_clock_multiplier: U16,
    pub iop_clock_multiplier: U16,
    pub video_1080p: U16,
    pub ddr3_vendor: U16,
    pub mov_passive_reset: U16,
    pub sys_pll_speed: U16,
    pub sata_device: U16,
    pub console_type: U16,
    pub device_presence: U32,
    pub reserved: [u8; 2],
}

/// Board config used when the stored one is missing or has the wrong size.
pub const DEFAULT_BOARD_CONFIG: BoardConfig = BoardConfig {
    library_version: U16::new(4),
    author: U16::new(0x404d),
    board_type: U16::new(0x4346),
    board_revision: U16::new(0xb),
    boot_source: U16::new(0x4e31),
    ddr3_size: U16::new(0x800),
    ddr3_speed: U16::new(2),
    ppc_clock_multiplier: U16::new(5),
    iop_clock_multiplier: U16::new(2),
    video_1080p: U16::new(1),
    ddr3_vendor: U16::new(0x5521),
    mov_passive_reset: U16::new(0),
    sys_pll_speed: U16::new(0xf8),
    sata_device: U16::new(3),
    console_type: U16::new(1),
    device_presence: U32::new(0),
    reserved: [0; 2],
};

/// Raw SEEPROM contents. Only the board config area is interpreted.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SeepromImage {
    pub reserved0: [u8; 0x2c],
    pub bc_crc: U32,
    pub bc_size: U16,
    pub bc: BoardConfig,
    pub reserved1: [u8; 0x1aa],
}

const _: () = assert!(size_of::<BoardConfig>() == BOARD_CONFIG_SIZE as usize);
const _: () = assert!(size_of::<SeepromImage>() == SEEPROM_SIZE);

#[derive(Debug, Clone)]
pub struct Seeprom {
    pub image: SeepromImage,
    /// True if the stored board config was replaced by [`DEFAULT_BOARD_CONFIG`].
    pub defaulted: bool,
}

impl Seeprom {
    pub fn board_config(&self) -> &BoardConfig {
        &self.image.bc
    }
}

/// Reads the whole SEEPROM and repairs the board config if its size tag is wrong.
pub(crate) fn read_seeprom(storage: &mut impl SeepromStorage) -> BootResult<Seeprom> {
    let mut words = [0u16; SEEPROM_WORDS];
    storage.read_words(0, &mut words)?;

    let mut bytes = [0u8; SEEPROM_SIZE];
    for (dst, word) in bytes.chunks_exact_mut(2).zip(words.iter()) {
        dst.copy_from_slice(&word.to_be_bytes());
    }
    let mut image =
        SeepromImage::read_from_bytes(&bytes).map_err(|_| BootError::StorageIoError)?;

    let defaulted = image.bc_size.get() != BOARD_CONFIG_SIZE;
    if defaulted {
        warn!(
            "[latte-rom] board config size tag {:#x}, using defaults",
            image.bc_size.get()
        );
        image.bc = DEFAULT_BOARD_CONFIG;
        image.bc_size = BOARD_CONFIG_SIZE.into();
        for line in hex_dump_lines(image.bc.as_bytes()) {
            warn!("[latte-rom] {}", line);
        }
    } else {
        debug!(
            "[latte-rom] board type {:#06x} rev {:#x}",
            image.bc.board_type.get(),
            image.bc.board_revision.get()
        );
    }
    Ok(Seeprom { image, defaulted })
}
