// Licensed under the Apache-2.0 license

use crate::seeprom::{self, Seeprom};
use latte_config::LatteMemoryMap;
use latte_error::{BootError, BootResult};
use log::{debug, info, warn};
use romtime::regs::OtpCmd;
use romtime::{hex_dump_lines, HexWord, Mmio, SeepromStorage};

pub const OTP_BANKS: usize = 8;
pub const OTP_WORDS_PER_BANK: usize = 0x20;
pub const OTP_SIZE: usize = OTP_BANKS * OTP_WORDS_PER_BANK * 4;

/// Wii U ancast key used by the IOP boot stages.
pub const OTP_STARBUCK_ANCAST_KEY_OFFSET: usize = 0x90;
pub const OTP_SEEPROM_KEY_OFFSET: usize = 0xa0;
/// JTAG status word; zero means debug access is enabled.
pub const OTP_JTAG_STATUS_OFFSET: usize = 0x3e0;

/// Starting value of the backward zero-run scan.
pub const OTP_SCAN_BOUND: usize = 0x3ff;
/// A device with this many bytes of OTP or fewer is treated as de-fused.
pub const DEFUSED_MAX_BYTES_LOADED: usize = 0x90;

/// Contents of the eight OTP banks, in bank-major order.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpImage([u8; OTP_SIZE]);

impl OtpImage {
    pub const fn new(bytes: [u8; OTP_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; OTP_SIZE] {
        &self.0
    }

    pub fn word(&self, offset: usize) -> Option<u32> {
        let bytes = self.0.get(offset..offset + 4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn jtag_status(&self) -> u32 {
        self.word(OTP_JTAG_STATUS_OFFSET).unwrap_or_default()
    }

    /// 16 bytes of key material starting at `offset`.
    pub fn key(&self, offset: usize) -> Option<[u8; 16]> {
        let bytes = self.0.get(offset..offset + 16)?;
        let mut key = [0u8; 16];
        key.copy_from_slice(bytes);
        Some(key)
    }
}

impl core::fmt::Debug for OtpImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // never print key material through Debug
        f.debug_struct("OtpImage").finish_non_exhaustive()
    }
}

/// Result of the de-fuse scan. Computed once per boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrustLevel {
    pub defused: bool,
    /// Approximate number of programmed OTP bytes.
    pub bytes_loaded: usize,
    /// Diagnostic only; does not feed into `defused`.
    pub jtag_enabled: bool,
}

/// Runs the de-fuse scan over `otp`.
///
/// Walks backward from the second-to-last byte while bytes are zero, counting
/// down from [`OTP_SCAN_BOUND`]. With the last K bytes zero and the rest
/// programmed, `bytes_loaded` ends up as `min(1024 - K, 0x3ff)`.
pub fn scan_otp(otp: &OtpImage) -> TrustLevel {
    let bytes = otp.as_bytes();
    let mut bytes_loaded = OTP_SCAN_BOUND;
    let mut idx = OTP_SIZE - 2;
    while bytes[idx] == 0 {
        bytes_loaded -= 1;
        if bytes_loaded == 0 {
            break;
        }
        idx -= 1;
    }
    TrustLevel {
        defused: bytes_loaded <= DEFUSED_MAX_BYTES_LOADED,
        bytes_loaded,
        jtag_enabled: otp.jtag_status() == 0,
    }
}

/// Immutable fused data and persisted board configuration.
#[derive(Default)]
pub struct FuseStore {
    otp: Option<OtpImage>,
    seeprom: Option<Seeprom>,
    trust: Option<TrustLevel>,
}

impl FuseStore {
    pub const fn new() -> Self {
        Self {
            otp: None,
            seeprom: None,
            trust: None,
        }
    }

    /// Uses an OTP image obtained some other way, e.g. a dump for an emulated device.
    pub fn from_image(otp: OtpImage) -> Self {
        Self {
            otp: Some(otp),
            ..Self::new()
        }
    }

    /// Reads all OTP banks through the command/data register pair.
    ///
    /// Every call goes back to the hardware; boot code calls this once.
    pub fn init(&mut self, mmio: &mut impl Mmio, map: &LatteMemoryMap) {
        let mut bytes = [0u8; OTP_SIZE];
        let mut words = bytes.chunks_exact_mut(4);
        for bank in 0..OTP_BANKS {
            for word in 0..OTP_WORDS_PER_BANK {
                let cmd = OtpCmd::RD::SET
                    + OtpCmd::BANK.val(bank as u32)
                    + OtpCmd::WORD.val(word as u32);
                mmio.write32(map.otp_cmd, cmd.value);
                let data = mmio.read32(map.otp_data);
                if let Some(dst) = words.next() {
                    dst.copy_from_slice(&data.to_be_bytes());
                }
            }
        }
        debug!("[latte-rom] read {} bytes of OTP", OTP_SIZE);
        self.otp = Some(OtpImage::new(bytes));
    }

    pub fn otp(&self) -> BootResult<&OtpImage> {
        self.otp.as_ref().ok_or(BootError::FusesNotLoaded)
    }

    /// Reads the persisted board configuration, substituting the default board
    /// config if the stored one has the wrong size.
    pub fn read_config(&mut self, storage: &mut impl SeepromStorage) -> BootResult<&Seeprom> {
        let seeprom = seeprom::read_seeprom(storage)?;
        Ok(self.seeprom.insert(seeprom))
    }

    pub fn seeprom(&self) -> Option<&Seeprom> {
        self.seeprom.as_ref()
    }

    /// De-fuse determination, computed on first use and cached afterwards.
    pub fn trust_level(&mut self) -> BootResult<TrustLevel> {
        if let Some(trust) = self.trust {
            return Ok(trust);
        }
        let otp = self.otp()?;
        let trust = scan_otp(otp);
        info!(
            "[latte-rom] ~0x{:03x} bytes of OTP loaded; JTAG is {} ({})",
            trust.bytes_loaded,
            if trust.jtag_enabled {
                "enabled"
            } else {
                "disabled"
            },
            HexWord(otp.jtag_status())
        );
        for line in hex_dump_lines(&otp.as_bytes()[..trust.bytes_loaded]) {
            debug!("[latte-rom] {}", line);
        }
        if trust.defused {
            warn!(
                "[latte-rom] OTP mostly unprogrammed (0x{:03x} bytes); device is de-fused",
                trust.bytes_loaded
            );
        }
        self.trust = Some(trust);
        Ok(trust)
    }

    /// 16 bytes of fused key material at `offset`.
    pub fn key_material(&self, offset: usize) -> BootResult<[u8; 16]> {
        self.otp()?
            .key(offset)
            .ok_or(BootError::KeyDerivationFailure)
    }
}
