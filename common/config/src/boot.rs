// Licensed under the Apache-2.0 license

/// Number of CTRL reads before the AES engine is declared unresponsive.
///
/// A 128-block chunk completes in well under a thousand reads on hardware; the bound
/// only exists so a wedged engine turns into an error instead of a hang.
pub const DEFAULT_AES_POLL_LIMIT: u32 = 0x0100_0000;

/// AES engine driver settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub poll_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_limit: DEFAULT_AES_POLL_LIMIT,
        }
    }
}

/// Where in OTP the key and IV for one image target live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeySlot {
    pub key_offset: usize,
    pub iv_offset: usize,
}

/// Ancast loader settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    pub iop_slot: KeySlot,
    pub ppc_slot: KeySlot,
    /// Key used when the device is de-fused and the OTP slots cannot be trusted.
    pub defused_key: [u8; 16],
    /// IV used when the device is de-fused.
    pub defused_iv: [u8; 16],
    /// Largest container (header plus body) the loader accepts.
    pub max_image_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            iop_slot: KeySlot {
                key_offset: 0x90,
                iv_offset: 0xb0,
            },
            ppc_slot: KeySlot {
                key_offset: 0xc0,
                iv_offset: 0xf0,
            },
            defused_key: [0u8; 16],
            defused_iv: [0u8; 16],
            max_image_size: 0x0100_0000,
        }
    }
}
