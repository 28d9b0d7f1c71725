// Licensed under the Apache-2.0 license

#![cfg_attr(target_os = "none", no_std)]

mod boot;
pub use boot::*;

/// Configures the register map of the Latte SoC as seen from the IOP.
/// These are the defaults that can be overridden for emulated or test platforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatteMemoryMap {
    pub aes_ctrl: u32,
    pub aes_src: u32,
    pub aes_dest: u32,
    pub aes_key: u32,
    pub aes_iv: u32,
    pub otp_cmd: u32,
    pub otp_data: u32,
    /// Size of the general-purpose scratch region used for patches and the
    /// passalong marker.
    pub scratch_size: u32,
}

impl Default for LatteMemoryMap {
    fn default() -> Self {
        LatteMemoryMap {
            aes_ctrl: 0x0d02_0000,
            aes_src: 0x0d02_0004,
            aes_dest: 0x0d02_0008,
            aes_key: 0x0d02_000c,
            aes_iv: 0x0d02_0010,
            otp_cmd: 0x0d80_01ec,
            otp_data: 0x0d80_01f0,
            scratch_size: 0x0010_0000,
        }
    }
}
