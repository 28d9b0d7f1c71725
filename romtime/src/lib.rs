// Licensed under the Apache-2.0 license

#![cfg_attr(target_os = "none", no_std)]

mod hil;
pub use hil::*;
mod poll;
pub use poll::*;
pub mod regs;

use core::fmt::{Display, Write};

pub struct HexBytes<'a>(pub &'a [u8]);
impl Display for HexBytes<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Rust can't prove the indexes are correct in a format macro.
        for &x in self.0.iter() {
            let c = x >> 4;
            if c < 10 {
                f.write_char((c + b'0') as char)?;
            } else {
                f.write_char((c - 10 + b'A') as char)?;
            }
            let c = x & 0xf;
            if c < 10 {
                f.write_char((c + b'0') as char)?;
            } else {
                f.write_char((c - 10 + b'A') as char)?;
            }
        }
        Ok(())
    }
}

pub struct HexWord(pub u32);
impl Display for HexWord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        HexBytes(&self.0.to_be_bytes()).fmt(f)
    }
}

/// Renders one line of a hex dump: up to 16 bytes, lowercase, space separated.
pub struct HexLine<'a>(pub &'a [u8]);
impl Display for HexLine<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_char(' ')?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Bytes per line in diagnostic dumps.
pub const HEX_DUMP_WIDTH: usize = 16;

/// Splits `data` into dump lines of [`HEX_DUMP_WIDTH`] bytes.
pub fn hex_dump_lines(data: &[u8]) -> impl Iterator<Item = HexLine<'_>> {
    data.chunks(HEX_DUMP_WIDTH).map(HexLine)
}
