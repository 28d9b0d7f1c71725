/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Boot-time drivers and the Ancast loader for the Latte IOP.

--*/

#![cfg_attr(not(test), no_std)]

mod aes;
pub use aes::*;
mod ancast;
pub use ancast::*;
mod boot_env;
pub use boot_env::*;
mod fuses;
pub use fuses::*;
pub mod image_verifier;
pub use image_verifier::{BodyHashVerifier, ImageVerifier};
mod patch;
pub use patch::apply_patch;
pub mod seeprom;
pub use seeprom::{BoardConfig, Seeprom, DEFAULT_BOARD_CONFIG};
