/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the Latte emulated peripheral library.

--*/

mod aes;
mod bus;
mod otp;
mod seeprom;
mod storage;

pub use aes::{AesCommand, AesEngine, AesOp};
pub use bus::{BusEvent, LatteBus, UNMAPPED_DMA_ADDR};
pub use otp::{Otp, OTP_SIZE};
pub use seeprom::{Seeprom, SEEPROM_SIZE};
pub use storage::{FsStorage, MemStorage};
