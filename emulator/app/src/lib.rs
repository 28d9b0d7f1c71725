/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Library interface for the Latte boot emulator.

--*/

pub mod emulator;

pub use emulator::{run, BootArgs, Command, EmulatorArgs, PackArgs, PatchArgs, TargetArg};
