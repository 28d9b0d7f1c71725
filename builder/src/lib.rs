// Licensed under the Apache-2.0 license

//! Host-side tools for producing Ancast containers and boot patches.

mod ancast;
mod patch;

pub use ancast::AncastImageBuilder;
pub use patch::PatchBuilder;
