/*++

Licensed under the Apache-2.0 license.

File Name:

    boot_env.rs

Abstract:

    Boot Environment - Owns the platform and fused state used by the loader

--*/

use crate::{Aes, FuseStore, TrustLevel};
use latte_config::{EngineConfig, LatteMemoryMap};
use latte_error::BootResult;
use log::info;
use romtime::{Platform, SeepromStorage};

/// Boot environment containing the platform and everything read from it at init.
///
/// Holding `&mut BootEnv` is what grants access to the AES engine, so at most one
/// engine operation can be in flight. Hosts that share it between threads wrap it
/// in a `Mutex`.
pub struct BootEnv<P: Platform> {
    pub platform: P,
    pub memory_map: LatteMemoryMap,
    pub engine: EngineConfig,
    pub fuses: FuseStore,
}

impl<P: Platform> BootEnv<P> {
    pub fn new(platform: P, memory_map: LatteMemoryMap, engine: EngineConfig) -> Self {
        Self {
            platform,
            memory_map,
            engine,
            fuses: FuseStore::new(),
        }
    }

    /// Reads OTP and SEEPROM and resets the AES engine. Must run before any load.
    pub fn init(&mut self, seeprom: &mut impl SeepromStorage) -> BootResult<()> {
        self.fuses.init(&mut self.platform, &self.memory_map);
        let defaulted = self.fuses.read_config(seeprom)?.defaulted;
        self.aes().reset()?;
        info!(
            "[latte-rom] crypto initialized{}",
            if defaulted { " (default board config)" } else { "" }
        );
        Ok(())
    }

    pub fn aes(&mut self) -> Aes<'_, P> {
        Aes::new(&mut self.platform, &self.memory_map, self.engine)
    }

    pub fn trust_level(&mut self) -> BootResult<TrustLevel> {
        self.fuses.trust_level()
    }
}
