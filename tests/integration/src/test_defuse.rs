// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{
        body, boot_env, defused_otp, erased_seeprom, fused_otp, init_logger, iop_image,
    };
    use ancast_builder::AncastImageBuilder;
    use ancast_image::Target;
    use latte_config::{EngineConfig, LatteMemoryMap, LoaderConfig};
    use latte_emulator_periph::{LatteBus, MemStorage, Seeprom, SEEPROM_SIZE};
    use latte_error::BootError;
    use latte_rom::{
        AncastLoader, BodyHashVerifier, BootEnv, DEFAULT_BOARD_CONFIG, OTP_JTAG_STATUS_OFFSET,
    };

    const FALLBACK_KEY: [u8; 16] = [0x77; 16];
    const FALLBACK_IV: [u8; 16] = [0x88; 16];

    fn defused_config() -> LoaderConfig {
        LoaderConfig {
            defused_key: FALLBACK_KEY,
            defused_iv: FALLBACK_IV,
            ..LoaderConfig::default()
        }
    }

    fn fallback_image(body: &[u8]) -> Vec<u8> {
        AncastImageBuilder::new(Target::Iop)
            .key(FALLBACK_KEY)
            .iv(FALLBACK_IV)
            .build(body)
            .unwrap()
    }

    #[test]
    fn test_trust_level() {
        let mut env = boot_env(fused_otp());
        let trust = env.trust_level().unwrap();
        assert!(!trust.defused);
        assert!(!trust.jtag_enabled);

        let mut otp = defused_otp();
        otp[OTP_JTAG_STATUS_OFFSET..OTP_JTAG_STATUS_OFFSET + 4].fill(0);
        let mut env = boot_env(otp);
        let trust = env.trust_level().unwrap();
        assert!(trust.defused);
        assert_eq!(trust.bytes_loaded, 0x80);
        assert!(trust.jtag_enabled);
    }

    #[test]
    fn test_defused_device_uses_fallback_key() {
        let mut env = boot_env(defused_otp());
        let plain = body(0x400);
        let mut storage = MemStorage::new();
        storage.add_file("sdmc:/ios.img", fallback_image(&plain));
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x400];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            defused_config(),
            &mut scratch,
        );
        let loaded = loader.load_iop("sdmc:/ios.img", &mut region).unwrap();
        assert_eq!(loaded.body, &plain[..]);
    }

    #[test]
    fn test_defused_device_ignores_fuse_key() {
        // the OTP key slot is blank on a de-fused device, so an image under
        // the retail key no longer verifies
        let mut env = boot_env(defused_otp());
        let mut storage = MemStorage::new();
        storage.add_file("sdmc:/ios.img", iop_image(&body(0x100)));
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x100];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            defused_config(),
            &mut scratch,
        );
        assert_eq!(
            loader.load_iop("sdmc:/ios.img", &mut region).unwrap_err(),
            BootError::VerificationFailure
        );
    }

    #[test]
    fn test_fused_device_ignores_fallback_key() {
        let mut env = boot_env(fused_otp());
        let mut storage = MemStorage::new();
        storage.add_file("sdmc:/ios.img", fallback_image(&body(0x100)));
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x100];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            defused_config(),
            &mut scratch,
        );
        assert_eq!(
            loader.load_iop("sdmc:/ios.img", &mut region).unwrap_err(),
            BootError::VerificationFailure
        );
    }

    #[test]
    fn test_otp_read_once_per_boot() {
        let mut env = boot_env(fused_otp());
        let reads = env.platform.otp.reads();
        assert_eq!(reads, 256);

        let plain = body(0x100);
        let mut storage = MemStorage::new();
        storage.add_file("sdmc:/ios.img", iop_image(&plain));
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x100];
        for _ in 0..2 {
            let mut loader = AncastLoader::new(
                &mut env,
                &mut storage,
                &BodyHashVerifier,
                LoaderConfig::default(),
                &mut scratch,
            );
            assert!(loader.load_iop("sdmc:/ios.img", &mut region).is_ok());
        }

        // reprogramming the fuses mid-boot changes nothing already read
        env.platform.otp.program(defused_otp());
        assert!(!env.trust_level().unwrap().defused);
        assert_eq!(env.platform.otp.reads(), reads);
    }

    #[test]
    fn test_board_config_size_tag_mismatch() {
        init_logger();
        let mut bytes = [0u8; SEEPROM_SIZE];
        bytes[0x30..0x32].copy_from_slice(&0x10u16.to_be_bytes());
        bytes[0x36..0x38].copy_from_slice(&0x4341u16.to_be_bytes());
        let mut seeprom = Seeprom::new(bytes);

        let map = LatteMemoryMap::default();
        let mut env = BootEnv::new(LatteBus::new(map, fused_otp()), map, EngineConfig::default());
        env.init(&mut seeprom).unwrap();
        let stored = env.fuses.seeprom().unwrap();
        assert!(stored.defaulted);
        assert_eq!(stored.image.bc_size.get(), 0x24);
        assert_eq!(stored.board_config(), &DEFAULT_BOARD_CONFIG);
    }

    #[test]
    fn test_seeprom_read_failure_fails_init() {
        init_logger();
        let mut seeprom = erased_seeprom();
        seeprom.fail_reads(true);
        let map = LatteMemoryMap::default();
        let mut env = BootEnv::new(LatteBus::new(map, fused_otp()), map, EngineConfig::default());
        assert_eq!(env.init(&mut seeprom), Err(BootError::StorageIoError));
    }
}
