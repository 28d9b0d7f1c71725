// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{
        body, boot_env, fused_otp, iop_image, ppc_image, IOP_IV, IOP_KEY, PPC_IV, PPC_KEY,
    };
    use ancast_builder::AncastImageBuilder;
    use ancast_image::{SignatureType, Target, PASSALONG_MAGIC_BOOT1};
    use latte_config::LoaderConfig;
    use latte_emulator_periph::{FsStorage, MemStorage};
    use latte_error::{status_of, BootError, STATUS_OK};
    use latte_rom::{AncastLoader, BodyHashVerifier, LoadStage};

    const RAW_SECTOR: u32 = 0x40;

    #[test]
    fn test_load_iop_from_file() {
        let mut env = boot_env(fused_otp());
        let plain = body(0x1000);
        let mut storage = MemStorage::new();
        storage.add_file("sdmc:/ios.img", iop_image(&plain));
        let mut scratch = vec![0u8; 0x1000];
        let mut region = vec![0u8; 0x2000];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        let loaded = loader.load_iop("sdmc:/ios.img", &mut region).unwrap();
        assert_eq!(loaded.target, Target::Iop);
        assert_eq!(loaded.size(), plain.len());
        assert_eq!(loaded.body, &plain[..]);
        assert_eq!(loader.stage(), LoadStage::Done);
        assert_eq!(&loader.scratch()[..8], &PASSALONG_MAGIC_BOOT1);
        assert_eq!(
            env.platform.aes.commands(),
            &[0x9800_007f, 0x9800_107f],
            "two 128-block decrypt chunks, IV chained into the second"
        );
    }

    #[test]
    fn test_load_ppc_from_file() {
        let mut env = boot_env(fused_otp());
        let plain = body(0x300);
        let mut storage = MemStorage::new();
        let image = AncastImageBuilder::new(Target::Ppc)
            .key(PPC_KEY)
            .iv(PPC_IV)
            .version(0x0512)
            .build(&plain)
            .unwrap();
        storage.add_file("sdmc:/kernel.img", image);
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x1000];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        let loaded = loader.load_ppc("sdmc:/kernel.img", &mut region).unwrap();
        assert_eq!(loaded.target, Target::Ppc);
        assert_eq!(loaded.version(), 0x0512);
        assert_eq!(loaded.body, &plain[..]);
        // passalong is only left for IOP boots
        assert!(scratch.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_load_from_host_directory() {
        let dir = tempfile::tempdir().unwrap();
        let plain = body(0x800);
        std::fs::write(dir.path().join("fw.img"), iop_image(&plain)).unwrap();
        let mut env = boot_env(fused_otp());
        let mut storage = FsStorage::new(dir.path(), None).unwrap();
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x800];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        let loaded = loader.load_iop("sdmc:/fw.img", &mut region).unwrap();
        assert_eq!(loaded.body, &plain[..]);
    }

    #[test]
    fn test_load_iop_from_raw_sector() {
        let mut env = boot_env(fused_otp());
        let plain = body(0x300);
        let mut storage = MemStorage::new();
        storage.write_sectors(RAW_SECTOR, &iop_image(&plain));
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x1000];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        let loaded = loader
            .load_iop_from_raw_sector(RAW_SECTOR, &mut region)
            .unwrap();
        assert_eq!(loaded.body, &plain[..]);
        assert_eq!(&loader.scratch()[..8], &PASSALONG_MAGIC_BOOT1);
        assert!(region[plain.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_raw_sector_body_not_sector_aligned() {
        let mut env = boot_env(fused_otp());
        let plain = body(0x300);
        // an ECDSA header puts the body at 0x100, inside the first sector
        let image = AncastImageBuilder::new(Target::Iop)
            .key(IOP_KEY)
            .iv(IOP_IV)
            .signature_type(SignatureType::Ecdsa)
            .build(&plain)
            .unwrap();
        let mut storage = MemStorage::new();
        storage.write_sectors(RAW_SECTOR, &image);
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x1000];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        let loaded = loader
            .load_iop_from_raw_sector(RAW_SECTOR, &mut region)
            .unwrap();
        assert_eq!(loaded.body, &plain[..]);
    }

    #[test]
    fn test_raw_sector_fills_exact_region() {
        // body ends mid-sector and the region has no room past it
        let plain = body(0x210);
        for signature_type in [SignatureType::Rsa2048, SignatureType::Ecdsa] {
            let image = AncastImageBuilder::new(Target::Iop)
                .key(IOP_KEY)
                .iv(IOP_IV)
                .signature_type(signature_type)
                .build(&plain)
                .unwrap();
            let mut storage = MemStorage::new();
            storage.add_file("sdmc:/ios.img", image.clone());
            storage.write_sectors(RAW_SECTOR, &image);
            let mut env = boot_env(fused_otp());
            let mut scratch = vec![0u8; 0x100];

            let mut loader = AncastLoader::new(
                &mut env,
                &mut storage,
                &BodyHashVerifier,
                LoaderConfig::default(),
                &mut scratch,
            );
            let mut from_file = vec![0u8; plain.len()];
            let size = loader.load_iop("sdmc:/ios.img", &mut from_file).unwrap().size();
            assert_eq!(size, plain.len(), "{:?}", signature_type);

            let mut from_sector = vec![0u8; plain.len()];
            let loaded = loader
                .load_iop_from_raw_sector(RAW_SECTOR, &mut from_sector)
                .unwrap();
            assert_eq!(loaded.body, &plain[..], "{:?}", signature_type);
        }
    }

    #[test]
    fn test_load_iop_from_memory_leaves_source() {
        let mut env = boot_env(fused_otp());
        let plain = body(0x200);
        let image = iop_image(&plain);
        let before = image.clone();
        let mut storage = MemStorage::new();
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x200];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        let loaded = loader.load_iop_from_memory(&image, &mut region).unwrap();
        assert_eq!(loaded.body, &plain[..]);
        assert_eq!(image, before);
        assert_eq!(storage.reads(), 0);
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let mut env = boot_env(fused_otp());
        let plain = body(0x400);
        let mut image = iop_image(&plain);
        let last = image.len() - 1;
        image[last] ^= 0x01;
        let mut storage = MemStorage::new();
        storage.add_file("sdmc:/ios.img", image);
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0xeeu8; 0x800];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        let result = loader.load_iop("sdmc:/ios.img", &mut region);
        assert_eq!(result.as_ref().unwrap_err(), &BootError::VerificationFailure);
        assert_eq!(status_of(&result), 0xb000_0005);
        assert_eq!(
            loader.stage(),
            LoadStage::Failed(BootError::VerificationFailure)
        );
        drop(result);
        assert!(region.iter().all(|&b| b == 0));
        assert!(scratch.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_wrong_magic_issues_no_engine_commands() {
        let mut env = boot_env(fused_otp());
        let mut image = iop_image(&body(0x100));
        image[..4].copy_from_slice(&0xdead_beefu32.to_be_bytes());
        let mut storage = MemStorage::new();
        storage.add_file("sdmc:/ios.img", image);
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x200];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        assert_eq!(
            loader.load_iop("sdmc:/ios.img", &mut region).unwrap_err(),
            BootError::InvalidImage
        );
        assert!(env.platform.aes.commands().is_empty());
    }

    #[test]
    fn test_ppc_image_rejected_as_iop() {
        let mut env = boot_env(fused_otp());
        let mut storage = MemStorage::new();
        storage.add_file("sdmc:/kernel.img", ppc_image(&body(0x100)));
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x200];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        assert_eq!(
            loader.load_iop("sdmc:/kernel.img", &mut region).unwrap_err(),
            BootError::WrongTarget
        );
        assert!(env.platform.aes.commands().is_empty());
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let mut env = boot_env(fused_otp());
        let mut storage = MemStorage::new();
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x200];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        let result = loader.load_iop("sdmc:/nope.img", &mut region);
        assert_eq!(status_of(&result), BootError::StorageIoError.status());
    }

    #[test]
    fn test_image_larger_than_configured_limit() {
        let mut env = boot_env(fused_otp());
        let mut storage = MemStorage::new();
        storage.add_file("sdmc:/ios.img", iop_image(&body(0x1000)));
        let mut scratch = vec![0u8; 0x100];
        let mut region = vec![0u8; 0x2000];
        let config = LoaderConfig {
            max_image_size: 0x1000,
            ..LoaderConfig::default()
        };

        let mut loader =
            AncastLoader::new(&mut env, &mut storage, &BodyHashVerifier, config, &mut scratch);
        assert_eq!(
            loader.load_iop("sdmc:/ios.img", &mut region).unwrap_err(),
            BootError::ImageTooLarge
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(STATUS_OK, 0);
        assert_eq!(BootError::InvalidImage.status(), 0xb000_0001);
        assert_eq!(BootError::WrongTarget.status(), 0xb000_0002);
        assert_eq!(BootError::KeyDerivationFailure.status(), 0xb000_0003);
        assert_eq!(BootError::DecryptionEngineFault.status(), 0xb000_0004);
        assert_eq!(BootError::VerificationFailure.status(), 0xb000_0005);
        assert_eq!(BootError::StorageIoError.status(), 0xb000_0006);
        assert_eq!(u32::from(BootError::InvalidPatch), 0xb000_0008);
    }
}
