// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{body, boot_env, fused_otp, iop_image, IOP_IV, IOP_KEY};
    use ancast_builder::{AncastImageBuilder, PatchBuilder};
    use ancast_image::{Target, PASSALONG_MAGIC_BOOT1};
    use latte_config::LoaderConfig;
    use latte_emulator_periph::MemStorage;
    use latte_error::BootError;
    use latte_rom::{AncastLoader, BodyHashVerifier, LoadStage};

    const IOS: &str = "sdmc:/ios.img";
    const PATCH: &str = "sdmc:/ios.patch";

    fn storage_with(plain: &[u8], patch: Vec<u8>) -> MemStorage {
        let mut storage = MemStorage::new();
        storage.add_file(IOS, iop_image(plain));
        storage.add_file(PATCH, patch);
        storage
    }

    #[test]
    fn test_raw_patch_applied_after_verification() {
        let mut env = boot_env(fused_otp());
        let plain = body(0x400);
        let patch = PatchBuilder::new()
            .record(0x10, &[0xde, 0xad, 0xbe, 0xef])
            .record(0x3fe, &[0x4e, 0x71])
            .build()
            .unwrap();
        let mut storage = storage_with(&plain, patch);
        let mut scratch = vec![0u8; 0x1000];
        let mut region = vec![0u8; 0x400];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        let loaded = loader.load_iop_with_patch(IOS, PATCH, &mut region).unwrap();
        let mut expected = plain.clone();
        expected[0x10..0x14].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        expected[0x3fe..].copy_from_slice(&[0x4e, 0x71]);
        assert_eq!(loaded.body, &expected[..]);
        assert_eq!(loader.stage(), LoadStage::Done);
        // patched boots do not leave a passalong marker
        assert_ne!(&loader.scratch()[..8], &PASSALONG_MAGIC_BOOT1);
    }

    #[test]
    fn test_ancast_wrapped_patch() {
        let mut env = boot_env(fused_otp());
        let plain = body(0x200);
        let patch = PatchBuilder::new()
            .record(0x40, &[1, 2, 3, 4, 5])
            .build()
            .unwrap();
        let wrapped = AncastImageBuilder::new(Target::Iop)
            .key(IOP_KEY)
            .iv(IOP_IV)
            .pad(true)
            .build(&patch)
            .unwrap();
        let mut storage = storage_with(&plain, wrapped);
        let mut scratch = vec![0u8; 0x1000];
        let mut region = vec![0u8; 0x200];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        let loaded = loader.load_iop_with_patch(IOS, PATCH, &mut region).unwrap();
        assert_eq!(&loaded.body[0x40..0x45], &[1, 2, 3, 4, 5]);
        assert_eq!(&loaded.body[..0x40], &plain[..0x40]);
        assert_eq!(&loaded.body[0x45..], &plain[0x45..]);
    }

    #[test]
    fn test_wrapped_patch_for_wrong_target() {
        let mut env = boot_env(fused_otp());
        let patch = PatchBuilder::new().record(0, &[0; 4]).build().unwrap();
        let wrapped = AncastImageBuilder::new(Target::Ppc)
            .pad(true)
            .build(&patch)
            .unwrap();
        let mut storage = storage_with(&body(0x100), wrapped);
        let mut scratch = vec![0u8; 0x1000];
        let mut region = vec![0u8; 0x100];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        assert_eq!(
            loader
                .load_iop_with_patch(IOS, PATCH, &mut region)
                .unwrap_err(),
            BootError::WrongTarget
        );
        assert!(region.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_out_of_bounds_record_rejects_whole_patch() {
        let mut env = boot_env(fused_otp());
        let plain = body(0x100);
        let patch = PatchBuilder::new()
            .record(0x0, &[0xff; 4])
            .record(0xfe, &[0xff; 4])
            .build()
            .unwrap();
        let mut storage = storage_with(&plain, patch);
        let mut scratch = vec![0u8; 0x1000];
        let mut region = vec![0u8; 0x200];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        assert_eq!(
            loader
                .load_iop_with_patch(IOS, PATCH, &mut region)
                .unwrap_err(),
            BootError::InvalidPatch
        );
        assert_eq!(loader.stage(), LoadStage::Failed(BootError::InvalidPatch));
        assert!(region.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_garbage_patch() {
        let mut env = boot_env(fused_otp());
        let mut storage = storage_with(&body(0x100), b"not a patch file".to_vec());
        let mut scratch = vec![0u8; 0x1000];
        let mut region = vec![0u8; 0x100];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        assert_eq!(
            loader
                .load_iop_with_patch(IOS, PATCH, &mut region)
                .unwrap_err(),
            BootError::InvalidPatch
        );
    }

    #[test]
    fn test_missing_patch_file() {
        let mut env = boot_env(fused_otp());
        let mut storage = MemStorage::new();
        storage.add_file(IOS, iop_image(&body(0x100)));
        let mut scratch = vec![0u8; 0x1000];
        let mut region = vec![0u8; 0x100];

        let mut loader = AncastLoader::new(
            &mut env,
            &mut storage,
            &BodyHashVerifier,
            LoaderConfig::default(),
            &mut scratch,
        );
        assert_eq!(
            loader
                .load_iop_with_patch(IOS, PATCH, &mut region)
                .unwrap_err(),
            BootError::StorageIoError
        );
    }
}
