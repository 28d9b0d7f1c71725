// Licensed under the Apache-2.0 license

//! Ancast container loader.
//!
//! A load reads the header, checks magic and target, derives the key from the
//! fuses, decrypts the body into the caller's load region and verifies it.
//! Nothing is handed back unless every step passed; on failure the load region
//! is zeroed.

use crate::{apply_patch, BootEnv, ImageVerifier, AES_BLOCK_SIZE};
use ancast_image::{
    has_ancast_magic, AncastHeader, Target, ANCAST_MAGIC, MAX_HEADER_SIZE, PASSALONG_MAGIC_BOOT1,
};
use latte_config::LoaderConfig;
use latte_error::{BootError, BootResult};
use log::{debug, error, info, warn};
use romtime::{HexWord, ImageStorage, Platform, SECTOR_SIZE};

const _: () = assert!(MAX_HEADER_SIZE == SECTOR_SIZE);

/// Progress of the current load. Only moves forward; `Failed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStage {
    NotStarted,
    HeaderValidated,
    KeyDerived,
    Decrypted,
    Verified,
    Done,
    Failed(BootError),
}

#[derive(Clone, Copy, Debug)]
enum Source<'s> {
    File(&'s str),
    Sector(u32),
    Memory(&'s [u8]),
}

/// A decrypted and verified body in the caller's load region.
#[derive(Debug)]
pub struct LoadedImage<'r> {
    pub target: Target,
    pub header: AncastHeader,
    pub body: &'r [u8],
}

impl LoadedImage<'_> {
    pub fn version(&self) -> u32 {
        self.header.info.version.get()
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }
}

pub struct AncastLoader<'a, P: Platform, S: ImageStorage> {
    env: &'a mut BootEnv<P>,
    storage: &'a mut S,
    verifier: &'a dyn ImageVerifier,
    config: LoaderConfig,
    /// General-purpose buffer for patch files and the passalong marker.
    scratch: &'a mut [u8],
    stage: LoadStage,
}

impl<'a, P: Platform, S: ImageStorage> AncastLoader<'a, P, S> {
    pub fn new(
        env: &'a mut BootEnv<P>,
        storage: &'a mut S,
        verifier: &'a dyn ImageVerifier,
        config: LoaderConfig,
        scratch: &'a mut [u8],
    ) -> Self {
        Self {
            env,
            storage,
            verifier,
            config,
            scratch,
            stage: LoadStage::NotStarted,
        }
    }

    pub fn stage(&self) -> LoadStage {
        self.stage
    }

    pub fn scratch(&self) -> &[u8] {
        &self.scratch[..]
    }

    /// Loads an IOP image from a file.
    pub fn load_iop<'r>(&mut self, path: &str, region: &'r mut [u8]) -> BootResult<LoadedImage<'r>> {
        info!("[latte-rom] loading IOP image {}", path);
        let result = self.load(Source::File(path), Target::Iop, region);
        self.finish(result, Target::Iop, region, true)
    }

    /// Loads a PPC image from a file.
    pub fn load_ppc<'r>(&mut self, path: &str, region: &'r mut [u8]) -> BootResult<LoadedImage<'r>> {
        info!("[latte-rom] loading PPC image {}", path);
        let result = self.load(Source::File(path), Target::Ppc, region);
        self.finish(result, Target::Ppc, region, false)
    }

    /// Loads an IOP image stored on the raw medium starting at `sector`.
    pub fn load_iop_from_raw_sector<'r>(
        &mut self,
        sector: u32,
        region: &'r mut [u8],
    ) -> BootResult<LoadedImage<'r>> {
        info!("[latte-rom] loading IOP image from sector {:#x}", sector);
        let result = self.load(Source::Sector(sector), Target::Iop, region);
        self.finish(result, Target::Iop, region, true)
    }

    /// Loads an IOP image that is already in memory. `image` is left untouched.
    pub fn load_iop_from_memory<'r>(
        &mut self,
        image: &[u8],
        region: &'r mut [u8],
    ) -> BootResult<LoadedImage<'r>> {
        info!("[latte-rom] loading IOP image from memory");
        let result = self.load(Source::Memory(image), Target::Iop, region);
        self.finish(result, Target::Iop, region, true)
    }

    /// Loads an IOP image from a file and applies a boot patch to the verified body.
    pub fn load_iop_with_patch<'r>(
        &mut self,
        ios_path: &str,
        patch_path: &str,
        region: &'r mut [u8],
    ) -> BootResult<LoadedImage<'r>> {
        info!(
            "[latte-rom] loading IOP image {} with patch {}",
            ios_path, patch_path
        );
        let result = self.load_patched(ios_path, patch_path, region);
        self.finish(result, Target::Iop, region, false)
    }

    fn load_patched(
        &mut self,
        ios_path: &str,
        patch_path: &str,
        region: &mut [u8],
    ) -> BootResult<AncastHeader> {
        let header = self.load(Source::File(ios_path), Target::Iop, region)?;
        let body = &mut region[..header.body_size()];
        let scratch = core::mem::take(&mut self.scratch);
        let result = self.patch(patch_path, body, scratch);
        self.scratch = scratch;
        result?;
        Ok(header)
    }

    fn patch(&mut self, path: &str, body: &mut [u8], scratch: &mut [u8]) -> BootResult<()> {
        let size = self.storage.file_size(path)?;
        let mut magic = [0u8; 4];
        if size >= magic.len() {
            self.storage.read_file(path, 0, &mut magic)?;
        }
        let patch: &[u8] = if has_ancast_magic(&magic) {
            // Wrapped patches get the same decrypt and verify treatment as the image.
            debug!("[latte-rom] patch {} is an ancast container", path);
            let header = self.load(Source::File(path), Target::Iop, scratch)?;
            &scratch[..header.body_size()]
        } else {
            let buf = scratch.get_mut(..size).ok_or(BootError::ImageTooLarge)?;
            self.storage.read_file(path, 0, buf)?;
            buf
        };
        let records = apply_patch(body, patch)?;
        info!("[latte-rom] applied {} patch records", records);
        Ok(())
    }

    fn finish<'r>(
        &mut self,
        result: BootResult<AncastHeader>,
        target: Target,
        region: &'r mut [u8],
        passalong: bool,
    ) -> BootResult<LoadedImage<'r>> {
        match result {
            Ok(header) => {
                if passalong {
                    self.write_passalong();
                }
                self.set_stage(LoadStage::Done);
                info!(
                    "[latte-rom] {:?} image loaded: {:#x} bytes, version {}",
                    target,
                    header.body_size(),
                    HexWord(header.info.version.get())
                );
                let region: &'r [u8] = region;
                Ok(LoadedImage {
                    target,
                    header,
                    body: &region[..header.body_size()],
                })
            }
            Err(err) => {
                error!(
                    "[latte-rom] ancast load failed: {} ({})",
                    err,
                    HexWord(err.status())
                );
                self.stage = LoadStage::Failed(err);
                region.fill(0);
                Err(err)
            }
        }
    }

    fn write_passalong(&mut self) {
        match self.scratch.get_mut(..PASSALONG_MAGIC_BOOT1.len()) {
            Some(dst) => dst.copy_from_slice(&PASSALONG_MAGIC_BOOT1),
            None => warn!("[latte-rom] scratch region too small for passalong"),
        }
    }

    fn set_stage(&mut self, stage: LoadStage) {
        debug!("[latte-rom] ancast stage {:?}", stage);
        self.stage = stage;
    }

    fn load(
        &mut self,
        source: Source<'_>,
        expected: Target,
        region: &mut [u8],
    ) -> BootResult<AncastHeader> {
        self.stage = LoadStage::NotStarted;

        let mut header_buf = [0u8; MAX_HEADER_SIZE];
        let (header, available) = self.read_header(source, &mut header_buf)?;
        self.validate(&header, expected, available, region.len())?;
        self.set_stage(LoadStage::HeaderValidated);

        let (key, iv) = self.derive_key(expected)?;
        self.set_stage(LoadStage::KeyDerived);

        let size = header.body_size();
        if let Source::Memory(image) = source {
            let src = image
                .get(header.body_offset()..header.image_size()?)
                .ok_or(BootError::InvalidImage)?;
            let mut aes = self.env.aes();
            aes.set_key(&key);
            aes.set_iv(&iv);
            aes.decrypt(src, &mut region[..size], false)?;
        } else {
            self.read_body(source, &header, region)?;
            let mut aes = self.env.aes();
            aes.set_key(&key);
            aes.set_iv(&iv);
            aes.decrypt_in_place(&mut region[..size], false)?;
        }
        self.set_stage(LoadStage::Decrypted);

        if !self.verifier.verify(&header, &region[..size]) {
            error!("[latte-rom] body of {:?} image failed verification", expected);
            return Err(BootError::VerificationFailure);
        }
        self.set_stage(LoadStage::Verified);
        Ok(header)
    }

    /// Parses the header. Also returns the number of image bytes available, when
    /// the source knows it.
    fn read_header(
        &mut self,
        source: Source<'_>,
        buf: &mut [u8; MAX_HEADER_SIZE],
    ) -> BootResult<(AncastHeader, Option<usize>)> {
        let (bytes, available): (&[u8], _) = match source {
            Source::File(path) => {
                let size = self.storage.file_size(path)?;
                let n = size.min(MAX_HEADER_SIZE);
                self.storage.read_file(path, 0, &mut buf[..n])?;
                (&buf[..n], Some(size))
            }
            Source::Sector(sector) => {
                self.storage.read_sectors(sector, &mut buf[..])?;
                (&buf[..], None)
            }
            Source::Memory(image) => (image, Some(image.len())),
        };
        if !has_ancast_magic(bytes) {
            let magic = bytes
                .get(..4)
                .map(|m| u32::from_be_bytes([m[0], m[1], m[2], m[3]]))
                .unwrap_or_default();
            error!(
                "[latte-rom] bad ancast magic {} (expected {})",
                HexWord(magic),
                HexWord(ANCAST_MAGIC)
            );
            return Err(BootError::InvalidImage);
        }
        Ok((AncastHeader::parse(bytes)?, available))
    }

    fn validate(
        &self,
        header: &AncastHeader,
        expected: Target,
        available: Option<usize>,
        region_len: usize,
    ) -> BootResult<()> {
        if header.info.target() != Some(expected) {
            error!(
                "[latte-rom] image target code {:#x}, expected {:?}",
                header.info.target_code(),
                expected
            );
            return Err(BootError::WrongTarget);
        }
        let size = header.body_size();
        if size == 0 || size % AES_BLOCK_SIZE != 0 {
            error!("[latte-rom] bad body size {:#x}", size);
            return Err(BootError::InvalidImage);
        }
        let image_size = header.image_size().map_err(|err| {
            error!("[latte-rom] body size {:#x} overflows the image", size);
            err
        })?;
        if image_size > self.config.max_image_size || size > region_len {
            error!("[latte-rom] image of {:#x} bytes does not fit", image_size);
            return Err(BootError::ImageTooLarge);
        }
        if let Some(available) = available {
            if image_size > available {
                error!(
                    "[latte-rom] image truncated: {:#x} of {:#x} bytes",
                    available, image_size
                );
                return Err(BootError::InvalidImage);
            }
        }
        Ok(())
    }

    fn derive_key(&mut self, target: Target) -> BootResult<([u8; 16], [u8; 16])> {
        let trust = self.env.trust_level()?;
        if trust.defused {
            warn!(
                "[latte-rom] device is de-fused, using fallback {:?} key",
                target
            );
            return Ok((self.config.defused_key, self.config.defused_iv));
        }
        let slot = match target {
            Target::Iop => self.config.iop_slot,
            Target::Ppc => self.config.ppc_slot,
        };
        let key = self.env.fuses.key_material(slot.key_offset)?;
        if key.iter().all(|&b| b == 0) {
            error!(
                "[latte-rom] {:?} key slot at OTP {:#x} is blank",
                target, slot.key_offset
            );
            return Err(BootError::KeyDerivationFailure);
        }
        let iv = self.env.fuses.key_material(slot.iv_offset)?;
        Ok((key, iv))
    }

    /// Reads the encrypted body to the start of `region`.
    fn read_body(
        &mut self,
        source: Source<'_>,
        header: &AncastHeader,
        region: &mut [u8],
    ) -> BootResult<()> {
        let size = header.body_size();
        match source {
            Source::File(path) => {
                self.storage
                    .read_file(path, header.body_offset(), &mut region[..size])?;
            }
            Source::Sector(sector) => {
                let first = (header.body_offset() / SECTOR_SIZE) as u32;
                let skip = header.body_offset() % SECTOR_SIZE;
                let start = sector.checked_add(first).ok_or(BootError::StorageIoError)?;
                read_sector_span(&mut *self.storage, start, skip, &mut region[..size])?;
            }
            Source::Memory(_) => {}
        }
        Ok(())
    }
}

/// Reads `dst.len()` bytes that start `skip` bytes into sector `start`. Whole
/// sectors go straight to `dst`; a partial head or tail sector goes through a
/// one-sector bounce buffer, so `dst` needs no rounding slack.
fn read_sector_span<S: ImageStorage>(
    storage: &mut S,
    mut sector: u32,
    skip: usize,
    dst: &mut [u8],
) -> BootResult<()> {
    let mut bounce = [0u8; SECTOR_SIZE];
    let mut pos = 0;
    if skip != 0 {
        storage.read_sectors(sector, &mut bounce)?;
        let n = (SECTOR_SIZE - skip).min(dst.len());
        dst[..n].copy_from_slice(&bounce[skip..skip + n]);
        pos = n;
        sector = sector.checked_add(1).ok_or(BootError::StorageIoError)?;
    }

    let whole = (dst.len() - pos) / SECTOR_SIZE;
    if whole > 0 {
        let len = whole * SECTOR_SIZE;
        storage.read_sectors(sector, &mut dst[pos..pos + len])?;
        pos += len;
        sector = sector
            .checked_add(whole as u32)
            .ok_or(BootError::StorageIoError)?;
    }

    let tail = dst.len() - pos;
    if tail > 0 {
        storage.read_sectors(sector, &mut bounce)?;
        dst[pos..].copy_from_slice(&bounce[..tail]);
    }
    Ok(())
}
