/*++

Licensed under the Apache-2.0 license.

File Name:

    emulator.rs

Abstract:

    Command line front end: boots Ancast images on the emulated Latte IOP and
    packs raw bodies into containers.

--*/

use ancast_builder::{AncastImageBuilder, PatchBuilder};
use ancast_image::Target;
use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use clap_num::maybe_hex;
use latte_config::{EngineConfig, LatteMemoryMap, LoaderConfig};
use latte_emulator_periph::{FsStorage, LatteBus, Otp, Seeprom, SEEPROM_SIZE};
use latte_error::STATUS_OK;
use latte_rom::{AncastLoader, BodyHashVerifier, BootEnv, LoadedImage};
use log::{error, info, LevelFilter};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, name = "Latte Boot Emulator")]
pub struct EmulatorArgs {
    /// Log level: off, error, warn, info, debug or trace
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load an Ancast image on the emulated IOP
    Boot(BootArgs),
    /// Encrypt a raw body into an Ancast container
    Pack(PackArgs),
    /// Write a boot patch file from offset:hexbytes records
    Patch(PatchArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetArg {
    Iop,
    Ppc,
}

impl From<TargetArg> for Target {
    fn from(target: TargetArg) -> Self {
        match target {
            TargetArg::Iop => Target::Iop,
            TargetArg::Ppc => Target::Ppc,
        }
    }
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("source").required(true).args(["image", "sector", "memory"])))]
pub struct BootArgs {
    /// Raw OTP dump, up to 1024 bytes
    #[arg(short, long)]
    pub otp: PathBuf,

    /// Raw SEEPROM dump. Without one the SEEPROM reads as erased.
    #[arg(short, long)]
    pub seeprom: Option<PathBuf>,

    /// Host directory standing in for the SD card
    #[arg(long, default_value = ".")]
    pub sd_root: PathBuf,

    /// Raw disk image used for sector loads
    #[arg(long)]
    pub raw_disk: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "iop")]
    pub target: TargetArg,

    /// Image path on the SD card, e.g. sdmc:/ios.img
    #[arg(short, long)]
    pub image: Option<String>,

    /// First sector of an IOP image on the raw disk
    #[arg(long, value_parser = maybe_hex::<u32>)]
    pub sector: Option<u32>,

    /// Host file holding an IOP image to load from memory
    #[arg(long)]
    pub memory: Option<PathBuf>,

    /// Boot patch on the SD card, applied to an IOP image
    #[arg(short, long, requires = "image")]
    pub patch: Option<String>,

    /// Size of the load region
    #[arg(long, value_parser = maybe_hex::<usize>, default_value = "0x1000000")]
    pub region_size: usize,

    /// Override the AES engine poll bound
    #[arg(long, value_parser = maybe_hex::<u32>)]
    pub poll_limit: Option<u32>,

    /// Key used on de-fused devices, as 32 hex digits
    #[arg(long, value_parser = parse_key)]
    pub defused_key: Option<[u8; 16]>,

    /// IV used on de-fused devices, as 32 hex digits
    #[arg(long, value_parser = parse_key)]
    pub defused_iv: Option<[u8; 16]>,

    /// Write the decrypted body to this file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PackArgs {
    /// Raw body to encrypt
    #[arg(short, long)]
    pub input: PathBuf,

    #[arg(short, long)]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value = "iop")]
    pub target: TargetArg,

    /// AES key as 32 hex digits. Taken from --otp when omitted.
    #[arg(long, value_parser = parse_key)]
    pub key: Option<[u8; 16]>,

    /// AES IV as 32 hex digits. Taken from --otp when omitted.
    #[arg(long, value_parser = parse_key)]
    pub iv: Option<[u8; 16]>,

    /// OTP dump to take the target's key and IV from
    #[arg(long)]
    pub otp: Option<PathBuf>,

    #[arg(long, value_parser = maybe_hex::<u32>, default_value = "0")]
    pub version: u32,

    /// Zero-pad the body to a whole number of AES blocks
    #[arg(long, default_value_t = false)]
    pub pad: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PatchArgs {
    #[arg(short, long)]
    pub output: PathBuf,

    /// Record as OFFSET:HEXBYTES, e.g. 0x1f0:e12fff1e
    #[arg(short, long = "record", value_parser = parse_record)]
    pub records: Vec<(u32, Vec<u8>)>,
}

fn parse_key(s: &str) -> Result<[u8; 16], String> {
    let bytes = hex::decode(s).map_err(|e| e.to_string())?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected 16 bytes, got {}", b.len()))
}

fn parse_record(s: &str) -> Result<(u32, Vec<u8>), String> {
    let (offset, data) = s
        .split_once(':')
        .ok_or_else(|| "expected OFFSET:HEXBYTES".to_string())?;
    let offset = maybe_hex::<u32>(offset)?;
    let data = hex::decode(data).map_err(|e| e.to_string())?;
    Ok((offset, data))
}

/// Runs one command. For `boot`, returns the loader's status code.
pub fn run(args: EmulatorArgs) -> Result<u32> {
    let level: LevelFilter = args
        .log_level
        .parse()
        .map_err(|_| anyhow!("unknown log level {}", args.log_level))?;
    let _ = simple_logger::SimpleLogger::new().with_level(level).init();

    match args.command {
        Command::Boot(boot_args) => boot(&boot_args),
        Command::Pack(pack_args) => pack(&pack_args).map(|_| STATUS_OK),
        Command::Patch(patch_args) => {
            let mut builder = PatchBuilder::new();
            for (offset, data) in &patch_args.records {
                builder = builder.record(*offset, data);
            }
            std::fs::write(&patch_args.output, builder.build()?)?;
            Ok(STATUS_OK)
        }
    }
}

fn boot(args: &BootArgs) -> Result<u32> {
    let map = LatteMemoryMap::default();
    let otp = Otp::from_file(&args.otp)
        .with_context(|| format!("reading OTP dump {}", args.otp.display()))?;
    let mut seeprom = match &args.seeprom {
        Some(path) => Seeprom::from_file(path)
            .with_context(|| format!("reading SEEPROM dump {}", path.display()))?,
        None => Seeprom::new([0u8; SEEPROM_SIZE]),
    };

    let mut engine = EngineConfig::default();
    if let Some(limit) = args.poll_limit {
        engine.poll_limit = limit;
    }
    let mut env = BootEnv::new(LatteBus::with_otp(map, otp), map, engine);
    if let Err(err) = env.init(&mut seeprom) {
        error!("[latte-emu] init failed: {}", err);
        return Ok(err.status());
    }

    let mut config = LoaderConfig::default();
    if let Some(key) = args.defused_key {
        config.defused_key = key;
    }
    if let Some(iv) = args.defused_iv {
        config.defused_iv = iv;
    }
    let mut storage = FsStorage::new(&args.sd_root, args.raw_disk.as_deref())?;
    let memory_image = args.memory.as_ref().map(std::fs::read).transpose()?;
    let mut scratch = vec![0u8; map.scratch_size as usize];
    let mut region = vec![0u8; args.region_size];
    let verifier = BodyHashVerifier;
    let mut loader = AncastLoader::new(&mut env, &mut storage, &verifier, config, &mut scratch);

    let result: latte_error::BootResult<LoadedImage> = match args.target {
        TargetArg::Ppc => {
            let Some(image) = &args.image else {
                bail!("PPC images can only be loaded from --image");
            };
            loader.load_ppc(image, &mut region)
        }
        TargetArg::Iop => match (&args.image, &args.patch, args.sector, &memory_image) {
            (Some(image), Some(patch), _, _) => loader.load_iop_with_patch(image, patch, &mut region),
            (Some(image), None, _, _) => loader.load_iop(image, &mut region),
            (None, _, Some(sector), _) => loader.load_iop_from_raw_sector(sector, &mut region),
            (None, _, None, Some(memory)) => loader.load_iop_from_memory(memory, &mut region),
            (None, _, None, None) => bail!("no image source given"),
        },
    };

    match result {
        Ok(image) => {
            info!(
                "[latte-emu] loaded {:?} body of {:#x} bytes",
                image.target,
                image.size()
            );
            if let Some(output) = &args.output {
                std::fs::write(output, image.body)
                    .with_context(|| format!("writing {}", output.display()))?;
            }
            Ok(STATUS_OK)
        }
        Err(err) => Ok(err.status()),
    }
}

fn pack(args: &PackArgs) -> Result<()> {
    let target: Target = args.target.into();
    let (mut key, mut iv) = ([0u8; 16], [0u8; 16]);
    if let Some(path) = &args.otp {
        let otp = Otp::from_file(path)
            .with_context(|| format!("reading OTP dump {}", path.display()))?;
        let config = LoaderConfig::default();
        let slot = match target {
            Target::Iop => config.iop_slot,
            Target::Ppc => config.ppc_slot,
        };
        key.copy_from_slice(&otp.fuses()[slot.key_offset..slot.key_offset + 16]);
        iv.copy_from_slice(&otp.fuses()[slot.iv_offset..slot.iv_offset + 16]);
    }
    let key = args.key.unwrap_or(key);
    let iv = args.iv.unwrap_or(iv);

    let body = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    AncastImageBuilder::new(target)
        .key(key)
        .iv(iv)
        .version(args.version)
        .pad(args.pad)
        .write_to_file(&body, &args.output)?;
    info!(
        "[latte-emu] packed {} bytes into {}",
        body.len(),
        args.output.display()
    );
    Ok(())
}
