/*++

Licensed under the Apache-2.0 license.

File Name:

    storage.rs

Abstract:

    Image sources for the loader: an in-memory file table and raw medium, and
    a host directory plus an optional raw disk image.

--*/

use latte_error::StorageError;
use romtime::{ImageStorage, SECTOR_SIZE};
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

fn slice_at(data: &[u8], offset: usize, len: usize) -> Result<&[u8], StorageError> {
    let end = offset.checked_add(len).ok_or(StorageError::OutOfRange)?;
    data.get(offset..end).ok_or(StorageError::OutOfRange)
}

fn sector_offset(sector: u32, len: usize) -> Result<u64, StorageError> {
    if len % SECTOR_SIZE != 0 {
        return Err(StorageError::OutOfRange);
    }
    Ok(sector as u64 * SECTOR_SIZE as u64)
}

#[derive(Default)]
pub struct MemStorage {
    files: HashMap<String, Vec<u8>>,
    raw: Vec<u8>,
    reads: usize,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: &str, data: Vec<u8>) {
        self.files.insert(path.to_string(), data);
    }

    /// Writes `data` to the raw medium at `sector`, growing it as needed.
    pub fn write_sectors(&mut self, sector: u32, data: &[u8]) {
        let start = sector as usize * SECTOR_SIZE;
        let end = (start + data.len()).next_multiple_of(SECTOR_SIZE);
        if self.raw.len() < end {
            self.raw.resize(end, 0);
        }
        self.raw[start..start + data.len()].copy_from_slice(data);
    }

    /// Number of read calls served, of any kind.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl ImageStorage for MemStorage {
    fn file_size(&mut self, path: &str) -> Result<usize, StorageError> {
        self.files
            .get(path)
            .map(|f| f.len())
            .ok_or(StorageError::NotFound)
    }

    fn read_file(&mut self, path: &str, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.reads += 1;
        let file = self.files.get(path).ok_or(StorageError::NotFound)?;
        buf.copy_from_slice(slice_at(file, offset, buf.len())?);
        Ok(())
    }

    fn read_sectors(&mut self, sector: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        self.reads += 1;
        let offset = sector_offset(sector, buf.len())? as usize;
        buf.copy_from_slice(slice_at(&self.raw, offset, buf.len())?);
        Ok(())
    }
}

/// Files under a host directory, plus an optional raw disk image for sector reads.
pub struct FsStorage {
    root: PathBuf,
    raw: Option<File>,
}

impl FsStorage {
    pub fn new(root: &Path, raw: Option<&Path>) -> Result<Self, std::io::Error> {
        let raw = raw.map(File::open).transpose()?;
        Ok(Self {
            root: root.to_path_buf(),
            raw,
        })
    }

    /// Maps a device path like `sdmc:/ios.img` to a file under the root.
    fn resolve(&self, path: &str) -> PathBuf {
        let path = path.split_once(":/").map(|(_, p)| p).unwrap_or(path);
        self.root.join(path.trim_start_matches('/'))
    }
}

fn io_error(err: std::io::Error) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        ErrorKind::UnexpectedEof => StorageError::OutOfRange,
        _ => StorageError::Device,
    }
}

impl ImageStorage for FsStorage {
    fn file_size(&mut self, path: &str) -> Result<usize, StorageError> {
        let meta = std::fs::metadata(self.resolve(path)).map_err(io_error)?;
        Ok(meta.len() as usize)
    }

    fn read_file(&mut self, path: &str, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let mut file = File::open(self.resolve(path)).map_err(io_error)?;
        file.seek(SeekFrom::Start(offset as u64)).map_err(io_error)?;
        file.read_exact(buf).map_err(io_error)
    }

    fn read_sectors(&mut self, sector: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        let offset = sector_offset(sector, buf.len())?;
        let raw = self.raw.as_mut().ok_or(StorageError::NotFound)?;
        raw.seek(SeekFrom::Start(offset)).map_err(io_error)?;
        raw.read_exact(buf).map_err(io_error)
    }
}
