// Licensed under the Apache-2.0 license

use ancast_image::{padded_len, PatchHeader, PatchRecordHeader, PATCH_MAGIC};
use anyhow::{bail, Result};
use zerocopy::IntoBytes;

/// Builds `PTCH` boot patch files.
#[derive(Clone, Default)]
pub struct PatchBuilder {
    records: Vec<(u32, Vec<u8>)>,
}

impl PatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `data.len()` bytes of the body at `offset`.
    pub fn record(mut self, offset: u32, data: &[u8]) -> Self {
        self.records.push((offset, data.to_vec()));
        self
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let Ok(count) = u32::try_from(self.records.len()) else {
            bail!("too many patch records");
        };
        let header = PatchHeader {
            magic: PATCH_MAGIC,
            record_count: count.into(),
        };
        let mut out = header.as_bytes().to_vec();
        for (offset, data) in &self.records {
            let Ok(length) = u32::try_from(data.len()) else {
                bail!("patch record of {} bytes is too large", data.len());
            };
            let record = PatchRecordHeader {
                offset: (*offset).into(),
                length: length.into(),
            };
            out.extend_from_slice(record.as_bytes());
            out.extend_from_slice(data);
            out.resize(out.len() + padded_len(data.len()) - data.len(), 0);
        }
        Ok(out)
    }
}
