// Licensed under the Apache-2.0 license

//! Boot patch files: a list of byte ranges to overwrite in a loaded body.

use core::mem::size_of;

use latte_error::BootError;
use zerocopy::byteorder::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const PATCH_MAGIC: [u8; 4] = *b"PTCH";

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PatchHeader {
    pub magic: [u8; 4],
    pub record_count: U32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PatchRecordHeader {
    /// Offset into the image body.
    pub offset: U32,
    pub length: U32,
}

/// One overwrite: `data` goes to `offset` in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRecord<'a> {
    pub offset: usize,
    pub data: &'a [u8],
}

/// Record payloads are padded so the next record header stays word aligned.
pub const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

pub struct PatchRecords<'a> {
    rest: &'a [u8],
    remaining: u32,
}

impl<'a> PatchRecords<'a> {
    pub fn parse(patch: &'a [u8]) -> Result<Self, BootError> {
        let (header, rest) =
            PatchHeader::ref_from_prefix(patch).map_err(|_| BootError::InvalidPatch)?;
        if header.magic != PATCH_MAGIC {
            return Err(BootError::InvalidPatch);
        }
        Ok(Self {
            rest,
            remaining: header.record_count.get(),
        })
    }

    pub fn len(&self) -> usize {
        self.remaining as usize
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }
}

impl<'a> Iterator for PatchRecords<'a> {
    type Item = Result<PatchRecord<'a>, BootError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let Ok((record, rest)) = PatchRecordHeader::ref_from_prefix(self.rest) else {
            self.remaining = 0;
            return Some(Err(BootError::InvalidPatch));
        };
        let len = record.length.get() as usize;
        let Some(data) = rest.get(..len) else {
            self.remaining = 0;
            return Some(Err(BootError::InvalidPatch));
        };
        self.rest = rest.get(padded_len(len)..).unwrap_or(&[]);
        Some(Ok(PatchRecord {
            offset: record.offset.get() as usize,
            data,
        }))
    }
}

/// Size in bytes of an encoded patch holding records of the given lengths.
pub fn encoded_patch_len(record_lens: impl IntoIterator<Item = usize>) -> usize {
    size_of::<PatchHeader>()
        + record_lens
            .into_iter()
            .map(|len| size_of::<PatchRecordHeader>() + padded_len(len))
            .sum::<usize>()
}
