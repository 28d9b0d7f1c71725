// Licensed under the Apache-2.0 license

use ancast_image::PatchRecords;
use latte_error::{BootError, BootResult};
use log::debug;

/// Applies the `PTCH` records in `patch` to `body`.
///
/// All records are bounds-checked before the first byte is written, so a bad
/// patch leaves `body` untouched. Returns the number of records applied.
pub fn apply_patch(body: &mut [u8], patch: &[u8]) -> BootResult<usize> {
    for record in PatchRecords::parse(patch)? {
        let record = record?;
        let end = record
            .offset
            .checked_add(record.data.len())
            .ok_or(BootError::InvalidPatch)?;
        if end > body.len() {
            return Err(BootError::InvalidPatch);
        }
    }

    let mut applied = 0;
    for record in PatchRecords::parse(patch)? {
        let record = record?;
        debug!(
            "[latte-rom] patch {:#x} bytes at {:#x}",
            record.data.len(),
            record.offset
        );
        body[record.offset..record.offset + record.data.len()].copy_from_slice(record.data);
        applied += 1;
    }
    Ok(applied)
}
