// Licensed under the Apache-2.0 license

use ancast_image::AncastHeader;
use sha1::{Digest, Sha1};

/// Verifies the integrity of a decrypted Ancast body against its header.
///
/// The loader calls this after decryption and before the body is handed out or
/// patched. Implementations may check signatures, hashes or any other policy.
///
/// Parameters:
///   header:  Parsed container header
///   body:    Decrypted body, exactly `header.body_size()` bytes
///
/// Returns:
///   true if every required check passes.
///   false on any failure. The loader then discards the body.
pub trait ImageVerifier {
    fn verify(&self, header: &AncastHeader, body: &[u8]) -> bool;
}

/// Compares the SHA-1 of the decrypted body with the hash in the info header.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyHashVerifier;

impl ImageVerifier for BodyHashVerifier {
    fn verify(&self, header: &AncastHeader, body: &[u8]) -> bool {
        if body.len() != header.body_size() {
            return false;
        }
        let digest = Sha1::digest(body);
        digest.as_slice() == header.info.body_hash
    }
}
