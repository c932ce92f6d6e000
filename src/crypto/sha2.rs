// src/crypto/sha2.rs
//
// SHA-2 digests and HMAC-SHA-256, the authentication baseline of the DUKPT
// subsystem. HKDS authenticates with KMAC instead (see crypto::keccak).

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

use crate::error::{HkdsError, HkdsResult};

/// HMAC-SHA-256 tag size in bytes. DUKPT appends the full tag.
pub const HMAC_TAG_SIZE: usize = 32;

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// One-shot SHA-512.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha512::digest(data));
    out
}

/// HMAC-SHA-256 over the concatenation of `parts`.
///
/// Keys of any length up to the SHA-256 block size are accepted; the DUKPT
/// working keys are 16 or 32 bytes.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> HkdsResult<[u8; HMAC_TAG_SIZE]> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|_| HkdsError::InvalidKey("HMAC-SHA-256 rejected the key".to_string()))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().into())
}
