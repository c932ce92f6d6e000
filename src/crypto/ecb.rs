// src/crypto/ecb.rs
//
// Stateless one-block ECB over the AES key sizes the protocols allow. The
// key length selects the cipher at run time, which is how the DUKPT paths
// work: the BDK length decides the whole derivation tree.

use crate::crypto::block::{Aes128, Aes192, Aes256, BlockCipher, BLOCK_SIZE};
use crate::error::{HkdsError, HkdsResult};

fn encrypt_with<C: BlockCipher>(key: &[u8], block: &[u8; BLOCK_SIZE]) -> HkdsResult<[u8; BLOCK_SIZE]> {
    let cipher = C::new(key)?;
    let mut out = *block;
    cipher.encrypt_block(&mut out);
    Ok(out)
}

fn decrypt_with<C: BlockCipher>(key: &[u8], block: &[u8; BLOCK_SIZE]) -> HkdsResult<[u8; BLOCK_SIZE]> {
    let cipher = C::new(key)?;
    let mut out = *block;
    cipher.decrypt_block(&mut out);
    Ok(out)
}

/// Encrypt one block; the key length (16/24/32) picks the AES variant.
pub fn encrypt(key: &[u8], block: &[u8; BLOCK_SIZE]) -> HkdsResult<[u8; BLOCK_SIZE]> {
    match key.len() {
        16 => encrypt_with::<Aes128>(key, block),
        24 => encrypt_with::<Aes192>(key, block),
        32 => encrypt_with::<Aes256>(key, block),
        n => Err(HkdsError::InvalidKey(format!(
            "unsupported AES key length {}",
            n
        ))),
    }
}

/// Decrypt one block; the key length (16/24/32) picks the AES variant.
pub fn decrypt(key: &[u8], block: &[u8; BLOCK_SIZE]) -> HkdsResult<[u8; BLOCK_SIZE]> {
    match key.len() {
        16 => decrypt_with::<Aes128>(key, block),
        24 => decrypt_with::<Aes192>(key, block),
        32 => decrypt_with::<Aes256>(key, block),
        n => Err(HkdsError::InvalidKey(format!(
            "unsupported AES key length {}",
            n
        ))),
    }
}
