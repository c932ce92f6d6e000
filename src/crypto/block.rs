// src/crypto/block.rs
//
// Single-block AES with FIPS-197 semantics. No mode, no padding: both the
// DUKPT key-derivation tree and the PIN path use the cipher one raw block
// at a time.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::error::{HkdsError, HkdsResult};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// A block cipher driven one block at a time.
///
/// Dispatch is static: the DUKPT and HKDS paths are generic over the
/// implementation, so there are no virtual calls on the hot path.
pub trait BlockCipher: Sized {
    /// Key length in bytes.
    const KEY_SIZE: usize;

    /// Build a key schedule from `key`; the length must equal `KEY_SIZE`.
    fn new(key: &[u8]) -> HkdsResult<Self>;

    /// Encrypt one block in place.
    fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]);

    /// Decrypt one block in place.
    fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]);
}

macro_rules! impl_aes {
    ($name:ident, $inner:ty, $size:expr, $doc:expr) => {
        #[doc = $doc]
        pub struct $name {
            inner: $inner,
        }

        impl BlockCipher for $name {
            const KEY_SIZE: usize = $size;

            fn new(key: &[u8]) -> HkdsResult<Self> {
                if key.len() != Self::KEY_SIZE {
                    return Err(HkdsError::InvalidKey(format!(
                        "expected a {}-byte AES key, got {}",
                        Self::KEY_SIZE,
                        key.len()
                    )));
                }
                Ok(Self {
                    inner: <$inner>::new(GenericArray::from_slice(key)),
                })
            }

            fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
                self.inner
                    .encrypt_block(GenericArray::from_mut_slice(&mut block[..]));
            }

            fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
                self.inner
                    .decrypt_block(GenericArray::from_mut_slice(&mut block[..]));
            }
        }
    };
}

impl_aes!(Aes128, aes::Aes128, 16, "AES with a 128-bit key.");
impl_aes!(Aes192, aes::Aes192, 24, "AES with a 192-bit key.");
impl_aes!(Aes256, aes::Aes256, 32, "AES with a 256-bit key.");

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS-197 Appendix C example vectors
    const PLAINTEXT: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE,
        0xFF,
    ];

    fn key_bytes(len: usize) -> Vec<u8> {
        (0..len as u8).collect()
    }

    #[test]
    fn test_aes128_fips197() {
        let cipher = Aes128::new(&key_bytes(16)).unwrap();
        let mut block = PLAINTEXT;
        cipher.encrypt_block(&mut block);
        assert_eq!(hex::encode(block), "69c4e0d86a7b0430d8cdb78070b4c55a");
        cipher.decrypt_block(&mut block);
        assert_eq!(block, PLAINTEXT);
    }

    #[test]
    fn test_aes192_fips197() {
        let cipher = Aes192::new(&key_bytes(24)).unwrap();
        let mut block = PLAINTEXT;
        cipher.encrypt_block(&mut block);
        assert_eq!(hex::encode(block), "dda97ca4864cdfe06eaf70a0ec0d7191");
        cipher.decrypt_block(&mut block);
        assert_eq!(block, PLAINTEXT);
    }

    #[test]
    fn test_aes256_fips197() {
        let cipher = Aes256::new(&key_bytes(32)).unwrap();
        let mut block = PLAINTEXT;
        cipher.encrypt_block(&mut block);
        assert_eq!(hex::encode(block), "8ea2b7ca516745bfeafc49904b496089");
        cipher.decrypt_block(&mut block);
        assert_eq!(block, PLAINTEXT);
    }

    #[test]
    fn test_rejects_wrong_key_length() {
        assert!(Aes128::new(&key_bytes(15)).is_err());
        assert!(Aes192::new(&key_bytes(16)).is_err());
        assert!(Aes256::new(&key_bytes(33)).is_err());
    }
}
