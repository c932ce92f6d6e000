// src/hkds/master_key.rs
//
// The HKDS master key structure (MDK): the base derivation key, the secret
// token key, and a public key id. Created once per key ecosystem, held only
// by the server, never transmitted.

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::keccak::ShakeMode;
use crate::crypto::random::RandomSource;
use crate::error::{HkdsError, HkdsResult};

use super::KID_SIZE;

/// Master derivation key structure. Serialized as `KID || BDK || STK`.
#[derive(Clone)]
pub struct MasterKey {
    bdk: Zeroizing<Vec<u8>>,
    stk: Zeroizing<Vec<u8>>,
    kid: [u8; KID_SIZE],
}

impl MasterKey {
    /// Build a master key from existing material. The two root keys must
    /// share one of the SHAKE key classes (16, 32, or 64 bytes).
    pub fn new(bdk: &[u8], stk: &[u8], kid: &[u8]) -> HkdsResult<Self> {
        check_key_class(bdk.len())?;
        if stk.len() != bdk.len() {
            return Err(HkdsError::InvalidKey(
                "the base key and token key must be the same length".to_string(),
            ));
        }
        if kid.len() != KID_SIZE {
            return Err(HkdsError::InvalidSize(format!(
                "key id must be {} bytes, got {}",
                KID_SIZE,
                kid.len()
            )));
        }
        Ok(MasterKey {
            bdk: Zeroizing::new(bdk.to_vec()),
            stk: Zeroizing::new(stk.to_vec()),
            kid: kid.try_into().expect("length checked"),
        })
    }

    /// Generate a fresh master key for the given PRF mode.
    pub fn generate(
        mode: ShakeMode,
        rng: &mut dyn RandomSource,
        kid: &[u8],
    ) -> HkdsResult<Self> {
        let mut bdk = Zeroizing::new(vec![0u8; mode.key_size()]);
        let mut stk = Zeroizing::new(vec![0u8; mode.key_size()]);
        rng.fill(&mut bdk)?;
        rng.fill(&mut stk)?;
        MasterKey::new(&bdk, &stk, kid)
    }

    /// The base derivation key.
    pub fn bdk(&self) -> &[u8] {
        &self.bdk
    }

    /// The secret token key.
    pub fn stk(&self) -> &[u8] {
        &self.stk
    }

    /// The public key id.
    pub fn kid(&self) -> &[u8; KID_SIZE] {
        &self.kid
    }

    /// Serialize to `KID || BDK || STK`. The output contains the root
    /// secrets; the buffer zeroizes itself on drop.
    pub fn serialize(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(
            KID_SIZE + self.bdk.len() + self.stk.len(),
        ));
        out.extend_from_slice(&self.kid);
        out.extend_from_slice(&self.bdk);
        out.extend_from_slice(&self.stk);
        out
    }

    /// Rebuild a master key from its serialized form; the key class is
    /// recovered from the total length.
    pub fn deserialize(bytes: &[u8]) -> HkdsResult<Self> {
        if bytes.len() <= KID_SIZE || (bytes.len() - KID_SIZE) % 2 != 0 {
            return Err(HkdsError::InvalidSize(format!(
                "serialized master key has invalid length {}",
                bytes.len()
            )));
        }
        let key_len = (bytes.len() - KID_SIZE) / 2;
        check_key_class(key_len)?;
        MasterKey::new(
            &bytes[KID_SIZE..KID_SIZE + key_len],
            &bytes[KID_SIZE + key_len..],
            &bytes[..KID_SIZE],
        )
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.kid.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterKey(kid={}, [REDACTED])", hex::encode(self.kid))
    }
}

fn check_key_class(len: usize) -> HkdsResult<()> {
    match len {
        16 | 32 | 64 => Ok(()),
        n => Err(HkdsError::InvalidKey(format!(
            "root keys must be 16, 32, or 64 bytes, got {}",
            n
        ))),
    }
}
