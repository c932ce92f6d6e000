// src/crypto/random.rs
//
// Randomness entry points. The core consumes randomness only for master-key
// generation; per-transaction keys are always derived, never sampled.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::HkdsResult;

/// A source of cryptographic-quality randomness.
///
/// Implementations may wrap a DRBG, an HSM, or the operating system. The
/// trait exists so that key generation can be driven from a caller-supplied
/// generator in tests and embedded deployments.
pub trait RandomSource {
    /// Fill `buf` with random bytes.
    fn fill(&mut self, buf: &mut [u8]) -> HkdsResult<()>;
}

/// Operating-system random source.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn fill(&mut self, buf: &mut [u8]) -> HkdsResult<()> {
        OsRng.fill_bytes(buf);
        Ok(())
    }
}
