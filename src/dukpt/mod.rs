// ANSI X9.24-3 2017 DUKPT-AES
//
// The derived-unique-key-per-transaction baseline that HKDS is measured
// against. Derivation follows the standard's Annex B: a per-device initial
// key, a 32-slot intermediate-key register on the client, and stateless
// recomputation from the BDK on the host.

pub mod client;
pub mod derivation;
pub mod server;

pub use client::DukptClient;
pub use server::{DerivedWorkingKey, DukptServer};

use crate::error::{HkdsError, HkdsResult};

/// Initial key id length in bytes.
pub const INITIAL_KEY_ID_SIZE: usize = 8;
/// KSN length: initial key id plus big-endian 32-bit counter.
pub const KSN_SIZE: usize = 12;
/// Fixed PIN-block message length.
pub const MESSAGE_SIZE: usize = 16;
/// Number of intermediate derivation key registers on the client.
pub const NUM_REGISTERS: usize = 32;
/// Maximum number of set counter bits the host will chain through.
pub const MAX_WORK: u32 = 16;
/// Highest usable transaction counter (2^32 - 2^16).
pub const MAX_COUNTER: u32 = 0xFFFF_0000;

/// B.3.1 cipher key types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DukptKeyType {
    /// AES with a 128-bit key
    Aes128,
    /// AES with a 192-bit key
    Aes192,
    /// AES with a 256-bit key
    Aes256,
}

impl DukptKeyType {
    /// Key length in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            DukptKeyType::Aes128 => 16,
            DukptKeyType::Aes192 => 24,
            DukptKeyType::Aes256 => 32,
        }
    }

    /// Key length in bits, as encoded into the derivation data.
    pub const fn key_bits(self) -> u32 {
        match self {
            DukptKeyType::Aes128 => 128,
            DukptKeyType::Aes192 => 192,
            DukptKeyType::Aes256 => 256,
        }
    }

    /// Select the key type from a raw key length.
    pub fn from_key_length(len: usize) -> HkdsResult<Self> {
        match len {
            16 => Ok(DukptKeyType::Aes128),
            24 => Ok(DukptKeyType::Aes192),
            32 => Ok(DukptKeyType::Aes256),
            n => Err(HkdsError::InvalidKey(format!(
                "no AES key type with a {}-byte key",
                n
            ))),
        }
    }
}

/// B.3.1 key usage modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DukptKeyUsage {
    /// Key encryption key (key transport)
    KeyEncryptionKey = 0x0002,
    /// Initial key derivation
    InitialKeyDerivation = 0x0009,
    /// PIN encryption
    PinEncryption = 0x1000,
    /// MAC generation
    MacGeneration = 0x2000,
    /// MAC verification
    MacVerification = 0x2001,
    /// Two-way message authentication
    MacBothWays = 0x2002,
    /// Data encryption
    DataEncrypt = 0x3000,
    /// Data decryption
    DataDecrypt = 0x3001,
    /// Two-way data encryption
    DataBothWays = 0x3002,
    /// Intermediate key derivation
    KeyDerivation = 0x8000,
}

/// B.3.1 derivation purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DukptDerivationPurpose {
    /// Initial key generation
    InitialKey,
    /// Intermediate or working key generation
    DerivationOrWorkingKey,
}

/// Assemble a 12-byte DUKPT KSN: initial key id followed by the big-endian
/// transaction counter.
pub fn build_ksn(initial_key_id: &[u8; INITIAL_KEY_ID_SIZE], counter: u32) -> [u8; KSN_SIZE] {
    let mut ksn = [0u8; KSN_SIZE];
    ksn[..INITIAL_KEY_ID_SIZE].copy_from_slice(initial_key_id);
    ksn[INITIAL_KEY_ID_SIZE..].copy_from_slice(&counter.to_be_bytes());
    ksn
}
