// src/dukpt/derivation.rs
//
// Derivation-data construction and the AES-based key derivation routine of
// ANSI X9.24-3 §B.4.3. These are pure functions over single-block ECB; both
// the client register machine and the stateless host build on them.

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::ecb;
use crate::error::HkdsResult;

use super::{DukptDerivationPurpose, DukptKeyType, DukptKeyUsage, INITIAL_KEY_ID_SIZE};

/// Derivation data block length.
pub const DERIVATION_DATA_SIZE: usize = 16;

/// Wire encoding of a key usage inside the derivation data. Note that
/// initial-key derivation encodes as 0x8001 regardless of the enumeration
/// value used to select it.
fn usage_tag(usage: DukptKeyUsage) -> [u8; 2] {
    match usage {
        DukptKeyUsage::KeyEncryptionKey => [0x00, 0x02],
        DukptKeyUsage::PinEncryption => [0x10, 0x00],
        DukptKeyUsage::MacGeneration => [0x20, 0x00],
        DukptKeyUsage::MacVerification => [0x20, 0x01],
        DukptKeyUsage::MacBothWays => [0x20, 0x02],
        DukptKeyUsage::DataEncrypt => [0x30, 0x00],
        DukptKeyUsage::DataDecrypt => [0x30, 0x01],
        DukptKeyUsage::DataBothWays => [0x30, 0x02],
        DukptKeyUsage::KeyDerivation => [0x80, 0x00],
        DukptKeyUsage::InitialKeyDerivation => [0x80, 0x01],
    }
}

fn algorithm_indicator(key_type: DukptKeyType) -> [u8; 2] {
    match key_type {
        DukptKeyType::Aes128 => [0x00, 0x02],
        DukptKeyType::Aes192 => [0x00, 0x03],
        DukptKeyType::Aes256 => [0x00, 0x04],
    }
}

/// Build the 16-byte derivation data of §B.4.3.
///
/// For the initial-key purpose the context is the full 8-byte initial key
/// id; otherwise it is the last four id bytes followed by the big-endian
/// transaction counter.
pub fn create_derivation_data(
    purpose: DukptDerivationPurpose,
    usage: DukptKeyUsage,
    key_type: DukptKeyType,
    initial_key_id: &[u8; INITIAL_KEY_ID_SIZE],
    counter: u32,
) -> [u8; DERIVATION_DATA_SIZE] {
    let mut data = [0u8; DERIVATION_DATA_SIZE];
    data[0] = 0x01; // version
    data[1] = 0x01; // key block counter, rewritten per output block
    data[2..4].copy_from_slice(&usage_tag(usage));
    data[4..6].copy_from_slice(&algorithm_indicator(key_type));
    data[6..8].copy_from_slice(&(key_type.key_bits() as u16).to_be_bytes());

    match purpose {
        DukptDerivationPurpose::InitialKey => {
            data[8..16].copy_from_slice(initial_key_id);
        }
        DukptDerivationPurpose::DerivationOrWorkingKey => {
            data[8..12].copy_from_slice(&initial_key_id[4..8]);
            data[12..16].copy_from_slice(&counter.to_be_bytes());
        }
    }

    data
}

/// Derive a key of `key_type` length from `derivation_key`.
///
/// The output is produced in AES blocks; block `i` sets `data[1] = i` and
/// encrypts the data under the derivation key. The data block is mutated in
/// place and left holding the final block counter, which the host exposes
/// for vector validation.
pub fn derive_key(
    derivation_key: &[u8],
    key_type: DukptKeyType,
    data: &mut [u8; DERIVATION_DATA_SIZE],
) -> HkdsResult<Zeroizing<Vec<u8>>> {
    let blocks = (key_type.key_bits() as usize + 127) / 128;
    let mut buffer = Zeroizing::new([0u8; 32]);

    for i in 1..=blocks {
        data[1] = i as u8;
        let mut block = ecb::encrypt(derivation_key, data)?;
        buffer[(i - 1) * 16..i * 16].copy_from_slice(&block);
        block.zeroize();
    }

    Ok(Zeroizing::new(buffer[..key_type.key_size()].to_vec()))
}

/// Derive a device's initial key from the BDK (§B.5).
pub fn derive_initial_key(
    bdk: &[u8],
    key_type: DukptKeyType,
    initial_key_id: &[u8; INITIAL_KEY_ID_SIZE],
) -> HkdsResult<Zeroizing<Vec<u8>>> {
    let mut data = create_derivation_data(
        DukptDerivationPurpose::InitialKey,
        DukptKeyUsage::InitialKeyDerivation,
        key_type,
        initial_key_id,
        0,
    );
    derive_key(bdk, key_type, &mut data)
}
