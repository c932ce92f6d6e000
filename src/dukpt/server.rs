// src/dukpt/server.rs
//
// The DUKPT host side. Stateless: every working key is recomputed from the
// BDK and the KSN, chaining one AES key derivation per set counter bit from
// the most significant bit down. Host cost therefore grows with the
// population count of the counter, which is the property HKDS removes.

use zeroize::Zeroizing;

use crate::crypto::constant_time::ct_equal;
use crate::crypto::ecb;
use crate::crypto::sha2::{hmac_sha256, sha256, HMAC_TAG_SIZE};
use crate::error::{HkdsError, HkdsResult};

use super::derivation::{
    create_derivation_data, derive_initial_key, derive_key, DERIVATION_DATA_SIZE,
};
use super::{
    DukptDerivationPurpose, DukptKeyType, DukptKeyUsage, INITIAL_KEY_ID_SIZE, KSN_SIZE,
    MESSAGE_SIZE,
};

/// The outcome of a host-side working-key derivation: the final derivation
/// key of the chain, the derivation data of the last step, and the working
/// key itself. All three are exposed so the official vector triples can be
/// checked directly.
pub struct DerivedWorkingKey {
    /// Final intermediate derivation key of the counter chain.
    pub derivation_key: Zeroizing<Vec<u8>>,
    /// Derivation data of the usage step, as left by the last key block.
    pub derivation_data: [u8; DERIVATION_DATA_SIZE],
    /// The per-transaction working key.
    pub working_key: Zeroizing<Vec<u8>>,
}

/// Stateless DUKPT host. All operations are associated functions of
/// `(BDK, KSN, ciphertext)`; concurrent calls share nothing.
pub struct DukptServer;

impl DukptServer {
    /// Recompute the working key for `(initial_key_id, counter)` under the
    /// given usage (§B.5 host algorithm).
    pub fn derive_working_key(
        bdk: &[u8],
        usage: DukptKeyUsage,
        key_type: DukptKeyType,
        initial_key_id: &[u8; INITIAL_KEY_ID_SIZE],
        counter: u32,
    ) -> HkdsResult<DerivedWorkingKey> {
        let mut key = derive_initial_key(bdk, key_type, initial_key_id)?;
        let mut chained = 0u32;
        let mut mask = 0x8000_0000u32;

        while mask > 0 {
            if counter & mask != 0 {
                chained |= mask;
                let mut data = create_derivation_data(
                    DukptDerivationPurpose::DerivationOrWorkingKey,
                    DukptKeyUsage::KeyDerivation,
                    key_type,
                    initial_key_id,
                    chained,
                );
                key = derive_key(&key, key_type, &mut data)?;
            }
            mask >>= 1;
        }

        let mut data = create_derivation_data(
            DukptDerivationPurpose::DerivationOrWorkingKey,
            usage,
            key_type,
            initial_key_id,
            counter,
        );
        let working_key = derive_key(&key, key_type, &mut data)?;

        Ok(DerivedWorkingKey {
            derivation_key: key,
            derivation_data: data,
            working_key,
        })
    }

    /// Decrypt a 16-byte PIN block. The KSN carries the initial key id and
    /// the big-endian counter of the transaction that produced it.
    pub fn decrypt(bdk: &[u8], ksn: &[u8], ciphertext: &[u8]) -> HkdsResult<[u8; MESSAGE_SIZE]> {
        if ciphertext.len() != MESSAGE_SIZE {
            return Err(HkdsError::InvalidSize(format!(
                "ciphertext must be {} bytes, got {}",
                MESSAGE_SIZE,
                ciphertext.len()
            )));
        }
        let (id, counter) = parse_ksn(ksn)?;
        let key_type = DukptKeyType::from_key_length(bdk.len())?;

        let derived =
            Self::derive_working_key(bdk, DukptKeyUsage::PinEncryption, key_type, &id, counter)?;
        let block: [u8; MESSAGE_SIZE] = ciphertext.try_into().expect("length checked");
        ecb::decrypt(&derived.working_key, &block)
    }

    /// Verify a ciphertext's HMAC-SHA-256 tag, then decrypt. The MAC key is
    /// generated at counter + 1 with the two-way authentication usage; the
    /// tag covers the additional data followed by the ciphertext. The check
    /// runs before any decryption.
    pub fn decrypt_verify(
        bdk: &[u8],
        ksn: &[u8],
        ciphertext: &[u8],
        additional_data: &[u8],
    ) -> HkdsResult<[u8; MESSAGE_SIZE]> {
        if ciphertext.len() != MESSAGE_SIZE + HMAC_TAG_SIZE {
            return Err(HkdsError::InvalidSize(format!(
                "authenticated ciphertext must be {} bytes, got {}",
                MESSAGE_SIZE + HMAC_TAG_SIZE,
                ciphertext.len()
            )));
        }
        let (id, counter) = parse_ksn(ksn)?;
        let key_type = DukptKeyType::from_key_length(bdk.len())?;

        let mac = Self::derive_working_key(
            bdk,
            DukptKeyUsage::MacBothWays,
            key_type,
            &id,
            counter.wrapping_add(1),
        )?;
        let tag = hmac_sha256(
            &mac.working_key,
            &[additional_data, &ciphertext[..MESSAGE_SIZE]],
        )?;

        if !ct_equal(&tag, &ciphertext[MESSAGE_SIZE..]) {
            tracing::warn!(ksn = %hex::encode(ksn), "DUKPT ciphertext failed authentication");
            return Err(HkdsError::AuthenticationFailed);
        }

        Self::decrypt(bdk, ksn, &ciphertext[..MESSAGE_SIZE])
    }

    /// Wrap a replacement initial key for transport to a device (the host
    /// side of the client's `update_initial_key`). The payload is the new
    /// key zero-padded to 32 bytes plus a 16-byte SHA-256 checksum of the
    /// padded field, encrypted block-wise under a key-encryption working key
    /// generated at the device's current counter.
    pub fn encrypt_initial_key(
        bdk: &[u8],
        ksn: &[u8],
        new_initial_key: &[u8],
    ) -> HkdsResult<[u8; 48]> {
        if new_initial_key.len() != 16
            && new_initial_key.len() != 24
            && new_initial_key.len() != 32
        {
            return Err(HkdsError::InvalidKey(format!(
                "replacement initial key has invalid length {}",
                new_initial_key.len()
            )));
        }
        let (id, counter) = parse_ksn(ksn)?;
        let key_type = DukptKeyType::from_key_length(bdk.len())?;
        let kek = Self::derive_working_key(
            bdk,
            DukptKeyUsage::KeyEncryptionKey,
            key_type,
            &id,
            counter,
        )?;

        let mut payload = Zeroizing::new([0u8; 48]);
        payload[..new_initial_key.len()].copy_from_slice(new_initial_key);
        let checksum = sha256(&payload[..32]);
        payload[32..].copy_from_slice(&checksum[..16]);

        let mut wrapped = [0u8; 48];
        for (chunk, out) in payload.chunks_exact(16).zip(wrapped.chunks_exact_mut(16)) {
            let block: [u8; 16] = chunk.try_into().expect("exact chunks");
            out.copy_from_slice(&ecb::encrypt(&kek.working_key, &block)?);
        }
        Ok(wrapped)
    }
}

fn parse_ksn(ksn: &[u8]) -> HkdsResult<([u8; INITIAL_KEY_ID_SIZE], u32)> {
    if ksn.len() != KSN_SIZE {
        return Err(HkdsError::InvalidSize(format!(
            "KSN must be {} bytes, got {}",
            KSN_SIZE,
            ksn.len()
        )));
    }
    let id: [u8; INITIAL_KEY_ID_SIZE] = ksn[..INITIAL_KEY_ID_SIZE]
        .try_into()
        .expect("length checked");
    let counter = u32::from_be_bytes(ksn[INITIAL_KEY_ID_SIZE..].try_into().expect("length checked"));
    Ok((id, counter))
}
