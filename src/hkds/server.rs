// src/hkds/server.rs
//
// The HKDS server. Stateless per device: every call recomputes the embedded
// key, the epoch token, and the transaction keys from the master key and
// the client's KSN. This is what bounds the host cost to a fixed number of
// SHAKE calls regardless of the counter value.

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::constant_time::ct_equal;
use crate::crypto::keccak::ShakeMode;
use crate::crypto::random::RandomSource;
use crate::error::{HkdsError, HkdsResult};

use super::derive;
use super::master_key::MasterKey;
use super::{CACHE_SIZE, DEVICE_ID_SIZE, KSN_SIZE, MESSAGE_SIZE, TAG_SIZE};

/// HKDS server bound to one master key and one client KSN. Holds no
/// per-device state: concurrent instances over the same master key are
/// independent.
pub struct HkdsServer<'a> {
    mdk: &'a MasterKey,
    device_id: [u8; DEVICE_ID_SIZE],
    counter: u32,
    mode: ShakeMode,
}

impl<'a> HkdsServer<'a> {
    /// Bind a server instance to a client's KSN. The PRF mode is read from
    /// the device-id portion of the KSN and must match the master key's
    /// key class.
    pub fn new(mdk: &'a MasterKey, ksn: &[u8]) -> HkdsResult<Self> {
        let (device_id, counter, mode) = parse_ksn(ksn)?;
        if mdk.bdk().len() != mode.key_size() {
            return Err(HkdsError::InvalidKey(format!(
                "master key class ({} bytes) does not match the device mode ({} bytes)",
                mdk.bdk().len(),
                mode.key_size()
            )));
        }
        Ok(HkdsServer {
            mdk,
            device_id,
            counter,
            mode,
        })
    }

    /// The client KSN this instance is bound to.
    pub fn ksn(&self) -> [u8; KSN_SIZE] {
        derive::build_ksn(&self.device_id, self.counter)
    }

    /// Re-bind to a new KSN, e.g. the next transaction of the same device.
    pub fn set_ksn(&mut self, ksn: &[u8]) -> HkdsResult<()> {
        let (device_id, counter, mode) = parse_ksn(ksn)?;
        if self.mdk.bdk().len() != mode.key_size() {
            return Err(HkdsError::InvalidKey(
                "master key class does not match the device mode".to_string(),
            ));
        }
        self.device_id = device_id;
        self.counter = counter;
        self.mode = mode;
        Ok(())
    }

    /// The number of keys in a full client cache.
    pub fn key_cache_size(&self) -> usize {
        CACHE_SIZE
    }

    /// Issue the token for the client's current cache epoch, masked under
    /// the SHAKE stream only the holder of the embedded key can reproduce.
    pub fn encrypt_token(&self) -> Vec<u8> {
        let edk = derive::generate_edk(self.mode, self.mdk.bdk(), &self.device_id);
        let mut token = derive::generate_token(
            self.mode,
            self.mdk.stk(),
            self.mdk.kid(),
            &self.device_id,
            self.counter,
        );
        let pad = derive::token_pad(self.mode, &edk, &self.device_id, self.counter);
        for (t, p) in token.iter_mut().zip(pad.iter()) {
            *t ^= p;
        }

        tracing::debug!(
            device = %hex::encode(self.device_id),
            epoch = derive::epoch(self.counter),
            "token issued"
        );
        token.to_vec()
    }

    /// Decrypt a client message at the bound KSN.
    pub fn decrypt(&self, ciphertext: &[u8]) -> HkdsResult<[u8; MESSAGE_SIZE]> {
        if ciphertext.len() != MESSAGE_SIZE {
            return Err(HkdsError::InvalidSize(format!(
                "ciphertext must be {} bytes, got {}",
                MESSAGE_SIZE,
                ciphertext.len()
            )));
        }

        let index = self.counter as usize % CACHE_SIZE;
        let cache = self.derive_client_cache();
        let mut message = [0u8; MESSAGE_SIZE];
        for (m, (c, k)) in message
            .iter_mut()
            .zip(ciphertext.iter().zip(&cache[index]))
        {
            *m = c ^ k;
        }
        Ok(message)
    }

    /// Verify a ciphertext's KMAC tag, then decrypt. The tag is checked in
    /// constant time before any plaintext is produced.
    pub fn decrypt_verify(
        &self,
        ciphertext: &[u8],
        additional_data: &[u8],
    ) -> HkdsResult<[u8; MESSAGE_SIZE]> {
        if ciphertext.len() != MESSAGE_SIZE + TAG_SIZE {
            return Err(HkdsError::InvalidSize(format!(
                "authenticated ciphertext must be {} bytes, got {}",
                MESSAGE_SIZE + TAG_SIZE,
                ciphertext.len()
            )));
        }
        let index = self.counter as usize % CACHE_SIZE;
        if index + 1 >= CACHE_SIZE {
            return Err(HkdsError::InvalidState(
                "authenticated pair would straddle a cache boundary".to_string(),
            ));
        }

        let cache = self.derive_client_cache();
        let (body, tag) = ciphertext.split_at(MESSAGE_SIZE);
        let expected = derive::kmac_tag(self.mode, &cache[index + 1], body, additional_data);

        if !ct_equal(&expected, tag) {
            tracing::warn!(
                device = %hex::encode(self.device_id),
                counter = self.counter,
                "HKDS ciphertext failed authentication"
            );
            return Err(HkdsError::AuthenticationFailed);
        }

        let mut message = [0u8; MESSAGE_SIZE];
        for (m, (c, k)) in message.iter_mut().zip(body.iter().zip(&cache[index])) {
            *m = c ^ k;
        }
        Ok(message)
    }

    /// Generate a fresh master key structure for a key ecosystem.
    pub fn generate_mdk(
        mode: ShakeMode,
        rng: &mut dyn RandomSource,
        kid: &[u8],
    ) -> HkdsResult<MasterKey> {
        MasterKey::generate(mode, rng, kid)
    }

    /// Derive a device's embedded key at personalization time.
    pub fn generate_edk(bdk: &[u8], device_id: &[u8]) -> HkdsResult<Zeroizing<Vec<u8>>> {
        let mode = derive::mode_from_device_id(device_id)?;
        if bdk.len() != mode.key_size() {
            return Err(HkdsError::InvalidKey(format!(
                "base key must be {} bytes for this mode, got {}",
                mode.key_size(),
                bdk.len()
            )));
        }
        let device_id: [u8; DEVICE_ID_SIZE] = device_id.try_into().expect("length checked");
        Ok(derive::generate_edk(mode, bdk, &device_id))
    }

    /// Recompute the client's cache for the epoch containing the bound
    /// counter.
    fn derive_client_cache(&self) -> ClientCache {
        let edk = derive::generate_edk(self.mode, self.mdk.bdk(), &self.device_id);
        let token = derive::generate_token(
            self.mode,
            self.mdk.stk(),
            self.mdk.kid(),
            &self.device_id,
            self.counter,
        );
        ClientCache(derive::derive_cache(
            self.mode,
            &edk,
            &token,
            &self.device_id,
            self.counter,
        ))
    }
}

impl std::fmt::Debug for HkdsServer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HkdsServer(device={}, counter={})",
            hex::encode(self.device_id),
            self.counter
        )
    }
}

/// A recomputed client cache; wiped as soon as the server call returns.
struct ClientCache([[u8; MESSAGE_SIZE]; CACHE_SIZE]);

impl std::ops::Index<usize> for ClientCache {
    type Output = [u8; MESSAGE_SIZE];
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl Drop for ClientCache {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

fn parse_ksn(ksn: &[u8]) -> HkdsResult<([u8; DEVICE_ID_SIZE], u32, ShakeMode)> {
    if ksn.len() != KSN_SIZE {
        return Err(HkdsError::InvalidSize(format!(
            "KSN must be {} bytes, got {}",
            KSN_SIZE,
            ksn.len()
        )));
    }
    let mode = derive::mode_from_device_id(&ksn[..DEVICE_ID_SIZE])?;
    let device_id: [u8; DEVICE_ID_SIZE] = ksn[..DEVICE_ID_SIZE].try_into().expect("length checked");
    let counter = u32::from_le_bytes(ksn[DEVICE_ID_SIZE..].try_into().expect("length checked"));
    Ok((device_id, counter, mode))
}
