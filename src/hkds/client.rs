// src/hkds/client.rs
//
// The HKDS terminal. The device holds only its embedded key, its identity,
// a transaction counter, and the current transaction-key cache. The cache
// is filled from a server-issued token and drained one key per message (two
// in authenticated mode); a consumed slot is wiped at use, so completed
// transactions cannot be reconstructed from a captured state.

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::keccak::ShakeMode;
use crate::error::{HkdsError, HkdsResult};

use super::derive::{self, build_ksn};
use super::{CACHE_SIZE, DEVICE_ID_SIZE, KSN_SIZE, MESSAGE_SIZE, TAG_SIZE};

/// Per-device HKDS client. Not thread safe; a device owns one serialized
/// stream of transactions.
pub struct HkdsClient {
    edk: Vec<u8>,
    device_id: [u8; DEVICE_ID_SIZE],
    mode: ShakeMode,
    counter: u32,
    cache: [[u8; MESSAGE_SIZE]; CACHE_SIZE],
    count: usize,
}

impl HkdsClient {
    /// Initialize a client from its embedded device key and identity. The
    /// PRF mode is read from the device id; the key length must match it.
    pub fn new(edk: &[u8], device_id: &[u8]) -> HkdsResult<Self> {
        let mode = derive::mode_from_device_id(device_id)?;
        if edk.len() != mode.key_size() {
            return Err(HkdsError::InvalidKey(format!(
                "embedded key must be {} bytes for this mode, got {}",
                mode.key_size(),
                edk.len()
            )));
        }
        Ok(HkdsClient {
            edk: edk.to_vec(),
            device_id: device_id.try_into().expect("length checked"),
            mode,
            counter: 0,
            cache: [[0u8; MESSAGE_SIZE]; CACHE_SIZE],
            count: 0,
        })
    }

    /// The current key serial number: device id plus transaction counter.
    pub fn ksn(&self) -> [u8; KSN_SIZE] {
        build_ksn(&self.device_id, self.counter)
    }

    /// The PRF mode this device runs.
    pub fn mode(&self) -> ShakeMode {
        self.mode
    }

    /// The number of keys in a full cache.
    pub fn key_cache_size(&self) -> usize {
        CACHE_SIZE
    }

    /// The number of transaction keys still available.
    pub fn key_count(&self) -> usize {
        self.count
    }

    /// Unmask a token received from the server. The pad is a SHAKE stream
    /// over the embedded key and the current cache epoch, so only this
    /// device in this epoch recovers the token the server derived.
    pub fn decrypt_token(&self, encrypted_token: &[u8]) -> HkdsResult<Zeroizing<Vec<u8>>> {
        if encrypted_token.len() != self.mode.key_size() {
            return Err(HkdsError::InvalidSize(format!(
                "encrypted token must be {} bytes, got {}",
                self.mode.key_size(),
                encrypted_token.len()
            )));
        }
        let mut token = derive::token_pad(self.mode, &self.edk, &self.device_id, self.counter);
        for (t, c) in token.iter_mut().zip(encrypted_token) {
            *t ^= c;
        }
        Ok(token)
    }

    /// Derive the transaction-key cache for the current epoch from a plain
    /// token. Slots the counter has already passed within the epoch are
    /// discarded so the device stays aligned with the server's indexing.
    pub fn generate_key_cache(&mut self, token: &[u8]) -> HkdsResult<()> {
        if token.len() != self.mode.key_size() {
            return Err(HkdsError::InvalidSize(format!(
                "token must be {} bytes, got {}",
                self.mode.key_size(),
                token.len()
            )));
        }

        self.cache.zeroize();
        self.cache = derive::derive_cache(self.mode, &self.edk, token, &self.device_id, self.counter);

        let used = self.counter as usize % CACHE_SIZE;
        for slot in self.cache.iter_mut().take(used) {
            slot.zeroize();
        }
        self.count = CACHE_SIZE - used;

        tracing::debug!(
            device = %hex::encode(self.device_id),
            epoch = derive::epoch(self.counter),
            keys = self.count,
            "transaction key cache generated"
        );
        Ok(())
    }

    /// Encrypt a 16-byte message with the next transaction key. The used
    /// slot is wiped and the counter advances; when the cache runs out the
    /// caller must fetch a fresh token.
    pub fn encrypt(&mut self, message: &[u8]) -> HkdsResult<[u8; MESSAGE_SIZE]> {
        let message = check_message(message)?;
        if self.count == 0 {
            return Err(HkdsError::KeyExhausted);
        }
        let next = self
            .counter
            .checked_add(1)
            .ok_or(HkdsError::KeyExhausted)?;

        let index = self.counter as usize % CACHE_SIZE;
        let mut ciphertext = message;
        for (c, k) in ciphertext.iter_mut().zip(&self.cache[index]) {
            *c ^= k;
        }

        self.cache[index].zeroize();
        self.counter = next;
        self.count -= 1;
        Ok(ciphertext)
    }

    /// Encrypt a message and authenticate the ciphertext with KMAC. Two
    /// cache slots are consumed: one to encrypt, the next to key the MAC.
    /// The tag covers the ciphertext followed by the additional data.
    pub fn encrypt_authenticate(
        &mut self,
        message: &[u8],
        additional_data: &[u8],
    ) -> HkdsResult<[u8; MESSAGE_SIZE + TAG_SIZE]> {
        let message = check_message(message)?;
        if self.count < 2 {
            return Err(HkdsError::KeyExhausted);
        }
        let next = self
            .counter
            .checked_add(2)
            .ok_or(HkdsError::KeyExhausted)?;

        let index = self.counter as usize % CACHE_SIZE;
        let mut ciphertext = message;
        for (c, k) in ciphertext.iter_mut().zip(&self.cache[index]) {
            *c ^= k;
        }
        let tag = derive::kmac_tag(self.mode, &self.cache[index + 1], &ciphertext, additional_data);

        self.cache[index].zeroize();
        self.cache[index + 1].zeroize();
        self.counter = next;
        self.count -= 2;

        let mut out = [0u8; MESSAGE_SIZE + TAG_SIZE];
        out[..MESSAGE_SIZE].copy_from_slice(&ciphertext);
        out[MESSAGE_SIZE..].copy_from_slice(&tag);
        Ok(out)
    }
}

impl Drop for HkdsClient {
    fn drop(&mut self) {
        self.edk.zeroize();
        self.cache.zeroize();
    }
}

impl std::fmt::Debug for HkdsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HkdsClient(device={}, counter={}, keys={}, [REDACTED])",
            hex::encode(self.device_id),
            self.counter,
            self.count
        )
    }
}

fn check_message(message: &[u8]) -> HkdsResult<[u8; MESSAGE_SIZE]> {
    message.try_into().map_err(|_| {
        HkdsError::InvalidSize(format!(
            "message must be {} bytes, got {}",
            MESSAGE_SIZE,
            message.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DID: [u8; DEVICE_ID_SIZE] = [
        0x01, 0x00, 0x00, 0x00, 0x10, 0x09, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00,
    ];

    fn cached_client() -> HkdsClient {
        let mut client = HkdsClient::new(&[0x42; 16], &DID).unwrap();
        client.generate_key_cache(&[0x24; 16]).unwrap();
        client
    }

    #[test]
    fn test_rejects_bad_identity_and_key() {
        assert!(HkdsClient::new(&[0u8; 16], &DID[..10]).is_err());
        // key length must match the mode class
        assert!(HkdsClient::new(&[0u8; 32], &DID).is_err());
        let mut bad_mode = DID;
        bad_mode[5] = 0x00;
        assert!(HkdsClient::new(&[0u8; 16], &bad_mode).is_err());
    }

    #[test]
    fn test_encrypt_before_cache_fails() {
        let mut client = HkdsClient::new(&[0x42; 16], &DID).unwrap();
        assert!(matches!(
            client.encrypt(&[0u8; 16]),
            Err(HkdsError::KeyExhausted)
        ));
        // the counter must not move on a failed call
        assert_eq!(client.ksn()[12..], [0, 0, 0, 0]);
    }

    #[test]
    fn test_counter_advances_per_mode() {
        let mut client = cached_client();
        client.encrypt(&[0u8; 16]).unwrap();
        assert_eq!(client.ksn()[12], 1);
        client.encrypt_authenticate(&[0u8; 16], b"").unwrap();
        assert_eq!(client.ksn()[12], 3);
        assert_eq!(client.key_count(), CACHE_SIZE - 3);
    }

    #[test]
    fn test_used_slot_is_zeroized() {
        let mut client = cached_client();
        assert_ne!(client.cache[0], [0u8; MESSAGE_SIZE]);
        client.encrypt(&[0xFFu8; 16]).unwrap();
        assert_eq!(client.cache[0], [0u8; MESSAGE_SIZE]);

        client.encrypt_authenticate(&[0xFFu8; 16], b"ad").unwrap();
        assert_eq!(client.cache[1], [0u8; MESSAGE_SIZE]);
        assert_eq!(client.cache[2], [0u8; MESSAGE_SIZE]);
        assert_ne!(client.cache[3], [0u8; MESSAGE_SIZE]);
    }

    #[test]
    fn test_cache_exhaustion() {
        let mut client = cached_client();
        for _ in 0..CACHE_SIZE {
            client.encrypt(&[0u8; 16]).unwrap();
        }
        assert_eq!(client.key_count(), 0);
        assert!(matches!(
            client.encrypt(&[0u8; 16]),
            Err(HkdsError::KeyExhausted)
        ));

        // a fresh token for the next epoch restores the full cache
        client.generate_key_cache(&[0x25; 16]).unwrap();
        assert_eq!(client.key_count(), CACHE_SIZE);
    }

    #[test]
    fn test_authenticated_mode_needs_two_keys() {
        let mut client = cached_client();
        for _ in 0..CACHE_SIZE - 1 {
            client.encrypt(&[0u8; 16]).unwrap();
        }
        assert_eq!(client.key_count(), 1);
        assert!(matches!(
            client.encrypt_authenticate(&[0u8; 16], b""),
            Err(HkdsError::KeyExhausted)
        ));
        // the single remaining key is still usable for plain encryption
        client.encrypt(&[0u8; 16]).unwrap();
    }

    #[test]
    fn test_mid_epoch_cache_generation_skips_used_slots() {
        let mut client = cached_client();
        client.encrypt(&[0u8; 16]).unwrap();
        client.encrypt(&[0u8; 16]).unwrap();
        // regenerate mid-epoch, e.g. after a state restore
        client.generate_key_cache(&[0x24; 16]).unwrap();
        assert_eq!(client.key_count(), CACHE_SIZE - 2);
        assert_eq!(client.cache[0], [0u8; MESSAGE_SIZE]);
        assert_eq!(client.cache[1], [0u8; MESSAGE_SIZE]);
        assert_ne!(client.cache[2], [0u8; MESSAGE_SIZE]);
    }
}
