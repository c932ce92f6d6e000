// src/dukpt/client.rs
//
// The DUKPT terminal state machine of §B.6.3. The device never holds the
// BDK: it is personalized with an initial key and evolves a register of 32
// intermediate derivation keys, one per counter bit position. Register i
// always holds the derivation key for the counter whose bits above i match
// the current counter and whose lowest set bit is i; consuming a key
// derives the children below it and wipes the slot, so a captured state
// cannot reproduce past transaction keys.

use zeroize::Zeroizing;

use crate::crypto::constant_time::ct_equal;
use crate::crypto::ecb;
use crate::crypto::sha2::{hmac_sha256, sha256, HMAC_TAG_SIZE};
use crate::error::{HkdsError, HkdsResult};

use super::derivation::{create_derivation_data, derive_key};
use super::{
    DukptDerivationPurpose, DukptKeyType, DukptKeyUsage, INITIAL_KEY_ID_SIZE, MAX_COUNTER,
    MAX_WORK, MESSAGE_SIZE, NUM_REGISTERS,
};

/// Per-device DUKPT client. Not thread safe; a device owns one serialized
/// stream of transactions.
pub struct DukptClient {
    registers: [Option<Zeroizing<Vec<u8>>>; NUM_REGISTERS],
    key_type: DukptKeyType,
    initial_key_id: [u8; INITIAL_KEY_ID_SIZE],
    counter: u32,
    shift_register: u32,
    current: usize,
    loaded: bool,
    exhausted: bool,
}

impl DukptClient {
    /// Create an unloaded client; `load_initial_key` personalizes it.
    pub fn new() -> Self {
        DukptClient {
            registers: std::array::from_fn(|_| None),
            key_type: DukptKeyType::Aes128,
            initial_key_id: [0u8; INITIAL_KEY_ID_SIZE],
            counter: 0,
            shift_register: 1,
            current: 0,
            loaded: false,
            exhausted: false,
        }
    }

    /// The counter of the next transaction. This is the value the caller
    /// places into the KSN before encrypting.
    pub fn transaction_counter(&self) -> u32 {
        self.counter
    }

    /// B.6.3 processing routines: load an initial key and populate the
    /// intermediate key registers for the single-bit counter values.
    pub fn load_initial_key(
        &mut self,
        initial_key: &[u8],
        key_type: DukptKeyType,
        initial_key_id: &[u8],
    ) -> HkdsResult<()> {
        if initial_key.len() != key_type.key_size() {
            return Err(HkdsError::InvalidKey(format!(
                "initial key must be {} bytes, got {}",
                key_type.key_size(),
                initial_key.len()
            )));
        }
        if initial_key_id.len() != INITIAL_KEY_ID_SIZE {
            return Err(HkdsError::InvalidSize(format!(
                "initial key id must be {} bytes, got {}",
                INITIAL_KEY_ID_SIZE,
                initial_key_id.len()
            )));
        }

        self.key_type = key_type;
        self.initial_key_id.copy_from_slice(initial_key_id);
        self.counter = 0;
        self.registers = std::array::from_fn(|_| None);
        self.update_derivation_keys(initial_key, NUM_REGISTERS - 1)?;
        self.counter = 1;
        self.set_shift_register();
        self.loaded = true;
        self.exhausted = false;
        Ok(())
    }

    /// B.6.3: generate the working key for the current transaction and
    /// advance the state. The key is derived from the intermediate key at
    /// the counter's lowest set bit.
    pub fn generate_working_keys(
        &mut self,
        usage: DukptKeyUsage,
        key_type: DukptKeyType,
    ) -> HkdsResult<Zeroizing<Vec<u8>>> {
        if !self.loaded {
            return Err(HkdsError::InvalidState(
                "no initial key has been loaded".to_string(),
            ));
        }
        if self.exhausted {
            return Err(HkdsError::KeyExhausted);
        }

        self.set_shift_register();
        let mut data = create_derivation_data(
            DukptDerivationPurpose::DerivationOrWorkingKey,
            usage,
            key_type,
            &self.initial_key_id,
            self.counter,
        );
        let working_key = {
            let register = self.registers[self.current].as_ref().ok_or_else(|| {
                HkdsError::InvalidState("intermediate key register is empty".to_string())
            })?;
            derive_key(register, key_type, &mut data)?
        };

        self.update_state_for_next_transaction()?;
        Ok(working_key)
    }

    /// Encrypt a 16-byte PIN block with a fresh PIN-encryption working key.
    /// The working key is wiped before the call returns.
    pub fn encrypt(&mut self, message: &[u8]) -> HkdsResult<[u8; MESSAGE_SIZE]> {
        let block = check_message(message)?;
        let working_key = self.generate_working_keys(DukptKeyUsage::PinEncryption, self.key_type)?;
        ecb::encrypt(&working_key, &block)
    }

    /// Encrypt a PIN block, then authenticate the ciphertext with
    /// HMAC-SHA-256 under a two-way MAC key generated at the next counter
    /// value. Returns ciphertext with the full 32-byte tag appended.
    pub fn encrypt_authenticate(
        &mut self,
        message: &[u8],
        additional_data: &[u8],
    ) -> HkdsResult<[u8; MESSAGE_SIZE + HMAC_TAG_SIZE]> {
        let ciphertext = self.encrypt(message)?;
        let mac_key = self.generate_working_keys(DukptKeyUsage::MacBothWays, self.key_type)?;
        let tag = hmac_sha256(&mac_key, &[additional_data, &ciphertext])?;

        let mut out = [0u8; MESSAGE_SIZE + HMAC_TAG_SIZE];
        out[..MESSAGE_SIZE].copy_from_slice(&ciphertext);
        out[MESSAGE_SIZE..].copy_from_slice(&tag);
        Ok(out)
    }

    /// B.6.3 update initial key: accept a replacement initial key wrapped
    /// under a key-encryption working key at the current counter, verify its
    /// checksum, and re-personalize under the new device id. Any decryption
    /// or verification failure leaves the register state untouched apart
    /// from the consumed key-encryption counter.
    pub fn update_initial_key(
        &mut self,
        wrapped_key: &[u8],
        key_type: DukptKeyType,
        new_key_id: &[u8],
    ) -> HkdsResult<()> {
        if wrapped_key.len() != 48 {
            return Err(HkdsError::InvalidSize(format!(
                "wrapped initial key must be 48 bytes, got {}",
                wrapped_key.len()
            )));
        }
        if new_key_id.len() != INITIAL_KEY_ID_SIZE {
            return Err(HkdsError::InvalidSize(format!(
                "initial key id must be {} bytes, got {}",
                INITIAL_KEY_ID_SIZE,
                new_key_id.len()
            )));
        }

        let kek = self.generate_working_keys(DukptKeyUsage::KeyEncryptionKey, self.key_type)?;
        let mut payload = Zeroizing::new([0u8; 48]);
        for (chunk, out) in wrapped_key
            .chunks_exact(16)
            .zip(payload.chunks_exact_mut(16))
        {
            let block: [u8; 16] = chunk.try_into().expect("exact chunks");
            out.copy_from_slice(&ecb::decrypt(&kek, &block)?);
        }

        let checksum = sha256(&payload[..32]);
        if !ct_equal(&checksum[..16], &payload[32..]) {
            tracing::warn!("replacement initial key failed its checksum");
            return Err(HkdsError::InvalidKey(
                "replacement initial key failed verification".to_string(),
            ));
        }

        let new_key = Zeroizing::new(payload[..key_type.key_size()].to_vec());
        self.load_initial_key(&new_key, key_type, new_key_id)
    }

    /// Derive the intermediate keys for positions `start` down to 0 from
    /// `base`, which is the derivation key of the current counter value.
    fn update_derivation_keys(&mut self, base: &[u8], start: usize) -> HkdsResult<()> {
        for i in (0..=start).rev() {
            let mut data = create_derivation_data(
                DukptDerivationPurpose::DerivationOrWorkingKey,
                DukptKeyUsage::KeyDerivation,
                self.key_type,
                &self.initial_key_id,
                self.counter | (1u32 << i),
            );
            self.registers[i] = Some(derive_key(base, self.key_type, &mut data)?);
        }
        Ok(())
    }

    /// B.6.3: consume the current counter value. Counters whose population
    /// count has reached the work limit have no children; the counter then
    /// jumps by its lowest set bit, skipping the values a host would refuse
    /// to derive.
    fn update_state_for_next_transaction(&mut self) -> HkdsResult<()> {
        if self.counter.count_ones() < MAX_WORK {
            let base = self.registers[self.current].take().ok_or_else(|| {
                HkdsError::InvalidState("intermediate key register is empty".to_string())
            })?;
            if self.current > 0 {
                self.update_derivation_keys(&base, self.current - 1)?;
            }
            self.counter = self.counter.wrapping_add(1);
        } else {
            self.registers[self.current] = None;
            self.counter = self.counter.wrapping_add(self.shift_register);
        }

        if self.counter == 0 || self.counter > MAX_COUNTER {
            self.exhausted = true;
            tracing::warn!("DUKPT transaction counter exhausted");
        } else {
            self.set_shift_register();
        }
        Ok(())
    }

    /// Point the shift register at the counter's lowest set bit.
    fn set_shift_register(&mut self) {
        if self.counter == 0 {
            self.shift_register = 1;
            self.current = 0;
            return;
        }
        let bit = self.counter.trailing_zeros() as usize;
        self.shift_register = 1u32 << bit;
        self.current = bit;
    }
}

impl Default for DukptClient {
    fn default() -> Self {
        Self::new()
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
