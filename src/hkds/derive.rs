// src/hkds/derive.rs
//
// The HKDS key-stream derivations shared by client and server. Everything
// here is a pure function of root keys, the device id, and the transaction
// counter; client and server stay synchronized because both sides run the
// same derivations over the same KSN.

use zeroize::Zeroizing;

use crate::crypto::keccak::{Kmac, Shake, ShakeMode};
use crate::error::{HkdsError, HkdsResult};

use super::{
    CACHE_SIZE, DEVICE_ID_SIZE, KID_SIZE, KMAC_CUSTOMIZATION, KSN_SIZE, MESSAGE_SIZE, TAG_SIZE,
};

/// Read and validate the PRF mode carried in byte 5 of a device id.
pub fn mode_from_device_id(device_id: &[u8]) -> HkdsResult<ShakeMode> {
    if device_id.len() != DEVICE_ID_SIZE {
        return Err(HkdsError::InvalidSize(format!(
            "device id must be {} bytes, got {}",
            DEVICE_ID_SIZE,
            device_id.len()
        )));
    }
    ShakeMode::from_id(device_id[5])
}

/// Assemble a KSN: device id followed by the little-endian counter.
pub fn build_ksn(device_id: &[u8; DEVICE_ID_SIZE], counter: u32) -> [u8; KSN_SIZE] {
    let mut ksn = [0u8; KSN_SIZE];
    ksn[..DEVICE_ID_SIZE].copy_from_slice(device_id);
    ksn[DEVICE_ID_SIZE..].copy_from_slice(&counter.to_le_bytes());
    ksn
}

/// The transaction counter of a KSN.
pub fn ksn_counter(ksn: &[u8; KSN_SIZE]) -> u32 {
    u32::from_le_bytes(ksn[DEVICE_ID_SIZE..].try_into().expect("fixed layout"))
}

/// The cache epoch a counter falls into.
pub fn epoch(counter: u32) -> u32 {
    counter / CACHE_SIZE as u32
}

/// The KSN with the counter masked down to its cache-epoch boundary. This
/// is the context that binds token encryption and cache derivation to one
/// epoch of one device.
pub fn ksn_epoch(device_id: &[u8; DEVICE_ID_SIZE], counter: u32) -> [u8; KSN_SIZE] {
    build_ksn(device_id, counter - counter % CACHE_SIZE as u32)
}

/// Derive a device's embedded key from the BDK: `SHAKE(BDK || DID)`.
pub fn generate_edk(
    mode: ShakeMode,
    bdk: &[u8],
    device_id: &[u8; DEVICE_ID_SIZE],
) -> Zeroizing<Vec<u8>> {
    let mut edk = Zeroizing::new(vec![0u8; mode.key_size()]);
    Shake::derive(mode, &[bdk, device_id], &mut edk);
    edk
}

/// Derive the ephemeral token key for a cache epoch:
/// `SHAKE(STK || KID || DID || le32(epoch))`.
pub fn generate_token(
    mode: ShakeMode,
    stk: &[u8],
    kid: &[u8; KID_SIZE],
    device_id: &[u8; DEVICE_ID_SIZE],
    counter: u32,
) -> Zeroizing<Vec<u8>> {
    let mut token = Zeroizing::new(vec![0u8; mode.key_size()]);
    Shake::derive(
        mode,
        &[stk, kid, device_id, &epoch(counter).to_le_bytes()],
        &mut token,
    );
    token
}

/// The one-time pad that protects a token in transit: `SHAKE(EDK ||
/// ksn_epoch)`, derivable by both sides of the exchange.
pub fn token_pad(
    mode: ShakeMode,
    edk: &[u8],
    device_id: &[u8; DEVICE_ID_SIZE],
    counter: u32,
) -> Zeroizing<Vec<u8>> {
    let mut pad = Zeroizing::new(vec![0u8; mode.key_size()]);
    Shake::derive(mode, &[edk, &ksn_epoch(device_id, counter)], &mut pad);
    pad
}

/// Fill a transaction-key cache for the epoch containing `counter`:
/// `SHAKE(EDK || token || ksn_epoch)`, squeezed into CACHE_SIZE keys of one
/// message block each.
pub fn derive_cache(
    mode: ShakeMode,
    edk: &[u8],
    token: &[u8],
    device_id: &[u8; DEVICE_ID_SIZE],
    counter: u32,
) -> [[u8; MESSAGE_SIZE]; CACHE_SIZE] {
    let mut stream = Zeroizing::new([0u8; CACHE_SIZE * MESSAGE_SIZE]);
    let mut shake = Shake::new(mode);
    shake.absorb(edk);
    shake.absorb(token);
    shake.absorb(&ksn_epoch(device_id, counter));
    shake.squeeze(&mut *stream);

    let mut cache = [[0u8; MESSAGE_SIZE]; CACHE_SIZE];
    for (slot, chunk) in cache.iter_mut().zip(stream.chunks_exact(MESSAGE_SIZE)) {
        slot.copy_from_slice(chunk);
    }
    cache
}

/// Authentication tag over ciphertext and additional data:
/// `KMAC(key, "HKDS", ct || ad, 16)`.
pub fn kmac_tag(mode: ShakeMode, key: &[u8], ciphertext: &[u8], additional_data: &[u8]) -> [u8; TAG_SIZE] {
    let mut kmac = Kmac::new(mode, key, KMAC_CUSTOMIZATION);
    kmac.update(ciphertext);
    kmac.update(additional_data);
    let mut tag = [0u8; TAG_SIZE];
    kmac.finalize_into(&mut tag);
    tag
}
