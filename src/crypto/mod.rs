// HKDS Cryptographic Core Module
//
// Thin wrappers over the symmetric primitives the key-management protocols
// consume: single-block AES, the Keccak sponge family, SHA-2/HMAC, and the
// constant-time and randomness helpers.

pub mod block;
pub mod constant_time;
pub mod ecb;
pub mod keccak;
pub mod random;
pub mod sha2;
