// src/crypto/keccak.rs
//
// Keccak-f[1600] sponge with run-time rate selection, and the SHAKE / KMAC
// wrappers used by HKDS. The permutation itself comes from the `keccak`
// crate; the sponge lives here because the protocol selects its rate from a
// device-id byte, including a SHAKE-512 variant with a 1024-bit capacity
// (72-byte rate) that is NOT the FIPS 202 SHA3-512 XOF and must not be
// confused with it.

use keccak::f1600;
use zeroize::Zeroize;

use crate::error::{HkdsError, HkdsResult};

/// SHAKE domain-separation byte (FIPS 202).
const SHAKE_DOMAIN: u8 = 0x1F;
/// cSHAKE domain-separation byte (SP800-185); KMAC builds on cSHAKE.
const CSHAKE_DOMAIN: u8 = 0x04;

/// PRF selection, carried in byte 5 of the HKDS device id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShakeMode {
    /// SHAKE-128: 168-byte rate, 128-bit security, 16-byte key class.
    Shake128,
    /// SHAKE-256: 136-byte rate, 256-bit security, 32-byte key class.
    Shake256,
    /// SHAKE-512: 72-byte rate, 1024-bit capacity, 64-byte key class.
    /// Non-standard; documented sponge parameters, not FIPS 202 SHA3-512.
    Shake512,
}

impl ShakeMode {
    /// Decode the mode identifier embedded in a device id.
    pub fn from_id(id: u8) -> HkdsResult<Self> {
        match id {
            0x09 => Ok(ShakeMode::Shake128),
            0x0A => Ok(ShakeMode::Shake256),
            0x0B => Ok(ShakeMode::Shake512),
            other => Err(HkdsError::InvalidKey(format!(
                "unknown PRF mode identifier 0x{:02X}",
                other
            ))),
        }
    }

    /// The wire identifier for this mode.
    pub const fn id(self) -> u8 {
        match self {
            ShakeMode::Shake128 => 0x09,
            ShakeMode::Shake256 => 0x0A,
            ShakeMode::Shake512 => 0x0B,
        }
    }

    /// Sponge rate in bytes.
    pub const fn rate(self) -> usize {
        match self {
            ShakeMode::Shake128 => 168,
            ShakeMode::Shake256 => 136,
            ShakeMode::Shake512 => 72,
        }
    }

    /// Size in bytes of the key class (BDK, STK, EDK, token) for this mode.
    pub const fn key_size(self) -> usize {
        match self {
            ShakeMode::Shake128 => 16,
            ShakeMode::Shake256 => 32,
            ShakeMode::Shake512 => 64,
        }
    }
}

/// An incremental SHAKE instance: absorb any amount of input, then squeeze
/// an unbounded pseudo-random stream.
pub struct Shake {
    state: [u64; 25],
    rate: usize,
    domain: u8,
    pos: usize,
    squeezing: bool,
}

impl Shake {
    /// Create a SHAKE instance for `mode`.
    pub fn new(mode: ShakeMode) -> Self {
        Self::with_domain(mode.rate(), SHAKE_DOMAIN)
    }

    fn with_domain(rate: usize, domain: u8) -> Self {
        Shake {
            state: [0u64; 25],
            rate,
            domain,
            pos: 0,
            squeezing: false,
        }
    }

    /// One-shot convenience: absorb `parts` in order and squeeze `out`.
    pub fn derive(mode: ShakeMode, parts: &[&[u8]], out: &mut [u8]) {
        let mut shake = Shake::new(mode);
        for part in parts {
            shake.absorb(part);
        }
        shake.squeeze(out);
    }

    /// Absorb input. Must not be called once squeezing has begun.
    pub fn absorb(&mut self, data: &[u8]) {
        debug_assert!(!self.squeezing, "absorb after squeeze");
        for &byte in data {
            self.xor_byte(self.pos, byte);
            self.pos += 1;
            if self.pos == self.rate {
                f1600(&mut self.state);
                self.pos = 0;
            }
        }
    }

    /// Squeeze the next `out.len()` bytes of the output stream.
    pub fn squeeze(&mut self, out: &mut [u8]) {
        if !self.squeezing {
            self.finish_absorb();
        }
        for byte in out.iter_mut() {
            if self.pos == self.rate {
                f1600(&mut self.state);
                self.pos = 0;
            }
            *byte = self.byte_at(self.pos);
            self.pos += 1;
        }
    }

    fn finish_absorb(&mut self) {
        self.xor_byte(self.pos, self.domain);
        self.xor_byte(self.rate - 1, 0x80);
        f1600(&mut self.state);
        self.pos = 0;
        self.squeezing = true;
    }

    #[inline]
    fn xor_byte(&mut self, index: usize, byte: u8) {
        self.state[index / 8] ^= u64::from(byte) << (8 * (index % 8));
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u8 {
        (self.state[index / 8] >> (8 * (index % 8))) as u8
    }
}

impl Drop for Shake {
    fn drop(&mut self) {
        self.state.zeroize();
    }
}

/// Keyed message authentication per NIST SP800-185 KMAC, generalized over
/// the three sponge rates. The function-name string is "KMAC"; the key and
/// customization are absorbed as byte-padded encoded strings.
pub struct Kmac {
    sponge: Shake,
}

impl Kmac {
    /// Initialize with a key and customization string.
    pub fn new(mode: ShakeMode, key: &[u8], customization: &[u8]) -> Self {
        let rate = mode.rate();
        let mut sponge = Shake::with_domain(rate, CSHAKE_DOMAIN);
        // cSHAKE prefix: bytepad(encode_string(N) || encode_string(S), rate)
        absorb_bytepad(&mut sponge, rate, &[b"KMAC", customization]);
        // keyed prefix: bytepad(encode_string(K), rate)
        absorb_bytepad(&mut sponge, rate, &[key]);
        Kmac { sponge }
    }

    /// Absorb message bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.sponge.absorb(data);
    }

    /// Finish and write the tag; the tag length is bound into the MAC.
    pub fn finalize_into(mut self, tag: &mut [u8]) {
        let (enc, len) = right_encode((tag.len() * 8) as u64);
        self.sponge.absorb(&enc[..len]);
        self.sponge.squeeze(tag);
    }
}

/// Absorb `bytepad(encode_string(parts[0]) || ... || encode_string(parts[n]), rate)`.
fn absorb_bytepad(sponge: &mut Shake, rate: usize, parts: &[&[u8]]) {
    const ZEROS: [u8; 16] = [0u8; 16];
    let mut total = 0usize;

    let (enc, len) = left_encode(rate as u64);
    sponge.absorb(&enc[..len]);
    total += len;

    for part in parts {
        let (enc, len) = left_encode((part.len() * 8) as u64);
        sponge.absorb(&enc[..len]);
        sponge.absorb(part);
        total += len + part.len();
    }

    let rem = total % rate;
    if rem != 0 {
        let mut pad = rate - rem;
        while pad > 0 {
            let n = pad.min(ZEROS.len());
            sponge.absorb(&ZEROS[..n]);
            pad -= n;
        }
    }
}

/// SP800-185 left_encode: big-endian value bytes prefixed by their count.
fn left_encode(x: u64) -> ([u8; 9], usize) {
    let mut out = [0u8; 9];
    let len = value_length(x);
    out[0] = len as u8;
    for i in 0..len {
        out[1 + i] = (x >> (8 * (len - 1 - i))) as u8;
    }
    (out, len + 1)
}

/// SP800-185 right_encode: big-endian value bytes suffixed by their count.
fn right_encode(x: u64) -> ([u8; 9], usize) {
    let mut out = [0u8; 9];
    let len = value_length(x);
    for i in 0..len {
        out[i] = (x >> (8 * (len - 1 - i))) as u8;
    }
    out[len] = len as u8;
    (out, len + 1)
}

fn value_length(x: u64) -> usize {
    (((64 - x.leading_zeros() as usize) + 7) / 8).max(1)
}
