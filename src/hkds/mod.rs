// Hierarchal Key Distribution System (HKDS)
//
// A two-key distributed transaction-key protocol: an embedded device key
// derived from the server's BDK protects token exchanges, and a server
// issued ephemeral token key seeds the SHAKE PRF that fills the client's
// transaction-key cache. The server reconstructs any transaction key with a
// fixed number of SHAKE calls, independent of the counter value.

pub mod client;
pub mod derive;
pub mod master_key;
pub mod server;

pub use client::HkdsClient;
pub use master_key::MasterKey;
pub use server::HkdsServer;

/// Device id length: bdk-id(4) | protocol-id(1) | prf-mode(1) |
/// manufacturer(2) | device(4).
pub const DEVICE_ID_SIZE: usize = 12;
/// Master key id length.
pub const KID_SIZE: usize = 4;
/// KSN length: device id plus little-endian 32-bit counter.
pub const KSN_SIZE: usize = 16;
/// Fixed message (PIN block) length.
pub const MESSAGE_SIZE: usize = 16;
/// KMAC authentication tag length.
pub const TAG_SIZE: usize = 16;

/// Transaction-key cache multiplier. A larger cache means fewer token
/// exchanges but a larger client state; must keep the cache size even so
/// authenticated pairs never straddle a cache boundary.
pub const CACHE_MULTIPLIER: usize = 4;
/// Number of transaction keys in a full cache.
pub const CACHE_SIZE: usize = CACHE_MULTIPLIER * 2;

/// Protocol id byte for unauthenticated HKDS.
pub const PROTOCOL_STANDARD: u8 = 0x10;
/// Protocol id byte for KMAC-authenticated HKDS.
pub const PROTOCOL_AUTHENTICATED: u8 = 0x11;

/// KMAC customization string for transaction authentication.
pub(crate) const KMAC_CUSTOMIZATION: &[u8] = b"HKDS";
