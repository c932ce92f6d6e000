// HKDS (Hierarchal Key Distribution System)
// Distributed transaction-key management with a DUKPT-AES baseline

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod crypto;
pub mod dukpt;
pub mod error;
pub mod hkds;
pub mod prelude;

// Re-export commonly used types
pub use crypto::keccak::ShakeMode;
pub use crypto::random::{RandomSource, SystemRandom};
pub use dukpt::{DukptClient, DukptServer};
pub use error::{HkdsError, HkdsResult};
pub use hkds::{HkdsClient, HkdsServer, MasterKey};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name.
pub const PROTOCOL_NAME: &str = "HKDS";

/// Protocol full name.
pub const PROTOCOL_FULL_NAME: &str = "Hierarchal Key Distribution System";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_protocol_name() {
        assert_eq!(PROTOCOL_NAME, "HKDS");
        assert_eq!(PROTOCOL_FULL_NAME, "Hierarchal Key Distribution System");
    }
}
