// HKDS prelude
//
// One-line import for protocol consumers.

#![allow(missing_docs)]

pub use crate::crypto::keccak::ShakeMode;
pub use crate::crypto::random::{RandomSource, SystemRandom};
pub use crate::dukpt::{DukptClient, DukptKeyType, DukptKeyUsage, DukptServer};
pub use crate::error::{HkdsError, HkdsResult};
pub use crate::hkds::{HkdsClient, HkdsServer, MasterKey};
