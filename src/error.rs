// HKDS Error Types

use thiserror::Error;

/// Error surfaced by the HKDS and DUKPT state machines.
///
/// Authentication failures are a dedicated variant so that logging and
/// monitoring layers can flag them separately from malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HkdsError {
    /// An input had the wrong fixed length
    #[error("invalid size: {0}")]
    InvalidSize(String),

    /// Key material failed a structural check
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The DUKPT counter space or the HKDS key cache is used up
    #[error("keys exhausted: a new token or re-personalization is required")]
    KeyExhausted,

    /// A MAC comparison failed; the message must be rejected
    #[error("authentication failed")]
    AuthenticationFailed,

    /// An operation was called out of protocol order
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// HKDS Result Type
pub type HkdsResult<T> = Result<T, HkdsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HkdsError::InvalidSize("ciphertext must be 16 bytes".to_string());
        assert_eq!(err.to_string(), "invalid size: ciphertext must be 16 bytes");
        assert_eq!(
            HkdsError::AuthenticationFailed.to_string(),
            "authentication failed"
        );
    }

    #[test]
    fn test_authentication_failure_is_distinguishable() {
        let err: HkdsError = HkdsError::AuthenticationFailed;
        assert_ne!(err, HkdsError::KeyExhausted);
        match err {
            HkdsError::AuthenticationFailed => (),
            _ => panic!("wrong error kind"),
        }
    }
}
