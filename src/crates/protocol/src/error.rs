//! Error types for the authorization-key protocol

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised by the record codec and the cryptographic primitives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Leading tag matched none of the expected record shapes
    #[error("Unknown constructor: {constructor:#010x}")]
    UnknownConstructor { constructor: u32 },

    /// Record is truncated, over-long, or otherwise structurally invalid
    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },

    /// Cipher or hash primitive misuse (bad block length, bad key size)
    #[error("Cryptographic error: {message}")]
    Crypto { message: String },

    /// RSA-Pad hash check failed
    #[error("Integrity check failed")]
    IntegrityMismatch,

    /// No in-range DH public value was found within the resample budget
    #[error("DH resample budget exhausted after {attempts} attempts")]
    DhBudgetExhausted { attempts: u32 },
}

impl ProtocolError {
    /// Create an unknown-constructor error
    pub fn unknown_constructor(constructor: u32) -> Self {
        Self::UnknownConstructor { constructor }
    }

    /// Create a malformed-record error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }
}

impl From<hex::FromHexError> for ProtocolError {
    fn from(err: hex::FromHexError) -> Self {
        Self::malformed(format!("Hex decode error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_constructor_display() {
        let err = ProtocolError::unknown_constructor(0x1cb5c415);
        assert_eq!(err.to_string(), "Unknown constructor: 0x1cb5c415");
    }

    #[test]
    fn test_from_hex_error() {
        let err: ProtocolError = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, ProtocolError::MalformedRecord { .. }));
    }
}
