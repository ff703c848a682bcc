//! Server error types

use authkey_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server errors
///
/// These abort a request without producing a protocol response. Protocol-level
/// rejections are reported through [`crate::auth::HandshakeError`] instead.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] authkey_config::ConfigError),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),

    /// A session key was written twice within one handshake attempt
    #[error("Session key already set: {0}")]
    SessionKeyAlreadySet(&'static str),

    /// No in-range DH public value within the configured budget
    #[error("DH resample budget exhausted after {attempts} attempts")]
    DhBudgetExhausted { attempts: u32 },

    /// Blocking task failed to complete
    #[error("Blocking task failed: {0}")]
    Join(String),

    /// Logging setup error
    #[error("Logging error: {0}")]
    Logging(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::DhBudgetExhausted { attempts } => Self::DhBudgetExhausted { attempts },
            other => Self::Protocol(other),
        }
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}
