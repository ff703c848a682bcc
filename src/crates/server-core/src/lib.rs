//! Authorization-key server core
//!
//! Server side of the DH-parameter stage: per-connection handshake state, RSA key
//! lookup, the stage handler itself, and the logging setup shared by binaries
//! embedding it.

pub mod auth;
pub mod error;
pub mod logging;
pub mod session;

pub use auth::{
    HandshakeError, InMemoryKeyProvider, ReqDhParamsHandler, RsaKeyProvider, HANDSHAKE_ERROR_CODE,
};
pub use error::{Result, ServerError};
pub use logging::init_logging;
pub use session::HandshakeSession;
