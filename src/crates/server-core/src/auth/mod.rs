//! Authorization-key handshake handlers
//!
//! - RSA key lookup by fingerprint
//! - The DH-parameter stage (`req_DH_params`)

pub mod keys;
pub mod req_dh_params;

pub use keys::{InMemoryKeyProvider, RsaKeyProvider};
pub use req_dh_params::{
    HandshakeError, ReqDhParamsHandler, HANDSHAKE_ERROR_CODE, NONCE_MISMATCH_MESSAGE,
};
