//! Authorization-key exchange protocol
//!
//! This crate implements the DH-parameter stage primitives of the authorization-key
//! handshake: the tagged binary record codec, the records exchanged during the stage,
//! and the cryptography that binds them together.
//!
//! # Layers
//!
//! - **Codec**: [`wire`] readers/writers, byte strings and vectors
//! - **Records**: [`messages`] with their constructor tags
//! - **Crypto**: AES-256-IGE, RSA-Pad, temporary key derivation and Diffie-Hellman
//!
//! # Example Usage
//!
//! ```rust
//! use authkey_protocol::messages::RpcError;
//! use authkey_protocol::wire::WireFormat;
//!
//! let err = RpcError::new(-404, "Nonce values did not match.");
//! let encoded = err.encode()?;
//! assert_eq!(RpcError::decode(&encoded)?, err);
//! # Ok::<(), authkey_protocol::ProtocolError>(())
//! ```

pub mod crypto;
pub mod dh;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod messages;
pub mod random;
pub mod rsa_pad;
pub mod wire;

pub use error::{ProtocolError, Result};
pub use keys::RsaKey;
pub use messages::{
    DhParamsResponse, InnerDataKind, PqInnerData, ReqDhParams, RpcError, ServerDhInnerData,
    ServerDhParamsOk,
};
pub use random::{OsRandom, RandomSource};
pub use wire::{Int128, Int256, Vector, WireFormat, WireReader, WireWriter};
