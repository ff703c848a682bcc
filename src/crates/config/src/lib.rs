//! Authorization-key server configuration
//!
//! Provides configuration loading, parsing, and validation for the handshake server.

pub mod error;
pub mod loader;
pub mod server;

pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;
pub use server::{HandshakeConfig, LoggingConfig, RsaKeyConfig, ServerConfiguration};
