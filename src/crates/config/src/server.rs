//! Server configuration structures

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Bits required of every RSA modulus
pub const RSA_MODULUS_BITS: usize = 2048;

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfiguration {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// DH-parameter stage tuning
    pub handshake: HandshakeConfig,
    /// Server RSA keys offered to clients
    pub rsa_keys: Vec<RsaKeyConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// DH-parameter stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Maximum number of DH exponents drawn before the request is aborted
    pub max_dh_attempts: u32,
    /// Run the stage on the blocking thread pool from async callers
    pub offload_dh_to_blocking_pool: bool,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            max_dh_attempts: 1024,
            offload_dh_to_blocking_pool: true,
        }
    }
}

/// RSA key components, hex-encoded big-endian
#[derive(Clone, Serialize, Deserialize)]
pub struct RsaKeyConfig {
    pub modulus: String,
    pub public_exponent: String,
    pub private_exponent: String,
}

impl std::fmt::Debug for RsaKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyConfig")
            .field("modulus", &self.modulus)
            .field("public_exponent", &self.public_exponent)
            .field("private_exponent", &"<redacted>")
            .finish()
    }
}

impl RsaKeyConfig {
    fn validate(&self, index: usize) -> Result<()> {
        let modulus = decode_component(index, "modulus", &self.modulus)?;
        let bits = bit_length(&modulus);
        if bits != RSA_MODULUS_BITS {
            return Err(ConfigError::invalid(
                format!("rsa_keys[{index}].modulus"),
                format!("Must be {RSA_MODULUS_BITS} bits, got {bits}"),
            ));
        }
        decode_component(index, "public_exponent", &self.public_exponent)?;
        decode_component(index, "private_exponent", &self.private_exponent)?;
        Ok(())
    }
}

fn decode_component(index: usize, name: &str, value: &str) -> Result<Vec<u8>> {
    let field = format!("rsa_keys[{index}].{name}");
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(field));
    }
    let bytes = hex::decode(value)
        .map_err(|e| ConfigError::invalid(field.clone(), format!("Invalid hex: {e}")))?;
    if bytes.iter().all(|&b| b == 0) {
        return Err(ConfigError::invalid(field, "Must be non-zero"));
    }
    Ok(bytes)
}

fn bit_length(be_bytes: &[u8]) -> usize {
    match be_bytes.iter().position(|&b| b != 0) {
        Some(first) => {
            (be_bytes.len() - first - 1) * 8 + (8 - be_bytes[first].leading_zeros() as usize)
        }
        None => 0,
    }
}

impl ServerConfiguration {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::invalid(
                    "logging.level",
                    "Must be one of: trace, debug, info, warn, error",
                ));
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => {
                return Err(ConfigError::invalid(
                    "logging.format",
                    "Must be one of: json, pretty, compact",
                ));
            }
        }

        if self.handshake.max_dh_attempts == 0 {
            return Err(ConfigError::invalid(
                "handshake.max_dh_attempts",
                "Must be greater than 0",
            ));
        }

        for (index, key) in self.rsa_keys.iter().enumerate() {
            key.validate(index)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(&[]), 0);
        assert_eq!(bit_length(&[0, 0]), 0);
        assert_eq!(bit_length(&[0x01, 0x00, 0x01]), 17);
        assert_eq!(bit_length(&[0x00, 0x80]), 8);
        assert_eq!(bit_length(&[0xff; 256]), 2048);
    }

    #[test]
    fn test_debug_redacts_private_exponent() {
        let key = RsaKeyConfig {
            modulus: "c3".to_string(),
            public_exponent: "03".to_string(),
            private_exponent: "deadbeef".to_string(),
        };
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("<redacted>"));
    }
}
