//! RSA key lookup by fingerprint

use authkey_config::RsaKeyConfig;
use authkey_protocol::RsaKey;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;

/// Resolves the client-supplied fingerprint to a server key
pub trait RsaKeyProvider: Send + Sync {
    fn lookup(&self, fingerprint: i64) -> Option<Arc<RsaKey>>;
}

/// Keys held in memory, indexed by fingerprint
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    keys: HashMap<i64, Arc<RsaKey>>,
}

impl InMemoryKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every configured key
    pub fn from_config(configs: &[RsaKeyConfig]) -> Result<Self> {
        let mut provider = Self::new();
        for config in configs {
            let key = RsaKey::from_hex_components(
                &config.modulus,
                &config.public_exponent,
                &config.private_exponent,
            )?;
            provider.insert(key);
        }
        if provider.is_empty() {
            warn!("No RSA keys configured, every req_DH_params will be rejected");
        } else {
            info!(
                count = provider.len(),
                fingerprints = ?provider.fingerprints(),
                "Loaded RSA keys"
            );
        }
        Ok(provider)
    }

    /// Register a key, returning its fingerprint. A key with the same
    /// fingerprint is replaced.
    pub fn insert(&mut self, key: RsaKey) -> i64 {
        let fingerprint = key.fingerprint();
        self.keys.insert(fingerprint, Arc::new(key));
        fingerprint
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Fingerprints of all registered keys
    pub fn fingerprints(&self) -> Vec<i64> {
        let mut fingerprints: Vec<i64> = self.keys.keys().copied().collect();
        fingerprints.sort_unstable();
        fingerprints
    }
}

impl RsaKeyProvider for InMemoryKeyProvider {
    fn lookup(&self, fingerprint: i64) -> Option<Arc<RsaKey>> {
        self.keys.get(&fingerprint).cloned()
    }
}
