//! Per-connection handshake state
//!
//! Every key is write-once for the lifetime of a handshake attempt. A second
//! write is a programming error and surfaces as
//! [`ServerError::SessionKeyAlreadySet`] rather than silently overwriting.

use authkey_protocol::{Int128, Int256};
use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{Result, ServerError};

/// Handshake state accumulated across stages
#[derive(Default)]
pub struct HandshakeSession {
    nonce: Option<Int128>,
    server_nonce: Option<Int128>,
    new_nonce: Option<Zeroizing<Int256>>,
    temp_aes_key: Option<Zeroizing<[u8; 32]>>,
    temp_aes_iv: Option<Zeroizing<[u8; 32]>>,
    g: Option<i32>,
    a: Option<Zeroizing<Vec<u8>>>,
    g_a: Option<Vec<u8>>,
    temp_auth_key: Option<bool>,
    temp_auth_key_expires_in: Option<i32>,
    valid_until: Option<DateTime<Utc>>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, key: &'static str) -> Result<()> {
    if slot.is_some() {
        return Err(ServerError::SessionKeyAlreadySet(key));
    }
    *slot = Some(value);
    Ok(())
}

impl HandshakeSession {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Session as left by the earlier stages: both nonces present
    pub fn with_nonces(nonce: Int128, server_nonce: Int128) -> Self {
        Self {
            nonce: Some(nonce),
            server_nonce: Some(server_nonce),
            ..Self::default()
        }
    }

    pub fn nonce(&self) -> Option<&Int128> {
        self.nonce.as_ref()
    }

    pub fn server_nonce(&self) -> Option<&Int128> {
        self.server_nonce.as_ref()
    }

    pub fn new_nonce(&self) -> Option<&Int256> {
        self.new_nonce.as_deref()
    }

    pub fn temp_aes_key(&self) -> Option<&[u8; 32]> {
        self.temp_aes_key.as_deref()
    }

    pub fn temp_aes_iv(&self) -> Option<&[u8; 32]> {
        self.temp_aes_iv.as_deref()
    }

    pub fn g(&self) -> Option<i32> {
        self.g
    }

    /// Big-endian DH private exponent
    pub fn a(&self) -> Option<&[u8]> {
        self.a.as_deref().map(Vec::as_slice)
    }

    /// Big-endian DH public value
    pub fn g_a(&self) -> Option<&[u8]> {
        self.g_a.as_deref()
    }

    /// `Some(true)` once a temporary key was requested
    pub fn temp_auth_key(&self) -> Option<bool> {
        self.temp_auth_key
    }

    pub fn temp_auth_key_expires_in(&self) -> Option<i32> {
        self.temp_auth_key_expires_in
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    pub fn set_nonce(&mut self, value: Int128) -> Result<()> {
        set_once(&mut self.nonce, value, "nonce")
    }

    pub fn set_server_nonce(&mut self, value: Int128) -> Result<()> {
        set_once(&mut self.server_nonce, value, "server_nonce")
    }

    pub fn set_new_nonce(&mut self, value: Int256) -> Result<()> {
        set_once(&mut self.new_nonce, Zeroizing::new(value), "new_nonce")
    }

    pub fn set_temp_aes_key(&mut self, value: [u8; 32]) -> Result<()> {
        set_once(&mut self.temp_aes_key, Zeroizing::new(value), "temp_aes_key")
    }

    pub fn set_temp_aes_iv(&mut self, value: [u8; 32]) -> Result<()> {
        set_once(&mut self.temp_aes_iv, Zeroizing::new(value), "temp_aes_iv")
    }

    pub fn set_g(&mut self, value: i32) -> Result<()> {
        set_once(&mut self.g, value, "g")
    }

    pub fn set_a(&mut self, value: Vec<u8>) -> Result<()> {
        set_once(&mut self.a, Zeroizing::new(value), "a")
    }

    pub fn set_g_a(&mut self, value: Vec<u8>) -> Result<()> {
        set_once(&mut self.g_a, value, "g_a")
    }

    pub fn set_temp_auth_key(&mut self, value: bool) -> Result<()> {
        set_once(&mut self.temp_auth_key, value, "temp_auth_key")
    }

    pub fn set_temp_auth_key_expires_in(&mut self, value: i32) -> Result<()> {
        set_once(
            &mut self.temp_auth_key_expires_in,
            value,
            "temp_auth_key_expires_in",
        )
    }

    pub fn set_valid_until(&mut self, value: DateTime<Utc>) -> Result<()> {
        set_once(&mut self.valid_until, value, "valid_until")
    }

    /// Names of the keys currently set, in declaration order
    pub fn keys(&self) -> Vec<&'static str> {
        let slots = [
            ("nonce", self.nonce.is_some()),
            ("server_nonce", self.server_nonce.is_some()),
            ("new_nonce", self.new_nonce.is_some()),
            ("temp_aes_key", self.temp_aes_key.is_some()),
            ("temp_aes_iv", self.temp_aes_iv.is_some()),
            ("g", self.g.is_some()),
            ("a", self.a.is_some()),
            ("g_a", self.g_a.is_some()),
            ("temp_auth_key", self.temp_auth_key.is_some()),
            ("temp_auth_key_expires_in", self.temp_auth_key_expires_in.is_some()),
            ("valid_until", self.valid_until.is_some()),
        ];
        slots
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect()
    }
}

impl fmt::Debug for HandshakeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key names only, never values
        f.debug_struct("HandshakeSession")
            .field("keys", &self.keys())
            .field("valid_until", &self.valid_until)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_once() {
        let mut session = HandshakeSession::new();
        session.set_g(3).unwrap();
        assert!(matches!(
            session.set_g(4),
            Err(ServerError::SessionKeyAlreadySet("g"))
        ));
        assert_eq!(session.g(), Some(3));
    }

    #[test]
    fn test_with_nonces() {
        let session = HandshakeSession::with_nonces([1; 16], [2; 16]);
        assert_eq!(session.nonce(), Some(&[1; 16]));
        assert_eq!(session.server_nonce(), Some(&[2; 16]));
        assert_eq!(session.keys(), vec!["nonce", "server_nonce"]);
    }

    #[test]
    fn test_secret_accessors() {
        let mut session = HandshakeSession::new();
        session.set_a(vec![0x0f, 0x42]).unwrap();
        session.set_new_nonce([9; 32]).unwrap();
        assert_eq!(session.a(), Some(&[0x0f, 0x42][..]));
        assert_eq!(session.new_nonce(), Some(&[9; 32]));
        assert!(session.set_new_nonce([8; 32]).is_err());
    }

    #[test]
    fn test_debug_hides_values() {
        let mut session = HandshakeSession::with_nonces([0xab; 16], [0xcd; 16]);
        session.set_temp_aes_key([0xee; 32]).unwrap();
        let rendered = format!("{session:?}");
        assert!(rendered.contains("temp_aes_key"));
        assert!(!rendered.contains("171"));
        assert!(!rendered.contains("238"));
    }
}
