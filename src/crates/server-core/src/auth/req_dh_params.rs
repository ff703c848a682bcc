//! `req_DH_params` handling
//!
//! Decrypts the client's RSA-Pad envelope, checks the nonces carried from the
//! earlier stages, derives the temporary AES key and answers with the server's
//! half of the Diffie-Hellman exchange.
//!
//! Every protocol-level rejection becomes an `rpc_error` record with code
//! [`HANDSHAKE_ERROR_CODE`]. Only internal contract violations are returned as
//! `Err`.

use authkey_config::{HandshakeConfig, ServerConfiguration};
use authkey_protocol::dh::{self, DhParams};
use authkey_protocol::kdf::derive_temp_aes;
use authkey_protocol::keys::RSA_BLOCK_SIZE;
use authkey_protocol::messages::{
    DhParamsResponse, PqInnerData, ReqDhParams, RpcError, ServerDhParamsOk,
};
use authkey_protocol::{rsa_pad, OsRandom, ProtocolError, RandomSource, WireFormat};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::keys::{InMemoryKeyProvider, RsaKeyProvider};
use crate::error::{Result, ServerError};
use crate::session::HandshakeSession;

/// Error code of every rejection produced by this stage
pub const HANDSHAKE_ERROR_CODE: i32 = -404;

/// Message sent when the nonces disagree
pub const NONCE_MISMATCH_MESSAGE: &str = "Nonce values did not match.";

/// Why a request was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("No RSA key for fingerprint {fingerprint}")]
    KeyNotFound { fingerprint: i64 },

    #[error("Session has no nonce or server_nonce")]
    SessionIncomplete,

    #[error("RSA-Pad integrity check failed")]
    IntegrityMismatch,

    #[error("{}", NONCE_MISMATCH_MESSAGE)]
    NonceMismatch,

    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

impl HandshakeError {
    pub fn error_code(&self) -> i32 {
        HANDSHAKE_ERROR_CODE
    }

    /// Text placed in the error record; only nonce mismatches carry one
    pub fn error_message(&self) -> &'static str {
        match self {
            Self::NonceMismatch => NONCE_MISMATCH_MESSAGE,
            _ => "",
        }
    }

    pub fn to_rpc_error(&self) -> RpcError {
        RpcError::new(self.error_code(), self.error_message())
    }
}

enum Verdict {
    Accepted(ServerDhParamsOk),
    Rejected(HandshakeError),
    /// Inner record of an unknown kind: the stage answers nothing
    Ignored,
}

/// Handler for the DH-parameter stage
#[derive(Clone)]
pub struct ReqDhParamsHandler {
    keys: Arc<dyn RsaKeyProvider>,
    random: Arc<dyn RandomSource>,
    dh_params: Arc<DhParams>,
    config: HandshakeConfig,
}

impl ReqDhParamsHandler {
    /// Create a handler over the built-in DH group
    pub fn new(
        keys: Arc<dyn RsaKeyProvider>,
        random: Arc<dyn RandomSource>,
        config: HandshakeConfig,
    ) -> Result<Self> {
        Ok(Self {
            keys,
            random,
            dh_params: Arc::new(DhParams::standard()?),
            config,
        })
    }

    /// Handler with in-memory keys from configuration and the OS random source
    pub fn from_config(config: &ServerConfiguration) -> Result<Self> {
        let keys = InMemoryKeyProvider::from_config(&config.rsa_keys)?;
        Self::new(Arc::new(keys), Arc::new(OsRandom), config.handshake.clone())
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Run the stage for a decoded request
    ///
    /// Returns `Ok(None)` when the inner record has an unknown tag.
    pub fn process(
        &self,
        request: &ReqDhParams,
        session: &mut HandshakeSession,
    ) -> Result<Option<DhParamsResponse>> {
        Ok(match self.negotiate(request, session)? {
            Verdict::Accepted(ok) => Some(DhParamsResponse::Ok(ok)),
            Verdict::Rejected(err) => Some(DhParamsResponse::Error(err.to_rpc_error())),
            Verdict::Ignored => None,
        })
    }

    /// Decode a raw `req_DH_params`, run the stage and encode the response
    pub fn process_bytes(
        &self,
        bytes: &[u8],
        session: &mut HandshakeSession,
    ) -> Result<Option<Vec<u8>>> {
        let request = ReqDhParams::decode(bytes)?;
        match self.process(&request, session)? {
            Some(response) => Ok(Some(response.encode()?)),
            None => Ok(None),
        }
    }

    /// Async entry point. The CPU-bound stage moves to the blocking pool
    /// unless `offload_dh_to_blocking_pool` is off.
    pub async fn handle(
        &self,
        request: ReqDhParams,
        session: Arc<Mutex<HandshakeSession>>,
    ) -> Result<Option<DhParamsResponse>> {
        if !self.config.offload_dh_to_blocking_pool {
            let mut guard = session.lock().await;
            return self.process(&request, &mut guard);
        }

        let handler = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = session.blocking_lock();
            handler.process(&request, &mut guard)
        })
        .await?
    }

    fn negotiate(&self, request: &ReqDhParams, session: &mut HandshakeSession) -> Result<Verdict> {
        let fingerprint = request.public_key_fingerprint;
        let Some(key) = self.keys.lookup(fingerprint) else {
            debug!(fingerprint, "Could not obtain the RSA Key.");
            return Ok(Verdict::Rejected(HandshakeError::KeyNotFound { fingerprint }));
        };

        let (Some(&session_nonce), Some(&session_server_nonce)) =
            (session.nonce(), session.server_nonce())
        else {
            debug!("Session is empty.");
            return Ok(Verdict::Rejected(HandshakeError::SessionIncomplete));
        };

        if request.encrypted_data.len() != RSA_BLOCK_SIZE {
            debug!(
                len = request.encrypted_data.len(),
                "Encrypted data is not one RSA block."
            );
            return Ok(Verdict::Rejected(HandshakeError::MalformedRecord(format!(
                "encrypted_data must be {RSA_BLOCK_SIZE} bytes"
            ))));
        }

        let pad = match rsa_pad::unwrap(&request.encrypted_data, &key) {
            Ok(pad) => pad,
            Err(err) => {
                debug!(error = %err, "RSA-Pad could not be reversed.");
                return Ok(Verdict::Rejected(HandshakeError::IntegrityMismatch));
            }
        };
        if !pad.is_intact() {
            debug!("SHA256 did not match.");
            return Ok(Verdict::Rejected(HandshakeError::IntegrityMismatch));
        }

        let inner = match PqInnerData::decode(pad.payload()) {
            Ok(inner) => inner,
            Err(ProtocolError::UnknownConstructor { constructor }) => {
                debug!(constructor = %format_args!("{constructor:#010x}"), "Unknown inner record.");
                return Ok(Verdict::Ignored);
            }
            Err(err) => {
                debug!(error = %err, "Inner record is malformed.");
                return Ok(Verdict::Rejected(HandshakeError::MalformedRecord(
                    err.to_string(),
                )));
            }
        };

        let nonces_match = request.nonce == inner.nonce
            && request.nonce == session_nonce
            && request.server_nonce == inner.server_nonce
            && request.server_nonce == session_server_nonce;
        if !nonces_match {
            debug!("Nonce values did not match.");
            return Ok(Verdict::Rejected(HandshakeError::NonceMismatch));
        }

        let now = Utc::now();
        let server_time = wire_server_time(now)?;

        let kind = inner.kind;
        if let Some(expires_in) = kind.expires_in() {
            session.set_temp_auth_key(true)?;
            session.set_temp_auth_key_expires_in(expires_in)?;
        }
        session.set_new_nonce(inner.new_nonce)?;

        let temp_keys = derive_temp_aes(&inner.new_nonce, &session_server_nonce);
        session.set_temp_aes_key(*temp_keys.key)?;
        session.set_temp_aes_iv(*temp_keys.iv)?;

        let key_pair = match dh::generate(
            &self.dh_params,
            self.random.as_ref(),
            self.config.max_dh_attempts,
        ) {
            Ok(key_pair) => key_pair,
            Err(ProtocolError::DhBudgetExhausted { attempts }) => {
                error!(attempts, "No in-range g_a within the DH resample budget");
                return Err(ServerError::DhBudgetExhausted { attempts });
            }
            Err(err) => return Err(err.into()),
        };
        session.set_g(key_pair.g)?;
        session.set_a(key_pair.a.to_vec())?;
        session.set_g_a(key_pair.g_a.clone())?;

        let answer = dh::build_answer(
            &self.dh_params,
            &key_pair,
            session_nonce,
            session_server_nonce,
            server_time,
        );
        let encrypted_answer = dh::encrypt_answer(&answer, &temp_keys)?;

        if let Some(expires_in) = kind.expires_in() {
            session.set_valid_until(now + chrono::Duration::seconds(expires_in.into()))?;
        }

        info!(
            kind = kind.name(),
            dc = ?kind.dc(),
            dh_attempts = key_pair.attempts,
            "DH parameters accepted"
        );
        Ok(Verdict::Accepted(ServerDhParamsOk {
            nonce: request.nonce,
            server_nonce: request.server_nonce,
            encrypted_answer,
        }))
    }
}

/// `server_time` is a 32-bit field on the wire
fn wire_server_time(now: DateTime<Utc>) -> Result<i32> {
    i32::try_from(now.timestamp()).map_err(|_| {
        ServerError::Internal(format!(
            "Server time {} does not fit in a 32-bit server_time",
            now.timestamp()
        ))
    })
}
