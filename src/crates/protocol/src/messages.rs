//! Records exchanged during the DH-parameter stage of the key exchange

use crate::error::{ProtocolError, Result};
use crate::wire::{bytes_encoded_len, Int128, Int256, WireFormat, WireReader, WireWriter};

/// Constructor tags of every record this crate understands
pub mod constructors {
    pub const REQ_DH_PARAMS: u32 = 0xd712_e4be;
    pub const P_Q_INNER_DATA: u32 = 0x83c9_5aec;
    pub const P_Q_INNER_DATA_DC: u32 = 0xa9f5_5f95;
    pub const P_Q_INNER_DATA_TEMP: u32 = 0x3c6a_84d4;
    pub const P_Q_INNER_DATA_TEMP_DC: u32 = 0x56fd_df88;
    pub const SERVER_DH_PARAMS_OK: u32 = 0xd0e8_075c;
    pub const SERVER_DH_INNER_DATA: u32 = 0xb589_0dba;
    pub const RPC_ERROR: u32 = 0x2144_ca19;
    pub const RSA_PUBLIC_KEY: u32 = 0x7a19_cb76;
}

/// Client request carrying the RSA-wrapped inner record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqDhParams {
    pub nonce: Int128,
    pub server_nonce: Int128,
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    /// Fingerprint of the server RSA key the client encrypted against
    pub public_key_fingerprint: i64,
    /// RSA-Pad envelope, 256 bytes for a 2048-bit key
    pub encrypted_data: Vec<u8>,
}

impl WireFormat for ReqDhParams {
    fn write_to(&self, writer: &mut WireWriter) -> Result<()> {
        writer.write_constructor(constructors::REQ_DH_PARAMS);
        writer.write_int128(&self.nonce);
        writer.write_int128(&self.server_nonce);
        writer.write_bytes(&self.p)?;
        writer.write_bytes(&self.q)?;
        writer.write_i64(self.public_key_fingerprint);
        writer.write_bytes(&self.encrypted_data)
    }

    fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.expect_constructor(constructors::REQ_DH_PARAMS)?;
        Ok(Self {
            nonce: reader.read_int128()?,
            server_nonce: reader.read_int128()?,
            p: reader.read_bytes()?.to_vec(),
            q: reader.read_bytes()?.to_vec(),
            public_key_fingerprint: reader.read_i64()?,
            encrypted_data: reader.read_bytes()?.to_vec(),
        })
    }

    fn encoded_size(&self) -> Option<usize> {
        Some(
            4 + 16
                + 16
                + bytes_encoded_len(self.p.len())
                + bytes_encoded_len(self.q.len())
                + 8
                + bytes_encoded_len(self.encrypted_data.len()),
        )
    }
}

/// Which of the four inner-record shapes the client sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerDataKind {
    /// `p_q_inner_data`
    PermanentKey,
    /// `p_q_inner_data_dc`
    PermanentKeyWithDc { dc: i32 },
    /// `p_q_inner_data_temp_dc`
    TemporaryKeyWithDc { dc: i32, expires_in: i32 },
    /// `p_q_inner_data_temp`
    TemporaryKey { expires_in: i32 },
}

impl InnerDataKind {
    /// Constructor tag for this shape
    pub fn constructor(&self) -> u32 {
        match self {
            Self::PermanentKey => constructors::P_Q_INNER_DATA,
            Self::PermanentKeyWithDc { .. } => constructors::P_Q_INNER_DATA_DC,
            Self::TemporaryKeyWithDc { .. } => constructors::P_Q_INNER_DATA_TEMP_DC,
            Self::TemporaryKey { .. } => constructors::P_Q_INNER_DATA_TEMP,
        }
    }

    /// Lifetime requested for a temporary key, `None` for permanent keys
    pub fn expires_in(&self) -> Option<i32> {
        match self {
            Self::TemporaryKeyWithDc { expires_in, .. } | Self::TemporaryKey { expires_in } => {
                Some(*expires_in)
            }
            _ => None,
        }
    }

    pub fn dc(&self) -> Option<i32> {
        match self {
            Self::PermanentKeyWithDc { dc } | Self::TemporaryKeyWithDc { dc, .. } => Some(*dc),
            _ => None,
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.expires_in().is_some()
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::PermanentKey => "permanent",
            Self::PermanentKeyWithDc { .. } => "permanent_dc",
            Self::TemporaryKeyWithDc { .. } => "temporary_dc",
            Self::TemporaryKey { .. } => "temporary",
        }
    }
}

/// Plaintext recovered from the RSA-Pad envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PqInnerData {
    pub pq: Vec<u8>,
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    pub nonce: Int128,
    pub server_nonce: Int128,
    pub new_nonce: Int256,
    pub kind: InnerDataKind,
}

impl WireFormat for PqInnerData {
    fn write_to(&self, writer: &mut WireWriter) -> Result<()> {
        writer.write_constructor(self.kind.constructor());
        writer.write_bytes(&self.pq)?;
        writer.write_bytes(&self.p)?;
        writer.write_bytes(&self.q)?;
        writer.write_int128(&self.nonce);
        writer.write_int128(&self.server_nonce);
        writer.write_int256(&self.new_nonce);
        match self.kind {
            InnerDataKind::PermanentKey => {}
            InnerDataKind::PermanentKeyWithDc { dc } => writer.write_i32(dc),
            InnerDataKind::TemporaryKeyWithDc { dc, expires_in } => {
                writer.write_i32(dc);
                writer.write_i32(expires_in);
            }
            InnerDataKind::TemporaryKey { expires_in } => writer.write_i32(expires_in),
        }
        Ok(())
    }

    fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        let constructor = reader.read_constructor()?;
        if !matches!(
            constructor,
            constructors::P_Q_INNER_DATA
                | constructors::P_Q_INNER_DATA_DC
                | constructors::P_Q_INNER_DATA_TEMP_DC
                | constructors::P_Q_INNER_DATA_TEMP
        ) {
            return Err(ProtocolError::unknown_constructor(constructor));
        }

        let pq = reader.read_bytes()?.to_vec();
        let p = reader.read_bytes()?.to_vec();
        let q = reader.read_bytes()?.to_vec();
        let nonce = reader.read_int128()?;
        let server_nonce = reader.read_int128()?;
        let new_nonce = reader.read_int256()?;

        let kind = match constructor {
            constructors::P_Q_INNER_DATA_DC => InnerDataKind::PermanentKeyWithDc {
                dc: reader.read_i32()?,
            },
            constructors::P_Q_INNER_DATA_TEMP_DC => InnerDataKind::TemporaryKeyWithDc {
                dc: reader.read_i32()?,
                expires_in: reader.read_i32()?,
            },
            constructors::P_Q_INNER_DATA_TEMP => InnerDataKind::TemporaryKey {
                expires_in: reader.read_i32()?,
            },
            _ => InnerDataKind::PermanentKey,
        };

        Ok(Self {
            pq,
            p,
            q,
            nonce,
            server_nonce,
            new_nonce,
            kind,
        })
    }

    fn encoded_size(&self) -> Option<usize> {
        let trailer = match self.kind {
            InnerDataKind::PermanentKey => 0,
            InnerDataKind::PermanentKeyWithDc { .. } | InnerDataKind::TemporaryKey { .. } => 4,
            InnerDataKind::TemporaryKeyWithDc { .. } => 8,
        };
        Some(
            4 + bytes_encoded_len(self.pq.len())
                + bytes_encoded_len(self.p.len())
                + bytes_encoded_len(self.q.len())
                + 16
                + 16
                + 32
                + trailer,
        )
    }
}

/// Server's DH answer, encrypted under the temporary AES key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDhInnerData {
    pub nonce: Int128,
    pub server_nonce: Int128,
    pub g: i32,
    /// Big-endian unsigned prime
    pub dh_prime: Vec<u8>,
    /// Big-endian unsigned `g^a mod dh_prime`
    pub g_a: Vec<u8>,
    /// Unix seconds
    pub server_time: i32,
}

impl WireFormat for ServerDhInnerData {
    fn write_to(&self, writer: &mut WireWriter) -> Result<()> {
        writer.write_constructor(constructors::SERVER_DH_INNER_DATA);
        writer.write_int128(&self.nonce);
        writer.write_int128(&self.server_nonce);
        writer.write_i32(self.g);
        writer.write_bytes(&self.dh_prime)?;
        writer.write_bytes(&self.g_a)?;
        writer.write_i32(self.server_time);
        Ok(())
    }

    fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.expect_constructor(constructors::SERVER_DH_INNER_DATA)?;
        Ok(Self {
            nonce: reader.read_int128()?,
            server_nonce: reader.read_int128()?,
            g: reader.read_i32()?,
            dh_prime: reader.read_bytes()?.to_vec(),
            g_a: reader.read_bytes()?.to_vec(),
            server_time: reader.read_i32()?,
        })
    }

    fn encoded_size(&self) -> Option<usize> {
        Some(
            4 + 16
                + 16
                + 4
                + bytes_encoded_len(self.dh_prime.len())
                + bytes_encoded_len(self.g_a.len())
                + 4,
        )
    }
}

/// Successful stage response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDhParamsOk {
    pub nonce: Int128,
    pub server_nonce: Int128,
    pub encrypted_answer: Vec<u8>,
}

impl WireFormat for ServerDhParamsOk {
    fn write_to(&self, writer: &mut WireWriter) -> Result<()> {
        writer.write_constructor(constructors::SERVER_DH_PARAMS_OK);
        writer.write_int128(&self.nonce);
        writer.write_int128(&self.server_nonce);
        writer.write_bytes(&self.encrypted_answer)
    }

    fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.expect_constructor(constructors::SERVER_DH_PARAMS_OK)?;
        Ok(Self {
            nonce: reader.read_int128()?,
            server_nonce: reader.read_int128()?,
            encrypted_answer: reader.read_bytes()?.to_vec(),
        })
    }

    fn encoded_size(&self) -> Option<usize> {
        Some(4 + 16 + 16 + bytes_encoded_len(self.encrypted_answer.len()))
    }
}

/// Error record returned in place of a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub error_code: i32,
    pub error_message: String,
}

impl RpcError {
    pub fn new(error_code: i32, error_message: impl Into<String>) -> Self {
        Self {
            error_code,
            error_message: error_message.into(),
        }
    }
}

impl WireFormat for RpcError {
    fn write_to(&self, writer: &mut WireWriter) -> Result<()> {
        writer.write_constructor(constructors::RPC_ERROR);
        writer.write_i32(self.error_code);
        writer.write_string(&self.error_message)
    }

    fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.expect_constructor(constructors::RPC_ERROR)?;
        Ok(Self {
            error_code: reader.read_i32()?,
            error_message: reader.read_string()?,
        })
    }

    fn encoded_size(&self) -> Option<usize> {
        Some(4 + 4 + bytes_encoded_len(self.error_message.len()))
    }
}

/// Outer response of the DH-parameter stage: exactly one of success or error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhParamsResponse {
    Ok(ServerDhParamsOk),
    Error(RpcError),
}

impl DhParamsResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

impl WireFormat for DhParamsResponse {
    fn write_to(&self, writer: &mut WireWriter) -> Result<()> {
        match self {
            Self::Ok(ok) => ok.write_to(writer),
            Self::Error(err) => err.write_to(writer),
        }
    }

    fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        match reader.peek_constructor()? {
            constructors::SERVER_DH_PARAMS_OK => Ok(Self::Ok(ServerDhParamsOk::read_from(reader)?)),
            constructors::RPC_ERROR => Ok(Self::Error(RpcError::read_from(reader)?)),
            other => Err(ProtocolError::unknown_constructor(other)),
        }
    }

    fn encoded_size(&self) -> Option<usize> {
        match self {
            Self::Ok(ok) => ok.encoded_size(),
            Self::Error(err) => err.encoded_size(),
        }
    }
}

/// Public half of a server RSA key, serialized to compute its fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    /// Big-endian modulus
    pub n: Vec<u8>,
    /// Big-endian public exponent
    pub e: Vec<u8>,
}

impl RsaPublicKey {
    /// `n:bytes e:bytes` without the constructor tag, the form a key
    /// fingerprint is taken over
    pub fn write_fields(&self, writer: &mut WireWriter) -> Result<()> {
        writer.write_bytes(&self.n)?;
        writer.write_bytes(&self.e)
    }
}

impl WireFormat for RsaPublicKey {
    fn write_to(&self, writer: &mut WireWriter) -> Result<()> {
        writer.write_constructor(constructors::RSA_PUBLIC_KEY);
        self.write_fields(writer)
    }

    fn read_from(reader: &mut WireReader<'_>) -> Result<Self> {
        reader.expect_constructor(constructors::RSA_PUBLIC_KEY)?;
        Ok(Self {
            n: reader.read_bytes()?.to_vec(),
            e: reader.read_bytes()?.to_vec(),
        })
    }
}
