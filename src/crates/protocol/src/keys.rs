//! Server RSA keys and their fingerprints

use crate::crypto::sha1;
use crate::error::{ProtocolError, Result};
use crate::messages::RsaPublicKey;
use crate::wire::WireWriter;
use num_bigint::{BigUint, RandBigInt};
use num_traits::Zero;
use rand::rngs::OsRng;
use std::fmt;

/// Size of an RSA block for a 2048-bit modulus
pub const RSA_BLOCK_SIZE: usize = 256;

const BLINDING_ATTEMPTS: usize = 8;

/// 2048-bit RSA key pair used for raw (unpadded) block operations
#[derive(Clone)]
pub struct RsaKey {
    n: BigUint,
    e: BigUint,
    d: BigUint,
    fingerprint: i64,
}

impl RsaKey {
    /// Build a key from big-endian components. The modulus must be 2048 bits.
    pub fn new(n: BigUint, e: BigUint, d: BigUint) -> Result<Self> {
        if n.bits() != 2048 {
            return Err(ProtocolError::crypto(format!(
                "RSA modulus must be 2048 bits, got {}",
                n.bits()
            )));
        }
        if e.is_zero() || d.is_zero() {
            return Err(ProtocolError::crypto("RSA exponents must be non-zero"));
        }
        let fingerprint = compute_fingerprint(&public_key(&n, &e))?;
        Ok(Self {
            n,
            e,
            d,
            fingerprint,
        })
    }

    /// Build a key from hex-encoded big-endian components
    pub fn from_hex_components(
        modulus: &str,
        public_exponent: &str,
        private_exponent: &str,
    ) -> Result<Self> {
        Self::new(
            parse_hex(modulus)?,
            parse_hex(public_exponent)?,
            parse_hex(private_exponent)?,
        )
    }

    /// Fingerprint the client uses to select this key
    pub fn fingerprint(&self) -> i64 {
        self.fingerprint
    }

    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    /// Public half, as serialized for the fingerprint
    pub fn public_key(&self) -> RsaPublicKey {
        public_key(&self.n, &self.e)
    }

    /// Raw `c^d mod n`, left-padded to 256 bytes.
    ///
    /// The exponentiation runs on `c * r^e` for a fresh random `r` and the
    /// result is unblinded with `r^-1`, so its timing is independent of the
    /// client-chosen block. The result is checked against `m^e == c`.
    pub fn decrypt_block(&self, block: &[u8]) -> Result<[u8; RSA_BLOCK_SIZE]> {
        let input = self.block_to_int(block)?;
        let (r, r_inv) = self.blinding_factor()?;

        let blinded = (&input * r.modpow(&self.e, &self.n)) % &self.n;
        let output = (blinded.modpow(&self.d, &self.n) * r_inv) % &self.n;

        if output.modpow(&self.e, &self.n) != input {
            return Err(ProtocolError::crypto("RSA private operation failed its check"));
        }
        Ok(left_pad(&output.to_bytes_be()))
    }

    /// Raw `m^e mod n`, left-padded to 256 bytes
    pub fn encrypt_block(&self, block: &[u8]) -> Result<[u8; RSA_BLOCK_SIZE]> {
        let input = self.block_to_int(block)?;
        Ok(left_pad(&input.modpow(&self.e, &self.n).to_bytes_be()))
    }

    fn block_to_int(&self, block: &[u8]) -> Result<BigUint> {
        if block.len() != RSA_BLOCK_SIZE {
            return Err(ProtocolError::malformed(format!(
                "RSA block must be {RSA_BLOCK_SIZE} bytes, got {}",
                block.len()
            )));
        }
        let input = BigUint::from_bytes_be(block);
        if input >= self.n {
            return Err(ProtocolError::crypto("RSA block is not below the modulus"));
        }
        Ok(input)
    }

    /// Random `r` in `[2, n)` together with `r^-1 mod n`
    fn blinding_factor(&self) -> Result<(BigUint, BigUint)> {
        let low = BigUint::from(2u32);
        for _ in 0..BLINDING_ATTEMPTS {
            let r = OsRng.gen_biguint_range(&low, &self.n);
            if let Some(r_inv) = r.modinv(&self.n) {
                return Ok((r, r_inv));
            }
        }
        Err(ProtocolError::crypto("No invertible RSA blinding factor"))
    }
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("fingerprint", &self.fingerprint)
            .field("bits", &self.n.bits())
            .finish_non_exhaustive()
    }
}

fn parse_hex(value: &str) -> Result<BigUint> {
    let bytes = hex::decode(value.trim())?;
    if bytes.is_empty() {
        return Err(ProtocolError::malformed("Empty RSA component"));
    }
    Ok(BigUint::from_bytes_be(&bytes))
}

fn public_key(n: &BigUint, e: &BigUint) -> RsaPublicKey {
    RsaPublicKey {
        n: n.to_bytes_be(),
        e: e.to_bytes_be(),
    }
}

/// Low 64 bits of SHA-1 over the bare `n:bytes e:bytes`
fn compute_fingerprint(public: &RsaPublicKey) -> Result<i64> {
    let mut writer = WireWriter::new();
    public.write_fields(&mut writer)?;
    let digest = sha1(&[writer.as_slice()]);
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[12..20]);
    Ok(i64::from_le_bytes(low))
}

fn left_pad(value: &[u8]) -> [u8; RSA_BLOCK_SIZE] {
    let mut out = [0u8; RSA_BLOCK_SIZE];
    out[RSA_BLOCK_SIZE - value.len()..].copy_from_slice(value);
    out
}


#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    #[test]
    fn test_fingerprint() {
        let key = test_key::key();
        assert_eq!(key.fingerprint(), test_key::FINGERPRINT);
        assert_eq!(key.public_key().e, vec![0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_fingerprint_excludes_constructor() {
        let key = test_key::key();
        let mut bare = WireWriter::new();
        bare.write_bytes(&key.modulus().to_bytes_be()).unwrap();
        bare.write_bytes(&[0x01, 0x00, 0x01]).unwrap();
        let digest = sha1(&[bare.as_slice()]);
        assert_eq!(
            key.fingerprint().to_le_bytes(),
            digest[12..20],
            "Fingerprint is taken over n and e only"
        );
    }

    #[test]
    fn test_blinded_decrypt_matches_plain_exponentiation() {
        let key = test_key::key();
        let mut block = [0u8; RSA_BLOCK_SIZE];
        for (i, byte) in block.iter_mut().enumerate().skip(1) {
            *byte = i as u8;
        }
        let plain = BigUint::from_bytes_be(&block).modpow(&key.d, &key.n);

        for _ in 0..3 {
            assert_eq!(
                key.decrypt_block(&block).unwrap(),
                left_pad(&plain.to_bytes_be())
            );
        }
    }

    #[test]
    fn test_blinding_factor_is_fresh_and_invertible() {
        let key = test_key::key();
        let (r1, r1_inv) = key.blinding_factor().unwrap();
        let (r2, _) = key.blinding_factor().unwrap();
        assert_ne!(r1, r2);
        assert!(((&r1 * &r1_inv) % key.modulus()).is_one());
    }

    #[test]
    fn test_raw_roundtrip() {
        let key = test_key::key();
        let mut block = [0x42u8; RSA_BLOCK_SIZE];
        block[0] = 0x00;
        let encrypted = key.encrypt_block(&block).unwrap();
        assert_ne!(encrypted, block);
        assert_eq!(key.decrypt_block(&encrypted).unwrap(), block);
    }

    #[test]
    fn test_small_value_is_left_padded() {
        let key = test_key::key();
        let mut block = [0u8; RSA_BLOCK_SIZE];
        block[RSA_BLOCK_SIZE - 1] = 1;
        // 1^d mod n == 1
        assert_eq!(key.decrypt_block(&block).unwrap(), block);
    }

    #[test]
    fn test_block_size_enforced() {
        let key = test_key::key();
        assert!(matches!(
            key.decrypt_block(&[1u8; 255]),
            Err(ProtocolError::MalformedRecord { .. })
        ));
        assert!(matches!(
            key.decrypt_block(&[0xffu8; RSA_BLOCK_SIZE]),
            Err(ProtocolError::Crypto { .. })
        ));
    }

    #[test]
    fn test_rejects_short_modulus() {
        assert!(RsaKey::from_hex_components("c3", "03", "07").is_err());
        assert!(RsaKey::from_hex_components("zz", "03", "07").is_err());
    }
}
