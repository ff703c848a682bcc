//! Cryptographic primitives used by the DH-parameter stage
//!
//! - AES-256 in IGE (Infinite Garble Extension) mode, built over the raw block cipher
//! - SHA-1 / SHA-256 helpers
//! - Constant-time comparison and secure random bytes

use crate::error::{ProtocolError, Result};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// AES-256 key size in bytes
pub const AES_KEY_SIZE: usize = 32;

/// IGE initialization vector size (two AES blocks)
pub const IGE_IV_SIZE: usize = 32;

/// AES-256-IGE cipher
///
/// The IV holds the "previous ciphertext" block in its first half and the
/// "previous plaintext" block in its second half.
pub struct AesIge {
    cipher: Aes256,
    iv: Zeroizing<[u8; IGE_IV_SIZE]>,
}

impl AesIge {
    /// Create a cipher for the given key and IV
    pub fn new(key: &[u8; AES_KEY_SIZE], iv: &[u8; IGE_IV_SIZE]) -> Self {
        Self {
            cipher: Aes256::new(GenericArray::from_slice(key)),
            iv: Zeroizing::new(*iv),
        }
    }

    /// Encrypt `data` in place. Length must be a multiple of 16.
    pub fn encrypt_in_place(&self, data: &mut [u8]) -> Result<()> {
        check_block_aligned(data.len())?;

        let mut prev_cipher = [0u8; AES_BLOCK_SIZE];
        let mut prev_plain = Zeroizing::new([0u8; AES_BLOCK_SIZE]);
        prev_cipher.copy_from_slice(&self.iv[..AES_BLOCK_SIZE]);
        prev_plain.copy_from_slice(&self.iv[AES_BLOCK_SIZE..]);

        for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut plain = Zeroizing::new([0u8; AES_BLOCK_SIZE]);
            plain.copy_from_slice(chunk);

            xor_in_place(chunk, &prev_cipher);
            self.cipher
                .encrypt_block(GenericArray::from_mut_slice(chunk));
            xor_in_place(chunk, &prev_plain[..]);

            prev_cipher.copy_from_slice(chunk);
            *prev_plain = *plain;
        }
        Ok(())
    }

    /// Decrypt `data` in place. Length must be a multiple of 16.
    pub fn decrypt_in_place(&self, data: &mut [u8]) -> Result<()> {
        check_block_aligned(data.len())?;

        let mut prev_cipher = [0u8; AES_BLOCK_SIZE];
        let mut prev_plain = Zeroizing::new([0u8; AES_BLOCK_SIZE]);
        prev_cipher.copy_from_slice(&self.iv[..AES_BLOCK_SIZE]);
        prev_plain.copy_from_slice(&self.iv[AES_BLOCK_SIZE..]);

        for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut cipher_block = [0u8; AES_BLOCK_SIZE];
            cipher_block.copy_from_slice(chunk);

            xor_in_place(chunk, &prev_plain[..]);
            self.cipher
                .decrypt_block(GenericArray::from_mut_slice(chunk));
            xor_in_place(chunk, &prev_cipher);

            prev_plain.copy_from_slice(chunk);
            prev_cipher = cipher_block;
        }
        Ok(())
    }
}

fn check_block_aligned(len: usize) -> Result<()> {
    if len % AES_BLOCK_SIZE != 0 {
        return Err(ProtocolError::crypto(format!(
            "IGE input length {len} is not a multiple of {AES_BLOCK_SIZE}"
        )));
    }
    Ok(())
}

/// XOR `mask` into `target` byte-wise over their common length
pub fn xor_in_place(target: &mut [u8], mask: &[u8]) {
    for (t, m) in target.iter_mut().zip(mask) {
        *t ^= m;
    }
}

/// SHA-1 over the concatenation of `parts`
pub fn sha1(parts: &[&[u8]]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// SHA-256 over the concatenation of `parts`
pub fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Constant-time comparison
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq<const N: usize>(start: u8) -> [u8; N] {
        let mut out = [0u8; N];
        for (i, b) in out.iter_mut().enumerate() {
            *b = start.wrapping_add(i as u8);
        }
        out
    }

    #[test]
    fn test_ige_known_vector() {
        let cipher = AesIge::new(&seq(0), &seq(32));
        let mut data: [u8; 48] = seq(64);
        cipher.encrypt_in_place(&mut data).unwrap();
        assert_eq!(
            hex::encode(data),
            "b6b23cb46d2f43de2c67fc9a3a9e35104fad6ed15177969c1cebc616bcfa482c\
             b220e4d159bedfd570df191a805e9d9d"
        );

        cipher.decrypt_in_place(&mut data).unwrap();
        assert_eq!(data, seq::<48>(64));
    }

    #[test]
    fn test_ige_zero_key_zero_iv() {
        let cipher = AesIge::new(&[0; 32], &[0; 32]);
        let mut data = [0u8; 32];
        cipher.encrypt_in_place(&mut data).unwrap();
        assert_eq!(
            hex::encode(data),
            "dc95c078a2408989ad48a2149284208708c374848c228233c2b34f332bd2e9d3"
        );
    }

    #[test]
    fn test_ige_rejects_partial_block() {
        let cipher = AesIge::new(&[1; 32], &[2; 32]);
        let mut data = [0u8; 20];
        assert!(matches!(
            cipher.encrypt_in_place(&mut data),
            Err(ProtocolError::Crypto { .. })
        ));
        assert!(cipher.decrypt_in_place(&mut data).is_err());
    }

    #[test]
    fn test_ige_empty_input() {
        let cipher = AesIge::new(&[1; 32], &[2; 32]);
        let mut data: [u8; 0] = [];
        assert!(cipher.encrypt_in_place(&mut data).is_ok());
    }

    #[test]
    fn test_hash_concatenation() {
        assert_eq!(sha1(&[b"ab", b"c"]), sha1(&[b"abc"]));
        assert_eq!(
            hex::encode(sha1(&[b"abc"])),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hex::encode(sha256(&[b"a", b"bc"])),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_constant_time_eq() {
        let a = [1, 2, 3, 4];
        let b = [1, 2, 3, 4];
        let c = [1, 2, 3, 5];

        assert!(constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, &c));
        assert!(!constant_time_eq(&a, &c[..3]));
    }
}
