//! RSA-Pad envelope
//!
//! Layout of the 256-byte RSA plaintext:
//!
//! ```text
//! ┌───────────────────────┬──────────────────────────────────────────────┐
//! │ key ^ SHA256(cipher)  │ cipher = AES-IGE(key, 0) of                  │
//! │ 32 bytes              │   reverse(pad) (192) ‖ SHA256(key ‖ pad) (32)│
//! └───────────────────────┴──────────────────────────────────────────────┘
//! ```

use crate::crypto::{constant_time_eq, generate_random_bytes, sha256, xor_in_place, AesIge};
use crate::error::{ProtocolError, Result};
use crate::keys::{RsaKey, RSA_BLOCK_SIZE};
use zeroize::Zeroizing;

/// Size of the temporary AES key prefix
pub const TEMP_KEY_SIZE: usize = 32;

/// Size of the padded payload carried by the envelope
pub const PAD_SIZE: usize = 192;

const HASH_OFFSET: usize = TEMP_KEY_SIZE + PAD_SIZE;

/// Decrypted envelope: `key ‖ pad ‖ stored_hash`, plus the recomputed hash
pub struct UnwrappedPad {
    data: Zeroizing<[u8; RSA_BLOCK_SIZE]>,
    check_hash: [u8; 32],
}

impl UnwrappedPad {
    /// Temporary AES key recovered from the mask
    pub fn temp_key(&self) -> &[u8] {
        &self.data[..TEMP_KEY_SIZE]
    }

    /// The 192-byte payload, inner record first, random padding after
    pub fn payload(&self) -> &[u8] {
        &self.data[TEMP_KEY_SIZE..HASH_OFFSET]
    }

    /// Hash the client stored after the reversed payload
    pub fn stored_hash(&self) -> &[u8] {
        &self.data[HASH_OFFSET..]
    }

    /// `SHA256(key ‖ pad)` recomputed on this side
    pub fn check_hash(&self) -> &[u8; 32] {
        &self.check_hash
    }

    /// Whether the recomputed hash matches the stored one
    pub fn is_intact(&self) -> bool {
        constant_time_eq(&self.check_hash, self.stored_hash())
    }
}

/// Reverse the envelope. The integrity verdict is left to [`UnwrappedPad::is_intact`].
pub fn unwrap(encrypted: &[u8], key: &RsaKey) -> Result<UnwrappedPad> {
    let mut data = Zeroizing::new(key.decrypt_block(encrypted)?);

    let mask = sha256(&[&data[TEMP_KEY_SIZE..]]);
    let (temp_key, cipher) = data.split_at_mut(TEMP_KEY_SIZE);
    xor_in_place(temp_key, &mask);

    let mut aes_key = Zeroizing::new([0u8; TEMP_KEY_SIZE]);
    aes_key.copy_from_slice(temp_key);
    AesIge::new(&aes_key, &[0u8; 32]).decrypt_in_place(cipher)?;
    cipher[..PAD_SIZE].reverse();

    let check_hash = sha256(&[&aes_key[..], &cipher[..PAD_SIZE]]);
    Ok(UnwrappedPad { data, check_hash })
}

/// Unwrap and fail with `IntegrityMismatch` unless the stored hash matches
pub fn unwrap_verified(encrypted: &[u8], key: &RsaKey) -> Result<UnwrappedPad> {
    let pad = unwrap(encrypted, key)?;
    if !pad.is_intact() {
        return Err(ProtocolError::IntegrityMismatch);
    }
    Ok(pad)
}

/// Client side: wrap up to 192 bytes of `payload` for `key`.
///
/// A fresh temporary key is drawn until the envelope falls below the modulus.
pub fn wrap(payload: &[u8], key: &RsaKey) -> Result<Vec<u8>> {
    if payload.len() > PAD_SIZE {
        return Err(ProtocolError::malformed(format!(
            "RSA-Pad payload too long: {} bytes (max: {PAD_SIZE})",
            payload.len()
        )));
    }

    let mut pad = Zeroizing::new([0u8; PAD_SIZE]);
    pad[..payload.len()].copy_from_slice(payload);
    pad[payload.len()..].copy_from_slice(&generate_random_bytes(PAD_SIZE - payload.len()));

    loop {
        let mut temp_key = Zeroizing::new([0u8; TEMP_KEY_SIZE]);
        temp_key.copy_from_slice(&generate_random_bytes(TEMP_KEY_SIZE));

        let mut block = Zeroizing::new([0u8; RSA_BLOCK_SIZE]);
        let (head, cipher) = block.split_at_mut(TEMP_KEY_SIZE);
        cipher[..PAD_SIZE].copy_from_slice(&pad[..]);
        cipher[..PAD_SIZE].reverse();
        cipher[PAD_SIZE..].copy_from_slice(&sha256(&[&temp_key[..], &pad[..]]));
        AesIge::new(&temp_key, &[0u8; 32]).encrypt_in_place(cipher)?;

        head.copy_from_slice(&temp_key[..]);
        xor_in_place(head, &sha256(&[&cipher[..]]));

        if num_bigint::BigUint::from_bytes_be(&block[..]) < *key.modulus() {
            return Ok(key.encrypt_block(&block[..])?.to_vec());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::test_key;

    #[test]
    fn test_wrap_unwrap() {
        let key = test_key::key();
        let payload = b"inner record bytes";
        let encrypted = wrap(payload, &key).unwrap();
        assert_eq!(encrypted.len(), RSA_BLOCK_SIZE);

        let pad = unwrap_verified(&encrypted, &key).unwrap();
        assert!(pad.is_intact());
        assert_eq!(&pad.payload()[..payload.len()], payload);
        assert_eq!(pad.payload().len(), PAD_SIZE);
        assert_eq!(
            pad.check_hash(),
            &sha256(&[pad.temp_key(), pad.payload()])
        );
    }

    // Built outside this crate for the fixture key: temp key 00..1f, payload
    // "inner record bytes" followed by bytes a0, a1, ...
    const KNOWN_ENVELOPE: &str = "05832c9608c36575c5d696cfbd22b8b7ec12f92ed808ad5e9e3f94ddeb3d3ca73dd7ff080d76099d99f49155af056a38353dcbcbf7ffaa3f8af0fd60cc3b2ccb427b88371bc53ef77436bceee0927e57ceaddebcc25f864639aa016501366492e24e3693b00fb1e0f204f08450ef83ef61d5f97fade4907dc19e39f9bac496fa6fe83aa2e1665f91f7bc864fa492a15a3c790198a1ff31a2318e0c6a09ca0e33fc01664b658150e220fc04a1def62d8f694919fa9e51fd7345c76e620456da275815d82e5f7d6ecd6c89b5b11ed1c0f0508779a67a70aed3830c944a678ba5434727a2441d8a617add4d2995f16b6bd74d5e0b611c3e8b15edc52bd7e90813da";
    const KNOWN_CHECK_HASH: &str =
        "7dc1e1caed0f4392b59275707f54010f181e5fb53321afde4f2dedcab3a84ee8";

    #[test]
    fn test_unwrap_known_envelope() {
        let key = test_key::key();
        let encrypted = hex::decode(KNOWN_ENVELOPE).unwrap();

        let pad = unwrap_verified(&encrypted, &key).unwrap();

        let temp_key: Vec<u8> = (0u8..32).collect();
        assert_eq!(pad.temp_key(), temp_key.as_slice());

        let payload = b"inner record bytes";
        let mut expected = payload.to_vec();
        expected.extend((0..PAD_SIZE - payload.len()).map(|i| 0xa0u8.wrapping_add(i as u8)));
        assert_eq!(pad.payload(), expected.as_slice());

        assert_eq!(hex::encode(pad.check_hash()), KNOWN_CHECK_HASH);
        assert_eq!(hex::encode(pad.stored_hash()), KNOWN_CHECK_HASH);
    }

    #[test]
    fn test_corrupted_ciphertext_detected() {
        let key = test_key::key();
        let mut encrypted = wrap(b"payload", &key).unwrap();
        encrypted[200] ^= 0x01;
        match unwrap(&encrypted, &key) {
            Ok(pad) => assert!(!pad.is_intact()),
            // The flipped block may land at or above the modulus
            Err(err) => assert!(matches!(err, ProtocolError::Crypto { .. })),
        }
    }

    #[test]
    fn test_unwrap_verified_rejects_garbage() {
        let key = test_key::key();
        let mut block = [0u8; RSA_BLOCK_SIZE];
        block[RSA_BLOCK_SIZE - 1] = 7;
        assert_eq!(
            unwrap_verified(&block, &key).err(),
            Some(ProtocolError::IntegrityMismatch)
        );
    }

    #[test]
    fn test_wrap_rejects_oversized_payload() {
        let key = test_key::key();
        assert!(wrap(&[0u8; PAD_SIZE + 1], &key).is_err());
        assert!(wrap(&[0u8; PAD_SIZE], &key).is_ok());
    }
}
