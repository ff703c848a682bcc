//! Temporary AES key derivation from `new_nonce` and `server_nonce`

use crate::crypto::sha1;
use crate::wire::{Int128, Int256};
use zeroize::Zeroizing;

/// Key/IV pair protecting the DH answer
pub struct TempAesKeys {
    pub key: Zeroizing<[u8; 32]>,
    pub iv: Zeroizing<[u8; 32]>,
}

/// Derive `temp_aes_key` and `temp_aes_iv`:
///
/// ```text
/// H1 = SHA1(new_nonce ‖ server_nonce)
/// H2 = SHA1(server_nonce ‖ new_nonce)
/// H3 = SHA1(new_nonce ‖ new_nonce)
/// key = H1[0..20] ‖ H2[0..12]
/// iv  = H2[12..20] ‖ H3[0..20] ‖ new_nonce[0..4]
/// ```
pub fn derive_temp_aes(new_nonce: &Int256, server_nonce: &Int128) -> TempAesKeys {
    let h1 = Zeroizing::new(sha1(&[new_nonce, server_nonce]));
    let h2 = Zeroizing::new(sha1(&[server_nonce, new_nonce]));
    let h3 = Zeroizing::new(sha1(&[new_nonce, new_nonce]));

    let mut key = Zeroizing::new([0u8; 32]);
    key[..20].copy_from_slice(&h1[..]);
    key[20..].copy_from_slice(&h2[..12]);

    let mut iv = Zeroizing::new([0u8; 32]);
    iv[..8].copy_from_slice(&h2[12..]);
    iv[8..28].copy_from_slice(&h3[..]);
    iv[28..].copy_from_slice(&new_nonce[..4]);

    TempAesKeys { key, iv }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = derive_temp_aes(&[7; 32], &[9; 16]);
        let b = derive_temp_aes(&[7; 32], &[9; 16]);
        assert_eq!(*a.key, *b.key);
        assert_eq!(*a.iv, *b.iv);
    }

    #[test]
    fn test_iv_tail_is_nonce_prefix() {
        let mut new_nonce = [0u8; 32];
        new_nonce[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let keys = derive_temp_aes(&new_nonce, &[1; 16]);
        assert_eq!(&keys.iv[28..], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_server_nonce_changes_key() {
        let a = derive_temp_aes(&[7; 32], &[9; 16]);
        let b = derive_temp_aes(&[7; 32], &[8; 16]);
        assert_ne!(*a.key, *b.key);
        // H3 does not depend on server_nonce
        assert_eq!(&a.iv[8..], &b.iv[8..]);
    }
}
