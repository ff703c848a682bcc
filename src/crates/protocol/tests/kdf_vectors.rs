//! Golden vectors for the temporary AES key derivation

use authkey_protocol::kdf::derive_temp_aes;

fn hex32(s: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&hex::decode(s).unwrap());
    out
}

#[test]
fn zero_new_nonce_ff_server_nonce() {
    let keys = derive_temp_aes(&[0x00; 32], &[0xff; 16]);
    assert_eq!(
        *keys.key,
        hex32("35f606ce06637d658336c6cb461874077e594291482bbe4300e376717618fcc5")
    );
    assert_eq!(
        *keys.iv,
        hex32("07c904883d5d7ac5c8d7d0ef0eedfa82d2ea1aa592845b9a6d4b02b700000000")
    );
}

#[test]
fn counting_nonces() {
    let mut new_nonce = [0u8; 32];
    for (i, b) in new_nonce.iter_mut().enumerate() {
        *b = i as u8;
    }
    let mut server_nonce = [0u8; 16];
    for (i, b) in server_nonce.iter_mut().enumerate() {
        *b = 100 + i as u8;
    }

    let keys = derive_temp_aes(&new_nonce, &server_nonce);
    assert_eq!(
        *keys.key,
        hex32("712f8fa051fa2182c9f0092e4a4a03cdfe8d31ea8511ee48b1376fcebfc89896")
    );
    assert_eq!(
        *keys.iv,
        hex32("b1000d81f5b44f4de864070e166e6218f6783e8511471a5ab7802cf200010203")
    );
}
