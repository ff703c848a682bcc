//! Server half of the Diffie-Hellman exchange and the encrypted answer

use crate::crypto::{constant_time_eq, generate_random_bytes, sha1, AesIge, AES_BLOCK_SIZE};
use crate::error::{ProtocolError, Result};
use crate::kdf::TempAesKeys;
use crate::messages::ServerDhInnerData;
use crate::random::RandomSource;
use crate::wire::{Int128, WireFormat, WireReader};
use num_bigint::BigUint;
use num_traits::One;
use tracing::warn;
use zeroize::Zeroizing;

/// Fixed 2048-bit safe prime, big-endian hex
pub const DH_PRIME_HEX: &str = "\
C71CAEB9C6B1C9048E6C522F70F13F73980D40238E3E21C14934D037563D930F\
48198A0AA7C14058229493D22530F4DBFA336F6E0AC925139543AED44CCE7C37\
20FD51F69458705AC68CD4FE6B6B13ABDC9746512969328454F18FAF8C595F64\
2477FE96BB2A941D5BCD1D4AC8CC49880708FA9B378E3C4F3A9060BEE67CF9A4\
A4A695811051907E162753B56B0F6B410DBA74D8A84B2A14B3144E0EF1284754\
FD17ED950D5965B4B9DD46582DB1178D169C6BC465B0D6FF9CA3928FEF5B9AE4\
E418FC15E83EBEA0F87FA9FF5EED70050DED2849F47BF959D956850CE929851F\
0D8115F635B105EE2E4E15D04B2454BF6F4FADF034B10403119CD8E3B92FCC5B";

/// Generators the server may pick
pub const GENERATORS: [i32; 3] = [3, 4, 7];

/// Prime size in bits
pub const PRIME_BITS: u64 = 2048;

/// `g_a` must keep this many bits of distance from both 0 and the prime
pub const SAFETY_MARGIN_BITS: u64 = 64;

/// Default cap on `a` resampling
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1024;

/// The group and the accepted range for public values
#[derive(Debug, Clone)]
pub struct DhParams {
    prime: BigUint,
    prime_bytes: Vec<u8>,
    min: BigUint,
    max: BigUint,
}

impl DhParams {
    /// The built-in group
    pub fn standard() -> Result<Self> {
        let bytes = hex::decode(DH_PRIME_HEX)
            .map_err(|e| ProtocolError::crypto(format!("Corrupt DH prime constant: {e}")))?;
        Self::from_prime(BigUint::from_bytes_be(&bytes))
    }

    /// Use a custom 2048-bit prime
    pub fn from_prime(prime: BigUint) -> Result<Self> {
        if prime.bits() != PRIME_BITS {
            return Err(ProtocolError::crypto(format!(
                "DH prime must be {PRIME_BITS} bits, got {}",
                prime.bits()
            )));
        }
        let min = BigUint::one() << (PRIME_BITS - SAFETY_MARGIN_BITS);
        let max = &prime - &min;
        Ok(Self {
            prime_bytes: prime.to_bytes_be(),
            prime,
            min,
            max,
        })
    }

    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    /// Big-endian unsigned prime as sent on the wire
    pub fn prime_bytes(&self) -> &[u8] {
        &self.prime_bytes
    }

    /// `2^1984 < value < prime - 2^1984`
    pub fn is_in_safe_range(&self, value: &BigUint) -> bool {
        *value > self.min && *value < self.max
    }
}

/// Server DH secret and public value
pub struct DhKeyPair {
    pub g: i32,
    /// Big-endian private exponent
    pub a: Zeroizing<Vec<u8>>,
    /// Big-endian `g^a mod p`
    pub g_a: Vec<u8>,
    /// Number of exponents drawn, 1 when no resample was needed
    pub attempts: u32,
}

/// Draw `a` in `[2, p-2]` and a generator, resampling `a` until `g_a` is in range.
pub fn generate<R>(params: &DhParams, rng: &R, max_attempts: u32) -> Result<DhKeyPair>
where
    R: RandomSource + ?Sized,
{
    let low = BigUint::from(2u32);
    let high = params.prime() - BigUint::one();

    let mut a = rng.random_integer(&low, &high);
    let g = GENERATORS[rng.random_index(GENERATORS.len()) % GENERATORS.len()];
    let base = BigUint::from(g as u32);
    let mut g_a = base.modpow(&a, params.prime());
    let mut attempts = 1;

    while !params.is_in_safe_range(&g_a) {
        if attempts >= max_attempts {
            return Err(ProtocolError::DhBudgetExhausted { attempts });
        }
        warn!(attempt = attempts, generator = g, "g_a out of range, resampling");
        a = rng.random_integer(&low, &high);
        g_a = base.modpow(&a, params.prime());
        attempts += 1;
    }

    Ok(DhKeyPair {
        g,
        a: Zeroizing::new(a.to_bytes_be()),
        g_a: g_a.to_bytes_be(),
        attempts,
    })
}

/// Assemble the answer record for `key_pair`
pub fn build_answer(
    params: &DhParams,
    key_pair: &DhKeyPair,
    nonce: Int128,
    server_nonce: Int128,
    server_time: i32,
) -> ServerDhInnerData {
    ServerDhInnerData {
        nonce,
        server_nonce,
        g: key_pair.g,
        dh_prime: params.prime_bytes().to_vec(),
        g_a: key_pair.g_a.clone(),
        server_time,
    }
}

/// `AES-IGE(SHA1(answer) ‖ answer ‖ random padding to 16)`
pub fn encrypt_answer(answer: &ServerDhInnerData, keys: &TempAesKeys) -> Result<Vec<u8>> {
    let encoded = answer.encode()?;
    let digest = sha1(&[encoded.as_slice()]);

    let len = digest.len() + encoded.len();
    let padded_len = len.div_ceil(AES_BLOCK_SIZE) * AES_BLOCK_SIZE;

    let mut buf = Vec::with_capacity(padded_len);
    buf.extend_from_slice(&digest);
    buf.extend_from_slice(&encoded);
    buf.extend_from_slice(&generate_random_bytes(padded_len - len));

    AesIge::new(&keys.key, &keys.iv).encrypt_in_place(&mut buf)?;
    Ok(buf)
}

/// Client side: decrypt the answer and check its SHA-1 stamp
pub fn decrypt_answer(encrypted: &[u8], keys: &TempAesKeys) -> Result<ServerDhInnerData> {
    let mut buf = Zeroizing::new(encrypted.to_vec());
    AesIge::new(&keys.key, &keys.iv).decrypt_in_place(&mut buf)?;

    if buf.len() < 20 {
        return Err(ProtocolError::malformed("Answer shorter than its digest"));
    }
    let (digest, body) = buf.split_at(20);
    let mut reader = WireReader::new(body);
    let answer = ServerDhInnerData::read_from(&mut reader)?;

    if !constant_time_eq(digest, &sha1(&[&body[..reader.position()]])) {
        return Err(ProtocolError::IntegrityMismatch);
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_temp_aes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed list of exponents, then repeats the last one
    struct ScriptedRandom {
        exponents: Vec<BigUint>,
        cursor: AtomicUsize,
        index: usize,
    }

    impl ScriptedRandom {
        fn new(exponents: &[u64], index: usize) -> Self {
            Self {
                exponents: exponents.iter().map(|&e| BigUint::from(e)).collect(),
                cursor: AtomicUsize::new(0),
                index,
            }
        }

        fn draws(&self) -> usize {
            self.cursor.load(Ordering::SeqCst)
        }
    }

    impl RandomSource for ScriptedRandom {
        fn random_integer(&self, _low: &BigUint, _high: &BigUint) -> BigUint {
            let i = self.cursor.fetch_add(1, Ordering::SeqCst);
            self.exponents[i.min(self.exponents.len() - 1)].clone()
        }

        fn random_index(&self, _n: usize) -> usize {
            self.index
        }
    }

    #[test]
    fn test_standard_prime() {
        let params = DhParams::standard().unwrap();
        assert_eq!(params.prime().bits(), 2048);
        assert_eq!(params.prime_bytes().len(), 256);
        assert_eq!(params.prime_bytes()[0], 0xc7);
    }

    #[test]
    fn test_range_bounds() {
        let params = DhParams::standard().unwrap();
        let min = BigUint::one() << 1984;
        assert!(!params.is_in_safe_range(&min));
        assert!(params.is_in_safe_range(&(&min + 1u32)));
        let max = params.prime() - &min;
        assert!(!params.is_in_safe_range(&max));
        assert!(params.is_in_safe_range(&(&max - 1u32)));
    }

    #[test]
    fn test_single_resample() {
        let params = DhParams::standard().unwrap();
        let rng = ScriptedRandom::new(&[2, 1_000_003], 0);
        let pair = generate(&params, &rng, DEFAULT_MAX_ATTEMPTS).unwrap();

        assert_eq!(pair.attempts, 2);
        assert_eq!(rng.draws(), 2);
        assert_eq!(pair.g, 3);
        assert_eq!(BigUint::from_bytes_be(&pair.a), BigUint::from(1_000_003u32));
        let g_a = BigUint::from_bytes_be(&pair.g_a);
        assert!(params.is_in_safe_range(&g_a));
        let expected = BigUint::from(3u32).modpow(&BigUint::from(1_000_003u32), params.prime());
        assert_eq!(g_a, expected);
    }

    #[test]
    fn test_no_resample_for_every_generator() {
        let params = DhParams::standard().unwrap();
        for (index, g) in GENERATORS.iter().enumerate() {
            let rng = ScriptedRandom::new(&[12_345_678_901_234_567], index);
            let pair = generate(&params, &rng, 1).unwrap();
            assert_eq!(pair.attempts, 1);
            assert_eq!(pair.g, *g);
        }
    }

    #[test]
    fn test_budget_exhausted() {
        let params = DhParams::standard().unwrap();
        let rng = ScriptedRandom::new(&[2], 1);
        let result = generate(&params, &rng, 5);
        assert!(matches!(
            result,
            Err(ProtocolError::DhBudgetExhausted { attempts: 5 })
        ));
        assert_eq!(rng.draws(), 5);
    }

    #[test]
    fn test_answer_encrypt_decrypt() {
        let params = DhParams::standard().unwrap();
        let pair = generate(&params, &crate::random::OsRandom, DEFAULT_MAX_ATTEMPTS).unwrap();
        let answer = build_answer(&params, &pair, [1; 16], [2; 16], 1_700_000_000);
        let keys = derive_temp_aes(&[3; 32], &[2; 16]);

        let encrypted = encrypt_answer(&answer, &keys).unwrap();
        assert_eq!(encrypted.len() % 16, 0);
        assert!(encrypted.len() >= 20 + answer.encoded_size().unwrap());

        let decrypted = decrypt_answer(&encrypted, &keys).unwrap();
        assert_eq!(decrypted, answer);
    }

    #[test]
    fn test_decrypt_answer_detects_tamper() {
        let params = DhParams::standard().unwrap();
        let rng = ScriptedRandom::new(&[1_000_003], 2);
        let pair = generate(&params, &rng, 1).unwrap();
        let answer = build_answer(&params, &pair, [1; 16], [2; 16], 42);
        let keys = derive_temp_aes(&[3; 32], &[2; 16]);

        let mut encrypted = encrypt_answer(&answer, &keys).unwrap();
        encrypted[0] ^= 0x80;
        assert!(decrypt_answer(&encrypted, &keys).is_err());

        let wrong_keys = derive_temp_aes(&[4; 32], &[2; 16]);
        let encrypted = encrypt_answer(&answer, &keys).unwrap();
        assert!(decrypt_answer(&encrypted, &wrong_keys).is_err());
    }
}
