//! Secure random capability used by the DH generator

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use rand::Rng;

/// Source of uniformly distributed secrets
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[low, high)`
    fn random_integer(&self, low: &BigUint, high: &BigUint) -> BigUint;

    /// Uniform index in `[0, n)`
    fn random_index(&self, n: usize) -> usize;
}

/// Operating-system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn random_integer(&self, low: &BigUint, high: &BigUint) -> BigUint {
        OsRng.gen_biguint_range(low, high)
    }

    fn random_index(&self, n: usize) -> usize {
        OsRng.gen_range(0..n)
    }
}
