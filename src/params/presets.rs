//! Small ready-made contexts. None of these target a concrete security level.

use std::sync::Arc;
use crate::error::Result;
use crate::params::{BfvParams, BfvParamsBuilder, CkksParams, CkksParamsBuilder, SecretDistribution};

/// n=64, t=65537 (batching), three 50-bit primes. For unit tests.
pub fn bfv_test() -> Result<Arc<BfvParams>> {
    BfvParamsBuilder::new()
        .ring_degree(64)
        .plain_modulus(65537)
        .modulus_bits(vec![50, 50, 50])
        .special_bits(60)
        .sigma(3.2)
        .build()
}

/// n=4096, t=65537, four 54-bit primes.
pub fn bfv_default() -> Result<Arc<BfvParams>> {
    BfvParamsBuilder::new()
        .ring_degree(4096)
        .plain_modulus(65537)
        .modulus_bits(vec![54, 54, 54, 54])
        .special_bits(60)
        .sigma(3.2)
        .build()
}

/// n=64, Δ=2^30, q_0 of 45 bits and three 30-bit rescaling primes.
pub fn ckks_test() -> Result<Arc<CkksParams>> {
    CkksParamsBuilder::new()
        .ring_degree(64)
        .scale_bits(30)
        .first_modulus_bits(45)
        .level_bits(30)
        .levels(3)
        .special_bits(61)
        .build()
}

/// n=8192, Δ=2^40, q_0 of 60 bits and six 40-bit rescaling primes.
pub fn ckks_default() -> Result<Arc<CkksParams>> {
    CkksParamsBuilder::new()
        .ring_degree(8192)
        .scale_bits(40)
        .first_modulus_bits(60)
        .level_bits(40)
        .levels(6)
        .special_bits(61)
        .build()
}

/// n=32 with a sparse secret (h=8) and 14 bootstrap primes of 45 bits:
/// enough for 8 squarings in the modular reduction step.
pub fn ckks_bootstrap_test() -> Result<Arc<CkksParams>> {
    CkksParamsBuilder::new()
        .ring_degree(32)
        .scale_bits(30)
        .first_modulus_bits(45)
        .level_bits(30)
        .levels(2)
        .bootstrap_levels(14, 45)
        .special_bits(61)
        .secret_distribution(SecretDistribution::SparseTernary { hamming_weight: 8 })
        .build()
}
