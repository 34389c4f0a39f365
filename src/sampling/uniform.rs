use rand::Rng;
use rand::seq::index;

use crate::params::SecretDistribution;
use crate::ring::ntt::NttPoly;
use crate::ring::rns::{RnsBasis, RnsPoly};

/// `n` uniform residues in [0, modulus), by rejection sampling on a bit mask.
pub fn sample_uniform_residues<R: Rng>(n: usize, modulus: u64, rng: &mut R) -> Vec<u64> {
    let mask = if modulus.is_power_of_two() {
        modulus - 1
    } else {
        (1u64 << (64 - modulus.leading_zeros())) - 1
    };

    (0..n)
        .map(|_| loop {
            let val = rng.random::<u64>() & mask;
            if val < modulus {
                break val;
            }
        })
        .collect()
}

/// A uniformly random element of R_Q for the given basis.
///
/// The NTT is a bijection, so uniform evaluations are a uniform polynomial;
/// each prime is sampled independently.
pub fn sample_uniform_rns<R: Rng>(basis: &RnsBasis, rng: &mut R) -> RnsPoly {
    let components = (0..basis.num_moduli())
        .map(|i| {
            let m = basis.modulus(i);
            NttPoly {
                evals: sample_uniform_residues(basis.ring_degree, m.value(), rng),
                modulus: m,
                plan: basis.plans[i].clone(),
            }
        })
        .collect();
    RnsPoly { components, ring_degree: basis.ring_degree }
}

/// Coefficients uniform in {-1, 0, 1}.
pub fn sample_ternary<R: Rng>(n: usize, rng: &mut R) -> Vec<i64> {
    (0..n)
        .map(|_| {
            // rejection on 2 bits for a uniform {0, 1, 2}
            let val = loop {
                let r = rng.random::<u8>() & 0x03;
                if r < 3 {
                    break r;
                }
            };
            val as i64 - 1
        })
        .collect()
}

/// Exactly `weight` nonzero coefficients, each ±1 with equal probability.
pub fn sample_sparse_ternary<R: Rng>(n: usize, weight: usize, rng: &mut R) -> Vec<i64> {
    let mut coeffs = vec![0i64; n];
    for i in index::sample(rng, n, weight.min(n)) {
        coeffs[i] = if rng.random::<bool>() { 1 } else { -1 };
    }
    coeffs
}

pub fn sample_secret<R: Rng>(dist: SecretDistribution, n: usize, rng: &mut R) -> Vec<i64> {
    match dist {
        SecretDistribution::Ternary => sample_ternary(n, rng),
        SecretDistribution::SparseTernary { hamming_weight } => sample_sparse_ternary(n, hamming_weight, rng),
    }
}
