use std::sync::Arc;
use rand::Rng;
use rayon::prelude::*;

use crate::error::{FheError, Result};
use crate::keys::{SecretKey, SwitchingKey};
use crate::params::ModulusChain;
use crate::ring::rns::RnsPoly;
use crate::sampling::{sample_gaussian, sample_uniform_rns};

/// Build a key switching from `target` (given over `q_0 .. q_top, P`) to `sk`.
///
/// Pair j is `(-(a_j·s) + e_j + [P]_{q_j}·s' in component j only, a_j)`,
/// which is `P·g_j·s'` in every component since g_j vanishes mod q_i (i != j) and mod P.
pub(crate) fn gen_switching_key_with_rng<R: Rng>(
    sk: &SecretKey,
    target: &RnsPoly,
    sigma: f64,
    rng: &mut R,
) -> Result<SwitchingKey> {
    let chain = sk.chain();
    let top = chain.top_level();
    let ext = chain.extended_basis(top)?;
    if !ext.matches(target) {
        return Err(FheError::ModulusMismatch);
    }

    let keys = (0..=top)
        .map(|j| {
            let a = sample_uniform_rns(ext, rng);
            let e = ext.decompose_signed(&sample_gaussian(ext.ring_degree, sigma, rng))?;
            let mut b = a.mul(&sk.poly)?.neg().add(&e)?;
            let lifted = target.components[j].scalar_mul(chain.special_mod_q()[j]);
            b.components[j] = b.components[j].add(&lifted)?;
            Ok((b, a))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SwitchingKey {
        keys,
        key_id: sk.key_id,
        chain: chain.clone(),
    })
}

/// Components `0..=level` plus the trailing special prime of a key polynomial.
fn restrict(poly: &RnsPoly, level: usize) -> Result<RnsPoly> {
    let special = poly.components.last().ok_or(FheError::ModulusMismatch)?;
    let mut components = poly.components.get(..=level).ok_or(FheError::ChainExhausted)?.to_vec();
    components.push(special.clone());
    Ok(RnsPoly { components, ring_degree: poly.ring_degree })
}

/// Key-switch `d` (at `level`): returns `(k0, k1)` at the same level with
/// `k0 + k1·s ≈ d·s'`, where `s'` is the key's source secret.
pub fn key_switch(d: &RnsPoly, key: &SwitchingKey, chain: &Arc<ModulusChain>) -> Result<(RnsPoly, RnsPoly)> {
    if !Arc::ptr_eq(chain, &key.chain) {
        return Err(FheError::KeyMismatch);
    }
    let level = d.num_components().checked_sub(1).ok_or(FheError::ModulusMismatch)?;
    let basis = chain.basis(level)?;
    if !basis.matches(d) {
        return Err(FheError::ModulusMismatch);
    }
    let ext = chain.extended_basis(level)?;

    // RNS digits: the centered residue of d mod q_j, lifted to every prime.
    let products = (0..=level)
        .into_par_iter()
        .map(|j| {
            let residue = d.components[j].ntt_inverse();
            let q_j = d.components[j].modulus;
            let centered: Vec<i64> = residue.coeffs.iter().map(|&c| q_j.center(c)).collect();
            let digit = ext.decompose_signed(&centered)?;
            let (b, a) = &key.keys[j];
            Ok((digit.mul(&restrict(b, level)?)?, digit.mul(&restrict(a, level)?)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut acc0 = RnsPoly::zero(ext);
    let mut acc1 = RnsPoly::zero(ext);
    for (p0, p1) in &products {
        acc0 = acc0.add(p0)?;
        acc1 = acc1.add(p1)?;
    }

    let special_inv = &chain.special_inv()[..=level];
    Ok((acc0.divide_round_last(special_inv)?, acc1.divide_round_last(special_inv)?))
}

/// Estimated magnitude (bits) of the error one key switch adds at `level`.
pub(crate) fn key_switch_noise_bits(chain: &ModulusChain, level: usize, sigma: f64) -> f64 {
    let n = chain.ring_degree() as f64;
    let q_max = chain.primes()[..=level].iter().copied().max().unwrap_or(1) as f64;
    let digits = (level + 1) as f64;
    let e = 6.0 * sigma;
    let switched = digits * q_max / 2.0 * n.sqrt() * e / chain.special_prime() as f64;
    (switched + n + 1.0).log2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keygen::gen_secret_key_with_rng;
    use crate::params::presets::ckks_test;
    use num_traits::ToPrimitive;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_relin_key_switches_square() {
        let params = ckks_test().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let s_sq = sk.poly.mul(&sk.poly).unwrap();
        let key = gen_switching_key_with_rng(&sk, &s_sq, params.sigma, &mut rng).unwrap();

        for level in [0, params.max_level] {
            let basis = params.chain.basis(level).unwrap();
            let d = sample_uniform_rns(basis, &mut rng);
            let (k0, k1) = key_switch(&d, &key, &params.chain).unwrap();

            let s = sk.at_level(level).unwrap();
            let got = k0.add(&k1.mul(&s).unwrap()).unwrap();
            let want = d.mul(&s.mul(&s).unwrap()).unwrap();
            let err = basis.reconstruct_centered(&got.sub(&want).unwrap()).unwrap();
            let bound = 2f64.powf(key_switch_noise_bits(&params.chain, level, params.sigma));
            for c in err {
                let c = c.to_f64().unwrap();
                assert!(c.abs() <= bound, "key switch error {c} above {bound}");
            }
        }
    }
}
