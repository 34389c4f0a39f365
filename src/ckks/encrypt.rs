use std::sync::Arc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::ckks::{CkksCiphertext, CkksPlaintext};
use crate::error::{FheError, Result};
use crate::keys::{PublicKey, SecretKey, check_key};
use crate::noise::fresh_bits;
use crate::sampling::{sample_gaussian, sample_ternary, sample_uniform_rns};

/// Encrypt under the public key, at the plaintext's level.
pub fn ckks_encrypt_pk(pt: &CkksPlaintext, pk: &PublicKey) -> Result<CkksCiphertext> {
    let mut rng = ChaCha20Rng::from_os_rng();
    ckks_encrypt_pk_with_rng(pt, pk, &mut rng)
}

/// `ct = (p0·u + e1 + m, p1·u + e2)` restricted to `q_0 .. q_level`.
pub fn ckks_encrypt_pk_with_rng<R: Rng>(pt: &CkksPlaintext, pk: &PublicKey, rng: &mut R) -> Result<CkksCiphertext> {
    let params = &pt.params;
    if !Arc::ptr_eq(&params.chain, &pk.chain) {
        return Err(FheError::KeyMismatch);
    }
    let level = pt.level();
    let basis = params.chain.basis(level)?;
    let n = params.ring_degree;

    let u = basis.decompose_signed(&sample_ternary(n, rng))?;
    let e1 = basis.decompose_signed(&sample_gaussian(n, params.sigma, rng))?;
    let e2 = basis.decompose_signed(&sample_gaussian(n, params.sigma, rng))?;
    let p0 = pk.p0.truncate(level + 1)?;
    let p1 = pk.p1.truncate(level + 1)?;

    Ok(CkksCiphertext {
        c: vec![p0.mul(&u)?.add(&e1)?.add(&pt.poly)?, p1.mul(&u)?.add(&e2)?],
        scale: pt.scale,
        noise_bits: fresh_bits(params.sigma, n),
        key_id: pk.key_id,
        params: params.clone(),
    })
}

pub fn ckks_encrypt_sk(pt: &CkksPlaintext, sk: &SecretKey) -> Result<CkksCiphertext> {
    let mut rng = ChaCha20Rng::from_os_rng();
    ckks_encrypt_sk_with_rng(pt, sk, &mut rng)
}

/// `ct = (-a·s + e + m, a)`.
pub fn ckks_encrypt_sk_with_rng<R: Rng>(pt: &CkksPlaintext, sk: &SecretKey, rng: &mut R) -> Result<CkksCiphertext> {
    let params = &pt.params;
    sk.check_chain(&params.chain)?;
    let level = pt.level();
    let basis = params.chain.basis(level)?;

    let a = sample_uniform_rns(basis, rng);
    let e = basis.decompose_signed(&sample_gaussian(params.ring_degree, params.sigma, rng))?;
    let c0 = a.mul(&sk.at_level(level)?)?.neg().add(&e)?.add(&pt.poly)?;

    Ok(CkksCiphertext {
        c: vec![c0, a],
        scale: pt.scale,
        noise_bits: fresh_bits(params.sigma, params.ring_degree),
        key_id: sk.key_id,
        params: params.clone(),
    })
}

/// The phase `c0 + c1·s (+ c2·s²)` as a plaintext at the ciphertext's scale.
pub fn ckks_decrypt(ct: &CkksCiphertext, sk: &SecretKey) -> Result<CkksPlaintext> {
    let budget = ct.noise_budget();
    if budget <= 0.0 {
        return Err(FheError::NoiseBudgetExhausted { budget_bits: budget });
    }
    check_key(ct.key_id, &ct.params.chain, sk.key_id, &sk.chain)?;
    let s = sk.at_level(ct.level())?;
    let mut phase = ct.c[ct.c.len() - 1].clone();
    for c in ct.c.iter().rev().skip(1) {
        phase = phase.mul(&s)?.add(c)?;
    }
    Ok(CkksPlaintext {
        poly: phase,
        scale: ct.scale,
        params: ct.params.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckks::encoding::{ckks_decode, ckks_encode};
    use crate::keys::{gen_public_key_with_rng, gen_secret_key_with_rng};
    use crate::params::presets::ckks_test;
    use num_complex::Complex64;

    #[test]
    fn test_roundtrip_all_levels() {
        let params = ckks_test().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(17);
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let pk = gen_public_key_with_rng(&params, &sk, &mut rng).unwrap();
        let values: Vec<Complex64> = (0..32).map(|i| Complex64::new((i as f64).sin(), (i as f64).cos())).collect();

        for level in 0..=params.max_level {
            let pt = ckks_encode(&values, params.scale, level, &params).unwrap();
            for ct in [
                ckks_encrypt_pk_with_rng(&pt, &pk, &mut rng).unwrap(),
                ckks_encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap(),
            ] {
                assert_eq!(ct.level(), level);
                let got = ckks_decode(&ckks_decrypt(&ct, &sk).unwrap()).unwrap();
                for (g, v) in got.iter().zip(&values) {
                    assert!((g - v).norm() < 1e-5, "level {level}: {g} vs {v}");
                }
            }
        }
    }

    #[test]
    fn test_decrypt_with_foreign_key() {
        let params = ckks_test().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(18);
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let other = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let pt = ckks_encode(&[Complex64::new(1.0, 0.0)], params.scale, 0, &params).unwrap();
        let ct = ckks_encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();
        assert!(matches!(ckks_decrypt(&ct, &other), Err(FheError::KeyMismatch)));
    }
}
