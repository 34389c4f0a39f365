use std::sync::Arc;
use num_bigint::{BigInt, BigUint};
use num_traits::{Signed, ToPrimitive, Zero};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::trace;

use crate::bfv::{BfvCiphertext, BfvPlaintext};
use crate::error::{FheError, Result};
use crate::keys::{PublicKey, SecretKey, check_key};
use crate::noise::{add_bits, fresh_bits};
use crate::params::BfvParams;
use crate::ring::poly::CoeffPoly;
use crate::ring::rns::RnsPoly;
use crate::sampling::{sample_gaussian, sample_ternary, sample_uniform_rns};

/// Δ_l·m over `q_0 .. q_level`.
pub(crate) fn scale_plaintext(pt: &BfvPlaintext, level: usize) -> Result<RnsPoly> {
    let params = &pt.params;
    let basis = params.chain.basis(level)?;
    let residues = basis.moduli.iter()
        .map(|&q| pt.poly.coeffs.iter().map(|&m| m % q).collect())
        .collect();
    basis.from_residues(residues)?.scalar_mul_residues(&params.delta[level])
}

/// m lifted into `q_0 .. q_level` without scaling, centered mod t.
pub(crate) fn lift_plaintext(pt: &BfvPlaintext, level: usize) -> Result<RnsPoly> {
    let basis = pt.params.chain.basis(level)?;
    basis.decompose_signed(&pt.poly.centered_coeffs())
}

/// Error bound of a fresh encryption, including the `(Q mod t)·m / t` term.
fn fresh_noise(params: &BfvParams) -> f64 {
    add_bits(fresh_bits(params.sigma, params.ring_degree), (params.plain_modulus as f64).log2())
}

/// Encrypt a plaintext under the public key at the top level.
pub fn encrypt_pk(pt: &BfvPlaintext, pk: &PublicKey) -> Result<BfvCiphertext> {
    let mut rng = ChaCha20Rng::from_os_rng();
    encrypt_pk_with_rng(pt, pk, &mut rng)
}

/// `ct = (p0·u + e1 + Δ·m, p1·u + e2)` with ternary u and Gaussian e1, e2.
pub fn encrypt_pk_with_rng<R: Rng>(pt: &BfvPlaintext, pk: &PublicKey, rng: &mut R) -> Result<BfvCiphertext> {
    let params = &pt.params;
    if !Arc::ptr_eq(&params.chain, &pk.chain) {
        return Err(FheError::KeyMismatch);
    }
    let level = params.top_level();
    let basis = params.chain.basis(level)?;
    let n = params.ring_degree;

    let u = basis.decompose_signed(&sample_ternary(n, rng))?;
    let e1 = basis.decompose_signed(&sample_gaussian(n, params.sigma, rng))?;
    let e2 = basis.decompose_signed(&sample_gaussian(n, params.sigma, rng))?;

    let c0 = pk.p0.mul(&u)?.add(&e1)?.add(&scale_plaintext(pt, level)?)?;
    let c1 = pk.p1.mul(&u)?.add(&e2)?;

    Ok(BfvCiphertext {
        c: vec![c0, c1],
        noise_bits: fresh_noise(params),
        key_id: pk.key_id,
        params: params.clone(),
    })
}

/// Symmetric encryption under the secret key.
pub fn encrypt_sk(pt: &BfvPlaintext, sk: &SecretKey) -> Result<BfvCiphertext> {
    let mut rng = ChaCha20Rng::from_os_rng();
    encrypt_sk_with_rng(pt, sk, &mut rng)
}

/// `ct = (-a·s + e + Δ·m, a)`.
pub fn encrypt_sk_with_rng<R: Rng>(pt: &BfvPlaintext, sk: &SecretKey, rng: &mut R) -> Result<BfvCiphertext> {
    let params = &pt.params;
    sk.check_chain(&params.chain)?;
    let level = params.top_level();
    let basis = params.chain.basis(level)?;

    let a = sample_uniform_rns(basis, rng);
    let e = basis.decompose_signed(&sample_gaussian(params.ring_degree, params.sigma, rng))?;
    let c0 = a.mul(&sk.at_level(level)?)?.neg().add(&e)?.add(&scale_plaintext(pt, level)?)?;

    Ok(BfvCiphertext {
        c: vec![c0, a],
        noise_bits: fresh_noise(params),
        key_id: sk.key_id,
        params: params.clone(),
    })
}

/// `c0 + c1·s + c2·s² + ...` at the ciphertext's level.
pub(crate) fn phase(ct: &BfvCiphertext, sk: &SecretKey) -> Result<RnsPoly> {
    check_key(ct.key_id, &ct.params.chain, sk.key_id, &sk.chain)?;
    let s = sk.at_level(ct.level())?;
    let mut acc = ct.c[ct.c.len() - 1].clone();
    for c in ct.c.iter().rev().skip(1) {
        acc = acc.mul(&s)?.add(c)?;
    }
    Ok(acc)
}

/// Decrypt: `m = round(t·[phase]_Q / Q) mod t`.
///
/// Refuses ciphertexts whose estimated noise budget is used up, since their
/// decryption would be garbage.
pub fn decrypt(ct: &BfvCiphertext, sk: &SecretKey) -> Result<BfvPlaintext> {
    let budget = ct.noise_budget();
    if budget <= 0.0 {
        return Err(FheError::NoiseBudgetExhausted { budget_bits: budget });
    }
    let params = &ct.params;
    let basis = params.chain.basis(ct.level())?;
    let x = basis.reconstruct_from_rns(&phase(ct, sk)?)?;

    let q = basis.product();
    let half_q = q >> 1;
    let t = BigUint::from(params.plain_modulus);
    let coeffs = x.iter()
        .map(|xi| {
            let m: BigUint = ((xi * &t + &half_q) / q) % &t;
            m.to_u64().unwrap_or(0)
        })
        .collect();
    trace!(level = ct.level(), budget, "decrypted BFV ciphertext");
    BfvPlaintext::new(CoeffPoly { coeffs, modulus: params.plain_modulus }, params)
}

/// Measured invariant noise budget in bits: `log2(Q / (2·‖[t·phase]_Q‖))`.
///
/// Needs the secret key; `BfvCiphertext::noise_budget` is the public estimate.
pub fn noise_budget_exact(ct: &BfvCiphertext, sk: &SecretKey) -> Result<f64> {
    let basis = ct.params.chain.basis(ct.level())?;
    let x = basis.reconstruct_from_rns(&phase(ct, sk)?)?;
    let q = BigInt::from(basis.product().clone());
    let half_q = &q >> 1usize;
    let t = BigInt::from(ct.params.plain_modulus);

    let max_noise = x.iter()
        .map(|xi| {
            let mut v = (BigInt::from(xi.clone()) * &t) % &q;
            if v > half_q {
                v -= &q;
            }
            v.abs()
        })
        .max()
        .unwrap_or_else(BigInt::zero);

    let log_q = ct.params.chain.log_modulus(ct.level());
    if max_noise.is_zero() {
        return Ok(log_q - 1.0);
    }
    let log_noise = max_noise.to_f64().map_or(max_noise.bits() as f64, f64::log2);
    Ok((log_q - 1.0 - log_noise).max(0.0))
}
