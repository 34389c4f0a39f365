use std::sync::Arc;
use num_bigint::BigInt;
use rayon::prelude::*;
use tracing::{instrument, trace};

use crate::bfv::encrypt::{lift_plaintext, scale_plaintext};
use crate::bfv::{BfvCiphertext, BfvPlaintext, check_pair};
use crate::error::{FheError, Result};
use crate::keys::keyswitch::key_switch_noise_bits;
use crate::keys::{GaloisKey, RelinKey, RotationKeys, check_key, conjugation_element, galois_element, key_switch};
use crate::noise::add_bits;
use crate::ring::rns::{RnsBasis, RnsPoly, basis_extend, div_round};

fn check_plain(ct: &BfvCiphertext, pt: &BfvPlaintext) -> Result<()> {
    if !Arc::ptr_eq(&ct.params, &pt.params) && !Arc::ptr_eq(&ct.params.chain, &pt.params.chain) {
        return Err(FheError::ModulusMismatch);
    }
    Ok(())
}

fn combine(
    a: &BfvCiphertext,
    b: &BfvCiphertext,
    f: impl Fn(&RnsPoly, &RnsPoly) -> Result<RnsPoly>,
    lone_right: impl Fn(&RnsPoly) -> RnsPoly,
) -> Result<BfvCiphertext> {
    check_pair(a, b)?;
    let len = a.c.len().max(b.c.len());
    let c = (0..len)
        .map(|i| match (a.c.get(i), b.c.get(i)) {
            (Some(x), Some(y)) => f(x, y),
            (Some(x), None) => Ok(x.clone()),
            (None, Some(y)) => Ok(lone_right(y)),
            (None, None) => Err(FheError::ModulusMismatch),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(BfvCiphertext {
        c,
        noise_bits: add_bits(a.noise_bits, b.noise_bits),
        key_id: a.key_id,
        params: a.params.clone(),
    })
}

/// Homomorphic addition: decrypts to `m1 + m2 mod t`.
pub fn bfv_add(a: &BfvCiphertext, b: &BfvCiphertext) -> Result<BfvCiphertext> {
    combine(a, b, RnsPoly::add, RnsPoly::clone)
}

/// Homomorphic subtraction: decrypts to `m1 - m2 mod t`.
pub fn bfv_sub(a: &BfvCiphertext, b: &BfvCiphertext) -> Result<BfvCiphertext> {
    combine(a, b, RnsPoly::sub, RnsPoly::neg)
}

pub fn bfv_neg(ct: &BfvCiphertext) -> BfvCiphertext {
    BfvCiphertext {
        c: ct.c.iter().map(RnsPoly::neg).collect(),
        ..ct.clone()
    }
}

/// `ct + pt`: only c0 changes, by Δ·m.
pub fn bfv_add_plain(ct: &BfvCiphertext, pt: &BfvPlaintext) -> Result<BfvCiphertext> {
    check_plain(ct, pt)?;
    let mut out = ct.clone();
    out.c[0] = out.c[0].add(&scale_plaintext(pt, ct.level())?)?;
    out.noise_bits = add_bits(ct.noise_bits, (ct.params.plain_modulus as f64).log2());
    Ok(out)
}

pub fn bfv_sub_plain(ct: &BfvCiphertext, pt: &BfvPlaintext) -> Result<BfvCiphertext> {
    check_plain(ct, pt)?;
    let mut out = ct.clone();
    out.c[0] = out.c[0].sub(&scale_plaintext(pt, ct.level())?)?;
    out.noise_bits = add_bits(ct.noise_bits, (ct.params.plain_modulus as f64).log2());
    Ok(out)
}

/// `ct * pt`: every component times the centered plaintext polynomial.
pub fn bfv_mul_plain(ct: &BfvCiphertext, pt: &BfvPlaintext) -> Result<BfvCiphertext> {
    check_plain(ct, pt)?;
    let m = lift_plaintext(pt, ct.level())?;
    let c = ct.c.iter().map(|ci| ci.mul(&m)).collect::<Result<Vec<_>>>()?;
    let params = &ct.params;
    let log_t = (params.plain_modulus as f64).log2();
    let growth = (params.ring_degree as f64).log2() + log_t - 1.0;
    Ok(BfvCiphertext {
        c,
        noise_bits: add_bits(ct.noise_bits, log_t) + growth,
        key_id: ct.key_id,
        params: params.clone(),
    })
}

/// `round(t·x / Q_l)` of a tensor component held exactly in `Q_l ∪ aux`.
fn scale_down(d: &RnsPoly, ext: &RnsBasis, basis: &RnsBasis, t: &BigInt) -> Result<RnsPoly> {
    let q = BigInt::from(basis.product().clone());
    let rounded: Vec<BigInt> = ext.reconstruct_centered(d)?
        .par_iter()
        .map(|x| div_round(&(x * t), &q))
        .collect();
    basis.decompose_to_rns(&rounded)
}

/// Tensor product of two degree-1 ciphertexts, scaled by t/Q.
///
/// Returns a degree-2 ciphertext decrypting under `(1, s, s²)`. Components
/// are lifted exactly into `Q_l` plus the auxiliary basis, multiplied there
/// without wrap-around, then rounded back down into `Q_l`.
#[instrument(level = "trace", skip_all, fields(level = a.level()))]
pub fn bfv_mul(a: &BfvCiphertext, b: &BfvCiphertext) -> Result<BfvCiphertext> {
    check_pair(a, b)?;
    if a.degree() != 1 || b.degree() != 1 {
        return Err(FheError::InvalidParam(
            "multiplication expects degree-1 ciphertexts, relinearize first".into()
        ));
    }
    let params = &a.params;
    let basis = params.chain.basis(a.level())?;
    let ext = basis.concat(&params.aux_basis)?;

    let lifted = [&a.c[0], &a.c[1], &b.c[0], &b.c[1]]
        .par_iter()
        .map(|c| basis_extend(c, basis, &ext))
        .collect::<Result<Vec<_>>>()?;
    let (a0, a1, b0, b1) = (&lifted[0], &lifted[1], &lifted[2], &lifted[3]);

    let d0 = a0.mul(b0)?;
    let mut d1 = a0.mul(b1)?;
    d1.mul_add_assign(a1, b0)?;
    let d2 = a1.mul(b1)?;

    let t = BigInt::from(params.plain_modulus);
    let c = [d0, d1, d2]
        .par_iter()
        .map(|d| scale_down(d, &ext, basis, &t))
        .collect::<Result<Vec<_>>>()?;

    let log_n = (params.ring_degree as f64).log2();
    let log_t = (params.plain_modulus as f64).log2();
    // t·(e_a·s + e_b·s) grows like 6·sqrt(N) per unit of input error; N² bounds the rounding.
    let noise_bits = add_bits(0.5 * log_n + 6f64.log2() + log_t + add_bits(a.noise_bits, b.noise_bits), 2.0 * log_n);
    trace!(noise_bits, "BFV tensor product");

    Ok(BfvCiphertext {
        c,
        noise_bits,
        key_id: a.key_id,
        params: params.clone(),
    })
}

/// Bring a degree-2 ciphertext back to degree 1 with the relinearization key.
pub fn bfv_relinearize(ct: &BfvCiphertext, rk: &RelinKey) -> Result<BfvCiphertext> {
    match ct.degree() {
        1 => return Ok(ct.clone()),
        2 => {}
        d => return Err(FheError::InvalidParam(format!("cannot relinearize a degree-{d} ciphertext"))),
    }
    let params = &ct.params;
    check_key(ct.key_id, &params.chain, rk.key.key_id, &rk.key.chain)?;
    let (k0, k1) = key_switch(&ct.c[2], &rk.key, &params.chain)?;
    Ok(BfvCiphertext {
        c: vec![ct.c[0].add(&k0)?, ct.c[1].add(&k1)?],
        noise_bits: add_bits(ct.noise_bits, key_switch_noise_bits(&params.chain, ct.level(), params.sigma)),
        key_id: ct.key_id,
        params: params.clone(),
    })
}

pub fn bfv_mul_and_relin(a: &BfvCiphertext, b: &BfvCiphertext, rk: &RelinKey) -> Result<BfvCiphertext> {
    bfv_relinearize(&bfv_mul(a, b)?, rk)
}

/// Apply X -> X^g and switch back to s.
pub(crate) fn apply_galois(ct: &BfvCiphertext, key: &GaloisKey) -> Result<BfvCiphertext> {
    if ct.degree() != 1 {
        return Err(FheError::InvalidParam("relinearize before applying an automorphism".into()));
    }
    let params = &ct.params;
    check_key(ct.key_id, &params.chain, key.key.key_id, &key.key.chain)?;
    let c0 = ct.c[0].automorphism(key.element)?;
    let c1 = ct.c[1].automorphism(key.element)?;
    let (k0, k1) = key_switch(&c1, &key.key, &params.chain)?;
    Ok(BfvCiphertext {
        c: vec![c0.add(&k0)?, k1],
        noise_bits: add_bits(ct.noise_bits, key_switch_noise_bits(&params.chain, ct.level(), params.sigma)),
        key_id: ct.key_id,
        params: params.clone(),
    })
}

/// Rotate both slot rows left by `steps` (right for negative steps).
pub fn bfv_rotate(ct: &BfvCiphertext, steps: i64, keys: &RotationKeys) -> Result<BfvCiphertext> {
    let element = galois_element(steps, ct.params.ring_degree);
    if element == 1 {
        return Ok(ct.clone());
    }
    apply_galois(ct, keys.get(element)?)
}

/// Swap the two slot rows.
pub fn bfv_rotate_columns(ct: &BfvCiphertext, keys: &RotationKeys) -> Result<BfvCiphertext> {
    apply_galois(ct, keys.get(conjugation_element(ct.params.ring_degree))?)
}
