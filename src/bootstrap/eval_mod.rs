//! Approximate reduction modulo q_0 in the slots.
//!
//! With `θ = 2π·t / (q_0·2^r)` in a slot, `exp(iθ)` is approximated by its
//! degree-7 Taylor polynomial, then squared r times to reach
//! `exp(2πi·t/q_0)`, which only depends on `t mod q_0`. Finally
//! `E - conj(E) = 2i·sin(2π·t/q_0)`, linear in `t mod q_0` when that is small.

use num_complex::Complex64;

use crate::ckks::eval::{
    ckks_add, ckks_add_const, ckks_conjugate, ckks_drop_to_level, ckks_mul_const_to_scale, ckks_mul_relin_rescale,
    ckks_sub,
};
use crate::ckks::CkksCiphertext;
use crate::error::Result;
use crate::keys::{RelinKey, RotationKeys};

pub(crate) const TAYLOR_DEGREE: usize = 7;

/// Levels consumed by the Taylor step.
pub(crate) const TAYLOR_DEPTH: usize = 4;

/// |θ| the Taylor step is sized for.
pub(crate) const THETA_BOUND: f64 = 0.25;

/// Bring `ct` to the level and scale of `reference` (one level below it at most).
fn align(ct: &CkksCiphertext, reference: &CkksCiphertext) -> Result<CkksCiphertext> {
    let lifted = ckks_drop_to_level(ct, reference.level() + 1)?;
    ckks_mul_const_to_scale(&lifted, Complex64::new(1.0, 0.0), reference.scale)
}

fn square(ct: &CkksCiphertext, rk: &RelinKey) -> Result<CkksCiphertext> {
    ckks_mul_relin_rescale(ct, ct, rk)
}

/// `Σ_{k<=7} (iθ)^k / k!` at scale `target`.
pub(crate) fn taylor_exp(theta: &CkksCiphertext, target: f64, rk: &RelinKey) -> Result<CkksCiphertext> {
    let p2 = square(theta, rk)?;
    let p1 = align(theta, &p2)?;
    let p3 = ckks_mul_relin_rescale(&p2, &p1, rk)?;
    let p4 = square(&p2, rk)?;
    let p5 = ckks_mul_relin_rescale(&p4, &align(&p1, &p4)?, rk)?;
    let p6 = ckks_mul_relin_rescale(&p4, &align(&p2, &p4)?, rk)?;
    let p7 = ckks_mul_relin_rescale(&p4, &p3, rk)?;

    let mut coeff = Complex64::new(1.0, 0.0);
    let mut terms = Vec::with_capacity(TAYLOR_DEGREE);
    for (k, power) in [theta, &p2, &p3, &p4, &p5, &p6, &p7].into_iter().enumerate() {
        coeff = coeff * Complex64::i() / (k + 1) as f64;
        terms.push(ckks_mul_const_to_scale(power, coeff, target)?);
    }

    let bottom = terms.iter().map(CkksCiphertext::level).min().unwrap_or(0);
    let mut sum = ckks_drop_to_level(&terms[0], bottom)?;
    for term in &terms[1..] {
        sum = ckks_add(&sum, &ckks_drop_to_level(term, bottom)?)?;
    }
    ckks_add_const(&sum, Complex64::new(1.0, 0.0))
}

/// `2i·sin(2π·t/q_0)` from slots holding `θ = 2π·t/(q_0·2^r)`.
pub(crate) fn eval_mod(
    theta: &CkksCiphertext,
    squarings: u32,
    q0: f64,
    rk: &RelinKey,
    keys: &RotationKeys,
) -> Result<CkksCiphertext> {
    let mut e = taylor_exp(theta, q0, rk)?;
    for _ in 0..squarings {
        e = square(&e, rk)?;
    }
    ckks_sub(&e, &ckks_conjugate(&e, keys)?)
}

/// Largest slot error of the Taylor polynomial on |θ| <= THETA_BOUND.
pub(crate) fn taylor_error() -> f64 {
    let factorial: f64 = (1..=TAYLOR_DEGREE + 1).map(|k| k as f64).product();
    THETA_BOUND.powi(TAYLOR_DEGREE as i32 + 1) / factorial
}
