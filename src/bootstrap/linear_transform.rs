//! Slot-space matrix-vector products, evaluated with baby-step giant-step.
//!
//! For an n x n matrix M, the product is `Σ_i d_i ⊙ ρ^i(z)` where
//! `d_i[j] = M[j][(j + i) mod n]` is the i-th generalized diagonal and ρ
//! rotates left. Writing `i = g·g1 + b` and pulling the giant rotation out
//! of the inner sum costs `g1 - 1 + n/g1 - 1` key switches instead of n - 1.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::ckks::encoding::ckks_encode;
use crate::ckks::eval::{ckks_add, ckks_mul_plain, ckks_rescale, ckks_rotate};
use crate::ckks::{CkksCiphertext, check_scale_floor};
use crate::error::{FheError, Result};
use crate::keys::RotationKeys;

/// Baby-step count for `slots`: the power of two nearest above sqrt(slots).
pub fn baby_steps(slots: usize) -> usize {
    let log = slots.trailing_zeros();
    1 << log.div_ceil(2)
}

/// Rotation steps a transform over `slots` slots needs keys for.
pub fn bsgs_rotations(slots: usize) -> Vec<i64> {
    let g1 = baby_steps(slots);
    let giants = slots.div_ceil(g1);
    (1..g1).chain((1..giants).map(|g| g * g1)).map(|s| s as i64).collect()
}

/// Multiply the slot vector of `ct` by the matrix given entrywise by `entry(row, col)`.
///
/// Diagonals are encoded at scale `target · q_l / scale` so that the single
/// closing rescale lands exactly on `target`, one level down.
pub(crate) fn apply_matrix<F>(ct: &CkksCiphertext, entry: F, target: f64, keys: &RotationKeys) -> Result<CkksCiphertext>
where
    F: Fn(usize, usize) -> Complex64 + Sync,
{
    let params = &ct.params;
    let level = ct.level();
    if level == 0 {
        return Err(FheError::ChainExhausted);
    }
    let n = params.slot_count();
    let g1 = baby_steps(n);
    let giants = n.div_ceil(g1);
    check_scale_floor(target, params)?;
    let diag_scale = target * params.chain.prime(level) as f64 / ct.scale;
    check_scale_floor(diag_scale, params)?;

    let baby = (0..g1)
        .into_par_iter()
        .map(|b| ckks_rotate(ct, b as i64, keys))
        .collect::<Result<Vec<_>>>()?;

    let blocks = (0..giants)
        .into_par_iter()
        .map(|g| {
            let shift = g * g1;
            let mut inner: Option<CkksCiphertext> = None;
            for (b, rotated) in baby.iter().enumerate() {
                let i = shift + b;
                if i >= n {
                    break;
                }
                // ρ^{-shift}(d_i)
                let diag: Vec<Complex64> = (0..n)
                    .map(|j| {
                        let row = (j + n - shift % n) % n;
                        entry(row, (row + i) % n)
                    })
                    .collect();
                let pt = ckks_encode(&diag, diag_scale, level, params)?;
                let term = ckks_mul_plain(rotated, &pt)?;
                inner = Some(match inner {
                    Some(acc) => ckks_add(&acc, &term)?,
                    None => term,
                });
            }
            let inner = inner.ok_or_else(|| FheError::InvalidParam("empty BSGS block".into()))?;
            ckks_rotate(&inner, shift as i64, keys)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut sum = blocks[0].clone();
    for block in &blocks[1..] {
        sum = ckks_add(&sum, block)?;
    }
    let mut out = ckks_rescale(&sum)?;
    out.scale = target;
    Ok(out)
}
