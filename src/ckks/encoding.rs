use std::f64::consts::PI;
use std::sync::Arc;
use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use crate::ckks::CkksPlaintext;
use crate::error::{FheError, Result};
use crate::params::CkksParams;
use crate::ring::rns::RnsPoly;

/// Beyond this magnitude coefficients go through `BigInt`.
const I64_SAFE: f64 = 4.0e18;

/// FFT specialised to the canonical embedding of Z[X]/(X^N + 1).
///
/// Slot j of a message polynomial is its value at ζ^(5^j), with ζ = e^(iπ/N).
/// Working on `N/2` complex numbers `u_k = m_k + i·m_(k + N/2)`, slot j equals
/// `Σ_k u_k ζ_j^k`, which this transform computes in O(N log N).
#[derive(Clone, Debug)]
pub struct SpecialFft {
    slots: usize,
    m: usize,
    rot_group: Vec<usize>,
    ksi_pows: Vec<Complex64>,
}

impl SpecialFft {
    pub fn new(ring_degree: usize) -> Self {
        let m = 2 * ring_degree;
        let slots = ring_degree / 2;
        let mut rot_group = Vec::with_capacity(slots);
        let mut five = 1usize;
        for _ in 0..slots {
            rot_group.push(five);
            five = five * 5 % m;
        }
        let ksi_pows = (0..=m)
            .map(|j| Complex64::from_polar(1.0, 2.0 * PI * j as f64 / m as f64))
            .collect();
        Self { slots, m, rot_group, ksi_pows }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// `5^j mod 2N` for every slot j.
    pub fn rotation_group(&self) -> &[usize] {
        &self.rot_group
    }

    /// ζ^e for any exponent e.
    pub fn root(&self, e: usize) -> Complex64 {
        self.ksi_pows[e % self.m]
    }

    fn bit_reverse(vals: &mut [Complex64]) {
        let n = vals.len();
        let mut j = 0;
        for i in 1..n {
            let mut bit = n >> 1;
            while j >= bit {
                j -= bit;
                bit >>= 1;
            }
            j += bit;
            if i < j {
                vals.swap(i, j);
            }
        }
    }

    /// Coefficient pairs `u` to slot values, in place.
    pub fn evaluate(&self, vals: &mut [Complex64]) {
        let size = vals.len();
        Self::bit_reverse(vals);
        let mut len = 2;
        while len <= size {
            let half = len / 2;
            let quarter_m = len * 4;
            let gap = self.m / quarter_m;
            for start in (0..size).step_by(len) {
                for j in 0..half {
                    let idx = (self.rot_group[j] % quarter_m) * gap;
                    let u = vals[start + j];
                    let v = vals[start + j + half] * self.ksi_pows[idx];
                    vals[start + j] = u + v;
                    vals[start + j + half] = u - v;
                }
            }
            len <<= 1;
        }
    }

    /// Slot values back to coefficient pairs, in place.
    pub fn interpolate(&self, vals: &mut [Complex64]) {
        let size = vals.len();
        let mut len = size;
        while len >= 1 {
            let half = len / 2;
            let quarter_m = len * 4;
            let gap = self.m / quarter_m;
            for start in (0..size).step_by(len) {
                for j in 0..half {
                    let idx = (quarter_m - self.rot_group[j] % quarter_m) * gap;
                    let a = vals[start + j];
                    let b = vals[start + j + half];
                    vals[start + j] = a + b;
                    vals[start + j + half] = (a - b) * self.ksi_pows[idx];
                }
            }
            len >>= 1;
        }
        Self::bit_reverse(vals);
        let inv = 1.0 / size as f64;
        for v in vals.iter_mut() {
            *v *= inv;
        }
    }
}

/// Round scaled coefficients and reduce them over `q_0 .. q_level`.
fn coeffs_to_rns(coeffs: &[f64], level: usize, params: &CkksParams) -> Result<RnsPoly> {
    let basis = params.chain.basis(level)?;
    if coeffs.iter().all(|c| c.abs() < I64_SAFE) {
        let small: Vec<i64> = coeffs.iter().map(|c| c.round() as i64).collect();
        return basis.decompose_signed(&small);
    }
    let big = coeffs.iter()
        .map(|c| BigInt::from_f64(c.round()).ok_or_else(|| FheError::InvalidParam(format!("cannot encode {c}"))))
        .collect::<Result<Vec<_>>>()?;
    basis.decompose_to_rns(&big)
}

fn check_encoding(scale: f64, level: usize, params: &CkksParams) -> Result<()> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(FheError::InvalidParam(format!("scale must be positive, got {scale}")));
    }
    if level > params.physical_top() {
        return Err(FheError::ChainExhausted);
    }
    Ok(())
}

/// Encode up to N/2 complex values at `scale`, over `q_0 .. q_level`.
pub fn ckks_encode(values: &[Complex64], scale: f64, level: usize, params: &Arc<CkksParams>) -> Result<CkksPlaintext> {
    let slots = params.slot_count();
    if values.len() > slots {
        return Err(FheError::SlotOverflow { max: slots, got: values.len() });
    }
    check_encoding(scale, level, params)?;
    let mut u = vec![Complex64::zero(); slots];
    u[..values.len()].copy_from_slice(values);
    params.fft.interpolate(&mut u);

    let mut coeffs = vec![0f64; params.ring_degree];
    for (k, z) in u.iter().enumerate() {
        coeffs[k] = z.re * scale;
        coeffs[k + slots] = z.im * scale;
    }
    Ok(CkksPlaintext {
        poly: coeffs_to_rns(&coeffs, level, params)?,
        scale,
        params: params.clone(),
    })
}

pub fn ckks_encode_real(values: &[f64], scale: f64, level: usize, params: &Arc<CkksParams>) -> Result<CkksPlaintext> {
    let complex: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    ckks_encode(&complex, scale, level, params)
}

/// The same value in every slot: `round(re·scale) + round(im·scale)·X^(N/2)`.
pub fn ckks_encode_const(value: Complex64, scale: f64, level: usize, params: &Arc<CkksParams>) -> Result<CkksPlaintext> {
    check_encoding(scale, level, params)?;
    let mut coeffs = vec![0f64; params.ring_degree];
    coeffs[0] = value.re * scale;
    coeffs[params.slot_count()] = value.im * scale;
    Ok(CkksPlaintext {
        poly: coeffs_to_rns(&coeffs, level, params)?,
        scale,
        params: params.clone(),
    })
}

/// All N/2 slots, divided by the plaintext scale.
pub fn ckks_decode(pt: &CkksPlaintext) -> Result<Vec<Complex64>> {
    let params = &pt.params;
    let basis = params.chain.basis(pt.level())?;
    let centered = basis.reconstruct_centered(&pt.poly)?;
    let slots = params.slot_count();
    let mut u: Vec<Complex64> = (0..slots)
        .map(|k| {
            let re = centered[k].to_f64().unwrap_or(f64::NAN);
            let im = centered[k + slots].to_f64().unwrap_or(f64::NAN);
            Complex64::new(re / pt.scale, im / pt.scale)
        })
        .collect();
    params.fft.evaluate(&mut u);
    Ok(u)
}

/// Real parts of the decoded slots.
pub fn ckks_decode_real(pt: &CkksPlaintext) -> Result<Vec<f64>> {
    Ok(ckks_decode(pt)?.into_iter().map(|z| z.re).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::presets::ckks_test;

    fn max_err(a: &[Complex64], b: &[Complex64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).norm()).fold(0.0, f64::max)
    }

    #[test]
    fn test_fft_matches_direct_evaluation() {
        let fft = SpecialFft::new(32);
        let u: Vec<Complex64> = (0..16).map(|k| Complex64::new(k as f64 * 0.1, 1.0 - k as f64 * 0.05)).collect();
        let mut z = u.clone();
        fft.evaluate(&mut z);
        for (j, &five) in fft.rotation_group().iter().enumerate() {
            let direct: Complex64 = u.iter().enumerate().map(|(k, &uk)| uk * fft.root(five * k)).sum();
            assert!((direct - z[j]).norm() < 1e-10);
        }
        fft.interpolate(&mut z);
        assert!(max_err(&z, &u) < 1e-12);
    }

    #[test]
    fn test_encode_decode() {
        let params = ckks_test().unwrap();
        let values: Vec<Complex64> = (0..32).map(|i| Complex64::new(i as f64 / 8.0, -(i as f64) / 16.0)).collect();
        let pt = ckks_encode(&values, params.scale, params.max_level, &params).unwrap();
        assert_eq!(pt.level(), params.max_level);
        assert!(max_err(&ckks_decode(&pt).unwrap(), &values) < 1e-6);
    }

    #[test]
    fn test_encode_const() {
        let params = ckks_test().unwrap();
        let c = Complex64::new(0.75, -2.5);
        let pt = ckks_encode_const(c, params.scale, 1, &params).unwrap();
        for z in ckks_decode(&pt).unwrap() {
            assert!((z - c).norm() < 1e-6);
        }
    }

    #[test]
    fn test_slot_overflow() {
        let params = ckks_test().unwrap();
        let values = vec![Complex64::new(1.0, 0.0); params.slot_count() + 1];
        assert!(matches!(
            ckks_encode(&values, params.scale, 0, &params),
            Err(FheError::SlotOverflow { max: 32, got: 33 })
        ));
        assert!(matches!(
            ckks_encode_real(&[1.0], params.scale, params.physical_top() + 1, &params),
            Err(FheError::ChainExhausted)
        ));
    }

    #[test]
    fn test_huge_scale_uses_big_coefficients() {
        let params = ckks_test().unwrap();
        let scale = 2f64.powi(70);
        let pt = ckks_encode_real(&[1.5, -0.25], scale, params.max_level, &params).unwrap();
        let back = ckks_decode_real(&pt).unwrap();
        assert!((back[0] - 1.5).abs() < 1e-9 && (back[1] + 0.25).abs() < 1e-9);
    }
}
