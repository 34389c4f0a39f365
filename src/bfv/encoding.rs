use std::sync::Arc;

use crate::bfv::BfvPlaintext;
use crate::error::{FheError, Result};
use crate::params::BfvParams;
use crate::ring::ntt::NttTable;
use crate::ring::poly::CoeffPoly;

fn check_values(values: &[u64], params: &BfvParams) -> Result<()> {
    if values.len() > params.ring_degree {
        return Err(FheError::SlotOverflow { max: params.ring_degree, got: values.len() });
    }
    if let Some(&v) = values.iter().find(|&&v| v >= params.plain_modulus) {
        return Err(FheError::InvalidParam(
            format!("plaintext {} >= plain_modulus {}", v, params.plain_modulus)
        ));
    }
    Ok(())
}

/// Encode a scalar value as the constant polynomial m.
pub fn encode_scalar(m: u64, params: &Arc<BfvParams>) -> Result<BfvPlaintext> {
    check_values(&[m], params)?;
    let mut coeffs = vec![0u64; params.ring_degree];
    coeffs[0] = m;
    BfvPlaintext::new(CoeffPoly { coeffs, modulus: params.plain_modulus }, params)
}

/// Decode a scalar from a plaintext polynomial (read coefficient 0).
pub fn decode_scalar(pt: &BfvPlaintext) -> u64 {
    pt.poly.coeffs[0]
}

/// Identity encoding: `values[i]` becomes the coefficient of X^i.
pub fn encode_coeffs(values: &[u64], params: &Arc<BfvParams>) -> Result<BfvPlaintext> {
    check_values(values, params)?;
    let mut coeffs = vec![0u64; params.ring_degree];
    coeffs[..values.len()].copy_from_slice(values);
    BfvPlaintext::new(CoeffPoly { coeffs, modulus: params.plain_modulus }, params)
}

/// The first `count` coefficients.
pub fn decode_coeffs(pt: &BfvPlaintext, count: usize) -> Vec<u64> {
    pt.poly.coeffs[..count.min(pt.poly.len())].to_vec()
}

/// CRT batching for a prime t ≡ 1 (mod 2n).
///
/// Only such a t has the 2n-th roots of unity the slot NTT needs. Composite
/// and prime-power moduli (t = 129 or t = 2^8, say) are rejected by
/// [`BatchEncoder::new`] with `InvalidParam`; use [`encode_scalar`],
/// [`encode_coeffs`] or [`IntegerEncoder`] with those.
///
/// Z_t[X]/(X^n + 1) splits into n copies of Z_t. Slots are laid out as a
/// 2 x n/2 matrix: slot (0, i) is the evaluation at ψ^(5^i) and slot (1, i)
/// at ψ^(-5^i), so X -> X^(5^k) rotates both rows left by k and
/// X -> X^(2n-1) swaps the rows.
#[derive(Clone, Debug)]
pub struct BatchEncoder {
    params: Arc<BfvParams>,
    index_map: Vec<usize>,
}

impl BatchEncoder {
    pub fn new(params: &Arc<BfvParams>) -> Result<Self> {
        if params.batch_table.is_none() {
            return Err(FheError::InvalidParam(format!(
                "plaintext modulus {} is not a prime congruent to 1 mod {}",
                params.plain_modulus,
                2 * params.ring_degree
            )));
        }
        let n = params.ring_degree;
        let half = n / 2;
        let m = 2 * n;
        let mut index_map = vec![0usize; n];
        let mut pos = 1usize;
        for i in 0..half {
            index_map[i] = (pos - 1) / 2;
            index_map[i + half] = (m - pos - 1) / 2;
            pos = pos * 5 % m;
        }
        Ok(Self { params: params.clone(), index_map })
    }

    pub fn slot_count(&self) -> usize {
        self.params.ring_degree
    }

    fn table(&self) -> Result<&NttTable> {
        self.params.batch_table.as_ref().ok_or_else(|| FheError::InvalidParam("batching unavailable".into()))
    }

    /// Encode up to n values in [0, t); missing slots are zero.
    pub fn encode(&self, values: &[u64]) -> Result<BfvPlaintext> {
        check_values(values, &self.params)?;
        let mut evals = vec![0u64; self.slot_count()];
        for (&v, &idx) in values.iter().zip(&self.index_map) {
            evals[idx] = v;
        }
        let coeffs = self.table()?.inverse(&evals)?;
        BfvPlaintext::new(CoeffPoly { coeffs, modulus: self.params.plain_modulus }, &self.params)
    }

    /// Encode signed values, taken mod t.
    pub fn encode_signed(&self, values: &[i64]) -> Result<BfvPlaintext> {
        let t = self.params.plain_modulus as i128;
        let reduced: Vec<u64> = values.iter().map(|&v| (v as i128).rem_euclid(t) as u64).collect();
        self.encode(&reduced)
    }

    pub fn decode(&self, pt: &BfvPlaintext) -> Result<Vec<u64>> {
        if pt.poly.modulus != self.params.plain_modulus {
            return Err(FheError::ModulusMismatch);
        }
        let evals = self.table()?.forward(&pt.poly.coeffs)?;
        Ok(self.index_map.iter().map(|&idx| evals[idx]).collect())
    }

    /// Decode into the centered range (-t/2, t/2].
    pub fn decode_signed(&self, pt: &BfvPlaintext) -> Result<Vec<i64>> {
        let t = self.params.plain_modulus;
        Ok(self.decode(pt)?
            .into_iter()
            .map(|v| if v > t / 2 { v as i64 - t as i64 } else { v as i64 })
            .collect())
    }
}

/// Base-b encoding of a signed integer: 6 = X^2 + X in base 2.
///
/// Decoding evaluates the centered plaintext polynomial at b, so results stay
/// correct after homomorphic additions and multiplications as long as no
/// coefficient wraps around t.
#[derive(Clone, Debug)]
pub struct IntegerEncoder {
    params: Arc<BfvParams>,
    base: u64,
}

impl IntegerEncoder {
    pub fn new(params: &Arc<BfvParams>, base: u64) -> Result<Self> {
        if base < 2 || base > params.plain_modulus {
            return Err(FheError::InvalidParam(format!(
                "integer encoder base must be in 2..={}, got {base}", params.plain_modulus
            )));
        }
        Ok(Self { params: params.clone(), base })
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn encode(&self, value: i64) -> Result<BfvPlaintext> {
        let n = self.params.ring_degree;
        let t = self.params.plain_modulus;
        let mut coeffs = vec![0u64; n];
        let mut rest = value.unsigned_abs();
        let mut i = 0;
        while rest > 0 {
            if i == n {
                let digits = (value.unsigned_abs() as f64).log(self.base as f64).floor() as usize + 1;
                return Err(FheError::SlotOverflow { max: n, got: digits });
            }
            let digit = rest % self.base;
            coeffs[i] = if value < 0 && digit != 0 { t - digit } else { digit };
            rest /= self.base;
            i += 1;
        }
        BfvPlaintext::new(CoeffPoly { coeffs, modulus: t }, &self.params)
    }

    pub fn decode(&self, pt: &BfvPlaintext) -> Result<i64> {
        let overflow = || FheError::InvalidParam("decoded integer does not fit in i64".into());
        let base = self.base as i128;
        let mut acc: i128 = 0;
        for &c in pt.poly.centered_coeffs().iter().rev() {
            acc = acc.checked_mul(base).and_then(|a| a.checked_add(c as i128)).ok_or_else(overflow)?;
        }
        i64::try_from(acc).map_err(|_| overflow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BfvParamsBuilder;
    use crate::params::presets::bfv_test;

    #[test]
    fn test_encode_decode_scalar() {
        let params = bfv_test().unwrap();
        let pt = encode_scalar(42, &params).unwrap();
        assert_eq!(decode_scalar(&pt), 42);
        assert!(encode_scalar(65537, &params).is_err());
    }

    #[test]
    fn test_coeff_encoding_overflow() {
        let params = bfv_test().unwrap();
        let values = vec![1u64; params.ring_degree + 1];
        assert!(matches!(
            encode_coeffs(&values, &params),
            Err(FheError::SlotOverflow { max: 64, got: 65 })
        ));
        let pt = encode_coeffs(&[1, 2, 3], &params).unwrap();
        assert_eq!(decode_coeffs(&pt, 3), vec![1, 2, 3]);
    }

    #[test]
    fn test_batch_roundtrip() {
        let params = bfv_test().unwrap();
        let encoder = BatchEncoder::new(&params).unwrap();
        let values: Vec<u64> = (0..params.ring_degree as u64).map(|i| i * 1021 % 65537).collect();
        let pt = encoder.encode(&values).unwrap();
        assert_eq!(encoder.decode(&pt).unwrap(), values);
    }

    #[test]
    fn test_batch_is_slotwise_product() {
        let params = bfv_test().unwrap();
        let encoder = BatchEncoder::new(&params).unwrap();
        let a: Vec<u64> = (0..64).map(|i| i + 3).collect();
        let b: Vec<u64> = (0..64).map(|i| 2 * i + 1).collect();
        let pa = encoder.encode(&a).unwrap();
        let pb = encoder.encode(&b).unwrap();
        let prod = BfvPlaintext::new(pa.poly.mul_naive(&pb.poly).unwrap(), &params).unwrap();
        let expected: Vec<u64> = a.iter().zip(&b).map(|(x, y)| x * y % 65537).collect();
        assert_eq!(encoder.decode(&prod).unwrap(), expected);
    }

    #[test]
    fn test_batch_rotation_by_automorphism() {
        let params = bfv_test().unwrap();
        let encoder = BatchEncoder::new(&params).unwrap();
        let half = params.ring_degree / 2;
        let values: Vec<u64> = (0..params.ring_degree as u64).collect();
        let pt = encoder.encode(&values).unwrap();
        let rotated = BfvPlaintext::new(pt.poly.automorphism(5), &params).unwrap();
        let got = encoder.decode(&rotated).unwrap();
        for i in 0..half {
            assert_eq!(got[i], values[(i + 1) % half]);
            assert_eq!(got[half + i], values[half + (i + 1) % half]);
        }
    }

    #[test]
    fn test_batching_requires_prime_t() {
        // 2^8, 3·43 ≡ 1 (mod 64), and the prime 97 ≢ 1 (mod 64)
        for t in [256, 129, 97] {
            let params = BfvParamsBuilder::new().ring_degree(32).plain_modulus(t).modulus_bits(vec![40]).build().unwrap();
            assert!(!params.batching_enabled());
            assert!(matches!(BatchEncoder::new(&params), Err(FheError::InvalidParam(_))));
            let pt = encode_coeffs(&[1, t - 1, 5], &params).unwrap();
            assert_eq!(decode_coeffs(&pt, 3), vec![1, t - 1, 5]);
        }
    }

    #[test]
    fn test_integer_encoder() {
        let params = bfv_test().unwrap();
        let enc = IntegerEncoder::new(&params, 2).unwrap();
        let pt = enc.encode(6).unwrap();
        assert_eq!(&pt.poly.coeffs[..3], &[0, 1, 1]);
        for v in [0i64, 1, -1, 12345, -98765] {
            assert_eq!(enc.decode(&enc.encode(v).unwrap()).unwrap(), v);
        }
    }
}
