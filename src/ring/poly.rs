use crate::error::{FheError, Result};
use crate::ring::modular::{barrett_constant, mod_add, mod_mul, mod_neg, mod_sub};

/// Polynomial in coefficient representation over Z_q[X]/(X^n + 1).
#[derive(Clone, Debug)]
pub struct CoeffPoly {
    pub coeffs: Vec<u64>,
    pub modulus: u64,
}

impl CoeffPoly {
    /// Create a zero polynomial of degree < n in Z_q.
    pub fn zero(n: usize, modulus: u64) -> Self {
        Self {
            coeffs: vec![0u64; n],
            modulus,
        }
    }

    /// Create a polynomial from coefficients (reduced mod q).
    pub fn from_coeffs(coeffs: Vec<u64>, modulus: u64) -> Self {
        let mut p = Self { coeffs, modulus };
        p.reduce();
        p
    }

    /// Create a polynomial from signed coefficients, mapping negatives to q - |c|.
    pub fn from_signed(coeffs: &[i64], modulus: u64) -> Self {
        let m = modulus as i128;
        let coeffs = coeffs.iter().map(|&c| (c as i128).rem_euclid(m) as u64).collect();
        Self { coeffs, modulus }
    }

    /// Ring degree (number of coefficients).
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Reduce all coefficients mod q.
    pub fn reduce(&mut self) {
        for c in self.coeffs.iter_mut() {
            *c %= self.modulus;
        }
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.len() != other.len() {
            return Err(FheError::InvalidDegree {
                expected: self.len(),
                got: other.len(),
            });
        }
        if self.modulus != other.modulus {
            return Err(FheError::ModulusMismatch);
        }
        Ok(())
    }

    /// Add two polynomials in Z_q[X]/(X^n+1).
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let coeffs = self.coeffs.iter()
            .zip(other.coeffs.iter())
            .map(|(&a, &b)| mod_add(a, b, self.modulus))
            .collect();
        Ok(Self { coeffs, modulus: self.modulus })
    }

    /// Subtract two polynomials in Z_q[X]/(X^n+1).
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let coeffs = self.coeffs.iter()
            .zip(other.coeffs.iter())
            .map(|(&a, &b)| mod_sub(a, b, self.modulus))
            .collect();
        Ok(Self { coeffs, modulus: self.modulus })
    }

    pub fn neg(&self) -> Self {
        let coeffs = self.coeffs.iter()
            .map(|&a| mod_neg(a, self.modulus))
            .collect();
        Self { coeffs, modulus: self.modulus }
    }

    /// Schoolbook multiply in Z_q[X]/(X^n+1).
    /// Reference path for tests and tiny rings; ring elements use the NTT.
    pub fn mul_naive(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let n = self.len();
        let bk = barrett_constant(self.modulus);
        let mut result = vec![0u64; n];

        for i in 0..n {
            if self.coeffs[i] == 0 {
                continue;
            }
            for j in 0..n {
                if other.coeffs[j] == 0 {
                    continue;
                }
                let prod = mod_mul(self.coeffs[i], other.coeffs[j], self.modulus, bk);
                let idx = i + j;
                if idx < n {
                    result[idx] = mod_add(result[idx], prod, self.modulus);
                } else {
                    // X^n ≡ -1
                    result[idx - n] = mod_sub(result[idx - n], prod, self.modulus);
                }
            }
        }

        Ok(Self { coeffs: result, modulus: self.modulus })
    }

    pub fn scalar_mul(&self, scalar: u64) -> Self {
        let bk = barrett_constant(self.modulus);
        let s = scalar % self.modulus;
        let coeffs = self.coeffs.iter()
            .map(|&c| mod_mul(c, s, self.modulus, bk))
            .collect();
        Self { coeffs, modulus: self.modulus }
    }

    /// Get centered representation: map [0, q) -> [-(q-1)/2, (q-1)/2]
    pub fn centered_coeffs(&self) -> Vec<i64> {
        let half = self.modulus / 2;
        self.coeffs.iter().map(|&c| {
            if c > half {
                c as i64 - self.modulus as i64
            } else {
                c as i64
            }
        }).collect()
    }

    /// Apply X -> X^g. For odd g this is a ring automorphism, a signed
    /// permutation of the coefficients.
    pub fn automorphism(&self, g: usize) -> Self {
        let n = self.len();
        let mut result = vec![0u64; n];
        for (i, &c) in self.coeffs.iter().enumerate() {
            if c == 0 {
                continue;
            }
            let e = (i * g) % (2 * n);
            if e < n {
                result[e] = mod_add(result[e], c, self.modulus);
            } else {
                result[e - n] = mod_sub(result[e - n], c, self.modulus);
            }
        }
        Self { coeffs: result, modulus: self.modulus }
    }

    /// Multiply by the monomial X^j (j taken mod 2n).
    pub fn monomial_mul(&self, j: usize) -> Self {
        let n = self.len();
        let mut result = vec![0u64; n];
        for (i, &c) in self.coeffs.iter().enumerate() {
            let e = (i + j) % (2 * n);
            if e < n {
                result[e] = c;
            } else {
                result[e - n] = mod_neg(c, self.modulus);
            }
        }
        Self { coeffs: result, modulus: self.modulus }
    }
}

/// Apply X -> X^g to small signed coefficients (secret keys, test vectors).
pub fn automorphism_signed(coeffs: &[i64], g: usize) -> Vec<i64> {
    let n = coeffs.len();
    let mut result = vec![0i64; n];
    for (i, &c) in coeffs.iter().enumerate() {
        let e = (i * g) % (2 * n);
        if e < n {
            result[e] += c;
        } else {
            result[e - n] -= c;
        }
    }
    result
}

impl PartialEq for CoeffPoly {
    fn eq(&self, other: &Self) -> bool {
        self.modulus == other.modulus && self.coeffs == other.coeffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sub() {
        let a = CoeffPoly::from_coeffs(vec![1, 2, 3, 4], 17);
        let b = CoeffPoly::from_coeffs(vec![5, 6, 7, 8], 17);
        let c = a.add(&b).unwrap();
        assert_eq!(c.coeffs, vec![6, 8, 10, 12]);
        assert_eq!(c.sub(&b).unwrap(), a);
    }

    #[test]
    fn test_mismatch_errors() {
        let a = CoeffPoly::zero(4, 17);
        let b = CoeffPoly::zero(8, 17);
        let c = CoeffPoly::zero(4, 19);
        assert!(matches!(a.add(&b), Err(FheError::InvalidDegree { expected: 4, got: 8 })));
        assert!(matches!(a.mul_naive(&c), Err(FheError::ModulusMismatch)));
    }

    #[test]
    fn test_mul_naive_wraparound() {
        // X^3 * X^3 = X^6 = -X^2 mod X^4 + 1
        let a = CoeffPoly::from_coeffs(vec![0, 0, 0, 1], 17);
        let c = a.mul_naive(&a).unwrap();
        assert_eq!(c.coeffs, vec![0, 0, 16, 0]);
    }

    #[test]
    fn test_from_signed_and_centered() {
        let a = CoeffPoly::from_signed(&[0, 1, -1, -8], 17);
        assert_eq!(a.coeffs, vec![0, 1, 16, 9]);
        assert_eq!(a.centered_coeffs(), vec![0, 1, -1, -8]);
    }

    #[test]
    fn test_automorphism() {
        // 1 + X + X^2 + X^3 under X -> X^3 in Z_17[X]/(X^4+1)
        let p = CoeffPoly::from_coeffs(vec![1, 1, 1, 1], 17);
        assert_eq!(p.automorphism(3).coeffs, vec![1, 1, 16, 1]);
        assert_eq!(automorphism_signed(&[1, 1, 1, 1], 3), vec![1, 1, -1, 1]);
    }

    #[test]
    fn test_monomial_mul() {
        let p = CoeffPoly::from_coeffs(vec![1, 2, 3, 4], 17);
        // X^2 * (1 + 2X + 3X^2 + 4X^3) = -3 - 4X + X^2 + 2X^3
        assert_eq!(p.monomial_mul(2).coeffs, vec![14, 13, 1, 2]);
        assert_eq!(p.monomial_mul(8), p);
    }
}
