use crate::error::{FheError, Result};

/// Barrett reduction: compute a mod m using precomputed Barrett constant.
///
/// Barrett constant k = floor(2^64 / m). For moduli ≤ 2^32 the single-word
/// trick is exact for inputs a < m^2. Larger moduli fall back to u128
/// division.
#[inline(always)]
pub fn barrett_reduce(a: u128, m: u64, barrett_k: u64) -> u64 {
    if m > (1u64 << 32) {
        (a % m as u128) as u64
    } else {
        let q_hat = ((a * barrett_k as u128) >> 64) as u64;
        let r = (a as u64).wrapping_sub(q_hat.wrapping_mul(m));
        if r >= m { r.wrapping_sub(m) } else { r }
    }
}

/// Compute Barrett constant for modulus m: floor(2^64 / m)
#[inline]
pub fn barrett_constant(m: u64) -> u64 {
    debug_assert!(m > 1, "modulus must be > 1");
    ((1u128 << 64) / m.max(2) as u128) as u64
}

/// Modular addition: (a + b) mod m, assumes a, b < m
#[inline(always)]
pub fn mod_add(a: u64, b: u64, m: u64) -> u64 {
    let sum = a as u128 + b as u128;
    let r = sum as u64;
    if sum >= m as u128 { r.wrapping_sub(m) } else { r }
}

/// Modular subtraction: (a - b) mod m, assumes a, b < m
#[inline(always)]
pub fn mod_sub(a: u64, b: u64, m: u64) -> u64 {
    if a >= b {
        a - b
    } else {
        m - b + a
    }
}

/// Modular negation: (-a) mod m, assumes a < m
#[inline(always)]
pub fn mod_neg(a: u64, m: u64) -> u64 {
    if a == 0 { 0 } else { m - a }
}

/// Modular multiplication: (a * b) mod m using Barrett reduction
#[inline(always)]
pub fn mod_mul(a: u64, b: u64, m: u64, barrett_k: u64) -> u64 {
    barrett_reduce(a as u128 * b as u128, m, barrett_k)
}

/// Modular exponentiation: a^exp mod m
pub fn mod_pow(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let bk = barrett_constant(m);
    let mut result = 1u64 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mod_mul(result, base, m, bk);
        }
        exp >>= 1;
        base = mod_mul(base, base, m, bk);
    }
    result
}

/// Modular inverse via the extended Euclidean algorithm.
pub fn mod_inv(a: u64, m: u64) -> Option<u64> {
    let (mut old_r, mut r) = (a as i128 % m as i128, m as i128);
    let (mut old_s, mut s) = (1i128, 0i128);

    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }

    if old_r != 1 {
        return None;
    }

    Some(old_s.rem_euclid(m as i128) as u64)
}

/// A word-sized modulus together with its Barrett constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Modulus {
    value: u64,
    barrett_k: u64,
}

impl Modulus {
    pub fn new(value: u64) -> Result<Self> {
        if value < 2 {
            return Err(FheError::InvalidParam(format!("modulus must be >= 2, got {value}")));
        }
        Ok(Self { value, barrett_k: barrett_constant(value) })
    }

    #[inline(always)]
    pub fn value(&self) -> u64 {
        self.value
    }

    #[inline(always)]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        mod_add(a, b, self.value)
    }

    #[inline(always)]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        mod_sub(a, b, self.value)
    }

    #[inline(always)]
    pub fn neg(&self, a: u64) -> u64 {
        mod_neg(a, self.value)
    }

    #[inline(always)]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        mod_mul(a, b, self.value, self.barrett_k)
    }

    pub fn pow(&self, base: u64, exp: u64) -> u64 {
        mod_pow(base, exp, self.value)
    }

    pub fn inv(&self, a: u64) -> Result<u64> {
        mod_inv(a, self.value).ok_or_else(|| {
            FheError::InvalidParam(format!("{a} is not invertible modulo {}", self.value))
        })
    }

    /// Reduce an arbitrary u64 into [0, q).
    #[inline(always)]
    pub fn reduce(&self, a: u64) -> u64 {
        if a < self.value { a } else { a % self.value }
    }

    /// Reduce a signed value into [0, q).
    #[inline(always)]
    pub fn reduce_i64(&self, a: i64) -> u64 {
        (a as i128).rem_euclid(self.value as i128) as u64
    }

    /// Centered representative in (-q/2, q/2].
    #[inline(always)]
    pub fn center(&self, a: u64) -> i64 {
        if a > self.value / 2 {
            a as i64 - self.value as i64
        } else {
            a as i64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrett_reduce() {
        let m = 65537u64;
        let bk = barrett_constant(m);
        assert_eq!(barrett_reduce(0, m, bk), 0);
        assert_eq!(barrett_reduce(1, m, bk), 1);
        assert_eq!(barrett_reduce(m as u128, m, bk), 0);
        assert_eq!(barrett_reduce(m as u128 + 1, m, bk), 1);
        assert_eq!(barrett_reduce(123456789u128, m, bk), (123456789u128 % m as u128) as u64);
    }

    #[test]
    fn test_barrett_large_modulus() {
        let m = 1152921504606830593u64;
        let bk = barrett_constant(m);
        let a = m - 3;
        let b = m - 5;
        assert_eq!(mod_mul(a, b, m, bk), 15);
    }

    #[test]
    fn test_mod_add_sub_neg() {
        let m = 65537u64;
        assert_eq!(mod_add(m - 1, 2, m), 1);
        assert_eq!(mod_sub(100, 200, m), m - 100);
        assert_eq!(mod_add(100, mod_neg(100, m), m), 0);
        assert_eq!(mod_neg(0, m), 0);
    }

    #[test]
    fn test_mod_pow_inv() {
        let m = 65537u64;
        assert_eq!(mod_pow(2, 10, m), 1024);
        assert_eq!(mod_pow(3, 0, m), 1);
        let inv = mod_inv(12345, m).unwrap();
        assert_eq!(mod_mul(12345, inv, m, barrett_constant(m)), 1);
        assert!(mod_inv(6, 9).is_none());
    }

    #[test]
    fn test_modulus_signed_reduction() {
        let q = Modulus::new(17).unwrap();
        assert_eq!(q.reduce_i64(-1), 16);
        assert_eq!(q.reduce_i64(-35), 16);
        assert_eq!(q.center(16), -1);
        assert_eq!(q.center(8), 8);
        assert_eq!(q.center(9), -8);
        assert!(Modulus::new(1).is_err());
    }
}
