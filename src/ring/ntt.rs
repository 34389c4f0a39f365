use std::sync::Arc;
use concrete_ntt::prime64::Plan;

use crate::error::{FheError, Result};
use crate::ring::modular::Modulus;
use crate::ring::poly::CoeffPoly;
use crate::ring::primes::primitive_root_of_unity;

/// Polynomial in NTT (evaluation) representation over Z_q[X]/(X^n + 1).
///
/// Transforms go through `concrete-ntt`, which picks AVX2/AVX-512/NEON
/// kernels at runtime. Evaluations are only ever combined pointwise, so their
/// internal ordering is irrelevant here.
#[derive(Clone, Debug)]
pub struct NttPoly {
    pub evals: Vec<u64>,
    pub modulus: Modulus,
    pub plan: Arc<Plan>,
}

/// Build an NTT plan. concrete-ntt needs n >= 16 and prime q ≡ 1 (mod 2n).
pub fn make_plan(n: usize, modulus: u64) -> Result<Arc<Plan>> {
    if !n.is_power_of_two() || n < 16 {
        return Err(FheError::InvalidParam(format!("ring degree must be a power of two >= 16, got {n}")));
    }
    let plan = Plan::try_new(n, modulus)
        .ok_or_else(|| FheError::InvalidParam(
            format!("cannot create NTT plan for n={n}, q={modulus} (need prime q ≡ 1 mod {})", 2 * n)
        ))?;
    Ok(Arc::new(plan))
}

impl NttPoly {
    pub fn zero(n: usize, modulus: Modulus, plan: Arc<Plan>) -> Self {
        Self {
            evals: vec![0u64; n],
            modulus,
            plan,
        }
    }

    /// Forward NTT of a polynomial already reduced modulo the plan's prime.
    pub fn ntt_forward(poly: &CoeffPoly, plan: Arc<Plan>) -> Result<Self> {
        if poly.modulus != plan.modulus() {
            return Err(FheError::ModulusMismatch);
        }
        if poly.len() != plan.ntt_size() {
            return Err(FheError::InvalidDegree { expected: plan.ntt_size(), got: poly.len() });
        }
        let modulus = Modulus::new(poly.modulus)?;
        let mut evals = poly.coeffs.clone();
        plan.fwd(&mut evals);
        Ok(Self { evals, modulus, plan })
    }

    /// Inverse NTT back to coefficients in [0, q).
    pub fn ntt_inverse(&self) -> CoeffPoly {
        let mut coeffs = self.evals.clone();
        self.plan.inv(&mut coeffs);
        self.plan.normalize(&mut coeffs);
        CoeffPoly {
            coeffs,
            modulus: self.modulus.value(),
        }
    }

    pub fn len(&self) -> usize {
        self.evals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evals.is_empty()
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.len() != other.len() {
            return Err(FheError::InvalidDegree { expected: self.len(), got: other.len() });
        }
        if self.modulus != other.modulus {
            return Err(FheError::ModulusMismatch);
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let q = self.modulus;
        let evals = self.evals.iter().zip(&other.evals).map(|(&a, &b)| q.add(a, b)).collect();
        Ok(Self { evals, modulus: q, plan: self.plan.clone() })
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let q = self.modulus;
        let evals = self.evals.iter().zip(&other.evals).map(|(&a, &b)| q.sub(a, b)).collect();
        Ok(Self { evals, modulus: q, plan: self.plan.clone() })
    }

    pub fn neg(&self) -> Self {
        let q = self.modulus;
        let evals = self.evals.iter().map(|&a| q.neg(a)).collect();
        Self { evals, modulus: q, plan: self.plan.clone() }
    }

    /// Pointwise product (= negacyclic polynomial product).
    ///
    /// The 1/n factor is applied by `ntt_inverse` through `plan.normalize()`.
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let q = self.modulus;
        let evals = self.evals.iter().zip(&other.evals).map(|(&a, &b)| q.mul(a, b)).collect();
        Ok(Self { evals, modulus: q, plan: self.plan.clone() })
    }

    /// Fused `self += a * b`.
    pub fn mul_add_assign(&mut self, a: &Self, b: &Self) -> Result<()> {
        a.check_compatible(b)?;
        self.check_compatible(a)?;
        let q = self.modulus;
        for ((acc, &x), &y) in self.evals.iter_mut().zip(&a.evals).zip(&b.evals) {
            *acc = q.add(*acc, q.mul(x, y));
        }
        Ok(())
    }

    pub fn scalar_mul(&self, scalar: u64) -> Self {
        let q = self.modulus;
        let s = q.reduce(scalar);
        let evals = self.evals.iter().map(|&a| q.mul(a, s)).collect();
        Self { evals, modulus: q, plan: self.plan.clone() }
    }
}

impl PartialEq for NttPoly {
    fn eq(&self, other: &Self) -> bool {
        self.modulus == other.modulus && self.evals == other.evals
    }
}

/// Negacyclic NTT with a known evaluation order: `evals[k] = m(psi^(2k+1))`
/// where psi is a fixed primitive 2n-th root of unity mod p.
///
/// Used where slot positions matter (BFV batching); ring arithmetic goes
/// through `concrete-ntt`.
#[derive(Clone, Debug)]
pub struct NttTable {
    modulus: Modulus,
    n: usize,
    psi: u64,
    psi_powers: Vec<u64>,
    psi_inv_powers: Vec<u64>,
    omega_powers: Vec<u64>,
    omega_inv_powers: Vec<u64>,
    n_inv: u64,
}

impl NttTable {
    pub fn new(n: usize, p: u64) -> Result<Self> {
        if !n.is_power_of_two() || n < 2 {
            return Err(FheError::InvalidParam(format!("NTT size must be a power of two, got {n}")));
        }
        let modulus = Modulus::new(p)?;
        let psi = primitive_root_of_unity(2 * n as u64, p)?;
        let psi_inv = modulus.inv(psi)?;
        let omega = modulus.mul(psi, psi);
        let omega_inv = modulus.mul(psi_inv, psi_inv);

        let powers = |base: u64| {
            let mut v = Vec::with_capacity(n);
            let mut x = 1u64;
            for _ in 0..n {
                v.push(x);
                x = modulus.mul(x, base);
            }
            v
        };

        Ok(Self {
            modulus,
            n,
            psi,
            psi_powers: powers(psi),
            psi_inv_powers: powers(psi_inv),
            omega_powers: powers(omega),
            omega_inv_powers: powers(omega_inv),
            n_inv: modulus.inv(n as u64)?,
        })
    }

    /// The primitive 2n-th root this table evaluates at.
    pub fn psi(&self) -> u64 {
        self.psi
    }

    fn cyclic_transform(&self, a: &mut [u64], twiddles: &[u64]) {
        let n = self.n;
        let q = self.modulus;
        let log_n = n.trailing_zeros();
        for i in 0..n {
            let j = i.reverse_bits() >> (usize::BITS - log_n);
            if i < j {
                a.swap(i, j);
            }
        }
        let mut len = 2;
        while len <= n {
            let step = n / len;
            for start in (0..n).step_by(len) {
                for k in 0..len / 2 {
                    let w = twiddles[k * step];
                    let u = a[start + k];
                    let v = q.mul(a[start + k + len / 2], w);
                    a[start + k] = q.add(u, v);
                    a[start + k + len / 2] = q.sub(u, v);
                }
            }
            len <<= 1;
        }
    }

    pub fn forward(&self, coeffs: &[u64]) -> Result<Vec<u64>> {
        if coeffs.len() != self.n {
            return Err(FheError::InvalidDegree { expected: self.n, got: coeffs.len() });
        }
        let q = self.modulus;
        let mut a: Vec<u64> = coeffs.iter().zip(&self.psi_powers).map(|(&c, &p)| q.mul(q.reduce(c), p)).collect();
        self.cyclic_transform(&mut a, &self.omega_powers);
        Ok(a)
    }

    pub fn inverse(&self, evals: &[u64]) -> Result<Vec<u64>> {
        if evals.len() != self.n {
            return Err(FheError::InvalidDegree { expected: self.n, got: evals.len() });
        }
        let q = self.modulus;
        let mut a: Vec<u64> = evals.iter().map(|&e| q.reduce(e)).collect();
        self.cyclic_transform(&mut a, &self.omega_inv_powers);
        Ok(a.iter()
            .zip(&self.psi_inv_powers)
            .map(|(&x, &p)| q.mul(q.mul(x, self.n_inv), p))
            .collect())
    }
}
