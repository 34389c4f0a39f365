use std::sync::Arc;
use concrete_ntt::prime64::Plan;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use rayon::prelude::*;

use crate::error::{FheError, Result};
use crate::ring::modular::Modulus;
use crate::ring::ntt::{NttPoly, make_plan};
use crate::ring::poly::CoeffPoly;

/// Polynomial in RNS (Residue Number System) representation.
///
/// Stores one NttPoly per RNS prime. The actual polynomial lives in Z_Q[X]/(X^n+1)
/// where Q = ∏ q_i.
#[derive(Clone, Debug)]
pub struct RnsPoly {
    pub components: Vec<NttPoly>,
    pub ring_degree: usize,
}

/// Precomputed data for an RNS basis.
#[derive(Clone, Debug)]
pub struct RnsBasis {
    pub moduli: Vec<u64>,
    pub plans: Vec<Arc<Plan>>,
    pub ring_degree: usize,
    mods: Vec<Modulus>,
    /// (Q/q_i)^{-1} mod q_i.
    q_star_inv: Vec<u64>,
    /// Q/q_i as big integers, for CRT reconstruction.
    q_star: Vec<BigUint>,
    product: BigUint,
}

impl RnsBasis {
    /// Create a new RNS basis from a list of NTT-friendly primes.
    pub fn new(moduli: Vec<u64>, ring_degree: usize) -> Result<Self> {
        let plans = moduli.iter()
            .map(|&q| make_plan(ring_degree, q))
            .collect::<Result<Vec<_>>>()?;
        Self::with_plans(moduli, plans, ring_degree)
    }

    /// Build a basis reusing already constructed plans (one per modulus).
    pub fn with_plans(moduli: Vec<u64>, plans: Vec<Arc<Plan>>, ring_degree: usize) -> Result<Self> {
        if moduli.is_empty() {
            return Err(FheError::InvalidParam("RNS basis needs at least one modulus".into()));
        }
        if plans.len() != moduli.len() {
            return Err(FheError::ModulusMismatch);
        }
        let mods = moduli.iter().map(|&q| Modulus::new(q)).collect::<Result<Vec<_>>>()?;
        let product: BigUint = moduli.iter().map(|&q| BigUint::from(q)).product();
        let q_star: Vec<BigUint> = moduli.iter().map(|&q| &product / q).collect();

        let q_star_inv = mods.iter()
            .zip(&q_star)
            .map(|(m, qs)| {
                let residue = (qs % m.value()).to_u64_digits().first().copied().unwrap_or(0);
                m.inv(residue).map_err(|_| FheError::InvalidParam(
                    format!("RNS moduli must be pairwise coprime ({} repeats)", m.value())
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            moduli,
            plans,
            ring_degree,
            mods,
            q_star_inv,
            q_star,
            product,
        })
    }

    pub fn num_moduli(&self) -> usize {
        self.moduli.len()
    }

    pub fn modulus(&self, i: usize) -> Modulus {
        self.mods[i]
    }

    /// Q = ∏ q_i.
    pub fn product(&self) -> &BigUint {
        &self.product
    }

    /// The basis made of the first `k` primes.
    pub fn prefix(&self, k: usize) -> Result<Self> {
        if k == 0 || k > self.num_moduli() {
            return Err(FheError::InvalidParam(format!("cannot take {k} of {} primes", self.num_moduli())));
        }
        Self::with_plans(self.moduli[..k].to_vec(), self.plans[..k].to_vec(), self.ring_degree)
    }

    /// This basis followed by the primes of `other`.
    pub fn concat(&self, other: &RnsBasis) -> Result<Self> {
        if self.ring_degree != other.ring_degree {
            return Err(FheError::InvalidDegree { expected: self.ring_degree, got: other.ring_degree });
        }
        let moduli = self.moduli.iter().chain(&other.moduli).copied().collect();
        let plans = self.plans.iter().chain(&other.plans).cloned().collect();
        Self::with_plans(moduli, plans, self.ring_degree)
    }

    /// Whether `poly` has exactly one component per prime of this basis.
    pub fn matches(&self, poly: &RnsPoly) -> bool {
        poly.ring_degree == self.ring_degree
            && poly.components.len() == self.moduli.len()
            && poly.components.iter().zip(&self.mods).all(|(c, m)| c.modulus == *m)
    }

    fn check(&self, poly: &RnsPoly) -> Result<()> {
        if poly.ring_degree != self.ring_degree {
            return Err(FheError::InvalidDegree { expected: self.ring_degree, got: poly.ring_degree });
        }
        if !self.matches(poly) {
            return Err(FheError::ModulusMismatch);
        }
        Ok(())
    }

    /// Split signed integer coefficients into residues, one NTT component per prime.
    pub fn decompose_signed(&self, coeffs: &[i64]) -> Result<RnsPoly> {
        self.check_len(coeffs.len())?;
        let components = self.mods.iter()
            .zip(&self.plans)
            .map(|(m, plan)| {
                let residues = coeffs.iter().map(|&c| m.reduce_i64(c)).collect();
                NttPoly::ntt_forward(&CoeffPoly { coeffs: residues, modulus: m.value() }, plan.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RnsPoly { components, ring_degree: self.ring_degree })
    }

    /// Split arbitrary-size signed coefficients into residues mod every prime.
    pub fn decompose_to_rns(&self, coeffs: &[BigInt]) -> Result<RnsPoly> {
        self.check_len(coeffs.len())?;
        let components = self.mods.iter()
            .zip(&self.plans)
            .map(|(m, plan)| {
                let q = BigInt::from(m.value());
                let residues = coeffs.iter().map(|c| bigint_mod_u64(c, &q)).collect();
                NttPoly::ntt_forward(&CoeffPoly { coeffs: residues, modulus: m.value() }, plan.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RnsPoly { components, ring_degree: self.ring_degree })
    }

    /// Build from residue vectors already reduced mod each prime, in basis order.
    pub fn from_residues(&self, residues: Vec<Vec<u64>>) -> Result<RnsPoly> {
        if residues.len() != self.num_moduli() {
            return Err(FheError::ModulusMismatch);
        }
        let components = residues.into_iter()
            .zip(self.mods.iter().zip(&self.plans))
            .map(|(coeffs, (m, plan))| {
                self.check_len(coeffs.len())?;
                let poly = CoeffPoly::from_coeffs(coeffs, m.value());
                NttPoly::ntt_forward(&poly, plan.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RnsPoly { components, ring_degree: self.ring_degree })
    }

    /// The constant polynomial `c`.
    pub fn constant(&self, c: &BigInt) -> Result<RnsPoly> {
        let mut coeffs = vec![BigInt::zero(); self.ring_degree];
        coeffs[0] = c.clone();
        self.decompose_to_rns(&coeffs)
    }

    /// CRT reconstruction of every coefficient into [0, Q).
    pub fn reconstruct_from_rns(&self, poly: &RnsPoly) -> Result<Vec<BigUint>> {
        self.check(poly)?;
        let residues = poly.to_coeff_polys();
        Ok(self.crt(&residues))
    }

    /// CRT reconstruction into the centered range (-Q/2, Q/2].
    pub fn reconstruct_centered(&self, poly: &RnsPoly) -> Result<Vec<BigInt>> {
        let half = &self.product >> 1;
        let q = BigInt::from(self.product.clone());
        Ok(self.reconstruct_from_rns(poly)?
            .into_iter()
            .map(|x| if x > half { BigInt::from(x) - &q } else { BigInt::from(x) })
            .collect())
    }

    fn crt(&self, residues: &[CoeffPoly]) -> Vec<BigUint> {
        (0..self.ring_degree)
            .into_par_iter()
            .map(|j| {
                let mut acc = BigUint::zero();
                for (i, m) in self.mods.iter().enumerate() {
                    let t = m.mul(residues[i].coeffs[j], self.q_star_inv[i]);
                    acc += &self.q_star[i] * t;
                }
                acc % &self.product
            })
            .collect()
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.ring_degree {
            return Err(FheError::InvalidDegree { expected: self.ring_degree, got: len });
        }
        Ok(())
    }
}

/// `c mod q` for a signed big integer, as a canonical u64.
pub fn bigint_mod_u64(c: &BigInt, q: &BigInt) -> u64 {
    let mut r = c % q;
    if r.sign() == Sign::Minus {
        r += q;
    }
    r.to_u64_digits().1.first().copied().unwrap_or(0)
}

/// Nearest integer to `num / den` for a positive denominator.
pub fn div_round(num: &BigInt, den: &BigInt) -> BigInt {
    let two = BigInt::from(2);
    let twice = num * &two + den;
    let d2 = den * &two;
    let q = &twice / &d2;
    // BigInt division truncates toward zero; fix up to floor.
    if (&twice % &d2).sign() == Sign::Minus { q - BigInt::one() } else { q }
}

/// Exact extension: reconstruct the centered value in `from` and reduce it into `to`.
///
/// Exact as long as every coefficient is centered in (-Q_from/2, Q_from/2].
pub fn basis_extend(poly: &RnsPoly, from: &RnsBasis, to: &RnsBasis) -> Result<RnsPoly> {
    let centered = from.reconstruct_centered(poly)?;
    to.decompose_to_rns(&centered)
}

/// Fast base extension from basis Q to basis P (Bajard et al.).
///
/// Approximate: the result is x + α·Q for a small integer 0 <= α < k, where k
/// is the number of primes of `from`.
pub fn fast_base_extend(
    poly: &RnsPoly,
    from: &RnsBasis,
    to: &RnsBasis,
) -> Result<RnsPoly> {
    from.check(poly)?;
    let n = poly.ring_degree;

    let t_coeffs: Vec<Vec<u64>> = poly.to_coeff_polys().iter()
        .enumerate()
        .map(|(i, cp)| {
            let m = from.mods[i];
            cp.coeffs.iter().map(|&c| m.mul(c, from.q_star_inv[i])).collect()
        })
        .collect();

    let components = to.mods.iter()
        .zip(&to.plans)
        .map(|(pj, plan)| {
            let q_star_mod_pj: Vec<u64> = from.q_star.iter()
                .map(|qs| (qs % pj.value()).to_u64_digits().first().copied().unwrap_or(0))
                .collect();
            let coeffs = (0..n)
                .map(|pos| {
                    t_coeffs.iter()
                        .zip(&q_star_mod_pj)
                        .fold(0u64, |acc, (t, &qs)| pj.add(acc, pj.mul(pj.reduce(t[pos]), qs)))
                })
                .collect();
            NttPoly::ntt_forward(&CoeffPoly { coeffs, modulus: pj.value() }, plan.clone())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RnsPoly { components, ring_degree: n })
}

impl RnsPoly {
    /// Create a zero polynomial in RNS.
    pub fn zero(basis: &RnsBasis) -> Self {
        let components = basis.mods.iter()
            .zip(basis.plans.iter())
            .map(|(&q, plan)| NttPoly::zero(basis.ring_degree, q, plan.clone()))
            .collect();
        Self {
            components,
            ring_degree: basis.ring_degree,
        }
    }

    /// Number of RNS components.
    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    pub fn moduli(&self) -> Vec<u64> {
        self.components.iter().map(|c| c.modulus.value()).collect()
    }

    /// Inverse NTT of every component.
    pub fn to_coeff_polys(&self) -> Vec<CoeffPoly> {
        self.components.par_iter().map(|c| c.ntt_inverse()).collect()
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.ring_degree != other.ring_degree {
            return Err(FheError::InvalidDegree { expected: self.ring_degree, got: other.ring_degree });
        }
        if self.components.len() != other.components.len() {
            return Err(FheError::ModulusMismatch);
        }
        Ok(())
    }

    fn zip_with(&self, other: &Self, f: impl Fn(&NttPoly, &NttPoly) -> Result<NttPoly>) -> Result<Self> {
        self.check_compatible(other)?;
        let components = self.components.iter()
            .zip(other.components.iter())
            .map(|(a, b)| f(a, b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components, ring_degree: self.ring_degree })
    }

    /// Component-wise addition in RNS.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, NttPoly::add)
    }

    /// Component-wise subtraction in RNS.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, NttPoly::sub)
    }

    pub fn neg(&self) -> Self {
        let components = self.components.iter().map(|a| a.neg()).collect();
        Self { components, ring_degree: self.ring_degree }
    }

    /// Component-wise multiplication in RNS (= negacyclic polynomial multiplication).
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, NttPoly::mul)
    }

    /// Fused `self += a * b`.
    pub fn mul_add_assign(&mut self, a: &Self, b: &Self) -> Result<()> {
        self.check_compatible(a)?;
        a.check_compatible(b)?;
        for ((acc, x), y) in self.components.iter_mut().zip(&a.components).zip(&b.components) {
            acc.mul_add_assign(x, y)?;
        }
        Ok(())
    }

    /// Multiply by a small integer (the same scalar in every component).
    pub fn scalar_mul(&self, scalar: u64) -> Self {
        let components = self.components.iter().map(|c| c.scalar_mul(scalar)).collect();
        Self { components, ring_degree: self.ring_degree }
    }

    /// Multiply component `i` by `scalars[i]`.
    pub fn scalar_mul_residues(&self, scalars: &[u64]) -> Result<Self> {
        if scalars.len() != self.components.len() {
            return Err(FheError::ModulusMismatch);
        }
        let components = self.components.iter()
            .zip(scalars)
            .map(|(c, &s)| c.scalar_mul(s))
            .collect();
        Ok(Self { components, ring_degree: self.ring_degree })
    }

    /// Multiply by a big integer constant.
    pub fn scalar_mul_bigint(&self, scalar: &BigInt) -> Self {
        let components = self.components.iter()
            .map(|c| c.scalar_mul(bigint_mod_u64(scalar, &BigInt::from(c.modulus.value()))))
            .collect();
        Self { components, ring_degree: self.ring_degree }
    }

    /// Keep only the first `k` components (exact reduction mod q_0...q_{k-1}).
    pub fn truncate(&self, k: usize) -> Result<Self> {
        if k == 0 || k > self.components.len() {
            return Err(FheError::ChainExhausted);
        }
        Ok(Self { components: self.components[..k].to_vec(), ring_degree: self.ring_degree })
    }

    /// Divide by the last prime q_last with rounding and drop it:
    /// `c'_i = (c_i - [c]_{q_last}) * q_last^{-1} mod q_i`, with `[c]_{q_last}` centered.
    ///
    /// `last_inv[i]` must hold `q_last^{-1} mod q_i` for every remaining prime.
    pub fn divide_round_last(&self, last_inv: &[u64]) -> Result<Self> {
        let k = self.components.len();
        if k < 2 {
            return Err(FheError::ChainExhausted);
        }
        if last_inv.len() < k - 1 {
            return Err(FheError::ModulusMismatch);
        }
        let last = self.components[k - 1].ntt_inverse();
        let q_last = self.components[k - 1].modulus;
        let centered: Vec<i64> = last.coeffs.iter().map(|&c| q_last.center(c)).collect();

        let components = self.components[..k - 1]
            .par_iter()
            .zip(&last_inv[..k - 1])
            .map(|(comp, &inv)| {
                let m = comp.modulus;
                let r = CoeffPoly {
                    coeffs: centered.iter().map(|&c| m.reduce_i64(c)).collect(),
                    modulus: m.value(),
                };
                let r_ntt = NttPoly::ntt_forward(&r, comp.plan.clone())?;
                Ok(comp.sub(&r_ntt)?.scalar_mul(inv))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components, ring_degree: self.ring_degree })
    }

    /// Apply X -> X^g in every component.
    pub fn automorphism(&self, g: usize) -> Result<Self> {
        let components = self.components
            .par_iter()
            .map(|c| NttPoly::ntt_forward(&c.ntt_inverse().automorphism(g), c.plan.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components, ring_degree: self.ring_degree })
    }

    /// Multiply by the monomial X^j.
    pub fn monomial_mul(&self, j: usize) -> Result<Self> {
        let components = self.components
            .iter()
            .map(|c| NttPoly::ntt_forward(&c.ntt_inverse().monomial_mul(j), c.plan.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components, ring_degree: self.ring_degree })
    }
}

impl PartialEq for RnsPoly {
    fn eq(&self, other: &Self) -> bool {
        self.ring_degree == other.ring_degree && self.components == other.components
    }
}
