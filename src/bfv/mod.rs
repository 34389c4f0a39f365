//! BFV: exact arithmetic on integers modulo t.

pub mod encoding;
pub mod encrypt;
pub mod eval;
pub mod modswitch;

pub use encoding::{BatchEncoder, IntegerEncoder, decode_coeffs, decode_scalar, encode_coeffs, encode_scalar};
pub use encrypt::{decrypt, encrypt_pk, encrypt_pk_with_rng, encrypt_sk, encrypt_sk_with_rng, noise_budget_exact};
pub use eval::{
    bfv_add, bfv_add_plain, bfv_mul, bfv_mul_and_relin, bfv_mul_plain, bfv_neg, bfv_relinearize, bfv_rotate,
    bfv_rotate_columns, bfv_sub, bfv_sub_plain,
};
pub use modswitch::{bfv_mod_switch, bfv_mod_switch_to};

use std::sync::Arc;
use crate::error::{FheError, Result};
use crate::params::BfvParams;
use crate::ring::poly::CoeffPoly;
use crate::ring::rns::RnsPoly;

/// A BFV plaintext: a polynomial with coefficients mod t.
#[derive(Clone, Debug)]
pub struct BfvPlaintext {
    pub poly: CoeffPoly,
    pub params: Arc<BfvParams>,
}

impl BfvPlaintext {
    pub fn new(poly: CoeffPoly, params: &Arc<BfvParams>) -> Result<Self> {
        if poly.modulus != params.plain_modulus {
            return Err(FheError::ModulusMismatch);
        }
        if poly.len() != params.ring_degree {
            return Err(FheError::InvalidDegree { expected: params.ring_degree, got: poly.len() });
        }
        Ok(Self { poly, params: params.clone() })
    }
}

/// A BFV ciphertext: (c0, c1, ..., c_k) where k=1 for fresh, k=2 after mul (before relin).
#[derive(Clone, Debug)]
pub struct BfvCiphertext {
    /// Components over `q_0 .. q_level`.
    pub(crate) c: Vec<RnsPoly>,
    /// Estimated log2 of the error magnitude.
    pub noise_bits: f64,
    pub(crate) key_id: u64,
    pub params: Arc<BfvParams>,
}

impl BfvCiphertext {
    /// Always two components, three between a multiplication and relinearization.
    pub fn components(&self) -> &[RnsPoly] {
        &self.c
    }

    pub fn degree(&self) -> usize {
        self.c.len() - 1
    }

    pub fn level(&self) -> usize {
        self.c[0].num_components() - 1
    }

    pub fn key_id(&self) -> u64 {
        self.key_id
    }

    /// Remaining noise budget in bits: `log2(Q_l / t) - 1 - noise_bits`.
    pub fn noise_budget(&self) -> f64 {
        let log_q = self.params.chain.log_modulus(self.level());
        log_q - (self.params.plain_modulus as f64).log2() - 1.0 - self.noise_bits
    }
}

/// Shared precondition of every binary BFV operation.
pub(crate) fn check_pair(a: &BfvCiphertext, b: &BfvCiphertext) -> Result<()> {
    if !Arc::ptr_eq(&a.params, &b.params) && !Arc::ptr_eq(&a.params.chain, &b.params.chain) {
        return Err(FheError::ModulusMismatch);
    }
    if a.key_id != b.key_id {
        return Err(FheError::KeyMismatch);
    }
    if a.level() != b.level() {
        return Err(FheError::LevelMismatch { left: a.level(), right: b.level() });
    }
    Ok(())
}
