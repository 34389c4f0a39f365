//! CKKS: approximate arithmetic on vectors of complex numbers.

pub mod encoding;
pub mod encrypt;
pub mod eval;

pub use encoding::{SpecialFft, ckks_decode, ckks_decode_real, ckks_encode, ckks_encode_const, ckks_encode_real};
pub use encrypt::{ckks_decrypt, ckks_encrypt_pk, ckks_encrypt_pk_with_rng, ckks_encrypt_sk, ckks_encrypt_sk_with_rng};
pub use eval::{
    ckks_add, ckks_add_const, ckks_add_plain, ckks_conjugate, ckks_drop_to_level, ckks_mul, ckks_mul_const,
    ckks_mul_const_to_scale, ckks_mul_i, ckks_mul_plain, ckks_mul_relin_rescale, ckks_neg, ckks_relinearize,
    ckks_rescale, ckks_rotate, ckks_sub, ckks_sub_plain,
};

use std::sync::Arc;
use crate::error::{FheError, Result};
use crate::params::CkksParams;
use crate::ring::rns::RnsPoly;

/// Relative tolerance for comparing scales, which drift by float rounding.
pub const SCALE_TOLERANCE: f64 = 1e-9;

pub(crate) fn scales_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= SCALE_TOLERANCE * a.abs().max(b.abs())
}

/// An encoded CKKS message: `scale · m` rounded, over `q_0 .. q_level`.
#[derive(Clone, Debug)]
pub struct CkksPlaintext {
    pub poly: RnsPoly,
    pub scale: f64,
    pub params: Arc<CkksParams>,
}

impl CkksPlaintext {
    pub fn level(&self) -> usize {
        self.poly.num_components() - 1
    }
}

#[derive(Clone, Debug)]
pub struct CkksCiphertext {
    /// Components over `q_0 .. q_level`; three after a multiplication.
    pub(crate) c: Vec<RnsPoly>,
    pub scale: f64,
    /// Estimated log2 of the error magnitude.
    pub noise_bits: f64,
    pub(crate) key_id: u64,
    pub params: Arc<CkksParams>,
}

impl CkksCiphertext {
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

    /// Bits of headroom between the message-plus-error and `Q_l / 2`.
    pub fn noise_budget(&self) -> f64 {
        let log_q = self.params.chain.log_modulus(self.level());
        let message = self.scale.log2() + self.params.message_bits as f64;
        log_q - 1.0 - crate::noise::add_bits(message, self.noise_bits)
    }
}

/// Scales below the rescale rounding error (plus a margin) would decode to noise.
pub(crate) fn check_scale_floor(scale: f64, params: &CkksParams) -> Result<()> {
    let floor = crate::noise::min_scale_bits(params.ring_degree);
    if !(scale.is_finite() && scale.log2() >= floor) {
        return Err(FheError::InvalidParam(format!("scale {scale} is below 2^{floor:.1}")));
    }
    Ok(())
}

pub(crate) fn check_context(a: &Arc<CkksParams>, b: &Arc<CkksParams>) -> Result<()> {
    if !Arc::ptr_eq(a, b) && !Arc::ptr_eq(&a.chain, &b.chain) {
        return Err(FheError::ModulusMismatch);
    }
    Ok(())
}

/// Context, key, level and scale agreement of two operands.
pub(crate) fn check_pair(a: &CkksCiphertext, b: &CkksCiphertext) -> Result<()> {
    check_context(&a.params, &b.params)?;
    if a.key_id != b.key_id {
        return Err(FheError::KeyMismatch);
    }
    if a.level() != b.level() {
        return Err(FheError::LevelMismatch { left: a.level(), right: b.level() });
    }
    if !scales_match(a.scale, b.scale) {
        return Err(FheError::ScaleMismatch { left: a.scale, right: b.scale });
    }
    Ok(())
}
