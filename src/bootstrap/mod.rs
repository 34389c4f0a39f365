//! CKKS bootstrapping: refresh a level-0 ciphertext back to the top user level.
//!
//! The pipeline is mod-raise, coefficient-to-slot, approximate modular
//! reduction and slot-to-coefficient. It spends the `bootstrap_levels` primes
//! that the context reserves above the user levels.

pub mod eval_mod;
pub mod linear_transform;
pub mod mod_raise;

pub use linear_transform::{baby_steps, bsgs_rotations};

use std::f64::consts::PI;
use std::sync::Arc;
use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info, instrument};

use crate::ckks::eval::{ckks_add, ckks_conjugate, ckks_drop_to_level, ckks_mul_i, ckks_neg, ckks_sub};
use crate::ckks::CkksCiphertext;
use crate::error::{FheError, Result};
use crate::keys::{
    RelinKey, RotationKeys, SecretKey, gen_conjugation_key_with_rng, gen_relin_key_with_rng,
    gen_rotation_keys_with_rng,
};
use crate::noise::{add_bits, fresh_bits};
use crate::params::{CkksParams, SecretDistribution};

use self::eval_mod::{TAYLOR_DEPTH, THETA_BOUND, eval_mod, taylor_error};
use self::linear_transform::apply_matrix;
use self::mod_raise::mod_raise;

/// Levels used besides the squarings: CtS, Taylor, StC.
const FIXED_DEPTH: usize = 1 + TAYLOR_DEPTH + 1;

/// Tunables of the refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct BootstrapConfig {
    /// Double-angle iterations r; `None` derives it from the secret distribution.
    pub squarings: Option<u32>,
    /// Minimum noise budget (bits) the input must still have at level 0.
    pub min_budget_bits: f64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self { squarings: None, min_budget_bits: 4.0 }
    }
}

impl BootstrapConfig {
    /// r such that `2π(K + 1) / 2^r <= 0.25`, where K bounds the integer
    /// overflow `I` of the raised phase: about (h + 1)/2 for Hamming weight h.
    pub fn squarings_for(&self, params: &CkksParams) -> u32 {
        if let Some(r) = self.squarings {
            return r;
        }
        let weight = match params.secret_dist {
            SecretDistribution::SparseTernary { hamming_weight } => hamming_weight as f64,
            SecretDistribution::Ternary => 2.0 * params.ring_degree as f64 / 3.0,
        };
        let k = (weight + 1.0) / 2.0;
        (2.0 * PI * (k + 1.0) / THETA_BOUND).log2().ceil().max(0.0) as u32
    }

    /// Bootstrap levels the pipeline consumes.
    pub fn depth(&self, params: &CkksParams) -> usize {
        FIXED_DEPTH + self.squarings_for(params) as usize
    }
}

/// Evaluation keys the refresh needs.
#[derive(Clone, Debug)]
pub struct BootstrapKeys {
    pub relin: RelinKey,
    /// BSGS rotations plus conjugation.
    pub rotations: RotationKeys,
}

pub fn gen_bootstrap_keys(params: &Arc<CkksParams>, sk: &SecretKey) -> Result<BootstrapKeys> {
    let mut rng = ChaCha20Rng::from_os_rng();
    gen_bootstrap_keys_with_rng(params, sk, &mut rng)
}

#[instrument(level = "debug", skip_all, fields(key_id = sk.key_id()))]
pub fn gen_bootstrap_keys_with_rng<R: Rng>(
    params: &Arc<CkksParams>,
    sk: &SecretKey,
    rng: &mut R,
) -> Result<BootstrapKeys> {
    let relin = gen_relin_key_with_rng(params, sk, rng)?;
    let mut rotations = gen_rotation_keys_with_rng(params, sk, &bsgs_rotations(params.slot_count()), rng)?;
    rotations.insert(gen_conjugation_key_with_rng(params, sk, rng)?);
    debug!(rotation_keys = rotations.len(), "generated bootstrap keys");
    Ok(BootstrapKeys { relin, rotations })
}

/// Refresh `ct` to level `max_level`, keeping its scale.
///
/// Ciphertexts above level 0 are first dropped to level 0. Fails with
/// `ChainExhausted` when the reserved bootstrap primes cannot cover the
/// pipeline depth, and with `NoiseBudgetExhausted` when the input is already
/// too noisy to be worth refreshing.
#[instrument(level = "info", skip_all, fields(level = ct.level(), slots = ct.params.slot_count()))]
pub fn bootstrap(ct: &CkksCiphertext, keys: &BootstrapKeys, config: &BootstrapConfig) -> Result<CkksCiphertext> {
    let params = &ct.params;
    if ct.degree() != 1 {
        return Err(FheError::InvalidParam("relinearize before bootstrapping".into()));
    }
    let squarings = config.squarings_for(params);
    let depth = config.depth(params);
    if params.bootstrap_levels < depth {
        return Err(FheError::ChainExhausted);
    }

    let bottom = ckks_drop_to_level(ct, 0)?;
    let budget = bottom.noise_budget();
    if budget < config.min_budget_bits {
        return Err(FheError::NoiseBudgetExhausted { budget_bits: budget });
    }

    let fft = &params.fft;
    let two_n = 2 * params.ring_degree;
    let q0 = params.chain.prime(0) as f64;
    let raised = mod_raise(&bottom)?;

    // Coefficient to slot: y = c·A^H z, then the real and imaginary
    // coefficient halves are y + conj(y) and -i(y - conj(y)).
    let c = 2.0 * PI / (2f64.powi(squarings as i32) * params.ring_degree as f64);
    let to_slots = |row: usize, col: usize| {
        let e = fft.rotation_group()[col] * row % two_n;
        fft.root(two_n - e) * c
    };
    let y = apply_matrix(&raised, to_slots, q0, &keys.rotations)?;
    let y_conj = ckks_conjugate(&y, &keys.rotations)?;
    let theta_lo = ckks_add(&y, &y_conj)?;
    let theta_hi = ckks_neg(&ckks_mul_i(&ckks_sub(&y, &y_conj)?)?);
    debug!(level = y.level(), squarings, "coefficients in slots");

    let (s_lo, s_hi) = rayon::join(
        || eval_mod(&theta_lo, squarings, q0, &keys.relin, &keys.rotations),
        || eval_mod(&theta_hi, squarings, q0, &keys.relin, &keys.rotations),
    );
    let v = ckks_add(&s_lo?, &ckks_mul_i(&s_hi?)?)?;
    debug!(level = v.level(), "modular reduction done");

    // Slot to coefficient with the 1/(4πi) of the sine folded into A.
    let factor = Complex64::new(0.0, -1.0 / (4.0 * PI));
    let to_coeffs = |row: usize, col: usize| fft.root(fft.rotation_group()[row] * col) * factor;
    let mut out = apply_matrix(&v, to_coeffs, q0, &keys.rotations)?;
    out.scale = ct.scale;
    let mut out = ckks_drop_to_level(&out, params.max_level)?;

    out.noise_bits = refreshed_noise_bits(params, squarings);
    info!(level = out.level(), budget = out.noise_budget(), "bootstrapped");
    Ok(out)
}

/// Error left by the refresh: the Taylor error blown up by the squarings and
/// mapped back to coefficients, plus a fresh-encryption sized term.
fn refreshed_noise_bits(params: &CkksParams, squarings: u32) -> f64 {
    let q0 = params.chain.prime(0) as f64;
    let fresh = fresh_bits(params.sigma, params.ring_degree);
    let approx = (q0 * 2f64.powi(squarings as i32) * taylor_error() / (4.0 * PI)).log2();
    add_bits(approx, fresh + (params.ring_degree as f64).log2()).max(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckks::eval::ckks_mul_relin_rescale;
    use crate::ckks::{ckks_decode, ckks_decrypt, ckks_encode, ckks_encrypt_sk_with_rng};
    use crate::keys::gen_secret_key_with_rng;
    use crate::params::presets::{ckks_bootstrap_test, ckks_test};

    #[test]
    fn test_default_squarings() {
        let params = ckks_bootstrap_test().unwrap();
        let config = BootstrapConfig::default();
        assert_eq!(config.squarings_for(&params), 8);
        assert_eq!(config.depth(&params), 14);
        let fixed = BootstrapConfig { squarings: Some(3), ..config };
        assert_eq!(fixed.depth(&params), 9);
    }

    #[test]
    fn test_bootstrap_refreshes_level() {
        let params = ckks_bootstrap_test().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(61);
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let keys = gen_bootstrap_keys_with_rng(&params, &sk, &mut rng).unwrap();

        let n = params.slot_count();
        let values: Vec<Complex64> =
            (0..n).map(|j| Complex64::new((j as f64 * 0.4).sin(), (j as f64 * 0.3).cos() / 2.0)).collect();
        let pt = ckks_encode(&values, params.scale, params.max_level, &params).unwrap();
        let fresh = ckks_encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();

        // use up the user levels
        let mut ct = fresh.clone();
        let mut want = values.clone();
        while ct.level() > 0 {
            ct = ckks_mul_relin_rescale(&ct, &ct, &keys.relin).unwrap();
            want = want.iter().map(|z| z * z).collect();
        }

        let refreshed = bootstrap(&ct, &keys, &BootstrapConfig::default()).unwrap();
        assert_eq!(refreshed.level(), params.max_level);
        assert_eq!(refreshed.scale, ct.scale);
        assert!((refreshed.noise_budget() - fresh.noise_budget()).abs() < 1.0);

        let got = ckks_decode(&ckks_decrypt(&refreshed, &sk).unwrap()).unwrap();
        for (j, (g, w)) in got.iter().zip(&want).enumerate() {
            assert!((g - w).norm() < 1e-3, "slot {j}: {g} vs {w}");
        }

        // and the result keeps computing
        let squared = ckks_mul_relin_rescale(&refreshed, &refreshed, &keys.relin).unwrap();
        let got = ckks_decode(&ckks_decrypt(&squared, &sk).unwrap()).unwrap();
        for (g, w) in got.iter().zip(&want) {
            assert!((g - w * w).norm() < 1e-2);
        }
    }

    #[test]
    fn test_bootstrap_needs_reserved_levels() {
        let params = ckks_test().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(62);
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let keys = gen_bootstrap_keys_with_rng(&params, &sk, &mut rng).unwrap();
        let pt = ckks_encode(&[Complex64::new(0.5, 0.0)], params.scale, 0, &params).unwrap();
        let ct = ckks_encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();
        assert!(matches!(bootstrap(&ct, &keys, &BootstrapConfig::default()), Err(FheError::ChainExhausted)));
    }

    #[test]
    fn test_bootstrap_rejects_noisy_input() {
        let params = ckks_bootstrap_test().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(63);
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let keys = gen_bootstrap_keys_with_rng(&params, &sk, &mut rng).unwrap();
        let pt = ckks_encode(&[Complex64::new(0.5, 0.0)], params.scale, 0, &params).unwrap();
        let mut ct = ckks_encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();
        ct.noise_bits = 43.0;
        assert!(matches!(
            bootstrap(&ct, &keys, &BootstrapConfig::default()),
            Err(FheError::NoiseBudgetExhausted { .. })
        ));
    }
}
