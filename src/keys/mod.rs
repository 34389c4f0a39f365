//! Key material shared by BFV and CKKS.
//!
//! All keys live over the extended top basis `q_0 .. q_top, P` (public keys
//! over `q_0 .. q_top`) and are restricted to lower levels on use.

pub mod keygen;
pub mod keyswitch;

pub use keygen::{
    gen_conjugation_key, gen_conjugation_key_with_rng, gen_galois_key, gen_galois_key_with_rng,
    gen_public_key, gen_public_key_with_rng, gen_relin_key, gen_relin_key_with_rng,
    gen_rotation_keys, gen_rotation_keys_with_rng, gen_secret_key, gen_secret_key_with_rng,
};
pub use keyswitch::key_switch;

use std::collections::BTreeMap;
use std::sync::Arc;
use zeroize::Zeroize;

use crate::error::{FheError, Result};
use crate::params::{BfvParams, CkksParams, ModulusChain, SecretDistribution};
use crate::ring::rns::RnsPoly;

/// What key generation needs from a scheme context.
pub trait KeyContext {
    fn chain(&self) -> &Arc<ModulusChain>;
    fn sigma(&self) -> f64;
    fn secret_distribution(&self) -> SecretDistribution;
}

impl KeyContext for BfvParams {
    fn chain(&self) -> &Arc<ModulusChain> {
        &self.chain
    }
    fn sigma(&self) -> f64 {
        self.sigma
    }
    fn secret_distribution(&self) -> SecretDistribution {
        self.secret_dist
    }
}

impl KeyContext for CkksParams {
    fn chain(&self) -> &Arc<ModulusChain> {
        &self.chain
    }
    fn sigma(&self) -> f64 {
        self.sigma
    }
    fn secret_distribution(&self) -> SecretDistribution {
        self.secret_dist
    }
}

impl<T: KeyContext> KeyContext for Arc<T> {
    fn chain(&self) -> &Arc<ModulusChain> {
        self.as_ref().chain()
    }
    fn sigma(&self) -> f64 {
        self.as_ref().sigma()
    }
    fn secret_distribution(&self) -> SecretDistribution {
        self.as_ref().secret_distribution()
    }
}

/// Secret key s with small coefficients. Not `Clone`; wiped on drop.
pub struct SecretKey {
    pub(crate) coeffs: Vec<i64>,
    /// s over `q_0 .. q_top, P` in NTT form.
    pub(crate) poly: RnsPoly,
    pub(crate) key_id: u64,
    pub(crate) chain: Arc<ModulusChain>,
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.coeffs.zeroize();
        for comp in &mut self.poly.components {
            comp.evals.zeroize();
        }
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey").field("key_id", &self.key_id).finish_non_exhaustive()
    }
}

impl SecretKey {
    pub fn key_id(&self) -> u64 {
        self.key_id
    }

    pub fn ring_degree(&self) -> usize {
        self.chain.ring_degree()
    }

    pub(crate) fn chain(&self) -> &Arc<ModulusChain> {
        &self.chain
    }

    /// s reduced modulo `Q_level`.
    pub(crate) fn at_level(&self, level: usize) -> Result<RnsPoly> {
        if level > self.chain.top_level() {
            return Err(FheError::ChainExhausted);
        }
        self.poly.truncate(level + 1)
    }

    pub(crate) fn check_chain(&self, chain: &Arc<ModulusChain>) -> Result<()> {
        if Arc::ptr_eq(&self.chain, chain) {
            Ok(())
        } else {
            Err(FheError::KeyMismatch)
        }
    }
}

/// Encryption of zero under s: `p0 + p1·s ≈ 0` over `q_0 .. q_top`.
#[derive(Clone, Debug)]
pub struct PublicKey {
    pub p0: RnsPoly,
    pub p1: RnsPoly,
    pub(crate) key_id: u64,
    pub(crate) chain: Arc<ModulusChain>,
}

impl PublicKey {
    pub fn key_id(&self) -> u64 {
        self.key_id
    }
}

/// Key-switching key from a source secret s' to s, one pair per chain prime:
/// `b_j + a_j·s ≈ P·g_j·s'` over `q_0 .. q_top, P`, with g_j the CRT idempotent for q_j.
#[derive(Clone, Debug)]
pub struct SwitchingKey {
    pub keys: Vec<(RnsPoly, RnsPoly)>,
    pub(crate) key_id: u64,
    pub(crate) chain: Arc<ModulusChain>,
}

impl SwitchingKey {
    pub fn key_id(&self) -> u64 {
        self.key_id
    }
}

/// Switches s² back to s after a multiplication.
#[derive(Clone, Debug)]
pub struct RelinKey {
    pub key: SwitchingKey,
}

/// Switches σ_g(s) back to s for the automorphism X -> X^g.
#[derive(Clone, Debug)]
pub struct GaloisKey {
    pub element: usize,
    pub key: SwitchingKey,
}

/// Galois keys indexed by their element.
#[derive(Clone, Debug, Default)]
pub struct RotationKeys {
    keys: BTreeMap<usize, GaloisKey>,
}

impl RotationKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: GaloisKey) {
        self.keys.insert(key.element, key);
    }

    pub fn get(&self, element: usize) -> Result<&GaloisKey> {
        self.keys
            .get(&element)
            .ok_or_else(|| FheError::MissingKey(format!("no Galois key for element {element}")))
    }

    pub fn contains(&self, element: usize) -> bool {
        self.keys.contains_key(&element)
    }

    pub fn elements(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Galois element rotating the N/2-slot rows left by `step` (negative = right).
pub fn galois_element(step: i64, ring_degree: usize) -> usize {
    let half = (ring_degree / 2) as i64;
    let two_n = 2 * ring_degree as u64;
    let k = step.rem_euclid(half) as u64;
    crate::ring::modular::mod_pow(5, k, two_n) as usize
}

/// Galois element of complex conjugation (CKKS) / row swap (BFV).
pub fn conjugation_element(ring_degree: usize) -> usize {
    2 * ring_degree - 1
}

/// Fails with `KeyMismatch` unless both sides come from the same secret and context.
pub(crate) fn check_key(
    ct_key_id: u64,
    ct_chain: &Arc<ModulusChain>,
    key_id: u64,
    key_chain: &Arc<ModulusChain>,
) -> Result<()> {
    if ct_key_id != key_id || !Arc::ptr_eq(ct_chain, key_chain) {
        return Err(FheError::KeyMismatch);
    }
    Ok(())
}
