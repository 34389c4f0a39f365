pub mod presets;

use std::sync::Arc;
use num_bigint::BigUint;
use tracing::debug;

use crate::ckks::encoding::SpecialFft;
use crate::error::{FheError, Result};
use crate::ring::modular::Modulus;
use crate::ring::ntt::{NttTable, make_plan};
use crate::ring::primes::{generate_ntt_primes, is_prime};
use crate::ring::rns::RnsBasis;

/// Distribution of secret key coefficients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretDistribution {
    /// Each coefficient uniform in {-1, 0, 1}.
    Ternary,
    /// Exactly `hamming_weight` coefficients are ±1, the rest 0.
    SparseTernary { hamming_weight: usize },
}

/// Descending chain of NTT primes `q_0 .. q_top` plus the special key-switching prime `P`.
///
/// Level `l` means modulus `Q_l = q_0 ... q_l`. Every basis and table a
/// ciphertext or key needs at any level is built once here.
#[derive(Debug)]
pub struct ModulusChain {
    ring_degree: usize,
    primes: Vec<u64>,
    special: Modulus,
    levels: Vec<RnsBasis>,
    extended: Vec<RnsBasis>,
    rescale_inv: Vec<Vec<u64>>,
    special_inv: Vec<u64>,
    special_mod: Vec<u64>,
}

impl ModulusChain {
    pub fn new(primes: Vec<u64>, special: u64, ring_degree: usize) -> Result<Self> {
        if primes.is_empty() {
            return Err(FheError::InvalidParam("modulus chain needs at least one prime".into()));
        }
        for &q in primes.iter().chain(std::iter::once(&special)) {
            if !is_prime(q) || q % (2 * ring_degree as u64) != 1 {
                return Err(FheError::InvalidParam(format!(
                    "{q} is not a prime congruent to 1 mod {}", 2 * ring_degree
                )));
            }
        }

        let plans = primes.iter().map(|&q| make_plan(ring_degree, q)).collect::<Result<Vec<_>>>()?;
        let special_plan = make_plan(ring_degree, special)?;
        let special_mod = Modulus::new(special)?;

        let mut levels = Vec::with_capacity(primes.len());
        let mut extended = Vec::with_capacity(primes.len());
        for l in 0..primes.len() {
            levels.push(RnsBasis::with_plans(primes[..=l].to_vec(), plans[..=l].to_vec(), ring_degree)?);
            let mut moduli = primes[..=l].to_vec();
            moduli.push(special);
            let mut ext_plans = plans[..=l].to_vec();
            ext_plans.push(special_plan.clone());
            extended.push(RnsBasis::with_plans(moduli, ext_plans, ring_degree)?);
        }

        let mods = primes.iter().map(|&q| Modulus::new(q)).collect::<Result<Vec<_>>>()?;
        let rescale_inv = (0..primes.len())
            .map(|l| {
                mods[..l].iter().map(|m| m.inv(m.reduce(primes[l]))).collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        let special_inv = mods.iter().map(|m| m.inv(m.reduce(special))).collect::<Result<Vec<_>>>()?;
        let special_residues = mods.iter().map(|m| m.reduce(special)).collect();

        Ok(Self {
            ring_degree,
            primes,
            special: special_mod,
            levels,
            extended,
            rescale_inv,
            special_inv,
            special_mod: special_residues,
        })
    }

    pub fn ring_degree(&self) -> usize {
        self.ring_degree
    }

    /// Highest level the chain physically supports.
    pub fn top_level(&self) -> usize {
        self.primes.len() - 1
    }

    pub fn primes(&self) -> &[u64] {
        &self.primes
    }

    pub fn prime(&self, i: usize) -> u64 {
        self.primes[i]
    }

    pub fn special_prime(&self) -> u64 {
        self.special.value()
    }

    /// Basis `q_0 .. q_level`.
    pub fn basis(&self, level: usize) -> Result<&RnsBasis> {
        self.levels.get(level).ok_or(FheError::ChainExhausted)
    }

    /// Basis `q_0 .. q_level, P` used during key switching.
    pub fn extended_basis(&self, level: usize) -> Result<&RnsBasis> {
        self.extended.get(level).ok_or(FheError::ChainExhausted)
    }

    /// `q_level^{-1} mod q_i` for `i < level`.
    pub fn rescale_table(&self, level: usize) -> &[u64] {
        &self.rescale_inv[level]
    }

    /// `P^{-1} mod q_i` for every chain prime.
    pub fn special_inv(&self) -> &[u64] {
        &self.special_inv
    }

    /// `P mod q_i` for every chain prime.
    pub fn special_mod_q(&self) -> &[u64] {
        &self.special_mod
    }

    /// log2(Q_level).
    pub fn log_modulus(&self, level: usize) -> f64 {
        self.primes[..=level.min(self.top_level())].iter().map(|&q| (q as f64).log2()).sum()
    }
}

/// Generate distinct NTT primes of the requested sizes, never reusing one in `exclude`.
fn primes_from_bits(bits: &[u32], ring_degree: usize, exclude: &mut Vec<u64>) -> Result<Vec<u64>> {
    let mut out = Vec::with_capacity(bits.len());
    for &b in bits {
        let p = generate_ntt_primes(b, ring_degree, 1, exclude)?[0];
        exclude.push(p);
        out.push(p);
    }
    Ok(out)
}

fn check_ring_degree(n: usize) -> Result<()> {
    if !n.is_power_of_two() || n < 16 {
        return Err(FheError::InvalidParam(format!("ring degree must be a power of two >= 16, got {n}")));
    }
    Ok(())
}

fn check_secret(dist: SecretDistribution, n: usize) -> Result<()> {
    if let SecretDistribution::SparseTernary { hamming_weight } = dist {
        if hamming_weight == 0 || hamming_weight > n {
            return Err(FheError::InvalidParam(format!("hamming weight must be in 1..={n}, got {hamming_weight}")));
        }
    }
    Ok(())
}

/// BFV context: ring, modulus chain, plaintext modulus and every derived table.
#[derive(Debug)]
pub struct BfvParams {
    /// Ring degree n (must be power of 2).
    pub ring_degree: usize,
    /// Plaintext modulus t.
    pub plain_modulus: u64,
    pub chain: Arc<ModulusChain>,
    /// Gaussian noise standard deviation.
    pub sigma: f64,
    pub secret_dist: SecretDistribution,
    /// Auxiliary primes for the exact tensor product, disjoint from the chain.
    pub(crate) aux_basis: RnsBasis,
    /// Δ_l = floor(Q_l / t), as residues mod each q_i of level l.
    pub(crate) delta: Vec<Vec<u64>>,
    /// Present when t is a prime ≡ 1 (mod 2n).
    pub(crate) batch_table: Option<NttTable>,
}

impl BfvParams {
    pub fn top_level(&self) -> usize {
        self.chain.top_level()
    }

    pub fn batching_enabled(&self) -> bool {
        self.batch_table.is_some()
    }

    pub fn slot_count(&self) -> usize {
        self.ring_degree
    }
}

/// Builder for BfvParams.
pub struct BfvParamsBuilder {
    ring_degree: usize,
    plain_modulus: u64,
    moduli: Vec<u64>,
    modulus_bits: Vec<u32>,
    special_modulus: Option<u64>,
    special_bits: u32,
    sigma: f64,
    secret_dist: SecretDistribution,
}

impl Default for BfvParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BfvParamsBuilder {
    pub fn new() -> Self {
        Self {
            ring_degree: 4096,
            plain_modulus: 65537,
            moduli: Vec::new(),
            modulus_bits: vec![54, 54, 54],
            special_modulus: None,
            special_bits: 60,
            sigma: 3.2,
            secret_dist: SecretDistribution::Ternary,
        }
    }

    pub fn ring_degree(mut self, n: usize) -> Self {
        self.ring_degree = n;
        self
    }

    pub fn plain_modulus(mut self, t: u64) -> Self {
        self.plain_modulus = t;
        self
    }

    /// Explicit chain primes `q_0 .. q_L`; overrides `modulus_bits`.
    pub fn moduli(mut self, moduli: Vec<u64>) -> Self {
        self.moduli = moduli;
        self
    }

    /// Generate one prime of each size for the chain.
    pub fn modulus_bits(mut self, bits: Vec<u32>) -> Self {
        self.modulus_bits = bits;
        self
    }

    pub fn special_modulus(mut self, p: u64) -> Self {
        self.special_modulus = Some(p);
        self
    }

    pub fn special_bits(mut self, bits: u32) -> Self {
        self.special_bits = bits;
        self
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn secret_distribution(mut self, dist: SecretDistribution) -> Self {
        self.secret_dist = dist;
        self
    }

    pub fn build(self) -> Result<Arc<BfvParams>> {
        let n = self.ring_degree;
        check_ring_degree(n)?;
        check_secret(self.secret_dist, n)?;
        if self.plain_modulus < 2 {
            return Err(FheError::InvalidParam("plaintext modulus must be >= 2".into()));
        }
        if !(self.sigma > 0.0) {
            return Err(FheError::InvalidParam("sigma must be positive".into()));
        }

        let mut used = self.moduli.clone();
        let primes = if self.moduli.is_empty() {
            primes_from_bits(&self.modulus_bits, n, &mut used)?
        } else {
            self.moduli.clone()
        };
        if primes.is_empty() {
            return Err(FheError::InvalidParam("must specify at least one ciphertext modulus".into()));
        }
        let special = match self.special_modulus {
            Some(p) => p,
            None => primes_from_bits(&[self.special_bits], n, &mut used)?[0],
        };
        used.push(special);
        if primes.iter().any(|&q| q <= self.plain_modulus) {
            return Err(FheError::InvalidParam("every ciphertext prime must exceed the plaintext modulus".into()));
        }

        let chain = Arc::new(ModulusChain::new(primes, special, n)?);

        // The tensor of two centered ciphertexts is bounded by n * Q^2 / 4, so
        // Q * B must exceed n * Q^2 / 2 for the centered lift to be exact.
        let top_bits = chain.log_modulus(chain.top_level());
        let needed_bits = top_bits + (n as f64).log2() + 2.0;
        let aux_count = (needed_bits / 59.0).ceil() as usize;
        let aux = generate_ntt_primes(60, n, aux_count, &used)?;
        let aux_basis = RnsBasis::new(aux, n)?;

        let delta = (0..=chain.top_level())
            .map(|l| {
                let basis = chain.basis(l)?;
                let d: BigUint = basis.product() / self.plain_modulus;
                Ok(basis.moduli.iter()
                    .map(|&q| (&d % q).to_u64_digits().first().copied().unwrap_or(0))
                    .collect())
            })
            .collect::<Result<Vec<Vec<u64>>>>()?;

        let batch_table = if is_prime(self.plain_modulus) && self.plain_modulus % (2 * n as u64) == 1 {
            Some(NttTable::new(n, self.plain_modulus)?)
        } else {
            None
        };

        debug!(
            ring_degree = n,
            plain_modulus = self.plain_modulus,
            levels = chain.top_level() + 1,
            log_q = top_bits,
            batching = batch_table.is_some(),
            "built BFV context"
        );

        Ok(Arc::new(BfvParams {
            ring_degree: n,
            plain_modulus: self.plain_modulus,
            chain,
            sigma: self.sigma,
            secret_dist: self.secret_dist,
            aux_basis,
            delta,
            batch_table,
        }))
    }
}

/// CKKS context.
///
/// The chain holds the user levels `q_0 .. q_L` followed by
/// `bootstrap_levels` extra primes that only the bootstrapping pipeline uses.
/// Fresh encryptions start at level `L = max_level`.
#[derive(Debug)]
pub struct CkksParams {
    pub ring_degree: usize,
    pub chain: Arc<ModulusChain>,
    /// Default encoding scale Δ.
    pub scale: f64,
    /// Top user level L.
    pub max_level: usize,
    pub bootstrap_levels: usize,
    pub sigma: f64,
    pub secret_dist: SecretDistribution,
    /// Assumed bound (in bits) on slot magnitudes, used by the noise budget.
    pub message_bits: u32,
    pub(crate) fft: SpecialFft,
}

impl CkksParams {
    pub fn slot_count(&self) -> usize {
        self.ring_degree / 2
    }

    /// Highest level of the chain, including bootstrap primes.
    pub fn physical_top(&self) -> usize {
        self.chain.top_level()
    }
}

/// Builder for CkksParams.
pub struct CkksParamsBuilder {
    ring_degree: usize,
    scale_bits: u32,
    first_bits: u32,
    level_bits: u32,
    levels: usize,
    bootstrap_levels: usize,
    bootstrap_bits: u32,
    moduli: Vec<u64>,
    special_modulus: Option<u64>,
    special_bits: u32,
    sigma: f64,
    secret_dist: SecretDistribution,
    message_bits: u32,
}

impl Default for CkksParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CkksParamsBuilder {
    pub fn new() -> Self {
        Self {
            ring_degree: 8192,
            scale_bits: 40,
            first_bits: 60,
            level_bits: 40,
            levels: 4,
            bootstrap_levels: 0,
            bootstrap_bits: 60,
            moduli: Vec::new(),
            special_modulus: None,
            special_bits: 61,
            sigma: 3.2,
            secret_dist: SecretDistribution::Ternary,
            message_bits: 4,
        }
    }

    pub fn ring_degree(mut self, n: usize) -> Self {
        self.ring_degree = n;
        self
    }

    /// Default scale Δ = 2^bits.
    pub fn scale_bits(mut self, bits: u32) -> Self {
        self.scale_bits = bits;
        self
    }

    /// Size of the base prime q_0, which bounds the decryptable message.
    pub fn first_modulus_bits(mut self, bits: u32) -> Self {
        self.first_bits = bits;
        self
    }

    /// Size of each rescaling prime q_1 .. q_L (should match the scale).
    pub fn level_bits(mut self, bits: u32) -> Self {
        self.level_bits = bits;
        self
    }

    /// Number of rescaling levels L.
    pub fn levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    /// Extra primes reserved for bootstrapping and their size.
    pub fn bootstrap_levels(mut self, count: usize, bits: u32) -> Self {
        self.bootstrap_levels = count;
        self.bootstrap_bits = bits;
        self
    }

    /// Explicit chain `q_0 .. q_L` followed by the bootstrap primes; overrides the bit sizes.
    pub fn moduli(mut self, moduli: Vec<u64>) -> Self {
        self.moduli = moduli;
        self
    }

    pub fn special_modulus(mut self, p: u64) -> Self {
        self.special_modulus = Some(p);
        self
    }

    pub fn special_bits(mut self, bits: u32) -> Self {
        self.special_bits = bits;
        self
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn secret_distribution(mut self, dist: SecretDistribution) -> Self {
        self.secret_dist = dist;
        self
    }

    pub fn message_bits(mut self, bits: u32) -> Self {
        self.message_bits = bits;
        self
    }

    pub fn build(self) -> Result<Arc<CkksParams>> {
        let n = self.ring_degree;
        check_ring_degree(n)?;
        check_secret(self.secret_dist, n)?;
        if !(self.sigma > 0.0) {
            return Err(FheError::InvalidParam("sigma must be positive".into()));
        }
        if self.scale_bits == 0 || self.scale_bits >= 62 {
            return Err(FheError::InvalidParam(format!("scale must be 2^1 .. 2^61, got 2^{}", self.scale_bits)));
        }

        let mut used = self.moduli.clone();
        let primes = if self.moduli.is_empty() {
            let mut bits = vec![self.first_bits];
            bits.extend(std::iter::repeat(self.level_bits).take(self.levels));
            bits.extend(std::iter::repeat(self.bootstrap_bits).take(self.bootstrap_levels));
            primes_from_bits(&bits, n, &mut used)?
        } else {
            self.moduli.clone()
        };
        if primes.len() <= self.bootstrap_levels {
            return Err(FheError::InvalidParam("chain is shorter than the bootstrap reservation".into()));
        }
        let max_level = primes.len() - 1 - self.bootstrap_levels;
        let special = match self.special_modulus {
            Some(p) => p,
            None => primes_from_bits(&[self.special_bits], n, &mut used)?[0],
        };

        let chain = Arc::new(ModulusChain::new(primes, special, n)?);
        let fft = SpecialFft::new(n);
        let scale = 2f64.powi(self.scale_bits as i32);

        debug!(
            ring_degree = n,
            scale_bits = self.scale_bits,
            max_level,
            bootstrap_levels = self.bootstrap_levels,
            log_q = chain.log_modulus(chain.top_level()),
            "built CKKS context"
        );

        Ok(Arc::new(CkksParams {
            ring_degree: n,
            chain,
            scale,
            max_level,
            bootstrap_levels: self.bootstrap_levels,
            sigma: self.sigma,
            secret_dist: self.secret_dist,
            message_bits: self.message_bits,
            fft,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_tables() {
        let primes = generate_ntt_primes(40, 16, 3, &[]).unwrap();
        let special = generate_ntt_primes(50, 16, 1, &[]).unwrap()[0];
        let chain = ModulusChain::new(primes.clone(), special, 16).unwrap();
        assert_eq!(chain.top_level(), 2);
        assert_eq!(chain.basis(1).unwrap().moduli, primes[..2].to_vec());
        assert_eq!(chain.extended_basis(0).unwrap().moduli, vec![primes[0], special]);
        assert!(matches!(chain.basis(3), Err(FheError::ChainExhausted)));

        let q0 = Modulus::new(primes[0]).unwrap();
        assert_eq!(q0.mul(chain.rescale_table(2)[0], q0.reduce(primes[2])), 1);
        assert_eq!(q0.mul(chain.special_inv()[0], chain.special_mod_q()[0]), 1);
    }

    #[test]
    fn test_chain_rejects_bad_prime() {
        assert!(ModulusChain::new(vec![65537, 65539], 65537 + 32 * 2048, 16).is_err());
    }

    #[test]
    fn test_bfv_builder() {
        let params = BfvParamsBuilder::new()
            .ring_degree(32)
            .plain_modulus(65537)
            .modulus_bits(vec![40, 40])
            .build()
            .unwrap();
        assert_eq!(params.top_level(), 1);
        assert!(params.batching_enabled());
        assert!(params.chain.primes().iter().all(|q| !params.aux_basis.moduli.contains(q)));

        let no_batch = BfvParamsBuilder::new().ring_degree(32).plain_modulus(256).modulus_bits(vec![40]).build().unwrap();
        assert!(!no_batch.batching_enabled());
    }

    #[test]
    fn test_bfv_builder_rejects() {
        assert!(BfvParamsBuilder::new().ring_degree(48).build().is_err());
        assert!(BfvParamsBuilder::new().ring_degree(32).plain_modulus(1).build().is_err());
        assert!(BfvParamsBuilder::new()
            .ring_degree(32)
            .secret_distribution(SecretDistribution::SparseTernary { hamming_weight: 33 })
            .build()
            .is_err());
    }

    #[test]
    fn test_ckks_builder_levels() {
        let params = CkksParamsBuilder::new()
            .ring_degree(32)
            .scale_bits(30)
            .first_modulus_bits(45)
            .level_bits(30)
            .levels(3)
            .bootstrap_levels(2, 45)
            .build()
            .unwrap();
        assert_eq!(params.max_level, 3);
        assert_eq!(params.physical_top(), 5);
        assert_eq!(params.slot_count(), 16);
    }
}
