use rand::Rng;

/// Discrete Gaussian over Z centered at 0, truncated at ±6σ.
///
/// Uses a cumulative distribution table built once per sampler, with a
/// branchless scan so the selected value does not leak through timing.
#[derive(Clone, Debug)]
pub struct GaussianSampler {
    sigma: f64,
    tail: i64,
    cdf: Vec<f64>,
}

impl GaussianSampler {
    pub fn new(sigma: f64) -> Self {
        let tail = (6.0 * sigma).ceil() as i64;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let mut cumulative = 0.0f64;
        let mut cdf = Vec::with_capacity((2 * tail + 1) as usize);
        for x in -tail..=tail {
            cumulative += (-((x * x) as f64) / two_sigma_sq).exp();
            cdf.push(cumulative);
        }
        Self { sigma, tail, cdf }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Largest magnitude a sample can take.
    pub fn tail(&self) -> i64 {
        self.tail
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> i64 {
        let total = self.cdf.last().copied().unwrap_or(1.0);
        let u: f64 = rng.random::<f64>() * total;

        // Walk the whole table, keeping the lowest index with u < cdf[i].
        let mut result = self.tail;
        for (i, &c) in self.cdf.iter().enumerate().rev() {
            let mask = ((u < c) as i64).wrapping_neg();
            let candidate = -self.tail + i as i64;
            result = (candidate & mask) | (result & !mask);
        }
        result
    }

    pub fn sample_vec<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<i64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

/// `n` independent discrete Gaussian samples with standard deviation `sigma`.
pub fn sample_gaussian<R: Rng>(n: usize, sigma: f64, rng: &mut R) -> Vec<i64> {
    GaussianSampler::new(sigma).sample_vec(n, rng)
}
