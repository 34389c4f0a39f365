//! Heuristic noise bookkeeping, in bits of absolute error magnitude.
//!
//! A ciphertext at level l decrypts to `Δ·m + e` (BFV) or `scale·m + e` (CKKS);
//! these helpers track an upper estimate of `log2 |e|_∞`.

/// Fresh encryption error `e0 + u·e + e1·s`: each coefficient has variance
/// `σ²(1 + 4N/3)` for ternary `u, s`, taken out to a 6-sigma tail.
pub(crate) fn fresh_bits(sigma: f64, ring_degree: usize) -> f64 {
    (6.0 * sigma * (1.0 + 4.0 * ring_degree as f64 / 3.0).sqrt()).log2()
}

/// log2(2^a + 2^b).
pub(crate) fn add_bits(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (1.0 + (lo - hi).exp2()).log2()
}

/// log2 of the rounding error left by dividing by a prime: `(1 + ‖s‖₁)/2`.
pub(crate) fn rounding_bits(ring_degree: usize) -> f64 {
    (ring_degree as f64 + 1.0).log2()
}

/// Bits a scale must keep above the rescale rounding error.
pub(crate) const SCALE_MARGIN_BITS: f64 = 10.0;

/// Smallest log2 scale a rescaled result may be forced to.
pub(crate) fn min_scale_bits(ring_degree: usize) -> f64 {
    rounding_bits(ring_degree) + SCALE_MARGIN_BITS
}

/// Error after dividing by `q` and rounding.
pub(crate) fn divide_bits(noise_bits: f64, q: u64, ring_degree: usize) -> f64 {
    add_bits(noise_bits - (q as f64).log2(), rounding_bits(ring_degree))
}
