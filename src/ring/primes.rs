//! NTT-friendly prime search.

use crate::error::{FheError, Result};
use crate::ring::modular::mod_pow;

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn miller_rabin_round(n: u64, s: u32, d: u64, a: u64) -> bool {
    let a = a % n;
    if a == 0 {
        return true;
    }
    let mut x = mod_pow(a, d, n);
    if x == 1 || x == n - 1 {
        return true;
    }
    for _ in 1..s {
        x = mul_mod(x, x, n);
        if x == n - 1 {
            return true;
        }
    }
    false
}

/// Deterministic Miller-Rabin, exact for every n < 2^64.
pub fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }
    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;
    WITNESSES.iter().all(|&a| miller_rabin_round(n, s, d, a))
}

/// Find `count` distinct primes below 2^bits with q ≡ 1 (mod 2n), searching
/// downward from 2^bits and skipping anything in `exclude`.
pub fn generate_ntt_primes(bits: u32, ring_degree: usize, count: usize, exclude: &[u64]) -> Result<Vec<u64>> {
    if !(17..=61).contains(&bits) {
        return Err(FheError::InvalidParam(format!("prime size must be in 17..=61 bits, got {bits}")));
    }
    let two_n = 2 * ring_degree as u64;
    let upper = 1u64 << bits;
    let lower = 1u64 << (bits - 1);
    let mut candidate = (upper - 1) / two_n * two_n + 1;
    let mut primes = Vec::with_capacity(count);

    while primes.len() < count {
        if candidate <= lower {
            return Err(FheError::InvalidParam(format!(
                "not enough {bits}-bit primes congruent to 1 mod {two_n}"
            )));
        }
        if is_prime(candidate) && !exclude.contains(&candidate) {
            primes.push(candidate);
        }
        candidate -= two_n;
    }
    Ok(primes)
}

/// A primitive `order`-th root of unity modulo prime `p`, where order | p - 1
/// and order is a power of two.
pub fn primitive_root_of_unity(order: u64, p: u64) -> Result<u64> {
    if order == 0 || (p - 1) % order != 0 {
        return Err(FheError::InvalidParam(format!("{p} has no root of unity of order {order}")));
    }
    let cofactor = (p - 1) / order;
    for x in 2..p {
        let g = mod_pow(x, cofactor, p);
        if mod_pow(g, order / 2, p) == p - 1 {
            return Ok(g);
        }
    }
    Err(FheError::InvalidParam(format!("no primitive root of order {order} modulo {p}")))
}
