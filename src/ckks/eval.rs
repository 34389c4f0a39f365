use num_complex::Complex64;
use tracing::trace;

use crate::ckks::encoding::ckks_encode_const;
use crate::ckks::{CkksCiphertext, CkksPlaintext, check_context, check_pair, check_scale_floor, scales_match};
use crate::error::{FheError, Result};
use crate::keys::keyswitch::key_switch_noise_bits;
use crate::keys::{RelinKey, RotationKeys, check_key, conjugation_element, galois_element, key_switch};
use crate::noise::{add_bits, divide_bits};
use crate::ring::rns::RnsPoly;

/// Error of a product whose operands carry scales `s1, s2` and errors `e1, e2` (bits).
fn product_noise(ct: &CkksCiphertext, s2: f64, e2: f64) -> f64 {
    let mb = ct.params.message_bits as f64;
    let half_log_n = 0.5 * (ct.params.ring_degree as f64).log2();
    let cross = add_bits(ct.scale.log2() + mb + e2, s2.log2() + mb + ct.noise_bits);
    half_log_n + add_bits(cross, ct.noise_bits + e2)
}

fn check_plain(ct: &CkksCiphertext, pt: &CkksPlaintext) -> Result<()> {
    check_context(&ct.params, &pt.params)?;
    if ct.level() != pt.level() {
        return Err(FheError::LevelMismatch { left: ct.level(), right: pt.level() });
    }
    Ok(())
}

fn combine(
    a: &CkksCiphertext,
    b: &CkksCiphertext,
    f: impl Fn(&RnsPoly, &RnsPoly) -> Result<RnsPoly>,
    lone_right: impl Fn(&RnsPoly) -> RnsPoly,
) -> Result<CkksCiphertext> {
    check_pair(a, b)?;
    let len = a.c.len().max(b.c.len());
    let c = (0..len)
        .map(|i| match (a.c.get(i), b.c.get(i)) {
            (Some(x), Some(y)) => f(x, y),
            (Some(x), None) => Ok(x.clone()),
            (None, Some(y)) => Ok(lone_right(y)),
            (None, None) => Err(FheError::ModulusMismatch),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CkksCiphertext {
        c,
        scale: a.scale,
        noise_bits: add_bits(a.noise_bits, b.noise_bits),
        key_id: a.key_id,
        params: a.params.clone(),
    })
}

pub fn ckks_add(a: &CkksCiphertext, b: &CkksCiphertext) -> Result<CkksCiphertext> {
    combine(a, b, RnsPoly::add, RnsPoly::clone)
}

pub fn ckks_sub(a: &CkksCiphertext, b: &CkksCiphertext) -> Result<CkksCiphertext> {
    combine(a, b, RnsPoly::sub, RnsPoly::neg)
}

pub fn ckks_neg(ct: &CkksCiphertext) -> CkksCiphertext {
    CkksCiphertext {
        c: ct.c.iter().map(RnsPoly::neg).collect(),
        ..ct.clone()
    }
}

pub fn ckks_add_plain(ct: &CkksCiphertext, pt: &CkksPlaintext) -> Result<CkksCiphertext> {
    check_plain(ct, pt)?;
    if !scales_match(ct.scale, pt.scale) {
        return Err(FheError::ScaleMismatch { left: ct.scale, right: pt.scale });
    }
    let mut out = ct.clone();
    out.c[0] = out.c[0].add(&pt.poly)?;
    out.noise_bits = add_bits(ct.noise_bits, 0.0);
    Ok(out)
}

pub fn ckks_sub_plain(ct: &CkksCiphertext, pt: &CkksPlaintext) -> Result<CkksCiphertext> {
    check_plain(ct, pt)?;
    if !scales_match(ct.scale, pt.scale) {
        return Err(FheError::ScaleMismatch { left: ct.scale, right: pt.scale });
    }
    let mut out = ct.clone();
    out.c[0] = out.c[0].sub(&pt.poly)?;
    out.noise_bits = add_bits(ct.noise_bits, 0.0);
    Ok(out)
}

/// Slot-wise product with a plaintext; the scales multiply.
pub fn ckks_mul_plain(ct: &CkksCiphertext, pt: &CkksPlaintext) -> Result<CkksCiphertext> {
    check_plain(ct, pt)?;
    let c = ct.c.iter().map(|ci| ci.mul(&pt.poly)).collect::<Result<Vec<_>>>()?;
    Ok(CkksCiphertext {
        c,
        scale: ct.scale * pt.scale,
        noise_bits: product_noise(ct, pt.scale, -1.0),
        key_id: ct.key_id,
        params: ct.params.clone(),
    })
}

/// Tensor product of two degree-1 ciphertexts at the same level and scale.
pub fn ckks_mul(a: &CkksCiphertext, b: &CkksCiphertext) -> Result<CkksCiphertext> {
    check_pair(a, b)?;
    if a.degree() != 1 || b.degree() != 1 {
        return Err(FheError::InvalidParam(
            "multiplication expects degree-1 ciphertexts, relinearize first".into()
        ));
    }
    let d0 = a.c[0].mul(&b.c[0])?;
    let mut d1 = a.c[0].mul(&b.c[1])?;
    d1.mul_add_assign(&a.c[1], &b.c[0])?;
    let d2 = a.c[1].mul(&b.c[1])?;
    Ok(CkksCiphertext {
        c: vec![d0, d1, d2],
        scale: a.scale * b.scale,
        noise_bits: product_noise(a, b.scale, b.noise_bits),
        key_id: a.key_id,
        params: a.params.clone(),
    })
}

pub fn ckks_relinearize(ct: &CkksCiphertext, rk: &RelinKey) -> Result<CkksCiphertext> {
    match ct.degree() {
        1 => return Ok(ct.clone()),
        2 => {}
        d => return Err(FheError::InvalidParam(format!("cannot relinearize a degree-{d} ciphertext"))),
    }
    let params = &ct.params;
    check_key(ct.key_id, &params.chain, rk.key.key_id, &rk.key.chain)?;
    let (k0, k1) = key_switch(&ct.c[2], &rk.key, &params.chain)?;
    Ok(CkksCiphertext {
        c: vec![ct.c[0].add(&k0)?, ct.c[1].add(&k1)?],
        scale: ct.scale,
        noise_bits: add_bits(ct.noise_bits, key_switch_noise_bits(&params.chain, ct.level(), params.sigma)),
        key_id: ct.key_id,
        params: params.clone(),
    })
}

/// Divide by `q_level` and drop it; the scale shrinks by the same prime.
pub fn ckks_rescale(ct: &CkksCiphertext) -> Result<CkksCiphertext> {
    let level = ct.level();
    if level == 0 {
        return Err(FheError::ChainExhausted);
    }
    let chain = &ct.params.chain;
    let q = chain.prime(level);
    let table = chain.rescale_table(level);
    let c = ct.c.iter().map(|ci| ci.divide_round_last(table)).collect::<Result<Vec<_>>>()?;
    trace!(from = level, scale = ct.scale / q as f64, "rescaled");
    Ok(CkksCiphertext {
        c,
        scale: ct.scale / q as f64,
        noise_bits: divide_bits(ct.noise_bits, q, ct.params.ring_degree),
        key_id: ct.key_id,
        params: ct.params.clone(),
    })
}

pub fn ckks_mul_relin_rescale(a: &CkksCiphertext, b: &CkksCiphertext, rk: &RelinKey) -> Result<CkksCiphertext> {
    ckks_rescale(&ckks_relinearize(&ckks_mul(a, b)?, rk)?)
}

fn apply_galois(ct: &CkksCiphertext, element: usize, keys: &RotationKeys) -> Result<CkksCiphertext> {
    if ct.degree() != 1 {
        return Err(FheError::InvalidParam("relinearize before applying an automorphism".into()));
    }
    let key = keys.get(element)?;
    let params = &ct.params;
    check_key(ct.key_id, &params.chain, key.key.key_id, &key.key.chain)?;
    let c0 = ct.c[0].automorphism(element)?;
    let c1 = ct.c[1].automorphism(element)?;
    let (k0, k1) = key_switch(&c1, &key.key, &params.chain)?;
    Ok(CkksCiphertext {
        c: vec![c0.add(&k0)?, k1],
        scale: ct.scale,
        noise_bits: add_bits(ct.noise_bits, key_switch_noise_bits(&params.chain, ct.level(), params.sigma)),
        key_id: ct.key_id,
        params: params.clone(),
    })
}

/// Rotate the N/2 slots left by `steps` (right when negative).
pub fn ckks_rotate(ct: &CkksCiphertext, steps: i64, keys: &RotationKeys) -> Result<CkksCiphertext> {
    let element = galois_element(steps, ct.params.ring_degree);
    if element == 1 {
        return Ok(ct.clone());
    }
    apply_galois(ct, element, keys)
}

/// Complex-conjugate every slot.
pub fn ckks_conjugate(ct: &CkksCiphertext, keys: &RotationKeys) -> Result<CkksCiphertext> {
    apply_galois(ct, conjugation_element(ct.params.ring_degree), keys)
}

/// Multiply every slot by i. Free: it is the monomial X^(N/2).
pub fn ckks_mul_i(ct: &CkksCiphertext) -> Result<CkksCiphertext> {
    let half = ct.params.ring_degree / 2;
    let c = ct.c.iter().map(|ci| ci.monomial_mul(half)).collect::<Result<Vec<_>>>()?;
    Ok(CkksCiphertext { c, ..ct.clone() })
}

/// Add a complex constant to every slot.
pub fn ckks_add_const(ct: &CkksCiphertext, value: Complex64) -> Result<CkksCiphertext> {
    let pt = ckks_encode_const(value, ct.scale, ct.level(), &ct.params)?;
    ckks_add_plain(ct, &pt)
}

/// Multiply by a constant encoded at scale `target·q_l/scale`, then rescale,
/// so the result sits one level down at exactly `target`.
///
/// Both `target` and the constant's scale must clear `log2(N+1) + 10` bits,
/// otherwise the rescale rounding swamps the value and `InvalidParam` is returned.
pub fn ckks_mul_const_to_scale(ct: &CkksCiphertext, value: Complex64, target: f64) -> Result<CkksCiphertext> {
    let level = ct.level();
    if level == 0 {
        return Err(FheError::ChainExhausted);
    }
    check_scale_floor(target, &ct.params)?;
    let q = ct.params.chain.prime(level) as f64;
    let const_scale = target * q / ct.scale;
    check_scale_floor(const_scale, &ct.params)?;
    let pt = ckks_encode_const(value, const_scale, level, &ct.params)?;
    let c = ct.c.iter().map(|ci| ci.mul(&pt.poly)).collect::<Result<Vec<_>>>()?;
    let mb = ct.params.message_bits as f64;
    let product = CkksCiphertext {
        c,
        scale: ct.scale * const_scale,
        noise_bits: add_bits(ct.noise_bits + const_scale.log2() + value.norm().max(1.0).log2(), ct.scale.log2() + mb),
        key_id: ct.key_id,
        params: ct.params.clone(),
    };
    let mut out = ckks_rescale(&product)?;
    out.scale = target;
    Ok(out)
}

/// Multiply by a constant at the cost of one level, keeping the scale.
pub fn ckks_mul_const(ct: &CkksCiphertext, value: Complex64) -> Result<CkksCiphertext> {
    ckks_mul_const_to_scale(ct, value, ct.scale)
}

/// Drop primes down to `level` without dividing: message and scale are unchanged.
pub fn ckks_drop_to_level(ct: &CkksCiphertext, level: usize) -> Result<CkksCiphertext> {
    if level > ct.level() {
        return Err(FheError::InvalidParam(format!("cannot raise level {} to {level}", ct.level())));
    }
    let c = ct.c.iter().map(|ci| ci.truncate(level + 1)).collect::<Result<Vec<_>>>()?;
    Ok(CkksCiphertext { c, ..ct.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::ckks::encoding::{ckks_decode, ckks_encode};
    use crate::ckks::encrypt::{ckks_decrypt, ckks_encrypt_sk_with_rng};
    use crate::keys::{
        SecretKey, gen_conjugation_key_with_rng, gen_relin_key_with_rng, gen_rotation_keys_with_rng,
        gen_secret_key_with_rng,
    };
    use crate::params::CkksParams;
    use crate::params::presets::ckks_test;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct Fixture {
        params: Arc<CkksParams>,
        sk: SecretKey,
        rng: ChaCha20Rng,
    }

    fn fixture(seed: u64) -> Fixture {
        let params = ckks_test().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        Fixture { params, sk, rng }
    }

    impl Fixture {
        fn encrypt(&mut self, values: &[Complex64]) -> CkksCiphertext {
            let pt = ckks_encode(values, self.params.scale, self.params.max_level, &self.params).unwrap();
            ckks_encrypt_sk_with_rng(&pt, &self.sk, &mut self.rng).unwrap()
        }

        fn decrypt(&self, ct: &CkksCiphertext) -> Vec<Complex64> {
            ckks_decode(&ckks_decrypt(ct, &self.sk).unwrap()).unwrap()
        }
    }

    fn vector(seed: f64) -> Vec<Complex64> {
        (0..32).map(|i| Complex64::new((i as f64 * 0.37 + seed).sin(), (i as f64 * 0.11 - seed).cos() * 0.5)).collect()
    }

    fn assert_close(got: &[Complex64], want: &[Complex64], tol: f64) {
        for (j, (g, w)) in got.iter().zip(want).enumerate() {
            assert!((g - w).norm() < tol, "slot {j}: {g} vs {w}");
        }
    }

    #[test]
    fn test_add_sub_neg() {
        let mut f = fixture(1);
        let (a, b) = (vector(0.1), vector(0.9));
        let (ca, cb) = (f.encrypt(&a), f.encrypt(&b));
        let sum: Vec<Complex64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        let diff: Vec<Complex64> = a.iter().zip(&b).map(|(x, y)| x - y).collect();
        let neg: Vec<Complex64> = a.iter().map(|x| -x).collect();
        assert_close(&f.decrypt(&ckks_add(&ca, &cb).unwrap()), &sum, 1e-5);
        assert_close(&f.decrypt(&ckks_sub(&ca, &cb).unwrap()), &diff, 1e-5);
        assert_close(&f.decrypt(&ckks_neg(&ca)), &neg, 1e-5);
    }

    #[test]
    fn test_mul_rescale_chain() {
        let mut f = fixture(2);
        let rk = gen_relin_key_with_rng(&f.params, &f.sk, &mut f.rng).unwrap();
        let a = vector(0.3);
        let mut ct = f.encrypt(&a);
        let mut want = a.clone();
        let start = ct.level();
        for step in 1..=f.params.max_level {
            ct = ckks_mul_relin_rescale(&ct, &ct, &rk).unwrap();
            want = want.iter().map(|x| x * x).collect();
            assert_eq!(ct.level(), start - step);
            assert_close(&f.decrypt(&ct), &want, 1e-3);
        }
        assert!(matches!(ckks_rescale(&ct), Err(FheError::ChainExhausted)));
    }

    #[test]
    fn test_plain_and_const_ops() {
        let mut f = fixture(3);
        let (a, b) = (vector(0.5), vector(1.5));
        let ca = f.encrypt(&a);
        let pb = ckks_encode(&b, f.params.scale, ca.level(), &f.params).unwrap();

        let prod: Vec<Complex64> = a.iter().zip(&b).map(|(x, y)| x * y).collect();
        let got = f.decrypt(&ckks_rescale(&ckks_mul_plain(&ca, &pb).unwrap()).unwrap());
        assert_close(&got, &prod, 1e-4);

        let sum: Vec<Complex64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        assert_close(&f.decrypt(&ckks_add_plain(&ca, &pb).unwrap()), &sum, 1e-5);

        let c = Complex64::new(0.5, -1.25);
        let scaled: Vec<Complex64> = a.iter().map(|x| x * c).collect();
        let ct = ckks_mul_const(&ca, c).unwrap();
        assert_eq!(ct.level(), ca.level() - 1);
        assert_eq!(ct.scale, ca.scale);
        assert_close(&f.decrypt(&ct), &scaled, 1e-4);

        let shifted: Vec<Complex64> = a.iter().map(|x| x + c).collect();
        assert_close(&f.decrypt(&ckks_add_const(&ca, c).unwrap()), &shifted, 1e-5);

        let times_i: Vec<Complex64> = a.iter().map(|x| x * Complex64::i()).collect();
        assert_close(&f.decrypt(&ckks_mul_i(&ca).unwrap()), &times_i, 1e-5);
    }

    #[test]
    fn test_rotate_and_conjugate() {
        let mut f = fixture(4);
        let mut keys = gen_rotation_keys_with_rng(&f.params, &f.sk, &[1, 5, -2], &mut f.rng).unwrap();
        keys.insert(gen_conjugation_key_with_rng(&f.params, &f.sk, &mut f.rng).unwrap());
        let a = vector(0.7);
        let ca = f.encrypt(&a);
        for step in [1i64, 5, -2] {
            let got = f.decrypt(&ckks_rotate(&ca, step, &keys).unwrap());
            let want: Vec<Complex64> = (0..32).map(|j| a[(j as i64 + step).rem_euclid(32) as usize]).collect();
            assert_close(&got, &want, 1e-5);
        }
        let conj: Vec<Complex64> = a.iter().map(|x| x.conj()).collect();
        assert_close(&f.decrypt(&ckks_conjugate(&ca, &keys).unwrap()), &conj, 1e-5);
    }

    #[test]
    fn test_level_and_scale_mismatch() {
        let mut f = fixture(5);
        let ca = f.encrypt(&vector(0.2));
        let cb = f.encrypt(&vector(0.4));
        let low = ckks_drop_to_level(&cb, 1).unwrap();
        assert_close(&f.decrypt(&low), &vector(0.4), 1e-5);
        assert!(matches!(ckks_add(&ca, &low), Err(FheError::LevelMismatch { .. })));
        assert!(matches!(ckks_mul(&ca, &low), Err(FheError::LevelMismatch { .. })));
        assert!(matches!(ckks_mul(&low, &ca), Err(FheError::LevelMismatch { .. })));

        let mut rescaled = cb.clone();
        rescaled.scale *= 2.0;
        assert!(matches!(ckks_mul(&ca, &rescaled), Err(FheError::ScaleMismatch { .. })));
        assert!(ckks_drop_to_level(&low, 2).is_err());
    }

    #[test]
    fn test_const_to_scale_needs_room_above_rounding() {
        let mut f = fixture(6);
        let a = vec![Complex64::new(0.5, 0.0); 32];
        let ca = f.encrypt(&a);
        let c = Complex64::new(0.3, 0.0);

        let out = ckks_mul_const_to_scale(&ca, c, 2f64.powi(30)).unwrap();
        assert_eq!(out.scale, 2f64.powi(30));
        assert_close(&f.decrypt(&out), &vec![Complex64::new(0.15, 0.0); 32], 1e-4);

        for bits in [4, 10] {
            let target = 2f64.powi(bits);
            assert!(matches!(ckks_mul_const_to_scale(&ca, c, target), Err(FheError::InvalidParam(_))));
        }
        assert!(matches!(ckks_mul_const_to_scale(&ca, c, f64::NAN), Err(FheError::InvalidParam(_))));
    }
}
