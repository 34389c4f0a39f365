//! One interface over both schemes, for code that is generic in the arithmetic.

use crate::bfv::{self, BfvCiphertext, BfvPlaintext};
use crate::ckks::{self, CkksCiphertext, CkksPlaintext};
use crate::error::Result;
use crate::keys::{PublicKey, RelinKey, RotationKeys, SecretKey};

pub trait HomomorphicScheme {
    type Plaintext;
    type Ciphertext: Clone;

    fn encrypt(pt: &Self::Plaintext, pk: &PublicKey) -> Result<Self::Ciphertext>;
    fn encrypt_symmetric(pt: &Self::Plaintext, sk: &SecretKey) -> Result<Self::Ciphertext>;
    fn decrypt(ct: &Self::Ciphertext, sk: &SecretKey) -> Result<Self::Plaintext>;

    fn add(a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;
    fn sub(a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;
    fn neg(ct: &Self::Ciphertext) -> Self::Ciphertext;
    fn add_plain(ct: &Self::Ciphertext, pt: &Self::Plaintext) -> Result<Self::Ciphertext>;
    fn mul_plain(ct: &Self::Ciphertext, pt: &Self::Plaintext) -> Result<Self::Ciphertext>;
    /// Tensor product; the result has three components.
    fn multiply(a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;
    fn relinearize(ct: &Self::Ciphertext, rk: &RelinKey) -> Result<Self::Ciphertext>;
    /// Rescale (CKKS) or modulus switch (BFV): exactly one level down.
    fn reduce_level(ct: &Self::Ciphertext) -> Result<Self::Ciphertext>;
    fn rotate(ct: &Self::Ciphertext, steps: i64, keys: &RotationKeys) -> Result<Self::Ciphertext>;

    fn level(ct: &Self::Ciphertext) -> usize;
    fn noise_budget(ct: &Self::Ciphertext) -> f64;
    /// Length of the cycle `rotate` acts on.
    fn row_size(ct: &Self::Ciphertext) -> usize;
}

/// Exact arithmetic modulo t.
#[derive(Clone, Copy, Debug)]
pub struct Bfv;

/// Approximate arithmetic on complex slots.
#[derive(Clone, Copy, Debug)]
pub struct Ckks;

impl HomomorphicScheme for Bfv {
    type Plaintext = BfvPlaintext;
    type Ciphertext = BfvCiphertext;

    fn encrypt(pt: &BfvPlaintext, pk: &PublicKey) -> Result<BfvCiphertext> {
        bfv::encrypt_pk(pt, pk)
    }
    fn encrypt_symmetric(pt: &BfvPlaintext, sk: &SecretKey) -> Result<BfvCiphertext> {
        bfv::encrypt_sk(pt, sk)
    }
    fn decrypt(ct: &BfvCiphertext, sk: &SecretKey) -> Result<BfvPlaintext> {
        bfv::decrypt(ct, sk)
    }
    fn add(a: &BfvCiphertext, b: &BfvCiphertext) -> Result<BfvCiphertext> {
        bfv::bfv_add(a, b)
    }
    fn sub(a: &BfvCiphertext, b: &BfvCiphertext) -> Result<BfvCiphertext> {
        bfv::bfv_sub(a, b)
    }
    fn neg(ct: &BfvCiphertext) -> BfvCiphertext {
        bfv::bfv_neg(ct)
    }
    fn add_plain(ct: &BfvCiphertext, pt: &BfvPlaintext) -> Result<BfvCiphertext> {
        bfv::bfv_add_plain(ct, pt)
    }
    fn mul_plain(ct: &BfvCiphertext, pt: &BfvPlaintext) -> Result<BfvCiphertext> {
        bfv::bfv_mul_plain(ct, pt)
    }
    fn multiply(a: &BfvCiphertext, b: &BfvCiphertext) -> Result<BfvCiphertext> {
        bfv::bfv_mul(a, b)
    }
    fn relinearize(ct: &BfvCiphertext, rk: &RelinKey) -> Result<BfvCiphertext> {
        bfv::bfv_relinearize(ct, rk)
    }
    fn reduce_level(ct: &BfvCiphertext) -> Result<BfvCiphertext> {
        bfv::bfv_mod_switch(ct)
    }
    fn rotate(ct: &BfvCiphertext, steps: i64, keys: &RotationKeys) -> Result<BfvCiphertext> {
        bfv::bfv_rotate(ct, steps, keys)
    }
    fn level(ct: &BfvCiphertext) -> usize {
        ct.level()
    }
    fn noise_budget(ct: &BfvCiphertext) -> f64 {
        ct.noise_budget()
    }
    fn row_size(ct: &BfvCiphertext) -> usize {
        ct.params.ring_degree / 2
    }
}

impl HomomorphicScheme for Ckks {
    type Plaintext = CkksPlaintext;
    type Ciphertext = CkksCiphertext;

    fn encrypt(pt: &CkksPlaintext, pk: &PublicKey) -> Result<CkksCiphertext> {
        ckks::ckks_encrypt_pk(pt, pk)
    }
    fn encrypt_symmetric(pt: &CkksPlaintext, sk: &SecretKey) -> Result<CkksCiphertext> {
        ckks::ckks_encrypt_sk(pt, sk)
    }
    fn decrypt(ct: &CkksCiphertext, sk: &SecretKey) -> Result<CkksPlaintext> {
        ckks::ckks_decrypt(ct, sk)
    }
    fn add(a: &CkksCiphertext, b: &CkksCiphertext) -> Result<CkksCiphertext> {
        ckks::ckks_add(a, b)
    }
    fn sub(a: &CkksCiphertext, b: &CkksCiphertext) -> Result<CkksCiphertext> {
        ckks::ckks_sub(a, b)
    }
    fn neg(ct: &CkksCiphertext) -> CkksCiphertext {
        ckks::ckks_neg(ct)
    }
    fn add_plain(ct: &CkksCiphertext, pt: &CkksPlaintext) -> Result<CkksCiphertext> {
        ckks::ckks_add_plain(ct, pt)
    }
    fn mul_plain(ct: &CkksCiphertext, pt: &CkksPlaintext) -> Result<CkksCiphertext> {
        ckks::ckks_mul_plain(ct, pt)
    }
    fn multiply(a: &CkksCiphertext, b: &CkksCiphertext) -> Result<CkksCiphertext> {
        ckks::ckks_mul(a, b)
    }
    fn relinearize(ct: &CkksCiphertext, rk: &RelinKey) -> Result<CkksCiphertext> {
        ckks::ckks_relinearize(ct, rk)
    }
    fn reduce_level(ct: &CkksCiphertext) -> Result<CkksCiphertext> {
        ckks::ckks_rescale(ct)
    }
    fn rotate(ct: &CkksCiphertext, steps: i64, keys: &RotationKeys) -> Result<CkksCiphertext> {
        ckks::ckks_rotate(ct, steps, keys)
    }
    fn level(ct: &CkksCiphertext) -> usize {
        ct.level()
    }
    fn noise_budget(ct: &CkksCiphertext) -> f64 {
        ct.noise_budget()
    }
    fn row_size(ct: &CkksCiphertext) -> usize {
        ct.params.slot_count()
    }
}

/// Rotation steps `sum_slots` needs keys for: 1, 2, 4, ... below `row_size`.
pub fn sum_slots_rotations(row_size: usize) -> Vec<i64> {
    std::iter::successors(Some(1usize), |s| Some(s * 2))
        .take_while(|&s| s < row_size)
        .map(|s| s as i64)
        .collect()
}

/// Every slot of each row becomes the sum of that row (log2 rotations).
pub fn sum_slots<S: HomomorphicScheme>(ct: &S::Ciphertext, keys: &RotationKeys) -> Result<S::Ciphertext> {
    let mut acc = ct.clone();
    for step in sum_slots_rotations(S::row_size(ct)) {
        acc = S::add(&acc, &S::rotate(&acc, step, keys)?)?;
    }
    Ok(acc)
}

/// `a·b + c`, relinearized, with one level spent.
pub fn mul_add<S: HomomorphicScheme>(
    a: &S::Ciphertext,
    b: &S::Ciphertext,
    c: &S::Ciphertext,
    rk: &RelinKey,
) -> Result<S::Ciphertext> {
    let product = S::reduce_level(&S::relinearize(&S::multiply(a, b)?, rk)?)?;
    let c_low = {
        let mut c = c.clone();
        while S::level(&c) > S::level(&product) {
            c = S::reduce_level(&c)?;
        }
        c
    };
    S::add(&product, &c_low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bfv::BatchEncoder;
    use crate::keys::{gen_relin_key_with_rng, gen_rotation_keys_with_rng, gen_secret_key_with_rng};
    use crate::params::presets::{bfv_test, ckks_test};
    use num_complex::Complex64;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_sum_slots_both_schemes() {
        let mut rng = ChaCha20Rng::seed_from_u64(71);

        let params = bfv_test().unwrap();
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let keys = gen_rotation_keys_with_rng(&params, &sk, &sum_slots_rotations(32), &mut rng).unwrap();
        let encoder = BatchEncoder::new(&params).unwrap();
        let values: Vec<u64> = (1..=64).collect();
        let ct = bfv::encrypt_sk_with_rng(&encoder.encode(&values).unwrap(), &sk, &mut rng).unwrap();
        let summed = encoder.decode(&Bfv::decrypt(&sum_slots::<Bfv>(&ct, &keys).unwrap(), &sk).unwrap()).unwrap();
        assert!(summed[..32].iter().all(|&v| v == (1..=32).sum::<u64>()));
        assert!(summed[32..].iter().all(|&v| v == (33..=64).sum::<u64>()));

        let params = ckks_test().unwrap();
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let keys = gen_rotation_keys_with_rng(&params, &sk, &sum_slots_rotations(32), &mut rng).unwrap();
        let values: Vec<Complex64> = (0..32).map(|j| Complex64::new(j as f64 / 32.0, 0.0)).collect();
        let pt = ckks::ckks_encode(&values, params.scale, params.max_level, &params).unwrap();
        let ct = ckks::ckks_encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();
        let summed = ckks::ckks_decode(&Ckks::decrypt(&sum_slots::<Ckks>(&ct, &keys).unwrap(), &sk).unwrap()).unwrap();
        for z in summed {
            assert!((z.re - 15.5).abs() < 1e-4 && z.im.abs() < 1e-4);
        }
    }

    #[test]
    fn test_mul_add_generic() {
        let mut rng = ChaCha20Rng::seed_from_u64(72);
        let params = bfv_test().unwrap();
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let rk = gen_relin_key_with_rng(&params, &sk, &mut rng).unwrap();
        let encrypt = |v: u64, rng: &mut ChaCha20Rng| {
            bfv::encrypt_sk_with_rng(&bfv::encode_scalar(v, &params).unwrap(), &sk, rng).unwrap()
        };
        let (a, b, c) = (encrypt(12, &mut rng), encrypt(34, &mut rng), encrypt(56, &mut rng));
        let out = mul_add::<Bfv>(&a, &b, &c, &rk).unwrap();
        assert_eq!(Bfv::level(&out), params.top_level() - 1);
        assert_eq!(bfv::decode_scalar(&Bfv::decrypt(&out, &sk).unwrap()), 12 * 34 + 56);
    }
}
