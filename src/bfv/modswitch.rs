use crate::bfv::BfvCiphertext;
use crate::error::{FheError, Result};
use crate::noise::{add_bits, divide_bits};

/// Drop the last prime: `c' = round(c / q_l)` over `q_0 .. q_{l-1}`.
///
/// The plaintext survives because Δ_l / q_l ≈ Δ_{l-1}; the noise shrinks by
/// q_l while the budget, relative to the smaller modulus, stays about the same.
pub fn bfv_mod_switch(ct: &BfvCiphertext) -> Result<BfvCiphertext> {
    let level = ct.level();
    if level == 0 {
        return Err(FheError::ChainExhausted);
    }
    let chain = &ct.params.chain;
    let table = chain.rescale_table(level);
    let c = ct.c.iter().map(|ci| ci.divide_round_last(table)).collect::<Result<Vec<_>>>()?;
    let noise_bits = add_bits(
        divide_bits(ct.noise_bits, chain.prime(level), ct.params.ring_degree),
        (ct.params.plain_modulus as f64).log2(),
    );
    Ok(BfvCiphertext {
        c,
        noise_bits,
        key_id: ct.key_id,
        params: ct.params.clone(),
    })
}

/// Switch down until the ciphertext sits at `level`.
pub fn bfv_mod_switch_to(ct: &BfvCiphertext, level: usize) -> Result<BfvCiphertext> {
    if level > ct.level() {
        return Err(FheError::InvalidParam(format!(
            "cannot switch up from level {} to {level}", ct.level()
        )));
    }
    let mut out = ct.clone();
    while out.level() > level {
        out = bfv_mod_switch(&out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bfv::encoding::{decode_scalar, encode_scalar};
    use crate::bfv::encrypt::{decrypt, encrypt_sk_with_rng, noise_budget_exact};
    use crate::keys::gen_secret_key_with_rng;
    use crate::params::presets::bfv_test;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_mod_switch_preserves_plaintext() {
        let params = bfv_test().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let ct = encrypt_sk_with_rng(&encode_scalar(4242, &params).unwrap(), &sk, &mut rng).unwrap();

        let down = bfv_mod_switch(&ct).unwrap();
        assert_eq!(down.level(), ct.level() - 1);
        assert_eq!(decode_scalar(&decrypt(&down, &sk).unwrap()), 4242);

        let bottom = bfv_mod_switch_to(&ct, 0).unwrap();
        assert_eq!(bottom.level(), 0);
        assert_eq!(decode_scalar(&decrypt(&bottom, &sk).unwrap()), 4242);
        assert!(noise_budget_exact(&bottom, &sk).unwrap() > 0.0);
        assert!(matches!(bfv_mod_switch(&bottom), Err(FheError::ChainExhausted)));
        assert!(bfv_mod_switch_to(&bottom, 1).is_err());
    }
}
