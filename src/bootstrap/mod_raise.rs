use crate::ckks::CkksCiphertext;
use crate::error::{FheError, Result};
use crate::ring::rns::basis_extend;

/// Lift a level-0 ciphertext to the top of the chain.
///
/// The centered lift keeps `c0 + c1·s` unchanged as an integer polynomial, so
/// over the big modulus the phase reads `m + e + q_0·I` for a small integer
/// polynomial I. The result is labelled with scale `q_0`, which makes its slots
/// hold `(m + e)/q_0 + I` in the coefficient sense.
pub(crate) fn mod_raise(ct: &CkksCiphertext) -> Result<CkksCiphertext> {
    if ct.level() != 0 {
        return Err(FheError::LevelMismatch { left: ct.level(), right: 0 });
    }
    let chain = &ct.params.chain;
    let bottom = chain.basis(0)?;
    let top = chain.basis(chain.top_level())?;
    let c = ct.c.iter().map(|ci| basis_extend(ci, bottom, top)).collect::<Result<Vec<_>>>()?;
    Ok(CkksCiphertext {
        c,
        scale: chain.prime(0) as f64,
        noise_bits: ct.noise_bits,
        key_id: ct.key_id,
        params: ct.params.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckks::{ckks_decrypt, ckks_encode_real, ckks_encrypt_sk_with_rng};
    use crate::keys::gen_secret_key_with_rng;
    use crate::params::presets::ckks_bootstrap_test;
    use num_bigint::BigInt;
    use num_traits::{Signed, ToPrimitive};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_raised_phase_is_message_plus_q0_multiple() {
        let params = ckks_bootstrap_test().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
        let pt = ckks_encode_real(&[0.5, -0.25, 0.125], params.scale, 0, &params).unwrap();
        let ct = ckks_encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();

        let raised = mod_raise(&ct).unwrap();
        assert_eq!(raised.level(), params.physical_top());

        let chain = &params.chain;
        let low = chain.basis(0).unwrap().reconstruct_centered(&ckks_decrypt(&ct, &sk).unwrap().poly).unwrap();
        let high = chain.basis(chain.top_level()).unwrap()
            .reconstruct_centered(&ckks_decrypt(&raised, &sk).unwrap().poly)
            .unwrap();
        let q0 = BigInt::from(chain.prime(0));
        let bound = BigInt::from(5);
        for (h, l) in high.iter().zip(&low) {
            let diff = h - l;
            assert!((&diff % &q0).to_i64() == Some(0));
            assert!((diff / &q0).abs() <= bound);
        }
    }
}
