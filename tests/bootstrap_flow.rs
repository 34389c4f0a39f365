use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing_subscriber::EnvFilter;

use ringfhe::bootstrap::{BootstrapConfig, bootstrap, gen_bootstrap_keys_with_rng};
use ringfhe::ckks::{CkksCiphertext, ckks_decode_real, ckks_encode_real, ckks_encrypt_pk_with_rng};
use ringfhe::keys::{gen_public_key_with_rng, gen_secret_key_with_rng};
use ringfhe::params::presets::ckks_bootstrap_test;
use ringfhe::scheme::{Ckks, HomomorphicScheme};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// x -> x² -> bootstrap -> x⁴ -> bootstrap, tracking a polynomial past the chain length.
#[test]
fn test_repeated_squaring_through_bootstrap() {
    init_tracing();
    let params = ckks_bootstrap_test().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(2026);
    let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
    let pk = gen_public_key_with_rng(&params, &sk, &mut rng).unwrap();
    let keys = gen_bootstrap_keys_with_rng(&params, &sk, &mut rng).unwrap();
    let config = BootstrapConfig::default();

    let values: Vec<f64> = (0..params.slot_count()).map(|j| 0.8 - j as f64 / 64.0).collect();
    let pt = ckks_encode_real(&values, params.scale, params.max_level, &params).unwrap();
    let mut ct: CkksCiphertext = ckks_encrypt_pk_with_rng(&pt, &pk, &mut rng).unwrap();
    let mut want = values.clone();

    for _round in 0..2 {
        while Ckks::level(&ct) > 0 {
            let sq = Ckks::relinearize(&Ckks::multiply(&ct, &ct).unwrap(), &keys.relin).unwrap();
            ct = Ckks::reduce_level(&sq).unwrap();
            want.iter_mut().for_each(|w| *w *= *w);
        }
        ct = bootstrap(&ct, &keys, &config).unwrap();
        assert_eq!(Ckks::level(&ct), params.max_level);

        let got = ckks_decode_real(&Ckks::decrypt(&ct, &sk).unwrap()).unwrap();
        for (j, (g, w)) in got.iter().zip(&want).enumerate() {
            assert!((g - w).abs() < 1e-2, "slot {j}: {g} vs {w}");
        }
    }
}
