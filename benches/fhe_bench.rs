use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use num_complex::Complex64;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use ringfhe::bfv::{self, BatchEncoder};
use ringfhe::bootstrap::{BootstrapConfig, bootstrap, gen_bootstrap_keys_with_rng};
use ringfhe::ckks;
use ringfhe::keys::{gen_public_key_with_rng, gen_relin_key_with_rng, gen_rotation_keys_with_rng, gen_secret_key_with_rng};
use ringfhe::params::presets::{bfv_default, ckks_bootstrap_test, ckks_default};

fn keygen(c: &mut Criterion) {
    let params = bfv_default().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(0);

    c.bench_function("keygen_secret", |b| {
        b.iter(|| gen_secret_key_with_rng(black_box(&params), &mut rng))
    });

    let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
    c.bench_function("keygen_public", |b| {
        b.iter(|| gen_public_key_with_rng(black_box(&params), &sk, &mut rng))
    });

    c.bench_function("keygen_relin", |b| {
        b.iter(|| gen_relin_key_with_rng(black_box(&params), &sk, &mut rng))
    });
}

fn bfv_ops(c: &mut Criterion) {
    let params = bfv_default().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
    let pk = gen_public_key_with_rng(&params, &sk, &mut rng).unwrap();
    let rk = gen_relin_key_with_rng(&params, &sk, &mut rng).unwrap();
    let rot = gen_rotation_keys_with_rng(&params, &sk, &[1], &mut rng).unwrap();
    let encoder = BatchEncoder::new(&params).unwrap();
    let values: Vec<u64> = (0..encoder.slot_count() as u64).collect();
    let pt = encoder.encode(&values).unwrap();

    c.bench_function("bfv_batch_encode", |b| b.iter(|| encoder.encode(black_box(&values))));
    c.bench_function("bfv_encrypt_pk", |b| {
        b.iter(|| bfv::encrypt_pk_with_rng(black_box(&pt), &pk, &mut rng))
    });

    let ct1 = bfv::encrypt_pk_with_rng(&pt, &pk, &mut rng).unwrap();
    let ct2 = bfv::encrypt_pk_with_rng(&pt, &pk, &mut rng).unwrap();
    c.bench_function("bfv_decrypt", |b| b.iter(|| bfv::decrypt(black_box(&ct1), &sk)));
    c.bench_function("bfv_add", |b| b.iter(|| bfv::bfv_add(black_box(&ct1), black_box(&ct2))));
    c.bench_function("bfv_mul_plain", |b| b.iter(|| bfv::bfv_mul_plain(black_box(&ct1), &pt)));
    c.bench_function("bfv_mul_and_relin", |b| {
        b.iter(|| bfv::bfv_mul_and_relin(black_box(&ct1), black_box(&ct2), &rk))
    });
    c.bench_function("bfv_rotate", |b| b.iter(|| bfv::bfv_rotate(black_box(&ct1), 1, &rot)));
}

fn ckks_ops(c: &mut Criterion) {
    let params = ckks_default().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
    let rk = gen_relin_key_with_rng(&params, &sk, &mut rng).unwrap();
    let rot = gen_rotation_keys_with_rng(&params, &sk, &[1], &mut rng).unwrap();
    let values: Vec<Complex64> =
        (0..params.slot_count()).map(|j| Complex64::new((j as f64).sin(), 0.0)).collect();

    c.bench_function("ckks_encode", |b| {
        b.iter(|| ckks::ckks_encode(black_box(&values), params.scale, params.max_level, &params))
    });
    let pt = ckks::ckks_encode(&values, params.scale, params.max_level, &params).unwrap();
    let ct1 = ckks::ckks_encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();
    let ct2 = ckks::ckks_encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();

    c.bench_function("ckks_decrypt_decode", |b| {
        b.iter(|| ckks::ckks_decode(&ckks::ckks_decrypt(black_box(&ct1), &sk).unwrap()))
    });
    c.bench_function("ckks_mul_relin_rescale", |b| {
        b.iter(|| ckks::ckks_mul_relin_rescale(black_box(&ct1), black_box(&ct2), &rk))
    });
    c.bench_function("ckks_rotate", |b| b.iter(|| ckks::ckks_rotate(black_box(&ct1), 1, &rot)));
}

fn ckks_bootstrap(c: &mut Criterion) {
    let params = ckks_bootstrap_test().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let sk = gen_secret_key_with_rng(&params, &mut rng).unwrap();
    let keys = gen_bootstrap_keys_with_rng(&params, &sk, &mut rng).unwrap();
    let pt = ckks::ckks_encode_real(&[0.25; 16], params.scale, 0, &params).unwrap();
    let ct = ckks::ckks_encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();
    let config = BootstrapConfig::default();

    let mut group = c.benchmark_group("bootstrap");
    group.sample_size(10);
    group.bench_function("ckks_bootstrap_n32", |b| b.iter(|| bootstrap(black_box(&ct), &keys, &config)));
    group.finish();
}

criterion_group!(benches, keygen, bfv_ops, ckks_ops, ckks_bootstrap);
criterion_main!(benches);
