use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::keys::keyswitch::gen_switching_key_with_rng;
use crate::keys::{
    GaloisKey, KeyContext, PublicKey, RelinKey, RotationKeys, SecretKey, conjugation_element, galois_element,
};
use crate::ring::poly::automorphism_signed;
use crate::sampling::{sample_gaussian, sample_secret, sample_uniform_rns};

/// Generate a secret key.
pub fn gen_secret_key<C: KeyContext>(ctx: &C) -> Result<SecretKey> {
    let mut rng = ChaCha20Rng::from_os_rng();
    gen_secret_key_with_rng(ctx, &mut rng)
}

/// Generate a secret key with a provided RNG.
pub fn gen_secret_key_with_rng<C: KeyContext, R: Rng>(ctx: &C, rng: &mut R) -> Result<SecretKey> {
    let chain = ctx.chain();
    let n = chain.ring_degree();
    let coeffs = sample_secret(ctx.secret_distribution(), n, rng);
    let poly = chain.extended_basis(chain.top_level())?.decompose_signed(&coeffs)?;
    let key_id = rng.random::<u64>();
    debug!(key_id, ring_degree = n, "generated secret key");

    Ok(SecretKey {
        coeffs,
        poly,
        key_id,
        chain: chain.clone(),
    })
}

/// Generate a public key from a secret key.
pub fn gen_public_key<C: KeyContext>(ctx: &C, sk: &SecretKey) -> Result<PublicKey> {
    let mut rng = ChaCha20Rng::from_os_rng();
    gen_public_key_with_rng(ctx, sk, &mut rng)
}

/// Generate a public key with a provided RNG: `(-(a·s) + e, a)`.
pub fn gen_public_key_with_rng<C: KeyContext, R: Rng>(ctx: &C, sk: &SecretKey, rng: &mut R) -> Result<PublicKey> {
    sk.check_chain(ctx.chain())?;
    let chain = sk.chain();
    let top = chain.top_level();
    let basis = chain.basis(top)?;

    let a = sample_uniform_rns(basis, rng);
    let e = basis.decompose_signed(&sample_gaussian(basis.ring_degree, ctx.sigma(), rng))?;
    let p0 = a.mul(&sk.at_level(top)?)?.neg().add(&e)?;

    Ok(PublicKey {
        p0,
        p1: a,
        key_id: sk.key_id,
        chain: chain.clone(),
    })
}

/// Generate a relinearization key (switches s² to s).
pub fn gen_relin_key<C: KeyContext>(ctx: &C, sk: &SecretKey) -> Result<RelinKey> {
    let mut rng = ChaCha20Rng::from_os_rng();
    gen_relin_key_with_rng(ctx, sk, &mut rng)
}

/// Generate a relinearization key with a provided RNG.
#[instrument(level = "debug", skip_all, fields(key_id = sk.key_id))]
pub fn gen_relin_key_with_rng<C: KeyContext, R: Rng>(ctx: &C, sk: &SecretKey, rng: &mut R) -> Result<RelinKey> {
    sk.check_chain(ctx.chain())?;
    let s_sq = sk.poly.mul(&sk.poly)?;
    let key = gen_switching_key_with_rng(sk, &s_sq, ctx.sigma(), rng)?;
    Ok(RelinKey { key })
}

/// Generate a Galois key for the automorphism X -> X^element.
pub fn gen_galois_key<C: KeyContext>(ctx: &C, sk: &SecretKey, element: usize) -> Result<GaloisKey> {
    let mut rng = ChaCha20Rng::from_os_rng();
    gen_galois_key_with_rng(ctx, sk, element, &mut rng)
}

/// Generate a Galois key with a provided RNG.
pub fn gen_galois_key_with_rng<C: KeyContext, R: Rng>(
    ctx: &C,
    sk: &SecretKey,
    element: usize,
    rng: &mut R,
) -> Result<GaloisKey> {
    sk.check_chain(ctx.chain())?;
    let n = sk.ring_degree();
    if element % 2 == 0 || element >= 2 * n {
        return Err(crate::error::FheError::InvalidParam(
            format!("Galois element must be odd and below {}, got {element}", 2 * n)
        ));
    }
    let chain = sk.chain();
    let s_auto = chain
        .extended_basis(chain.top_level())?
        .decompose_signed(&automorphism_signed(&sk.coeffs, element))?;
    let key = gen_switching_key_with_rng(sk, &s_auto, ctx.sigma(), rng)?;
    Ok(GaloisKey { element, key })
}

/// Key for complex conjugation (CKKS) or swapping the two rows (BFV).
pub fn gen_conjugation_key<C: KeyContext>(ctx: &C, sk: &SecretKey) -> Result<GaloisKey> {
    let mut rng = ChaCha20Rng::from_os_rng();
    gen_conjugation_key_with_rng(ctx, sk, &mut rng)
}

pub fn gen_conjugation_key_with_rng<C: KeyContext, R: Rng>(ctx: &C, sk: &SecretKey, rng: &mut R) -> Result<GaloisKey> {
    gen_galois_key_with_rng(ctx, sk, conjugation_element(sk.ring_degree()), rng)
}

/// Galois keys for rotating slots by each of `steps` (negative steps rotate right).
pub fn gen_rotation_keys<C: KeyContext>(ctx: &C, sk: &SecretKey, steps: &[i64]) -> Result<RotationKeys> {
    let mut rng = ChaCha20Rng::from_os_rng();
    gen_rotation_keys_with_rng(ctx, sk, steps, &mut rng)
}

#[instrument(level = "debug", skip_all, fields(key_id = sk.key_id, count = steps.len()))]
pub fn gen_rotation_keys_with_rng<C: KeyContext, R: Rng>(
    ctx: &C,
    sk: &SecretKey,
    steps: &[i64],
    rng: &mut R,
) -> Result<RotationKeys> {
    let n = sk.ring_degree();
    let mut keys = RotationKeys::new();
    for &step in steps {
        let element = galois_element(step, n);
        if element == 1 || keys.contains(element) {
            continue;
        }
        keys.insert(gen_galois_key_with_rng(ctx, sk, element, rng)?);
    }
    Ok(keys)
}
