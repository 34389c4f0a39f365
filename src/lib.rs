//! # ringfhe: BFV and CKKS Homomorphic Encryption
//!
//! Leveled homomorphic encryption over Z_q[X]/(X^N+1) in RNS form:
//!
//! - **BFV** for exact arithmetic on integers modulo a plaintext modulus t,
//!   with SIMD batching when t ≡ 1 (mod 2N).
//! - **CKKS** for approximate arithmetic on N/2 complex slots, with rescaling.
//! - **Bootstrapping** for CKKS: modulus raising, coefficients-to-slots,
//!   approximate modular reduction and slots-to-coefficients.
//!
//! Every parameter set is an immutable context behind an `Arc`; ciphertexts,
//! plaintexts and keys hold on to the context they were made in, and mixing
//! contexts or secret keys is an error rather than garbage.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ringfhe::prelude::*;
//!
//! let params = ringfhe::params::presets::bfv_default().unwrap();
//! let sk = gen_secret_key(&params).unwrap();
//! let pk = gen_public_key(&params, &sk).unwrap();
//! let rk = gen_relin_key(&params, &sk).unwrap();
//!
//! let ct1 = encrypt_pk(&encode_scalar(10, &params).unwrap(), &pk).unwrap();
//! let ct2 = encrypt_pk(&encode_scalar(20, &params).unwrap(), &pk).unwrap();
//!
//! let sum = bfv_add(&ct1, &ct2).unwrap();
//! let product = bfv_mul_and_relin(&ct1, &ct2, &rk).unwrap();
//!
//! assert_eq!(decode_scalar(&decrypt(&sum, &sk).unwrap()), 30);
//! assert_eq!(decode_scalar(&decrypt(&product, &sk).unwrap()), 200);
//! ```

pub mod error;
pub mod params;
pub mod ring;
pub mod sampling;
pub mod keys;
pub(crate) mod noise;
pub mod bfv;
pub mod ckks;
pub mod bootstrap;
pub mod scheme;
pub mod serialize;

/// Convenient re-exports for common types and functions.
pub mod prelude {
    pub use crate::error::{FheError, Result};
    pub use crate::params::{BfvParams, BfvParamsBuilder, CkksParams, CkksParamsBuilder, SecretDistribution};
    pub use crate::ring::{CoeffPoly, NttPoly, RnsPoly};
    pub use crate::keys::{
        GaloisKey, PublicKey, RelinKey, RotationKeys, SecretKey,
        gen_conjugation_key, gen_public_key, gen_relin_key, gen_rotation_keys, gen_secret_key,
    };
    pub use crate::bfv::{
        BatchEncoder, BfvCiphertext, BfvPlaintext, IntegerEncoder,
        encrypt_pk, encrypt_sk, decrypt, encode_scalar, decode_scalar,
        bfv_add, bfv_sub, bfv_neg, bfv_add_plain, bfv_mul_plain, bfv_mul, bfv_relinearize,
        bfv_mul_and_relin, bfv_rotate, bfv_rotate_columns, bfv_mod_switch,
    };
    pub use crate::ckks::{
        CkksCiphertext, CkksPlaintext,
        ckks_encode, ckks_encode_real, ckks_decode, ckks_decode_real,
        ckks_encrypt_pk, ckks_encrypt_sk, ckks_decrypt,
        ckks_add, ckks_sub, ckks_neg, ckks_add_plain, ckks_mul_plain, ckks_mul, ckks_relinearize,
        ckks_rescale, ckks_mul_relin_rescale, ckks_rotate, ckks_conjugate,
    };
    pub use crate::bootstrap::{BootstrapConfig, BootstrapKeys, bootstrap, gen_bootstrap_keys};
    pub use crate::scheme::{Bfv, Ckks, HomomorphicScheme};
}
