//! Randomness for keys and encryption.
//!
//! Small distributions return signed coefficients so one sample can be lifted
//! consistently into every prime of an RNS basis.

pub mod gaussian;
pub mod uniform;

pub use gaussian::{GaussianSampler, sample_gaussian};
pub use uniform::{sample_secret, sample_sparse_ternary, sample_ternary, sample_uniform_residues, sample_uniform_rns};
