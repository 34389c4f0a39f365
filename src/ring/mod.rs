pub mod modular;
pub mod ntt;
pub mod poly;
pub mod primes;
pub mod rns;

pub use modular::{Modulus, mod_add, mod_inv, mod_mul, mod_neg, mod_pow, mod_sub};
pub use ntt::{NttPoly, NttTable};
pub use poly::CoeffPoly;
pub use rns::{RnsBasis, RnsPoly, basis_extend, fast_base_extend};
