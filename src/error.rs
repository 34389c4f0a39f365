use thiserror::Error;

#[derive(Debug, Error)]
pub enum FheError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("ring degree mismatch: expected {expected}, got {got}")]
    InvalidDegree { expected: usize, got: usize },

    #[error("modulus mismatch")]
    ModulusMismatch,

    #[error("level mismatch: {left} vs {right}")]
    LevelMismatch { left: usize, right: usize },

    #[error("scale mismatch: {left} vs {right}")]
    ScaleMismatch { left: f64, right: f64 },

    #[error("too many values: at most {max} slots, got {got}")]
    SlotOverflow { max: usize, got: usize },

    #[error("modulus chain exhausted")]
    ChainExhausted,

    #[error("noise budget exhausted ({budget_bits:.2} bits left)")]
    NoiseBudgetExhausted { budget_bits: f64 },

    #[error("key was not derived from the same context or secret key")]
    KeyMismatch,

    #[error("key not available: {0}")]
    MissingKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, FheError>;
