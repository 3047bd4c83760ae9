//! Error taxonomy for the engine.
//!
//! Every fallible operation returns [`Result`]. Operand incompatibilities
//! (`LevelMismatch`, `ScaleMismatch`) are never coerced silently: the caller
//! aligns levels with a mod-switch or normalizes scales explicitly.

use thiserror::Error;

/// All errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum HeError {
    /// Bad ring degree, modulus chain or plain modulus at setup time.
    #[error("invalid encryption parameters: {0}")]
    InvalidParameters(String),

    /// Binary operands live at different levels of the modulus chain.
    #[error("level mismatch: operands are at different levels of the modulus chain")]
    LevelMismatch,

    /// Binary operands carry different scales.
    #[error("scale mismatch: {left} vs {right}")]
    ScaleMismatch { left: f64, right: f64 },

    /// Rescale or mod-switch requested at the last level of the chain.
    #[error("no more levels: the modulus chain is exhausted")]
    NoMoreLevels,

    /// A size-3 ciphertext reached an operation that needs size 2; it must be
    /// relinearized first.
    #[error("relinearization keys required: relinearize the ciphertext first")]
    RelinKeysRequired,

    /// No Galois key (direct or via power-of-two decomposition) for this step.
    #[error("no Galois key available for rotation step {0}")]
    UnsupportedRotationStep(i64),

    /// Encoded value times scale does not fit the coefficient modulus.
    #[error("encoding overflow: scaled value does not fit the coefficient modulus")]
    EncodingOverflow,

    /// Requested Galois steps/elements are not automorphisms of the ring.
    #[error("invalid key request: {0}")]
    InvalidKeyRequest(String),

    /// Scale is non-positive or exceeds the modulus at the operand's level.
    #[error("scale out of bounds: {0}")]
    ScaleOutOfBounds(f64),

    /// Operand or key was created for a different context, or its level id is unknown.
    #[error("parameter mismatch: {0}")]
    ParameterMismatch(String),

    /// Mod-switch target is not below the operand's current level.
    #[error("invalid target level: cannot switch to a level above the current one")]
    InvalidTargetLevel,

    /// Operation does not accept a ciphertext of this size.
    #[error("invalid ciphertext size {0}")]
    InvalidCiphertextSize(usize),

    /// Operation is not defined for the context's scheme.
    #[error("operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    /// Plaintext value or encoding is invalid for this context.
    #[error("invalid plaintext: {0}")]
    InvalidPlaintext(String),

    /// Bytes could not be decoded or failed validation.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for HeError {
    fn from(e: bincode::Error) -> Self {
        HeError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HeError>;
