//! Leveled-HE Core: leveled CKKS and BFV homomorphic encryption.
//!
//! This library implements the leveled operation set:
//! - Modulus chain with a special key-switching prime, one level per suffix
//! - RNS polynomials over 64-bit primes, negacyclic NTT (Barrett/Shoup)
//! - CKKS encode/decode (canonical embedding) and BFV batching
//! - Public-key and symmetric encryption, decryption, BFV noise budget
//! - add/sub/multiply/square, relinearization, rescale, modulus switching
//! - Galois rotations and conjugation via key switching
//!
//! NOT implemented: bootstrapping, threshold variants, GPU backends.

pub mod error;
pub mod modulus;
pub mod params;
pub mod context;
pub mod rns;
pub mod ntt;
pub mod rng;
pub mod sampling;
pub mod plaintext;
pub mod ciphertext;
pub mod keys;
pub mod keygen;
pub mod galois;
mod keyswitch;
pub mod encoder;
pub mod batch_encoder;
pub mod encryptor;
pub mod decryptor;
pub mod evaluator;
pub mod serialize;

pub use batch_encoder::BatchEncoder;
pub use ciphertext::Ciphertext;
pub use context::{Context, ContextData, ParmsId};
pub use decryptor::Decryptor;
pub use encoder::CkksEncoder;
pub use encryptor::Encryptor;
pub use error::{HeError, Result};
pub use evaluator::Evaluator;
pub use keygen::KeyGenerator;
pub use keys::{GaloisKeys, PublicKey, RelinKeys, SecretKey};
pub use params::{
    CoeffModulus, EncryptionParameters, KeySwitchingConfig, PlainModulus, SchemeType,
    SecurityLevel,
};
pub use plaintext::Plaintext;
