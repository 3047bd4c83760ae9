//! Ciphertext structure.
//!
//! A ciphertext is a tuple (c0, c1, ...) of RNS polynomials in the NTT domain.
//! Fresh and relinearized ciphertexts have size 2; a tensor product has
//! size 3 until it is relinearized. Decryption computes Σ c_i · s^i.

use serde::{Deserialize, Serialize};

use crate::context::ParmsId;
use crate::rns::RnsPoly;

/// An encrypted ring element with its level and scale metadata.
///
/// Metadata is only changed by [`crate::evaluator::Evaluator`] operations,
/// each of which derives the new level, scale and size from its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub(crate) polys: Vec<RnsPoly>,
    pub(crate) parms_id: ParmsId,
    pub(crate) scale: f64,
}

impl Ciphertext {
    pub(crate) fn new(polys: Vec<RnsPoly>, parms_id: ParmsId, scale: f64) -> Self {
        Self {
            polys,
            parms_id,
            scale,
        }
    }

    /// Level identifier.
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    /// Current scale (1.0 for BFV).
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Number of polynomial components.
    pub fn size(&self) -> usize {
        self.polys.len()
    }

    pub fn polys(&self) -> &[RnsPoly] {
        &self.polys
    }

    /// Ring degree N.
    pub fn poly_modulus_degree(&self) -> usize {
        self.polys.first().map_or(0, |p| p.n)
    }

    /// Number of RNS limbs, i.e. primes at the current level.
    pub fn coeff_modulus_size(&self) -> usize {
        self.polys.first().map_or(0, |p| p.num_limbs())
    }
}
