//! Plaintext ring elements.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::context::{ContextData, ParmsId};
use crate::error::{HeError, Result};
use crate::modulus::Modulus;
use crate::rns::RnsPoly;

/// An encoded ring element.
///
/// CKKS plaintexts live at a level of the modulus chain: one limb per level
/// prime, in NTT form, tagged with the level id and the scale the values
/// were multiplied by. BFV plaintexts are a single limb of coefficients
/// modulo t, not bound to a level ([`ParmsId::ZERO`], scale 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plaintext {
    pub(crate) poly: RnsPoly,
    pub(crate) parms_id: ParmsId,
    pub(crate) scale: f64,
    pub(crate) is_ntt_form: bool,
}

impl Plaintext {
    pub(crate) fn new(poly: RnsPoly, parms_id: ParmsId, scale: f64, is_ntt_form: bool) -> Self {
        Self {
            poly,
            parms_id,
            scale,
            is_ntt_form,
        }
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn is_ntt_form(&self) -> bool {
        self.is_ntt_form
    }

    pub fn poly(&self) -> &RnsPoly {
        &self.poly
    }

    /// Ring degree N.
    pub fn coeff_count(&self) -> usize {
        self.poly.n
    }

    /// True if every coefficient is zero.
    pub fn is_zero(&self) -> bool {
        self.poly.is_zero()
    }

    /// Checks the BFV form: one coefficient-form limb of degree `n`, entries below t.
    pub(crate) fn check_bfv(&self, n: usize, t: &Modulus) -> Result<()> {
        if self.is_ntt_form || self.poly.num_limbs() != 1 || self.poly.n != n {
            return Err(HeError::InvalidPlaintext("expected a batch-encoded BFV plaintext".into()));
        }
        if self.poly.limbs[0].iter().any(|&c| c >= t.value) {
            return Err(HeError::InvalidPlaintext("coefficient exceeds the plain modulus".into()));
        }
        Ok(())
    }

    /// Δ·m over the primes of a BFV level, in NTT form.
    pub(crate) fn bfv_scaled(&self, level: &ContextData) -> Result<RnsPoly> {
        let bfv = level
            .bfv()
            .ok_or(HeError::UnsupportedOperation("level carries no BFV constants"))?;
        let m = &self.poly.limbs[0];
        let limbs = level
            .moduli()
            .par_iter()
            .zip(bfv.delta.par_iter())
            .map(|(q, &delta)| m.iter().map(|&c| q.mul(delta, q.reduce(c))).collect())
            .collect();
        let mut poly = RnsPoly { limbs, n: self.poly.n };
        poly.ntt_forward(level.ntt_tables());
        Ok(poly)
    }

    /// m with coefficients centered mod t, lifted to the level primes, in NTT form.
    pub(crate) fn bfv_lifted(&self, level: &ContextData, t: &Modulus) -> RnsPoly {
        let centered: Vec<i64> = self.poly.limbs[0].iter().map(|&c| t.center(c)).collect();
        let mut poly = RnsPoly::from_signed(&centered, level.moduli());
        poly.ntt_forward(level.ntt_tables());
        poly
    }
}
