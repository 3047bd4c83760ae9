//! Homomorphic operations on ciphertexts.
//!
//! Every ciphertext carries (level, scale, size). The evaluator checks the
//! metadata of its operands, never coerces it, and derives the metadata of
//! the result:
//!
//! ```text
//! add / sub          same level, same scale     -> level, scale, max size
//! multiply           same level                 -> level, scale_a·scale_b, size_a + size_b - 1
//! relinearize        size 3                     -> size 2
//! rescale_to_next    CKKS, size 2, not last     -> next level, scale / q_last
//! mod_switch_to_next not last, scale fits       -> next level, scale unchanged
//! rotations          size 2                     -> unchanged
//! ```
//!
//! Each operation has an `_inplace` form and a by-value form that clones
//! its first operand.

use std::sync::Arc;

use log::debug;
use num_bigint::BigInt;
use rayon::prelude::*;

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ContextData, ParmsId};
use crate::encoder::check_scale;
use crate::error::{HeError, Result};
use crate::galois::{
    conjugation_elt, galois_elt_from_step, is_valid_galois_elt, naf_steps, ntt_permutation,
    permute,
};
use crate::keys::{GaloisKeys, RelinKeys};
use crate::keyswitch::switch_key;
use crate::modulus::Modulus;
use crate::ntt::NttTables;
use crate::params::SchemeType;
use crate::plaintext::Plaintext;
use crate::rns::RnsPoly;

/// Largest relative scale drift [`Evaluator::normalize_scale_inplace`] accepts.
pub const SCALE_NORMALIZE_TOLERANCE: f64 = 1.0 / 1024.0;

/// Scales equal up to floating-point rounding.
fn are_close(a: f64, b: f64) -> bool {
    let magnitude = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= f64::EPSILON * magnitude
}

/// Σ_{i+j=k} a_i ⊙ b_j, component-wise NTT products.
fn tensor(a: &[RnsPoly], b: &[RnsPoly], moduli: &[Modulus]) -> Vec<RnsPoly> {
    let n = a[0].n;
    let mut out = vec![RnsPoly::zero(n, moduli.len()); a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j].add_product_assign(x, y, moduli);
        }
    }
    out
}

fn permute_poly(poly: &RnsPoly, perm: &[usize]) -> RnsPoly {
    RnsPoly {
        limbs: poly.limbs.par_iter().map(|l| permute(l, perm)).collect(),
        n: poly.n,
    }
}

/// Stateless evaluator bound to a context.
#[derive(Debug, Clone)]
pub struct Evaluator {
    context: Arc<Context>,
}

impl Evaluator {
    pub fn new(context: &Arc<Context>) -> Self {
        Self {
            context: Arc::clone(context),
        }
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    fn level_of(&self, encrypted: &Ciphertext) -> Result<&Arc<ContextData>> {
        let level = self.context.data_level(&encrypted.parms_id())?;
        if encrypted.size() < 2 {
            return Err(HeError::InvalidCiphertextSize(encrypted.size()));
        }
        let count = level.moduli().len();
        if encrypted
            .polys()
            .iter()
            .any(|p| p.num_limbs() != count || p.n != self.context.poly_modulus_degree())
        {
            return Err(HeError::ParameterMismatch(
                "ciphertext shape does not match its level".into(),
            ));
        }
        Ok(level)
    }

    fn same_level(&self, a: &Ciphertext, b: &Ciphertext) -> Result<&Arc<ContextData>> {
        let level = self.level_of(a)?;
        self.level_of(b)?;
        if a.parms_id() != b.parms_id() {
            return Err(HeError::LevelMismatch);
        }
        Ok(level)
    }

    fn require(&self, scheme: SchemeType, operation: &'static str) -> Result<()> {
        if self.context.scheme() != scheme {
            return Err(HeError::UnsupportedOperation(operation));
        }
        Ok(())
    }

    /// Size-2 ciphertexts only; size 3 still needs relinearization.
    fn require_size_two(encrypted: &Ciphertext) -> Result<()> {
        match encrypted.size() {
            2 => Ok(()),
            s if s > 2 => Err(HeError::RelinKeysRequired),
            s => Err(HeError::InvalidCiphertextSize(s)),
        }
    }

    fn check_key_parms(&self, parms_id: ParmsId) -> Result<()> {
        if parms_id != self.context.key_parms_id() {
            return Err(HeError::ParameterMismatch(
                "keys were generated for a different context".into(),
            ));
        }
        Ok(())
    }

    fn plain_modulus(&self) -> Result<Modulus> {
        self.context
            .plain_modulus()
            .ok_or_else(|| HeError::InvalidParameters("BFV context without plain modulus".into()))
    }

    /// Plaintext usable against a ciphertext at `level`: the CKKS level must
    /// match, a BFV plaintext must be a valid batch encoding.
    fn check_plain(&self, encrypted: &Ciphertext, plain: &Plaintext) -> Result<()> {
        match self.context.scheme() {
            SchemeType::Ckks => {
                if !plain.is_ntt_form() {
                    return Err(HeError::InvalidPlaintext("not a CKKS plaintext".into()));
                }
                if plain.parms_id() != encrypted.parms_id() {
                    return Err(HeError::LevelMismatch);
                }
                if plain.poly().num_limbs() != encrypted.coeff_modulus_size() {
                    return Err(HeError::InvalidPlaintext("limb count does not match its level".into()));
                }
                Ok(())
            }
            SchemeType::Bfv => {
                let t = self.plain_modulus()?;
                plain.check_bfv(self.context.poly_modulus_degree(), &t)
            }
        }
    }

    // ------------------------------------------------------------------
    // Additive operations
    // ------------------------------------------------------------------

    pub fn negate_inplace(&self, encrypted: &mut Ciphertext) -> Result<()> {
        let level = self.level_of(encrypted)?;
        for poly in encrypted.polys.iter_mut() {
            poly.negate_assign(level.moduli());
        }
        Ok(())
    }

    pub fn negate(&self, encrypted: &Ciphertext) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.negate_inplace(&mut out)?;
        Ok(out)
    }

    pub fn add_inplace(&self, a: &mut Ciphertext, b: &Ciphertext) -> Result<()> {
        self.add_sub_inplace(a, b, false)
    }

    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let mut out = a.clone();
        self.add_inplace(&mut out, b)?;
        Ok(out)
    }

    pub fn sub_inplace(&self, a: &mut Ciphertext, b: &Ciphertext) -> Result<()> {
        self.add_sub_inplace(a, b, true)
    }

    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let mut out = a.clone();
        self.sub_inplace(&mut out, b)?;
        Ok(out)
    }

    fn add_sub_inplace(&self, a: &mut Ciphertext, b: &Ciphertext, subtract: bool) -> Result<()> {
        let level = self.same_level(a, b)?;
        if !are_close(a.scale(), b.scale()) {
            return Err(HeError::ScaleMismatch {
                left: a.scale(),
                right: b.scale(),
            });
        }
        let moduli = level.moduli();
        // Missing components are zero.
        while a.polys.len() < b.polys.len() {
            a.polys.push(RnsPoly::zero(self.context.poly_modulus_degree(), moduli.len()));
        }
        for (x, y) in a.polys.iter_mut().zip(b.polys()) {
            if subtract {
                x.sub_assign(y, moduli);
            } else {
                x.add_assign(y, moduli);
            }
        }
        Ok(())
    }

    /// Sum of one or more ciphertexts at a shared level and scale.
    pub fn add_many(&self, operands: &[Ciphertext]) -> Result<Ciphertext> {
        let (first, rest) = operands
            .split_first()
            .ok_or_else(|| HeError::InvalidParameters("add_many needs at least one operand".into()))?;
        let mut out = first.clone();
        for ct in rest {
            self.add_inplace(&mut out, ct)?;
        }
        Ok(out)
    }

    pub fn add_plain_inplace(&self, encrypted: &mut Ciphertext, plain: &Plaintext) -> Result<()> {
        self.add_sub_plain_inplace(encrypted, plain, false)
    }

    pub fn add_plain(&self, encrypted: &Ciphertext, plain: &Plaintext) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.add_plain_inplace(&mut out, plain)?;
        Ok(out)
    }

    pub fn sub_plain_inplace(&self, encrypted: &mut Ciphertext, plain: &Plaintext) -> Result<()> {
        self.add_sub_plain_inplace(encrypted, plain, true)
    }

    pub fn sub_plain(&self, encrypted: &Ciphertext, plain: &Plaintext) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.sub_plain_inplace(&mut out, plain)?;
        Ok(out)
    }

    fn add_sub_plain_inplace(
        &self,
        encrypted: &mut Ciphertext,
        plain: &Plaintext,
        subtract: bool,
    ) -> Result<()> {
        let level = self.level_of(encrypted)?;
        self.check_plain(encrypted, plain)?;
        let term = match self.context.scheme() {
            SchemeType::Ckks => {
                if !are_close(encrypted.scale(), plain.scale()) {
                    return Err(HeError::ScaleMismatch {
                        left: encrypted.scale(),
                        right: plain.scale(),
                    });
                }
                plain.poly().clone()
            }
            SchemeType::Bfv => plain.bfv_scaled(level)?,
        };
        let c0 = &mut encrypted.polys[0];
        if subtract {
            c0.sub_assign(&term, level.moduli());
        } else {
            c0.add_assign(&term, level.moduli());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Multiplicative operations
    // ------------------------------------------------------------------

    /// Tensor product; the result has size_a + size_b - 1 components and,
    /// for CKKS, scale scale_a · scale_b.
    pub fn multiply_inplace(&self, a: &mut Ciphertext, b: &Ciphertext) -> Result<()> {
        let level = self.same_level(a, b)?;
        match self.context.scheme() {
            SchemeType::Ckks => {
                let scale = a.scale() * b.scale();
                check_scale(level, scale)?;
                a.polys = tensor(a.polys(), b.polys(), level.moduli());
                a.scale = scale;
            }
            SchemeType::Bfv => {
                a.polys = self.bfv_tensor(level, a.polys(), b.polys())?;
            }
        }
        Ok(())
    }

    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let mut out = a.clone();
        self.multiply_inplace(&mut out, b)?;
        Ok(out)
    }

    pub fn square_inplace(&self, encrypted: &mut Ciphertext) -> Result<()> {
        let level = self.level_of(encrypted)?;
        match self.context.scheme() {
            SchemeType::Ckks => {
                let scale = encrypted.scale() * encrypted.scale();
                check_scale(level, scale)?;
                let moduli = level.moduli();
                encrypted.polys = if encrypted.size() == 2 {
                    // (c0², 2·c0·c1, c1²)
                    let c0 = &encrypted.polys[0];
                    let c1 = &encrypted.polys[1];
                    let mut cross = c0.hadamard_mul(c1, moduli);
                    let doubled = cross.clone();
                    cross.add_assign(&doubled, moduli);
                    vec![c0.hadamard_mul(c0, moduli), cross, c1.hadamard_mul(c1, moduli)]
                } else {
                    tensor(encrypted.polys(), encrypted.polys(), moduli)
                };
                encrypted.scale = scale;
            }
            SchemeType::Bfv => {
                encrypted.polys = self.bfv_tensor(level, encrypted.polys(), encrypted.polys())?;
            }
        }
        Ok(())
    }

    pub fn square(&self, encrypted: &Ciphertext) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.square_inplace(&mut out)?;
        Ok(out)
    }

    /// BFV tensor: lift to Q·B, multiply exactly, scale by t/Q and round
    /// back to Q.
    fn bfv_tensor(&self, level: &ContextData, a: &[RnsPoly], b: &[RnsPoly]) -> Result<Vec<RnsPoly>> {
        let t = self.plain_modulus()?;
        let bfv = level
            .bfv()
            .ok_or(HeError::UnsupportedOperation("level carries no BFV constants"))?;
        let aux = self
            .context
            .aux_base()
            .ok_or(HeError::UnsupportedOperation("context has no auxiliary base"))?;
        let extended = &bfv.extended_base;
        let ext_tables: Vec<Arc<NttTables>> = level
            .ntt_tables()
            .iter()
            .chain(&aux.ntt_tables)
            .cloned()
            .collect();

        let lift = |poly: &RnsPoly| {
            let mut coeffs = poly.clone();
            coeffs.ntt_inverse(level.ntt_tables());
            let mut lifted = extended.decompose_poly_signed(&level.base().compose_poly_centered(&coeffs));
            lifted.ntt_forward(&ext_tables);
            lifted
        };
        let la: Vec<RnsPoly> = a.iter().map(lift).collect();
        let lb: Vec<RnsPoly> = b.iter().map(lift).collect();

        let q = level.total_coeff_modulus();
        let half_q = q >> 1u32;
        Ok(tensor(&la, &lb, extended.moduli())
            .into_iter()
            .map(|mut product| {
                product.ntt_inverse(&ext_tables);
                let scaled: Vec<BigInt> = extended
                    .compose_poly_centered(&product)
                    .par_iter()
                    .map(|x| {
                        let magnitude = (x.magnitude() * t.value + &half_q) / q;
                        BigInt::from_biguint(x.sign(), magnitude)
                    })
                    .collect();
                let mut out = level.base().decompose_poly_signed(&scaled);
                out.ntt_forward(level.ntt_tables());
                out
            })
            .collect())
    }

    pub fn multiply_plain_inplace(&self, encrypted: &mut Ciphertext, plain: &Plaintext) -> Result<()> {
        let level = self.level_of(encrypted)?;
        self.check_plain(encrypted, plain)?;
        let moduli = level.moduli();
        match self.context.scheme() {
            SchemeType::Ckks => {
                let scale = encrypted.scale() * plain.scale();
                check_scale(level, scale)?;
                for poly in encrypted.polys.iter_mut() {
                    poly.mul_assign(plain.poly(), moduli);
                }
                encrypted.scale = scale;
            }
            SchemeType::Bfv => {
                let lifted = plain.bfv_lifted(level, &self.plain_modulus()?);
                for poly in encrypted.polys.iter_mut() {
                    poly.mul_assign(&lifted, moduli);
                }
            }
        }
        Ok(())
    }

    pub fn multiply_plain(&self, encrypted: &Ciphertext, plain: &Plaintext) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.multiply_plain_inplace(&mut out, plain)?;
        Ok(out)
    }

    /// Size 3 → size 2 by switching c2 from s² to s.
    pub fn relinearize_inplace(&self, encrypted: &mut Ciphertext, relin_keys: &RelinKeys) -> Result<()> {
        let level = self.level_of(encrypted)?;
        if encrypted.size() != 3 {
            return Err(HeError::InvalidCiphertextSize(encrypted.size()));
        }
        self.check_key_parms(relin_keys.parms_id())?;
        let moduli = level.moduli();
        let c2 = encrypted.polys.pop().ok_or(HeError::InvalidCiphertextSize(0))?;
        let (d0, d1) = switch_key(&self.context, level, &c2, relin_keys.key())?;
        encrypted.polys[0].add_assign(&d0, moduli);
        encrypted.polys[1].add_assign(&d1, moduli);
        Ok(())
    }

    pub fn relinearize(&self, encrypted: &Ciphertext, relin_keys: &RelinKeys) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.relinearize_inplace(&mut out, relin_keys)?;
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Level management
    // ------------------------------------------------------------------

    /// Divide by the last prime q of the level: scale becomes scale / q.
    pub fn rescale_to_next_inplace(&self, encrypted: &mut Ciphertext) -> Result<()> {
        self.require(SchemeType::Ckks, "rescale is only defined for CKKS")?;
        let level = self.level_of(encrypted)?;
        Self::require_size_two(encrypted)?;
        let next = level.next_parms_id().ok_or(HeError::NoMoreLevels)?;
        let moduli = level.moduli();
        let q_last = moduli[moduli.len() - 1].value as f64;

        for poly in encrypted.polys.iter_mut() {
            poly.divide_and_round_by_last(moduli, level.ntt_tables());
        }
        encrypted.parms_id = next;
        encrypted.scale /= q_last;
        debug!(
            "rescale: chain index {} -> {}, scale 2^{:.4}",
            level.chain_index(),
            level.chain_index() - 1,
            encrypted.scale.log2()
        );
        Ok(())
    }

    pub fn rescale_to_next(&self, encrypted: &Ciphertext) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.rescale_to_next_inplace(&mut out)?;
        Ok(out)
    }

    /// Rescale repeatedly until the ciphertext reaches `parms_id`.
    pub fn rescale_to_inplace(&self, encrypted: &mut Ciphertext, parms_id: ParmsId) -> Result<()> {
        self.require(SchemeType::Ckks, "rescale is only defined for CKKS")?;
        self.check_target(encrypted, parms_id)?;
        while encrypted.parms_id() != parms_id {
            self.rescale_to_next_inplace(encrypted)?;
        }
        Ok(())
    }

    pub fn rescale_to(&self, encrypted: &Ciphertext, parms_id: ParmsId) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.rescale_to_inplace(&mut out, parms_id)?;
        Ok(out)
    }

    /// Target must be the current level or one below it.
    fn check_target(&self, encrypted: &Ciphertext, parms_id: ParmsId) -> Result<()> {
        let current = self.level_of(encrypted)?;
        let target = self.context.data_level(&parms_id)?;
        if target.chain_index() > current.chain_index() {
            return Err(HeError::InvalidTargetLevel);
        }
        Ok(())
    }

    /// Drop the last prime without touching the scale.
    ///
    /// CKKS drops the limb (an exact reduction mod the smaller modulus) and
    /// fails with `ScaleOutOfBounds` if the scale no longer fits below it;
    /// BFV divides by the prime and rounds, keeping Δ·m aligned with the
    /// new ⌊Q/t⌋.
    pub fn mod_switch_to_next_inplace(&self, encrypted: &mut Ciphertext) -> Result<()> {
        let level = self.level_of(encrypted)?;
        let next = level.next_parms_id().ok_or(HeError::NoMoreLevels)?;
        let moduli = level.moduli();
        match self.context.scheme() {
            SchemeType::Ckks => {
                check_scale(self.context.data_level(&next)?, encrypted.scale())?;
                for poly in encrypted.polys.iter_mut() {
                    poly.truncate(moduli.len() - 1);
                }
            }
            SchemeType::Bfv => {
                for poly in encrypted.polys.iter_mut() {
                    poly.divide_and_round_by_last(moduli, level.ntt_tables());
                }
            }
        }
        encrypted.parms_id = next;
        debug!(
            "mod switch: chain index {} -> {}",
            level.chain_index(),
            level.chain_index() - 1
        );
        Ok(())
    }

    pub fn mod_switch_to_next(&self, encrypted: &Ciphertext) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.mod_switch_to_next_inplace(&mut out)?;
        Ok(out)
    }

    pub fn mod_switch_to_inplace(&self, encrypted: &mut Ciphertext, parms_id: ParmsId) -> Result<()> {
        self.check_target(encrypted, parms_id)?;
        if self.context.scheme() == SchemeType::Ckks {
            // The target is the smallest modulus on the way down.
            check_scale(self.context.data_level(&parms_id)?, encrypted.scale())?;
        }
        while encrypted.parms_id() != parms_id {
            self.mod_switch_to_next_inplace(encrypted)?;
        }
        Ok(())
    }

    pub fn mod_switch_to(&self, encrypted: &Ciphertext, parms_id: ParmsId) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.mod_switch_to_inplace(&mut out, parms_id)?;
        Ok(out)
    }

    /// Move a CKKS plaintext one level down (drop its last limb).
    pub fn mod_switch_plain_to_next_inplace(&self, plain: &mut Plaintext) -> Result<()> {
        self.require(SchemeType::Ckks, "BFV plaintexts are not bound to a level")?;
        if !plain.is_ntt_form() {
            return Err(HeError::InvalidPlaintext("not a CKKS plaintext".into()));
        }
        let level = self.context.data_level(&plain.parms_id())?;
        let next = level.next_parms_id().ok_or(HeError::NoMoreLevels)?;
        check_scale(self.context.data_level(&next)?, plain.scale())?;
        plain.poly.truncate(level.moduli().len() - 1);
        plain.parms_id = next;
        Ok(())
    }

    pub fn mod_switch_plain_to_next(&self, plain: &Plaintext) -> Result<Plaintext> {
        let mut out = plain.clone();
        self.mod_switch_plain_to_next_inplace(&mut out)?;
        Ok(out)
    }

    pub fn mod_switch_plain_to_inplace(&self, plain: &mut Plaintext, parms_id: ParmsId) -> Result<()> {
        self.require(SchemeType::Ckks, "BFV plaintexts are not bound to a level")?;
        let current = self.context.data_level(&plain.parms_id())?;
        let target = self.context.data_level(&parms_id)?;
        if target.chain_index() > current.chain_index() {
            return Err(HeError::InvalidTargetLevel);
        }
        check_scale(target, plain.scale())?;
        while plain.parms_id() != parms_id {
            self.mod_switch_plain_to_next_inplace(plain)?;
        }
        Ok(())
    }

    pub fn mod_switch_plain_to(&self, plain: &Plaintext, parms_id: ParmsId) -> Result<Plaintext> {
        let mut out = plain.clone();
        self.mod_switch_plain_to_inplace(&mut out, parms_id)?;
        Ok(out)
    }

    /// Overwrite the scale with `scale` when it differs by at most
    /// [`SCALE_NORMALIZE_TOLERANCE`] relative drift.
    ///
    /// After rescaling, scales sit near but not on a power of two; this is
    /// how terms from different branches are made addable.
    pub fn normalize_scale_inplace(&self, encrypted: &mut Ciphertext, scale: f64) -> Result<()> {
        self.require(SchemeType::Ckks, "scales are only tracked for CKKS")?;
        let level = self.level_of(encrypted)?;
        check_scale(level, scale)?;
        if (encrypted.scale() / scale - 1.0).abs() > SCALE_NORMALIZE_TOLERANCE {
            return Err(HeError::ScaleMismatch {
                left: encrypted.scale(),
                right: scale,
            });
        }
        encrypted.scale = scale;
        Ok(())
    }

    pub fn normalize_scale(&self, encrypted: &Ciphertext, scale: f64) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.normalize_scale_inplace(&mut out, scale)?;
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Galois operations
    // ------------------------------------------------------------------

    /// σ_g(c0) + ks(σ_g(c1)), ks(σ_g(c1))
    pub fn apply_galois_inplace(
        &self,
        encrypted: &mut Ciphertext,
        galois_elt: u64,
        galois_keys: &GaloisKeys,
    ) -> Result<()> {
        let level = self.level_of(encrypted)?;
        Self::require_size_two(encrypted)?;
        self.check_key_parms(galois_keys.parms_id())?;
        let n = self.context.poly_modulus_degree();
        if !is_valid_galois_elt(galois_elt, n) {
            return Err(HeError::InvalidKeyRequest(format!(
                "{galois_elt} is not a Galois element for N={n}"
            )));
        }
        let key = galois_keys.key(galois_elt).ok_or_else(|| {
            HeError::InvalidKeyRequest(format!("no Galois key for element {galois_elt}"))
        })?;

        let perm = ntt_permutation(galois_elt, n);
        let c0 = permute_poly(&encrypted.polys[0], &perm);
        let c1 = permute_poly(&encrypted.polys[1], &perm);
        let (mut d0, d1) = switch_key(&self.context, level, &c1, key)?;
        d0.add_assign(&c0, level.moduli());
        encrypted.polys = vec![d0, d1];
        Ok(())
    }

    pub fn apply_galois(
        &self,
        encrypted: &Ciphertext,
        galois_elt: u64,
        galois_keys: &GaloisKeys,
    ) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.apply_galois_inplace(&mut out, galois_elt, galois_keys)?;
        Ok(out)
    }

    /// Rotate by `step` slots: with a direct key if one exists, otherwise as
    /// a chain of signed power-of-two rotations.
    fn rotate_internal(&self, encrypted: &mut Ciphertext, step: i64, galois_keys: &GaloisKeys) -> Result<()> {
        let n = self.context.poly_modulus_degree();
        let row_size = (n / 2) as i64;
        let k = step.rem_euclid(row_size);
        if k == 0 {
            self.level_of(encrypted)?;
            return Ok(());
        }
        let direct = galois_elt_from_step(k, n)?;
        if galois_keys.has_key(direct) {
            return self.apply_galois_inplace(encrypted, direct, galois_keys);
        }

        let shortest = if k > row_size / 2 { k - row_size } else { k };
        let elts = naf_steps(shortest, n)
            .into_iter()
            .map(|term| galois_elt_from_step(term, n))
            .collect::<Result<Vec<_>>>()?;
        if elts.iter().any(|&g| !galois_keys.has_key(g)) {
            return Err(HeError::UnsupportedRotationStep(step));
        }
        for g in elts {
            self.apply_galois_inplace(encrypted, g, galois_keys)?;
        }
        Ok(())
    }

    /// Rotate CKKS slots left by `step` (right for negative `step`).
    pub fn rotate_vector_inplace(
        &self,
        encrypted: &mut Ciphertext,
        step: i64,
        galois_keys: &GaloisKeys,
    ) -> Result<()> {
        self.require(SchemeType::Ckks, "rotate_vector is CKKS only; use rotate_rows for BFV")?;
        self.rotate_internal(encrypted, step, galois_keys)
    }

    pub fn rotate_vector(&self, encrypted: &Ciphertext, step: i64, galois_keys: &GaloisKeys) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.rotate_vector_inplace(&mut out, step, galois_keys)?;
        Ok(out)
    }

    /// Complex-conjugate every CKKS slot.
    pub fn complex_conjugate_inplace(&self, encrypted: &mut Ciphertext, galois_keys: &GaloisKeys) -> Result<()> {
        self.require(SchemeType::Ckks, "complex_conjugate is CKKS only")?;
        let g = conjugation_elt(self.context.poly_modulus_degree());
        self.apply_galois_inplace(encrypted, g, galois_keys)
    }

    pub fn complex_conjugate(&self, encrypted: &Ciphertext, galois_keys: &GaloisKeys) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.complex_conjugate_inplace(&mut out, galois_keys)?;
        Ok(out)
    }

    /// Rotate both BFV rows left by `step` (right for negative `step`).
    pub fn rotate_rows_inplace(&self, encrypted: &mut Ciphertext, step: i64, galois_keys: &GaloisKeys) -> Result<()> {
        self.require(SchemeType::Bfv, "rotate_rows is BFV only; use rotate_vector for CKKS")?;
        self.rotate_internal(encrypted, step, galois_keys)
    }

    pub fn rotate_rows(&self, encrypted: &Ciphertext, step: i64, galois_keys: &GaloisKeys) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.rotate_rows_inplace(&mut out, step, galois_keys)?;
        Ok(out)
    }

    /// Swap the two BFV rows.
    pub fn rotate_columns_inplace(&self, encrypted: &mut Ciphertext, galois_keys: &GaloisKeys) -> Result<()> {
        self.require(SchemeType::Bfv, "rotate_columns is BFV only")?;
        let g = conjugation_elt(self.context.poly_modulus_degree());
        self.apply_galois_inplace(encrypted, g, galois_keys)
    }

    pub fn rotate_columns(&self, encrypted: &Ciphertext, galois_keys: &GaloisKeys) -> Result<Ciphertext> {
        let mut out = encrypted.clone();
        self.rotate_columns_inplace(&mut out, galois_keys)?;
        Ok(out)
    }
}
