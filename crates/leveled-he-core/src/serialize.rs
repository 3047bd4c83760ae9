//! Serialization for client-server exchange of keys and ciphertexts.
//!
//! Values are encoded with bincode through their serde derives. Secret keys
//! have no serde implementation and never leave the process.
//!
//! Loading is checked against a [`Context`]: the level id must belong to the
//! context, every polynomial must have the level's limb count and degree,
//! and every coefficient must be below its modulus (Barrett reduction
//! assumes inputs < q).

use serde::Serialize;

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ParmsId};
use crate::error::{HeError, Result};
use crate::galois::is_valid_galois_elt;
use crate::keys::{GaloisKeys, KeySwitchingKey, PublicKey, RelinKeys};
use crate::modulus::Modulus;
use crate::params::SchemeType;
use crate::plaintext::Plaintext;
use crate::rns::RnsPoly;

/// Encode any public value (ciphertext, plaintext, public or evaluation keys).
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn check_poly(poly: &RnsPoly, n: usize, moduli: &[Modulus], what: &str) -> Result<()> {
    if poly.n != n || poly.limbs.len() != moduli.len() || poly.limbs.iter().any(|l| l.len() != n) {
        return Err(HeError::Serialization(format!(
            "{what}: expected {} limbs of {n} coefficients",
            moduli.len()
        )));
    }
    for (l, (limb, m)) in poly.limbs.iter().zip(moduli).enumerate() {
        if let Some(i) = limb.iter().position(|&c| c >= m.value) {
            return Err(HeError::Serialization(format!(
                "{what}: coefficient out of range at limb {l}, index {i}: coeff={} >= q={}",
                limb[i], m.value
            )));
        }
    }
    Ok(())
}

fn check_key_level(context: &Context, parms_id: ParmsId, what: &str) -> Result<()> {
    if parms_id != context.key_parms_id() {
        return Err(HeError::ParameterMismatch(format!(
            "{what} was generated for a different context"
        )));
    }
    Ok(())
}

fn check_switching_key(context: &Context, key: &KeySwitchingKey, what: &str) -> Result<()> {
    if key.digit_count() != context.digit_count() {
        return Err(HeError::Serialization(format!(
            "{what}: expected {} digits, found {}",
            context.digit_count(),
            key.digit_count()
        )));
    }
    let n = context.poly_modulus_degree();
    let moduli = context.key_context_data().moduli();
    for (k0, k1) in &key.digits {
        check_poly(k0, n, moduli, what)?;
        check_poly(k1, n, moduli, what)?;
    }
    Ok(())
}

pub fn load_ciphertext(context: &Context, bytes: &[u8]) -> Result<Ciphertext> {
    let ct: Ciphertext = bincode::deserialize(bytes)?;
    let level = context.data_level(&ct.parms_id)?;
    if ct.size() < 2 {
        return Err(HeError::InvalidCiphertextSize(ct.size()));
    }
    if !ct.scale.is_finite() || ct.scale <= 0.0 {
        return Err(HeError::Serialization(format!("ciphertext scale {} is invalid", ct.scale)));
    }
    for poly in &ct.polys {
        check_poly(poly, context.poly_modulus_degree(), level.moduli(), "ciphertext")?;
    }
    Ok(ct)
}

pub fn load_plaintext(context: &Context, bytes: &[u8]) -> Result<Plaintext> {
    let pt: Plaintext = bincode::deserialize(bytes)?;
    let n = context.poly_modulus_degree();
    match context.scheme() {
        SchemeType::Ckks => {
            if !pt.is_ntt_form || !pt.scale.is_finite() || pt.scale <= 0.0 {
                return Err(HeError::Serialization("not a CKKS plaintext".into()));
            }
            let level = context.data_level(&pt.parms_id)?;
            check_poly(&pt.poly, n, level.moduli(), "plaintext")?;
        }
        SchemeType::Bfv => {
            let t = context
                .plain_modulus()
                .ok_or_else(|| HeError::InvalidParameters("BFV context without plain modulus".into()))?;
            if pt.parms_id != ParmsId::ZERO {
                return Err(HeError::Serialization("BFV plaintext carries a level id".into()));
            }
            check_poly(&pt.poly, n, &[t], "plaintext")?;
            pt.check_bfv(n, &t)?;
        }
    }
    Ok(pt)
}

pub fn load_public_key(context: &Context, bytes: &[u8]) -> Result<PublicKey> {
    let pk: PublicKey = bincode::deserialize(bytes)?;
    check_key_level(context, pk.parms_id, "public key")?;
    let n = context.poly_modulus_degree();
    let moduli = context.key_context_data().moduli();
    check_poly(&pk.c0, n, moduli, "public key")?;
    check_poly(&pk.c1, n, moduli, "public key")?;
    Ok(pk)
}

pub fn load_relin_keys(context: &Context, bytes: &[u8]) -> Result<RelinKeys> {
    let rk: RelinKeys = bincode::deserialize(bytes)?;
    check_key_level(context, rk.parms_id, "relinearization key")?;
    check_switching_key(context, &rk.key, "relinearization key")?;
    Ok(rk)
}

pub fn load_galois_keys(context: &Context, bytes: &[u8]) -> Result<GaloisKeys> {
    let gk: GaloisKeys = bincode::deserialize(bytes)?;
    check_key_level(context, gk.parms_id, "Galois keys")?;
    let n = context.poly_modulus_degree();
    for (&g, key) in &gk.keys {
        if g == 1 || !is_valid_galois_elt(g, n) {
            return Err(HeError::Serialization(format!("invalid Galois element {g}")));
        }
        check_switching_key(context, key, "Galois key")?;
    }
    Ok(gk)
}
