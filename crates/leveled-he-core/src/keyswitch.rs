//! Key switching with base-2^w digit decomposition and one special prime.
//!
//! Given d (NTT form at a level with modulus Q_l) and a key-switching key
//! from s' to s, produce (u0, u1) with u0 + u1·s ≈ d·s' (mod Q_l):
//!
//! 1. Lift d to integers in [0, Q_l) and cut each coefficient into
//!    w-bit digits d_i, so d = Σ d_i · 2^{w·i}.
//! 2. Accumulate Σ d_i · key_i over the level primes and P.
//! 3. Divide by P with rounding, dropping the special limb.
//!
//! The digit count adapts to the level: lower levels use fewer digits.

use std::sync::Arc;

use log::trace;
use num_bigint::BigUint;
use rayon::prelude::*;

use crate::context::{Context, ContextData};
use crate::error::{HeError, Result};
use crate::keys::KeySwitchingKey;
use crate::modulus::Modulus;
use crate::ntt::NttTables;
use crate::rns::RnsPoly;

/// Bits [offset, offset + width) of a little-endian word array.
fn extract_bits(words: &[u64], offset: usize, width: usize) -> u64 {
    let word = offset / 64;
    let shift = offset % 64;
    if word >= words.len() {
        return 0;
    }
    let mut value = words[word] >> shift;
    if shift + width > 64 && word + 1 < words.len() {
        value |= words[word + 1] << (64 - shift);
    }
    if width < 64 {
        value &= (1u64 << width) - 1;
    }
    value
}

/// Limbs of a key polynomial restricted to the first `count` primes plus P.
fn restrict(poly: &RnsPoly, count: usize) -> RnsPoly {
    let mut limbs: Vec<Vec<u64>> = poly.limbs[..count].to_vec();
    if let Some(last) = poly.limbs.last() {
        limbs.push(last.clone());
    }
    RnsPoly { limbs, n: poly.n }
}

/// Switch `target` (NTT form at `level`) under `key`; returns (u0, u1) in
/// NTT form at the same level.
pub(crate) fn switch_key(
    context: &Context,
    level: &ContextData,
    target: &RnsPoly,
    key: &KeySwitchingKey,
) -> Result<(RnsPoly, RnsPoly)> {
    let n = context.poly_modulus_degree();
    let count = level.moduli().len();
    let w = context.key_switching_config().decomposition_bits as usize;
    let digits = context
        .key_switching_config()
        .digit_count(level.total_coeff_modulus_bits());
    if digits > key.digit_count() {
        return Err(HeError::ParameterMismatch(format!(
            "key-switching key has {} digits, level needs {digits}",
            key.digit_count()
        )));
    }
    trace!("key switch at chain index {} with {digits} digits", level.chain_index());

    let mut ext_moduli: Vec<Modulus> = level.moduli().to_vec();
    ext_moduli.push(context.special_modulus());
    let mut ext_tables: Vec<Arc<NttTables>> = level.ntt_tables().to_vec();
    ext_tables.push(Arc::clone(context.special_ntt_tables()));

    let mut coeffs = target.clone();
    coeffs.ntt_inverse(level.ntt_tables());
    let words: Vec<Vec<u64>> = level
        .base()
        .compose_poly(&coeffs)
        .par_iter()
        .map(BigUint::to_u64_digits)
        .collect();

    let mut acc0 = RnsPoly::zero(n, count + 1);
    let mut acc1 = RnsPoly::zero(n, count + 1);
    for (i, (k0, k1)) in key.digits.iter().take(digits).enumerate() {
        let offset = i * w;
        let limbs = ext_moduli
            .par_iter()
            .map(|m| {
                words
                    .iter()
                    .map(|x| m.reduce(extract_bits(x, offset, w)))
                    .collect()
            })
            .collect();
        let mut digit = RnsPoly { limbs, n };
        digit.ntt_forward(&ext_tables);

        acc0.add_product_assign(&digit, &restrict(k0, count), &ext_moduli);
        acc1.add_product_assign(&digit, &restrict(k1, count), &ext_moduli);
    }

    acc0.divide_and_round_by_last(&ext_moduli, &ext_tables);
    acc1.divide_and_round_by_last(&ext_moduli, &ext_tables);
    Ok((acc0, acc1))
}
