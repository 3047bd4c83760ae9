//! Galois automorphisms σ_g: X ↦ X^g of Z[X]/(X^N + 1), for odd g < 2N.
//!
//! Slots are indexed by powers of the generator 5: slot i of a CKKS
//! plaintext (and column i of either BFV row) sits at the root ζ^{5^i}.
//! Hence σ_{5^k} rotates slots left by k, and σ_{2N-1} maps every root to
//! its conjugate (CKKS complex conjugation, BFV row swap).
//!
//! In the NTT domain an automorphism is a pure permutation of evaluation
//! points, which is how ciphertexts are rotated here.

use std::collections::BTreeSet;

use crate::error::{HeError, Result};
use crate::modulus::bit_reverse;

/// Generator of the rotation group.
pub const GALOIS_GENERATOR: u64 = 5;

/// Galois element of complex conjugation / BFV column rotation.
pub fn conjugation_elt(n: usize) -> u64 {
    2 * n as u64 - 1
}

/// Whether `g` is an automorphism of the degree-`n` ring.
pub fn is_valid_galois_elt(galois_elt: u64, n: usize) -> bool {
    galois_elt % 2 == 1 && galois_elt < 2 * n as u64
}

/// Galois element rotating the N/2 slots of a row left by `step`
/// (right for negative `step`).
pub fn galois_elt_from_step(step: i64, n: usize) -> Result<u64> {
    let row_size = (n / 2) as i64;
    if step == 0 {
        return Err(HeError::InvalidKeyRequest("rotation step 0 is the identity".into()));
    }
    if step.unsigned_abs() >= row_size as u64 {
        return Err(HeError::InvalidKeyRequest(format!(
            "rotation step {step} is out of range for {row_size} slots"
        )));
    }
    let k = step.rem_euclid(row_size) as u64;
    let two_n = 2 * n as u64;
    let mut g = 1u64;
    for _ in 0..k {
        g = g * GALOIS_GENERATOR % two_n;
    }
    Ok(g)
}

/// Galois elements for a list of steps.
pub fn galois_elts_from_steps(steps: &[i64], n: usize) -> Result<Vec<u64>> {
    steps.iter().map(|&s| galois_elt_from_step(s, n)).collect()
}

/// Default key set: rotations by ±2^i for every power of two below N/2,
/// plus conjugation.
pub fn default_galois_elts(n: usize) -> Vec<u64> {
    let row_size = n / 2;
    let two_n = 2 * n as u64;
    let mut elts = BTreeSet::new();
    let mut pos = GALOIS_GENERATOR;
    let mut step = 1;
    while step < row_size {
        elts.insert(pos);
        // 5^{-step} = 5^{row_size - step}, i.e. the inverse element.
        elts.insert(inverse_elt(pos, two_n));
        pos = pos * pos % two_n;
        step <<= 1;
    }
    elts.insert(conjugation_elt(n));
    elts.into_iter().collect()
}

fn inverse_elt(g: u64, two_n: u64) -> u64 {
    // Direct search; only runs at key generation.
    let mut x = g;
    loop {
        let next = x * g % two_n;
        if next == 1 {
            return x;
        }
        x = next;
    }
}

/// Signed power-of-two decomposition (non-adjacent form) of a rotation step.
///
/// Terms equal to ±N/2 (the identity rotation) are dropped.
pub fn naf_steps(step: i64, n: usize) -> Vec<i64> {
    let row_size = (n / 2) as i64;
    let mut k = step;
    let mut terms = Vec::new();
    let mut i = 0u32;
    while k != 0 {
        if k & 1 == 1 {
            let z = 2 - k.rem_euclid(4);
            k -= z;
            let term = z << i;
            if term.abs() % row_size != 0 {
                terms.push(term);
            }
        }
        k >>= 1;
        i += 1;
    }
    terms
}

/// Index permutation of σ_g on NTT-form values: out[k] = in[perm[k]].
pub fn ntt_permutation(galois_elt: u64, n: usize) -> Vec<usize> {
    let log_n = n.trailing_zeros();
    let mask = 2 * n as u64 - 1;
    (0..n)
        .map(|k| {
            let exponent = 2 * bit_reverse(k, log_n) as u64 + 1;
            let image = (exponent * galois_elt) & mask;
            bit_reverse(((image - 1) >> 1) as usize, log_n)
        })
        .collect()
}

/// Apply a precomputed permutation to one limb.
pub fn permute(values: &[u64], perm: &[usize]) -> Vec<u64> {
    perm.iter().map(|&src| values[src]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::Modulus;
    use crate::ntt::{ntt_forward, NttTables};
    use crate::params::CoeffModulus;

    fn apply_galois_coeffs(input: &[u64], g: u64, m: &Modulus) -> Vec<u64> {
        let n = input.len();
        let mut out = vec![0u64; n];
        for (i, &c) in input.iter().enumerate() {
            let idx = (i as u64 * g) % (2 * n as u64);
            if idx < n as u64 {
                out[idx as usize] = m.add(out[idx as usize], c);
            } else {
                let j = (idx - n as u64) as usize;
                out[j] = m.sub(out[j], c);
            }
        }
        out
    }

    #[test]
    fn test_ntt_permutation_matches_coefficient_automorphism() {
        let n = 32;
        let m = CoeffModulus::create(n, &[30]).unwrap()[0];
        let tables = NttTables::new(n, m).unwrap();
        let poly: Vec<u64> = (0..n as u64).map(|i| (i * i + 11) % m.value).collect();

        for g in [5u64, 25, 13, conjugation_elt(n)] {
            let mut expected = apply_galois_coeffs(&poly, g, &m);
            ntt_forward(&mut expected, &tables);

            let mut a = poly.clone();
            ntt_forward(&mut a, &tables);
            let permuted = permute(&a, &ntt_permutation(g, n));
            assert_eq!(permuted, expected, "automorphism {g} mismatch");
        }
    }

    #[test]
    fn test_elt_from_step() {
        let n = 16;
        assert_eq!(galois_elt_from_step(1, n).unwrap(), 5);
        assert_eq!(galois_elt_from_step(2, n).unwrap(), 25);
        // -1 = 7 steps left in a row of 8; 5^7 mod 32 = 13.
        assert_eq!(galois_elt_from_step(-1, n).unwrap(), 13);
        assert!(matches!(galois_elt_from_step(0, n), Err(HeError::InvalidKeyRequest(_))));
        assert!(matches!(galois_elt_from_step(8, n), Err(HeError::InvalidKeyRequest(_))));
        assert!(matches!(galois_elt_from_step(-9, n), Err(HeError::InvalidKeyRequest(_))));
    }

    #[test]
    fn test_default_elts() {
        let n = 16;
        let elts = default_galois_elts(n);
        for step in [1i64, 2, 4, -1, -2, -4] {
            let g = galois_elt_from_step(step, n).unwrap();
            assert!(elts.contains(&g), "missing key for step {step}");
        }
        assert!(elts.contains(&31));
        assert!(elts.iter().all(|&g| is_valid_galois_elt(g, n)));
    }

    #[test]
    fn test_naf() {
        let n = 1 << 13;
        for step in [1i64, 3, 7, -7, 11, 100, -1000, 4095, -4095] {
            let terms = naf_steps(step, n);
            let sum: i64 = terms.iter().sum();
            assert_eq!(sum.rem_euclid(4096), step.rem_euclid(4096), "NAF of {step}: {terms:?}");
            for t in &terms {
                assert_eq!(t.unsigned_abs().count_ones(), 1);
                assert!(t.unsigned_abs() < 4096);
            }
        }
        assert_eq!(naf_steps(7, n), vec![-1, 8]);
    }
}
