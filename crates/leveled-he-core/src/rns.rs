//! Residue Number System (RNS) polynomials and base conversion.
//!
//! A ring element modulo Q = q_0 · q_1 · ... · q_{L-1} is stored as L
//! independent coefficient vectors, one per prime. Element-wise operations
//! run limb-parallel with rayon; nothing crosses limbs except
//! [`RnsPoly::divide_and_round_by_last`] and the CRT routines of [`RnsBase`].

use std::sync::Arc;

use num_bigint::{BigInt, BigUint, Sign};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{HeError, Result};
use crate::modulus::Modulus;
use crate::ntt::{ntt_forward, ntt_inverse, NttTables};

/// An RNS polynomial: L independent coefficient vectors, one per modulus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnsPoly {
    /// Coefficients for each RNS limb: limbs[l][i] = coefficient i mod q_l.
    pub limbs: Vec<Vec<u64>>,
    /// Polynomial degree N.
    pub n: usize,
}

impl RnsPoly {
    /// Create a zero polynomial with L limbs of N coefficients each.
    pub fn zero(n: usize, num_limbs: usize) -> Self {
        Self {
            limbs: vec![vec![0u64; n]; num_limbs],
            n,
        }
    }

    /// Reduce small signed coefficients into every limb.
    pub fn from_signed(coeffs: &[i64], moduli: &[Modulus]) -> Self {
        let limbs = moduli
            .par_iter()
            .map(|m| coeffs.iter().map(|&c| m.reduce_i64(c)).collect())
            .collect();
        Self {
            limbs,
            n: coeffs.len(),
        }
    }

    pub fn num_limbs(&self) -> usize {
        self.limbs.len()
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|l| l.iter().all(|&c| c == 0))
    }

    /// In-place element-wise addition.
    pub fn add_assign(&mut self, other: &Self, moduli: &[Modulus]) {
        debug_assert_eq!(self.n, other.n);
        self.limbs
            .par_iter_mut()
            .zip(other.limbs.par_iter())
            .zip(moduli.par_iter())
            .for_each(|((a, b), m)| {
                for (x, &y) in a.iter_mut().zip(b) {
                    *x = m.add(*x, y);
                }
            });
    }

    /// In-place element-wise subtraction.
    pub fn sub_assign(&mut self, other: &Self, moduli: &[Modulus]) {
        debug_assert_eq!(self.n, other.n);
        self.limbs
            .par_iter_mut()
            .zip(other.limbs.par_iter())
            .zip(moduli.par_iter())
            .for_each(|((a, b), m)| {
                for (x, &y) in a.iter_mut().zip(b) {
                    *x = m.sub(*x, y);
                }
            });
    }

    /// In-place element-wise (Hadamard) product. Used for NTT-domain products.
    pub fn mul_assign(&mut self, other: &Self, moduli: &[Modulus]) {
        debug_assert_eq!(self.n, other.n);
        self.limbs
            .par_iter_mut()
            .zip(other.limbs.par_iter())
            .zip(moduli.par_iter())
            .for_each(|((a, b), m)| {
                for (x, &y) in a.iter_mut().zip(b) {
                    *x = m.mul(*x, y);
                }
            });
    }

    /// self += a ⊙ b, limb by limb.
    pub fn add_product_assign(&mut self, a: &Self, b: &Self, moduli: &[Modulus]) {
        self.limbs
            .par_iter_mut()
            .zip(a.limbs.par_iter())
            .zip(b.limbs.par_iter())
            .zip(moduli.par_iter())
            .for_each(|(((acc, x), y), m)| {
                for ((r, &u), &v) in acc.iter_mut().zip(x).zip(y) {
                    *r = m.add(*r, m.mul(u, v));
                }
            });
    }

    /// In-place negation.
    pub fn negate_assign(&mut self, moduli: &[Modulus]) {
        self.limbs
            .par_iter_mut()
            .zip(moduli.par_iter())
            .for_each(|(a, m)| {
                for x in a.iter_mut() {
                    *x = m.neg(*x);
                }
            });
    }

    /// Multiply limb l by `scalars[l]`.
    pub fn mul_scalar_assign(&mut self, scalars: &[u64], moduli: &[Modulus]) {
        self.limbs
            .par_iter_mut()
            .zip(scalars.par_iter())
            .zip(moduli.par_iter())
            .for_each(|((a, &s), m)| {
                let s_shoup = m.shoup(s);
                for x in a.iter_mut() {
                    *x = m.mul_shoup(*x, s, s_shoup);
                }
            });
    }

    /// Element-wise addition of two RNS polynomials.
    pub fn add(&self, other: &Self, moduli: &[Modulus]) -> Self {
        let mut result = self.clone();
        result.add_assign(other, moduli);
        result
    }

    /// Element-wise subtraction of two RNS polynomials.
    pub fn sub(&self, other: &Self, moduli: &[Modulus]) -> Self {
        let mut result = self.clone();
        result.sub_assign(other, moduli);
        result
    }

    /// Element-wise (Hadamard) multiplication.
    pub fn hadamard_mul(&self, other: &Self, moduli: &[Modulus]) -> Self {
        let mut result = self.clone();
        result.mul_assign(other, moduli);
        result
    }

    /// Negate all coefficients: result[i] = -self[i] mod q.
    pub fn negate(&self, moduli: &[Modulus]) -> Self {
        let mut result = self.clone();
        result.negate_assign(moduli);
        result
    }

    /// Forward NTT on every limb.
    pub fn ntt_forward(&mut self, tables: &[Arc<NttTables>]) {
        self.limbs
            .par_iter_mut()
            .zip(tables.par_iter())
            .for_each(|(a, t)| ntt_forward(a, t));
    }

    /// Inverse NTT on every limb.
    pub fn ntt_inverse(&mut self, tables: &[Arc<NttTables>]) {
        self.limbs
            .par_iter_mut()
            .zip(tables.par_iter())
            .for_each(|(a, t)| ntt_inverse(a, t));
    }

    /// Keep only the first `num_limbs` limbs.
    pub fn truncate(&mut self, num_limbs: usize) {
        self.limbs.truncate(num_limbs);
    }

    /// Copy of the first `num_limbs` limbs (an element of a lower level).
    pub fn leading_limbs(&self, num_limbs: usize) -> Self {
        Self {
            limbs: self.limbs[..num_limbs].to_vec(),
            n: self.n,
        }
    }

    /// Replace an NTT-form polynomial over q_0..q_{L-1} by round(a / q_{L-1})
    /// over q_0..q_{L-2}, still in NTT form.
    ///
    /// Only the last limb leaves the NTT domain; the correction term for each
    /// remaining prime is transformed back individually.
    pub fn divide_and_round_by_last(&mut self, moduli: &[Modulus], tables: &[Arc<NttTables>]) {
        let count = self.limbs.len();
        debug_assert!(count >= 2 && moduli.len() >= count && tables.len() >= count);
        let Some(mut last) = self.limbs.pop() else {
            return;
        };
        let q_last = moduli[count - 1];
        ntt_inverse(&mut last, &tables[count - 1]);

        // Shift by q_last/2 so the floor below becomes rounding.
        let half = q_last.value >> 1;
        for x in last.iter_mut() {
            *x = q_last.add(*x, half);
        }

        self.limbs
            .par_iter_mut()
            .zip(moduli[..count - 1].par_iter())
            .zip(tables[..count - 1].par_iter())
            .for_each(|((limb, m), t)| {
                let half_mod = m.reduce(half);
                let mut correction: Vec<u64> =
                    last.iter().map(|&x| m.sub(m.reduce(x), half_mod)).collect();
                ntt_forward(&mut correction, t);
                let inv = m.inv(m.reduce(q_last.value)).unwrap_or(0);
                let inv_shoup = m.shoup(inv);
                for (x, &c) in limb.iter_mut().zip(&correction) {
                    *x = m.mul_shoup(m.sub(*x, c), inv, inv_shoup);
                }
            });
    }
}

/// A CRT basis: a set of coprime moduli with the constants needed to move a
/// residue vector to and from the integers modulo their product.
#[derive(Debug, Clone)]
pub struct RnsBase {
    moduli: Vec<Modulus>,
    product: BigUint,
    half_product: BigUint,
    /// Q / q_i.
    punctured: Vec<BigUint>,
    /// (Q / q_i)^{-1} mod q_i.
    inv_punctured: Vec<u64>,
}

impl RnsBase {
    pub fn new(moduli: &[Modulus]) -> Result<Self> {
        if moduli.is_empty() {
            return Err(HeError::InvalidParameters("empty RNS base".into()));
        }
        let product = moduli
            .iter()
            .fold(BigUint::from(1u64), |acc, m| acc * m.value);
        let mut punctured = Vec::with_capacity(moduli.len());
        let mut inv_punctured = Vec::with_capacity(moduli.len());
        for m in moduli {
            let p = &product / m.value;
            let p_mod = reduce_biguint(&p, m);
            let inv = m.inv(p_mod).ok_or_else(|| {
                HeError::InvalidParameters(format!("RNS base modulus {} is not coprime", m.value))
            })?;
            punctured.push(p);
            inv_punctured.push(inv);
        }
        let half_product = &product >> 1u32;
        Ok(Self {
            moduli: moduli.to_vec(),
            product,
            half_product,
            punctured,
            inv_punctured,
        })
    }

    pub fn moduli(&self) -> &[Modulus] {
        &self.moduli
    }

    pub fn len(&self) -> usize {
        self.moduli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moduli.is_empty()
    }

    /// Product of all moduli.
    pub fn product(&self) -> &BigUint {
        &self.product
    }

    /// Reconstruct the integer in [0, Q) with the given residues.
    pub fn compose(&self, residues: &[u64]) -> BigUint {
        debug_assert_eq!(residues.len(), self.moduli.len());
        let mut acc = BigUint::default();
        for (i, (&r, m)) in residues.iter().zip(&self.moduli).enumerate() {
            let x = m.mul(r, self.inv_punctured[i]);
            if x != 0 {
                acc += &self.punctured[i] * x;
            }
        }
        acc % &self.product
    }

    /// Reconstruct the integer in (-Q/2, Q/2] with the given residues.
    pub fn compose_centered(&self, residues: &[u64]) -> BigInt {
        let x = self.compose(residues);
        if x > self.half_product {
            BigInt::from_biguint(Sign::Minus, &self.product - x)
        } else {
            BigInt::from_biguint(Sign::Plus, x)
        }
    }

    /// Residues of a non-negative integer.
    pub fn decompose(&self, value: &BigUint) -> Vec<u64> {
        self.moduli.iter().map(|m| reduce_biguint(value, m)).collect()
    }

    /// Residues of a signed integer.
    pub fn decompose_signed(&self, value: &BigInt) -> Vec<u64> {
        self.moduli.iter().map(|m| reduce_bigint(value, m)).collect()
    }

    /// Residues of signed coefficients, one limb per modulus.
    pub fn decompose_poly_signed(&self, values: &[BigInt]) -> RnsPoly {
        let limbs = self
            .moduli
            .par_iter()
            .map(|m| values.iter().map(|v| reduce_bigint(v, m)).collect())
            .collect();
        RnsPoly {
            limbs,
            n: values.len(),
        }
    }

    /// CRT-compose every coefficient of a coefficient-form polynomial.
    pub fn compose_poly(&self, poly: &RnsPoly) -> Vec<BigUint> {
        (0..poly.n)
            .into_par_iter()
            .map(|j| {
                let residues: Vec<u64> = poly.limbs.iter().map(|l| l[j]).collect();
                self.compose(&residues)
            })
            .collect()
    }

    /// Centered CRT composition of every coefficient.
    pub fn compose_poly_centered(&self, poly: &RnsPoly) -> Vec<BigInt> {
        (0..poly.n)
            .into_par_iter()
            .map(|j| {
                let residues: Vec<u64> = poly.limbs.iter().map(|l| l[j]).collect();
                self.compose_centered(&residues)
            })
            .collect()
    }
}

/// Signed value mod q, in [0, q).
pub fn reduce_bigint(value: &BigInt, m: &Modulus) -> u64 {
    let r = reduce_biguint(value.magnitude(), m);
    if value.sign() == Sign::Minus {
        m.neg(r)
    } else {
        r
    }
}

/// value mod q, folding 64-bit words from the most significant end.
pub fn reduce_biguint(value: &BigUint, m: &Modulus) -> u64 {
    value.iter_u64_digits().rev().fold(0u64, |r, d| {
        m.reduce_u128(((r as u128) << 64) | d as u128)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CoeffModulus;
    use crate::rng::HeRng;

    fn tables_for(n: usize, moduli: &[Modulus]) -> Vec<Arc<NttTables>> {
        moduli
            .iter()
            .map(|&m| Arc::new(NttTables::new(n, m).unwrap()))
            .collect()
    }

    #[test]
    fn test_rns_poly_add_sub() {
        let moduli = CoeffModulus::create(16, &[30, 30]).unwrap();
        let n = 4;

        let mut a = RnsPoly::zero(n, 2);
        let mut b = RnsPoly::zero(n, 2);
        a.limbs[0] = vec![1, 2, 3, 4];
        b.limbs[0] = vec![5, 6, 7, 8];
        a.limbs[1] = vec![10, 20, 30, 40];
        b.limbs[1] = vec![50, 60, 70, 80];

        let c = a.add(&b, &moduli);
        assert_eq!(c.limbs[0], vec![6, 8, 10, 12]);
        assert_eq!(c.limbs[1], vec![60, 80, 100, 120]);

        let d = c.sub(&b, &moduli);
        assert_eq!(d, a);

        let z = a.add(&a.negate(&moduli), &moduli);
        assert!(z.is_zero());
    }

    #[test]
    fn test_from_signed_is_consistent_across_limbs() {
        let moduli = CoeffModulus::create(16, &[40, 50]).unwrap();
        let p = RnsPoly::from_signed(&[-3, 0, 7, -1], &moduli);
        for (l, m) in moduli.iter().enumerate() {
            assert_eq!(p.limbs[l], vec![m.value - 3, 0, 7, m.value - 1]);
        }
    }

    #[test]
    fn test_crt_compose_roundtrip() {
        let moduli = CoeffModulus::create(1024, &[60, 50, 40]).unwrap();
        let base = RnsBase::new(&moduli).unwrap();
        let value = BigUint::parse_bytes(b"123456789012345678901234567890123456789", 10).unwrap();
        let residues = base.decompose(&value);
        assert_eq!(base.compose(&residues), value);

        let neg = BigInt::from(-987654321987654321i64);
        let residues = base.decompose_signed(&neg);
        assert_eq!(base.compose_centered(&residues), neg);
    }

    #[test]
    fn test_divide_and_round_by_last() {
        let n = 64;
        let moduli = CoeffModulus::create(n, &[50, 50, 40]).unwrap();
        let tables = tables_for(n, &moduli);
        let base = RnsBase::new(&moduli).unwrap();
        let lower = RnsBase::new(&moduli[..2]).unwrap();
        let mut rng = HeRng::from_seed(5);

        let mut poly = RnsPoly::zero(n, 3);
        for (limb, m) in poly.limbs.iter_mut().zip(&moduli) {
            for x in limb.iter_mut() {
                *x = rng.range_u64(m.value);
            }
        }
        let expected: Vec<BigInt> = base
            .compose_poly_centered(&poly)
            .into_iter()
            .map(|x| {
                let q = BigInt::from(moduli[2].value);
                let twice = &x * BigInt::from(2) + &q;
                let denom = &q * BigInt::from(2);
                // floor((2x + q) / 2q) = round(x / q)
                let (quot, rem) = (&twice / &denom, &twice % &denom);
                if rem.sign() == Sign::Minus {
                    quot - BigInt::from(1)
                } else {
                    quot
                }
            })
            .collect();

        poly.ntt_forward(&tables);
        poly.divide_and_round_by_last(&moduli, &tables);
        poly.ntt_inverse(&tables[..2]);
        assert_eq!(poly.num_limbs(), 2);

        let q01 = BigInt::from_biguint(Sign::Plus, lower.product().clone());
        for (j, coeff) in lower.compose_poly_centered(&poly).into_iter().enumerate() {
            let diff = (&coeff - &expected[j]) % &q01;
            assert!(
                diff == BigInt::from(0) || diff.magnitude() == q01.magnitude(),
                "coefficient {j}: got {coeff}, expected {}",
                expected[j]
            );
        }
    }

    #[test]
    fn test_reduce_biguint() {
        let m = Modulus::new(1099511480321);
        let v = BigUint::from(u128::MAX);
        assert_eq!(reduce_biguint(&v, &m), (u128::MAX % m.value as u128) as u64);
    }
}
