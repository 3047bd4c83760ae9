//! Word-sized prime moduli and the modular arithmetic every RNS limb runs on.
//!
//! Reduction is Barrett throughout: each [`Modulus`] carries `floor(2^128 / q)`
//! split into two words, and general products are reduced with a 128-bit
//! Barrett step. Multiplications by a fixed operand (NTT twiddles, per-prime
//! constants) use the Shoup variant of the same idea with a precomputed
//! `floor(w * 2^64 / q)`.

use serde::{Deserialize, Serialize};

/// A single RNS modulus with pre-computed Barrett constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modulus {
    /// The prime modulus q_i.
    pub value: u64,
    /// Bit width of this modulus.
    pub bits: u32,
    /// High word of floor(2^128 / q_i).
    pub barrett_hi: u64,
    /// Low word of floor(2^128 / q_i).
    pub barrett_lo: u64,
}

impl Modulus {
    /// Largest supported modulus width. Lazy sums of two residues must not
    /// overflow a u64, and the Barrett estimate needs two spare bits.
    pub const MAX_BITS: u32 = 61;

    /// Create a modulus with pre-computed Barrett constant.
    ///
    /// `value` must be at least 2 and at most [`Modulus::MAX_BITS`] bits.
    /// Callers validate this before construction.
    pub const fn new(value: u64) -> Self {
        let full = u128::MAX / (value as u128);
        Self {
            value,
            bits: 64 - value.leading_zeros(),
            barrett_hi: (full >> 64) as u64,
            barrett_lo: full as u64,
        }
    }

    /// Reduce an arbitrary 128-bit value to [0, q).
    #[inline(always)]
    pub fn reduce_u128(&self, x: u128) -> u64 {
        let x_lo = x as u64;
        let x_hi = (x >> 64) as u64;

        // (x * floor(2^128 / q)) >> 128, dropping the lowest partial product.
        let carry = ((x_lo as u128 * self.barrett_lo as u128) >> 64) as u64;
        let t = x_lo as u128 * self.barrett_hi as u128;
        let (t_lo, c1) = (t as u64).overflowing_add(carry);
        let t_hi = ((t >> 64) as u64).wrapping_add(c1 as u64);

        let t = x_hi as u128 * self.barrett_lo as u128;
        let (_, c2) = t_lo.overflowing_add(t as u64);
        let carry = ((t >> 64) as u64).wrapping_add(c2 as u64);

        let quot = x_hi
            .wrapping_mul(self.barrett_hi)
            .wrapping_add(t_hi)
            .wrapping_add(carry);

        let mut r = x_lo.wrapping_sub(quot.wrapping_mul(self.value));
        if r >= self.value {
            r -= self.value;
        }
        if r >= self.value {
            r -= self.value;
        }
        debug_assert!(r < self.value);
        r
    }

    /// Reduce a u64 to [0, q).
    #[inline(always)]
    pub fn reduce(&self, a: u64) -> u64 {
        if a < self.value {
            a
        } else {
            self.reduce_u128(a as u128)
        }
    }

    /// Map a signed integer to its residue in [0, q).
    #[inline(always)]
    pub fn reduce_i64(&self, a: i64) -> u64 {
        if a >= 0 {
            self.reduce(a as u64)
        } else {
            self.neg(self.reduce(a.unsigned_abs()))
        }
    }

    /// Lift a residue to the centered interval (-q/2, q/2].
    #[inline(always)]
    pub fn center(&self, a: u64) -> i64 {
        if a > self.value >> 1 {
            -((self.value - a) as i64)
        } else {
            a as i64
        }
    }

    /// (a + b) mod q. Assumes a, b < q.
    #[inline(always)]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        let sum = a + b;
        if sum >= self.value {
            sum - self.value
        } else {
            sum
        }
    }

    /// (a - b) mod q. Assumes a, b < q.
    #[inline(always)]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            self.value - b + a
        }
    }

    /// -a mod q. Assumes a < q.
    #[inline(always)]
    pub fn neg(&self, a: u64) -> u64 {
        if a == 0 {
            0
        } else {
            self.value - a
        }
    }

    /// (a * b) mod q via Barrett reduction.
    #[inline(always)]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        self.reduce_u128(a as u128 * b as u128)
    }

    /// Shoup companion of a fixed multiplicand: floor(w * 2^64 / q).
    #[inline]
    pub fn shoup(&self, w: u64) -> u64 {
        (((w as u128) << 64) / self.value as u128) as u64
    }

    /// (x * w) mod q for a fixed `w` with companion `w_shoup = self.shoup(w)`.
    #[inline(always)]
    pub fn mul_shoup(&self, x: u64, w: u64, w_shoup: u64) -> u64 {
        let quot = ((x as u128 * w_shoup as u128) >> 64) as u64;
        let r = x.wrapping_mul(w).wrapping_sub(quot.wrapping_mul(self.value));
        if r >= self.value {
            r - self.value
        } else {
            r
        }
    }

    /// base^exp mod q.
    pub fn pow(&self, base: u64, mut exp: u64) -> u64 {
        let mut result = self.reduce(1);
        let mut base = self.reduce(base);
        while exp > 0 {
            if exp & 1 == 1 {
                result = self.mul(result, base);
            }
            exp >>= 1;
            base = self.mul(base, base);
        }
        result
    }

    /// Multiplicative inverse via Fermat's little theorem; `None` for zero.
    /// Requires q prime.
    pub fn inv(&self, a: u64) -> Option<u64> {
        let a = self.reduce(a);
        if a == 0 {
            None
        } else {
            Some(self.pow(a, self.value - 2))
        }
    }
}

/// Deterministic Miller-Rabin for the full u64 range.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mul = |a: u64, b: u64| ((a as u128 * b as u128) % n as u128) as u64;
    let pow = |mut base: u64, mut exp: u64| {
        let mut r = 1u64;
        while exp > 0 {
            if exp & 1 == 1 {
                r = mul(r, base);
            }
            base = mul(base, base);
            exp >>= 1;
        }
        r
    };

    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;
    'witness: for &a in &WITNESSES {
        let mut x = pow(a, d);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul(x, x);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Find a primitive 2N-th root of unity modulo q (ψ^N ≡ -1).
///
/// Returns `None` unless q ≡ 1 (mod 2N). The smallest such root is chosen so
/// that tables are reproducible across runs.
pub fn primitive_root(n: usize, modulus: &Modulus) -> Option<u64> {
    let q = modulus.value;
    let two_n = 2 * n as u64;
    if q % two_n != 1 {
        return None;
    }
    let exponent = (q - 1) / two_n;
    let mut best: Option<u64> = None;
    for g in 2..q.min(1 << 16) {
        let psi = modulus.pow(g, exponent);
        if modulus.pow(psi, n as u64) == q - 1 {
            // Every primitive root is psi^k for odd k; take the minimal one.
            let psi_sq = modulus.mul(psi, psi);
            let mut cur = psi;
            let mut min = psi;
            for _ in 0..n {
                cur = modulus.mul(cur, psi_sq);
                if cur < min {
                    min = cur;
                }
            }
            best = Some(min);
            break;
        }
    }
    best
}

/// Bit-reverse the low `bits` bits of `x`.
#[inline]
pub fn bit_reverse(x: usize, bits: u32) -> usize {
    if bits == 0 {
        0
    } else {
        x.reverse_bits() >> (usize::BITS - bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::HeRng;
    use rand::Rng;

    #[test]
    fn test_mod_add_sub() {
        let m = Modulus::new(17);
        assert_eq!(m.add(5, 7), 12);
        assert_eq!(m.add(10, 10), 3);
        assert_eq!(m.add(16, 1), 0);
        assert_eq!(m.sub(10, 3), 7);
        assert_eq!(m.sub(3, 10), 10);
        assert_eq!(m.neg(0), 0);
        assert_eq!(m.neg(5), 12);
    }

    #[test]
    fn test_barrett_matches_u128_remainder() {
        let mut rng = HeRng::from_seed(7);
        for q in [17u64, 65537, 1099511480321, 1152921504606830593, (1 << 61) - 1] {
            let m = Modulus::new(q);
            for _ in 0..2000 {
                let a = rng.gen_range(0..q);
                let b = rng.gen_range(0..q);
                assert_eq!(m.mul(a, b), ((a as u128 * b as u128) % q as u128) as u64);
                let x: u128 = rng.gen();
                assert_eq!(m.reduce_u128(x), (x % q as u128) as u64);
            }
        }
    }

    #[test]
    fn test_shoup_matches_barrett() {
        let mut rng = HeRng::from_seed(11);
        let m = Modulus::new(1152921504606830593);
        for _ in 0..1000 {
            let w = rng.gen_range(0..m.value);
            let ws = m.shoup(w);
            let x = rng.gen_range(0..m.value);
            assert_eq!(m.mul_shoup(x, w, ws), m.mul(x, w));
        }
    }

    #[test]
    fn test_signed_reduction_and_centering() {
        let m = Modulus::new(97);
        assert_eq!(m.reduce_i64(-1), 96);
        assert_eq!(m.reduce_i64(-97), 0);
        assert_eq!(m.reduce_i64(200), 6);
        assert_eq!(m.center(96), -1);
        assert_eq!(m.center(48), 48);
        assert_eq!(m.center(49), -48);
    }

    #[test]
    fn test_pow_and_inverse() {
        let m = Modulus::new(17);
        assert_eq!(m.pow(2, 0), 1);
        assert_eq!(m.pow(2, 4), 16);
        assert_eq!(m.pow(3, 16), 1);
        for a in 1..17 {
            let inv = m.inv(a).unwrap();
            assert_eq!(m.mul(a, inv), 1, "inverse of {a} mod 17 failed");
        }
        assert_eq!(m.inv(0), None);
    }

    #[test]
    fn test_miller_rabin() {
        assert!(is_prime(2));
        assert!(is_prime(97));
        assert!(is_prime(1152921504606846883)); // 2^60 - 93
        assert!(!is_prime(1));
        assert!(!is_prime(561)); // Carmichael
        assert!(!is_prime(1152921504606846976));
        assert!(!is_prime(3_215_031_751)); // strong pseudoprime to bases 2,3,5,7
    }

    #[test]
    fn test_primitive_root() {
        let m = Modulus::new(17);
        let psi = primitive_root(4, &m).unwrap();
        assert_eq!(m.pow(psi, 8), 1);
        assert_eq!(m.pow(psi, 4), 16);
        assert!(primitive_root(16, &m).is_none());
    }

    #[test]
    fn test_bit_reverse() {
        assert_eq!(bit_reverse(0b0000, 4), 0b0000);
        assert_eq!(bit_reverse(0b0001, 4), 0b1000);
        assert_eq!(bit_reverse(0b0110, 4), 0b0110);
        assert_eq!(bit_reverse(0b1010, 4), 0b0101);
    }
}
