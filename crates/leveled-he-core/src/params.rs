//! Encryption parameters for the leveled engine.
//!
//! An [`EncryptionParameters`] value fixes:
//! - the scheme (CKKS or BFV)
//! - the ring degree N (power of two)
//! - the coefficient modulus chain q_0..q_{L-1}, whose last prime is the
//!   special key-switching prime
//! - the plain modulus t (BFV only)
//! - the security bound on the total modulus bit count
//! - the key-switching digit width
//!
//! Primes are NTT-friendly (q ≡ 1 mod 2N) and found by downward search from
//! 2^bits, so the same request always produces the same chain.

use serde::{Deserialize, Serialize};

use crate::error::{HeError, Result};
use crate::modulus::{is_prime, Modulus};

/// Largest supported ring degree.
pub const MAX_POLY_MODULUS_DEGREE: usize = 65536;

/// Smallest supported ring degree.
pub const MIN_POLY_MODULUS_DEGREE: usize = 4;

/// Largest bit width accepted for a coefficient or plain modulus prime.
pub const MAX_PRIME_BITS: u32 = 60;

/// Which homomorphic scheme a context runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeType {
    /// Approximate arithmetic over encoded real/complex vectors.
    Ckks,
    /// Exact arithmetic modulo a plain modulus t.
    Bfv,
}

impl SchemeType {
    pub(crate) fn tag(self) -> u8 {
        match self {
            SchemeType::Ckks => 1,
            SchemeType::Bfv => 2,
        }
    }
}

/// Bound on the total coefficient modulus size, per the homomorphic
/// encryption security standard (ternary secret, classical attacks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// No bound. For tests and toy parameters only.
    None,
    #[default]
    Tc128,
    Tc192,
    Tc256,
}

/// (log N, max total modulus bits) for each security level.
const TC128_MAX_BITS: [(usize, usize); 6] = [
    (1024, 27),
    (2048, 54),
    (4096, 109),
    (8192, 218),
    (16384, 438),
    (32768, 881),
];
const TC192_MAX_BITS: [(usize, usize); 6] = [
    (1024, 19),
    (2048, 37),
    (4096, 75),
    (8192, 152),
    (16384, 305),
    (32768, 611),
];
const TC256_MAX_BITS: [(usize, usize); 6] = [
    (1024, 14),
    (2048, 29),
    (4096, 58),
    (8192, 118),
    (16384, 237),
    (32768, 476),
];

/// Key-switching digit decomposition.
///
/// Key-switching splits a ring element modulo Q into `digit_count` base-2^w
/// digits, with `w = decomposition_bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySwitchingConfig {
    pub decomposition_bits: u32,
}

impl KeySwitchingConfig {
    pub fn new(decomposition_bits: u32) -> Self {
        Self { decomposition_bits }
    }

    /// Number of digits needed to cover a modulus of `modulus_bits` bits.
    pub fn digit_count(&self, modulus_bits: usize) -> usize {
        let w = self.decomposition_bits as usize;
        modulus_bits.div_ceil(w)
    }
}

/// Complete parameter set handed to [`crate::context::Context::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionParameters {
    pub scheme: SchemeType,
    /// Ring degree N. Must be a power of 2.
    pub poly_modulus_degree: usize,
    /// Modulus chain [q_0, ..., q_{L-1}]; q_{L-1} is the special prime.
    pub coeff_modulus: Vec<Modulus>,
    /// Plain modulus t (BFV only).
    pub plain_modulus: Option<Modulus>,
    pub security_level: SecurityLevel,
    /// Digit width override. Defaults to the special prime's bit length.
    pub key_switching: Option<KeySwitchingConfig>,
}

impl EncryptionParameters {
    pub fn new(scheme: SchemeType, poly_modulus_degree: usize, coeff_modulus: Vec<Modulus>) -> Self {
        Self {
            scheme,
            poly_modulus_degree,
            coeff_modulus,
            plain_modulus: None,
            security_level: SecurityLevel::Tc128,
            key_switching: None,
        }
    }

    pub fn with_plain_modulus(mut self, plain_modulus: Modulus) -> Self {
        self.plain_modulus = Some(plain_modulus);
        self
    }

    pub fn with_security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    pub fn with_decomposition_bits(mut self, bits: u32) -> Self {
        self.key_switching = Some(KeySwitchingConfig::new(bits));
        self
    }

    /// CKKS, N=8192, chain {60, 40, 40, 60}.
    pub fn ckks_n8192() -> Result<Self> {
        let n = 8192;
        Ok(Self::new(SchemeType::Ckks, n, CoeffModulus::create(n, &[60, 40, 40, 60])?))
    }

    /// CKKS, N=16384, chain {60, 50, 50, 50, 50, 60}.
    pub fn ckks_n16384() -> Result<Self> {
        let n = 16384;
        Ok(Self::new(
            SchemeType::Ckks,
            n,
            CoeffModulus::create(n, &[60, 50, 50, 50, 50, 60])?,
        ))
    }

    /// BFV, N=8192, default 128-bit chain, 20-bit batching plain modulus.
    pub fn bfv_n8192() -> Result<Self> {
        let n = 8192;
        Ok(
            Self::new(SchemeType::Bfv, n, CoeffModulus::bfv_default(n, SecurityLevel::Tc128)?)
                .with_plain_modulus(PlainModulus::batching(n, 20)?),
        )
    }

    /// Number of encoding slots: N/2 for CKKS, N for BFV batching.
    pub fn slot_count(&self) -> usize {
        match self.scheme {
            SchemeType::Ckks => self.poly_modulus_degree / 2,
            SchemeType::Bfv => self.poly_modulus_degree,
        }
    }

    /// Sum of the bit lengths of every coefficient prime.
    pub fn total_coeff_modulus_bits(&self) -> usize {
        self.coeff_modulus.iter().map(|m| m.bits as usize).sum()
    }

    /// Effective key-switching configuration.
    pub fn key_switching_config(&self) -> KeySwitchingConfig {
        self.key_switching.unwrap_or_else(|| {
            KeySwitchingConfig::new(self.coeff_modulus.last().map_or(MAX_PRIME_BITS, |m| m.bits))
        })
    }

    /// Check every constraint a context relies on.
    pub fn validate(&self) -> Result<()> {
        let n = self.poly_modulus_degree;
        if !n.is_power_of_two() || !(MIN_POLY_MODULUS_DEGREE..=MAX_POLY_MODULUS_DEGREE).contains(&n) {
            return Err(HeError::InvalidParameters(format!(
                "poly_modulus_degree {n} must be a power of two in [{MIN_POLY_MODULUS_DEGREE}, {MAX_POLY_MODULUS_DEGREE}]"
            )));
        }
        if self.coeff_modulus.len() < 2 {
            return Err(HeError::InvalidParameters(
                "coeff_modulus needs at least one data prime and one special prime".into(),
            ));
        }

        let two_n = 2 * n as u64;
        for (i, m) in self.coeff_modulus.iter().enumerate() {
            if m.value < 2 || m.bits < 2 || m.bits > MAX_PRIME_BITS {
                return Err(HeError::InvalidParameters(format!(
                    "coeff_modulus[{i}] = {} has {} bits, expected 2..={MAX_PRIME_BITS}",
                    m.value, m.bits
                )));
            }
            if *m != Modulus::new(m.value) {
                return Err(HeError::InvalidParameters(format!(
                    "coeff_modulus[{i}] carries inconsistent reduction constants"
                )));
            }
            if !is_prime(m.value) || m.value % two_n != 1 {
                return Err(HeError::InvalidParameters(format!(
                    "coeff_modulus[{i}] = {} is not a prime congruent to 1 mod {two_n}",
                    m.value
                )));
            }
            if self.coeff_modulus[..i].iter().any(|o| o.value == m.value) {
                return Err(HeError::InvalidParameters(format!(
                    "coeff_modulus[{i}] = {} is repeated",
                    m.value
                )));
            }
        }

        let total = self.total_coeff_modulus_bits();
        let max = CoeffModulus::max_bit_count(n, self.security_level);
        if total > max {
            return Err(HeError::InvalidParameters(format!(
                "total coeff_modulus size {total} bits exceeds {max} bits allowed at {:?} for N={n}",
                self.security_level
            )));
        }

        match (self.scheme, self.plain_modulus) {
            (SchemeType::Ckks, Some(_)) => {
                return Err(HeError::InvalidParameters(
                    "CKKS does not use a plain modulus".into(),
                ))
            }
            (SchemeType::Bfv, None) => {
                return Err(HeError::InvalidParameters(
                    "BFV requires a plain modulus".into(),
                ))
            }
            (SchemeType::Bfv, Some(t)) => {
                if t.value < 2 || t.bits > MAX_PRIME_BITS || t != Modulus::new(t.value) {
                    return Err(HeError::InvalidParameters(format!(
                        "plain modulus {} must be in [2, 2^{MAX_PRIME_BITS})",
                        t.value
                    )));
                }
                let data = &self.coeff_modulus[..self.coeff_modulus.len() - 1];
                let data_product = data
                    .iter()
                    .fold(1u128, |acc, q| acc.saturating_mul(q.value as u128));
                if t.value as u128 >= data_product {
                    return Err(HeError::InvalidParameters(format!(
                        "plain modulus {} is not smaller than the data modulus",
                        t.value
                    )));
                }
                if data.iter().any(|q| q.value % t.value == 0) {
                    return Err(HeError::InvalidParameters(format!(
                        "plain modulus {} is not coprime to the coefficient modulus",
                        t.value
                    )));
                }
            }
            (SchemeType::Ckks, None) => {}
        }

        if let Some(ks) = self.key_switching {
            if ks.decomposition_bits == 0 || ks.decomposition_bits > MAX_PRIME_BITS {
                return Err(HeError::InvalidParameters(format!(
                    "decomposition_bits {} must be in 1..={MAX_PRIME_BITS}",
                    ks.decomposition_bits
                )));
            }
        }
        Ok(())
    }
}

/// Coefficient modulus construction helpers.
pub struct CoeffModulus;

impl CoeffModulus {
    /// Largest total modulus bit count allowed for `n` at `level`.
    ///
    /// Returns 0 for ring degrees the table does not cover, and `usize::MAX`
    /// for [`SecurityLevel::None`].
    pub fn max_bit_count(n: usize, level: SecurityLevel) -> usize {
        let table = match level {
            SecurityLevel::None => return usize::MAX,
            SecurityLevel::Tc128 => &TC128_MAX_BITS,
            SecurityLevel::Tc192 => &TC192_MAX_BITS,
            SecurityLevel::Tc256 => &TC256_MAX_BITS,
        };
        table
            .iter()
            .find(|(deg, _)| *deg == n)
            .map_or(0, |(_, bits)| *bits)
    }

    /// Select one NTT-friendly prime per entry of `bit_sizes`.
    ///
    /// Primes of equal bit size are handed out in descending order of value,
    /// so the result is deterministic and free of repeats.
    pub fn create(n: usize, bit_sizes: &[u32]) -> Result<Vec<Modulus>> {
        if !n.is_power_of_two() || !(MIN_POLY_MODULUS_DEGREE..=MAX_POLY_MODULUS_DEGREE).contains(&n) {
            return Err(HeError::InvalidParameters(format!(
                "poly_modulus_degree {n} must be a power of two in [{MIN_POLY_MODULUS_DEGREE}, {MAX_POLY_MODULUS_DEGREE}]"
            )));
        }
        let mut distinct: Vec<u32> = bit_sizes.to_vec();
        distinct.sort_unstable();
        distinct.dedup();

        let mut pools = Vec::with_capacity(distinct.len());
        for &bits in &distinct {
            let count = bit_sizes.iter().filter(|&&b| b == bits).count();
            pools.push((bits, find_ntt_primes(n, bits, count, &[])?.into_iter()));
        }

        let mut chain = Vec::with_capacity(bit_sizes.len());
        for &bits in bit_sizes {
            let prime = pools
                .iter_mut()
                .find(|(b, _)| *b == bits)
                .and_then(|(_, pool)| pool.next())
                .ok_or_else(|| {
                    HeError::InvalidParameters(format!("no {bits}-bit prime left for N={n}"))
                })?;
            chain.push(Modulus::new(prime));
        }
        Ok(chain)
    }

    /// Default BFV chain for `n` at `level`, using the full bit budget.
    pub fn bfv_default(n: usize, level: SecurityLevel) -> Result<Vec<Modulus>> {
        let sizes: Vec<u32> = match (level, n) {
            (SecurityLevel::Tc128, 4096) => vec![36, 36, 37],
            (SecurityLevel::Tc128, 8192) => vec![43, 43, 44, 44, 44],
            (SecurityLevel::Tc128, 16384) => vec![48, 48, 48, 49, 49, 49, 49, 49, 49],
            (SecurityLevel::Tc128, 32768) => {
                let mut v = vec![55; 15];
                v.push(56);
                v
            }
            _ => {
                let budget = Self::max_bit_count(n, level);
                if budget == 0 || budget == usize::MAX {
                    return Err(HeError::InvalidParameters(format!(
                        "no default coeff_modulus for N={n} at {level:?}"
                    )));
                }
                split_bits(budget, MAX_PRIME_BITS as usize)
            }
        };
        Self::create(n, &sizes)
    }
}

/// Plain modulus construction helpers.
pub struct PlainModulus;

impl PlainModulus {
    /// Largest `bits`-bit prime t with t ≡ 1 (mod 2N), enabling batching.
    pub fn batching(n: usize, bits: u32) -> Result<Modulus> {
        let primes = find_ntt_primes(n, bits, 1, &[])?;
        Ok(Modulus::new(primes[0]))
    }
}

/// Split `total` bits into at least two near-equal prime sizes, none above `max`.
fn split_bits(total: usize, max: usize) -> Vec<u32> {
    let count = total.div_ceil(max).max(2);
    let base = total / count;
    let extra = total % count;
    (0..count)
        .map(|i| (base + usize::from(i >= count - extra)) as u32)
        .collect()
}

/// Find `count` distinct primes of exactly `bits` bits with q ≡ 1 (mod 2N).
///
/// Searches downward from 2^bits, skipping anything in `exclude`.
pub(crate) fn find_ntt_primes(n: usize, bits: u32, count: usize, exclude: &[u64]) -> Result<Vec<u64>> {
    if bits < 2 || bits > MAX_PRIME_BITS {
        return Err(HeError::InvalidParameters(format!(
            "prime bit size {bits} must be in 2..={MAX_PRIME_BITS}"
        )));
    }
    let two_n = 2 * n as u64;
    let upper = 1u64 << bits;
    let lower = 1u64 << (bits - 1);
    if two_n >= upper {
        return Err(HeError::InvalidParameters(format!(
            "no {bits}-bit prime can be congruent to 1 mod {two_n}"
        )));
    }

    let mut found = Vec::with_capacity(count);
    let mut candidate = upper - two_n + 1;
    while found.len() < count && candidate > lower {
        if !exclude.contains(&candidate) && is_prime(candidate) {
            found.push(candidate);
        }
        if candidate <= two_n {
            break;
        }
        candidate -= two_n;
    }

    if found.len() < count {
        return Err(HeError::InvalidParameters(format!(
            "only {} of {count} {bits}-bit NTT-friendly primes exist for N={n}",
            found.len()
        )));
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ckks_n8192_preset() {
        let p = EncryptionParameters::ckks_n8192().unwrap();
        assert_eq!(p.poly_modulus_degree, 8192);
        assert_eq!(p.slot_count(), 4096);
        assert_eq!(p.coeff_modulus.len(), 4);
        let bits: Vec<u32> = p.coeff_modulus.iter().map(|m| m.bits).collect();
        assert_eq!(bits, vec![60, 40, 40, 60]);
        p.validate().unwrap();
    }

    #[test]
    fn test_modulus_ntt_friendly_and_distinct() {
        for n in [4096, 8192, 16384] {
            let chain = CoeffModulus::create(n, &[60, 40, 40, 60]).unwrap();
            let two_n = (2 * n) as u64;
            for (i, m) in chain.iter().enumerate() {
                assert_eq!(
                    m.value % two_n,
                    1,
                    "Modulus {i} ({}) is not NTT-friendly for N={n}",
                    m.value
                );
                assert!(is_prime(m.value), "Modulus {i} ({}) for N={n} is not prime", m.value);
            }
            assert_ne!(chain[0].value, chain[3].value);
            assert_ne!(chain[1].value, chain[2].value);
        }
    }

    #[test]
    fn test_barrett_constant() {
        let chain = CoeffModulus::create(16384, &[60, 40]).unwrap();
        for m in &chain {
            let expected = (u128::MAX / m.value as u128) >> 64;
            assert_eq!(m.barrett_hi, expected as u64);
        }
    }

    #[test]
    fn test_max_bit_count_table() {
        assert_eq!(CoeffModulus::max_bit_count(8192, SecurityLevel::Tc128), 218);
        assert_eq!(CoeffModulus::max_bit_count(16384, SecurityLevel::Tc192), 305);
        assert_eq!(CoeffModulus::max_bit_count(4096, SecurityLevel::Tc256), 58);
        assert_eq!(CoeffModulus::max_bit_count(3000, SecurityLevel::Tc128), 0);
        assert_eq!(CoeffModulus::max_bit_count(1024, SecurityLevel::None), usize::MAX);
    }

    #[test]
    fn test_bfv_default_fits_budget() {
        for n in [4096, 8192, 16384] {
            let chain = CoeffModulus::bfv_default(n, SecurityLevel::Tc128).unwrap();
            let total: usize = chain.iter().map(|m| m.bits as usize).sum();
            assert_eq!(total, CoeffModulus::max_bit_count(n, SecurityLevel::Tc128));
        }
        let chain = CoeffModulus::bfv_default(8192, SecurityLevel::Tc192).unwrap();
        let total: usize = chain.iter().map(|m| m.bits as usize).sum();
        assert_eq!(total, 152);
    }

    #[test]
    fn test_batching_plain_modulus() {
        let t = PlainModulus::batching(8192, 20).unwrap();
        assert_eq!(t.bits, 20);
        assert_eq!(t.value % 16384, 1);
        assert!(is_prime(t.value));
    }

    #[test]
    fn test_rejects_bad_degree_and_short_chain() {
        let chain = CoeffModulus::create(8192, &[60, 40, 60]).unwrap();
        let p = EncryptionParameters::new(SchemeType::Ckks, 8000, chain.clone());
        assert!(matches!(p.validate(), Err(HeError::InvalidParameters(_))));

        let p = EncryptionParameters::new(SchemeType::Ckks, 8192, chain[..1].to_vec());
        assert!(matches!(p.validate(), Err(HeError::InvalidParameters(_))));
    }

    #[test]
    fn test_rejects_security_overflow() {
        let chain = CoeffModulus::create(4096, &[60, 60, 60]).unwrap();
        let p = EncryptionParameters::new(SchemeType::Ckks, 4096, chain.clone());
        assert!(matches!(p.validate(), Err(HeError::InvalidParameters(_))));
        let p = p.with_security_level(SecurityLevel::None);
        p.validate().unwrap();
    }

    #[test]
    fn test_rejects_non_ntt_prime() {
        let mut chain = CoeffModulus::create(4096, &[40, 40]).unwrap();
        chain[0] = Modulus::new(1_000_003); // prime, but not 1 mod 8192
        let p = EncryptionParameters::new(SchemeType::Ckks, 4096, chain.clone());
        assert!(matches!(p.validate(), Err(HeError::InvalidParameters(_))));

        chain[0] = Modulus::new(8193 * 8193); // 1 mod 8192, composite
        let p = EncryptionParameters::new(SchemeType::Ckks, 4096, chain);
        assert!(matches!(p.validate(), Err(HeError::InvalidParameters(_))));
    }

    #[test]
    fn test_plain_modulus_scheme_rules() {
        let chain = CoeffModulus::create(4096, &[36, 36, 37]).unwrap();
        let t = PlainModulus::batching(4096, 20).unwrap();
        let ckks = EncryptionParameters::new(SchemeType::Ckks, 4096, chain.clone()).with_plain_modulus(t);
        assert!(ckks.validate().is_err());
        let bfv = EncryptionParameters::new(SchemeType::Bfv, 4096, chain.clone());
        assert!(bfv.validate().is_err());
        EncryptionParameters::new(SchemeType::Bfv, 4096, chain)
            .with_plain_modulus(t)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_impossible_prime_request() {
        // 13-bit primes congruent to 1 mod 2048 do not exist.
        assert!(CoeffModulus::create(1024, &[13, 13]).is_err());
        assert!(CoeffModulus::create(1024, &[61]).is_err());
    }

    #[test]
    fn test_digit_count() {
        let ks = KeySwitchingConfig::new(60);
        assert_eq!(ks.digit_count(140), 3);
        assert_eq!(ks.digit_count(120), 2);
        assert_eq!(KeySwitchingConfig::new(20).digit_count(140), 7);
    }

    #[test]
    fn test_default_decomposition_bits_follow_special_prime() {
        let p = EncryptionParameters::ckks_n8192().unwrap();
        assert_eq!(p.key_switching_config().decomposition_bits, 60);
        let p = p.with_decomposition_bits(30);
        assert_eq!(p.key_switching_config().decomposition_bits, 30);
    }
}
