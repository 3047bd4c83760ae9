//! ChaCha20-based CSPRNG used by key generation and encryption.
//!
//! Thin wrapper around `rand_chacha::ChaCha20Rng` that fixes the API surface
//! the engine samples from:
//!
//! - Uniform u64 integers in a range
//! - Gaussian reals for the RLWE error distribution
//! - Seedable from u64 (deterministic for tests)
//! - Seedable from OS entropy
//!
//! `HeRng` implements [`RngCore`], so any `rand` adaptor can drive it too.

use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal, StandardNormal};

use crate::error::{HeError, Result};

/// Cryptographically secure PRNG for key and noise sampling.
#[derive(Debug, Clone)]
pub struct HeRng {
    inner: ChaCha20Rng,
}

impl HeRng {
    /// Create a deterministic RNG from a 64-bit seed.
    ///
    /// This is intended for **reproducible tests**, not production encryption.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Create an RNG seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            inner: ChaCha20Rng::from_entropy(),
        }
    }

    /// Return a uniform random u64 in `[0, max)`.
    #[inline]
    pub fn range_u64(&mut self, max: u64) -> u64 {
        debug_assert!(max > 0, "range_u64: max must be > 0");
        self.inner.gen_range(0..max)
    }

    /// Sample from a Gaussian distribution with mean 0 and standard deviation `sigma`.
    ///
    /// Fails with `InvalidParameters` unless `sigma` is finite and non-negative.
    pub fn gaussian(&mut self, sigma: f64) -> Result<f64> {
        if !sigma.is_finite() {
            return Err(HeError::InvalidParameters(format!("gaussian sigma {sigma} is not finite")));
        }
        let normal = Normal::new(0.0, sigma)
            .map_err(|e| HeError::InvalidParameters(format!("gaussian sigma {sigma}: {e}")))?;
        Ok(normal.sample(&mut self.inner))
    }

    /// Sample from N(0, 1).
    #[inline]
    pub fn standard_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.inner)
    }
}

impl RngCore for HeRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

impl CryptoRng for HeRng {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_seeding() {
        let mut rng1 = HeRng::from_seed(42);
        let mut rng2 = HeRng::from_seed(42);
        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_different_seeds_produce_different_output() {
        let mut rng1 = HeRng::from_seed(42);
        let mut rng2 = HeRng::from_seed(43);
        let same = (0..100)
            .filter(|_| rng1.next_u64() == rng2.next_u64())
            .count();
        assert!(same < 5, "Different seeds produced too many identical values: {same}");
    }

    #[test]
    fn test_range_u64_bounds() {
        let mut rng = HeRng::from_seed(42);
        let q = 1099511627777u64;
        for _ in 0..10000 {
            let v = rng.range_u64(q);
            assert!(v < q, "range_u64 produced {v} >= {q}");
        }
    }

    #[test]
    fn test_gaussian_distribution() {
        let mut rng = HeRng::from_seed(42);
        let sigma = 3.19;
        let n = 50000;
        let samples: Vec<f64> = (0..n).map(|_| rng.gaussian(sigma).unwrap()).collect();

        let mean: f64 = samples.iter().sum::<f64>() / n as f64;
        let variance: f64 = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        let measured_sigma = variance.sqrt();

        assert!(mean.abs() < 0.1, "Gaussian mean too far from 0: {mean}");
        assert!(
            (measured_sigma - sigma).abs() < 0.15,
            "Gaussian sigma off: measured={measured_sigma:.3}, expected={sigma}"
        );
    }

    #[test]
    fn test_gaussian_rejects_invalid_sigma() {
        let mut rng = HeRng::from_seed(42);
        for sigma in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(rng.gaussian(sigma), Err(HeError::InvalidParameters(_))));
        }
        assert_eq!(rng.gaussian(0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_standard_normal_moments() {
        let mut rng = HeRng::from_seed(7);
        let n = 50000;
        let samples: Vec<f64> = (0..n).map(|_| rng.standard_normal()).collect();
        let mean: f64 = samples.iter().sum::<f64>() / n as f64;
        let variance: f64 = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((variance - 1.0).abs() < 0.05, "variance {variance}");
    }

    #[test]
    fn test_from_entropy_produces_output() {
        let mut rng = HeRng::from_entropy();
        let v = rng.next_u64();
        let v2 = rng.next_u64();
        assert!(v != 0 || v2 != 0, "Entropy RNG produced all zeros");
    }
}
