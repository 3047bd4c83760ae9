//! Cryptographic sampling for RLWE.
//!
//! - Secret key: ternary distribution {-1, 0, 1}
//! - Error vectors: rounded Gaussian with σ = 3.19, cut off at 6σ
//! - Random polynomials: uniform in Z_q, independently per RNS limb
//!
//! Small polynomials are sampled as signed integers and reduced into every
//! limb afterwards, so all limbs represent the same ring element.

use crate::error::Result;
use crate::modulus::Modulus;
use crate::rng::HeRng;
use crate::rns::RnsPoly;

/// Standard deviation for RLWE error distribution.
pub const ERROR_STD_DEV: f64 = 3.19;

/// Samples further than this many standard deviations out are redrawn.
pub const ERROR_TAIL_CUTOFF: f64 = 6.0;

/// Sample a ternary polynomial: each coefficient ∈ {-1, 0, 1} with P = 1/3.
pub fn sample_ternary(rng: &mut HeRng, n: usize) -> Vec<i64> {
    (0..n).map(|_| rng.range_u64(3) as i64 - 1).collect()
}

/// Sample a rounded Gaussian error vector with standard deviation σ.
///
/// Returns i64 values (not reduced mod q); reduce with [`RnsPoly::from_signed`].
/// Fails with `InvalidParameters` for a negative or non-finite σ.
pub fn sample_gaussian_signed(rng: &mut HeRng, n: usize, sigma: f64) -> Result<Vec<i64>> {
    let bound = ERROR_TAIL_CUTOFF * sigma;
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let sample = rng.gaussian(sigma)?;
        if sample.abs() <= bound {
            out.push(sample.round() as i64);
        }
    }
    Ok(out)
}

/// Sample an RLWE error polynomial (σ = [`ERROR_STD_DEV`]) reduced into every modulus.
pub fn sample_error(rng: &mut HeRng, n: usize, moduli: &[Modulus]) -> RnsPoly {
    let bound = ERROR_TAIL_CUTOFF * ERROR_STD_DEV;
    let coeffs: Vec<i64> = (0..n)
        .map(|_| loop {
            let sample = ERROR_STD_DEV * rng.standard_normal();
            if sample.abs() <= bound {
                break sample.round() as i64;
            }
        })
        .collect();
    RnsPoly::from_signed(&coeffs, moduli)
}

/// Sample a uniform random polynomial in Z_Q.
///
/// Each limb is drawn independently; by the CRT this is uniform modulo Q,
/// and it is equally uniform whether read as coefficients or NTT values.
pub fn sample_uniform(rng: &mut HeRng, n: usize, moduli: &[Modulus]) -> RnsPoly {
    let limbs = moduli
        .iter()
        .map(|m| (0..n).map(|_| rng.range_u64(m.value)).collect())
        .collect();
    RnsPoly { limbs, n }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CoeffModulus;

    #[test]
    fn test_ternary_distribution() {
        let mut rng = HeRng::from_seed(42);
        let n = 10000;
        let samples = sample_ternary(&mut rng, n);

        let neg_ones = samples.iter().filter(|&&x| x == -1).count();
        let zeros = samples.iter().filter(|&&x| x == 0).count();
        let ones = samples.iter().filter(|&&x| x == 1).count();
        assert_eq!(neg_ones + zeros + ones, n, "Invalid ternary value present");

        let expected = n / 3;
        let tolerance = (n as f64 * 0.05) as usize;
        for (name, count) in [("neg_ones", neg_ones), ("zeros", zeros), ("ones", ones)] {
            assert!(
                (count as isize - expected as isize).unsigned_abs() < tolerance,
                "{name}={count}, expected≈{expected}"
            );
        }
    }

    #[test]
    fn test_gaussian_distribution() {
        let mut rng = HeRng::from_seed(42);
        let n = 10000;
        let sigma = ERROR_STD_DEV;
        let samples = sample_gaussian_signed(&mut rng, n, sigma).unwrap();

        let mean: f64 = samples.iter().map(|&x| x as f64).sum::<f64>() / n as f64;
        let variance: f64 = samples
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        let measured_sigma = variance.sqrt();

        assert!(mean.abs() < 0.2, "Gaussian mean too far from 0: {mean}");
        assert!(
            (measured_sigma - sigma).abs() < 0.3,
            "Gaussian sigma off: measured={measured_sigma}, expected={sigma}"
        );
        let bound = (ERROR_TAIL_CUTOFF * sigma).round() as i64;
        assert!(samples.iter().all(|x| x.abs() <= bound));
    }

    #[test]
    fn test_gaussian_rejects_negative_sigma() {
        let mut rng = HeRng::from_seed(42);
        assert!(sample_gaussian_signed(&mut rng, 16, -3.19).is_err());
        assert!(sample_gaussian_signed(&mut rng, 16, f64::NAN).is_err());
    }

    #[test]
    fn test_error_is_bounded_and_nonzero() {
        let mut rng = HeRng::from_seed(5);
        let moduli = vec![Modulus::new(97)];
        let e = sample_error(&mut rng, 4096, &moduli);
        let bound = (ERROR_TAIL_CUTOFF * ERROR_STD_DEV).round() as i64;
        let centered: Vec<i64> = e.limbs[0].iter().map(|&c| moduli[0].center(c)).collect();
        assert!(centered.iter().all(|c| c.abs() <= bound));
        assert!(centered.iter().filter(|&&c| c != 0).count() > 2048);
    }

    #[test]
    fn test_error_is_consistent_across_limbs() {
        let mut rng = HeRng::from_seed(3);
        let moduli = CoeffModulus::create(64, &[40, 50]).unwrap();
        let e = sample_error(&mut rng, 64, &moduli);
        for j in 0..64 {
            assert_eq!(moduli[0].center(e.limbs[0][j]), moduli[1].center(e.limbs[1][j]));
        }
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = HeRng::from_seed(42);
        let moduli = vec![Modulus::new(97), Modulus::new(193)];
        let poly = sample_uniform(&mut rng, 1000, &moduli);
        for (limb, m) in poly.limbs.iter().zip(&moduli) {
            for &s in limb {
                assert!(s < m.value, "Uniform sample {s} >= q={}", m.value);
            }
        }
    }
}
