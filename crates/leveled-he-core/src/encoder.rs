//! CKKS encode/decode via the canonical embedding.
//!
//! Encode: z ∈ C^{N/2} → m(X) = round(Δ · σ^{-1}(z)) ∈ R_Q
//! Decode: m(X) ∈ R_Q → z = σ(m) / Δ ∈ C^{N/2}
//!
//! The canonical embedding σ evaluates m(X) at the odd powers of
//! ζ = e^{πi/N}. Slot i is the evaluation at ζ^{5^i}; its conjugate sits at
//! ζ^{-5^i}, which keeps the encoded polynomial real. Evaluating at every
//! ζ^{2k+1} is a twisted DFT:
//!   m(ζ^{2k+1}) = Σ_j (m[j]·ζ^j) · e^{2πi·jk/N}
//! so both directions are one size-N FFT plus the twist.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::{FromPrimitive, ToPrimitive};
use rustfft::{Fft, FftPlanner};

use crate::context::{Context, ContextData, ParmsId};
use crate::error::{HeError, Result};
use crate::galois::GALOIS_GENERATOR;
use crate::params::SchemeType;
use crate::plaintext::Plaintext;
use crate::rns::RnsPoly;

/// Coefficients below this magnitude are reduced through i64.
const I64_SAFE: f64 = (1u64 << 62) as f64;

/// CKKS encoder/decoder for a context.
#[derive(Clone)]
pub struct CkksEncoder {
    context: Arc<Context>,
    n: usize,
    slots: usize,
    /// twist[j] = ζ^j
    twist: Vec<Complex64>,
    /// FFT index of slot i and of its conjugate.
    slot_index: Vec<usize>,
    conj_index: Vec<usize>,
    fft_forward: Arc<dyn Fft<f64>>,
    fft_inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for CkksEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CkksEncoder")
            .field("n", &self.n)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

impl CkksEncoder {
    pub fn new(context: &Arc<Context>) -> Result<Self> {
        if context.scheme() != SchemeType::Ckks {
            return Err(HeError::UnsupportedOperation("CkksEncoder requires a CKKS context"));
        }
        let n = context.poly_modulus_degree();
        let slots = n / 2;
        let two_n = 2 * n as u64;

        let twist = (0..n)
            .map(|j| Complex64::from_polar(1.0, std::f64::consts::PI * j as f64 / n as f64))
            .collect();

        let mut slot_index = Vec::with_capacity(slots);
        let mut conj_index = Vec::with_capacity(slots);
        let mut e = 1u64;
        for _ in 0..slots {
            slot_index.push(((e - 1) / 2) as usize);
            conj_index.push(((two_n - e - 1) / 2) as usize);
            e = e * GALOIS_GENERATOR % two_n;
        }

        let mut planner = FftPlanner::new();
        Ok(Self {
            context: Arc::clone(context),
            n,
            slots,
            twist,
            slot_index,
            conj_index,
            fft_forward: planner.plan_fft_forward(n),
            fft_inverse: planner.plan_fft_inverse(n),
        })
    }

    /// Number of complex slots, N/2.
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    /// Encode real values at the first data level.
    pub fn encode(&self, values: &[f64], scale: f64) -> Result<Plaintext> {
        self.encode_at(values, self.context.first_parms_id(), scale)
    }

    /// Encode real values at the given level.
    pub fn encode_at(&self, values: &[f64], parms_id: ParmsId, scale: f64) -> Result<Plaintext> {
        let complex: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.encode_complex_at(&complex, parms_id, scale)
    }

    /// Encode complex values at the first data level.
    pub fn encode_complex(&self, values: &[Complex64], scale: f64) -> Result<Plaintext> {
        self.encode_complex_at(values, self.context.first_parms_id(), scale)
    }

    /// Encode complex values at the given level. Unused slots are zero.
    pub fn encode_complex_at(
        &self,
        values: &[Complex64],
        parms_id: ParmsId,
        scale: f64,
    ) -> Result<Plaintext> {
        let level = self.context.data_level(&parms_id)?;
        check_scale(level, scale)?;
        if values.len() > self.slots {
            return Err(HeError::InvalidPlaintext(format!(
                "{} values exceed the slot count {}",
                values.len(),
                self.slots
            )));
        }
        if values.iter().any(|v| !v.re.is_finite() || !v.im.is_finite()) {
            return Err(HeError::EncodingOverflow);
        }

        let mut buf = vec![Complex64::new(0.0, 0.0); self.n];
        for (i, &v) in values.iter().enumerate() {
            buf[self.slot_index[i]] = v;
            buf[self.conj_index[i]] = v.conj();
        }
        self.fft_forward.process(&mut buf);

        let factor = scale / self.n as f64;
        let coeffs: Vec<f64> = buf
            .iter()
            .zip(&self.twist)
            .map(|(b, t)| ((b * t.conj()).re * factor).round())
            .collect();
        self.plaintext_from_coeffs(&coeffs, level, scale)
    }

    /// Encode `value` into every slot, at the first data level.
    pub fn encode_scalar(&self, value: f64, scale: f64) -> Result<Plaintext> {
        self.encode_scalar_at(value, self.context.first_parms_id(), scale)
    }

    /// Encode `value` into every slot, at the given level.
    ///
    /// Only the constant coefficient is set, so no FFT rounding error is added.
    pub fn encode_scalar_at(&self, value: f64, parms_id: ParmsId, scale: f64) -> Result<Plaintext> {
        let level = self.context.data_level(&parms_id)?;
        check_scale(level, scale)?;
        if !value.is_finite() {
            return Err(HeError::EncodingOverflow);
        }
        let mut coeffs = vec![0.0; self.n];
        coeffs[0] = (value * scale).round();
        self.plaintext_from_coeffs(&coeffs, level, scale)
    }

    fn plaintext_from_coeffs(&self, coeffs: &[f64], level: &ContextData, scale: f64) -> Result<Plaintext> {
        let max = coeffs.iter().fold(0.0f64, |acc, c| acc.max(c.abs()));
        let bits = level.total_coeff_modulus_bits() as i32;
        if !max.is_finite() || max >= 2f64.powi(bits - 2) {
            return Err(HeError::EncodingOverflow);
        }

        let moduli = level.moduli();
        let mut poly = if max < I64_SAFE {
            let ints: Vec<i64> = coeffs.iter().map(|&c| c as i64).collect();
            RnsPoly::from_signed(&ints, moduli)
        } else {
            let wide = coeffs
                .iter()
                .map(|&c| BigInt::from_f64(c).ok_or(HeError::EncodingOverflow))
                .collect::<Result<Vec<_>>>()?;
            level.base().decompose_poly_signed(&wide)
        };
        poly.ntt_forward(level.ntt_tables());
        Ok(Plaintext::new(poly, level.parms_id(), scale, true))
    }

    /// Decode to real values (the real parts of the slots).
    pub fn decode(&self, plain: &Plaintext) -> Result<Vec<f64>> {
        Ok(self.decode_complex(plain)?.into_iter().map(|z| z.re).collect())
    }

    /// Decode to complex slot values.
    pub fn decode_complex(&self, plain: &Plaintext) -> Result<Vec<Complex64>> {
        if !plain.is_ntt_form() {
            return Err(HeError::InvalidPlaintext("not a CKKS plaintext".into()));
        }
        let level = self.context.data_level(&plain.parms_id())?;
        if plain.scale() <= 0.0 || !plain.scale().is_finite() {
            return Err(HeError::ScaleOutOfBounds(plain.scale()));
        }

        let mut poly = plain.poly().clone();
        poly.ntt_inverse(level.ntt_tables());
        let coeffs: Vec<f64> = if poly.num_limbs() == 1 {
            let m = &level.moduli()[0];
            poly.limbs[0].iter().map(|&c| m.center(c) as f64).collect()
        } else {
            level
                .base()
                .compose_poly_centered(&poly)
                .iter()
                .map(|c| c.to_f64().unwrap_or(f64::NAN))
                .collect()
        };

        let inv_scale = 1.0 / plain.scale();
        let mut buf: Vec<Complex64> = coeffs
            .iter()
            .zip(&self.twist)
            .map(|(&c, t)| t * (c * inv_scale))
            .collect();
        self.fft_inverse.process(&mut buf);

        Ok(self.slot_index.iter().map(|&k| buf[k]).collect())
    }
}

/// Scale must be positive and leave room below the level's modulus.
pub(crate) fn check_scale(level: &ContextData, scale: f64) -> Result<()> {
    if !scale.is_finite() || scale <= 0.0 || scale.log2() + 1.0 >= level.total_coeff_modulus_bits() as f64 {
        return Err(HeError::ScaleOutOfBounds(scale));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::EncryptionParameters;

    fn encoder_8192() -> CkksEncoder {
        let ctx = Context::new(EncryptionParameters::ckks_n8192().unwrap()).unwrap();
        CkksEncoder::new(&ctx).unwrap()
    }

    const SCALE: f64 = (1u64 << 40) as f64;

    #[test]
    fn test_encode_decode_roundtrip() {
        let encoder = encoder_8192();
        let z: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let pt = encoder.encode(&z, SCALE).unwrap();
        assert_eq!(pt.scale(), SCALE);
        let decoded = encoder.decode(&pt).unwrap();
        assert_eq!(decoded.len(), 4096);

        for i in 0..z.len() {
            let err = (decoded[i] - z[i]).abs();
            assert!(
                err < 1e-5,
                "Slot {i}: decoded={}, expected={}, error={err}",
                decoded[i],
                z[i]
            );
        }
        for (i, d) in decoded.iter().enumerate().skip(z.len()) {
            assert!(d.abs() < 1e-5, "Slot {i}: decoded={d}, expected 0.0");
        }
    }

    #[test]
    fn test_encode_large_values() {
        let encoder = encoder_8192();
        let z: Vec<f64> = (0..50).map(|i| (i as f64 - 25.0) * 100.0).collect();
        let pt = encoder.encode(&z, SCALE).unwrap();
        let decoded = encoder.decode(&pt).unwrap();

        for i in 0..z.len() {
            let err = (decoded[i] - z[i]).abs();
            assert!(err < 1e-5, "Slot {i}: decoded={}, expected={}, error={err}", decoded[i], z[i]);
        }
    }

    #[test]
    fn test_complex_roundtrip() {
        let encoder = encoder_8192();
        let z: Vec<Complex64> = (0..64)
            .map(|i| Complex64::new((i as f64).sin(), (i as f64 * 0.5).cos()))
            .collect();
        let pt = encoder.encode_complex(&z, SCALE).unwrap();
        let decoded = encoder.decode_complex(&pt).unwrap();
        for i in 0..z.len() {
            let err = (decoded[i] - z[i]).norm();
            assert!(err < 1e-6, "Slot {i}: decoded={}, expected={}, error={err}", decoded[i], z[i]);
        }
    }

    #[test]
    fn test_scalar_fills_every_slot() {
        let encoder = encoder_8192();
        let pt = encoder.encode_scalar(3.25, SCALE).unwrap();
        let decoded = encoder.decode(&pt).unwrap();
        for (i, d) in decoded.iter().enumerate() {
            assert!((d - 3.25).abs() < 1e-9, "Slot {i}: decoded={d}");
        }
    }

    #[test]
    fn test_encode_at_lower_level() {
        let encoder = encoder_8192();
        let ctx = &encoder.context;
        let last = ctx.last_parms_id();
        let pt = encoder.encode_at(&[1.5, -2.5], last, SCALE).unwrap();
        assert_eq!(pt.parms_id(), last);
        assert_eq!(pt.poly().num_limbs(), 1);
        let decoded = encoder.decode(&pt).unwrap();
        assert!((decoded[0] - 1.5).abs() < 1e-5);
        assert!((decoded[1] + 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_wide_coefficients_use_crt_path() {
        let encoder = encoder_8192();
        let scale = 2f64.powi(100);
        let z = vec![1000.0, -0.5, 7.0];
        let pt = encoder.encode(&z, scale).unwrap();
        let decoded = encoder.decode(&pt).unwrap();
        for i in 0..z.len() {
            assert!((decoded[i] - z[i]).abs() < 1e-9, "Slot {i}: decoded={}", decoded[i]);
        }
    }

    #[test]
    fn test_encoding_errors() {
        let encoder = encoder_8192();
        // 140-bit first level: 2^120 · 2^30 overflows.
        let err = encoder.encode(&[2f64.powi(30)], 2f64.powi(120)).unwrap_err();
        assert!(matches!(err, HeError::EncodingOverflow));

        assert!(matches!(encoder.encode(&[f64::NAN], SCALE), Err(HeError::EncodingOverflow)));
        assert!(matches!(encoder.encode(&[1.0], -1.0), Err(HeError::ScaleOutOfBounds(_))));
        assert!(matches!(
            encoder.encode(&[1.0], 2f64.powi(150)),
            Err(HeError::ScaleOutOfBounds(_))
        ));
        assert!(matches!(
            encoder.encode(&vec![0.0; 4097], SCALE),
            Err(HeError::InvalidPlaintext(_))
        ));
        let key_level = encoder.context.key_parms_id();
        assert!(matches!(
            encoder.encode_at(&[1.0], key_level, SCALE),
            Err(HeError::ParameterMismatch(_))
        ));
    }
}
