//! Decryption and the BFV noise budget.

use std::sync::Arc;

use rayon::prelude::*;

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ContextData, ParmsId};
use crate::error::{HeError, Result};
use crate::keys::SecretKey;
use crate::modulus::Modulus;
use crate::params::SchemeType;
use crate::plaintext::Plaintext;
use crate::rns::{reduce_biguint, RnsPoly};

pub struct Decryptor {
    context: Arc<Context>,
    secret_key: SecretKey,
}

impl Decryptor {
    pub fn new(context: &Arc<Context>, secret_key: &SecretKey) -> Result<Self> {
        if secret_key.parms_id != context.key_parms_id() {
            return Err(HeError::ParameterMismatch(
                "secret key was generated for a different context".into(),
            ));
        }
        Ok(Self {
            context: Arc::clone(context),
            secret_key: secret_key.clone(),
        })
    }

    /// CKKS: the NTT-form phase at the ciphertext's level and scale.
    /// BFV: the batched message ⌊t·x/Q⌉ mod t.
    pub fn decrypt(&self, encrypted: &Ciphertext) -> Result<Plaintext> {
        let level = self.check(encrypted)?;
        let mut x = self.phase(encrypted, level);
        match self.context.scheme() {
            SchemeType::Ckks => Ok(Plaintext::new(x, level.parms_id(), encrypted.scale(), true)),
            SchemeType::Bfv => {
                let t = self.plain_modulus()?;
                x.ntt_inverse(level.ntt_tables());
                let q = level.total_coeff_modulus();
                let half_q = q >> 1u32;
                let coeffs = level
                    .base()
                    .compose_poly(&x)
                    .par_iter()
                    .map(|c| reduce_biguint(&((c * t.value + &half_q) / q), &t))
                    .collect();
                Ok(Plaintext::new(
                    RnsPoly {
                        limbs: vec![coeffs],
                        n: x.n,
                    },
                    ParmsId::ZERO,
                    1.0,
                    false,
                ))
            }
        }
    }

    /// Bits of noise headroom left: bits(Q) − bits(‖[t·x]_Q‖∞) − 1, floored at 0.
    ///
    /// A budget of 0 means decryption is no longer guaranteed; decrypting such
    /// a ciphertext silently yields wrong slots.
    pub fn invariant_noise_budget(&self, encrypted: &Ciphertext) -> Result<u32> {
        if self.context.scheme() != SchemeType::Bfv {
            return Err(HeError::UnsupportedOperation(
                "noise budget is only defined for BFV",
            ));
        }
        let t = self.plain_modulus()?;
        let level = self.check(encrypted)?;
        let mut x = self.phase(encrypted, level);
        x.ntt_inverse(level.ntt_tables());

        let q = level.total_coeff_modulus();
        let half_q = q >> 1u32;
        let norm = level
            .base()
            .compose_poly(&x)
            .par_iter()
            .map(|c| {
                let v = (c * t.value) % q;
                if v > half_q {
                    q - v
                } else {
                    v
                }
            })
            .max()
            .unwrap_or_default();

        let budget = level.total_coeff_modulus_bits() as i64 - norm.bits() as i64 - 1;
        Ok(budget.max(0) as u32)
    }

    fn plain_modulus(&self) -> Result<Modulus> {
        self.context
            .plain_modulus()
            .ok_or_else(|| HeError::InvalidParameters("BFV context without plain modulus".into()))
    }

    fn check(&self, encrypted: &Ciphertext) -> Result<&Arc<ContextData>> {
        let level = self.context.data_level(&encrypted.parms_id())?;
        if encrypted.size() < 2 {
            return Err(HeError::InvalidCiphertextSize(encrypted.size()));
        }
        let count = level.moduli().len();
        if encrypted.polys().iter().any(|p| p.num_limbs() != count) {
            return Err(HeError::ParameterMismatch(
                "ciphertext limb count does not match its level".into(),
            ));
        }
        Ok(level)
    }

    /// Σ c_i·s^i in NTT form (Horner from the highest component).
    fn phase(&self, encrypted: &Ciphertext, level: &ContextData) -> RnsPoly {
        let moduli = level.moduli();
        let s = self.secret_key.poly.leading_limbs(moduli.len());
        let polys = encrypted.polys();
        let mut acc = polys[polys.len() - 1].clone();
        for c in polys[..polys.len() - 1].iter().rev() {
            acc.mul_assign(&s, moduli);
            acc.add_assign(c, moduli);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_encoder::BatchEncoder;
    use crate::encoder::CkksEncoder;
    use crate::encryptor::Encryptor;
    use crate::keygen::KeyGenerator;
    use crate::params::{CoeffModulus, EncryptionParameters, PlainModulus, SecurityLevel};

    fn bfv_context() -> Arc<Context> {
        let n = 256;
        let chain = CoeffModulus::create(n, &[50, 50, 50]).unwrap();
        let t = PlainModulus::batching(n, 17).unwrap();
        Context::new(
            EncryptionParameters::new(SchemeType::Bfv, n, chain)
                .with_plain_modulus(t)
                .with_security_level(SecurityLevel::None),
        )
        .unwrap()
    }

    #[test]
    fn test_bfv_decrypt_and_budget() {
        let ctx = bfv_context();
        let mut keygen = KeyGenerator::with_seed(&ctx, 21);
        let pk = keygen.create_public_key();
        let mut encryptor = Encryptor::with_seed(&ctx, &pk, 22).unwrap();
        let decryptor = Decryptor::new(&ctx, keygen.secret_key()).unwrap();
        let encoder = BatchEncoder::new(&ctx).unwrap();

        let values: Vec<u64> = (0..256).map(|i| i * 101 % 65000).collect();
        let ct = encryptor.encrypt(&encoder.encode(&values).unwrap()).unwrap();
        let pt = decryptor.decrypt(&ct).unwrap();
        assert_eq!(encoder.decode(&pt).unwrap(), values);

        // 100-bit Q, 17-bit t, fresh noise well under 2^20.
        let budget = decryptor.invariant_noise_budget(&ct).unwrap();
        assert!(budget > 50 && budget < 100, "budget {budget}");
    }

    #[test]
    fn test_ckks_decrypt_keeps_level_and_scale() {
        let chain = CoeffModulus::create(64, &[50, 40, 50]).unwrap();
        let ctx = Context::new(
            EncryptionParameters::new(SchemeType::Ckks, 64, chain)
                .with_security_level(SecurityLevel::None),
        )
        .unwrap();
        let mut keygen = KeyGenerator::with_seed(&ctx, 23);
        let pk = keygen.create_public_key();
        let mut encryptor = Encryptor::with_seed(&ctx, &pk, 24).unwrap();
        let decryptor = Decryptor::new(&ctx, keygen.secret_key()).unwrap();
        let encoder = CkksEncoder::new(&ctx).unwrap();

        let scale = 2f64.powi(30);
        let values = [0.5, -1.25, 3.0];
        let ct = encryptor.encrypt(&encoder.encode(&values, scale).unwrap()).unwrap();
        let pt = decryptor.decrypt(&ct).unwrap();
        assert_eq!(pt.parms_id(), ct.parms_id());
        assert_eq!(pt.scale(), scale);
        let decoded = encoder.decode(&pt).unwrap();
        for (i, v) in values.iter().enumerate() {
            assert!((decoded[i] - v).abs() < 1e-4, "Slot {i}: decoded={}", decoded[i]);
        }

        assert!(matches!(
            decryptor.invariant_noise_budget(&ct),
            Err(HeError::UnsupportedOperation(_))
        ));
    }
}
