//! Key generation.
//!
//! A [`KeyGenerator`] samples one secret key and derives every other key
//! from it. All keys are created at the key level, in NTT form.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::context::Context;
use crate::error::{HeError, Result};
use crate::galois::{
    default_galois_elts, galois_elts_from_steps, is_valid_galois_elt, ntt_permutation, permute,
};
use crate::keys::{GaloisKeys, KeySwitchingKey, PublicKey, RelinKeys, SecretKey};
use crate::rng::HeRng;
use crate::rns::RnsPoly;
use crate::sampling::{sample_error, sample_ternary, sample_uniform};

/// Generates and holds a secret key; derives public, relinearization and Galois keys.
pub struct KeyGenerator {
    context: Arc<Context>,
    secret_key: SecretKey,
    rng: HeRng,
}

impl KeyGenerator {
    /// New generator with a fresh secret key, seeded from OS entropy.
    pub fn new(context: &Arc<Context>) -> Self {
        Self::with_rng(context, HeRng::from_entropy())
    }

    /// Deterministic generator for reproducible tests.
    pub fn with_seed(context: &Arc<Context>, seed: u64) -> Self {
        Self::with_rng(context, HeRng::from_seed(seed))
    }

    fn with_rng(context: &Arc<Context>, mut rng: HeRng) -> Self {
        let key_data = context.key_context_data();
        let n = context.poly_modulus_degree();
        let s = sample_ternary(&mut rng, n);
        let mut poly = RnsPoly::from_signed(&s, key_data.moduli());
        poly.ntt_forward(key_data.ntt_tables());
        debug!("sampled secret key over {} primes", key_data.moduli().len());
        Self {
            context: Arc::clone(context),
            secret_key: SecretKey {
                poly,
                parms_id: key_data.parms_id(),
            },
            rng,
        }
    }

    /// Generator that derives keys for an existing secret key.
    pub fn from_secret_key(context: &Arc<Context>, secret_key: SecretKey) -> Result<Self> {
        if secret_key.parms_id != context.key_parms_id() {
            return Err(HeError::ParameterMismatch(
                "secret key was generated for a different context".into(),
            ));
        }
        Ok(Self {
            context: Arc::clone(context),
            secret_key,
            rng: HeRng::from_entropy(),
        })
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Fresh encryption of zero: (-a·s + e, a).
    pub fn create_public_key(&mut self) -> PublicKey {
        let key_data = self.context.key_context_data();
        let moduli = key_data.moduli();
        let n = self.context.poly_modulus_degree();

        let a = sample_uniform(&mut self.rng, n, moduli);
        let mut e = sample_error(&mut self.rng, n, moduli);
        e.ntt_forward(key_data.ntt_tables());

        let mut c0 = a.hadamard_mul(&self.secret_key.poly, moduli);
        c0.negate_assign(moduli);
        c0.add_assign(&e, moduli);

        PublicKey {
            c0,
            c1: a,
            parms_id: key_data.parms_id(),
        }
    }

    /// Key-switching key from s² to s.
    pub fn create_relin_keys(&mut self) -> RelinKeys {
        let moduli = self.context.key_context_data().moduli();
        let s_squared = self.secret_key.poly.hadamard_mul(&self.secret_key.poly, moduli);
        let key = self.create_switching_key(&s_squared);
        debug!("created relinearization keys with {} digits", key.digit_count());
        RelinKeys {
            key,
            parms_id: self.context.key_parms_id(),
        }
    }

    /// Keys for rotations by ±2^i (every power of two below N/2) and conjugation.
    pub fn create_galois_keys(&mut self) -> Result<GaloisKeys> {
        let elts = default_galois_elts(self.context.poly_modulus_degree());
        self.create_galois_keys_from_elts(&elts)
    }

    /// Keys for exactly the given rotation steps.
    pub fn create_galois_keys_for_steps(&mut self, steps: &[i64]) -> Result<GaloisKeys> {
        let elts = galois_elts_from_steps(steps, self.context.poly_modulus_degree())?;
        self.create_galois_keys_from_elts(&elts)
    }

    /// Keys for arbitrary Galois elements (odd, below 2N, not the identity).
    pub fn create_galois_keys_from_elts(&mut self, galois_elts: &[u64]) -> Result<GaloisKeys> {
        let n = self.context.poly_modulus_degree();
        for &g in galois_elts {
            if !is_valid_galois_elt(g, n) || g == 1 {
                return Err(HeError::InvalidKeyRequest(format!(
                    "{g} is not a non-trivial Galois element for N={n}"
                )));
            }
        }

        let mut keys = BTreeMap::new();
        for &g in galois_elts {
            if keys.contains_key(&g) {
                continue;
            }
            let perm = ntt_permutation(g, n);
            let rotated = RnsPoly {
                limbs: self
                    .secret_key
                    .poly
                    .limbs
                    .iter()
                    .map(|limb| permute(limb, &perm))
                    .collect(),
                n,
            };
            keys.insert(g, self.create_switching_key(&rotated));
        }
        debug!("created {} Galois keys", keys.len());
        Ok(GaloisKeys {
            keys,
            parms_id: self.context.key_parms_id(),
        })
    }

    /// key_i = (-a_i·s + e_i + P·2^{w·i}·s', a_i) for each digit i.
    fn create_switching_key(&mut self, new_key: &RnsPoly) -> KeySwitchingKey {
        let key_data = self.context.key_context_data();
        let moduli = key_data.moduli();
        let tables = key_data.ntt_tables();
        let n = self.context.poly_modulus_degree();
        let special = self.context.special_modulus();
        let special_index = moduli.len() - 1;
        let w = self.context.key_switching_config().decomposition_bits as u64;

        let digits = (0..self.context.digit_count())
            .map(|i| {
                let factors: Vec<u64> = moduli
                    .iter()
                    .enumerate()
                    .map(|(j, m)| {
                        if j == special_index {
                            0
                        } else {
                            m.mul(m.reduce(special.value), m.pow(2, w * i as u64))
                        }
                    })
                    .collect();

                let a = sample_uniform(&mut self.rng, n, moduli);
                let mut e = sample_error(&mut self.rng, n, moduli);
                e.ntt_forward(tables);

                let mut k0 = a.hadamard_mul(&self.secret_key.poly, moduli);
                k0.negate_assign(moduli);
                k0.add_assign(&e, moduli);
                let mut target = new_key.clone();
                target.mul_scalar_assign(&factors, moduli);
                k0.add_assign(&target, moduli);
                (k0, a)
            })
            .collect();

        KeySwitchingKey { digits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{CoeffModulus, EncryptionParameters, SchemeType, SecurityLevel};
    use crate::rns::RnsBase;

    fn small_context() -> Arc<Context> {
        let chain = CoeffModulus::create(64, &[40, 30, 40]).unwrap();
        Context::new(
            EncryptionParameters::new(SchemeType::Ckks, 64, chain)
                .with_security_level(SecurityLevel::None),
        )
        .unwrap()
    }

    /// Centered coefficients of an NTT-form key-level polynomial.
    fn centered(ctx: &Context, poly: &RnsPoly) -> Vec<i128> {
        let key = ctx.key_context_data();
        let mut p = poly.clone();
        p.ntt_inverse(key.ntt_tables());
        let base = RnsBase::new(key.moduli()).unwrap();
        base.compose_poly_centered(&p)
            .iter()
            .map(|c| c.to_string().parse::<i128>().unwrap())
            .collect()
    }

    #[test]
    fn test_secret_key_is_ternary() {
        let ctx = small_context();
        let keygen = KeyGenerator::with_seed(&ctx, 1);
        let s = centered(&ctx, &keygen.secret_key().poly);
        assert!(s.iter().all(|&c| (-1..=1).contains(&c)));
        assert!(s.iter().any(|&c| c != 0));
    }

    #[test]
    fn test_public_key_is_encryption_of_zero() {
        let ctx = small_context();
        let mut keygen = KeyGenerator::with_seed(&ctx, 2);
        let pk = keygen.create_public_key();
        let moduli = ctx.key_context_data().moduli();
        // c0 + c1·s = e, small.
        let mut noise = pk.c1.hadamard_mul(&keygen.secret_key().poly, moduli);
        noise.add_assign(&pk.c0, moduli);
        let e = centered(&ctx, &noise);
        assert!(e.iter().all(|c| c.abs() <= 20), "public key noise too large");
    }

    #[test]
    fn test_relin_key_digits() {
        let ctx = small_context();
        let mut keygen = KeyGenerator::with_seed(&ctx, 3);
        let rk = keygen.create_relin_keys();
        assert_eq!(rk.key().digit_count(), ctx.digit_count());
        assert_eq!(rk.parms_id(), ctx.key_parms_id());
    }

    #[test]
    fn test_galois_key_requests() {
        let ctx = small_context();
        let mut keygen = KeyGenerator::with_seed(&ctx, 4);

        let gk = keygen.create_galois_keys_for_steps(&[1, -3]).unwrap();
        assert_eq!(gk.len(), 2);
        assert!(gk.has_key(5));

        assert!(matches!(
            keygen.create_galois_keys_for_steps(&[0]),
            Err(HeError::InvalidKeyRequest(_))
        ));
        assert!(matches!(
            keygen.create_galois_keys_for_steps(&[32]),
            Err(HeError::InvalidKeyRequest(_))
        ));
        assert!(matches!(
            keygen.create_galois_keys_from_elts(&[4]),
            Err(HeError::InvalidKeyRequest(_))
        ));
        assert!(matches!(
            keygen.create_galois_keys_from_elts(&[129]),
            Err(HeError::InvalidKeyRequest(_))
        ));

        let all = keygen.create_galois_keys().unwrap();
        // ±1, ±2, ±4, ±8, 16 (self-inverse), conjugation.
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn test_foreign_secret_key_rejected() {
        let ctx = small_context();
        let other = {
            let chain = CoeffModulus::create(64, &[40, 40]).unwrap();
            Context::new(
                EncryptionParameters::new(SchemeType::Ckks, 64, chain)
                    .with_security_level(SecurityLevel::None),
            )
            .unwrap()
        };
        let sk = KeyGenerator::with_seed(&other, 5).secret_key().clone();
        assert!(matches!(
            KeyGenerator::from_secret_key(&ctx, sk),
            Err(HeError::ParameterMismatch(_))
        ));
    }
}
