//! Public-key and symmetric encryption.
//!
//! Public key: c = (pk0·u + e0 + m, pk1·u + e1) with u ternary.
//! Symmetric:  c = (-a·s + e + m, a) with a uniform.
//!
//! CKKS adds the plaintext polynomial as is; BFV adds Δ·m with Δ = ⌊Q/t⌋.
//! Ciphertexts are produced in NTT form.

use std::sync::Arc;

use log::trace;

use crate::ciphertext::Ciphertext;
use crate::context::{Context, ContextData, ParmsId};
use crate::error::{HeError, Result};
use crate::keys::{PublicKey, SecretKey};
use crate::params::SchemeType;
use crate::plaintext::Plaintext;
use crate::rng::HeRng;
use crate::rns::RnsPoly;
use crate::sampling::{sample_error, sample_ternary, sample_uniform};

pub struct Encryptor {
    context: Arc<Context>,
    public_key: Option<PublicKey>,
    secret_key: Option<SecretKey>,
    rng: HeRng,
}

impl Encryptor {
    /// Public-key encryptor seeded from OS entropy.
    pub fn new(context: &Arc<Context>, public_key: &PublicKey) -> Result<Self> {
        Self::build(context, Some(public_key), None, HeRng::from_entropy())
    }

    /// Deterministic public-key encryptor for reproducible tests.
    pub fn with_seed(context: &Arc<Context>, public_key: &PublicKey, seed: u64) -> Result<Self> {
        Self::build(context, Some(public_key), None, HeRng::from_seed(seed))
    }

    /// Secret-key encryptor; only [`Encryptor::encrypt_symmetric`] is available.
    pub fn new_symmetric(context: &Arc<Context>, secret_key: &SecretKey) -> Result<Self> {
        Self::build(context, None, Some(secret_key), HeRng::from_entropy())
    }

    fn build(
        context: &Arc<Context>,
        public_key: Option<&PublicKey>,
        secret_key: Option<&SecretKey>,
        rng: HeRng,
    ) -> Result<Self> {
        let key_id = context.key_parms_id();
        if public_key.is_some_and(|pk| pk.parms_id != key_id)
            || secret_key.is_some_and(|sk| sk.parms_id != key_id)
        {
            return Err(HeError::ParameterMismatch(
                "key was generated for a different context".into(),
            ));
        }
        Ok(Self {
            context: Arc::clone(context),
            public_key: public_key.cloned(),
            secret_key: secret_key.cloned(),
            rng,
        })
    }

    /// Also allow symmetric encryption with `secret_key`.
    pub fn set_secret_key(&mut self, secret_key: &SecretKey) -> Result<()> {
        if secret_key.parms_id != self.context.key_parms_id() {
            return Err(HeError::ParameterMismatch(
                "secret key was generated for a different context".into(),
            ));
        }
        self.secret_key = Some(secret_key.clone());
        Ok(())
    }

    /// Encrypt with the public key at the plaintext's level and scale.
    pub fn encrypt(&mut self, plain: &Plaintext) -> Result<Ciphertext> {
        let (level, message, scale) = self.prepare(plain)?;
        let (c0, c1) = self.public_zero(&level)?;
        Ok(finish(c0, c1, message, &level, scale))
    }

    /// Encrypt with the secret key.
    pub fn encrypt_symmetric(&mut self, plain: &Plaintext) -> Result<Ciphertext> {
        let (level, message, scale) = self.prepare(plain)?;
        let (c0, c1) = self.symmetric_zero(&level)?;
        Ok(finish(c0, c1, message, &level, scale))
    }

    /// Public-key encryption of zero at the first data level.
    pub fn encrypt_zero(&mut self) -> Result<Ciphertext> {
        self.encrypt_zero_at(self.context.first_parms_id())
    }

    /// Public-key encryption of zero at the given level, scale 1.
    pub fn encrypt_zero_at(&mut self, parms_id: ParmsId) -> Result<Ciphertext> {
        let level = Arc::clone(self.context.data_level(&parms_id)?);
        let (c0, c1) = self.public_zero(&level)?;
        Ok(Ciphertext::new(vec![c0, c1], parms_id, 1.0))
    }

    /// Level, NTT-form message polynomial and scale for a plaintext.
    fn prepare(&self, plain: &Plaintext) -> Result<(Arc<ContextData>, RnsPoly, f64)> {
        match self.context.scheme() {
            SchemeType::Ckks => {
                if !plain.is_ntt_form() {
                    return Err(HeError::InvalidPlaintext("not a CKKS plaintext".into()));
                }
                let level = Arc::clone(self.context.data_level(&plain.parms_id())?);
                if plain.poly().num_limbs() != level.moduli().len() {
                    return Err(HeError::InvalidPlaintext("limb count does not match its level".into()));
                }
                Ok((level, plain.poly().clone(), plain.scale()))
            }
            SchemeType::Bfv => {
                let t = self
                    .context
                    .plain_modulus()
                    .ok_or_else(|| HeError::InvalidParameters("BFV context without plain modulus".into()))?;
                plain.check_bfv(self.context.poly_modulus_degree(), &t)?;
                let level = Arc::clone(self.context.first_context_data());
                let scaled = plain.bfv_scaled(&level)?;
                Ok((level, scaled, 1.0))
            }
        }
    }

    fn public_zero(&mut self, level: &ContextData) -> Result<(RnsPoly, RnsPoly)> {
        let pk = self
            .public_key
            .as_ref()
            .ok_or(HeError::UnsupportedOperation("encryptor has no public key"))?;
        let moduli = level.moduli();
        let tables = level.ntt_tables();
        let n = self.context.poly_modulus_degree();
        trace!("public-key encryption at chain index {}", level.chain_index());

        let mut u = RnsPoly::from_signed(&sample_ternary(&mut self.rng, n), moduli);
        u.ntt_forward(tables);
        let mut e0 = sample_error(&mut self.rng, n, moduli);
        e0.ntt_forward(tables);
        let mut e1 = sample_error(&mut self.rng, n, moduli);
        e1.ntt_forward(tables);

        let count = moduli.len();
        let mut c0 = pk.c0.leading_limbs(count).hadamard_mul(&u, moduli);
        c0.add_assign(&e0, moduli);
        let mut c1 = pk.c1.leading_limbs(count).hadamard_mul(&u, moduli);
        c1.add_assign(&e1, moduli);
        Ok((c0, c1))
    }

    fn symmetric_zero(&mut self, level: &ContextData) -> Result<(RnsPoly, RnsPoly)> {
        let sk = self
            .secret_key
            .as_ref()
            .ok_or(HeError::UnsupportedOperation("encryptor has no secret key"))?;
        let moduli = level.moduli();
        let n = self.context.poly_modulus_degree();

        let a = sample_uniform(&mut self.rng, n, moduli);
        let mut e = sample_error(&mut self.rng, n, moduli);
        e.ntt_forward(level.ntt_tables());

        let mut c0 = a.hadamard_mul(&sk.poly.leading_limbs(moduli.len()), moduli);
        c0.negate_assign(moduli);
        c0.add_assign(&e, moduli);
        Ok((c0, a))
    }
}

fn finish(mut c0: RnsPoly, c1: RnsPoly, message: RnsPoly, level: &ContextData, scale: f64) -> Ciphertext {
    c0.add_assign(&message, level.moduli());
    Ciphertext::new(vec![c0, c1], level.parms_id(), scale)
}
