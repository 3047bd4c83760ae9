//! Validated parameters and the per-level data derived from them.
//!
//! A [`Context`] owns the modulus chain. Each suffix of the chain is a level
//! described by a [`ContextData`] and named by its [`ParmsId`]:
//!
//! ```text
//! key level    q_0 .. q_{L-2} P   chain_index L-1   (keys live here)
//! first level  q_0 .. q_{L-2}     chain_index L-2   (fresh ciphertexts)
//! ...
//! last level   q_0                chain_index 0
//! ```
//!
//! Rescale and mod-switch drop the last prime of a level, so the special
//! prime P never carries data.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{HeError, Result};
use crate::modulus::Modulus;
use crate::ntt::NttTables;
use crate::params::{find_ntt_primes, EncryptionParameters, KeySwitchingConfig, SchemeType};
use crate::rns::{reduce_biguint, RnsBase};

/// Bit size of the auxiliary primes used by BFV multiplication.
const AUX_PRIME_BITS: u32 = 60;

/// Number of auxiliary primes whose product is at least `2^needed`.
///
/// A prime of `AUX_PRIME_BITS` bits is only guaranteed to exceed
/// `2^(AUX_PRIME_BITS - 1)`, so count one bit less per prime.
fn aux_prime_count(needed: usize) -> usize {
    needed.div_ceil(AUX_PRIME_BITS as usize - 1)
}

/// Identifier of one level of the modulus chain.
///
/// SHA-256 over the scheme, ring degree, the whole coefficient modulus, the
/// plain modulus, the decomposition width and the level's prime count, so ids
/// from different contexts never collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParmsId(pub [u8; 32]);

impl ParmsId {
    /// Id carried by values that are not bound to a level (BFV plaintexts).
    pub const ZERO: ParmsId = ParmsId([0u8; 32]);

    fn compute(params: &EncryptionParameters, key_switching: KeySwitchingConfig, len: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([params.scheme.tag()]);
        hasher.update((params.poly_modulus_degree as u64).to_le_bytes());
        hasher.update((params.coeff_modulus.len() as u64).to_le_bytes());
        for m in &params.coeff_modulus {
            hasher.update(m.value.to_le_bytes());
        }
        hasher.update(params.plain_modulus.map_or(0, |t| t.value).to_le_bytes());
        hasher.update(key_switching.decomposition_bits.to_le_bytes());
        hasher.update((len as u64).to_le_bytes());
        ParmsId(hasher.finalize().into())
    }
}

impl fmt::Debug for ParmsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParmsId({self})")
    }
}

impl fmt::Display for ParmsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// BFV constants for one level.
#[derive(Debug)]
pub struct BfvLevelData {
    /// floor(Q / t) mod q_i.
    pub delta: Vec<u64>,
    /// CRT base over the level primes followed by the auxiliary primes.
    pub extended_base: RnsBase,
}

/// Everything derived for one level of the chain.
#[derive(Debug)]
pub struct ContextData {
    parms_id: ParmsId,
    chain_index: usize,
    moduli: Vec<Modulus>,
    ntt_tables: Vec<Arc<NttTables>>,
    base: RnsBase,
    total_coeff_modulus_bits: usize,
    next_parms_id: Option<ParmsId>,
    bfv: Option<BfvLevelData>,
}

impl ContextData {
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    /// Position in the chain; 0 is the last level.
    pub fn chain_index(&self) -> usize {
        self.chain_index
    }

    /// Primes of this level.
    pub fn moduli(&self) -> &[Modulus] {
        &self.moduli
    }

    pub fn ntt_tables(&self) -> &[Arc<NttTables>] {
        &self.ntt_tables
    }

    /// CRT base over this level's primes.
    pub fn base(&self) -> &RnsBase {
        &self.base
    }

    /// Product of this level's primes.
    pub fn total_coeff_modulus(&self) -> &BigUint {
        self.base.product()
    }

    /// Exact bit length of the product of this level's primes.
    pub fn total_coeff_modulus_bits(&self) -> usize {
        self.total_coeff_modulus_bits
    }

    /// Level reached by dropping one prime; `None` at the last level.
    pub fn next_parms_id(&self) -> Option<ParmsId> {
        self.next_parms_id
    }

    pub fn bfv(&self) -> Option<&BfvLevelData> {
        self.bfv.as_ref()
    }
}

/// Auxiliary base for the BFV tensor product.
#[derive(Debug)]
pub struct AuxBase {
    pub moduli: Vec<Modulus>,
    pub ntt_tables: Vec<Arc<NttTables>>,
}

/// Validated encryption parameters plus the full level chain.
#[derive(Debug)]
pub struct Context {
    params: EncryptionParameters,
    key_switching: KeySwitchingConfig,
    levels: Vec<Arc<ContextData>>,
    index: HashMap<ParmsId, usize>,
    aux: Option<AuxBase>,
}

impl Context {
    /// Validate `params` and derive every level.
    pub fn new(params: EncryptionParameters) -> Result<Arc<Self>> {
        params.validate()?;
        let n = params.poly_modulus_degree;
        let key_switching = params.key_switching_config();

        let ntt_tables = params
            .coeff_modulus
            .iter()
            .map(|&m| NttTables::new(n, m).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        let aux = match params.scheme {
            SchemeType::Bfv => Some(Self::build_aux_base(&params)?),
            SchemeType::Ckks => None,
        };

        let count = params.coeff_modulus.len();
        let mut levels: Vec<Arc<ContextData>> = Vec::with_capacity(count);
        let mut next: Option<ParmsId> = None;
        // Build from the last level upward so each level knows its successor.
        for len in 1..count {
            let data = Self::build_level(&params, &ntt_tables, aux.as_ref(), len, len - 1, next)?;
            next = Some(data.parms_id);
            levels.push(Arc::new(data));
        }
        // Key level: every prime, including the special one.
        let key = Self::build_level(&params, &ntt_tables, None, count, count - 1, next)?;
        levels.push(Arc::new(key));

        let index = levels
            .iter()
            .enumerate()
            .map(|(i, d)| (d.parms_id, i))
            .collect();

        debug!(
            "context: scheme={:?} N={} primes={:?} total_bits={} special={} digit_bits={} digits={}",
            params.scheme,
            n,
            params.coeff_modulus.iter().map(|m| m.value).collect::<Vec<_>>(),
            params.total_coeff_modulus_bits(),
            params.coeff_modulus[count - 1].value,
            key_switching.decomposition_bits,
            key_switching.digit_count(levels[count - 2].total_coeff_modulus_bits),
        );

        Ok(Arc::new(Self {
            params,
            key_switching,
            levels,
            index,
            aux,
        }))
    }

    fn build_aux_base(params: &EncryptionParameters) -> Result<AuxBase> {
        let n = params.poly_modulus_degree;
        let data = &params.coeff_modulus[..params.coeff_modulus.len() - 1];
        let data_bits: usize = data.iter().map(|m| m.bits as usize).sum();
        let needed = data_bits + n.trailing_zeros() as usize + 2;
        let count = aux_prime_count(needed);
        let exclude: Vec<u64> = params.coeff_modulus.iter().map(|m| m.value).collect();
        let moduli: Vec<Modulus> = find_ntt_primes(n, AUX_PRIME_BITS, count, &exclude)?
            .into_iter()
            .map(Modulus::new)
            .collect();
        let ntt_tables = moduli
            .iter()
            .map(|&m| NttTables::new(n, m).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        debug!("bfv auxiliary base: {} primes of {AUX_PRIME_BITS} bits", moduli.len());
        Ok(AuxBase { moduli, ntt_tables })
    }

    fn build_level(
        params: &EncryptionParameters,
        ntt_tables: &[Arc<NttTables>],
        aux: Option<&AuxBase>,
        len: usize,
        chain_index: usize,
        next_parms_id: Option<ParmsId>,
    ) -> Result<ContextData> {
        let moduli = params.coeff_modulus[..len].to_vec();
        let parms_id = ParmsId::compute(params, params.key_switching_config(), len);
        let base = RnsBase::new(&moduli)?;
        let total_coeff_modulus_bits = base.product().bits() as usize;

        let bfv = match (aux, params.plain_modulus) {
            (Some(aux), Some(t)) => {
                let delta_big = base.product() / t.value;
                let delta = moduli.iter().map(|m| reduce_biguint(&delta_big, m)).collect();
                let mut extended = moduli.clone();
                extended.extend_from_slice(&aux.moduli);
                Some(BfvLevelData {
                    delta,
                    extended_base: RnsBase::new(&extended)?,
                })
            }
            _ => None,
        };

        Ok(ContextData {
            parms_id,
            chain_index,
            moduli,
            ntt_tables: ntt_tables[..len].to_vec(),
            base,
            total_coeff_modulus_bits,
            next_parms_id,
            bfv,
        })
    }

    pub fn params(&self) -> &EncryptionParameters {
        &self.params
    }

    pub fn scheme(&self) -> SchemeType {
        self.params.scheme
    }

    pub fn poly_modulus_degree(&self) -> usize {
        self.params.poly_modulus_degree
    }

    pub fn plain_modulus(&self) -> Option<Modulus> {
        self.params.plain_modulus
    }

    pub fn key_switching_config(&self) -> KeySwitchingConfig {
        self.key_switching
    }

    /// The special prime P reserved for key switching.
    pub fn special_modulus(&self) -> Modulus {
        self.key_context_data().moduli[self.levels.len() - 1]
    }

    pub fn special_ntt_tables(&self) -> &Arc<NttTables> {
        &self.key_context_data().ntt_tables[self.levels.len() - 1]
    }

    /// Number of key-switching digits, sized for the first data level.
    pub fn digit_count(&self) -> usize {
        self.key_switching
            .digit_count(self.first_context_data().total_coeff_modulus_bits)
    }

    pub fn aux_base(&self) -> Option<&AuxBase> {
        self.aux.as_ref()
    }

    pub fn key_parms_id(&self) -> ParmsId {
        self.key_context_data().parms_id
    }

    pub fn first_parms_id(&self) -> ParmsId {
        self.first_context_data().parms_id
    }

    pub fn last_parms_id(&self) -> ParmsId {
        self.last_context_data().parms_id
    }

    pub fn key_context_data(&self) -> &Arc<ContextData> {
        &self.levels[self.levels.len() - 1]
    }

    pub fn first_context_data(&self) -> &Arc<ContextData> {
        &self.levels[self.levels.len() - 2]
    }

    pub fn last_context_data(&self) -> &Arc<ContextData> {
        &self.levels[0]
    }

    pub fn get_context_data(&self, parms_id: &ParmsId) -> Option<&Arc<ContextData>> {
        self.index.get(parms_id).map(|&i| &self.levels[i])
    }

    /// Like [`Context::get_context_data`], but an unknown id is an error.
    pub fn context_data(&self, parms_id: &ParmsId) -> Result<&Arc<ContextData>> {
        self.get_context_data(parms_id).ok_or_else(|| {
            HeError::ParameterMismatch(format!("parms_id {parms_id} does not belong to this context"))
        })
    }

    /// Level data for values that may carry data (excludes the key level).
    pub(crate) fn data_level(&self, parms_id: &ParmsId) -> Result<&Arc<ContextData>> {
        let data = self.context_data(parms_id)?;
        if data.parms_id == self.key_parms_id() {
            return Err(HeError::ParameterMismatch(
                "values cannot live at the key level".into(),
            ));
        }
        Ok(data)
    }

    pub fn next_parms_id(&self, parms_id: &ParmsId) -> Option<ParmsId> {
        self.get_context_data(parms_id).and_then(|d| d.next_parms_id)
    }

    /// Levels from the key level down to the last level.
    pub fn levels(&self) -> impl Iterator<Item = &Arc<ContextData>> {
        self.levels.iter().rev()
    }
}
