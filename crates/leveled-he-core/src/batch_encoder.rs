//! BFV batching: N integers mod t packed as a 2 × (N/2) matrix.
//!
//! With t prime and t ≡ 1 (mod 2N), X^N + 1 splits into N linear factors mod t
//! and a plaintext polynomial is determined by its values at the N roots.
//! Column i of row 0 is the value at ψ^{5^i}, column i of row 1 the value at
//! ψ^{-5^i}. Rotating rows is then σ_{5^k} and swapping rows is σ_{2N-1},
//! the same automorphisms that rotate CKKS slots.

use std::sync::Arc;

use crate::context::{Context, ParmsId};
use crate::error::{HeError, Result};
use crate::galois::GALOIS_GENERATOR;
use crate::modulus::{bit_reverse, Modulus};
use crate::ntt::{ntt_forward, ntt_inverse, NttTables};
use crate::params::SchemeType;
use crate::plaintext::Plaintext;
use crate::rns::RnsPoly;

#[derive(Debug, Clone)]
pub struct BatchEncoder {
    n: usize,
    plain: Modulus,
    tables: NttTables,
    /// NTT index of each matrix slot (row 0 then row 1).
    index_map: Vec<usize>,
}

impl BatchEncoder {
    pub fn new(context: &Arc<Context>) -> Result<Self> {
        if context.scheme() != SchemeType::Bfv {
            return Err(HeError::UnsupportedOperation("BatchEncoder requires a BFV context"));
        }
        let plain = context
            .plain_modulus()
            .ok_or_else(|| HeError::InvalidParameters("BFV context without plain modulus".into()))?;
        let n = context.poly_modulus_degree();
        let tables = NttTables::new(n, plain).map_err(|_| {
            HeError::InvalidParameters(format!(
                "plain modulus {} does not support batching (needs a prime ≡ 1 mod {})",
                plain.value,
                2 * n
            ))
        })?;

        let log_n = n.trailing_zeros();
        let row_size = n / 2;
        let two_n = 2 * n as u64;
        let mut index_map = vec![0usize; n];
        let mut e = 1u64;
        for i in 0..row_size {
            index_map[i] = bit_reverse(((e - 1) / 2) as usize, log_n);
            index_map[row_size + i] = bit_reverse(((two_n - e - 1) / 2) as usize, log_n);
            e = e * GALOIS_GENERATOR % two_n;
        }

        Ok(Self {
            n,
            plain,
            tables,
            index_map,
        })
    }

    /// N slots: two rows of N/2.
    pub fn slot_count(&self) -> usize {
        self.n
    }

    pub fn row_size(&self) -> usize {
        self.n / 2
    }

    /// Encode values in [0, t). Missing slots are zero.
    pub fn encode(&self, values: &[u64]) -> Result<Plaintext> {
        self.check_len(values.len())?;
        if let Some(v) = values.iter().find(|&&v| v >= self.plain.value) {
            return Err(HeError::InvalidPlaintext(format!(
                "value {v} is not below the plain modulus {}",
                self.plain.value
            )));
        }
        Ok(self.encode_reduced(values.iter().copied()))
    }

    /// Encode values in [-t/2, t/2].
    pub fn encode_signed(&self, values: &[i64]) -> Result<Plaintext> {
        self.check_len(values.len())?;
        let half = self.plain.value / 2;
        if let Some(v) = values.iter().find(|v| v.unsigned_abs() > half) {
            return Err(HeError::InvalidPlaintext(format!(
                "value {v} does not fit the plain modulus {}",
                self.plain.value
            )));
        }
        Ok(self.encode_reduced(values.iter().map(|&v| self.plain.reduce_i64(v))))
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len > self.n {
            return Err(HeError::InvalidPlaintext(format!(
                "{len} values exceed the slot count {}",
                self.n
            )));
        }
        Ok(())
    }

    fn encode_reduced(&self, values: impl Iterator<Item = u64>) -> Plaintext {
        let mut coeffs = vec![0u64; self.n];
        for (slot, v) in values.enumerate() {
            coeffs[self.index_map[slot]] = v;
        }
        ntt_inverse(&mut coeffs, &self.tables);
        Plaintext::new(
            RnsPoly {
                limbs: vec![coeffs],
                n: self.n,
            },
            ParmsId::ZERO,
            1.0,
            false,
        )
    }

    /// Slot values in [0, t).
    pub fn decode(&self, plain: &Plaintext) -> Result<Vec<u64>> {
        if plain.is_ntt_form() || plain.poly().num_limbs() != 1 || plain.coeff_count() != self.n {
            return Err(HeError::InvalidPlaintext("not a BFV plaintext".into()));
        }
        let mut values = plain.poly().limbs[0].clone();
        if values.iter().any(|&c| c >= self.plain.value) {
            return Err(HeError::InvalidPlaintext("coefficient exceeds the plain modulus".into()));
        }
        ntt_forward(&mut values, &self.tables);
        Ok(self.index_map.iter().map(|&k| values[k]).collect())
    }

    /// Slot values centered into (-t/2, t/2].
    pub fn decode_signed(&self, plain: &Plaintext) -> Result<Vec<i64>> {
        Ok(self
            .decode(plain)?
            .into_iter()
            .map(|v| self.plain.center(v))
            .collect())
    }
}
