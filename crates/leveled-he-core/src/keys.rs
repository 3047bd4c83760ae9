//! Key material.
//!
//! All keys live at the key level (every prime including the special one)
//! and are stored in NTT form. A key-switching key from s' to s holds one
//! RLWE pair per decomposition digit:
//!
//!   key_i = (-a_i·s + e_i + P·2^{w·i}·s', a_i)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::ParmsId;
use crate::rns::RnsPoly;

/// Ternary secret key s, in NTT form over the key level.
#[derive(Clone)]
pub struct SecretKey {
    pub(crate) poly: RnsPoly,
    pub(crate) parms_id: ParmsId,
}

impl SecretKey {
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("parms_id", &self.parms_id)
            .finish_non_exhaustive()
    }
}

/// Encryption of zero under the secret key: (-a·s + e, a).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    pub(crate) c0: RnsPoly,
    pub(crate) c1: RnsPoly,
    pub(crate) parms_id: ParmsId,
}

impl PublicKey {
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }
}

/// One RLWE pair per decomposition digit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySwitchingKey {
    pub(crate) digits: Vec<(RnsPoly, RnsPoly)>,
}

impl KeySwitchingKey {
    pub fn digit_count(&self) -> usize {
        self.digits.len()
    }
}

/// Key-switching key from s² to s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelinKeys {
    pub(crate) key: KeySwitchingKey,
    pub(crate) parms_id: ParmsId,
}

impl RelinKeys {
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    pub fn key(&self) -> &KeySwitchingKey {
        &self.key
    }
}

/// Key-switching keys from σ_g(s) to s, indexed by Galois element g.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaloisKeys {
    pub(crate) keys: BTreeMap<u64, KeySwitchingKey>,
    pub(crate) parms_id: ParmsId,
}

impl GaloisKeys {
    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    pub fn has_key(&self, galois_elt: u64) -> bool {
        self.keys.contains_key(&galois_elt)
    }

    pub fn key(&self, galois_elt: u64) -> Option<&KeySwitchingKey> {
        self.keys.get(&galois_elt)
    }

    /// Galois elements with a key, ascending.
    pub fn galois_elts(&self) -> Vec<u64> {
        self.keys.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
