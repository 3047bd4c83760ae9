//! Number Theoretic Transform (NTT) for negacyclic polynomial arithmetic.
//!
//! All polynomial multiplications use the NTT:
//!   a · b = iNTT(NTT(a) ⊙ NTT(b))
//!
//! For the ring Z_q[X]/(X^N+1) the negacyclic twist by ψ (a primitive 2N-th
//! root of unity) is merged into the butterflies: the forward transform is a
//! Cooley-Tukey pass over powers of ψ in bit-reversed order, the inverse a
//! Gentleman-Sande pass over powers of ψ^{-1}. Output index k holds the
//! evaluation a(ψ^{2·bitrev(k)+1}).
//!
//! Complexity: T_NTT(N) = (N/2) · log₂(N) butterfly operations per limb.

use crate::error::{HeError, Result};
use crate::modulus::{bit_reverse, primitive_root, Modulus};

/// Pre-computed NTT tables for a specific (N, q) pair.
#[derive(Debug, Clone)]
pub struct NttTables {
    /// The modulus q.
    pub modulus: Modulus,
    /// Polynomial degree N.
    pub n: usize,
    /// log₂(N).
    pub log_n: u32,
    /// ψ, the primitive 2N-th root the tables are built from.
    pub psi: u64,
    /// ψ^{bitrev(k)} for k in 0..N, with Shoup companions.
    root_powers: Vec<u64>,
    root_powers_shoup: Vec<u64>,
    /// ψ^{-bitrev(k)} for k in 0..N, with Shoup companions.
    inv_root_powers: Vec<u64>,
    inv_root_powers_shoup: Vec<u64>,
    /// N^{-1} mod q, used to normalize after the inverse NTT.
    n_inv: u64,
    n_inv_shoup: u64,
}

impl NttTables {
    /// Create NTT tables for a given polynomial degree and modulus.
    ///
    /// Fails unless N is a power of two and q ≡ 1 (mod 2N) is prime.
    pub fn new(n: usize, modulus: Modulus) -> Result<Self> {
        if !n.is_power_of_two() || n < 2 {
            return Err(HeError::InvalidParameters(format!(
                "NTT size {n} is not a power of two"
            )));
        }
        let log_n = n.trailing_zeros();
        let psi = primitive_root(n, &modulus).ok_or_else(|| {
            HeError::InvalidParameters(format!(
                "{} has no primitive {}-th root of unity",
                modulus.value,
                2 * n
            ))
        })?;
        let psi_inv = modulus
            .inv(psi)
            .ok_or_else(|| HeError::InvalidParameters("root of unity is not invertible".into()))?;

        let mut root_powers = vec![0u64; n];
        let mut inv_root_powers = vec![0u64; n];
        let mut power = 1u64;
        let mut inv_power = 1u64;
        for i in 0..n {
            let k = bit_reverse(i, log_n);
            root_powers[k] = power;
            inv_root_powers[k] = inv_power;
            power = modulus.mul(power, psi);
            inv_power = modulus.mul(inv_power, psi_inv);
        }
        let root_powers_shoup = root_powers.iter().map(|&w| modulus.shoup(w)).collect();
        let inv_root_powers_shoup = inv_root_powers.iter().map(|&w| modulus.shoup(w)).collect();

        let n_inv = modulus
            .inv(n as u64)
            .ok_or_else(|| HeError::InvalidParameters("N is not invertible".into()))?;

        Ok(Self {
            modulus,
            n,
            log_n,
            psi,
            root_powers,
            root_powers_shoup,
            inv_root_powers,
            inv_root_powers_shoup,
            n_inv,
            n_inv_shoup: modulus.shoup(n_inv),
        })
    }
}

/// In-place forward negacyclic NTT (Cooley-Tukey, decimation-in-time).
///
/// Input in standard coefficient order, output in bit-reversed evaluation
/// order: A[k] = Σ_j a[j] · ψ^{(2·bitrev(k)+1)·j} mod q.
pub fn ntt_forward(a: &mut [u64], tables: &NttTables) {
    let n = tables.n;
    let m_q = &tables.modulus;
    debug_assert_eq!(a.len(), n);

    let mut t = n;
    let mut m = 1;
    while m < n {
        t >>= 1;
        for i in 0..m {
            let w = tables.root_powers[m + i];
            let ws = tables.root_powers_shoup[m + i];
            let j1 = 2 * i * t;
            for j in j1..j1 + t {
                let u = a[j];
                let v = m_q.mul_shoup(a[j + t], w, ws);
                a[j] = m_q.add(u, v);
                a[j + t] = m_q.sub(u, v);
            }
        }
        m <<= 1;
    }
}

/// In-place inverse negacyclic NTT (Gentleman-Sande, decimation-in-frequency).
///
/// Undoes [`ntt_forward`] exactly, including the 1/N normalization.
pub fn ntt_inverse(a: &mut [u64], tables: &NttTables) {
    let n = tables.n;
    let m_q = &tables.modulus;
    debug_assert_eq!(a.len(), n);

    let mut t = 1;
    let mut m = n;
    while m > 1 {
        let h = m >> 1;
        let mut j1 = 0;
        for i in 0..h {
            let w = tables.inv_root_powers[h + i];
            let ws = tables.inv_root_powers_shoup[h + i];
            for j in j1..j1 + t {
                let u = a[j];
                let v = a[j + t];
                a[j] = m_q.add(u, v);
                a[j + t] = m_q.mul_shoup(m_q.sub(u, v), w, ws);
            }
            j1 += 2 * t;
        }
        t <<= 1;
        m = h;
    }

    for coeff in a.iter_mut() {
        *coeff = m_q.mul_shoup(*coeff, tables.n_inv, tables.n_inv_shoup);
    }
}
