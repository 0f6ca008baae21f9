//! Kalman filter genome: the diagonal entries of the P, Q and R covariances.

use serde::{Deserialize, Serialize};

/// Filter state dimension (each covariance is `STATE_DIM x STATE_DIM`).
pub const STATE_DIM: usize = 4;

/// Number of scalar parameters in a genome.
pub const GENOME_LEN: usize = 3 * STATE_DIM;

/// Parameter names, in the order they are persisted.
pub const GENOME_FIELDS: [&str; GENOME_LEN] = [
    "p_11", "p_22", "p_33", "p_44", "q_11", "q_22", "q_33", "q_44", "r_11", "r_22", "r_33",
    "r_44",
];

/// Default initial estimate covariance diagonal.
pub const DEFAULT_P: f64 = 1.0;
/// Default process noise covariance diagonal.
pub const DEFAULT_Q: f64 = 0.01;
/// Default measurement noise covariance diagonal.
pub const DEFAULT_R: f64 = 0.1;

/// Covariance parameters being tuned.
///
/// Each matrix is diagonal, so only its `STATE_DIM` diagonal entries are stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KfGenome {
    /// Initial estimate covariance `P`.
    pub p: [f64; STATE_DIM],
    /// Process noise covariance `Q`.
    pub q: [f64; STATE_DIM],
    /// Measurement noise covariance `R`.
    pub r: [f64; STATE_DIM],
}

impl Default for KfGenome {
    fn default() -> Self {
        Self {
            p: [DEFAULT_P; STATE_DIM],
            q: [DEFAULT_Q; STATE_DIM],
            r: [DEFAULT_R; STATE_DIM],
        }
    }
}

impl KfGenome {
    /// Flatten into persisted order (`p_11..p_44, q_11..q_44, r_11..r_44`).
    pub fn to_array(&self) -> [f64; GENOME_LEN] {
        let mut out = [0.0; GENOME_LEN];
        out[..STATE_DIM].copy_from_slice(&self.p);
        out[STATE_DIM..2 * STATE_DIM].copy_from_slice(&self.q);
        out[2 * STATE_DIM..].copy_from_slice(&self.r);
        out
    }

    /// Rebuild from persisted order.
    pub fn from_array(values: [f64; GENOME_LEN]) -> Self {
        let mut genome = Self {
            p: [0.0; STATE_DIM],
            q: [0.0; STATE_DIM],
            r: [0.0; STATE_DIM],
        };
        genome.p.copy_from_slice(&values[..STATE_DIM]);
        genome.q.copy_from_slice(&values[STATE_DIM..2 * STATE_DIM]);
        genome.r.copy_from_slice(&values[2 * STATE_DIM..]);
        genome
    }

    /// Combine two genomes field by field.
    pub fn zip_with<F>(&self, other: &Self, mut f: F) -> Self
    where
        F: FnMut(f64, f64) -> f64,
    {
        let a = self.to_array();
        let b = other.to_array();
        Self::from_array(std::array::from_fn(|i| f(a[i], b[i])))
    }

    /// Apply `f` to every field.
    pub fn map<F>(&self, mut f: F) -> Self
    where
        F: FnMut(f64) -> f64,
    {
        Self::from_array(self.to_array().map(&mut f))
    }

    /// Iterate `(name, value)` pairs in persisted order.
    pub fn named_fields(&self) -> impl Iterator<Item = (&'static str, f64)> {
        GENOME_FIELDS.into_iter().zip(self.to_array())
    }

    /// First field that is not a finite positive number, if any.
    pub fn first_invalid_field(&self) -> Option<(&'static str, f64)> {
        self.named_fields()
            .find(|(_, value)| !value.is_finite() || *value <= 0.0)
    }
}
