//! Bulk numeric operations over a whole matrix.
//!
//! Two interchangeable backends implement [`AcceleratedOps`]:
//!
//! - [`PortableOps`] - sequential, always compiled in.
//! - `ParallelOps` - rayon work-stealing over row-major chunks, behind the
//!   `parallel` cargo feature.
//!
//! [`select_backend`] picks one at startup. Callers only see the trait, so
//! the choice changes speed and floating-point summation order, nothing else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::Matrix;

/// Relative tolerance between backends for `sum_all`.
pub const SUM_TOLERANCE: f64 = 1e-9;

/// The fixed two-operation bulk interface.
pub trait AcceleratedOps: Send + Sync {
    /// Short backend name for logs and status text.
    fn name(&self) -> &'static str;

    /// Total of all entries.
    fn sum_all(&self, matrix: &Matrix) -> f64;

    /// New matrix with every entry multiplied by `factor`. `matrix` is not touched.
    fn scale(&self, matrix: &Matrix, factor: f64) -> Matrix;
}

/// Sequential implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortableOps;

impl AcceleratedOps for PortableOps {
    fn name(&self) -> &'static str {
        "portable"
    }

    fn sum_all(&self, matrix: &Matrix) -> f64 {
        matrix.iter().sum()
    }

    fn scale(&self, matrix: &Matrix, factor: f64) -> Matrix {
        matrix.map(|v| v * factor)
    }
}

#[cfg(feature = "parallel")]
pub use parallel::ParallelOps;

#[cfg(feature = "parallel")]
mod parallel {
    use rayon::prelude::*;

    use super::AcceleratedOps;
    use crate::engine::Matrix;

    /// Entries per work item. Small grids end up as a single chunk.
    const CHUNK: usize = 4096;

    /// Rayon-backed implementation.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ParallelOps;

    impl AcceleratedOps for ParallelOps {
        fn name(&self) -> &'static str {
            "parallel"
        }

        fn sum_all(&self, matrix: &Matrix) -> f64 {
            matrix
                .as_slice()
                .par_chunks(CHUNK)
                .map(|chunk| chunk.iter().sum::<f64>())
                .sum()
        }

        fn scale(&self, matrix: &Matrix, factor: f64) -> Matrix {
            let data: Vec<f64> = matrix
                .as_slice()
                .par_iter()
                .with_min_len(CHUNK)
                .map(|v| v * factor)
                .collect();
            matrix.with_same_shape(data)
        }
    }
}

/// Which backend the caller asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Parallel when compiled in and more than one worker is available.
    #[default]
    Auto,
    Portable,
    Parallel,
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "portable" => Ok(BackendPreference::Portable),
            "parallel" => Ok(BackendPreference::Parallel),
            other => Err(format!("Unknown backend: {}", other)),
        }
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendPreference::Auto => "auto",
            BackendPreference::Portable => "portable",
            BackendPreference::Parallel => "parallel",
        };
        f.write_str(name)
    }
}

/// Whether the parallel backend is compiled in and has more than one worker.
pub fn parallel_available() -> bool {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads() > 1
    }
    #[cfg(not(feature = "parallel"))]
    {
        false
    }
}

/// Pick a backend once at startup. An explicit `Parallel` request falls back
/// to the portable backend when the feature is compiled out.
pub fn select_backend(pref: BackendPreference) -> Box<dyn AcceleratedOps> {
    match pref {
        BackendPreference::Portable => Box::new(PortableOps),
        BackendPreference::Parallel => parallel_or_portable(),
        BackendPreference::Auto => {
            if parallel_available() {
                parallel_or_portable()
            } else {
                Box::new(PortableOps)
            }
        }
    }
}

fn parallel_or_portable() -> Box<dyn AcceleratedOps> {
    #[cfg(feature = "parallel")]
    {
        Box::new(ParallelOps)
    }
    #[cfg(not(feature = "parallel"))]
    {
        Box::new(PortableOps)
    }
}

/// Compare two sums within [`SUM_TOLERANCE`], relative to the larger magnitude.
pub fn sums_agree(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= SUM_TOLERANCE * scale
}
