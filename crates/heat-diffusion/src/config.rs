//! Tuning parameters for the Chebyshev and Krylov engines.

use serde::{Deserialize, Serialize};

use crate::error::{DiffusionError, Result};

// ─────────────────────────────────────────────
// Spectral (Lanczos)
// ─────────────────────────────────────────────

/// Budget for the dominant-eigenvalue estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Maximum Lanczos steps (capped at the operator dimension).
    pub max_iterations: usize,
    /// Relative Ritz residual `|β_j s_j| / |θ|` accepted as converged.
    /// The scale handed to the Chebyshev recurrence is padded by that residual.
    pub tolerance:      f64,
    /// Seed of the random Lanczos start vector.
    pub seed:           u64,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance:      1e-3,
            seed:           42,
        }
    }
}

impl SpectralConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(DiffusionError::InvalidParameter(
                "spectral.max_iterations must be ≥ 1".into(),
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(DiffusionError::InvalidParameter(format!(
                "spectral.tolerance must be > 0, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Order search
// ─────────────────────────────────────────────

/// Limits for [`reverse_bound`](crate::order::reverse_bound).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSearchConfig {
    /// Largest Chebyshev order the search may return.
    pub max_order: usize,
}

impl Default for OrderSearchConfig {
    fn default() -> Self {
        Self { max_order: 100_000 }
    }
}

// ─────────────────────────────────────────────
// Chebyshev diffusion
// ─────────────────────────────────────────────

/// Configuration of [`DiffusionOperator`](crate::diffusion::DiffusionOperator).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    pub spectral:     SpectralConfig,
    pub order_search: OrderSearchConfig,
    /// Evaluate independent τ values on the rayon pool.
    pub parallel:     bool,
}

impl DiffusionConfig {
    pub fn validate(&self) -> Result<()> {
        self.spectral.validate()?;
        if self.order_search.max_order == 0 {
            return Err(DiffusionError::InvalidParameter(
                "order_search.max_order must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Krylov (ART)
// ─────────────────────────────────────────────

/// Configuration of [`KrylovExpm`](crate::krylov::KrylovExpm).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KrylovConfig {
    /// Maximum Krylov subspace dimension `m` before a restart.
    pub max_dim:              usize,
    /// Residual tolerance, relative to the norm of the current start vector.
    pub tolerance:            f64,
    /// Uniform points `t·i/q, i = 0..=q` of the convergence check.
    pub check_points:         usize,
    /// Initial number of substeps in the restart scan.
    pub initial_substeps:     usize,
    /// The restart scan gives up (stall) beyond this many substeps.
    pub max_substeps:         usize,
    /// Hard cap on the number of restarts of a single call.
    pub max_restarts:         usize,
    /// A restart accepting less than this fraction of the remaining time is a stall.
    pub min_progress:         f64,
    /// Consecutive stalled restarts tolerated before failing.
    pub max_stalled_restarts: usize,
    /// Process signal columns on the rayon pool.
    pub parallel:             bool,
}

impl Default for KrylovConfig {
    fn default() -> Self {
        Self {
            max_dim:              30,
            tolerance:            1e-8,
            check_points:         6,
            initial_substeps:     100,
            max_substeps:         100 << 20,
            max_restarts:         10_000,
            min_progress:         1e-4,
            max_stalled_restarts: 5,
            parallel:             false,
        }
    }
}

impl KrylovConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_dim == 0 {
            return Err(DiffusionError::InvalidParameter("krylov.max_dim must be ≥ 1".into()));
        }
        if !(self.tolerance > 0.0) {
            return Err(DiffusionError::InvalidParameter(format!(
                "krylov.tolerance must be > 0, got {}",
                self.tolerance
            )));
        }
        if self.check_points == 0 || self.initial_substeps == 0 {
            return Err(DiffusionError::InvalidParameter(
                "krylov.check_points and krylov.initial_substeps must be ≥ 1".into(),
            ));
        }
        if self.max_substeps < self.initial_substeps {
            return Err(DiffusionError::InvalidParameter(
                "krylov.max_substeps must be ≥ krylov.initial_substeps".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.min_progress) {
            return Err(DiffusionError::InvalidParameter(format!(
                "krylov.min_progress must lie in [0, 1), got {}",
                self.min_progress
            )));
        }
        Ok(())
    }
}
