//! Dominant-eigenvalue estimation for symmetric operators.
//!
//! The Chebyshev recurrence needs a spectral scale `φ ≥ λ_max / 2` so
//! that `L/φ − I` has its spectrum in `[−1, 1]`. A dense eigensolve is never
//! affordable on large graphs, so `λ_max` comes from a Lanczos iteration:
//!
//! ```text
//! w       = A·v_j − β_{j−1}·v_{j−1}
//! α_j     = ⟨w, v_j⟩
//! w      ← w − α_j·v_j            (then full re-orthogonalisation)
//! β_j     = ‖w‖,   v_{j+1} = w / β_j
//! ```
//!
//! The dominant Ritz pair `(θ, s)` of the tridiagonal `T_j = tridiag(β, α, β)`
//! comes from nalgebra's symmetric eigensolver. The iteration stops once the
//! Ritz residual `|β_j·s_j|` falls below `tolerance·|θ|`, when an invariant
//! subspace is found (`β_j ≈ 0`), or when the Krylov space spans the whole
//! operator. On clustered spectra θ approaches `λ_max` from below long before
//! the residual vanishes, so the spectral scale is taken from `θ + |β_j·s_j|`.

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SpectralConfig;
use crate::error::{DiffusionError, Result};
use crate::operator::{square_dim, LinearOperator};

/// Relative size of `β_j` below which the Krylov space is declared invariant.
const BREAKDOWN_TOL: f64 = 1e-14;

/// Lanczos steps between two eigensolves of the tridiagonal matrix.
const CHECK_EVERY: usize = 5;

/// Outcome of a Lanczos run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralEstimate {
    /// Dominant Ritz value magnitude, the estimate of `max |λ_i|`.
    pub lambda_max: f64,
    /// Lanczos steps performed.
    pub iterations: usize,
    /// Ritz residual `|β_j·s_j|` of the dominant pair (0 on breakdown / full span).
    pub residual:   f64,
}

impl SpectralEstimate {
    /// `λ_max` padded by its Ritz residual.
    pub fn upper_bound(&self) -> f64 {
        self.lambda_max + self.residual
    }

    /// Spectral scale `φ = (λ_max + |β_j·s_j|) / 2`.
    pub fn phi(&self) -> f64 {
        self.upper_bound() / 2.0
    }
}

/// Estimate the dominant eigenvalue magnitude of a symmetric operator.
///
/// Fails with [`DiffusionError::SpectralComputation`] if the Ritz residual
/// is still above `config.tolerance·θ` after `config.max_iterations` steps.
pub fn dominant_eigenvalue<A: LinearOperator + ?Sized>(
    op:     &A,
    config: &SpectralConfig,
) -> Result<SpectralEstimate> {
    config.validate()?;
    let n = square_dim(op)?;
    if n == 0 {
        return Ok(SpectralEstimate { lambda_max: 0.0, iterations: 0, residual: 0.0 });
    }
    let m = config.max_iterations.min(n);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut v: Array1<f64> = (0..n).map(|_| rng.gen::<f64>() - 0.5).collect();
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v /= norm;
    } else {
        v[0] = 1.0;
    }

    let mut alpha: Vec<f64> = Vec::with_capacity(m);
    let mut beta: Vec<f64> = Vec::with_capacity(m);
    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(m + 1);
    basis.push(v);

    let mut estimate = 0.0f64;
    let mut residual = f64::INFINITY;
    let mut scale = 0.0f64;

    for j in 0..m {
        let vj = &basis[j];
        let mut w = op.apply_vec(vj.view());

        let a_j = w.dot(vj);
        alpha.push(a_j);
        w.scaled_add(-a_j, vj);
        if j > 0 {
            w.scaled_add(-beta[j - 1], &basis[j - 1]);
        }
        // Full re-orthogonalisation keeps ghost copies of λ_max away.
        for prev in &basis {
            let proj = w.dot(prev);
            w.scaled_add(-proj, prev);
        }

        let b_j = w.dot(&w).sqrt();
        scale = scale.max(a_j.abs()).max(b_j);

        if b_j <= BREAKDOWN_TOL * scale || j + 1 == n {
            let (theta, _) = dominant_ritz(&alpha, &beta, 0.0);
            tracing::debug!(iterations = j + 1, lambda_max = theta, "Lanczos spanned an invariant subspace");
            return Ok(SpectralEstimate { lambda_max: theta, iterations: j + 1, residual: 0.0 });
        }

        if (j + 1) % CHECK_EVERY == 0 || j + 1 == m {
            let (theta, r) = dominant_ritz(&alpha, &beta, b_j);
            estimate = theta;
            residual = r;
            if r <= config.tolerance * theta.max(f64::MIN_POSITIVE) {
                tracing::debug!(iterations = j + 1, lambda_max = theta, residual = r, "Lanczos converged");
                return Ok(SpectralEstimate { lambda_max: theta, iterations: j + 1, residual: r });
            }
        }

        beta.push(b_j);
        basis.push(w / b_j);
    }

    Err(DiffusionError::SpectralComputation { iterations: m, estimate, residual })
}

/// Spectral scale `φ ≈ λ_max / 2` of `op`, padded by the Ritz residual.
pub fn spectral_scale<A: LinearOperator + ?Sized>(op: &A, config: &SpectralConfig) -> Result<f64> {
    dominant_eigenvalue(op, config).map(|e| e.phi())
}

// ─────────────────────────────────────────────
// Tridiagonal Ritz pair
// ─────────────────────────────────────────────

/// Dominant Ritz value and its residual for `T = tridiag(beta, alpha, beta)`
/// extended by the trailing coupling `next`.
fn dominant_ritz(alpha: &[f64], beta: &[f64], next: f64) -> (f64, f64) {
    let k = alpha.len();
    let t = DMatrix::from_fn(k, k, |i, j| match i.abs_diff(j) {
        0 => alpha[i],
        1 => beta[i.min(j)],
        _ => 0.0,
    });
    let eig = SymmetricEigen::new(t);
    let (idx, theta) = eig
        .eigenvalues
        .iter()
        .copied()
        .enumerate()
        .fold((0, 0.0f64), |best, (i, l)| if l.abs() > best.1.abs() { (i, l) } else { best });
    (theta.abs(), (next * eig.eigenvectors[(k - 1, idx)]).abs())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
