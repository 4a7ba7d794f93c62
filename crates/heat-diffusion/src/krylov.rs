//! Krylov–Arnoldi approximation of `e^{−tA} v` with adaptive residual-time
//! restarting (ART).
//!
//! Computes `y = exp(−t·A)·v`; the sign is applied internally, callers pass
//! the Laplacian itself.
//!
//! ## Arnoldi
//!
//! ```text
//! β = ‖v‖,  v_0 = v / β
//! w = A·v_j,  h_ij = ⟨w, v_i⟩,  w ← w − h_ij v_i    (i = 0..=j, MGS)
//! h_{j+1,j} = ‖w‖,  v_{j+1} = w / h_{j+1,j}
//! y ≈ β · V_j · exp(−t H_j) e_1
//! ```
//!
//! ## Residual
//!
//! The residual of the Krylov approximation at time `s` is
//! `r(s) = −β h_{j+1,j} (e_jᵀ exp(−s H_j) e_1) v_{j+1}`; it is checked on the
//! grid `s = t·i/q, i = 0..=q`, refined geometrically towards 0 until
//! `s·‖H_j‖_∞ ≤ 1`. For large `t`, `r(s)` peaks at small `s` and has decayed
//! by the first uniform point.
//!
//! ## Restarting
//!
//! If the basis reaches `max_dim` before the residual is small enough, the
//! interval is split into `N` substeps (starting at `initial_substeps`,
//! doubled until a single substep is accurate). The approximation is then
//! advanced substep by substep while the residual stays within tolerance,
//! the accepted vector becomes the new start vector, and the Arnoldi process
//! restarts on the remaining time.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use tracing::instrument;

use crate::config::KrylovConfig;
use crate::error::{DiffusionError, Result};
use crate::operator::{check_signal, check_times, square_dim, LinearOperator};

/// `h_{j+1,j}` below this fraction of `‖A v_j‖` is an invariant subspace.
const BREAKDOWN_TOL: f64 = 1e-12;

/// Work counters of one [`art_expm`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtReport {
    /// Number of restarts performed.
    pub restarts:   usize,
    /// Operator applications (matrix–vector products).
    pub matvecs:    usize,
    /// Dimension of the Krylov space that produced the result.
    pub krylov_dim: usize,
}

// ─────────────────────────────────────────────
// State machine
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum ArtState {
    /// Normalise the current start vector and reset the basis.
    Start,
    /// Extend the basis with column `j + 1`.
    Building { j: usize },
    /// Check the residual of the `(j+1)`-dimensional approximation.
    Checking { j: usize, h_next: f64 },
    /// Basis exhausted: accept part of the interval and restart.
    Restarting { j: usize, h_next: f64 },
    /// Emit `β V_j exp(−t H_j) e_1`.
    Converged { j: usize },
}

/// `y = exp(−t·A)·v` by restarted Arnoldi.
///
/// `t = 0` returns `v` unchanged and a zero `v` returns zeros, both without
/// touching the operator.
#[instrument(skip_all, fields(n = v.len(), t = t, max_dim = config.max_dim))]
pub fn art_expm<A: LinearOperator + ?Sized>(
    op:     &A,
    v:      ArrayView1<'_, f64>,
    t:      f64,
    config: &KrylovConfig,
) -> Result<(Array1<f64>, ArtReport)> {
    config.validate()?;
    let n = square_dim(op)?;
    if v.len() != n {
        return Err(DiffusionError::DimensionMismatch { expected: n, got: v.len() });
    }
    check_times(&[t])?;

    let mut report = ArtReport::default();
    if t == 0.0 {
        return Ok((v.to_owned(), report));
    }
    if v.iter().all(|x| *x == 0.0) {
        return Ok((Array1::zeros(n), report));
    }

    let m = config.max_dim.min(n);
    let tol = config.tolerance;

    let mut start = v.to_owned();
    let mut beta = 0.0f64;
    let mut t_rem = t;
    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(m + 1);
    let mut h = Array2::<f64>::zeros((m + 1, m));
    let mut stalled = 0usize;

    let mut state = ArtState::Start;
    loop {
        state = match state {
            ArtState::Start => {
                beta = norm(&start);
                basis.clear();
                h.fill(0.0);
                basis.push(&start / beta);
                ArtState::Building { j: 0 }
            }

            ArtState::Building { j } => {
                let mut w = op.apply_vec(basis[j].view());
                report.matvecs += 1;
                let w_norm = norm(&w);
                for (i, vi) in basis.iter().enumerate().take(j + 1) {
                    let hij = w.dot(vi);
                    h[[i, j]] = hij;
                    w.scaled_add(-hij, vi);
                }
                let h_next = norm(&w);
                h[[j + 1, j]] = h_next;

                if h_next <= BREAKDOWN_TOL * w_norm || j + 1 == n {
                    tracing::debug!(dim = j + 1, h_next, "Krylov space is invariant");
                    ArtState::Converged { j }
                } else {
                    basis.push(w / h_next);
                    ArtState::Checking { j, h_next }
                }
            }

            ArtState::Checking { j, h_next } => {
                let hj = hessenberg(&h, j + 1);
                let residual = check_grid(&hj, t_rem, config.check_points)
                    .into_iter()
                    .map(|s| (h_next * expm_e1(&hj, s)[j]).abs())
                    .fold(0.0f64, f64::max);

                if residual <= tol {
                    ArtState::Converged { j }
                } else if j + 1 == m {
                    ArtState::Restarting { j, h_next }
                } else {
                    ArtState::Building { j: j + 1 }
                }
            }

            ArtState::Converged { j } => {
                let u = expm_e1(&hessenberg(&h, j + 1), t_rem);
                report.krylov_dim = j + 1;
                return Ok((combine(&basis, beta, &u), report));
            }

            ArtState::Restarting { j, h_next } => {
                let hj = hessenberg(&h, j + 1);

                // Smallest substep count whose first substep is accurate.
                let mut substeps = config.initial_substeps;
                let step = loop {
                    let step = scaled_exp(&hj, t_rem / substeps as f64);
                    if (h_next * step[(j, 0)]).abs() <= tol {
                        break step;
                    }
                    substeps = substeps.saturating_mul(2);
                    if substeps > config.max_substeps {
                        return Err(DiffusionError::KrylovStall {
                            restarts:          report.restarts,
                            remaining:         t_rem,
                            total:             t,
                            accepted_fraction: 0.0,
                        });
                    }
                };

                // Advance while the residual stays within tolerance.
                let mut u = DVector::<f64>::zeros(j + 1);
                u[0] = 1.0;
                let mut accepted = 0usize;
                while accepted < substeps {
                    let next = &step * &u;
                    if (h_next * next[j]).abs() > tol {
                        break;
                    }
                    u = next;
                    accepted += 1;
                }

                if accepted == substeps {
                    report.krylov_dim = j + 1;
                    return Ok((combine(&basis, beta, &u), report));
                }

                let fraction = accepted as f64 / substeps as f64;
                start = combine(&basis, beta, &u);
                t_rem -= t_rem * fraction;
                report.restarts += 1;
                tracing::debug!(
                    restarts = report.restarts,
                    fraction,
                    remaining = t_rem,
                    substeps,
                    "ART restart"
                );

                if fraction < config.min_progress {
                    stalled += 1;
                } else {
                    stalled = 0;
                }
                if stalled > config.max_stalled_restarts || report.restarts > config.max_restarts {
                    return Err(DiffusionError::KrylovStall {
                        restarts:          report.restarts,
                        remaining:         t_rem,
                        total:             t,
                        accepted_fraction: fraction,
                    });
                }
                ArtState::Start
            }
        };
    }
}

fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Leading `k × k` block of the Hessenberg matrix.
fn hessenberg(h: &Array2<f64>, k: usize) -> DMatrix<f64> {
    DMatrix::from_fn(k, k, |r, c| h[[r, c]])
}

/// Residual check times on `[0, t]`: uniform `t·i/q` plus `t/(q·2^k)`
/// down to the scale `1/‖H‖_∞`.
fn check_grid(h: &DMatrix<f64>, t: f64, q: usize) -> Vec<f64> {
    let h_norm = h.row_iter().map(|r| r.iter().map(|e| e.abs()).sum::<f64>()).fold(0.0, f64::max);
    let mut grid: Vec<f64> = (0..=q).map(|i| t * i as f64 / q as f64).collect();
    let mut s = t / q as f64;
    while s * h_norm > 1.0 {
        s /= 2.0;
        grid.push(s);
    }
    grid
}

/// `exp(−s·H)`.
fn scaled_exp(h: &DMatrix<f64>, s: f64) -> DMatrix<f64> {
    h.map(|e| -s * e).exp()
}

/// `exp(−s·H) e_1`.
fn expm_e1(h: &DMatrix<f64>, s: f64) -> DVector<f64> {
    scaled_exp(h, s).column(0).into_owned()
}

/// `β · Σ_i u_i v_i`.
fn combine(basis: &[Array1<f64>], beta: f64, u: &DVector<f64>) -> Array1<f64> {
    let mut y = Array1::zeros(basis[0].len());
    for (vi, &ui) in basis.iter().zip(u.iter()) {
        y.scaled_add(beta * ui, vi);
    }
    y
}

// ─────────────────────────────────────────────
// KrylovExpm
// ─────────────────────────────────────────────

/// ART approximation of `exp(−tA) X` for dense signal blocks.
///
/// Columns of `X` are independent; with `parallel` set they run on the
/// rayon pool.
#[derive(Debug, Clone, Default)]
pub struct KrylovExpm {
    config: KrylovConfig,
}

impl KrylovExpm {
    pub fn new(config: KrylovConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &KrylovConfig {
        &self.config
    }

    pub fn apply_vec<A: LinearOperator + ?Sized>(
        &self,
        op: &A,
        v:  ArrayView1<'_, f64>,
        t:  f64,
    ) -> Result<Array1<f64>> {
        art_expm(op, v, t, &self.config).map(|(y, _)| y)
    }

    /// [`apply_vec`](Self::apply_vec) together with its work counters.
    pub fn apply_vec_report<A: LinearOperator + ?Sized>(
        &self,
        op: &A,
        v:  ArrayView1<'_, f64>,
        t:  f64,
    ) -> Result<(Array1<f64>, ArtReport)> {
        art_expm(op, v, t, &self.config)
    }

    /// `exp(−tA) X`, column by column.
    pub fn apply<A: LinearOperator + Sync + ?Sized>(
        &self,
        op: &A,
        x:  ArrayView2<'_, f64>,
        t:  f64,
    ) -> Result<Array2<f64>> {
        let n = check_signal(op, x)?;
        let d = x.ncols();
        let columns: Vec<Array1<f64>> = if self.config.parallel {
            (0..d)
                .into_par_iter()
                .map(|c| self.apply_vec(op, x.column(c), t))
                .collect::<Result<_>>()?
        } else {
            (0..d)
                .map(|c| self.apply_vec(op, x.column(c), t))
                .collect::<Result<_>>()?
        };

        let mut y = Array2::zeros((n, d));
        for (c, col) in columns.iter().enumerate() {
            y.column_mut(c).assign(col);
        }
        Ok(y)
    }

    /// One result per τ, in input order.
    pub fn apply_many<A: LinearOperator + Sync + ?Sized>(
        &self,
        op:   &A,
        x:    ArrayView2<'_, f64>,
        taus: &[f64],
    ) -> Result<Vec<Array2<f64>>> {
        check_times(taus)?;
        taus.iter().map(|&t| self.apply(op, x, t)).collect()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
