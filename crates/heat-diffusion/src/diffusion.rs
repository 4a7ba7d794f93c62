//! Chebyshev heat-kernel diffusion: `Y(τ) ≈ e^{−τL} X`.
//!
//! ## Two-phase protocol
//!
//! | Phase      | Cost                          | Depends on τ |
//! |------------|-------------------------------|--------------|
//! | `prepare`  | 1 Lanczos + K sparse products | no           |
//! | `evaluate` | K+1 coefficients + K+1 axpys  | yes          |
//!
//! The polynomial basis is the expensive part and is shared by every τ, so
//! [`DiffusionOperator::prepare`] returns a [`PreparedDiffusion`] handle that
//! owns it and can be evaluated any number of times.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use heat_diffusion::{DiffusionOperator, ErrorBound, ErrorTarget};
//!
//! let op = DiffusionOperator::default();
//!
//! // One shot, order chosen from a bound
//! let ys = op.compute(&lap, x.view(), &[0.1, 1.0], ErrorTarget::new(ErrorBound::Generic, 1e-6))?;
//!
//! // Prepare once, evaluate many times
//! let handle = op.prepare(&lap, x.view(), 40)?;
//! let y = handle.evaluate(0.5)?;
//! ```

use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, IxDyn};
use rayon::prelude::*;
use tracing::instrument;

use crate::bounds::SignalStats;
use crate::chebyshev::{PolynomialBasis, K_DEFAULT};
use crate::config::DiffusionConfig;
use crate::error::{DiffusionError, Result};
use crate::operator::{check_signal, check_times, LinearOperator};
use crate::order::{reverse_bound, ErrorTarget};
use crate::spectral::dominant_eigenvalue;

// ─────────────────────────────────────────────
// Order
// ─────────────────────────────────────────────

/// How the truncation order is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Order {
    /// Use exactly this `K`.
    Fixed(usize),
    /// Smallest `K` whose bound meets the target at every requested τ.
    Target(ErrorTarget),
}

impl Default for Order {
    fn default() -> Self {
        Order::Fixed(K_DEFAULT)
    }
}

impl From<usize> for Order {
    fn from(k: usize) -> Self {
        Order::Fixed(k)
    }
}

impl From<ErrorTarget> for Order {
    fn from(target: ErrorTarget) -> Self {
        Order::Target(target)
    }
}

// ─────────────────────────────────────────────
// DiffusionOperator
// ─────────────────────────────────────────────

/// Chebyshev approximation of the heat kernel action.
///
/// Stateless: build once, call [`compute`](Self::compute) or
/// [`prepare`](Self::prepare) for any number of operators and signals.
#[derive(Debug, Clone, Default)]
pub struct DiffusionOperator {
    pub config: DiffusionConfig,
}

impl DiffusionOperator {
    pub fn new(config: DiffusionConfig) -> Self {
        Self { config }
    }

    /// Spectral scale `φ ≈ λ_max / 2` used for `op`.
    ///
    /// The zero operator has `λ_max = 0`; any positive scale encloses its
    /// spectrum, so `φ = 1` is used instead.
    pub fn spectral_scale<A: LinearOperator + ?Sized>(&self, op: &A) -> Result<f64> {
        let est = dominant_eigenvalue(op, &self.config.spectral)?;
        if est.lambda_max == 0.0 {
            tracing::warn!(n = op.shape().0, "zero operator: using spectral scale φ = 1");
            return Ok(1.0);
        }
        tracing::debug!(
            lambda_max = est.lambda_max,
            residual = est.residual,
            iterations = est.iterations,
            "spectral scale resolved"
        );
        Ok(est.phi())
    }

    /// Smallest order meeting `target` at every τ in `taus`.
    ///
    /// The basis is shared across τ, so this is the maximum of the per-τ
    /// orders.
    pub fn select_order(
        &self,
        phi:    f64,
        x:      ArrayView2<'_, f64>,
        taus:   &[f64],
        target: &ErrorTarget,
    ) -> Result<usize> {
        check_times(taus)?;
        let stats = SignalStats::of(x);
        let max_order = self.config.order_search.max_order;
        let mut order = 1usize;
        for &tau in taus {
            order = order.max(reverse_bound(target, phi, &stats, tau, max_order)?);
        }
        Ok(order)
    }

    /// One-shot `e^{−τL} X` for every τ in `taus`, in input order.
    #[instrument(skip_all, fields(n = x.nrows(), d = x.ncols(), times = taus.len()))]
    pub fn compute<A: LinearOperator + ?Sized>(
        &self,
        op:    &A,
        x:     ArrayView2<'_, f64>,
        taus:  &[f64],
        order: impl Into<Order>,
    ) -> Result<Vec<Array2<f64>>> {
        self.prepare_for(op, x, taus, order)?.evaluate_many(taus)
    }

    /// Build the order-`order` polynomial basis of `x` once.
    #[instrument(skip_all, fields(n = x.nrows(), d = x.ncols(), order = order))]
    pub fn prepare<A: LinearOperator + ?Sized>(
        &self,
        op:    &A,
        x:     ArrayView2<'_, f64>,
        order: usize,
    ) -> Result<PreparedDiffusion> {
        self.config.validate()?;
        check_signal(op, x)?;
        let phi = self.spectral_scale(op)?;
        self.build(op, x, phi, order)
    }

    /// Like [`prepare`](Self::prepare), resolving an [`Order`] for the given
    /// times first.
    pub fn prepare_for<A: LinearOperator + ?Sized>(
        &self,
        op:    &A,
        x:     ArrayView2<'_, f64>,
        taus:  &[f64],
        order: impl Into<Order>,
    ) -> Result<PreparedDiffusion> {
        self.config.validate()?;
        check_signal(op, x)?;
        check_times(taus)?;
        let phi = self.spectral_scale(op)?;
        let k = match order.into() {
            Order::Fixed(k) => k,
            Order::Target(target) => self.select_order(phi, x, taus, &target)?,
        };
        self.build(op, x, phi, k)
    }

    fn build<A: LinearOperator + ?Sized>(
        &self,
        op:    &A,
        x:     ArrayView2<'_, f64>,
        phi:   f64,
        order: usize,
    ) -> Result<PreparedDiffusion> {
        let basis = PolynomialBasis::compute(op, x, phi, order)?;
        Ok(PreparedDiffusion { basis, parallel: self.config.parallel })
    }
}

// ─────────────────────────────────────────────
// PreparedDiffusion
// ─────────────────────────────────────────────

/// A precomputed polynomial basis, evaluable at any diffusion time.
#[derive(Debug, Clone)]
pub struct PreparedDiffusion {
    basis:    PolynomialBasis,
    parallel: bool,
}

impl PreparedDiffusion {
    pub fn order(&self) -> usize {
        self.basis.order()
    }

    pub fn phi(&self) -> f64 {
        self.basis.phi()
    }

    /// `(n, d)` of the signal and of every result.
    pub fn shape(&self) -> (usize, usize) {
        self.basis.dim()
    }

    pub fn basis(&self) -> &PolynomialBasis {
        &self.basis
    }

    pub fn evaluate(&self, tau: f64) -> Result<Array2<f64>> {
        check_times(&[tau])?;
        self.basis.evaluate(tau)
    }

    /// One result per τ, in input order.
    ///
    /// Each τ is combined sequentially in increasing `k`, so parallel and
    /// sequential evaluation give identical bits.
    pub fn evaluate_many(&self, taus: &[f64]) -> Result<Vec<Array2<f64>>> {
        check_times(taus)?;
        if self.parallel {
            taus.par_iter().map(|&tau| self.basis.evaluate(tau)).collect()
        } else {
            taus.iter().map(|&tau| self.basis.evaluate(tau)).collect()
        }
    }

    /// Evaluate an arbitrarily shaped grid of times.
    ///
    /// The output has shape `taus.shape() ++ (n, d)`.
    pub fn evaluate_grid(&self, taus: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        let flat: Vec<f64> = taus.iter().copied().collect();
        let results = self.evaluate_many(&flat)?;

        let (n, d) = self.shape();
        let mut shape = taus.shape().to_vec();
        shape.extend([n, d]);

        let mut data = Vec::with_capacity(results.len() * n * d);
        for y in &results {
            data.extend(y.iter().copied());
        }
        ArrayD::from_shape_vec(IxDyn(&shape), data)
            .map_err(|e| DiffusionError::InvalidParameter(format!("time grid: {e}")))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::ErrorBound;
    use crate::laplacian::{combinatorial_laplacian, path_edges, ring_edges};
    use ndarray::{array, s, Array, Ix4};
    use sprs::CsMat;

    fn path(n: usize) -> CsMat<f64> {
        combinatorial_laplacian(n, &path_edges(n)).unwrap()
    }

    fn impulse(n: usize, at: usize) -> Array2<f64> {
        let mut x = Array2::zeros((n, 1));
        x[[at, 0]] = 1.0;
        x
    }

    // ── Order resolution ──────────────────────

    #[test]
    fn default_order_is_k_default() {
        assert_eq!(Order::default(), Order::Fixed(10));
        assert_eq!(Order::from(7), Order::Fixed(7));
    }

    #[test]
    fn several_times_use_largest_order() {
        let lap = path(20);
        let x = impulse(20, 0);
        let op = DiffusionOperator::default();
        let target = ErrorTarget::new(ErrorBound::Generic, 1e-8);

        let phi = op.spectral_scale(&lap).unwrap();
        let k_small = op.select_order(phi, x.view(), &[0.1], &target).unwrap();
        let k_large = op.select_order(phi, x.view(), &[5.0], &target).unwrap();
        assert!(k_small < k_large);

        let prepared = op.prepare_for(&lap, x.view(), &[0.1, 5.0], target).unwrap();
        assert_eq!(prepared.order(), k_large);
    }

    #[test]
    fn long_path_prepares_within_lanczos_budget() {
        let n = 600;
        let lap = path(n);
        let x = impulse(n, n / 2);
        let op = DiffusionOperator::default();

        let phi = op.spectral_scale(&lap).unwrap();
        let exact = 1.0 + (std::f64::consts::PI / n as f64).cos();
        assert!(phi >= exact && phi - exact < 1e-2, "φ = {phi} vs {exact}");

        let handle = op.prepare_for(&lap, x.view(), &[1.0], ErrorTarget::new(ErrorBound::Generic, 1e-8)).unwrap();
        let y = handle.evaluate(1.0).unwrap();
        assert!((y.sum() - 1.0).abs() < 1e-6, "mass = {}", y.sum());
    }

    // ── Mass and identity ─────────────────────

    #[test]
    fn mass_is_preserved_on_ring() {
        let lap = combinatorial_laplacian(16, &ring_edges(16)).unwrap();
        let x = impulse(16, 3);
        let op = DiffusionOperator::default();
        let ys = op
            .compute(&lap, x.view(), &[0.5, 2.0], ErrorTarget::new(ErrorBound::Generic, 1e-10))
            .unwrap();
        for y in &ys {
            assert!((y.sum() - 1.0).abs() < 1e-8, "mass = {}", y.sum());
        }
    }

    #[test]
    fn zero_time_returns_input() {
        let lap = path(6);
        let x = array![[1.0, 0.0], [2.0, -1.0], [0.0, 0.5], [3.0, 0.0], [0.0, 0.0], [1.0, 1.0]];
        let y = DiffusionOperator::default().compute(&lap, x.view(), &[0.0], Order::Fixed(12)).unwrap();
        assert_eq!(y[0], x);
    }

    #[test]
    fn zero_operator_acts_as_identity() {
        let zero = Array2::<f64>::zeros((4, 4));
        let x = array![[1.0], [-2.0], [0.5], [4.0]];
        let op = DiffusionOperator::default();
        assert_eq!(op.spectral_scale(&zero).unwrap(), 1.0);
        let y = op.compute(&zero, x.view(), &[0.5], Order::default()).unwrap().remove(0);
        for (a, b) in y.iter().zip(x.iter()) {
            assert!((a - b).abs() < 1e-10, "{a} vs {b}");
        }
    }

    // ── Reuse ─────────────────────────────────

    #[test]
    fn prepared_handle_matches_compute() {
        let lap = path(12);
        let x = impulse(12, 4);
        let op = DiffusionOperator::default();
        let handle = op.prepare(&lap, x.view(), 25).unwrap();
        for tau in [0.05, 0.5, 3.0] {
            let once = op.compute(&lap, x.view(), &[tau], Order::Fixed(25)).unwrap();
            assert_eq!(handle.evaluate(tau).unwrap(), once[0]);
        }
    }

    #[test]
    fn evaluate_many_preserves_order() {
        let lap = path(8);
        let handle = DiffusionOperator::default().prepare(&lap, impulse(8, 0).view(), 20).unwrap();
        let taus = [2.0, 0.1, 1.0];
        let ys = handle.evaluate_many(&taus).unwrap();
        for (tau, y) in taus.iter().zip(&ys) {
            assert_eq!(*y, handle.evaluate(*tau).unwrap());
        }
    }

    #[test]
    fn parallel_evaluation_is_bit_identical() {
        let lap = path(30);
        let x = impulse(30, 15);
        let seq = DiffusionOperator::default();
        let par = DiffusionOperator::new(DiffusionConfig { parallel: true, ..Default::default() });
        let taus: Vec<f64> = (0..9).map(|i| 0.25 * i as f64).collect();
        assert_eq!(
            seq.compute(&lap, x.view(), &taus, Order::Fixed(30)).unwrap(),
            par.compute(&lap, x.view(), &taus, Order::Fixed(30)).unwrap()
        );
    }

    #[test]
    fn grid_output_appends_signal_shape() {
        let lap = path(5);
        let x = array![[1.0, 0.0], [0.0, 0.0], [0.0, 1.0], [0.0, 0.0], [0.0, 0.0]];
        let handle = DiffusionOperator::default().prepare(&lap, x.view(), 15).unwrap();
        let grid = Array::from_shape_vec((2, 3), vec![0.0, 0.1, 0.2, 0.5, 1.0, 2.0])
            .unwrap()
            .into_dyn();
        let out = handle.evaluate_grid(grid.view()).unwrap();
        assert_eq!(out.shape(), &[2, 3, 5, 2]);
        let out = out.into_dimensionality::<Ix4>().unwrap();
        let at = out.slice(s![1, 2, .., ..]).to_owned();
        assert_eq!(at, handle.evaluate(2.0).unwrap());
    }

    // ── Errors ────────────────────────────────

    #[test]
    fn zero_sum_signal_needs_explicit_order() {
        let lap = path(5);
        let x = array![[1.0], [0.0], [0.0], [0.0], [-1.0]];
        let op = DiffusionOperator::default();
        let target = ErrorTarget::new(ErrorBound::SignalSpecific, 1e-6);
        assert!(matches!(
            op.compute(&lap, x.view(), &[0.3], target),
            Err(DiffusionError::DegenerateSignal { .. })
        ));
        assert!(op.compute(&lap, x.view(), &[0.3], Order::Fixed(20)).is_ok());
    }

    #[test]
    fn row_mismatch_is_rejected() {
        let lap = path(5);
        let x = Array2::<f64>::zeros((4, 1));
        assert_eq!(
            DiffusionOperator::default().prepare(&lap, x.view(), 5).unwrap_err(),
            DiffusionError::DimensionMismatch { expected: 5, got: 4 }
        );
    }

    #[test]
    fn negative_time_is_rejected() {
        let lap = path(5);
        let handle = DiffusionOperator::default().prepare(&lap, impulse(5, 0).view(), 5).unwrap();
        assert!(matches!(handle.evaluate(-0.1), Err(DiffusionError::InvalidParameter(_))));
    }
}
