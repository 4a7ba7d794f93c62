//! The operator interface consumed by every engine in this crate.
//!
//! Both the Chebyshev recurrence and the Arnoldi process only ever need
//! `Y = A·X` for a dense block `X`, so the operator is abstracted behind
//! [`LinearOperator`]. Implementations are provided for `sprs` sparse
//! matrices (CSR and CSC) and for dense `ndarray` matrices.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use sprs::CsMat;

use crate::error::{DiffusionError, Result};

/// A square linear operator exposing a matrix–dense-matrix product.
///
/// Implementors must not mutate internal state in [`apply`](Self::apply):
/// engines call it from several threads when parallel evaluation is on.
pub trait LinearOperator {
    /// `(rows, cols)`.
    fn shape(&self) -> (usize, usize);

    /// `Y = A·X` for an `cols × d` block `X`.
    fn apply(&self, x: ArrayView2<'_, f64>) -> Array2<f64>;

    /// `y = A·x` for a single vector.
    fn apply_vec(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        self.apply(x.insert_axis(Axis(1))).remove_axis(Axis(1))
    }
}

impl<T: LinearOperator + ?Sized> LinearOperator for &T {
    fn shape(&self) -> (usize, usize) {
        (**self).shape()
    }

    fn apply(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (**self).apply(x)
    }

    fn apply_vec(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        (**self).apply_vec(x)
    }
}

impl LinearOperator for CsMat<f64> {
    fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    fn apply(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        self * &x
    }

    fn apply_vec(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        self * &x
    }
}

impl LinearOperator for Array2<f64> {
    fn shape(&self) -> (usize, usize) {
        self.dim()
    }

    fn apply(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        self.dot(&x)
    }
}

// ─────────────────────────────────────────────
// Eager validation
// ─────────────────────────────────────────────

/// Returns `n` for a square `n × n` operator.
pub fn square_dim<A: LinearOperator + ?Sized>(op: &A) -> Result<usize> {
    let (rows, cols) = op.shape();
    if rows != cols {
        return Err(DiffusionError::NotSquare { rows, cols });
    }
    Ok(rows)
}

/// Checks that `op` is square and that the signal has one row per node.
pub fn check_signal<A: LinearOperator + ?Sized>(op: &A, x: ArrayView2<'_, f64>) -> Result<usize> {
    let n = square_dim(op)?;
    if x.nrows() != n {
        return Err(DiffusionError::DimensionMismatch { expected: n, got: x.nrows() });
    }
    Ok(n)
}

/// Time values must be finite and non-negative.
pub(crate) fn check_times(taus: &[f64]) -> Result<()> {
    match taus.iter().find(|t| !(t.is_finite() && **t >= 0.0)) {
        Some(bad) => Err(DiffusionError::InvalidParameter(format!(
            "diffusion time must be finite and ≥ 0, got {bad}"
        ))),
        None => Ok(()),
    }
}
