//! Order selection: invert a truncation-error bound for the minimal `K`.
//!
//! Every [`ErrorBound`] is non-increasing in `K`, so the smallest order
//! meeting a target `ε` is found with a doubling search followed by
//! bisection, in `O(log K*)` bound evaluations:
//!
//! ```text
//! K₀ = max(1, ⌊τφ/2⌋)
//! f(K₀) > ε  →  K₀, 2K₀, 4K₀, …  until f ≤ ε, then bisect the last bracket
//! f(K₀) ≤ ε  →  bisect [1, K₀]
//! ```
//!
//! The bounds are squared errors while an [`ErrorTarget`] is a plain relative
//! error, so [`reverse_bound`] searches against `ε²`.

use serde::{Deserialize, Serialize};

use crate::bounds::{ErrorBound, ErrorMeasure, SignalStats};
use crate::error::{DiffusionError, Result};

/// A target accuracy: bound model, error measure and `ε`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorTarget {
    pub bound:   ErrorBound,
    #[serde(default)]
    pub measure: ErrorMeasure,
    /// Relative error `‖ŷ − y‖ / ‖y‖` (or `/ ‖X‖`), not squared.
    pub epsilon: f64,
}

impl ErrorTarget {
    /// Reference-relative target for `bound`.
    pub fn new(bound: ErrorBound, epsilon: f64) -> Self {
        Self { bound, measure: ErrorMeasure::default(), epsilon }
    }

    pub fn with_measure(mut self, measure: ErrorMeasure) -> Self {
        self.measure = measure;
        self
    }

    /// `ε²`, the threshold in the units of [`ErrorBound::evaluate`].
    pub fn squared_epsilon(&self) -> f64 {
        self.epsilon * self.epsilon
    }
}

/// Result of [`minimal_order`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    /// Smallest order meeting the target.
    Found { order: usize, evaluations: usize },
    /// Even `max_order` misses the target.
    Exhausted { bound_at_cap: f64, evaluations: usize },
}

/// Smallest `K ∈ [1, max_order]` with `f(K) ≤ epsilon`, for a
/// non-increasing `f`.
///
/// `start` is the first order tried (clamped into range). Errors from `f`
/// propagate unchanged.
pub fn minimal_order<F>(mut f: F, start: usize, epsilon: f64, max_order: usize) -> Result<SearchOutcome>
where
    F: FnMut(usize) -> Result<f64>,
{
    if !(epsilon > 0.0) {
        return Err(DiffusionError::InvalidParameter(format!(
            "target error must be > 0, got {epsilon}"
        )));
    }
    if max_order == 0 {
        return Err(DiffusionError::InvalidParameter("max_order must be ≥ 1".into()));
    }

    let mut evaluations = 0usize;
    let start = start.clamp(1, max_order);

    // Bracket (lo, hi]: f(lo) > ε, f(hi) ≤ ε.
    let mut lo;
    let mut hi;
    if evaluate_at(&mut f, &mut evaluations, start)? <= epsilon {
        if start == 1 || evaluate_at(&mut f, &mut evaluations, 1)? <= epsilon {
            return Ok(SearchOutcome::Found { order: 1, evaluations });
        }
        lo = 1;
        hi = start;
    } else {
        lo = start;
        loop {
            if lo >= max_order {
                let bound_at_cap = evaluate_at(&mut f, &mut evaluations, max_order)?;
                return Ok(SearchOutcome::Exhausted { bound_at_cap, evaluations });
            }
            let next = lo.saturating_mul(2).min(max_order);
            if evaluate_at(&mut f, &mut evaluations, next)? <= epsilon {
                hi = next;
                break;
            }
            lo = next;
        }
    }

    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if evaluate_at(&mut f, &mut evaluations, mid)? <= epsilon {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Ok(SearchOutcome::Found { order: hi, evaluations })
}

fn evaluate_at<F>(f: &mut F, evaluations: &mut usize, k: usize) -> Result<f64>
where
    F: FnMut(usize) -> Result<f64>,
{
    *evaluations += 1;
    f(k)
}

/// Minimal Chebyshev order whose bound meets `target` at time `tau`.
///
/// Fails with [`DiffusionError::OrderSearchExhausted`] when no order up to
/// `max_order` suffices, and with [`DiffusionError::DegenerateSignal`] when a
/// signal-specific reference bound meets a zero-sum signal.
pub fn reverse_bound(
    target:    &ErrorTarget,
    phi:       f64,
    signal:    &SignalStats,
    tau:       f64,
    max_order: usize,
) -> Result<usize> {
    let heuristic = (tau * phi / 2.0).floor();
    let start = if heuristic >= max_order as f64 { max_order } else { (heuristic as usize).max(1) };

    let outcome = minimal_order(
        |k| target.bound.evaluate(phi, signal, tau, k, target.measure),
        start,
        target.squared_epsilon(),
        max_order,
    )?;

    match outcome {
        SearchOutcome::Found { order, evaluations } => {
            tracing::debug!(order, evaluations, tau, phi, bound = ?target.bound, "Chebyshev order selected");
            Ok(order)
        }
        SearchOutcome::Exhausted { bound_at_cap, .. } => Err(DiffusionError::OrderSearchExhausted {
            max_order,
            epsilon: target.epsilon,
            tau,
            phi,
            bound_at_cap: bound_at_cap.sqrt(),
        }),
    }
}
