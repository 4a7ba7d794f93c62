//! Closed-form bounds on the Chebyshev truncation error.
//!
//! Every model takes the spectral scale `φ = λ_max / 2`, the diffusion time
//! `τ` and the order `K`, and works with `C = τφ/2`. Each one first bounds
//! the *input-relative* squared error
//!
//! ```text
//! η = ‖ŷ − y‖² / ‖X‖²
//! ```
//!
//! and converts it to the *reference-relative* squared error
//! `ε = ‖ŷ − y‖² / ‖y‖²` with a lower bound `ρ ≤ ‖y‖² / ‖X‖²`:
//!
//! | Model            | `ln η`            | `ln ρ`                 |
//! |------------------|-------------------|------------------------|
//! | `Generic`        | `2 ln f(C,K)`     | `−8C`                  |
//! | `SignalSpecific` | `2 ln f(C,K)`     | `2 ln(|ΣX| / ‖X‖)`     |
//! | `Bergamaschi`    | `2 ln 2E(C,K)`    | `−8C`                  |
//!
//! with
//!
//! ```text
//! f(C,K) = 2 / (√(2π)(K+1−C)) · exp(−2C + C² + (K+1) ln C − (K+½) ln K + K)
//! ```
//!
//! valid for `K + 1 > C`, and the asymptotic Bergamaschi estimate `E(C,K)`.
//! Everything is evaluated in log space; results that exceed `f64::MAX`
//! saturate to `+∞`. All models are non-increasing in `K`.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::{DiffusionError, Result};

/// Which error a bound is expressed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorMeasure {
    /// `‖ŷ − y‖² / ‖y‖²`, relative to the exact diffusion `y = e^{−τL}X`.
    #[default]
    ReferenceRelative,
    /// `‖ŷ − y‖² / ‖X‖²`, relative to the input signal.
    InputRelative,
}

/// The closed family of truncation-error models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorBound {
    /// Depends on the signal only through its norm; always applicable.
    #[default]
    Generic,
    /// Tighter for signals with non-zero total mass; requires `ΣX ≠ 0`.
    ///
    /// Only the [`ReferenceRelative`](ErrorMeasure::ReferenceRelative)
    /// conversion uses `ΣX`. Under
    /// [`InputRelative`](ErrorMeasure::InputRelative) it evaluates exactly
    /// like [`Generic`](ErrorBound::Generic) and accepts zero-sum signals.
    SignalSpecific,
    /// Bergamaschi–Vianello asymptotic estimate.
    Bergamaschi,
}

/// The two signal statistics the bounds need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalStats {
    /// Frobenius norm `‖X‖`.
    pub norm: f64,
    /// Sum of all entries `ΣX`.
    pub sum:  f64,
    /// `Σ|X_ij|`, used to decide whether `ΣX` is zero up to rounding.
    pub l1:   f64,
}

impl SignalStats {
    pub fn of(x: ArrayView2<'_, f64>) -> Self {
        let mut norm2 = 0.0;
        let mut sum = 0.0;
        let mut l1 = 0.0;
        for &v in x.iter() {
            norm2 += v * v;
            sum += v;
            l1 += v.abs();
        }
        Self { norm: norm2.sqrt(), sum, l1 }
    }

    /// `ΣX` vanishes up to accumulated rounding.
    pub fn sums_to_zero(&self) -> bool {
        self.sum.abs() <= f64::EPSILON * self.l1
    }
}

impl ErrorBound {
    /// Bound value for `(φ, X, τ, K)`.
    pub fn evaluate(
        &self,
        phi:     f64,
        signal:  &SignalStats,
        tau:     f64,
        order:   usize,
        measure: ErrorMeasure,
    ) -> Result<f64> {
        Ok(self.ln_evaluate(phi, signal, tau, order, measure)?.exp())
    }

    /// Natural logarithm of [`evaluate`](Self::evaluate); `−∞` for an exact
    /// approximation, `+∞` where the model does not apply.
    pub fn ln_evaluate(
        &self,
        phi:     f64,
        signal:  &SignalStats,
        tau:     f64,
        order:   usize,
        measure: ErrorMeasure,
    ) -> Result<f64> {
        if !(phi.is_finite() && phi >= 0.0) || !(tau.is_finite() && tau >= 0.0) {
            return Err(DiffusionError::InvalidParameter(format!(
                "bounds need finite φ ≥ 0 and τ ≥ 0, got φ = {phi}, τ = {tau}"
            )));
        }
        if *self == ErrorBound::SignalSpecific
            && measure == ErrorMeasure::ReferenceRelative
            && signal.sums_to_zero()
        {
            return Err(DiffusionError::DegenerateSignal { tau, order });
        }

        let c = tau * phi / 2.0;
        if c == 0.0 {
            return Ok(f64::NEG_INFINITY);
        }
        if order == 0 {
            return Ok(f64::INFINITY);
        }

        let ln_eta = match self {
            ErrorBound::Generic | ErrorBound::SignalSpecific => 2.0 * ln_f(c, order),
            ErrorBound::Bergamaschi => 2.0 * (std::f64::consts::LN_2 + ln_bergamaschi_e(c, order)),
        };

        let ln_bound = match measure {
            ErrorMeasure::InputRelative => ln_eta,
            ErrorMeasure::ReferenceRelative => match self {
                ErrorBound::SignalSpecific => {
                    ln_eta + 2.0 * (signal.norm.ln() - signal.sum.abs().ln())
                }
                _ => ln_eta + 8.0 * c,
            },
        };
        Ok(ln_bound)
    }
}

/// `ln f(C, K)`; `+∞` when `K + 1 ≤ C`.
fn ln_f(c: f64, k: usize) -> f64 {
    let kf = k as f64;
    let gap = kf + 1.0 - c;
    if gap <= 0.0 {
        return f64::INFINITY;
    }
    let exponent = -2.0 * c + c * c + (kf + 1.0) * c.ln() - (kf + 0.5) * kf.ln() + kf;
    std::f64::consts::LN_2 - 0.5 * (2.0 * std::f64::consts::PI).ln() - gap.ln() + exponent
}

/// `ln E(C, K)` of the Bergamaschi–Vianello estimate.
fn ln_bergamaschi_e(c: f64, k: usize) -> f64 {
    let sqrt5 = 5.0f64.sqrt();
    let b = 2.0 / (1.0 + sqrt5);
    let ln_d = b - (2.0 + sqrt5).ln();
    let kf = k as f64;

    if kf <= c {
        let a = -b * (kf + 1.0) * (kf + 1.0) / (4.0 * c) + (1.0 + (c * std::f64::consts::PI / b).sqrt()).ln();
        let t = 4.0 * c * ln_d - (1.0 + b).ln();
        log_sum_exp(a, t)
    } else {
        kf * ln_d - (-ln_d.exp()).ln_1p()
    }
}

fn log_sum_exp(a: f64, b: f64) -> f64 {
    let hi = a.max(b);
    hi + ((a - hi).exp() + (b - hi).exp()).ln()
}
