//! Chebyshev polynomial approximation of the graph heat kernel `e^{−τL}`.
//!
//! ## Shifted expansion
//!
//! With `φ = λ_max / 2`, the operator `L/φ − I` has its spectrum in
//! `[−1, 1]` and
//!
//! ```text
//! e^{−τL} = e^{−τφ} · e^{−τφ (L/φ − I)}
//!         ≈ ½ c_0 T_0 + Σ_{k=1}^{K}  c_k · T_k(L/φ − I)
//! ```
//!
//! where `c_k = 2 · Ĩ_k(−τφ)` and `Ĩ_k(x) = e^{−|x|} I_k(x)` is the
//! exponentially scaled modified Bessel function of the first kind.
//!
//! ## Chebyshev recurrence (one sparse product per term)
//!
//! ```text
//! T_0 = X
//! T_1 = (1/φ)·L·X − X
//! T_k = (2/φ)·L·T_{k−1} − 2·T_{k−1} − T_{k−2}
//! ```
//!
//! The recurrence depends on `X`, `L`, `φ` and `K` but not on `τ`, so the
//! basis is built once and recombined for every diffusion time.

use ndarray::{Array2, ArrayView2};
use statrs::function::gamma::ln_gamma;

use crate::error::{DiffusionError, Result};
use crate::operator::{check_signal, LinearOperator};

/// Default truncation order when neither an order nor an error target is given.
pub const K_DEFAULT: usize = 10;

/// Relative size at which a Bessel series term stops contributing.
const SERIES_EPS: f64 = 1e-17;

// ─────────────────────────────────────────────
// Scaled modified Bessel function Ĩ_k(x)
// ─────────────────────────────────────────────

/// Compute `[Ĩ_0(x), …, Ĩ_{k_max}(x)]` with `Ĩ_k(x) = e^{−|x|} I_k(x)`.
///
/// Every order is evaluated directly from its power series
///
/// ```text
/// I_k(z) = Σ_{m≥0} (z/2)^{2m+k} / (m! · (m+k)!)
/// ```
///
/// summed outwards from its largest term, with the peak term and the
/// `e^{−z}` scaling combined in log space. All terms are positive, so each
/// value carries full relative precision for any `z` and no order is derived
/// from its neighbours. Negative arguments use `I_k(−z) = (−1)^k I_k(z)`.
///
/// Returns a vector of length `k_max + 1`; `Ĩ_0(0) = 1`, `Ĩ_k(0) = 0`.
pub fn scaled_modified_bessel_i(x: f64, k_max: usize) -> Vec<f64> {
    let mut out = vec![0.0f64; k_max + 1];
    if x == 0.0 {
        out[0] = 1.0;
        return out;
    }

    let z = x.abs();
    let half_z = z / 2.0;
    let ln_half_z = half_z.ln();
    let q = half_z * half_z;

    for (k, slot) in out.iter_mut().enumerate() {
        let kf = k as f64;

        // Terms grow while (m+1)(m+k+1) < (z/2)².
        let peak = (((kf * kf + z * z).sqrt() - kf) / 2.0).floor().max(0.0) as usize;
        let pf = peak as f64;
        let ln_peak = (2.0 * pf + kf) * ln_half_z - ln_gamma(pf + 1.0) - ln_gamma(pf + kf + 1.0);

        // Sum relative to the peak term, walking up then down.
        let mut sum = 1.0f64;
        let mut term = 1.0f64;
        let mut m = peak + 1;
        loop {
            let mf = m as f64;
            term *= q / (mf * (mf + kf));
            sum += term;
            if term < SERIES_EPS * sum {
                break;
            }
            m += 1;
        }
        term = 1.0;
        for m in (1..=peak).rev() {
            let mf = m as f64;
            term *= mf * (mf + kf) / q;
            sum += term;
            if term < SERIES_EPS * sum {
                break;
            }
        }

        let value = (ln_peak + sum.ln() - z).exp();
        *slot = if x < 0.0 && k % 2 == 1 { -value } else { value };
    }

    out
}

// ─────────────────────────────────────────────
// Chebyshev coefficients
// ─────────────────────────────────────────────

/// Series coefficients `c_k = 2 · Ĩ_k(−τφ)` for `k = 0..=order`.
///
/// The approximation is `½ c_0 T_0 + Σ_{k≥1} c_k T_k`. Pure and cheap
/// relative to building the polynomial basis.
pub fn chebyshev_coefficients(phi: f64, tau: f64, order: usize) -> Vec<f64> {
    scaled_modified_bessel_i(-tau * phi, order)
        .into_iter()
        .map(|b| 2.0 * b)
        .collect()
}

// ─────────────────────────────────────────────
// Polynomial basis T_k(L/φ − I)·X
// ─────────────────────────────────────────────

/// The `K + 1` recurrence terms `T_0·X, …, T_K·X` for one signal block.
///
/// `terms()[0]` is always an unmodified copy of the input signal.
#[derive(Debug, Clone)]
pub struct PolynomialBasis {
    phi:   f64,
    terms: Vec<Array2<f64>>,
}

impl PolynomialBasis {
    /// Run the three-term recurrence up to `order` (exactly `order` sparse
    /// products).
    pub fn compute<A: LinearOperator + ?Sized>(
        op:    &A,
        x:     ArrayView2<'_, f64>,
        phi:   f64,
        order: usize,
    ) -> Result<Self> {
        check_signal(op, x)?;
        if !(phi.is_finite() && phi > 0.0) {
            return Err(DiffusionError::InvalidParameter(format!(
                "spectral scale must be finite and > 0, got {phi}"
            )));
        }

        let mut terms: Vec<Array2<f64>> = Vec::with_capacity(order + 1);
        terms.push(x.to_owned());

        if order >= 1 {
            let mut t1 = op.apply(x) / phi;
            t1 -= &x;
            terms.push(t1);
        }

        for k in 2..=order {
            let prev = &terms[k - 1];
            let mut next = op.apply(prev.view()) * (2.0 / phi);
            next.scaled_add(-2.0, prev);
            next -= &terms[k - 2];
            terms.push(next);
        }

        let (n, d) = x.dim();
        tracing::debug!(order, n, d, phi, "Chebyshev basis built");
        Ok(Self { phi, terms })
    }

    /// Truncation order `K` (the basis holds `K + 1` terms).
    pub fn order(&self) -> usize {
        self.terms.len() - 1
    }

    /// Spectral scale the recurrence was run with.
    pub fn phi(&self) -> f64 {
        self.phi
    }

    pub fn terms(&self) -> &[Array2<f64>] {
        &self.terms
    }

    /// `(n, d)` of every term.
    pub fn dim(&self) -> (usize, usize) {
        self.terms[0].dim()
    }

    /// `Y = ½ c_0 T_0 + Σ_{k=1}^{K} c_k T_k`.
    ///
    /// Terms are accumulated in increasing `k`, so a given `(basis, coeffs)`
    /// pair always yields bit-identical output.
    pub fn combine(&self, coeffs: &[f64]) -> Result<Array2<f64>> {
        if coeffs.len() != self.terms.len() {
            return Err(DiffusionError::DimensionMismatch {
                expected: self.terms.len(),
                got:      coeffs.len(),
            });
        }
        let mut y = &self.terms[0] * (0.5 * coeffs[0]);
        for (c, t) in coeffs.iter().zip(&self.terms).skip(1) {
            y.scaled_add(*c, t);
        }
        Ok(y)
    }

    /// Evaluate the series at diffusion time `tau`.
    pub fn evaluate(&self, tau: f64) -> Result<Array2<f64>> {
        self.combine(&chebyshev_coefficients(self.phi, tau, self.order()))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
