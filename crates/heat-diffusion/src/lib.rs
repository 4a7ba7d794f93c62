//! `heat-diffusion` — heat kernel action `e^{−τL} X` on sparse graph Laplacians.
//!
//! Two independent approximations of the same quantity, never forming
//! `e^{−τL}` explicitly:
//!
//! * a truncated **Chebyshev series** with closed-form Bessel coefficients,
//!   whose order `K` can be chosen analytically from an error bound, and
//! * a **Krylov–Arnoldi** approximation with adaptive residual-time
//!   restarting (ART), which needs no spectral information.
//!
//! ## Crate structure
//!
//! | Module          | Responsibility                                              |
//! |-----------------|-------------------------------------------------------------|
//! | [`operator`]    | [`LinearOperator`] — `sprs` / `ndarray` matrix products     |
//! | [`laplacian`]   | Combinatorial Laplacian and path / ring edge lists          |
//! | [`spectral`]    | Lanczos estimate of `λ_max` (spectral scale `φ = λ_max/2`)  |
//! | [`chebyshev`]   | Scaled Bessel coefficients + Chebyshev recurrence           |
//! | [`bounds`]      | Closed-form truncation-error bounds                         |
//! | [`order`]       | Minimal `K` for a target error (`reverse_bound`)            |
//! | [`diffusion`]   | [`DiffusionOperator`] and the [`PreparedDiffusion`] handle  |
//! | [`krylov`]      | [`KrylovExpm`] / [`art_expm`]                               |
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use heat_diffusion::{
//!     combinatorial_laplacian, path_edges, DiffusionOperator, ErrorBound, ErrorTarget, KrylovExpm,
//! };
//!
//! let lap = combinatorial_laplacian(5, &path_edges(5))?;
//! let x = ndarray::array![[1.0], [0.0], [0.0], [0.0], [0.0]];
//!
//! let cheb = DiffusionOperator::default()
//!     .compute(&lap, x.view(), &[0.1], ErrorTarget::new(ErrorBound::Generic, 1e-6))?;
//! let art = KrylovExpm::default().apply(&lap, x.view(), 0.1)?;
//! ```
//!
//! ## Time containers
//!
//! | Input              | Call                                  | Output shape        |
//! |--------------------|---------------------------------------|---------------------|
//! | scalar `τ`         | [`PreparedDiffusion::evaluate`]       | `(n, d)`            |
//! | slice `[τ]`        | [`PreparedDiffusion::evaluate_many`]  | `Vec` of `(n, d)`   |
//! | array of any shape | [`PreparedDiffusion::evaluate_grid`]  | `τ.shape ++ (n, d)` |

pub mod bounds;
pub mod chebyshev;
pub mod config;
pub mod diffusion;
pub mod error;
pub mod krylov;
pub mod laplacian;
pub mod operator;
pub mod order;
pub mod spectral;

// ── Chebyshev ─────────────────────────────────────────────────────────────────
pub use chebyshev::{chebyshev_coefficients, scaled_modified_bessel_i, PolynomialBasis, K_DEFAULT};

// ── Bounds & order selection ──────────────────────────────────────────────────
pub use bounds::{ErrorBound, ErrorMeasure, SignalStats};
pub use order::{minimal_order, reverse_bound, ErrorTarget, SearchOutcome};

// ── Engines ───────────────────────────────────────────────────────────────────
pub use diffusion::{DiffusionOperator, Order, PreparedDiffusion};
pub use krylov::{art_expm, ArtReport, KrylovExpm};
pub use spectral::{dominant_eigenvalue, spectral_scale, SpectralEstimate};

// ── Operators ─────────────────────────────────────────────────────────────────
pub use laplacian::{combinatorial_laplacian, path_edges, ring_edges, Edge};
pub use operator::LinearOperator;

// ── Config & errors ───────────────────────────────────────────────────────────
pub use config::{DiffusionConfig, KrylovConfig, OrderSearchConfig, SpectralConfig};
pub use error::{DiffusionError, Result};
