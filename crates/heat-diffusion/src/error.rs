//! Error types for the diffusion engines.

/// Errors surfaced by the Chebyshev and Krylov approximations.
///
/// Every variant carries enough context (order, scale, time) to diagnose the
/// failure without re-running the computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiffusionError {
    /// The Lanczos eigensolver did not converge within its iteration budget.
    #[error(
        "spectral computation did not converge after {iterations} Lanczos steps \
         (estimate {estimate:.6e}, residual {residual:.3e})"
    )]
    SpectralComputation { iterations: usize, estimate: f64, residual: f64 },

    /// A signal-specific bound was requested for a signal that sums to zero.
    #[error("signal sums to zero: signal-specific bound undefined (τ = {tau}, K = {order})")]
    DegenerateSignal { tau: f64, order: usize },

    /// No order up to `max_order` met the target error.
    #[error(
        "no Chebyshev order ≤ {max_order} reaches ε = {epsilon:.3e} \
         (τ = {tau}, φ = {phi:.6e}, bound at cap = {bound_at_cap:.3e})"
    )]
    OrderSearchExhausted {
        max_order:    usize,
        epsilon:      f64,
        tau:          f64,
        phi:          f64,
        bound_at_cap: f64,
    },

    /// ART restarts stopped making progress on the remaining time interval.
    #[error(
        "Krylov restarting stalled after {restarts} restarts \
         (remaining t = {remaining:.3e} of {total:.3e}, last accepted fraction {accepted_fraction:.3e})"
    )]
    KrylovStall {
        restarts:          usize,
        remaining:         f64,
        total:             f64,
        accepted_fraction: f64,
    },

    /// Operator and signal (or operator rows and columns) disagree in size.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The operator is not square.
    #[error("operator must be square, got {rows}×{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// A configuration value or argument is out of its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DiffusionError>;
