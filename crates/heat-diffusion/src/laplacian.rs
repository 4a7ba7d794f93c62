//! Combinatorial Laplacian `L = D − A` from a weighted, undirected edge list
//! `(u, v, w)`, plus the path and ring generators used by tests and benches.
//!
//! Its eigenvalues lie in `[0, 2 d_max]` and its rows sum to zero, so
//! `e^{−tL}` conserves total mass.

use sprs::{CsMat, TriMat};

use crate::error::{DiffusionError, Result};

/// Weighted undirected edge `(u, v, w)`.
pub type Edge = (usize, usize, f64);

fn check_edges(n: usize, edges: &[Edge]) -> Result<()> {
    for &(u, v, w) in edges {
        if u >= n || v >= n {
            return Err(DiffusionError::DimensionMismatch { expected: n, got: u.max(v) + 1 });
        }
        if !(w.is_finite() && w >= 0.0) {
            return Err(DiffusionError::InvalidParameter(format!(
                "edge ({u}, {v}) has invalid weight {w}"
            )));
        }
    }
    Ok(())
}

/// Weighted degree `d_i = Σ_j w_ij`. Self-loops are ignored.
fn degrees(n: usize, edges: &[Edge]) -> Vec<f64> {
    let mut degree = vec![0.0f64; n];
    for &(u, v, w) in edges {
        if u != v {
            degree[u] += w;
            degree[v] += w;
        }
    }
    degree
}

/// Combinatorial Laplacian `L = D − A` in CSR form.
///
/// Each edge contributes to both `(u, v)` and `(v, u)`; parallel edges are
/// summed.
pub fn combinatorial_laplacian(n: usize, edges: &[Edge]) -> Result<CsMat<f64>> {
    check_edges(n, edges)?;
    let degree = degrees(n, edges);

    let mut tri = TriMat::with_capacity((n, n), n + 2 * edges.len());
    for &(u, v, w) in edges {
        if u != v {
            tri.add_triplet(u, v, -w);
            tri.add_triplet(v, u, -w);
        }
    }
    for (i, &d) in degree.iter().enumerate() {
        tri.add_triplet(i, i, d);
    }
    Ok(tri.to_csr())
}

/// Unit-weight path `0 — 1 — … — (n−1)`.
pub fn path_edges(n: usize) -> Vec<Edge> {
    (1..n).map(|i| (i - 1, i, 1.0)).collect()
}

/// Unit-weight ring on `n` nodes.
pub fn ring_edges(n: usize) -> Vec<Edge> {
    if n < 3 {
        return path_edges(n);
    }
    (0..n).map(|i| (i, (i + 1) % n, 1.0)).collect()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::LinearOperator;
    use ndarray::Array2;

    #[test]
    fn builds_from_empty_graph() {
        let lap = combinatorial_laplacian(0, &[]).unwrap();
        assert_eq!(lap.rows(), 0);
    }

    #[test]
    fn path_laplacian_rows_sum_to_zero() {
        let lap = combinatorial_laplacian(5, &path_edges(5)).unwrap();
        let ones = Array2::from_elem((5, 1), 1.0);
        let y = lap.apply(ones.view());
        for v in y.iter() {
            assert!(v.abs() < 1e-14, "row sum = {v}");
        }
    }

    #[test]
    fn path_laplacian_diagonal_is_degree() {
        let lap = combinatorial_laplacian(4, &path_edges(4)).unwrap();
        let diag: Vec<f64> = (0..4).map(|i| *lap.get(i, i).unwrap_or(&0.0)).collect();
        assert_eq!(diag, vec![1.0, 2.0, 2.0, 1.0]);
        assert_eq!(lap.get(0, 1), Some(&-1.0));
        assert_eq!(lap.get(1, 0), Some(&-1.0));
    }

    #[test]
    fn parallel_edges_are_summed() {
        let lap = combinatorial_laplacian(2, &[(0, 1, 1.0), (1, 0, 0.5)]).unwrap();
        assert_eq!(lap.get(0, 1), Some(&-1.5));
        assert_eq!(lap.get(0, 0), Some(&1.5));
    }

    #[test]
    fn out_of_range_edge_is_rejected() {
        let err = combinatorial_laplacian(3, &[(0, 3, 1.0)]).unwrap_err();
        assert_eq!(err, DiffusionError::DimensionMismatch { expected: 3, got: 4 });
    }

    #[test]
    fn negative_weight_is_rejected() {
        assert!(combinatorial_laplacian(2, &[(0, 1, -1.0)]).is_err());
    }

    #[test]
    fn ring_has_uniform_degree() {
        let lap = combinatorial_laplacian(6, &ring_edges(6)).unwrap();
        for i in 0..6 {
            assert_eq!(lap.get(i, i), Some(&2.0));
        }
    }
}
