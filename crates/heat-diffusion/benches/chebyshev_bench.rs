//! Criterion benchmarks for the heat-kernel approximations.
//!
//! Run with:
//! ```bash
//! cargo bench -p heat-diffusion
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use heat_diffusion::{
    chebyshev_coefficients, combinatorial_laplacian, ring_edges, scaled_modified_bessel_i,
    DiffusionOperator, ErrorBound, ErrorTarget, KrylovConfig, KrylovExpm, PolynomialBasis,
};
use ndarray::Array2;
use sprs::CsMat;

// ── helpers ──────────────────────────────────────────────────────────────────

fn ring(n: usize) -> CsMat<f64> {
    combinatorial_laplacian(n, &ring_edges(n)).unwrap()
}

/// `d` unit impulses spread around the ring.
fn impulses(n: usize, d: usize) -> Array2<f64> {
    Array2::from_shape_fn((n, d), |(i, c)| if i == c * n / d { 1.0 } else { 0.0 })
}

// ── Bessel functions ─────────────────────────────────────────────────────────

fn bench_scaled_bessel(c: &mut Criterion) {
    let mut group = c.benchmark_group("chebyshev/scaled_bessel_i");

    for &z in &[0.5f64, 5.0, 50.0, 500.0] {
        for &k in &[10usize, 100] {
            group.bench_with_input(
                BenchmarkId::new(format!("z{z}_k"), k),
                &(z, k),
                |b, &(z, k)| b.iter(|| scaled_modified_bessel_i(z, k)),
            );
        }
    }

    group.finish();
}

// ── Chebyshev coefficients ───────────────────────────────────────────────────

fn bench_chebyshev_coefficients(c: &mut Criterion) {
    let mut group = c.benchmark_group("chebyshev/coefficients");

    for &k in &[10usize, 50, 200] {
        group.bench_with_input(BenchmarkId::new("k", k), &k, |b, &k| {
            b.iter(|| chebyshev_coefficients(2.0, 1.0, k))
        });
    }

    group.finish();
}

// ── Polynomial basis ─────────────────────────────────────────────────────────

fn bench_basis(c: &mut Criterion) {
    let mut group = c.benchmark_group("chebyshev/basis");

    for &n in &[100usize, 1_000, 10_000] {
        let lap = ring(n);
        let x = impulses(n, 4);
        group.bench_with_input(BenchmarkId::new("ring_nodes", n), &n, |b, _| {
            b.iter(|| PolynomialBasis::compute(&lap, x.view(), 2.0, 30).unwrap())
        });
    }

    group.finish();
}

// ── prepare once, evaluate many ──────────────────────────────────────────────

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("chebyshev/evaluate");

    let n = 2_000;
    let lap = ring(n);
    let x = impulses(n, 4);
    let handle = DiffusionOperator::default().prepare(&lap, x.view(), 40).unwrap();
    let taus: Vec<f64> = (1..=16).map(|i| 0.25 * i as f64).collect();

    group.bench_function("single_tau", |b| b.iter(|| handle.evaluate(1.0).unwrap()));
    group.bench_function("sixteen_taus", |b| b.iter(|| handle.evaluate_many(&taus).unwrap()));

    group.finish();
}

// ── one-shot with order selection ────────────────────────────────────────────

fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("chebyshev/compute");
    let target = ErrorTarget::new(ErrorBound::Generic, 1e-8);

    for &n in &[100usize, 1_000] {
        let lap = ring(n);
        let x = impulses(n, 1);
        group.bench_with_input(BenchmarkId::new("ring_nodes", n), &n, |b, _| {
            b.iter(|| {
                DiffusionOperator::default()
                    .compute(&lap, x.view(), &[0.1, 1.0], target)
                    .unwrap()
            })
        });
    }

    group.finish();
}

// ── ART ──────────────────────────────────────────────────────────────────────

fn bench_art(c: &mut Criterion) {
    let mut group = c.benchmark_group("krylov/art");

    for &m in &[10usize, 30] {
        let lap = ring(1_000);
        let x = impulses(1_000, 1);
        let art = KrylovExpm::new(KrylovConfig { max_dim: m, ..Default::default() }).unwrap();
        group.bench_with_input(BenchmarkId::new("max_dim", m), &m, |b, _| {
            b.iter(|| art.apply(&lap, x.view(), 1.0).unwrap())
        });
    }

    group.finish();
}

// ── criterion wiring ─────────────────────────────────────────────────────────

criterion_group!(
    benches,
    bench_scaled_bessel,
    bench_chebyshev_coefficients,
    bench_basis,
    bench_evaluate,
    bench_compute,
    bench_art,
);
criterion_main!(benches);
