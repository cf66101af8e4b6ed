//! Criterion benchmarks for WineLab hot paths.
//!
//! Benchmarks:
//! 1. ElasticNet fit (coordinate descent) at wine-dataset scale
//! 2. Shared dataset parser

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use winelab_core::data::Table;
use winelab_core::model::ElasticNet;

// ── Helpers ──────────────────────────────────────────────────────────

/// Deterministic 11-feature dataset shaped like the red-wine table.
fn make_rows(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let x: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            (0..11)
                .map(|j| ((i * (j + 3)) % 97) as f64 / 10.0 + (i as f64 * 0.01).sin())
                .collect()
        })
        .collect();
    let y = x
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(j, v)| v * (j as f64 - 5.0) * 0.1)
                .sum::<f64>()
                + 5.0
        })
        .collect();
    (x, y)
}

fn make_text(n: usize) -> String {
    let (x, y) = make_rows(n);
    let mut out = String::new();
    let header: Vec<String> = (0..11).map(|j| format!("\"f{j}\"")).collect();
    out.push_str(&header.join(";"));
    out.push_str(";\"quality\"\n");
    for (row, target) in x.iter().zip(&y) {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:.4}")).collect();
        out.push_str(&cells.join(";"));
        out.push_str(&format!(";{target:.0}\n"));
    }
    out
}

// ── 1. ElasticNet fit ────────────────────────────────────────────────

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("elastic_net_fit");

    for &rows in &[400, 1200, 4800] {
        let (x, y) = make_rows(rows);
        group.bench_with_input(BenchmarkId::new("alpha_0.2", rows), &rows, |b, _| {
            b.iter(|| {
                let mut model = ElasticNet::new(0.2, 0.1);
                model.fit(black_box(&x), black_box(&y)).map(|m| m.is_fitted())
            });
        });
    }

    group.finish();
}

// ── 2. Parser ────────────────────────────────────────────────────────

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_parse");
    let text = make_text(1600);

    group.bench_function("parse_1600_rows", |b| {
        b.iter(|| Table::parse(black_box(&text)).map(|t| t.len()));
    });
    group.bench_function("parse_to_complete_rows", |b| {
        b.iter(|| {
            Table::parse(black_box(&text))
                .and_then(|t| t.into_frame(Some("quality")))
                .map(|f| f.complete_rows().x.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fit, bench_parse);
criterion_main!(benches);
