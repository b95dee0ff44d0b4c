use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use rtbench::display;
use rtbench::measure;
use rtbench::parse;
use rtbench::types::{AggregateResult, ResultsMatrix, Samples, Statistic};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Routine stdout with `diagnostics` leading lines before value and timing.
fn routine_output(diagnostics: usize) -> String {
    let mut out = String::new();
    for i in 0..diagnostics {
        out.push_str(&format!("debug: step {} of the warmup phase\n", i));
    }
    out.push_str("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\n");
    out.push_str("1532087\n");
    out
}

fn make_matrix(routines: usize, sizes: &[u64]) -> ResultsMatrix {
    let mut matrix = ResultsMatrix::default();
    for r in 0..routines {
        for (i, &size) in sizes.iter().enumerate() {
            let per_iter = 1e-6 * (r + 1) as f64 * (i + 1) as f64;
            matrix.insert(
                &format!("routine{}", r),
                size,
                AggregateResult {
                    iterations: 1000,
                    raw_real: 0.5,
                    real_per_iter: per_iter,
                    user_per_iter: per_iter * 0.8,
                    value: size.to_string(),
                    verified: Some(true),
                },
            );
        }
    }
    matrix
}

// ---------------------------------------------------------------------------
// Benchmarks: parse
// ---------------------------------------------------------------------------

fn bench_parse_output(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_output");
    for &lines in &[0, 10, 1000] {
        let stdout = routine_output(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &stdout, |b, s| {
            b.iter(|| parse::parse_output("sha", s).unwrap());
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmarks: measure
// ---------------------------------------------------------------------------

fn bench_aggregate(c: &mut Criterion) {
    let samples = Samples {
        real: (0..100).map(|i| 0.1 + i as f64 * 1e-4).collect(),
        user: (0..100).map(|i| 0.05 + i as f64 * 1e-5).collect(),
        last_value: "998".to_string(),
    };

    let mut group = c.benchmark_group("aggregate");
    group.bench_function("mean", |b| {
        b.iter(|| measure::aggregate(&samples, 1000, 0.03, Statistic::Mean));
    });
    group.bench_function("min", |b| {
        b.iter(|| measure::aggregate(&samples, 1000, 0.03, Statistic::Min));
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmarks: display
// ---------------------------------------------------------------------------

fn bench_display(c: &mut Criterion) {
    let sizes = [10, 1000, 1_000_000];
    let small = make_matrix(5, &sizes);
    let large = make_matrix(50, &sizes);

    let mut group = c.benchmark_group("display");
    group.bench_function("format_report_5", |b| {
        b.iter(|| display::format_report(&sizes, &small));
    });
    group.bench_function("format_report_50", |b| {
        b.iter(|| display::format_report(&sizes, &large));
    });
    group.bench_function("human", |b| {
        b.iter(|| {
            for v in [0.0000125, 0.00325, 42.0, 1000.0, 1_000_000.0] {
                std::hint::black_box(display::human(v));
            }
        });
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Criterion groups
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_parse_output, bench_aggregate, bench_display);
criterion_main!(benches);
