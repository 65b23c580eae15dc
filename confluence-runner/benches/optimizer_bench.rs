//! Criterion benchmarks for the optimizer hot path.
//!
//! Run with: `cargo bench -p confluence-runner`

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use confluence_core::backtest::{run_backtest, BacktestConfig};
use confluence_core::data::SyntheticSource;
use confluence_core::domain::{HistoricalSignal, WeightVector, FLAG_COUNT};
use confluence_runner::{OptimizerConfig, PerformanceScorer, ScoreConfig, WeightOptimizer};

/// Signals from a synthetic year, scored permissively so the set is large.
fn signals() -> Vec<HistoricalSignal> {
    let end = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let candles = SyntheticSource::default().generate("EURUSD", end);
    let permissive = WeightVector::from_array([40.0; FLAG_COUNT]);
    run_backtest("EURUSD", &candles, &permissive, &BacktestConfig::default())
}

fn bench_score(c: &mut Criterion) {
    let signals = signals();
    let scorer = PerformanceScorer::new(&signals, ScoreConfig::default());
    let weights = WeightVector::default();
    c.bench_function("performance_score", |b| {
        b.iter(|| scorer.score(black_box(&weights)));
    });
}

fn bench_optimize(c: &mut Criterion) {
    let signals = signals();
    let mut group = c.benchmark_group("optimize");
    group.sample_size(10);

    for parallel in [false, true] {
        let optimizer = WeightOptimizer {
            config: OptimizerConfig {
                iterations: 25,
                parallel,
                ..OptimizerConfig::default()
            },
            ..WeightOptimizer::default()
        };
        group.bench_with_input(BenchmarkId::new("parallel", parallel), &parallel, |b, _| {
            b.iter(|| optimizer.optimize(black_box(&signals), &WeightVector::default()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_score, bench_optimize);
criterion_main!(benches);
