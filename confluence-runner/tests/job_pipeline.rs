use chrono::{DateTime, TimeZone, Utc};
use confluence_core::backtest::run_backtest;
use confluence_core::data::{fetch_candles, CandleSource, DataError, SyntheticConfig, SyntheticSource};
use confluence_core::domain::{Candle, WeightVector};
use confluence_runner::job::{fetch_range, window_candles};
use confluence_runner::{
    run_job, FileGateway, JobConfig, JobError, JobResult, MemoryGateway, PersistError, PersistenceGateway,
    SignalStats, SymbolStatus, TrainingRunSummary, WeightMetrics,
};
use tempfile::TempDir;

fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 17, 9, 0, 0).unwrap()
}

fn source() -> SyntheticSource {
    SyntheticSource::new(SyntheticConfig {
        anchor: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ..SyntheticConfig::default()
    })
}

fn config(symbols: &[&str]) -> JobConfig {
    let mut cfg = JobConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        ..JobConfig::default()
    };
    cfg.optimizer.iterations = 8;
    cfg
}

/// Job result with wall-clock fields zeroed.
fn timeless(mut result: JobResult) -> JobResult {
    result.duration_ms = 0;
    for symbol in &mut result.symbols {
        symbol.duration_ms = 0;
        for period in &mut symbol.periods {
            period.duration_ms = 0;
        }
    }
    result
}

struct NoCredentials;

impl CandleSource for NoCredentials {
    fn name(&self) -> &str {
        "no-credentials"
    }

    fn fetch_chunk(&self, _: &str, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<Candle>, DataError> {
        Err(DataError::MissingCredentials("OANDA_API_KEY".into()))
    }
}

struct BrokenGateway;

impl PersistenceGateway for BrokenGateway {
    fn upsert_weights(&self, _: &str, _: &str, _: &WeightVector, _: &WeightMetrics) -> Result<(), PersistError> {
        Err(PersistError::Poisoned)
    }

    fn append_training_log(&self, _: &TrainingRunSummary) -> Result<(), PersistError> {
        Err(PersistError::Poisoned)
    }
}

#[test]
fn job_runs_active_cycle_in_symbol_order() {
    let gateway = MemoryGateway::new();
    let result = run_job(&config(&["EURUSD", "USDJPY"]), reference_now(), &source(), &gateway).unwrap();

    let symbols: Vec<&str> = result.symbols.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["EURUSD", "USDJPY"]);
    assert_eq!(result.cycle.test.start, Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap());

    for symbol in &result.symbols {
        let labels: Vec<&str> = symbol.periods.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["2025-06", "2025-07", "2025-08"]);
        assert!(symbol.candles > 0);
        assert!(JobConfig::default().constraints.contains(&symbol.final_weights));
    }
    assert_eq!(gateway.log().len(), 1);
    assert_eq!(gateway.log()[0].run_id, result.run_id);
}

#[test]
fn checkpoint_after_every_period() {
    let gateway = MemoryGateway::new();
    let result = run_job(&config(&["EURUSD"]), reference_now(), &source(), &gateway).unwrap();

    let symbol = &result.symbols[0];
    let expected = symbol.periods.len() + usize::from(symbol.test.is_some());
    assert_eq!(gateway.upsert_count(), expected);

    let stored = gateway.get("EURUSD", "default").unwrap();
    assert_eq!(stored.weights, symbol.final_weights);
    assert_eq!(stored.metrics.run_id, result.run_id);
}

#[test]
fn test_window_scores_final_weights() {
    let cfg = config(&["EURUSD"]);
    let result = run_job(&cfg, reference_now(), &source(), &MemoryGateway::new()).unwrap();
    let symbol = &result.symbols[0];
    let test = symbol.test.as_ref().unwrap();
    assert_eq!(test.range, result.cycle.test);

    let fetch = fetch_range(&result.cycle, reference_now());
    let candles = fetch_candles(&source(), "EURUSD", fetch.start, fetch.end, cfg.chunk_days);
    let rerun = |weights: &WeightVector| {
        let window = window_candles(
            &candles,
            &test.range,
            cfg.backtest.indicators.required_history(),
            cfg.backtest.simulator.horizon,
            fetch.end,
        );
        let mut signals = run_backtest("EURUSD", window, weights, &cfg.backtest);
        signals.retain(|s| test.range.contains(s.entry_time));
        SignalStats::compute(&signals)
    };

    assert_eq!(test.optimized, rerun(&symbol.final_weights));
    assert_eq!(test.baseline, rerun(&WeightVector::default()));
}

#[test]
fn parallel_matches_sequential() {
    let sequential = config(&["EURUSD", "USDCAD", "XAUUSD"]);
    let parallel = JobConfig {
        parallel: true,
        ..sequential.clone()
    };
    let a = run_job(&sequential, reference_now(), &source(), &MemoryGateway::new()).unwrap();
    let b = run_job(&parallel, reference_now(), &source(), &MemoryGateway::new()).unwrap();

    let (a, b) = (timeless(a), timeless(b));
    assert_eq!(a.symbols, b.symbols);
    assert_eq!(a.status, b.status);
}

#[test]
fn missing_credentials_skip_symbol() {
    let gateway = MemoryGateway::new();
    let result = run_job(&config(&["EURUSD"]), reference_now(), &NoCredentials, &gateway).unwrap();

    let symbol = &result.symbols[0];
    assert_eq!(symbol.status, SymbolStatus::Skipped);
    assert_eq!(symbol.candles, 0);
    assert!(symbol.test.is_none());
    assert_eq!(symbol.final_weights, WeightVector::default());
    assert_eq!(result.status, SymbolStatus::Skipped);
}

#[test]
fn persistence_failure_does_not_fail_job() {
    let cfg = config(&["EURUSD"]);
    let broken = run_job(&cfg, reference_now(), &source(), &BrokenGateway).unwrap();
    let healthy = run_job(&cfg, reference_now(), &source(), &MemoryGateway::new()).unwrap();
    assert_eq!(timeless(broken).symbols, timeless(healthy).symbols);
}

#[test]
fn malformed_job_is_rejected() {
    let mut cfg = config(&[]);
    assert!(matches!(
        run_job(&cfg, reference_now(), &source(), &MemoryGateway::new()),
        Err(JobError::Config(_))
    ));

    cfg.symbols = vec!["EURUSD".into()];
    cfg.optimizer.learning_rate = -1.0;
    assert!(run_job(&cfg, reference_now(), &source(), &MemoryGateway::new()).is_err());

    let zero_ma = JobConfig::from_toml("symbols = [\"EURUSD\"]\n[backtest.indicators]\nma_fast = 0\n").unwrap();
    assert!(matches!(
        run_job(&zero_ma, reference_now(), &source(), &MemoryGateway::new()),
        Err(JobError::Config(_))
    ));
}

#[test]
fn file_gateway_persists_job() {
    let tmp = TempDir::new().unwrap();
    let gateway = FileGateway::new(tmp.path());
    let result = run_job(&config(&["EURUSD", "USDCAD"]), reference_now(), &source(), &gateway).unwrap();

    let records = gateway.load_weights().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records["EURUSD::default"].weights, result.symbols[0].final_weights);

    let log = gateway.read_log().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].symbols.len(), 2);
    assert_eq!(log[0].status, result.status);
}
