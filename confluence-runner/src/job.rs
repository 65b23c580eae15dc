//! Training job: fetch, walk-forward optimize, test and persist each symbol.
//!
//! A symbol never fails the job. Missing data, thin periods and persistence
//! errors degrade the symbol's status and are logged. Only a malformed
//! [`JobConfig`] is an error.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use confluence_core::backtest::run_backtest;
use confluence_core::data::{fetch_candles, CandleSource};
use confluence_core::domain::{Candle, HistoricalSignal, WeightVector};

use crate::config::{ConfigError, JobConfig, RunId};
use crate::optimizer::WeightOptimizer;
use crate::persistence::{PersistenceGateway, SymbolSummary, TrainingRunSummary, WeightMetrics};
use crate::schedule::{build_schedule, CycleWindow, DateRange};
use crate::walk_forward::{fold_periods, symbol_status, PerformancePeriod, SymbolStatus, TestComparison};

/// Calendar slack fetched before the first training month so indicators are warm.
pub const WARMUP_DAYS: i64 = 30;
/// Calendar slack fetched after the test window so late entries can resolve.
pub const LOOKAHEAD_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no walk-forward cycle fits before {0}")]
    EmptySchedule(DateTime<Utc>),
}

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolResult {
    pub symbol: String,
    pub status: SymbolStatus,
    pub candles: usize,
    pub periods: Vec<PerformancePeriod>,
    pub test: Option<TestComparison>,
    pub final_weights: WeightVector,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub run_id: RunId,
    pub reference_now: DateTime<Utc>,
    pub context_key: String,
    pub cycle: CycleWindow,
    pub status: SymbolStatus,
    pub symbols: Vec<SymbolResult>,
    pub duration_ms: u64,
}

impl JobResult {
    pub fn summary(&self) -> TrainingRunSummary {
        TrainingRunSummary {
            run_id: self.run_id.clone(),
            reference_now: self.reference_now,
            context_key: self.context_key.clone(),
            status: self.status,
            duration_ms: self.duration_ms,
            symbols: self
                .symbols
                .iter()
                .map(|s| SymbolSummary {
                    symbol: s.symbol.clone(),
                    status: s.status,
                    optimized_periods: s
                        .periods
                        .iter()
                        .filter(|p| p.optimized_score.is_some())
                        .count(),
                    win_rate_lift: s.test.as_ref().map(|t| t.win_rate_lift),
                    pnl_lift_percent: s.test.as_ref().and_then(|t| t.pnl_lift_percent),
                })
                .collect(),
        }
    }
}

/// Job status from the symbol statuses: all success, all skipped, else partial.
pub fn aggregate_status(statuses: impl IntoIterator<Item = SymbolStatus>) -> SymbolStatus {
    let statuses: Vec<SymbolStatus> = statuses.into_iter().collect();
    if statuses.is_empty() || statuses.iter().all(|s| *s == SymbolStatus::Skipped) {
        SymbolStatus::Skipped
    } else if statuses.iter().all(|s| *s == SymbolStatus::Success) {
        SymbolStatus::Success
    } else {
        SymbolStatus::Partial
    }
}

// ─── Job ─────────────────────────────────────────────────────────────

/// Run the active walk-forward cycle for every symbol in `config`.
///
/// Symbol results keep the input order, also when run in parallel.
pub fn run_job(
    config: &JobConfig,
    reference_now: DateTime<Utc>,
    source: &dyn CandleSource,
    gateway: &dyn PersistenceGateway,
) -> Result<JobResult, JobError> {
    config.validate()?;
    let started = Instant::now();
    let wf = &config.walk_forward;
    let cycle = build_schedule(reference_now, wf.training_months, wf.test_months, wf.total_months)
        .pop()
        .ok_or(JobError::EmptySchedule(reference_now))?;
    let run_id = config.run_id(reference_now);

    info!(
        run_id = %run_id,
        symbols = config.symbols.len(),
        source = source.name(),
        training = %cycle.training,
        test = %cycle.test,
        "starting training job"
    );

    let ctx = SymbolContext {
        config,
        cycle,
        reference_now,
        run_id: &run_id,
        source,
        gateway,
        optimizer: WeightOptimizer::new(config.optimizer, config.constraints, config.score),
    };

    let symbols: Vec<SymbolResult> = if config.parallel {
        config.symbols.par_iter().map(|s| ctx.run_symbol(s)).collect()
    } else {
        config.symbols.iter().map(|s| ctx.run_symbol(s)).collect()
    };

    let result = JobResult {
        run_id: run_id.clone(),
        reference_now,
        context_key: config.context_key.clone(),
        cycle,
        status: aggregate_status(symbols.iter().map(|s| s.status)),
        symbols,
        duration_ms: elapsed_ms(started),
    };

    if let Err(e) = gateway.append_training_log(&result.summary()) {
        warn!(run_id = %run_id, error = %e, "failed to append training log");
    }
    info!(run_id = %run_id, status = ?result.status, duration_ms = result.duration_ms, "training job complete");
    Ok(result)
}

struct SymbolContext<'a> {
    config: &'a JobConfig,
    cycle: CycleWindow,
    reference_now: DateTime<Utc>,
    run_id: &'a str,
    source: &'a dyn CandleSource,
    gateway: &'a dyn PersistenceGateway,
    optimizer: WeightOptimizer,
}

impl SymbolContext<'_> {
    fn run_symbol(&self, symbol: &str) -> SymbolResult {
        let started = Instant::now();
        let config = self.config;
        let fetch = fetch_range(&self.cycle, self.reference_now);
        let candles = fetch_candles(self.source, symbol, fetch.start, fetch.end, config.chunk_days);

        let backtest = |range: &DateRange,
                        weights: &WeightVector,
                        lookahead_end: DateTime<Utc>|
         -> Vec<HistoricalSignal> {
            let window = window_candles(
                &candles,
                range,
                config.backtest.indicators.required_history(),
                config.backtest.simulator.horizon,
                lookahead_end,
            );
            let mut signals = run_backtest(symbol, window, weights, &config.backtest);
            signals.retain(|s| range.contains(s.entry_time));
            signals
        };
        // training outcomes never resolve on test-window bars
        let training_end = self.cycle.training.end;
        let training_backtest = |range: &DateRange, weights: &WeightVector| backtest(range, weights, training_end);

        let mut completed = 0usize;
        let mut optimized = 0usize;
        let fold = fold_periods(
            WeightVector::default(),
            &self.cycle.training.split_months(),
            &config.walk_forward,
            &self.optimizer,
            training_backtest,
            |period, weights| {
                completed += 1;
                if period.optimized_score.is_some() {
                    optimized += 1;
                }
                let metrics = WeightMetrics {
                    run_id: self.run_id.to_string(),
                    periods_completed: completed,
                    optimized_periods: optimized,
                    last_period: Some(period.label.clone()),
                    last_score: period.optimized_score,
                    test_win_rate: None,
                    test_pnl: None,
                };
                self.persist(symbol, weights, &metrics);
            },
        );

        let test = if fold.optimized_periods() > 0 {
            let baseline = backtest(&self.cycle.test, &WeightVector::default(), fetch.end);
            let tuned = backtest(&self.cycle.test, &fold.final_weights, fetch.end);
            let comparison = TestComparison::compute(self.cycle.test, &baseline, &tuned);
            let metrics = WeightMetrics {
                run_id: self.run_id.to_string(),
                periods_completed: fold.periods.len(),
                optimized_periods: fold.optimized_periods(),
                last_period: fold.periods.last().map(|p| p.label.clone()),
                last_score: fold.periods.iter().rev().find_map(|p| p.optimized_score),
                test_win_rate: Some(comparison.optimized.win_rate),
                test_pnl: Some(comparison.optimized.total_pnl),
            };
            self.persist(symbol, &fold.final_weights, &metrics);
            Some(comparison)
        } else {
            warn!(symbol, "no training period optimized, skipping test window");
            None
        };

        let status = symbol_status(&fold, test.as_ref(), &config.walk_forward);
        info!(
            symbol,
            candles = candles.len(),
            optimized = fold.optimized_periods(),
            status = ?status,
            win_rate_lift = test.as_ref().map(|t| t.win_rate_lift),
            "symbol complete"
        );

        SymbolResult {
            symbol: symbol.to_string(),
            status,
            candles: candles.len(),
            periods: fold.periods,
            test,
            final_weights: fold.final_weights,
            duration_ms: elapsed_ms(started),
        }
    }

    fn persist(&self, symbol: &str, weights: &WeightVector, metrics: &WeightMetrics) {
        if let Err(e) = self
            .gateway
            .upsert_weights(symbol, &self.config.context_key, weights, metrics)
        {
            warn!(symbol, error = %e, "failed to persist weights, continuing");
        }
    }
}

/// Candle span a symbol fetches for `cycle`: warmup slack before training,
/// lookahead slack after the test window, never past `reference_now`
/// unless the test window itself ends later.
pub fn fetch_range(cycle: &CycleWindow, reference_now: DateTime<Utc>) -> DateRange {
    let start = cycle.training.start - Duration::days(WARMUP_DAYS);
    let end = (cycle.test.end + Duration::days(LOOKAHEAD_DAYS)).min(reference_now.max(cycle.test.end));
    DateRange::new(start, end)
}

/// Candles covering `range` plus `warmup` bars before it and up to `tail`
/// bars after it. Tail bars stop before `lookahead_end`.
pub fn window_candles<'c>(
    candles: &'c [Candle],
    range: &DateRange,
    warmup: usize,
    tail: usize,
    lookahead_end: DateTime<Utc>,
) -> &'c [Candle] {
    let first = candles.partition_point(|c| c.timestamp < range.start);
    let last = candles.partition_point(|c| c.timestamp < range.end);
    let cap = candles.partition_point(|c| c.timestamp < lookahead_end).max(last);
    let lo = first.saturating_sub(warmup);
    let hi = (last + tail).min(cap);
    &candles[lo..hi]
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
