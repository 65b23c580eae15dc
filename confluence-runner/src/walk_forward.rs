//! Walk-forward evaluation: sequential monthly training periods that carry
//! learned weights forward, then one held-out test window.
//!
//! The period loop is a fold: `seed → period₁ → period₂ → …`. Each period
//! backtests with the carried weights, and either skips (too few signals,
//! weights unchanged) or optimizes from the carried vector. A checkpoint
//! callback fires after every period so the caller can persist progress.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use confluence_core::domain::{HistoricalSignal, WeightVector};

use crate::metrics::SignalStats;
use crate::optimizer::WeightOptimizer;
use crate::schedule::DateRange;
use crate::score::performance_score;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    pub training_months: u32,
    pub test_months: u32,
    /// Total history covered by the schedule.
    pub total_months: u32,
    /// Training periods with fewer signals are skipped.
    pub min_training_signals: usize,
    /// A test window with fewer signals under either vector makes the symbol partial.
    pub min_test_signals: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            training_months: 3,
            test_months: 1,
            total_months: 4,
            min_training_signals: 25,
            min_test_signals: 10,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodStatus {
    Optimized,
    Skipped,
}

/// Summary of one training period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePeriod {
    /// `YYYY-MM`
    pub label: String,
    pub range: DateRange,
    pub signal_count: usize,
    pub baseline_score: Option<f64>,
    pub optimized_score: Option<f64>,
    pub duration_ms: u64,
    pub status: PeriodStatus,
}

/// Final carried weights and per-period summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldOutcome {
    pub final_weights: WeightVector,
    pub periods: Vec<PerformancePeriod>,
}

impl FoldOutcome {
    pub fn optimized_periods(&self) -> usize {
        self.periods
            .iter()
            .filter(|p| p.status == PeriodStatus::Optimized)
            .count()
    }
}

/// Out-of-sample comparison of the default and the learned weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestComparison {
    pub range: DateRange,
    pub baseline: SignalStats,
    pub optimized: SignalStats,
    /// Optimized minus baseline win rate, in percentage points.
    pub win_rate_lift: f64,
    /// Relative P&L change in percent. `None` when the baseline P&L is zero.
    pub pnl_lift_percent: Option<f64>,
}

impl TestComparison {
    pub fn compute(range: DateRange, baseline: &[HistoricalSignal], optimized: &[HistoricalSignal]) -> Self {
        let baseline = SignalStats::compute(baseline);
        let optimized = SignalStats::compute(optimized);
        let win_rate_lift = (optimized.win_rate - baseline.win_rate) * 100.0;
        let pnl_lift_percent = (baseline.total_pnl != 0.0)
            .then(|| (optimized.total_pnl - baseline.total_pnl) / baseline.total_pnl.abs() * 100.0);
        Self {
            range,
            baseline,
            optimized,
            win_rate_lift,
            pnl_lift_percent,
        }
    }

    /// Signals under the thinner of the two vectors.
    pub fn min_signal_count(&self) -> usize {
        self.baseline.count.min(self.optimized.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolStatus {
    Success,
    Partial,
    Skipped,
}

// ─── Fold ────────────────────────────────────────────────────────────

/// Run the training periods in order, carrying weights from `seed`.
///
/// `backtest` produces the signals of a period under the given weights.
/// `checkpoint` receives each period summary with the weights carried out of it.
pub fn fold_periods<B, C>(
    seed: WeightVector,
    periods: &[DateRange],
    config: &WalkForwardConfig,
    optimizer: &WeightOptimizer,
    mut backtest: B,
    mut checkpoint: C,
) -> FoldOutcome
where
    B: FnMut(&DateRange, &WeightVector) -> Vec<HistoricalSignal>,
    C: FnMut(&PerformancePeriod, &WeightVector),
{
    let (final_weights, periods) = periods.iter().fold(
        (seed, Vec::with_capacity(periods.len())),
        |(weights, mut summaries), range| {
            let started = Instant::now();
            let signals = backtest(range, &weights);

            let (period, carried) = if signals.len() < config.min_training_signals {
                debug!(
                    period = %range.label(),
                    signals = signals.len(),
                    min = config.min_training_signals,
                    "too few signals, skipping period"
                );
                let period = PerformancePeriod {
                    label: range.label(),
                    range: *range,
                    signal_count: signals.len(),
                    baseline_score: None,
                    optimized_score: None,
                    duration_ms: elapsed_ms(started),
                    status: PeriodStatus::Skipped,
                };
                (period, weights)
            } else {
                let baseline = performance_score(&signals, &weights, &optimizer.score);
                let result = optimizer.optimize(&signals, &weights);
                info!(
                    period = %range.label(),
                    signals = signals.len(),
                    baseline,
                    optimized = result.score,
                    "period optimized"
                );
                let period = PerformancePeriod {
                    label: range.label(),
                    range: *range,
                    signal_count: signals.len(),
                    baseline_score: Some(baseline),
                    optimized_score: Some(result.score),
                    duration_ms: elapsed_ms(started),
                    status: PeriodStatus::Optimized,
                };
                (period, result.weights)
            };

            checkpoint(&period, &carried);
            summaries.push(period);
            (carried, summaries)
        },
    );

    FoldOutcome { final_weights, periods }
}

/// Status of a symbol from its fold and optional test comparison.
pub fn symbol_status(fold: &FoldOutcome, test: Option<&TestComparison>, config: &WalkForwardConfig) -> SymbolStatus {
    if fold.optimized_periods() == 0 {
        return SymbolStatus::Skipped;
    }
    match test {
        Some(t) if t.min_signal_count() >= config.min_test_signals => SymbolStatus::Success,
        _ => SymbolStatus::Partial,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
