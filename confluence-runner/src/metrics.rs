//! Signal statistics: pure functions over resolved historical signals.
//!
//! Every statistic is a pure function of a signal list. Sums run over sorted
//! values so results do not depend on list order.

use serde::{Deserialize, Serialize};

use confluence_core::domain::{Direction, HistoricalSignal, Outcome};

/// Default thresholds for [`threshold_sweep`].
pub const SWEEP_THRESHOLDS: [f64; 11] = [50.0, 55.0, 60.0, 65.0, 70.0, 75.0, 80.0, 85.0, 90.0, 92.0, 95.0];

/// Thresholds keeping fewer signals than this are left out of a sweep.
pub const MIN_SWEEP_SIGNALS: usize = 10;

/// Aggregate statistics for a list of signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub count: usize,
    pub wins: usize,
    pub losses: usize,
    pub timed_out: usize,
    /// Wins over TP/SL-resolved signals, as a fraction.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub sharpe: f64,
    pub profit_factor: f64,
    /// Largest peak-to-trough drop of cumulative P&L, in percent points.
    pub max_drawdown: f64,
    pub buy: DirectionStats,
    pub sell: DirectionStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionStats {
    pub count: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
}

impl SignalStats {
    pub fn compute(signals: &[HistoricalSignal]) -> Self {
        let returns: Vec<f64> = signals.iter().map(|s| s.pnl_percent).collect();
        let wins = count_outcome(signals, Outcome::TpHit);
        let losses = count_outcome(signals, Outcome::SlHit);
        let total_pnl = sorted_sum(&returns);

        Self {
            count: signals.len(),
            wins,
            losses,
            timed_out: count_outcome(signals, Outcome::TimedOut),
            win_rate: ratio(wins, wins + losses),
            total_pnl,
            avg_pnl: if signals.is_empty() {
                0.0
            } else {
                total_pnl / signals.len() as f64
            },
            sharpe: sharpe_like(&returns, 5),
            profit_factor: profit_factor(&returns),
            max_drawdown: max_drawdown(&returns),
            buy: DirectionStats::compute(signals, Direction::Buy),
            sell: DirectionStats::compute(signals, Direction::Sell),
        }
    }
}

impl DirectionStats {
    fn compute(signals: &[HistoricalSignal], direction: Direction) -> Self {
        let subset: Vec<&HistoricalSignal> = signals.iter().filter(|s| s.direction == direction).collect();
        let wins = subset.iter().filter(|s| s.outcome == Outcome::TpHit).count();
        let resolved = subset.iter().filter(|s| s.outcome.is_resolved()).count();
        let returns: Vec<f64> = subset.iter().map(|s| s.pnl_percent).collect();
        Self {
            count: subset.len(),
            wins,
            win_rate: ratio(wins, resolved),
            total_pnl: sorted_sum(&returns),
        }
    }
}

/// Stats of the signals whose stored confidence reaches each threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRow {
    pub threshold: f64,
    pub stats: SignalStats,
    /// Ranking used by [`optimal_threshold`].
    pub composite: f64,
}

/// One row per threshold that keeps at least [`MIN_SWEEP_SIGNALS`] signals.
pub fn threshold_sweep(signals: &[HistoricalSignal], thresholds: &[f64]) -> Vec<ThresholdRow> {
    thresholds
        .iter()
        .filter_map(|&threshold| {
            let kept: Vec<HistoricalSignal> = signals
                .iter()
                .filter(|s| s.confidence >= threshold)
                .cloned()
                .collect();
            if kept.len() < MIN_SWEEP_SIGNALS {
                return None;
            }
            let stats = SignalStats::compute(&kept);
            Some(ThresholdRow {
                threshold,
                composite: composite_score(&stats),
                stats,
            })
        })
        .collect()
}

/// `0.4 × win rate (%) + 0.3 × avg P&L + 5 × sharpe + 5 × profit factor`
pub fn composite_score(stats: &SignalStats) -> f64 {
    stats.win_rate * 100.0 * 0.4 + stats.avg_pnl * 0.3 + stats.sharpe * 5.0 + stats.profit_factor * 5.0
}

/// Row with the highest composite. Ties go to the lower threshold.
pub fn optimal_threshold(rows: &[ThresholdRow]) -> Option<&ThresholdRow> {
    rows.iter().fold(None, |best: Option<&ThresholdRow>, row| match best {
        Some(b) if b.composite >= row.composite => Some(b),
        _ => Some(row),
    })
}

/// Sum in ascending order, so the result is independent of input order.
pub fn sorted_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.iter().sum()
}

/// Mean over population standard deviation.
///
/// 0.0 with fewer than `min_returns` values or zero deviation.
pub fn sharpe_like(returns: &[f64], min_returns: usize) -> f64 {
    if returns.len() < min_returns.max(1) {
        return 0.0;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std == 0.0 || !std.is_finite() {
        return 0.0;
    }
    mean / std
}

/// Gross profit / gross loss. Capped at 100.0 (all winners, zero losses).
pub fn profit_factor(returns: &[f64]) -> f64 {
    let gains: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
    let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).map(f64::abs).collect();
    let gross_profit = sorted_sum(&gains);
    let gross_loss = sorted_sum(&losses);
    if gross_loss == 0.0 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Largest drop of the cumulative return curve from a running peak (starting at 0).
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for r in returns {
        equity += r;
        peak = peak.max(equity);
        worst = worst.max(peak - equity);
    }
    worst
}

fn count_outcome(signals: &[HistoricalSignal], outcome: Outcome) -> usize {
    signals.iter().filter(|s| s.outcome == outcome).count()
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, TimeZone, Utc};
    use confluence_core::domain::{ConfluenceFlags, Direction, ExitKind, HistoricalSignal, Outcome};

    /// A resolved signal with the given outcome and P&L.
    pub fn signal(i: usize, direction: Direction, outcome: Outcome, pnl: f64) -> HistoricalSignal {
        let entry_time = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap() + Duration::hours(3 * i as i64);
        let exit_kind = match outcome {
            Outcome::TpHit => ExitKind::TakeProfit,
            Outcome::SlHit => ExitKind::InitialStop,
            Outcome::TimedOut => ExitKind::Horizon,
        };
        HistoricalSignal {
            symbol: "EUR_USD".into(),
            direction,
            entry: 1.1,
            stop_loss: 1.09,
            take_profit: 1.12,
            entry_time,
            exit_time: entry_time + Duration::hours(5),
            confidence: 70.0,
            flags: ConfluenceFlags::default(),
            trend_multiplier: 1.0,
            outcome,
            exit_kind,
            exit_price: 1.1 * (1.0 + pnl / 100.0),
            pnl_percent: pnl,
            atr: 0.005,
        }
    }
}
