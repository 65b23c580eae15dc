//! Per-symbol tuning of the stop-loss and take-profit ATR multipliers.
//!
//! Stored signals are re-simulated under candidate multipliers. Detection and
//! gating are untouched, so only levels, outcomes and P&L move. The objective
//! is `0.6 × win rate (%) + 10 × min(reward/risk, 3)`, maximized with the same
//! finite-difference ascent the weight optimizer uses.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use confluence_core::backtest::resimulate;
use confluence_core::domain::{Candle, HistoricalSignal};
use confluence_core::simulator::SimulatorConfig;

use crate::metrics::SignalStats;
use crate::optimizer::{gradient_ascent, OptimizerConfig};

/// Reward/risk above this earns no extra credit.
const MAX_CREDITED_REWARD_RISK: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtrTuningConfig {
    pub sl_bounds: (f64, f64),
    pub tp_bounds: (f64, f64),
    /// Candidates are projected so that `tp ≥ min_reward_risk × sl`.
    pub min_reward_risk: f64,
    /// Fewer signals than this and the symbol is not tuned.
    pub min_signals: usize,
    pub optimizer: OptimizerConfig,
}

impl Default for AtrTuningConfig {
    fn default() -> Self {
        Self {
            sl_bounds: (0.8, 2.5),
            tp_bounds: (1.5, 4.0),
            min_reward_risk: 1.5,
            min_signals: 20,
            optimizer: OptimizerConfig {
                learning_rate: 0.01,
                iterations: 50,
                epsilon: 0.05,
                ..OptimizerConfig::default()
            },
        }
    }
}

impl AtrTuningConfig {
    /// Move `(sl, tp)` onto the reward/risk floor, inside the boxes.
    pub fn project(&self, sl: f64, tp: f64) -> (f64, f64) {
        let (sl_lo, sl_hi) = self.sl_bounds;
        let (tp_lo, tp_hi) = self.tp_bounds;
        let sl = sl.clamp(sl_lo, sl_hi).min(tp_hi / self.min_reward_risk);
        let tp = tp.clamp(tp_lo, tp_hi).max(sl * self.min_reward_risk).min(tp_hi);
        (sl, tp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrTuning {
    pub sl_atr: f64,
    pub tp_atr: f64,
    pub reward_risk: f64,
    pub signals: usize,
    pub initial_score: f64,
    pub score: f64,
    /// Stats of the signals as given.
    pub baseline: SignalStats,
    /// Stats after re-simulating under the tuned multipliers.
    pub tuned: SignalStats,
}

/// Tuning objective for re-simulated trades under `(sl, tp)`.
pub fn tuning_score(trades: &[HistoricalSignal], sl: f64, tp: f64) -> f64 {
    let win_rate = SignalStats::compute(trades).win_rate * 100.0;
    win_rate * 0.6 + (tp / sl).min(MAX_CREDITED_REWARD_RISK) * 10.0
}

fn with_multipliers(simulator: &SimulatorConfig, sl: f64, tp: f64) -> SimulatorConfig {
    let mut sim = *simulator;
    sim.levels.sl_atr = sl;
    sim.levels.tp_atr = tp;
    sim
}

fn resimulate_all(signals: &[HistoricalSignal], candles: &[Candle], sim: &SimulatorConfig) -> Vec<HistoricalSignal> {
    signals.iter().filter_map(|s| resimulate(s, candles, sim)).collect()
}

/// Tune `simulator`'s ATR multipliers against `signals` entered on `candles`.
///
/// Returns `None` with fewer than `config.min_signals` signals.
pub fn tune_atr_multipliers(
    symbol: &str,
    signals: &[HistoricalSignal],
    candles: &[Candle],
    simulator: &SimulatorConfig,
    config: &AtrTuningConfig,
) -> Option<AtrTuning> {
    if signals.len() < config.min_signals {
        debug!(symbol, signals = signals.len(), min = config.min_signals, "too few signals, not tuning");
        return None;
    }

    let objective = |p: &[f64]| {
        let (sl, tp) = config.project(p[0], p[1]);
        let trades = resimulate_all(signals, candles, &with_multipliers(simulator, sl, tp));
        tuning_score(&trades, sl, tp)
    };
    let optimum = gradient_ascent(
        &[simulator.levels.sl_atr, simulator.levels.tp_atr],
        &[config.sl_bounds, config.tp_bounds],
        &config.optimizer,
        objective,
    );

    let (sl_atr, tp_atr) = config.project(optimum.params[0], optimum.params[1]);
    let tuned = resimulate_all(signals, candles, &with_multipliers(simulator, sl_atr, tp_atr));
    info!(
        symbol,
        sl_atr,
        tp_atr,
        initial = optimum.initial_score,
        best = optimum.score,
        "ATR multipliers tuned"
    );

    Some(AtrTuning {
        sl_atr,
        tp_atr,
        reward_risk: tp_atr / sl_atr,
        signals: signals.len(),
        initial_score: optimum.initial_score,
        score: optimum.score,
        baseline: SignalStats::compute(signals),
        tuned: SignalStats::compute(&tuned),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::signal;
    use chrono::{TimeZone, Utc};
    use confluence_core::backtest::{run_backtest, BacktestConfig};
    use confluence_core::data::{fetch_candles, SyntheticConfig, SyntheticSource, DEFAULT_CHUNK_DAYS};
    use confluence_core::domain::{Direction, Outcome, WeightVector};

    fn history() -> (Vec<Candle>, Vec<HistoricalSignal>) {
        let source = SyntheticSource::new(SyntheticConfig {
            anchor: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ..SyntheticConfig::default()
        });
        let start = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        let candles = fetch_candles(&source, "EURUSD", start, end, DEFAULT_CHUNK_DAYS);
        let signals = run_backtest("EURUSD", &candles, &WeightVector::default(), &BacktestConfig::default());
        (candles, signals)
    }

    #[test]
    fn projection_enforces_reward_risk_floor() {
        let cfg = AtrTuningConfig::default();
        assert_eq!(cfg.project(2.0, 2.5), (2.0, 3.0));
        assert_eq!(cfg.project(1.0, 3.5), (1.0, 3.5));
        let (sl, tp) = cfg.project(9.0, 0.0);
        assert_eq!(sl, 2.5);
        assert!(tp >= sl * cfg.min_reward_risk && tp <= 4.0);
    }

    #[test]
    fn score_rewards_win_rate_and_capped_reward_risk() {
        let trades = vec![
            signal(0, Direction::Buy, Outcome::TpHit, 1.0),
            signal(1, Direction::Buy, Outcome::SlHit, -1.0),
        ];
        assert!((tuning_score(&trades, 1.0, 2.0) - (30.0 + 20.0)).abs() < 1e-9);
        assert_eq!(tuning_score(&trades, 1.0, 3.0), tuning_score(&trades, 1.0, 4.0));
    }

    #[test]
    fn too_few_signals_are_not_tuned() {
        let (candles, signals) = history();
        let cfg = AtrTuningConfig::default();
        let thin = &signals[..signals.len().min(cfg.min_signals - 1)];
        assert!(tune_atr_multipliers("EURUSD", thin, &candles, &SimulatorConfig::default(), &cfg).is_none());
    }

    #[test]
    fn tuned_multipliers_respect_bounds_and_floor() {
        let (candles, signals) = history();
        assert!(signals.len() >= 20, "only {} signals", signals.len());
        let cfg = AtrTuningConfig::default();
        let tuning = tune_atr_multipliers("EURUSD", &signals, &candles, &SimulatorConfig::default(), &cfg).unwrap();

        assert!((0.8..=2.5).contains(&tuning.sl_atr));
        assert!((1.5..=4.0).contains(&tuning.tp_atr));
        assert!(tuning.reward_risk >= cfg.min_reward_risk - 1e-12);
        assert!(tuning.score >= tuning.initial_score);
        assert_eq!(tuning.tuned.count, tuning.baseline.count);

        let again = tune_atr_multipliers("EURUSD", &signals, &candles, &SimulatorConfig::default(), &cfg).unwrap();
        assert_eq!(tuning, again);
    }
}
