//! Backtest engine: indicators → detector → scorer → simulator over one series.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detector::{DetectorConfig, SignalDetector};
use crate::domain::{Candle, HistoricalSignal, WeightVector};
use crate::indicators::{IndicatorParams, IndicatorSeries};
use crate::scoring::{confidence, passes_threshold, CONFIDENCE_THRESHOLD};
use crate::simulator::{simulate, SimulatorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Evaluate every `stride`-th candle.
    pub stride: usize,
    /// Series shorter than this produce no signals.
    pub min_candles: usize,
    pub threshold: f64,
    pub indicators: IndicatorParams,
    pub detector: DetectorConfig,
    pub simulator: SimulatorConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            stride: 3,
            min_candles: 300,
            threshold: CONFIDENCE_THRESHOLD,
            indicators: IndicatorParams::default(),
            detector: DetectorConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl BacktestConfig {
    /// Candle indices the backtest evaluates for a series of `len` candles.
    pub fn entry_indices(&self, len: usize) -> impl Iterator<Item = usize> {
        let start = self.indicators.required_history();
        let end = len.saturating_sub(self.simulator.horizon);
        (start..end).step_by(self.stride.max(1))
    }
}

/// Run the backtest over `candles` scoring with `weights`.
///
/// Returns signals in entry-time order. Fewer than `min_candles` candles
/// yields an empty list.
pub fn run_backtest(
    symbol: &str,
    candles: &[Candle],
    weights: &WeightVector,
    config: &BacktestConfig,
) -> Vec<HistoricalSignal> {
    if candles.len() < config.min_candles {
        debug!(symbol, candles = candles.len(), "too few candles, skipping backtest");
        return Vec::new();
    }

    let detector = SignalDetector::new(config.indicators, config.detector);
    let series = IndicatorSeries::compute(candles, config.indicators);
    let horizon = config.simulator.horizon;
    let mut signals = Vec::new();

    for i in config.entry_indices(candles.len()) {
        let Some(detection) = detector.detect(candles, &series, i) else {
            continue;
        };
        let conf = confidence(&detection.flags, weights, detection.trend_multiplier);
        if !passes_threshold(conf, config.threshold) {
            continue;
        }

        let candle = &candles[i];
        let atr = detection.snapshot.atr;
        let path = &candles[i + 1..(i + 1 + horizon).min(candles.len())];
        let Some(trade) = simulate(detection.direction, candle.close, atr, candle.hour(), path, &config.simulator)
        else {
            continue;
        };

        signals.push(HistoricalSignal {
            symbol: symbol.to_string(),
            direction: detection.direction,
            entry: candle.close,
            stop_loss: trade.levels.stop_loss,
            take_profit: trade.levels.take_profit,
            entry_time: candle.timestamp,
            exit_time: trade.exit_time,
            confidence: conf,
            flags: detection.flags,
            trend_multiplier: detection.trend_multiplier,
            outcome: trade.outcome,
            exit_kind: trade.exit_kind,
            exit_price: trade.exit_price,
            pnl_percent: trade.pnl_percent,
            atr,
        });
    }

    debug!(symbol, candles = candles.len(), signals = signals.len(), "backtest complete");
    signals
}

/// Re-run the trade of a stored signal under different simulator settings.
///
/// The entry candle is looked up in `candles` by entry time. Detection and
/// confidence are kept; levels, outcome and P&L are replaced. `None` when the
/// entry candle is missing or the new levels are invalid.
pub fn resimulate(
    signal: &HistoricalSignal,
    candles: &[Candle],
    config: &SimulatorConfig,
) -> Option<HistoricalSignal> {
    let i = candles
        .binary_search_by(|c| c.timestamp.cmp(&signal.entry_time))
        .ok()?;
    let candle = &candles[i];
    let path = &candles[i + 1..(i + 1 + config.horizon).min(candles.len())];
    let trade = simulate(signal.direction, signal.entry, signal.atr, candle.hour(), path, config)?;
    Some(HistoricalSignal {
        stop_loss: trade.levels.stop_loss,
        take_profit: trade.levels.take_profit,
        exit_time: trade.exit_time,
        outcome: trade.outcome,
        exit_kind: trade.exit_kind,
        exit_price: trade.exit_price,
        pnl_percent: trade.pnl_percent,
        ..signal.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    fn all_max() -> WeightVector {
        WeightVector::from_array([40.0; crate::domain::FLAG_COUNT])
    }

    #[test]
    fn short_series_yields_nothing() {
        let candles = make_candles(&vec![100.0; 299]);
        assert!(run_backtest("EUR_USD", &candles, &all_max(), &BacktestConfig::default()).is_empty());
    }

    #[test]
    fn entry_indices_respect_warmup_horizon_and_stride() {
        let cfg = BacktestConfig::default();
        let idx: Vec<usize> = cfg.entry_indices(260).collect();
        assert_eq!(idx.first(), Some(&200));
        assert_eq!(idx.last(), Some(&209));
        assert!(idx.windows(2).all(|w| w[1] - w[0] == 3));
    }

    #[test]
    fn zero_weights_emit_nothing() {
        let closes: Vec<f64> = (0..400).map(|i| 100.0 + 0.1 * i as f64).collect();
        let candles = make_candles(&closes);
        let signals = run_backtest("EUR_USD", &candles, &WeightVector::zero(), &BacktestConfig::default());
        assert!(signals.is_empty());
    }

    #[test]
    fn trending_series_emits_gated_signals() {
        let closes: Vec<f64> = (0..400).map(|i| 100.0 + 0.1 * i as f64).collect();
        let candles = make_candles(&closes);
        let signals = run_backtest("EUR_USD", &candles, &all_max(), &BacktestConfig::default());
        assert!(!signals.is_empty());
        for s in &signals {
            assert!(s.confidence >= CONFIDENCE_THRESHOLD);
            assert!(s.entry_time < s.exit_time);
            assert_eq!(s.symbol, "EUR_USD");
        }
        assert!(signals.windows(2).all(|w| w[0].entry_time < w[1].entry_time));
    }
}
