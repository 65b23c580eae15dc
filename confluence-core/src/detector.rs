//! Signal detector: direction, higher-timeframe bias and the ten confluence flags.

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, ConfluenceFlags, Direction};
use crate::indicators::{IndicatorParams, IndicatorSeries, IndicatorSnapshot};

/// Higher-timeframe bias relative to the detected direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendBias {
    Flat,
    WithTrend,
    CounterTrend,
}

/// Detector thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Max |close - fast MA| / fast MA for a pullback.
    pub pullback_pct: f64,
    /// Distance to a key level, in ATRs.
    pub key_level_atr: f64,
    pub key_level_lookback: usize,
    /// Bars spanned by the higher-timeframe close change.
    pub htf_lookback: usize,
    /// Relative change below which the bias is flat.
    pub htf_flat_threshold: f64,
    pub with_trend_multiplier: f64,
    pub counter_trend_multiplier: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pullback_pct: 0.005,
            key_level_atr: 0.25,
            key_level_lookback: 20,
            htf_lookback: 12,
            htf_flat_threshold: 0.0025,
            with_trend_multiplier: 1.15,
            counter_trend_multiplier: 0.85,
        }
    }
}

impl DetectorConfig {
    pub fn multiplier(&self, bias: TrendBias) -> f64 {
        match bias {
            TrendBias::Flat => 1.0,
            TrendBias::WithTrend => self.with_trend_multiplier,
            TrendBias::CounterTrend => self.counter_trend_multiplier,
        }
    }
}

/// A detected setup at one candle index, before scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub direction: Direction,
    pub flags: ConfluenceFlags,
    pub bias: TrendBias,
    pub trend_multiplier: f64,
    pub snapshot: IndicatorSnapshot,
}

#[derive(Debug, Clone, Default)]
pub struct SignalDetector {
    pub params: IndicatorParams,
    pub config: DetectorConfig,
}

impl SignalDetector {
    pub fn new(params: IndicatorParams, config: DetectorConfig) -> Self {
        Self { params, config }
    }

    /// Detect at `index` using only the bounded windows before it.
    pub fn detect_at(&self, candles: &[Candle], index: usize) -> Option<Detection> {
        let current = IndicatorSnapshot::compute_with(candles, index, &self.params)?;
        let previous = index
            .checked_sub(1)
            .and_then(|i| IndicatorSnapshot::compute_with(candles, i, &self.params));
        self.evaluate(candles, index, &current, previous.as_ref())
    }

    /// Detect at `index` from precomputed series.
    pub fn detect(&self, candles: &[Candle], series: &IndicatorSeries, index: usize) -> Option<Detection> {
        let current = series.snapshot(candles, index)?;
        let previous = index.checked_sub(1).and_then(|i| series.snapshot(candles, i));
        self.evaluate(candles, index, &current, previous.as_ref())
    }

    /// Direction of the snapshot, if any.
    pub fn direction(snap: &IndicatorSnapshot) -> Option<Direction> {
        if snap.close > snap.ma_fast && snap.ma_fast > snap.ma_slow && snap.momentum > 0.0 {
            Some(Direction::Buy)
        } else if snap.close < snap.ma_fast && snap.ma_fast < snap.ma_slow && snap.momentum < 0.0 {
            Some(Direction::Sell)
        } else {
            None
        }
    }

    /// Bias from the relative close change over `htf_lookback` bars.
    pub fn trend_bias(&self, candles: &[Candle], index: usize, direction: Direction) -> TrendBias {
        let Some(past) = index.checked_sub(self.config.htf_lookback).map(|i| candles[i].close) else {
            return TrendBias::Flat;
        };
        if past <= 0.0 {
            return TrendBias::Flat;
        }
        let change = (candles[index].close - past) / past;
        if change.abs() < self.config.htf_flat_threshold {
            TrendBias::Flat
        } else if change * direction.sign() > 0.0 {
            TrendBias::WithTrend
        } else {
            TrendBias::CounterTrend
        }
    }

    fn evaluate(
        &self,
        candles: &[Candle],
        index: usize,
        snap: &IndicatorSnapshot,
        prev: Option<&IndicatorSnapshot>,
    ) -> Option<Detection> {
        let direction = Self::direction(snap)?;
        let bias = self.trend_bias(candles, index, direction);
        let candle = &candles[index];
        let cfg = &self.config;

        let mut flags = ConfluenceFlags {
            volume: snap.volume_spike,
            session: snap.in_prime_session,
            pullback: snap.ma_fast > 0.0
                && (snap.close - snap.ma_fast).abs() / snap.ma_fast <= cfg.pullback_pct,
            key_level: self.near_key_level(candles, index, snap.atr),
            htf_confirm: bias == TrendBias::WithTrend,
            ..ConfluenceFlags::default()
        };

        match direction {
            Direction::Buy => {
                flags.band_signal = candle.low <= snap.bb_mid && candle.close > snap.bb_mid;
            }
            Direction::Sell => {
                flags.band_signal = candle.high >= snap.bb_mid && candle.close < snap.bb_mid;
            }
        }

        if let Some(prev) = prev {
            flags.momentum = snap.momentum.abs() > prev.momentum.abs();
            flags.ema_align = match direction {
                Direction::Buy => snap.bullish_alignment && prev.bullish_alignment,
                Direction::Sell => snap.bearish_alignment && prev.bearish_alignment,
            };
            flags.regime = (snap.ma_fast - prev.ma_fast) * direction.sign() > 0.0;
        }

        if let Some(prior) = index.checked_sub(1).map(|i| &candles[i]) {
            flags.pattern = is_engulfing(prior, candle, direction);
        }

        Some(Detection {
            direction,
            flags,
            bias,
            trend_multiplier: cfg.multiplier(bias),
            snapshot: *snap,
        })
    }

    fn near_key_level(&self, candles: &[Candle], index: usize, atr: f64) -> bool {
        let lookback = self.config.key_level_lookback;
        if index < lookback || lookback == 0 {
            return false;
        }
        let prior = &candles[index - lookback..index];
        let high = prior.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let low = prior.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let close = candles[index].close;
        let tolerance = self.config.key_level_atr * atr;
        (close - high).abs() <= tolerance || (close - low).abs() <= tolerance
    }
}

/// Current candle's body engulfs the prior candle's opposite-colored body.
fn is_engulfing(prior: &Candle, current: &Candle, direction: Direction) -> bool {
    match direction {
        Direction::Buy => {
            prior.is_bearish()
                && current.is_bullish()
                && current.open <= prior.close
                && current.close >= prior.open
        }
        Direction::Sell => {
            prior.is_bullish()
                && current.is_bearish()
                && current.open >= prior.close
                && current.close <= prior.open
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    fn trend(n: usize, step: f64) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + step * i as f64).collect();
        make_candles(&closes)
    }

    #[test]
    fn uptrend_detects_buy() {
        let candles = trend(260, 0.1);
        let d = SignalDetector::default().detect_at(&candles, 250).unwrap();
        assert_eq!(d.direction, Direction::Buy);
        assert!(d.flags.ema_align);
        assert!(d.flags.regime);
    }

    #[test]
    fn downtrend_detects_sell() {
        let candles = trend(260, -0.1);
        let d = SignalDetector::default().detect_at(&candles, 250).unwrap();
        assert_eq!(d.direction, Direction::Sell);
        assert!(d.flags.ema_align);
    }

    #[test]
    fn flat_market_has_no_direction() {
        let candles = make_candles(&[100.0; 260]);
        assert!(SignalDetector::default().detect_at(&candles, 250).is_none());
    }

    #[test]
    fn strong_trend_is_with_trend_bias() {
        // 12 bars of +0.5 on ~220 → ~2.7% change
        let candles = trend(260, 0.5);
        let detector = SignalDetector::default();
        let d = detector.detect_at(&candles, 250).unwrap();
        assert_eq!(d.bias, TrendBias::WithTrend);
        assert!(d.flags.htf_confirm);
        assert_eq!(d.trend_multiplier, 1.15);
    }

    #[test]
    fn counter_trend_bias_against_direction() {
        let candles = trend(260, 0.5);
        let detector = SignalDetector::default();
        assert_eq!(
            detector.trend_bias(&candles, 250, Direction::Sell),
            TrendBias::CounterTrend
        );
    }

    #[test]
    fn precomputed_and_windowed_detection_agree() {
        let candles = trend(320, 0.05);
        let detector = SignalDetector::default();
        let series = IndicatorSeries::compute(&candles, detector.params);
        for index in [201, 250, 319] {
            assert_eq!(
                detector.detect(&candles, &series, index),
                detector.detect_at(&candles, index)
            );
        }
    }

    #[test]
    fn engulfing_pattern() {
        let mut candles = make_candles(&[10.0, 9.0, 11.0]);
        candles[1].open = 10.0;
        candles[1].close = 9.0;
        candles[2].open = 8.9;
        candles[2].close = 10.5;
        assert!(is_engulfing(&candles[1], &candles[2], Direction::Buy));
        assert!(!is_engulfing(&candles[1], &candles[2], Direction::Sell));
    }
}
