//! Indicator snapshot at a candle index.
//!
//! `IndicatorSeries` precomputes every indicator once for a candle series
//! (the backtest path). `IndicatorSnapshot::compute` is the one-shot form
//! that looks only at the bounded trailing window ending at the index.
//! Both produce bit-identical snapshots because every indicator value is a
//! fresh computation over its own window.

use serde::{Deserialize, Serialize};

use super::{Atr, Bollinger, Indicator, Momentum, Sma, VolumeAverage};
use crate::domain::{session, Candle};

/// Minimum number of candles that must precede a snapshot index.
pub const MIN_HISTORY: usize = 200;

/// Indicator periods and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ma_fast: usize,
    pub ma_slow: usize,
    pub bb_period: usize,
    pub bb_multiplier: f64,
    pub atr_period: usize,
    pub volume_period: usize,
    /// Volume is a spike when it exceeds this multiple of the trailing average.
    pub volume_spike_ratio: f64,
    pub momentum_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_fast: 50,
            ma_slow: 200,
            bb_period: 20,
            bb_multiplier: 2.0,
            atr_period: 14,
            volume_period: 20,
            volume_spike_ratio: 1.5,
            momentum_period: 10,
        }
    }
}

impl IndicatorParams {
    /// Longest indicator lookback.
    pub fn warmup(&self) -> usize {
        [
            self.ma_fast.saturating_sub(1),
            self.ma_slow.saturating_sub(1),
            self.bb_period.saturating_sub(1),
            self.atr_period,
            self.volume_period,
            self.momentum_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Candles required before the first snapshot index.
    pub fn required_history(&self) -> usize {
        MIN_HISTORY.max(self.warmup())
    }
}

/// Derived indicator values at one candle index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub ma_fast: f64,
    pub ma_slow: f64,
    pub bb_mid: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub atr: f64,
    pub volume_avg: f64,
    pub volume_spike: bool,
    pub momentum: f64,
    pub in_prime_session: bool,
    pub hour: u32,
    /// close > fast MA > slow MA
    pub bullish_alignment: bool,
    /// close < fast MA < slow MA
    pub bearish_alignment: bool,
}

impl IndicatorSnapshot {
    /// Snapshot at `index` with default parameters. `None` below the warmup.
    pub fn compute(candles: &[Candle], index: usize) -> Option<Self> {
        Self::compute_with(candles, index, &IndicatorParams::default())
    }

    /// Snapshot at `index`, reading only the bounded trailing window.
    pub fn compute_with(candles: &[Candle], index: usize, params: &IndicatorParams) -> Option<Self> {
        let required = params.required_history();
        if index < required || index >= candles.len() {
            return None;
        }
        let window = &candles[index - required..=index];
        IndicatorSeries::compute(window, *params).snapshot(window, required)
    }
}

/// Precomputed indicator series for a whole candle series.
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    params: IndicatorParams,
    ma_fast: Vec<f64>,
    ma_slow: Vec<f64>,
    bb_mid: Vec<f64>,
    bb_upper: Vec<f64>,
    bb_lower: Vec<f64>,
    atr: Vec<f64>,
    volume_avg: Vec<f64>,
    momentum: Vec<f64>,
}

impl IndicatorSeries {
    pub fn compute(candles: &[Candle], params: IndicatorParams) -> Self {
        Self {
            params,
            ma_fast: Sma::new(params.ma_fast).compute(candles),
            ma_slow: Sma::new(params.ma_slow).compute(candles),
            bb_mid: Bollinger::middle(params.bb_period, params.bb_multiplier).compute(candles),
            bb_upper: Bollinger::upper(params.bb_period, params.bb_multiplier).compute(candles),
            bb_lower: Bollinger::lower(params.bb_period, params.bb_multiplier).compute(candles),
            atr: Atr::new(params.atr_period).compute(candles),
            volume_avg: VolumeAverage::new(params.volume_period).compute(candles),
            momentum: Momentum::new(params.momentum_period).compute(candles),
        }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.ma_fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ma_fast.is_empty()
    }

    /// Snapshot at `index` of the series these values were computed from.
    ///
    /// `None` when fewer than the required history precedes `index` or any
    /// value is not finite.
    pub fn snapshot(&self, candles: &[Candle], index: usize) -> Option<IndicatorSnapshot> {
        if index < self.params.required_history() || index >= candles.len() || index >= self.len() {
            return None;
        }
        let candle = &candles[index];
        let values = [
            self.ma_fast[index],
            self.ma_slow[index],
            self.bb_mid[index],
            self.bb_upper[index],
            self.bb_lower[index],
            self.atr[index],
            self.volume_avg[index],
            self.momentum[index],
        ];
        if !values.iter().all(|v| v.is_finite()) {
            return None;
        }
        let [ma_fast, ma_slow, bb_mid, bb_upper, bb_lower, atr, volume_avg, momentum] = values;
        let close = candle.close;
        let hour = candle.hour();

        Some(IndicatorSnapshot {
            close,
            ma_fast,
            ma_slow,
            bb_mid,
            bb_upper,
            bb_lower,
            atr,
            volume_avg,
            volume_spike: candle.volume > self.params.volume_spike_ratio * volume_avg,
            momentum,
            in_prime_session: session::is_prime(hour),
            hour,
            bullish_alignment: close > ma_fast && ma_fast > ma_slow,
            bearish_alignment: close < ma_fast && ma_fast < ma_slow,
        })
    }
}
