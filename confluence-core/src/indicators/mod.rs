//! Indicator implementations and the per-index snapshot built from them.
//!
//! Every indicator is a pure function of candle history: a full series in, a
//! same-length `Vec<f64>` out, `NaN` during warmup. Each value is computed from
//! its own trailing window only, so a value at index `t` is bit-identical
//! whether the input is the full series or any suffix-truncated copy holding
//! the window.

pub mod atr;
pub mod bollinger;
pub mod momentum;
pub mod sma;
pub mod snapshot;
pub mod volume;

pub use atr::{true_range, Atr};
pub use bollinger::{Bollinger, BollingerBand};
pub use momentum::Momentum;
pub use sma::Sma;
pub use snapshot::{IndicatorParams, IndicatorSeries, IndicatorSnapshot, MIN_HISTORY};
pub use volume::VolumeAverage;

use crate::domain::Candle;

/// An indicator over a candle series.
///
/// # Look-ahead contamination guard
/// No value at candle t may depend on candle t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g. "sma_50", "atr_14").
    fn name(&self) -> &str;

    /// Number of leading values that are `NaN`.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the whole series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Arithmetic mean, summed left to right.
pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Create hourly candles from close prices for testing.
///
/// open = prev close (or close for the first candle),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
