//! Candle, the fundamental market data unit.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle for a single symbol at a single timestamp.
///
/// Candles are immutable once fetched. A series is always ordered ascending
/// by `timestamp` with no duplicate timestamps (see [`normalize_series`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// UTC hour of day (0..=23) at the candle's open.
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high bounds the body from above, low from below.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }
}

/// Sort candles ascending by timestamp, drop duplicates (first occurrence wins)
/// and discard insane rows.
///
/// Chunked fetches overlap at their boundaries, so this runs on every
/// assembled series.
pub fn normalize_series(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.retain(Candle::is_sane);
    // Stable sort keeps the earliest-fetched copy first among equal timestamps.
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    candles
}
