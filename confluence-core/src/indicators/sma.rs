//! Simple Moving Average (SMA).
//!
//! Mean of close prices over a lookback window.
//! Lookback: period - 1 (first valid value at index period-1).

use super::{mean, Indicator};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period {
            return result;
        }

        // Fresh sum per window: no rolling drift, so values do not depend on
        // how much history precedes the window.
        for i in (self.period - 1)..n {
            let window = &candles[i + 1 - self.period..=i];
            result[i] = mean(window.iter().map(|c| c.close));
        }

        result
    }
}
