//! Trailing volume average over the candles preceding the current one.
//! Lookback: period (the current candle is excluded from its own average).

use super::{mean, Indicator};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct VolumeAverage {
    period: usize,
    name: String,
}

impl VolumeAverage {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "volume average period must be >= 1");
        Self {
            period,
            name: format!("volume_avg_{period}"),
        }
    }
}

impl Indicator for VolumeAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];
        for i in self.period..n {
            result[i] = mean(candles[i - self.period..i].iter().map(|c| c.volume));
        }
        result
    }
}
