//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! Three bands (separate Indicator instances):
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1.

use super::{mean, Indicator};
use crate::domain::Candle;

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(band: BollingerBand, period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Upper, period, multiplier)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Middle, period, multiplier)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(BollingerBand::Lower, period, multiplier)
    }
}

impl Indicator for Bollinger {
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

        for i in (self.period - 1)..n {
            let window = &candles[i + 1 - self.period..=i];
            let mid = mean(window.iter().map(|c| c.close));

            result[i] = match self.band {
                BollingerBand::Middle => mid,
                BollingerBand::Upper | BollingerBand::Lower => {
                    let variance = mean(window.iter().map(|c| {
                        let diff = c.close - mid;
                        diff * diff
                    }));
                    let offset = self.multiplier * variance.sqrt();
                    if self.band == BollingerBand::Upper {
                        mid + offset
                    } else {
                        mid - offset
                    }
                }
            };
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn bollinger_constant_series_collapses() {
        let candles = make_candles(&[50.0; 25]);
        let upper = Bollinger::upper(20, 2.0).compute(&candles);
        let lower = Bollinger::lower(20, 2.0).compute(&candles);
        assert_approx(upper[24], 50.0, DEFAULT_EPSILON);
        assert_approx(lower[24], 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_population_stddev() {
        // closes 2,4,4,4,5,5,7,9 → mean 5, population stddev 2
        let candles = make_candles(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let mid = Bollinger::middle(8, 2.0).compute(&candles);
        let upper = Bollinger::upper(8, 2.0).compute(&candles);
        let lower = Bollinger::lower(8, 2.0).compute(&candles);
        assert_approx(mid[7], 5.0, DEFAULT_EPSILON);
        assert_approx(upper[7], 9.0, DEFAULT_EPSILON);
        assert_approx(lower[7], 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_warmup_is_nan() {
        let candles = make_candles(&[1.0, 2.0, 3.0]);
        let mid = Bollinger::middle(3, 2.0).compute(&candles);
        assert!(mid[0].is_nan() && mid[1].is_nan());
        assert!(!mid[2].is_nan());
    }
}
