//! Weight vector and its box constraints.

use serde::{Deserialize, Serialize};

use super::flags::{Flag, FLAG_COUNT};

/// One non-negative weight per confluence flag.
///
/// Read-only everywhere except the weight optimizer, which only ever hands
/// back vectors that have been passed through [`BoxConstraints::clamp`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub volume: f64,
    pub session: f64,
    pub pullback: f64,
    pub momentum: f64,
    pub key_level: f64,
    pub htf_confirm: f64,
    pub ema_align: f64,
    pub band_signal: f64,
    pub regime: f64,
    pub pattern: f64,
}

impl Default for WeightVector {
    /// Seed weights used before any recalibration has run.
    fn default() -> Self {
        Self {
            volume: 10.0,
            session: 8.0,
            pullback: 12.0,
            momentum: 10.0,
            key_level: 10.0,
            htf_confirm: 20.0,
            ema_align: 20.0,
            band_signal: 8.0,
            regime: 8.0,
            pattern: 6.0,
        }
    }
}

impl WeightVector {
    /// All weights zero. Useful as a base for single-flag experiments.
    pub fn zero() -> Self {
        Self::from_array([0.0; FLAG_COUNT])
    }

    pub fn get(&self, flag: Flag) -> f64 {
        match flag {
            Flag::Volume => self.volume,
            Flag::Session => self.session,
            Flag::Pullback => self.pullback,
            Flag::Momentum => self.momentum,
            Flag::KeyLevel => self.key_level,
            Flag::HtfConfirm => self.htf_confirm,
            Flag::EmaAlign => self.ema_align,
            Flag::BandSignal => self.band_signal,
            Flag::Regime => self.regime,
            Flag::Pattern => self.pattern,
        }
    }

    pub fn set(&mut self, flag: Flag, value: f64) {
        let slot = match flag {
            Flag::Volume => &mut self.volume,
            Flag::Session => &mut self.session,
            Flag::Pullback => &mut self.pullback,
            Flag::Momentum => &mut self.momentum,
            Flag::KeyLevel => &mut self.key_level,
            Flag::HtfConfirm => &mut self.htf_confirm,
            Flag::EmaAlign => &mut self.ema_align,
            Flag::BandSignal => &mut self.band_signal,
            Flag::Regime => &mut self.regime,
            Flag::Pattern => &mut self.pattern,
        };
        *slot = value;
    }

    pub fn with(mut self, flag: Flag, value: f64) -> Self {
        self.set(flag, value);
        self
    }

    /// Weights in [`Flag::ALL`] order.
    pub fn to_array(&self) -> [f64; FLAG_COUNT] {
        Flag::ALL.map(|f| self.get(f))
    }

    /// Inverse of [`WeightVector::to_array`].
    pub fn from_array(values: [f64; FLAG_COUNT]) -> Self {
        let mut w = Self {
            volume: 0.0,
            session: 0.0,
            pullback: 0.0,
            momentum: 0.0,
            key_level: 0.0,
            htf_confirm: 0.0,
            ema_align: 0.0,
            band_signal: 0.0,
            regime: 0.0,
            pattern: 0.0,
        };
        for flag in Flag::ALL {
            w.set(flag, values[flag.index()]);
        }
        w
    }

    /// Build from a slice in [`Flag::ALL`] order. Returns `None` on length mismatch.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let arr: [f64; FLAG_COUNT] = values.try_into().ok()?;
        Some(Self::from_array(arr))
    }

    pub fn total(&self) -> f64 {
        self.to_array().iter().sum()
    }
}

/// Per-flag box constraints on weight values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxConstraints {
    /// Bounds for ordinary flags.
    pub general: (f64, f64),
    /// Bounds for the flags where [`Flag::is_strong`] holds.
    pub strong: (f64, f64),
}

impl Default for BoxConstraints {
    fn default() -> Self {
        Self {
            general: (1.0, 25.0),
            strong: (10.0, 40.0),
        }
    }
}

impl BoxConstraints {
    pub fn bounds(&self, flag: Flag) -> (f64, f64) {
        if flag.is_strong() {
            self.strong
        } else {
            self.general
        }
    }

    /// Bounds in [`Flag::ALL`] order.
    pub fn to_array(&self) -> [(f64, f64); FLAG_COUNT] {
        Flag::ALL.map(|f| self.bounds(f))
    }

    pub fn clamp(&self, weights: &WeightVector) -> WeightVector {
        let mut out = *weights;
        for flag in Flag::ALL {
            let (lo, hi) = self.bounds(flag);
            out.set(flag, weights.get(flag).clamp(lo, hi));
        }
        out
    }

    pub fn contains(&self, weights: &WeightVector) -> bool {
        Flag::ALL.iter().all(|&f| {
            let (lo, hi) = self.bounds(f);
            let w = weights.get(f);
            w >= lo && w <= hi
        })
    }
}
