//! Adaptive stop-loss / take-profit levels.
//!
//! Distances start at `ATR × base multiplier`, then scale by a volatility
//! factor (ATR relative to price) and a session factor (UTC hour at entry).
//! The reward/risk ratio is finally clamped into `[min_rr, max_rr]`.

use serde::{Deserialize, Serialize};

use crate::domain::{session, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub sl_atr: f64,
    pub tp_atr: f64,
    /// ATR/price above this widens both distances.
    pub high_volatility: f64,
    pub high_volatility_factor: f64,
    /// ATR/price below this narrows both distances.
    pub low_volatility: f64,
    pub low_volatility_factor: f64,
    pub asian_factor: f64,
    pub overlap_factor: f64,
    pub min_reward_risk: f64,
    pub max_reward_risk: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            sl_atr: 1.5,
            tp_atr: 3.0,
            high_volatility: 0.015,
            high_volatility_factor: 1.25,
            low_volatility: 0.01,
            low_volatility_factor: 0.85,
            asian_factor: 0.8,
            overlap_factor: 1.2,
            min_reward_risk: 1.5,
            max_reward_risk: 3.0,
        }
    }
}

impl LevelConfig {
    pub fn volatility_factor(&self, atr: f64, price: f64) -> f64 {
        let ratio = atr / price;
        if ratio > self.high_volatility {
            self.high_volatility_factor
        } else if ratio < self.low_volatility {
            self.low_volatility_factor
        } else {
            1.0
        }
    }

    pub fn session_factor(&self, hour: u32) -> f64 {
        if session::is_asian(hour) {
            self.asian_factor
        } else if session::is_overlap(hour) {
            self.overlap_factor
        } else {
            1.0
        }
    }
}

/// Stop and target for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub sl_distance: f64,
    pub tp_distance: f64,
}

impl Levels {
    pub fn compute(direction: Direction, entry: f64, atr: f64, hour: u32, config: &LevelConfig) -> Option<Self> {
        if !atr.is_finite() || atr <= 0.0 || !entry.is_finite() || entry <= 0.0 {
            return None;
        }
        let scale = config.volatility_factor(atr, entry) * config.session_factor(hour);
        let sl_distance = atr * config.sl_atr * scale;
        let tp_distance = (atr * config.tp_atr * scale).clamp(
            sl_distance * config.min_reward_risk,
            sl_distance * config.max_reward_risk,
        );
        let sign = direction.sign();
        Some(Self {
            stop_loss: entry - sign * sl_distance,
            take_profit: entry + sign * tp_distance,
            sl_distance,
            tp_distance,
        })
    }

    pub fn reward_risk(&self) -> f64 {
        self.tp_distance / self.sl_distance
    }
}
