//! Signal direction, trade outcome, and the resolved historical signal record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::flags::ConfluenceFlags;

/// Trade direction of a detected signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1.0 for Buy, -1.0 for Sell. Multiplies price moves into favorable excursion.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Terminal outcome of a simulated trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Profitable exit: target reached or trailing stop locked in profit.
    TpHit,
    /// Losing stop exit.
    SlHit,
    /// Horizon exhausted without touching a level. Marked at the last close.
    TimedOut,
}

impl Outcome {
    /// True for outcomes that count toward win rate.
    pub fn is_resolved(self) -> bool {
        !matches!(self, Outcome::TimedOut)
    }
}

/// Mechanism that closed the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitKind {
    TakeProfit,
    InitialStop,
    TrailingStop,
    Horizon,
}

/// A detected signal together with its simulated resolution.
///
/// Stored records are never mutated. Re-scoring under other weights works on
/// a derived table built from `flags` and `trend_multiplier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSignal {
    pub symbol: String,
    pub direction: Direction,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// Confidence under the weights the backtest ran with.
    pub confidence: f64,
    pub flags: ConfluenceFlags,
    /// Higher-timeframe multiplier applied to the weight sum.
    pub trend_multiplier: f64,
    pub outcome: Outcome,
    pub exit_kind: ExitKind,
    pub exit_price: f64,
    pub pnl_percent: f64,
    pub atr: f64,
}

impl HistoricalSignal {
    pub fn is_win(&self) -> bool {
        self.outcome == Outcome::TpHit
    }

    /// Reward/risk distance ratio of the levels at entry.
    pub fn reward_risk(&self) -> f64 {
        let risk = (self.entry - self.stop_loss).abs();
        if risk <= 0.0 {
            return 0.0;
        }
        (self.take_profit - self.entry).abs() / risk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_sign_and_opposite() {
        assert_eq!(Direction::Buy.sign(), 1.0);
        assert_eq!(Direction::Sell.sign(), -1.0);
        assert_eq!(Direction::Buy.opposite(), Direction::Sell);
    }

    #[test]
    fn outcome_wire_names() {
        assert_eq!(serde_json::to_string(&Outcome::TpHit).unwrap(), "\"TP_HIT\"");
        assert_eq!(serde_json::to_string(&Outcome::TimedOut).unwrap(), "\"TIMED_OUT\"");
        assert_eq!(serde_json::to_string(&Direction::Sell).unwrap(), "\"SELL\"");
    }

    #[test]
    fn timed_out_is_unresolved() {
        assert!(Outcome::TpHit.is_resolved());
        assert!(Outcome::SlHit.is_resolved());
        assert!(!Outcome::TimedOut.is_resolved());
    }
}
