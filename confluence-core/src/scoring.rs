//! Confidence scoring and the re-scoring table.

use crate::domain::{ConfluenceFlags, Direction, Flag, HistoricalSignal, Outcome, WeightVector};

/// Signals below this confidence are discarded.
pub const CONFIDENCE_THRESHOLD: f64 = 65.0;

/// `multiplier * sum(weight for each set flag)`, summed in [`Flag::ALL`] order.
pub fn confidence(flags: &ConfluenceFlags, weights: &WeightVector, multiplier: f64) -> f64 {
    let sum: f64 = Flag::ALL
        .iter()
        .filter(|&&f| flags.get(f))
        .map(|&f| weights.get(f))
        .sum();
    multiplier * sum
}

pub fn passes_threshold(confidence: f64, threshold: f64) -> bool {
    confidence >= threshold
}

/// One stored signal reduced to what re-scoring needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringRow {
    pub flags: ConfluenceFlags,
    pub trend_multiplier: f64,
    pub direction: Direction,
    pub outcome: Outcome,
    pub pnl_percent: f64,
}

/// Re-scoring cache built once from a signal list.
///
/// The stored signals are left untouched; the optimizer evaluates thousands of
/// weight vectors against this table instead.
#[derive(Debug, Clone, Default)]
pub struct ScoringTable {
    rows: Vec<ScoringRow>,
}

impl ScoringTable {
    pub fn from_signals(signals: &[HistoricalSignal]) -> Self {
        Self {
            rows: signals
                .iter()
                .map(|s| ScoringRow {
                    flags: s.flags,
                    trend_multiplier: s.trend_multiplier,
                    direction: s.direction,
                    outcome: s.outcome,
                    pnl_percent: s.pnl_percent,
                })
                .collect(),
        }
    }

    pub fn rows(&self) -> &[ScoringRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Confidence of each row under `weights`, in row order.
    pub fn confidences<'a>(&'a self, weights: &'a WeightVector) -> impl Iterator<Item = f64> + 'a {
        self.rows
            .iter()
            .map(move |r| confidence(&r.flags, weights, r.trend_multiplier))
    }

    /// Rows whose confidence under `weights` reaches `threshold`.
    pub fn qualifying<'a>(
        &'a self,
        weights: &'a WeightVector,
        threshold: f64,
    ) -> impl Iterator<Item = &'a ScoringRow> + 'a {
        self.rows
            .iter()
            .filter(move |r| passes_threshold(confidence(&r.flags, weights, r.trend_multiplier), threshold))
    }
}
