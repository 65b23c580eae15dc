//! Performance score of a weight vector against a fixed signal set.

use serde::{Deserialize, Serialize};

use confluence_core::domain::{HistoricalSignal, Outcome, WeightVector};
use confluence_core::scoring::{ScoringTable, CONFIDENCE_THRESHOLD};

use crate::metrics::sharpe_like;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub threshold: f64,
    /// Fewer qualifying signals than this scores 0.
    pub min_qualifying: usize,
    /// Fewer returns than this gives a Sharpe term of 0.
    pub min_sharpe_returns: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            threshold: CONFIDENCE_THRESHOLD,
            min_qualifying: 10,
            min_sharpe_returns: 5,
        }
    }
}

/// Re-scoring table plus score settings; the optimizer's objective.
///
/// Timed-out signals are dropped when the table is built. They carry no
/// TP/SL outcome to learn from.
#[derive(Debug, Clone)]
pub struct PerformanceScorer {
    table: ScoringTable,
    config: ScoreConfig,
}

impl PerformanceScorer {
    pub fn new(signals: &[HistoricalSignal], config: ScoreConfig) -> Self {
        let resolved: Vec<HistoricalSignal> = signals
            .iter()
            .filter(|s| s.outcome.is_resolved())
            .cloned()
            .collect();
        Self {
            table: ScoringTable::from_signals(&resolved),
            config,
        }
    }

    pub fn resolved_count(&self) -> usize {
        self.table.len()
    }

    /// `win_rate × (1 + max(0, sharpe))` over the signals that qualify under `weights`.
    pub fn score(&self, weights: &WeightVector) -> f64 {
        let mut wins = 0usize;
        let mut returns = Vec::new();
        for row in self.table.qualifying(weights, self.config.threshold) {
            if row.outcome == Outcome::TpHit {
                wins += 1;
            }
            returns.push(row.pnl_percent);
        }

        if returns.len() < self.config.min_qualifying {
            return 0.0;
        }

        let win_rate = wins as f64 / returns.len() as f64;
        let sharpe = sharpe_like(&returns, self.config.min_sharpe_returns);
        win_rate * (1.0 + sharpe.max(0.0))
    }
}

/// One-shot score of `signals` under `weights`.
pub fn performance_score(signals: &[HistoricalSignal], weights: &WeightVector, config: &ScoreConfig) -> f64 {
    PerformanceScorer::new(signals, *config).score(weights)
}
