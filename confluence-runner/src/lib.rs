//! Confluence Runner: performance scoring, weight optimization, walk-forward
//! evaluation and training-job orchestration.
//!
//! This crate builds on `confluence-core` to provide:
//! - Signal statistics and the performance score the optimizer maximizes
//! - Finite-difference gradient ascent over box-constrained weights
//! - Calendar-month walk-forward schedule and the period fold
//! - Persistence gateway for learned weights and the training log
//! - Per-symbol tuning of the stop/target ATR multipliers
//! - The training job tying a candle source to a gateway

pub mod atr_tuning;
pub mod config;
pub mod job;
pub mod metrics;
pub mod optimizer;
pub mod persistence;
pub mod schedule;
pub mod score;
pub mod walk_forward;

pub use atr_tuning::{tune_atr_multipliers, AtrTuning, AtrTuningConfig};
pub use config::{ConfigError, JobConfig, RunId};
pub use job::{aggregate_status, run_job, JobError, JobResult, SymbolResult};
pub use metrics::{
    optimal_threshold, threshold_sweep, SignalStats, ThresholdRow, MIN_SWEEP_SIGNALS, SWEEP_THRESHOLDS,
};
pub use optimizer::{gradient_ascent, OptimizationResult, OptimizerConfig, Optimum, WeightOptimizer};
pub use persistence::{
    FileGateway, MemoryGateway, PersistError, PersistenceGateway, TrainingRunSummary, WeightMetrics,
    WeightRecord,
};
pub use schedule::{build_schedule, CycleWindow, DateRange};
pub use score::{performance_score, PerformanceScorer, ScoreConfig};
pub use walk_forward::{
    fold_periods, symbol_status, FoldOutcome, PerformancePeriod, PeriodStatus, SymbolStatus,
    TestComparison, WalkForwardConfig,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<JobConfig>();
        assert_sync::<JobConfig>();
        assert_send::<WalkForwardConfig>();
        assert_sync::<WalkForwardConfig>();
        assert_send::<AtrTuningConfig>();
        assert_sync::<AtrTuningConfig>();
    }

    #[test]
    fn optimizer_is_send_sync() {
        assert_send::<WeightOptimizer>();
        assert_sync::<WeightOptimizer>();
        assert_send::<PerformanceScorer>();
        assert_sync::<PerformanceScorer>();
    }

    #[test]
    fn gateways_are_send_sync() {
        assert_send::<FileGateway>();
        assert_sync::<FileGateway>();
        assert_send::<MemoryGateway>();
        assert_sync::<MemoryGateway>();
    }

    #[test]
    fn results_are_send_sync() {
        assert_send::<JobResult>();
        assert_sync::<JobResult>();
        assert_send::<SignalStats>();
        assert_sync::<SignalStats>();
    }
}
