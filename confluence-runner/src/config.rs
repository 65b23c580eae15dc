//! Serializable job configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use confluence_core::backtest::BacktestConfig;
use confluence_core::data::DEFAULT_CHUNK_DAYS;
use confluence_core::domain::BoxConstraints;

use crate::optimizer::OptimizerConfig;
use crate::score::ScoreConfig;
use crate::walk_forward::WalkForwardConfig;

/// Content hash identifying a training run.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid job TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid job: {0}")]
    Invalid(String),
}

/// Everything needed to reproduce a training job, apart from the reference time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub symbols: Vec<String>,
    /// Key the learned weights are stored under, next to the symbol.
    pub context_key: String,
    /// Candle granularity requested from the source.
    pub granularity: String,
    pub chunk_days: i64,
    /// Run symbols on the rayon pool.
    pub parallel: bool,
    pub walk_forward: WalkForwardConfig,
    pub backtest: BacktestConfig,
    pub optimizer: OptimizerConfig,
    pub score: ScoreConfig,
    pub constraints: BoxConstraints,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            symbols: ["EURUSD", "USDCAD", "USDJPY", "XAUUSD"]
                .into_iter()
                .map(String::from)
                .collect(),
            context_key: "default".into(),
            granularity: "H1".into(),
            chunk_days: DEFAULT_CHUNK_DAYS,
            parallel: false,
            walk_forward: WalkForwardConfig::default(),
            backtest: BacktestConfig::default(),
            optimizer: OptimizerConfig::default(),
            score: ScoreConfig::default(),
            constraints: BoxConstraints::default(),
        }
    }
}

impl JobConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reject job input that cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.symbols.is_empty() {
            return invalid("symbol list is empty");
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            return invalid("blank symbol");
        }
        let lr = self.optimizer.learning_rate;
        if lr <= 0.0 || !lr.is_finite() {
            return invalid("learning rate must be positive");
        }
        if self.optimizer.iterations == 0 {
            return invalid("iteration budget must be positive");
        }
        if self.optimizer.epsilon <= 0.0 || self.optimizer.epsilon.is_nan() {
            return invalid("finite-difference epsilon must be positive");
        }
        let wf = &self.walk_forward;
        if wf.training_months == 0 || wf.test_months == 0 {
            return invalid("walk-forward windows must be at least one month");
        }
        if wf.total_months < wf.training_months + wf.test_months {
            return invalid("total months must cover one training and one test window");
        }
        if self.chunk_days <= 0 {
            return invalid("chunk size must be positive");
        }
        if self.backtest.stride == 0 {
            return invalid("backtest stride must be positive");
        }
        let ind = &self.backtest.indicators;
        let periods = [
            ("ma_fast", ind.ma_fast),
            ("ma_slow", ind.ma_slow),
            ("bb_period", ind.bb_period),
            ("atr_period", ind.atr_period),
            ("volume_period", ind.volume_period),
            ("momentum_period", ind.momentum_period),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, period)| *period == 0) {
            return Err(ConfigError::Invalid(format!("indicator period {name} must be positive")));
        }
        let sim = &self.backtest.simulator;
        if sim.horizon == 0 {
            return invalid("simulator horizon must be positive");
        }
        if sim.levels.sl_atr <= 0.0 || sim.levels.tp_atr <= 0.0 {
            return invalid("ATR multipliers must be positive");
        }
        Ok(())
    }

    /// BLAKE3 of the serialized config plus the reference time.
    pub fn run_id(&self, reference_now: DateTime<Utc>) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        let mut hasher = blake3::Hasher::new();
        hasher.update(json.as_bytes());
        hasher.update(reference_now.to_rfc3339().as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}
