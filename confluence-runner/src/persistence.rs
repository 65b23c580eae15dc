//! Persistence gateway: learned weights per (symbol, context) and an
//! append-only training-run log.
//!
//! `FileGateway` keeps weights in one pretty JSON map and the log as JSONL,
//! one run summary per line. `MemoryGateway` holds both in memory for dry
//! runs and tests.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use confluence_core::domain::WeightVector;

use crate::walk_forward::SymbolStatus;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("gateway lock poisoned")]
    Poisoned,
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PersistError + '_ {
    move |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ─── Records ─────────────────────────────────────────────────────────

/// Metrics stored alongside a weight vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightMetrics {
    pub run_id: String,
    pub periods_completed: usize,
    pub optimized_periods: usize,
    /// Label of the last completed training period.
    pub last_period: Option<String>,
    pub last_score: Option<f64>,
    /// Test-window win rate under these weights, once tested.
    pub test_win_rate: Option<f64>,
    pub test_pnl: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub symbol: String,
    pub context_key: String,
    pub weights: WeightVector,
    pub metrics: WeightMetrics,
}

/// Per-symbol line of a training-run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub status: SymbolStatus,
    pub optimized_periods: usize,
    pub win_rate_lift: Option<f64>,
    pub pnl_lift_percent: Option<f64>,
}

/// One entry of the training log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRunSummary {
    pub run_id: String,
    pub reference_now: DateTime<Utc>,
    pub context_key: String,
    pub status: SymbolStatus,
    pub duration_ms: u64,
    pub symbols: Vec<SymbolSummary>,
}

pub fn record_key(symbol: &str, context_key: &str) -> String {
    format!("{symbol}::{context_key}")
}

// ─── Gateway ─────────────────────────────────────────────────────────

pub trait PersistenceGateway: Send + Sync {
    /// Insert or replace the weights stored for `(symbol, context_key)`.
    fn upsert_weights(
        &self,
        symbol: &str,
        context_key: &str,
        weights: &WeightVector,
        metrics: &WeightMetrics,
    ) -> Result<(), PersistError>;

    fn append_training_log(&self, summary: &TrainingRunSummary) -> Result<(), PersistError>;
}

/// Gateway backed by two files in one directory.
pub struct FileGateway {
    dir: PathBuf,
    // serializes the read-modify-write of the weights map
    lock: Mutex<()>,
}

impl FileGateway {
    pub const WEIGHTS_FILE: &'static str = "weights.json";
    pub const LOG_FILE: &'static str = "training_log.jsonl";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(Self::WEIGHTS_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(Self::LOG_FILE)
    }

    /// All stored weight records keyed `symbol::context`. Missing file is empty.
    pub fn load_weights(&self) -> Result<BTreeMap<String, WeightRecord>, PersistError> {
        let path = self.weights_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path).map_err(io_err(&path))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn get(&self, symbol: &str, context_key: &str) -> Result<Option<WeightRecord>, PersistError> {
        Ok(self.load_weights()?.remove(&record_key(symbol, context_key)))
    }

    /// Read the training log, skipping malformed lines.
    pub fn read_log(&self) -> Result<Vec<TrainingRunSummary>, PersistError> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path).map_err(io_err(&path))?;
        let mut entries = Vec::new();
        for line in io::BufReader::new(file).lines() {
            let line = line.map_err(io_err(&path))?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str::<TrainingRunSummary>(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn ensure_dir(&self) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))
    }
}

impl PersistenceGateway for FileGateway {
    fn upsert_weights(
        &self,
        symbol: &str,
        context_key: &str,
        weights: &WeightVector,
        metrics: &WeightMetrics,
    ) -> Result<(), PersistError> {
        let _guard = self.lock.lock().map_err(|_| PersistError::Poisoned)?;
        self.ensure_dir()?;

        let mut records = self.load_weights()?;
        records.insert(
            record_key(symbol, context_key),
            WeightRecord {
                symbol: symbol.to_string(),
                context_key: context_key.to_string(),
                weights: *weights,
                metrics: metrics.clone(),
            },
        );

        let json = serde_json::to_string_pretty(&records)?;
        let path = self.weights_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_err(&path))
    }

    fn append_training_log(&self, summary: &TrainingRunSummary) -> Result<(), PersistError> {
        let json = serde_json::to_string(summary)?;
        let _guard = self.lock.lock().map_err(|_| PersistError::Poisoned)?;
        self.ensure_dir()?;

        let path = self.log_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err(&path))?;
        writeln!(file, "{json}").map_err(io_err(&path))?;
        file.flush().map_err(io_err(&path))
    }
}

/// In-memory gateway.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    weights: Mutex<BTreeMap<String, WeightRecord>>,
    log: Mutex<Vec<TrainingRunSummary>>,
    upserts: Mutex<usize>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str, context_key: &str) -> Option<WeightRecord> {
        self.weights
            .lock()
            .ok()
            .and_then(|w| w.get(&record_key(symbol, context_key)).cloned())
    }

    pub fn records(&self) -> Vec<WeightRecord> {
        self.weights
            .lock()
            .map(|w| w.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn log(&self) -> Vec<TrainingRunSummary> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Number of upsert calls, including overwrites.
    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().map(|n| *n).unwrap_or(0)
    }
}

impl PersistenceGateway for MemoryGateway {
    fn upsert_weights(
        &self,
        symbol: &str,
        context_key: &str,
        weights: &WeightVector,
        metrics: &WeightMetrics,
    ) -> Result<(), PersistError> {
        let mut map = self.weights.lock().map_err(|_| PersistError::Poisoned)?;
        map.insert(
            record_key(symbol, context_key),
            WeightRecord {
                symbol: symbol.to_string(),
                context_key: context_key.to_string(),
                weights: *weights,
                metrics: metrics.clone(),
            },
        );
        *self.upserts.lock().map_err(|_| PersistError::Poisoned)? += 1;
        Ok(())
    }

    fn append_training_log(&self, summary: &TrainingRunSummary) -> Result<(), PersistError> {
        self.log
            .lock()
            .map_err(|_| PersistError::Poisoned)?
            .push(summary.clone());
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
