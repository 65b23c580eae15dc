//! Candle source trait and structured error types.
//!
//! The `CandleSource` trait abstracts over data sources (OANDA, CSV files,
//! synthetic series) so the pipeline can swap implementations and mock for tests.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::Candle;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication rejected: {0}")]
    AuthenticationRejected(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Errors that make every further request for the symbol pointless.
    pub fn is_fatal_for_symbol(&self) -> bool {
        matches!(
            self,
            DataError::MissingCredentials(_)
                | DataError::AuthenticationRejected(_)
                | DataError::SymbolNotFound { .. }
        )
    }
}

/// Trait for candle sources.
///
/// A source returns complete candles with `start <= timestamp < end`, in any
/// order. Chunking, deduplication and sorting happen in
/// [`fetch_candles`](super::fetch_candles).
pub trait CandleSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch one chunk of candles.
    fn fetch_chunk(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError>;
}
