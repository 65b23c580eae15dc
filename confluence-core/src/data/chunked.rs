//! Chunked fetch with partial-history degradation.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::provider::CandleSource;
use crate::domain::{normalize_series, Candle};

/// Default request span.
pub const DEFAULT_CHUNK_DAYS: i64 = 30;

/// Fetch `[start, end)` in chunks of `chunk_days`.
///
/// Never fails. A fatal error (missing credentials, unknown symbol) yields an
/// empty series; any other chunk failure stops the series at the last
/// successful chunk. The result is sorted, deduplicated and sane.
pub fn fetch_candles(
    source: &dyn CandleSource,
    symbol: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    chunk_days: i64,
) -> Vec<Candle> {
    let step = Duration::days(chunk_days.max(1));
    let mut candles = Vec::new();
    let mut cursor = start;
    let mut chunks = 0usize;

    while cursor < end {
        let chunk_end = (cursor + step).min(end);
        match source.fetch_chunk(symbol, cursor, chunk_end) {
            Ok(chunk) => {
                chunks += 1;
                candles.extend(chunk);
            }
            Err(e) if e.is_fatal_for_symbol() => {
                warn!(source = source.name(), symbol, error = %e, "aborting fetch");
                return Vec::new();
            }
            Err(e) => {
                warn!(
                    source = source.name(),
                    symbol,
                    chunk_start = %cursor,
                    error = %e,
                    "chunk failed, keeping partial history"
                );
                break;
            }
        }
        cursor = chunk_end;
    }

    candles.retain(|c| c.timestamp >= start && c.timestamp < end);
    let candles = normalize_series(candles);
    debug!(source = source.name(), symbol, chunks, candles = candles.len(), "fetched");
    candles
}
