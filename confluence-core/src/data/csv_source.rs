//! CSV candle source: one `<SYMBOL>.csv` per symbol in a directory.
//!
//! Header: `timestamp,open,high,low,close,volume`, timestamps in RFC 3339.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use super::provider::{CandleSource, DataError};
use crate::domain::Candle;

pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Read every row of a candle CSV file.
    pub fn read_file(path: &Path) -> Result<Vec<Candle>, DataError> {
        let mut reader = csv::Reader::from_path(path)?;
        reader
            .deserialize::<Candle>()
            .map(|row| row.map_err(DataError::from))
            .collect()
    }

    /// Write candles with the header this source reads.
    pub fn write_file(path: &Path, candles: &[Candle]) -> Result<(), DataError> {
        let mut writer = csv::Writer::from_path(path)?;
        for candle in candles {
            writer.serialize(candle)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl CandleSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_chunk(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let mut candles = Self::read_file(&path)?;
        candles.retain(|c| c.timestamp >= start && c.timestamp < end);
        Ok(candles)
    }
}
