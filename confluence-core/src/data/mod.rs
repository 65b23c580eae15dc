//! Candle sources and the chunked fetch used by the pipeline.

pub mod chunked;
pub mod csv_source;
pub mod oanda;
pub mod provider;
pub mod synthetic;

pub use chunked::{fetch_candles, DEFAULT_CHUNK_DAYS};
pub use csv_source::CsvSource;
pub use oanda::OandaSource;
pub use provider::{CandleSource, DataError};
pub use synthetic::{SyntheticConfig, SyntheticSource};
