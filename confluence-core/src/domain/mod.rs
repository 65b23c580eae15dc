//! Domain types for the confluence engine.

pub mod candle;
pub mod flags;
pub mod session;
pub mod signal;
pub mod weights;

pub use candle::{normalize_series, Candle};
pub use flags::{ConfluenceFlags, Flag, FLAG_COUNT};
pub use signal::{Direction, ExitKind, HistoricalSignal, Outcome};
pub use weights::{BoxConstraints, WeightVector};
