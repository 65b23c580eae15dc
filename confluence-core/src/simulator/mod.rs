//! Outcome simulator: walks the candle path after entry and resolves the trade.
//!
//! Per bar, in order:
//! 1. the stop (initial or trailing) is checked against the adverse extreme,
//! 2. the target is checked against the favorable extreme,
//! 3. peak favorable excursion is updated and, once it reaches the activation
//!    fraction of the target distance, the trailing stop is proposed at
//!    `entry ± lock × peak` and ratcheted.
//!
//! Checking the stop first means a bar that spans both levels resolves as a
//! stop exit.

pub mod levels;
pub mod ratchet;

pub use levels::{LevelConfig, Levels};
pub use ratchet::Ratchet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Candle, Direction, ExitKind, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub levels: LevelConfig,
    /// Max bars walked after entry.
    pub horizon: usize,
    /// Fraction of the target distance the peak excursion must reach to arm the trail.
    pub trail_activation: f64,
    /// Fraction of the peak excursion the trailing stop locks in.
    pub trail_lock: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            levels: LevelConfig::default(),
            horizon: 50,
            trail_activation: 0.5,
            trail_lock: 0.5,
        }
    }
}

/// Resolved trade.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTrade {
    pub direction: Direction,
    pub entry: f64,
    pub levels: Levels,
    pub outcome: Outcome,
    pub exit_kind: ExitKind,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub pnl_percent: f64,
    pub bars_held: usize,
    /// Stop level in force at the start of each walked bar.
    pub stop_path: Vec<f64>,
    pub trail_activated: bool,
}

pub fn pnl_percent(direction: Direction, entry: f64, exit: f64) -> f64 {
    direction.sign() * (exit - entry) / entry * 100.0
}

/// Simulate a trade entered at `entry` on a candle at UTC `hour`, over `path`
/// (the candles after entry).
///
/// `None` when ATR or entry is unusable or the path is empty.
pub fn simulate(
    direction: Direction,
    entry: f64,
    atr: f64,
    hour: u32,
    path: &[Candle],
    config: &SimulatorConfig,
) -> Option<SimulatedTrade> {
    let levels = Levels::compute(direction, entry, atr, hour, &config.levels)?;
    let path = &path[..path.len().min(config.horizon)];
    let last = path.last()?;

    let sign = direction.sign();
    let mut stop = Ratchet::new(direction, levels.stop_loss);
    let mut trail_activated = false;
    let mut peak = 0.0_f64;
    let mut stop_path = Vec::with_capacity(path.len());

    for (i, bar) in path.iter().enumerate() {
        let level = stop.level();
        stop_path.push(level);

        let (adverse, favorable) = match direction {
            Direction::Buy => (bar.low, bar.high),
            Direction::Sell => (bar.high, bar.low),
        };

        if (adverse - level) * sign <= 0.0 {
            let exit_kind = if trail_activated {
                ExitKind::TrailingStop
            } else {
                ExitKind::InitialStop
            };
            return Some(resolve(
                direction, entry, levels, exit_kind, level, bar, i + 1, stop_path, trail_activated,
            ));
        }

        if (favorable - levels.take_profit) * sign >= 0.0 {
            return Some(resolve(
                direction,
                entry,
                levels,
                ExitKind::TakeProfit,
                levels.take_profit,
                bar,
                i + 1,
                stop_path,
                trail_activated,
            ));
        }

        peak = peak.max((favorable - entry) * sign);
        if peak >= config.trail_activation * levels.tp_distance {
            trail_activated = true;
            stop.apply(entry + sign * config.trail_lock * peak);
        }
    }

    Some(resolve(
        direction,
        entry,
        levels,
        ExitKind::Horizon,
        last.close,
        last,
        path.len(),
        stop_path,
        trail_activated,
    ))
}

#[allow(clippy::too_many_arguments)]
fn resolve(
    direction: Direction,
    entry: f64,
    levels: Levels,
    exit_kind: ExitKind,
    exit_price: f64,
    bar: &Candle,
    bars_held: usize,
    stop_path: Vec<f64>,
    trail_activated: bool,
) -> SimulatedTrade {
    let pnl = pnl_percent(direction, entry, exit_price);
    let outcome = match exit_kind {
        ExitKind::TakeProfit => Outcome::TpHit,
        ExitKind::InitialStop => Outcome::SlHit,
        ExitKind::TrailingStop if pnl > 0.0 => Outcome::TpHit,
        ExitKind::TrailingStop => Outcome::SlHit,
        ExitKind::Horizon => Outcome::TimedOut,
    };
    SimulatedTrade {
        direction,
        entry,
        levels,
        outcome,
        exit_kind,
        exit_price,
        exit_time: bar.timestamp,
        pnl_percent: pnl,
        bars_held,
        stop_path,
        trail_activated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // Entry 100, ATR 1.2 at 09:00 → SL 98.2, TP 103.6, tp distance 3.6.
    const ENTRY: f64 = 100.0;
    const ATR: f64 = 1.2;
    const HOUR: u32 = 9;

    fn bar(i: i64, low: f64, high: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap() + chrono::Duration::hours(i),
            open: close.clamp(low, high),
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn run(direction: Direction, path: &[Candle]) -> SimulatedTrade {
        simulate(direction, ENTRY, ATR, HOUR, path, &SimulatorConfig::default()).unwrap()
    }

    #[test]
    fn take_profit_hit() {
        let path = [bar(0, 99.5, 101.0, 100.5), bar(1, 100.4, 104.0, 103.8)];
        let t = run(Direction::Buy, &path);
        assert_eq!(t.outcome, Outcome::TpHit);
        assert_eq!(t.exit_kind, ExitKind::TakeProfit);
        assert!((t.pnl_percent - 3.6).abs() < 1e-9);
        assert_eq!(t.bars_held, 2);
    }

    #[test]
    fn initial_stop_hit() {
        let path = [bar(0, 99.0, 100.5, 99.5), bar(1, 98.0, 99.6, 98.1)];
        let t = run(Direction::Buy, &path);
        assert_eq!(t.outcome, Outcome::SlHit);
        assert_eq!(t.exit_kind, ExitKind::InitialStop);
        assert!(t.pnl_percent < 0.0);
    }

    #[test]
    fn stop_checked_before_target_on_same_bar() {
        let path = [bar(0, 98.0, 104.0, 101.0)];
        let t = run(Direction::Buy, &path);
        assert_eq!(t.exit_kind, ExitKind::InitialStop);
        assert_eq!(t.outcome, Outcome::SlHit);
    }

    #[test]
    fn trailing_stop_locks_profit() {
        // peak excursion 2.0 ≥ 1.8 arms the trail at 101.0
        let path = [
            bar(0, 99.8, 102.0, 101.8),
            bar(1, 101.5, 101.9, 101.6),
            bar(2, 100.8, 101.4, 100.9),
        ];
        let t = run(Direction::Buy, &path);
        assert!(t.trail_activated);
        assert_eq!(t.exit_kind, ExitKind::TrailingStop);
        assert_eq!(t.outcome, Outcome::TpHit);
        assert!((t.exit_price - 101.0).abs() < 1e-9);
        assert!(t.pnl_percent > 0.0);
    }

    #[test]
    fn sell_trailing_stop_mirrors() {
        let path = [
            bar(0, 98.0, 100.2, 98.2),
            bar(1, 98.1, 98.5, 98.4),
            bar(2, 98.6, 99.2, 99.1),
        ];
        let t = run(Direction::Sell, &path);
        assert_eq!(t.exit_kind, ExitKind::TrailingStop);
        assert!((t.exit_price - 99.0).abs() < 1e-9);
        assert_eq!(t.outcome, Outcome::TpHit);
    }

    #[test]
    fn horizon_exhaustion_is_timed_out() {
        let path: Vec<Candle> = (0..60).map(|i| bar(i, 99.6, 100.4, 100.1)).collect();
        let t = run(Direction::Buy, &path);
        assert_eq!(t.outcome, Outcome::TimedOut);
        assert_eq!(t.exit_kind, ExitKind::Horizon);
        assert_eq!(t.bars_held, 50);
        assert_eq!(t.exit_price, 100.1);
        assert!((t.pnl_percent - 0.1).abs() < 1e-9);
    }

    #[test]
    fn empty_path_yields_none() {
        assert!(simulate(Direction::Buy, ENTRY, ATR, HOUR, &[], &SimulatorConfig::default()).is_none());
    }

    #[test]
    fn stop_path_never_loosens() {
        let path = [
            bar(0, 99.9, 102.0, 101.9),
            bar(1, 101.2, 103.0, 102.9),
            bar(2, 102.0, 102.5, 102.1),
            bar(3, 101.6, 102.2, 101.7),
        ];
        let t = run(Direction::Buy, &path);
        assert!(t.stop_path.windows(2).all(|w| w[1] >= w[0]));
    }
}
