//! Ratchet for the trailing stop.
//!
//! A stop may tighten, never loosen:
//! - Buy: the stop can only rise
//! - Sell: the stop can only fall

use crate::domain::Direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratchet {
    direction: Direction,
    level: f64,
}

impl Ratchet {
    pub fn new(direction: Direction, initial_level: f64) -> Self {
        Self {
            direction,
            level: initial_level,
        }
    }

    /// Apply a proposed level; returns the ratcheted level.
    pub fn apply(&mut self, proposed: f64) -> f64 {
        self.level = match self.direction {
            Direction::Buy => self.level.max(proposed),
            Direction::Sell => self.level.min(proposed),
        };
        self.level
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_tightening_allowed() {
        let mut r = Ratchet::new(Direction::Buy, 95.0);
        assert_eq!(r.apply(100.0), 100.0);
    }

    #[test]
    fn buy_loosening_blocked() {
        let mut r = Ratchet::new(Direction::Buy, 100.0);
        assert_eq!(r.apply(90.0), 100.0);
        assert_eq!(r.level(), 100.0);
    }

    #[test]
    fn sell_tightening_allowed() {
        let mut r = Ratchet::new(Direction::Sell, 105.0);
        assert_eq!(r.apply(100.0), 100.0);
    }

    #[test]
    fn sell_loosening_blocked() {
        let mut r = Ratchet::new(Direction::Sell, 100.0);
        assert_eq!(r.apply(110.0), 100.0);
    }

    #[test]
    fn sequence_is_monotone() {
        let mut r = Ratchet::new(Direction::Buy, 90.0);
        let levels: Vec<f64> = [92.0, 91.0, 95.0, 93.0, 96.0]
            .iter()
            .map(|&p| r.apply(p))
            .collect();
        assert_eq!(levels, vec![92.0, 92.0, 95.0, 95.0, 96.0]);
    }
}
