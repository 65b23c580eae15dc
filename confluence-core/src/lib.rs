//! Confluence Core: candles, indicators, confluence detection, confidence
//! scoring, outcome simulation and the per-symbol backtest.
//!
//! This crate holds the pure signal engine:
//! - Domain types (candles, flags, weights, historical signals)
//! - Indicator series and per-index snapshots
//! - Signal detector with higher-timeframe bias
//! - Confidence scorer and the re-scoring table
//! - Outcome simulator with a ratcheted trailing stop
//! - Candle sources (OANDA, CSV, synthetic) behind one trait

pub mod backtest;
pub mod data;
pub mod detector;
pub mod domain;
pub mod indicators;
pub mod rng;
pub mod scoring;
pub mod simulator;
