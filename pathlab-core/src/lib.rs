//! PathLab Core — the path-dependent position and risk engine.
//!
//! This crate turns a bar feed with precomputed indicators into a realized
//! position series:
//! - Domain types (bars, position state, trades, hash IDs)
//! - Signal evaluation with tagged entry filters
//! - Risk control: stops, ratcheting trailing stop, sizing, circuit breaker
//! - The per-bar position state machine, with no look-ahead
//! - PnL accounting and trade extraction
//!
//! Indicator math is upstream: the feed arrives fully populated.

pub mod components;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod risk;
pub mod schema;

pub use engine::{run_scan, Engine, EngineConfig, EngineError, ScanResult};
