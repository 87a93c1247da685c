//! Strategy components that are pure functions of market data.
//!
//! - [`signal`] — threshold signal evaluator and trading mode
//! - [`filter`] — tagged entry filters combined with logical AND

pub mod filter;
pub mod signal;

pub use filter::{EntryFilter, FilterContext};
pub use signal::{Signal, SignalDirection, SignalEvaluator, TradingMode};
