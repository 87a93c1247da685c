//! Backtesting engine — configuration, the position state machine and the
//! post-scan accounting passes.
//!
//! One scan is sequential and single-threaded:
//!
//! 1. [`PositionStateMachine::step`] once per bar, writing a [`BarDecision`]
//! 2. [`PnlAccountant`] folds decisions over log-returns
//! 3. [`TradeLedger`] pairs entries with exits

pub mod accounting;
pub mod config;
pub mod loop_runner;
pub mod state_machine;
pub mod trade_extraction;

pub use accounting::{bar_cost, bar_net_return, PnlAccountant, PnlRow, PnlSeries, PnlTiming};
pub use config::{ConfigError, EngineConfig, ExitRule};
pub use loop_runner::{run_scan, Engine, EngineError, ScanResult};
pub use state_machine::{BarContext, BarDecision, PositionStateMachine};
pub use trade_extraction::TradeLedger;
