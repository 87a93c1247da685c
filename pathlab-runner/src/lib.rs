//! PathLab Runner — backtest orchestration on top of `pathlab-core`.
//!
//! This crate provides:
//! - TOML configuration (`[engine]` + `[report]`)
//! - Single-backtest runner with fingerprinting and metrics
//! - Parallel parameter sweeps
//! - JSON/CSV artifact export

pub mod config;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigFileError, ReportConfig};
pub use export::{export_json, export_series_csv, export_trades_csv, save_artifacts, ExportError};
pub use metrics::PerformanceMetrics;
pub use runner::{run_backtest, BacktestResult, RunError};
pub use sweep::{GridPoint, ParamGrid, ParamSweep, SweepEntry, SweepResults};
