//! Backtest runner — wires together configuration, engine, fingerprint and
//! metrics for one run.

use pathlab_core::domain::{BarFeed, TradeRecord};
use pathlab_core::engine::{BarDecision, Engine, EngineError, PnlSeries};
use pathlab_core::fingerprint::RunFingerprint;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span};

use crate::config::BacktestConfig;
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("failed to fingerprint configuration: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub name: String,
    pub fingerprint: RunFingerprint,
    pub config: BacktestConfig,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    pub decisions: Vec<BarDecision>,
    pub pnl: PnlSeries,
    /// Entries blocked by the circuit breaker.
    pub suppressed_entries: usize,
    /// Entries blocked by the daily entry cap.
    pub capped_entries: usize,
    /// A position was still open after the last bar.
    pub open_at_end: bool,
}

impl BacktestResult {
    pub fn run_id(&self) -> &str {
        &self.fingerprint.run_id
    }
}

/// Run a single backtest over a pre-loaded feed. No I/O.
pub fn run_backtest(config: &BacktestConfig, feed: &BarFeed) -> Result<BacktestResult, RunError> {
    let fingerprint = RunFingerprint::new(&config.engine, feed)?;
    let span = info_span!("backtest", run_name = %config.name, run_id = %fingerprint.run_id);
    let _guard = span.enter();

    let engine = Engine::new(config.engine.clone()).map_err(EngineError::from)?;
    let scan = engine.run(feed)?;
    let metrics = PerformanceMetrics::compute(&scan, config.report.bars_per_year);

    info!(
        trades = metrics.total_trades,
        net_return = metrics.net_return,
        sharpe = metrics.sharpe,
        max_drawdown = metrics.max_drawdown,
        "backtest complete"
    );

    Ok(BacktestResult {
        name: config.name.clone(),
        fingerprint,
        config: config.clone(),
        metrics,
        open_at_end: !scan.final_state.is_flat(),
        suppressed_entries: scan.suppressed_entries,
        capped_entries: scan.capped_entries,
        trades: scan.ledger.into_trades(),
        decisions: scan.decisions,
        pnl: scan.pnl,
    })
}
