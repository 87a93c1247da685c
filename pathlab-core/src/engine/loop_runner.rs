//! Bar-by-bar scan — validates, folds the state machine over the feed, then
//! accounts PnL and extracts trades.
//!
//! Phases:
//! 1. Validate configuration and feed schema (no state touched yet)
//! 2. Sequential scan into a pre-sized decision buffer
//! 3. PnL accounting over the decision series
//! 4. Trade extraction

use serde::Serialize;

use super::accounting::{PnlAccountant, PnlSeries};
use super::config::{ConfigError, EngineConfig};
use super::state_machine::{BarContext, BarDecision, PositionStateMachine};
use super::trade_extraction::TradeLedger;
use crate::domain::{BarError, BarFeed, PositionState};
use crate::schema::validate_feed;

/// Failures that stop a scan before its first bar.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("bar feed is missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("invalid bar feed: {0}")]
    Feed(#[from] BarError),
}

/// Everything one scan produces.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub decisions: Vec<BarDecision>,
    pub pnl: PnlSeries,
    pub ledger: TradeLedger,
    /// Position state after the last bar (may still be open).
    pub final_state: PositionState,
    pub suppressed_entries: usize,
    /// Entries blocked by the daily entry cap.
    pub capped_entries: usize,
}

/// A validated, immutable engine. Share it across threads freely; each
/// [`Engine::run`] owns its own state.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scan the full feed.
    pub fn run(&self, feed: &BarFeed) -> Result<ScanResult, EngineError> {
        let schema = validate_feed(feed, &self.config);
        if !schema.is_valid {
            tracing::warn!(missing = ?schema.missing, "bar feed is missing required fields");
            return Err(EngineError::MissingFields {
                fields: schema.missing,
            });
        }

        let mut machine = PositionStateMachine::new(&self.config)?;
        let bars = feed.bars();
        let mut decisions = Vec::with_capacity(bars.len());

        for (index, bar) in bars.iter().enumerate() {
            decisions.push(machine.step(BarContext {
                index,
                bar,
                prev: index.checked_sub(1).and_then(|p| bars.get(p)),
                is_last: index + 1 == bars.len(),
            }));
        }

        let pnl = PnlAccountant::new(self.config.cost_rate, self.config.pnl_timing)
            .account(&decisions, bars);
        let ledger = TradeLedger::from_decisions(&decisions);
        let suppressed_entries = decisions.iter().filter(|d| d.entry_suppressed).count();
        let capped_entries = decisions.iter().filter(|d| d.entry_capped).count();

        tracing::info!(
            bars = bars.len(),
            trades = ledger.len(),
            suppressed_entries,
            capped_entries,
            net_return = pnl.total_net,
            max_drawdown = pnl.max_drawdown,
            "scan complete"
        );

        Ok(ScanResult {
            decisions,
            pnl,
            ledger,
            final_state: machine.state().clone(),
            suppressed_entries,
            capped_entries,
        })
    }
}

/// Validate `config` and scan `feed` in one call.
pub fn run_scan(feed: &BarFeed, config: &EngineConfig) -> Result<ScanResult, EngineError> {
    Engine::new(config.clone())?.run(feed)
}
