//! Trade extraction — rebuilds round-trip TradeRecords from the decision series.
//!
//! Post-processes decisions after the scan completes. Pure function:
//! decisions → trade records. The ledger holds no state of its own.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::state_machine::BarDecision;
use crate::domain::{round_trip_return, ExitReason, PositionSide, TradeRecord};

/// State for an open trade being tracked during extraction.
struct OpenTrade {
    side: PositionSide,
    entry_index: usize,
    entry_time: NaiveDateTime,
    entry_price: f64,
    size: f64,
}

/// Completed round trips in exit order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeLedger {
    trades: Vec<TradeRecord>,
}

impl TradeLedger {
    /// Walk the decisions: an entry opens a trade, an exit closes it.
    ///
    /// A decision carrying both opened and closed the same trade on that bar.
    /// A position still open after the last bar produces no record.
    pub fn from_decisions(decisions: &[BarDecision]) -> Self {
        let mut trades = Vec::new();
        let mut open: Option<OpenTrade> = None;

        for d in decisions {
            if let Some(entry_price) = d.entry_price {
                open = Some(OpenTrade {
                    side: d.entry_side.unwrap_or(d.side),
                    entry_index: d.index,
                    entry_time: d.timestamp,
                    entry_price,
                    size: d.entry_size.unwrap_or(d.size),
                });
            }
            if let (Some(reason), Some(exit_price)) = (d.exit_reason, d.exit_price) {
                if let Some(o) = open.take() {
                    trades.push(TradeRecord {
                        side: o.side,
                        entry_index: o.entry_index,
                        entry_time: o.entry_time,
                        entry_price: o.entry_price,
                        exit_index: d.index,
                        exit_time: d.timestamp,
                        exit_price,
                        exit_reason: reason,
                        size: o.size,
                        realized_return: round_trip_return(o.side, o.entry_price, exit_price),
                        duration_bars: d.index - o.entry_index,
                    });
                }
            }
        }

        Self { trades }
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn winners(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.iter().filter(|t| t.is_winner())
    }

    pub fn losers(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.iter().filter(|t| !t.is_winner())
    }

    pub fn exit_reason_counts(&self) -> BTreeMap<ExitReason, usize> {
        let mut counts = BTreeMap::new();
        for t in &self.trades {
            *counts.entry(t.exit_reason).or_insert(0) += 1;
        }
        counts
    }

    pub fn into_trades(self) -> Vec<TradeRecord> {
        self.trades
    }
}
