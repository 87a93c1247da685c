//! TradeRecord — a completed round trip, immutable once built.

use super::position::PositionSide;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    TakeProfit,
    IndicatorExit,
    MaxHold,
    /// Forced close on the final bar (only when `close_at_end` is enabled).
    EndOfData,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::IndicatorExit => "indicator_exit",
            ExitReason::MaxHold => "max_hold",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete round-trip trade: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: PositionSide,

    // ── Entry ──
    pub entry_index: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    /// Position size at entry, fraction of capital.
    pub size: f64,

    /// Direction-aware log return of the round trip, unsized.
    pub realized_return: f64,

    pub duration_bars: usize,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.realized_return > 0.0
    }

    /// Realized return scaled by position size.
    pub fn sized_return(&self) -> f64 {
        self.realized_return * self.size
    }
}

/// Direction-aware log return between two prices.
pub fn round_trip_return(side: PositionSide, entry_price: f64, exit_price: f64) -> f64 {
    if entry_price <= 0.0 || exit_price <= 0.0 {
        return 0.0;
    }
    side.sign() * (exit_price / entry_price).ln()
}
