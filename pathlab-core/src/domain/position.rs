//! PositionState — the single mutable record carried through the scan.

use serde::{Deserialize, Serialize};

use crate::risk::RatchetState;

/// Which way the book is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

impl PositionSide {
    /// +1 long, -1 short, 0 flat.
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
            PositionSide::Flat => 0.0,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            PositionSide::Long => 1,
            PositionSide::Short => -1,
            PositionSide::Flat => 0,
        }
    }

    pub fn is_flat(self) -> bool {
        self == PositionSide::Flat
    }
}

/// Levels fixed at entry by the risk controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryPlan {
    pub side: PositionSide,
    pub entry_index: usize,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss_price: f64,
    pub trailing_stop_price: f64,
    pub take_profit_price: Option<f64>,
    /// Volatility multiplier frozen at entry, reused when resizing while held.
    pub volatility_multiplier: f64,
}

/// Per-run position state, owned exclusively by the state machine.
///
/// Invariant: `side == Flat` implies `size == 0` and only
/// `cooldown_remaining` carries meaning; otherwise `size > 0`.
#[derive(Debug, Clone, Serialize)]
pub struct PositionState {
    pub side: PositionSide,
    pub entry_index: usize,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss_price: f64,
    pub trailing_stop: RatchetState,
    pub take_profit_price: Option<f64>,
    pub cooldown_remaining: usize,
    pub highest_since_entry: f64,
    pub lowest_since_entry: f64,
    pub entry_volatility_multiplier: f64,
}

impl Default for PositionState {
    fn default() -> Self {
        Self::flat()
    }
}

impl PositionState {
    pub fn flat() -> Self {
        Self {
            side: PositionSide::Flat,
            entry_index: 0,
            entry_price: 0.0,
            size: 0.0,
            stop_loss_price: 0.0,
            trailing_stop: RatchetState::new(PositionSide::Flat),
            take_profit_price: None,
            cooldown_remaining: 0,
            highest_since_entry: 0.0,
            lowest_since_entry: 0.0,
            entry_volatility_multiplier: 1.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.side.is_flat()
    }

    /// Direction-aware size: positive long, negative short, zero flat.
    pub fn signed_size(&self) -> f64 {
        self.side.sign() * self.size
    }

    pub fn trailing_stop_price(&self) -> Option<f64> {
        if self.is_flat() {
            None
        } else {
            self.trailing_stop.current_level()
        }
    }

    pub fn bars_held(&self, current_index: usize) -> usize {
        current_index.saturating_sub(self.entry_index)
    }

    /// Transition FLAT → LONG/SHORT.
    pub fn open(&mut self, plan: EntryPlan) {
        debug_assert!(self.is_flat() && self.cooldown_remaining == 0);
        debug_assert!(!plan.side.is_flat() && plan.size > 0.0);
        *self = Self {
            side: plan.side,
            entry_index: plan.entry_index,
            entry_price: plan.entry_price,
            size: plan.size,
            stop_loss_price: plan.stop_loss_price,
            trailing_stop: RatchetState::with_initial_level(plan.side, plan.trailing_stop_price),
            take_profit_price: plan.take_profit_price,
            cooldown_remaining: 0,
            highest_since_entry: plan.entry_price,
            lowest_since_entry: plan.entry_price,
            entry_volatility_multiplier: plan.volatility_multiplier,
        };
    }

    /// Transition LONG/SHORT → FLAT, arming the cooldown.
    pub fn close(&mut self, cooldown_bars: usize) {
        *self = Self::flat();
        self.cooldown_remaining = cooldown_bars;
    }

    /// Fold a bar's extremes into the since-entry high/low.
    pub fn observe_extremes(&mut self, high: f64, low: f64) {
        self.highest_since_entry = self.highest_since_entry.max(high);
        self.lowest_since_entry = self.lowest_since_entry.min(low);
    }
}
