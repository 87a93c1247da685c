//! Signal evaluation — maps a bar (and its predecessor) to a raw directional signal.
//!
//! The evaluator is pure: it holds only configuration and never sees position
//! or portfolio state. The raw signal for bar t becomes actionable at bar t+1;
//! the state machine is responsible for that delay.

use serde::{Deserialize, Serialize};

use super::filter::{EntryFilter, FilterContext};
use crate::domain::{Bar, PositionSide};

/// Direction of a raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDirection {
    Long,
    Short,
    Flat,
}

impl SignalDirection {
    pub fn is_flat(self) -> bool {
        self == SignalDirection::Flat
    }

    pub fn as_i8(self) -> i8 {
        match self {
            SignalDirection::Long => 1,
            SignalDirection::Short => -1,
            SignalDirection::Flat => 0,
        }
    }
}

impl From<SignalDirection> for PositionSide {
    fn from(d: SignalDirection) -> Self {
        match d {
            SignalDirection::Long => PositionSide::Long,
            SignalDirection::Short => PositionSide::Short,
            SignalDirection::Flat => PositionSide::Flat,
        }
    }
}

/// Which directions may be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    LongOnly,
    ShortOnly,
    LongShort,
}

impl TradingMode {
    pub fn allows(self, direction: SignalDirection) -> bool {
        match (self, direction) {
            (_, SignalDirection::Flat) => false,
            (TradingMode::LongShort, _) => true,
            (TradingMode::LongOnly, d) => d == SignalDirection::Long,
            (TradingMode::ShortOnly, d) => d == SignalDirection::Short,
        }
    }
}

/// Raw signal for one bar.
///
/// `strength` is always finite: an undefined indicator reads as 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: SignalDirection,
    pub strength: f64,
}

impl Signal {
    pub fn flat() -> Self {
        Self {
            direction: SignalDirection::Flat,
            strength: 0.0,
        }
    }
}

/// Threshold-plus-filters signal evaluator.
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    strength_field: String,
    entry_threshold: f64,
    trading_mode: TradingMode,
    filters: Vec<EntryFilter>,
}

impl SignalEvaluator {
    pub fn new(
        strength_field: impl Into<String>,
        entry_threshold: f64,
        trading_mode: TradingMode,
        filters: Vec<EntryFilter>,
    ) -> Self {
        Self {
            strength_field: strength_field.into(),
            entry_threshold,
            trading_mode,
            filters,
        }
    }

    pub fn strength_field(&self) -> &str {
        &self.strength_field
    }

    pub fn filters(&self) -> &[EntryFilter] {
        &self.filters
    }

    /// Strength on a bar, with undefined values neutralized to 0.
    pub fn strength(&self, bar: &Bar) -> f64 {
        bar.indicator(&self.strength_field).unwrap_or(0.0)
    }

    pub fn evaluate(&self, bar: &Bar, prev: Option<&Bar>) -> Signal {
        let strength = self.strength(bar);

        let candidate = if strength > self.entry_threshold {
            SignalDirection::Long
        } else if strength < -self.entry_threshold {
            SignalDirection::Short
        } else {
            SignalDirection::Flat
        };

        if !self.trading_mode.allows(candidate) {
            return Signal {
                direction: SignalDirection::Flat,
                strength,
            };
        }

        let ctx = FilterContext {
            bar,
            prev,
            strength_field: &self.strength_field,
        };
        let direction = if self.filters.iter().all(|f| f.passes(candidate, &ctx)) {
            candidate
        } else {
            SignalDirection::Flat
        };

        Signal {
            direction,
            strength,
        }
    }
}
