//! Ratchet invariant enforcement for the trailing stop.
//!
//! **Core Rule:** the trailing stop may tighten, never loosen (even if ATR expands).
use serde::Serialize;

use crate::domain::PositionSide;

/// Ratchet state for a trailing stop.
///
/// - Long positions: level can only rise
/// - Short positions: level can only fall
/// - Flat: no ratchet, the proposed level is taken as-is
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatchetState {
    current_level: Option<f64>,
    side: PositionSide,
}

impl RatchetState {
    pub fn new(side: PositionSide) -> Self {
        Self {
            current_level: None,
            side,
        }
    }

    pub fn with_initial_level(side: PositionSide, initial_level: f64) -> Self {
        Self {
            current_level: Some(initial_level),
            side,
        }
    }

    /// Apply ratchet to a proposed stop level and return the resulting level.
    ///
    /// Non-finite proposals are ignored so a NaN never replaces a real level.
    ///
    /// # Example
    /// ```
    /// use pathlab_core::domain::PositionSide;
    /// use pathlab_core::risk::RatchetState;
    ///
    /// let mut ratchet = RatchetState::with_initial_level(PositionSide::Long, 95.0);
    /// assert_eq!(ratchet.apply(100.0), Some(100.0));
    /// assert_eq!(ratchet.apply(90.0), Some(100.0));
    /// ```
    pub fn apply(&mut self, proposed: f64) -> Option<f64> {
        if !proposed.is_finite() {
            return self.current_level;
        }

        let next = match self.current_level {
            None => proposed,
            Some(current) => match self.side {
                PositionSide::Long => current.max(proposed),
                PositionSide::Short => current.min(proposed),
                PositionSide::Flat => proposed,
            },
        };
        self.current_level = Some(next);
        self.current_level
    }

    pub fn current_level(&self) -> Option<f64> {
        self.current_level
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }
}
