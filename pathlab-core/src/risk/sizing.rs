//! Position sizing — drawdown-scaled and volatility-scaled fractions of capital.
//!
//! # Formula
//! ```text
//! size = clip(base_size × drawdown_multiplier × volatility_multiplier, 0, max_size)
//!
//! drawdown_multiplier   = 1                                       if dd ≤ limit
//!                       = max(floor, 1 − (dd − limit) / limit)    otherwise
//! volatility_multiplier = clip(rolling_median(vol) / vol, lo, hi)
//! ```
//!
//! Degenerate inputs (undefined volatility, zero median, window still filling)
//! give a neutral multiplier of 1.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// Drawdown-aware sizer.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSizer {
    base_size: f64,
    max_size: f64,
    max_drawdown_limit: f64,
    drawdown_floor: f64,
}

impl PositionSizer {
    pub fn new(
        base_size: f64,
        max_size: f64,
        max_drawdown_limit: f64,
        drawdown_floor: f64,
    ) -> Self {
        Self {
            base_size,
            max_size,
            max_drawdown_limit,
            drawdown_floor,
        }
    }

    /// Linear de-risking once the drawdown exceeds the limit, floored.
    pub fn drawdown_multiplier(&self, drawdown: f64) -> f64 {
        if !drawdown.is_finite() || drawdown <= self.max_drawdown_limit {
            return 1.0;
        }
        let excess = (drawdown - self.max_drawdown_limit) / self.max_drawdown_limit;
        (1.0 - excess).max(self.drawdown_floor)
    }

    /// Final size for the given drawdown and volatility multiplier.
    pub fn size(&self, drawdown: f64, volatility_multiplier: f64) -> f64 {
        let vol = if volatility_multiplier.is_finite() {
            volatility_multiplier
        } else {
            tracing::trace!(volatility_multiplier, "non-finite volatility multiplier, using 1");
            1.0
        };
        let raw = self.base_size * self.drawdown_multiplier(drawdown) * vol;
        raw.clamp(0.0, self.max_size)
    }

    pub fn max_size(&self) -> f64 {
        self.max_size
    }
}

/// Volatility scaling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolatilityScaling {
    pub enabled: bool,
    /// Indicator key of the per-bar volatility estimate.
    pub field: String,
    pub median_window: usize,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl Default for VolatilityScaling {
    fn default() -> Self {
        Self {
            enabled: true,
            field: "vol_20".into(),
            median_window: 60,
            min_multiplier: 0.5,
            max_multiplier: 1.5,
        }
    }
}

/// Fixed-capacity rolling median over finite samples.
#[derive(Debug, Clone)]
pub struct RollingMedian {
    window: VecDeque<f64>,
    capacity: usize,
}

impl RollingMedian {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Push a sample; non-finite samples are dropped.
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.capacity
    }

    /// Median of the window, `None` until the window is full.
    pub fn median(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }
}

/// Stateful volatility multiplier, fed one bar at a time.
#[derive(Debug, Clone)]
pub struct VolatilityScaler {
    settings: VolatilityScaling,
    median: RollingMedian,
}

impl VolatilityScaler {
    pub fn new(settings: VolatilityScaling) -> Self {
        let median = RollingMedian::new(settings.median_window);
        Self { settings, median }
    }

    /// Fold the bar's volatility into the window and return the multiplier
    /// for this bar. Only data up to and including `bar` is used.
    pub fn observe(&mut self, bar: &Bar) -> f64 {
        if !self.settings.enabled {
            return 1.0;
        }
        let vol = bar.indicator(&self.settings.field);
        if let Some(v) = vol {
            self.median.push(v);
        }
        volatility_multiplier(
            vol,
            self.median.median(),
            self.settings.min_multiplier,
            self.settings.max_multiplier,
        )
    }
}

/// `clip(median / vol, lo, hi)`, or 1 when either input is unusable.
pub fn volatility_multiplier(vol: Option<f64>, median: Option<f64>, lo: f64, hi: f64) -> f64 {
    match (vol, median) {
        (Some(v), Some(m)) if v > 0.0 && m > 0.0 => (m / v).clamp(lo, hi),
        _ => 1.0,
    }
}
