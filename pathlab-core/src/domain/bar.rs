//! Bar and BarFeed — the market data the engine reads and never mutates.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One fixed-interval OHLCV sample plus its precomputed indicator values.
///
/// Indicator values that are still warming up are stored as `f64::NAN`.
/// Use [`Bar::indicator`] to read them: it folds "missing" and "non-finite"
/// into `None` so callers never compare against NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// `ln(close_t / close_{t-1})`; undefined (NaN) on the first bar.
    pub log_return: f64,
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        log_return: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            log_return,
            indicators: BTreeMap::new(),
        }
    }

    /// Builder-style indicator insertion.
    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    /// Finite indicator value, or `None` when absent or still undefined.
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied().filter(|v| v.is_finite())
    }

    pub fn has_field(&self, name: &str) -> bool {
        matches!(
            name,
            "open" | "high" | "low" | "close" | "volume" | "log_return"
        ) || self.indicators.contains_key(name)
    }

    /// Log return with the undefined first-bar value mapped to zero.
    pub fn realized_log_return(&self) -> f64 {
        if self.log_return.is_finite() {
            self.log_return
        } else {
            0.0
        }
    }

    /// Basic OHLCV sanity check: positive prices, high/low enclosing open/close.
    pub fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Validation failures for a bar sequence.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BarError {
    #[error("bar feed is empty")]
    Empty,

    #[error("bar {index} has invalid OHLCV values")]
    Insane { index: usize },

    #[error("bar {index} timestamp {timestamp} is not after the previous bar")]
    OutOfOrder {
        index: usize,
        timestamp: NaiveDateTime,
    },
}

/// Ordered, duplicate-free sequence of bars.
///
/// Construction validates ordering and OHLCV sanity once, so the scan never
/// has to re-check.
#[derive(Debug, Clone, Serialize)]
pub struct BarFeed {
    bars: Vec<Bar>,
}

impl BarFeed {
    pub fn new(bars: Vec<Bar>) -> Result<Self, BarError> {
        if bars.is_empty() {
            return Err(BarError::Empty);
        }
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(BarError::Insane { index });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(BarError::OutOfOrder {
                    index,
                    timestamp: bar.timestamp,
                });
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    /// Fields present on every bar (OHLCV columns plus common indicator keys).
    pub fn fields(&self) -> BTreeSet<String> {
        let mut fields: BTreeSet<String> = ["open", "high", "low", "close", "volume", "log_return"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Some((first, rest)) = self.bars.split_first() {
            fields.extend(
                first
                    .indicators
                    .keys()
                    .filter(|k| rest.iter().all(|b| b.indicators.contains_key(*k)))
                    .cloned(),
            );
        }
        fields
    }

    /// A prefix of this feed (bars `0..len`). Used for truncation checks.
    pub fn truncated(&self, len: usize) -> Result<Self, BarError> {
        Self::new(self.bars[..len.min(self.bars.len())].to_vec())
    }
}
