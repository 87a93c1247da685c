//! Engine configuration — every policy knob of the position state machine.
//!
//! Defaults reproduce the robust momentum strategy the engine was built for.
//! [`EngineConfig::validate`] runs at engine construction, so the scan never
//! sees an inconsistent configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::accounting::PnlTiming;
use crate::components::{EntryFilter, SignalEvaluator, TradingMode};
use crate::domain::ExitReason;
use crate::risk::{StopTrigger, TakeProfitPolicy, VolatilityScaling};

/// An exit rule that can be placed in the priority list.
///
/// Cooldown is not a rule here: it always runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitRule {
    StopLoss,
    TrailingStop,
    TakeProfit,
    IndicatorExit,
    MaxHold,
}

impl ExitRule {
    pub fn reason(self) -> ExitReason {
        match self {
            ExitRule::StopLoss => ExitReason::StopLoss,
            ExitRule::TrailingStop => ExitReason::TrailingStop,
            ExitRule::TakeProfit => ExitReason::TakeProfit,
            ExitRule::IndicatorExit => ExitReason::IndicatorExit,
            ExitRule::MaxHold => ExitReason::MaxHold,
        }
    }

    /// Canonical order: protective stops first, then targets, signal, time.
    pub fn canonical_order() -> Vec<ExitRule> {
        vec![
            ExitRule::StopLoss,
            ExitRule::TrailingStop,
            ExitRule::TakeProfit,
            ExitRule::IndicatorExit,
            ExitRule::MaxHold,
        ]
    }
}

/// Configuration for a single backtest scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    // ── Signal ──
    /// Indicator driving entries and the indicator exit (a z-score).
    pub strength_field: String,
    pub entry_threshold: f64,
    pub exit_threshold: f64,
    pub trading_mode: TradingMode,
    pub filters: Vec<EntryFilter>,

    // ── Holding ──
    pub max_hold_bars: usize,
    pub min_cooldown_bars: usize,
    pub exit_priority: Vec<ExitRule>,
    /// Recompute the drawdown-scaled size on every held bar.
    pub resize_while_held: bool,
    /// Force an exit on the last bar of the feed.
    pub close_at_end: bool,
    /// Cap on entries per calendar day of the bar timestamps.
    pub max_trades_per_day: Option<usize>,

    // ── Protective levels ──
    pub atr_field: String,
    pub stop_multiplier: f64,
    pub trailing_multiplier: f64,
    pub take_profit: TakeProfitPolicy,
    pub stop_trigger: StopTrigger,

    // ── Sizing and drawdown ──
    pub base_size: f64,
    pub max_size: f64,
    pub max_drawdown_limit: f64,
    pub circuit_breaker_multiple: f64,
    pub drawdown_size_floor: f64,
    pub volatility_scaling: VolatilityScaling,

    // ── Costs ──
    /// Charged on every unit of absolute change in signed size.
    pub cost_rate: f64,
    pub pnl_timing: PnlTiming,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strength_field: "momentum_zscore_20".into(),
            entry_threshold: 1.8,
            exit_threshold: 0.3,
            trading_mode: TradingMode::LongShort,
            filters: vec![
                EntryFilter::default_trend(),
                EntryFilter::default_rsi(),
                EntryFilter::MomentumAcceleration,
            ],
            max_hold_bars: 50,
            min_cooldown_bars: 8,
            exit_priority: ExitRule::canonical_order(),
            resize_while_held: false,
            close_at_end: false,
            max_trades_per_day: None,
            atr_field: "atr_14".into(),
            stop_multiplier: 2.0,
            trailing_multiplier: 1.5,
            take_profit: TakeProfitPolicy::None,
            stop_trigger: StopTrigger::Intrabar,
            base_size: 0.5,
            max_size: 1.0,
            max_drawdown_limit: 0.15,
            circuit_breaker_multiple: 1.5,
            drawdown_size_floor: 0.3,
            volatility_scaling: VolatilityScaling::default(),
            cost_rate: 0.0002,
            pnl_timing: PnlTiming::SameBar,
        }
    }
}

/// Configuration rejected at construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("max_size ({max_size}) must be >= base_size ({base_size})")]
    MaxSizeBelowBase { base_size: f64, max_size: f64 },

    #[error("{field} must name a feed field")]
    EmptyField { field: &'static str },

    #[error("exit rule {0:?} listed more than once in exit_priority")]
    DuplicateExitRule(ExitRule),

    #[error("filter {filter}: {reason}")]
    InvalidFilter {
        filter: &'static str,
        reason: String,
    },
}

fn check(
    field: &'static str,
    value: f64,
    expected: &'static str,
    ok: impl Fn(f64) -> bool,
) -> Result<(), ConfigError> {
    if value.is_finite() && ok(value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected,
        })
    }
}

impl EngineConfig {
    /// Check every cross-field constraint. Returns the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strength_field.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                field: "strength_field",
            });
        }
        if self.atr_field.trim().is_empty() {
            return Err(ConfigError::EmptyField { field: "atr_field" });
        }

        check("entry_threshold", self.entry_threshold, ">= 0", |v| v >= 0.0)?;
        check("exit_threshold", self.exit_threshold, ">= 0", |v| v >= 0.0)?;
        check("max_hold_bars", self.max_hold_bars as f64, ">= 1", |v| v >= 1.0)?;
        if let Some(cap) = self.max_trades_per_day {
            check("max_trades_per_day", cap as f64, ">= 1", |v| v >= 1.0)?;
        }
        check("stop_multiplier", self.stop_multiplier, "> 0", |v| v > 0.0)?;
        check("trailing_multiplier", self.trailing_multiplier, "> 0", |v| {
            v > 0.0
        })?;
        check("base_size", self.base_size, "in (0, 1]", |v| {
            v > 0.0 && v <= 1.0
        })?;
        check("max_size", self.max_size, "in (0, 1]", |v| v > 0.0 && v <= 1.0)?;
        if self.max_size < self.base_size {
            return Err(ConfigError::MaxSizeBelowBase {
                base_size: self.base_size,
                max_size: self.max_size,
            });
        }
        check("max_drawdown_limit", self.max_drawdown_limit, "> 0", |v| {
            v > 0.0
        })?;
        check(
            "circuit_breaker_multiple",
            self.circuit_breaker_multiple,
            ">= 1",
            |v| v >= 1.0,
        )?;
        check("drawdown_size_floor", self.drawdown_size_floor, "in [0, 1]", |v| {
            (0.0..=1.0).contains(&v)
        })?;
        check("cost_rate", self.cost_rate, ">= 0", |v| v >= 0.0)?;

        match &self.take_profit {
            TakeProfitPolicy::None => {}
            TakeProfitPolicy::AtrMultiple { multiplier } => {
                check("take_profit.multiplier", *multiplier, "> 0", |v| v > 0.0)?;
            }
            TakeProfitPolicy::Indicator { field } => {
                if field.trim().is_empty() {
                    return Err(ConfigError::EmptyField {
                        field: "take_profit.field",
                    });
                }
            }
        }

        let vs = &self.volatility_scaling;
        if vs.enabled {
            if vs.field.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    field: "volatility_scaling.field",
                });
            }
            check(
                "volatility_scaling.median_window",
                vs.median_window as f64,
                ">= 1",
                |v| v >= 1.0,
            )?;
            check(
                "volatility_scaling.min_multiplier",
                vs.min_multiplier,
                "> 0",
                |v| v > 0.0,
            )?;
            check(
                "volatility_scaling.max_multiplier",
                vs.max_multiplier,
                ">= min_multiplier",
                |v| v >= vs.min_multiplier,
            )?;
        }

        let mut seen = BTreeSet::new();
        for rule in &self.exit_priority {
            if !seen.insert(*rule) {
                return Err(ConfigError::DuplicateExitRule(*rule));
            }
        }

        for filter in &self.filters {
            validate_filter(filter)?;
        }

        Ok(())
    }

    pub fn signal_evaluator(&self) -> SignalEvaluator {
        SignalEvaluator::new(
            self.strength_field.clone(),
            self.entry_threshold,
            self.trading_mode,
            self.filters.clone(),
        )
    }

    pub fn exit_rule_enabled(&self, rule: ExitRule) -> bool {
        self.exit_priority.contains(&rule)
    }
}

fn validate_filter(filter: &EntryFilter) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidFilter {
        filter: filter.name(),
        reason,
    };
    match filter {
        EntryFilter::VolumeConfirmation { min_ratio, .. } => {
            if !min_ratio.is_finite() || *min_ratio < 0.0 {
                return Err(invalid(format!("min_ratio must be >= 0, got {min_ratio}")));
            }
        }
        EntryFilter::RsiExtremity { upper, lower, .. } => {
            if !(upper.is_finite() && lower.is_finite()) || lower >= upper {
                return Err(invalid(format!(
                    "lower ({lower}) must be below upper ({upper})"
                )));
            }
        }
        _ => {}
    }
    if filter
        .required_fields("strength")
        .iter()
        .any(|f| f.trim().is_empty())
    {
        return Err(invalid("field names must not be empty".into()));
    }
    Ok(())
}
