//! RiskController — stop, trailing-stop and take-profit levels, sizing and the
//! circuit breaker.
//!
//! The controller is immutable once built. It reads bars and the position
//! state it is handed; the state machine owns every mutation.

use serde::{Deserialize, Serialize};

use super::sizing::PositionSizer;
use crate::domain::{Bar, EntryPlan, PositionSide, PositionState};
use crate::engine::config::EngineConfig;

/// How the take-profit level is set at entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TakeProfitPolicy {
    /// No take-profit exit.
    None,
    /// `entry ± multiplier × ATR_at_entry`.
    AtrMultiple { multiplier: f64 },
    /// The value of an indicator on the entry bar (e.g. a Bollinger middle band).
    Indicator { field: String },
}

/// Which prices can touch a stop or target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopTrigger {
    /// Bar high/low touches; fill at the level, or at the open on a gap-through.
    Intrabar,
    /// Only the close touches; fill at the close.
    Close,
}

/// A level touched on a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub fill_price: f64,
    pub gap_through: bool,
}

#[derive(Debug, Clone)]
pub struct RiskController {
    atr_field: String,
    stop_multiplier: f64,
    trailing_multiplier: f64,
    take_profit: TakeProfitPolicy,
    stop_trigger: StopTrigger,
    max_drawdown_limit: f64,
    circuit_breaker_multiple: f64,
    sizer: PositionSizer,
}

impl RiskController {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            atr_field: config.atr_field.clone(),
            stop_multiplier: config.stop_multiplier,
            trailing_multiplier: config.trailing_multiplier,
            take_profit: config.take_profit.clone(),
            stop_trigger: config.stop_trigger,
            max_drawdown_limit: config.max_drawdown_limit,
            circuit_breaker_multiple: config.circuit_breaker_multiple,
            sizer: PositionSizer::new(
                config.base_size,
                config.max_size,
                config.max_drawdown_limit,
                config.drawdown_size_floor,
            ),
        }
    }

    pub fn sizer(&self) -> &PositionSizer {
        &self.sizer
    }

    pub fn stop_trigger(&self) -> StopTrigger {
        self.stop_trigger
    }

    /// ATR on `bar`, if it is usable as a distance.
    fn atr(&self, bar: &Bar) -> Option<f64> {
        bar.indicator(&self.atr_field).filter(|a| *a >= 0.0)
    }

    /// `drawdown > circuit_breaker_multiple × limit`.
    pub fn circuit_breaker_tripped(&self, drawdown: f64) -> bool {
        drawdown.is_finite() && drawdown > self.circuit_breaker_multiple * self.max_drawdown_limit
    }

    /// Levels and size for an entry at `bar`'s close.
    ///
    /// Returns `None` when ATR is still undefined on the entry bar (no stop
    /// can be placed) or when sizing comes out at zero.
    pub fn plan_entry(
        &self,
        side: PositionSide,
        index: usize,
        bar: &Bar,
        drawdown: f64,
        volatility_multiplier: f64,
    ) -> Option<EntryPlan> {
        if side.is_flat() {
            return None;
        }
        let atr = self.atr(bar)?;
        let sign = side.sign();
        let entry_price = bar.close;

        let size = self.sizer.size(drawdown, volatility_multiplier);
        if size <= 0.0 {
            return None;
        }

        let take_profit_price = match &self.take_profit {
            TakeProfitPolicy::None => None,
            TakeProfitPolicy::AtrMultiple { multiplier } => {
                Some(entry_price + sign * multiplier * atr)
            }
            TakeProfitPolicy::Indicator { field } => bar
                .indicator(field)
                .filter(|tp| (tp - entry_price) * sign > 0.0),
        };

        Some(EntryPlan {
            side,
            entry_index: index,
            entry_price,
            size,
            stop_loss_price: entry_price - sign * self.stop_multiplier * atr,
            trailing_stop_price: entry_price - sign * self.trailing_multiplier * atr,
            take_profit_price,
            volatility_multiplier,
        })
    }

    /// Candidate trailing level for a held bar, before the ratchet.
    ///
    /// `extreme_since_entry ∓ trailing_multiplier × ATR_current`; `None` while
    /// ATR is undefined so the previous level is kept.
    pub fn trailing_candidate(&self, state: &PositionState, bar: &Bar) -> Option<f64> {
        let atr = self.atr(bar)?;
        match state.side {
            PositionSide::Long => Some(state.highest_since_entry - self.trailing_multiplier * atr),
            PositionSide::Short => Some(state.lowest_since_entry + self.trailing_multiplier * atr),
            PositionSide::Flat => None,
        }
    }

    /// Ratchet the trailing stop for this bar and return the live level.
    pub fn advance_trailing_stop(&self, state: &mut PositionState, bar: &Bar) -> Option<f64> {
        match self.trailing_candidate(state, bar) {
            Some(candidate) => state.trailing_stop.apply(candidate),
            None => state.trailing_stop_price(),
        }
    }

    /// Size while holding: drawdown multiplier recomputed, volatility factor
    /// frozen at entry.
    pub fn held_size(&self, state: &PositionState, drawdown: f64) -> f64 {
        self.sizer.size(drawdown, state.entry_volatility_multiplier)
    }

    /// Protective level (stop-loss or trailing stop) touched on `bar`?
    pub fn stop_touch(&self, side: PositionSide, level: f64, bar: &Bar) -> Option<Touch> {
        self.protective_touch(side, level, Some(level), bar)
    }

    /// Trailing stop touched on `bar`, where `level` may already include this
    /// bar's ratchet.
    ///
    /// A gap-through is judged against `standing`, the level in force at the
    /// open. A level raised by this bar's own extreme did not exist at the
    /// open, so a touch of it fills at the level.
    pub fn trailing_touch(
        &self,
        side: PositionSide,
        level: f64,
        standing: Option<f64>,
        bar: &Bar,
    ) -> Option<Touch> {
        self.protective_touch(side, level, standing, bar)
    }

    fn protective_touch(
        &self,
        side: PositionSide,
        level: f64,
        gap_level: Option<f64>,
        bar: &Bar,
    ) -> Option<Touch> {
        if !level.is_finite() {
            return None;
        }
        match (self.stop_trigger, side) {
            (StopTrigger::Close, PositionSide::Long) => {
                (bar.close <= level).then_some(Touch::at_close(bar))
            }
            (StopTrigger::Close, PositionSide::Short) => {
                (bar.close >= level).then_some(Touch::at_close(bar))
            }
            (StopTrigger::Intrabar, PositionSide::Long) => (bar.low <= level).then(|| {
                let gap_through = gap_level.is_some_and(|g| bar.open <= g);
                Touch {
                    fill_price: if gap_through { bar.open } else { level },
                    gap_through,
                }
            }),
            (StopTrigger::Intrabar, PositionSide::Short) => (bar.high >= level).then(|| {
                let gap_through = gap_level.is_some_and(|g| bar.open >= g);
                Touch {
                    fill_price: if gap_through { bar.open } else { level },
                    gap_through,
                }
            }),
            (_, PositionSide::Flat) => None,
        }
    }

    /// Profit target touched on `bar`? A favorable gap fills at the open.
    pub fn target_touch(&self, side: PositionSide, level: f64, bar: &Bar) -> Option<Touch> {
        if !level.is_finite() {
            return None;
        }
        match (self.stop_trigger, side) {
            (StopTrigger::Close, PositionSide::Long) => {
                (bar.close >= level).then_some(Touch::at_close(bar))
            }
            (StopTrigger::Close, PositionSide::Short) => {
                (bar.close <= level).then_some(Touch::at_close(bar))
            }
            (StopTrigger::Intrabar, PositionSide::Long) => (bar.high >= level).then(|| {
                let gap_through = bar.open >= level;
                Touch {
                    fill_price: if gap_through { bar.open } else { level },
                    gap_through,
                }
            }),
            (StopTrigger::Intrabar, PositionSide::Short) => (bar.low <= level).then(|| {
                let gap_through = bar.open <= level;
                Touch {
                    fill_price: if gap_through { bar.open } else { level },
                    gap_through,
                }
            }),
            (_, PositionSide::Flat) => None,
        }
    }
}

impl Touch {
    fn at_close(bar: &Bar) -> Self {
        Self {
            fill_price: bar.close,
            gap_through: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(open: f64, high: f64, low: f64, close: f64, atr: f64) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        Bar::new(ts, open, high, low, close, 1_000.0, 0.0)
            .with_indicator("atr_14", atr)
            .with_indicator("bb_middle", 104.0)
    }

    fn controller(config: EngineConfig) -> RiskController {
        RiskController::from_config(&config)
    }

    #[test]
    fn entry_levels_from_atr() {
        let rc = controller(EngineConfig {
            stop_multiplier: 2.0,
            trailing_multiplier: 1.5,
            ..EngineConfig::default()
        });
        let plan = rc
            .plan_entry(PositionSide::Long, 10, &bar(99.0, 101.0, 98.0, 100.0, 2.0), 0.0, 1.0)
            .unwrap();
        assert_eq!(plan.entry_price, 100.0);
        assert_eq!(plan.stop_loss_price, 96.0);
        assert_eq!(plan.trailing_stop_price, 97.0);
        assert_eq!(plan.size, 0.5);
        assert_eq!(plan.take_profit_price, None);

        let short = rc
            .plan_entry(PositionSide::Short, 10, &bar(99.0, 101.0, 98.0, 100.0, 2.0), 0.0, 1.0)
            .unwrap();
        assert_eq!(short.stop_loss_price, 104.0);
        assert_eq!(short.trailing_stop_price, 103.0);
    }

    #[test]
    fn undefined_atr_blocks_entry() {
        let rc = controller(EngineConfig::default());
        let plan = rc.plan_entry(
            PositionSide::Long,
            3,
            &bar(99.0, 101.0, 98.0, 100.0, f64::NAN),
            0.0,
            1.0,
        );
        assert!(plan.is_none());
    }

    #[test]
    fn take_profit_policies() {
        let atr_tp = controller(EngineConfig {
            take_profit: TakeProfitPolicy::AtrMultiple { multiplier: 3.0 },
            ..EngineConfig::default()
        });
        let plan = atr_tp
            .plan_entry(PositionSide::Long, 0, &bar(99.0, 101.0, 98.0, 100.0, 2.0), 0.0, 1.0)
            .unwrap();
        assert_eq!(plan.take_profit_price, Some(106.0));

        let band = controller(EngineConfig {
            take_profit: TakeProfitPolicy::Indicator {
                field: "bb_middle".into(),
            },
            ..EngineConfig::default()
        });
        let long = band
            .plan_entry(PositionSide::Long, 0, &bar(99.0, 101.0, 98.0, 100.0, 2.0), 0.0, 1.0)
            .unwrap();
        assert_eq!(long.take_profit_price, Some(104.0));
        // A band on the wrong side of the entry is not a target.
        let short = band
            .plan_entry(PositionSide::Short, 0, &bar(99.0, 101.0, 98.0, 100.0, 2.0), 0.0, 1.0)
            .unwrap();
        assert_eq!(short.take_profit_price, None);
    }

    #[test]
    fn circuit_breaker_threshold() {
        let rc = controller(EngineConfig::default());
        // limit 0.15 × 1.5 = 0.225
        assert!(!rc.circuit_breaker_tripped(0.2));
        assert!(!rc.circuit_breaker_tripped(0.225));
        assert!(rc.circuit_breaker_tripped(0.23));
    }

    #[test]
    fn intrabar_stop_fills_at_level_or_gap_open() {
        let rc = controller(EngineConfig::default());
        let touched = rc
            .stop_touch(PositionSide::Long, 96.0, &bar(97.0, 98.0, 95.0, 95.5, 2.0))
            .unwrap();
        assert_eq!(touched.fill_price, 96.0);
        assert!(!touched.gap_through);

        let gapped = rc
            .stop_touch(PositionSide::Long, 96.0, &bar(94.0, 95.0, 93.0, 94.5, 2.0))
            .unwrap();
        assert_eq!(gapped.fill_price, 94.0);
        assert!(gapped.gap_through);

        assert!(rc
            .stop_touch(PositionSide::Long, 96.0, &bar(98.0, 99.0, 96.5, 98.0, 2.0))
            .is_none());
        assert!(rc
            .stop_touch(PositionSide::Short, 104.0, &bar(101.0, 104.5, 100.0, 102.0, 2.0))
            .is_some());
    }

    #[test]
    fn close_trigger_ignores_wicks() {
        let rc = controller(EngineConfig {
            stop_trigger: StopTrigger::Close,
            ..EngineConfig::default()
        });
        assert!(rc
            .stop_touch(PositionSide::Long, 96.0, &bar(97.0, 98.0, 95.0, 97.0, 2.0))
            .is_none());
        let hit = rc
            .stop_touch(PositionSide::Long, 96.0, &bar(97.0, 98.0, 95.0, 95.5, 2.0))
            .unwrap();
        assert_eq!(hit.fill_price, 95.5);
    }

    #[test]
    fn target_touch_is_mirrored() {
        let rc = controller(EngineConfig::default());
        let hit = rc
            .target_touch(PositionSide::Long, 104.0, &bar(102.0, 105.0, 101.0, 103.0, 2.0))
            .unwrap();
        assert_eq!(hit.fill_price, 104.0);
        let gap = rc
            .target_touch(PositionSide::Long, 104.0, &bar(106.0, 107.0, 105.0, 106.0, 2.0))
            .unwrap();
        assert_eq!(gap.fill_price, 106.0);
        assert!(rc
            .target_touch(PositionSide::Short, 96.0, &bar(98.0, 99.0, 97.0, 98.0, 2.0))
            .is_none());
    }

    #[test]
    fn trailing_touch_judges_gap_against_standing_level() {
        let rc = controller(EngineConfig::default());
        // Level raised to 107 by this bar's high; 97 stood at the open of 100.
        let raised = rc
            .trailing_touch(
                PositionSide::Long,
                107.0,
                Some(97.0),
                &bar(100.0, 110.0, 99.5, 109.0, 2.0),
            )
            .unwrap();
        assert_eq!(raised.fill_price, 107.0);
        assert!(!raised.gap_through);

        // Opening below the standing level is a real gap.
        let gapped = rc
            .trailing_touch(
                PositionSide::Long,
                97.0,
                Some(97.0),
                &bar(95.0, 96.0, 94.0, 95.5, 2.0),
            )
            .unwrap();
        assert_eq!(gapped.fill_price, 95.0);
        assert!(gapped.gap_through);

        let short = rc
            .trailing_touch(
                PositionSide::Short,
                93.0,
                Some(103.0),
                &bar(100.0, 100.5, 90.0, 91.0, 2.0),
            )
            .unwrap();
        assert_eq!(short.fill_price, 93.0);
    }

    #[test]
    fn trailing_stop_follows_extreme_and_never_loosens() {
        let rc = controller(EngineConfig {
            trailing_multiplier: 1.5,
            ..EngineConfig::default()
        });
        let plan = rc
            .plan_entry(PositionSide::Long, 0, &bar(99.0, 101.0, 98.0, 100.0, 2.0), 0.0, 1.0)
            .unwrap();
        let mut state = PositionState::flat();
        state.open(plan);

        state.observe_extremes(105.0, 101.0);
        // 105 - 1.5 × 2 = 102
        let level = rc.advance_trailing_stop(&mut state, &bar(102.0, 105.0, 101.0, 104.0, 2.0));
        assert_eq!(level, Some(102.0));

        // ATR doubles: 105 - 1.5 × 4 = 99 would loosen.
        let level = rc.advance_trailing_stop(&mut state, &bar(103.0, 104.0, 102.0, 103.0, 4.0));
        assert_eq!(level, Some(102.0));

        // Undefined ATR keeps the level.
        assert_eq!(
            rc.advance_trailing_stop(&mut state, &bar(103.0, 104.0, 102.0, 103.0, f64::NAN)),
            Some(102.0)
        );
    }
}
