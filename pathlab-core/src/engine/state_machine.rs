//! PositionStateMachine — the per-bar FLAT / LONG / SHORT transition function.
//!
//! One call to [`PositionStateMachine::step`] per bar, in order. A step only
//! sees the current bar and its predecessor, so it cannot look ahead.
//!
//! Per bar:
//! 1. Cooldown: if bars remain, count one down and stay flat. Nothing else runs.
//! 2. Holding: fold the bar's extremes, ratchet the trailing stop, then walk
//!    the configured exit rules (first match wins). Otherwise hold.
//! 3. Flat: act on the previous bar's raw signal unless the circuit breaker
//!    is tripped or the day's entry cap is used up. Entries fill at this
//!    bar's close. On the last bar with `close_at_end` a fresh entry is
//!    closed again at the same close.
//!
//! After the decision the bar's net strategy return is accrued into the
//! drawdown tracker, so the next bar's gate sees it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::accounting::bar_net_return;
use super::config::{EngineConfig, ExitRule};
use crate::components::{Signal, SignalDirection, SignalEvaluator};
use crate::domain::{Bar, ExitReason, PositionSide, PositionState};
use crate::risk::{
    DailyEntryCounter, PortfolioDrawdownTracker, RiskController, StopTrigger, VolatilityScaler,
};

/// The state machine's output for one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarDecision {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    /// Position held at the close of this bar.
    pub side: PositionSide,
    pub size: f64,
    pub stop_loss_price: Option<f64>,
    pub trailing_stop_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    /// Set on the bar a position is opened, with the side and size it was
    /// opened at. `side`/`size` may already be flat again on the last bar.
    pub entry_price: Option<f64>,
    pub entry_side: Option<PositionSide>,
    pub entry_size: Option<f64>,
    /// Set on the bar a position is closed, together with `exit_reason`.
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    /// Cooldown counter as it stood at the start of this bar.
    pub cooldown_remaining: usize,
    /// Raw signal computed on this bar (actable next bar).
    pub raw_signal: SignalDirection,
    pub strength: f64,
    /// Portfolio drawdown the entry gate saw on this bar.
    pub drawdown: f64,
    /// An entry was due but the circuit breaker blocked it.
    pub entry_suppressed: bool,
    /// An entry was due but the day's entry cap was already used up.
    pub entry_capped: bool,
}

impl BarDecision {
    pub fn signed_size(&self) -> f64 {
        self.side.sign() * self.size
    }

    pub fn is_entry(&self) -> bool {
        self.entry_price.is_some()
    }

    pub fn is_exit(&self) -> bool {
        self.exit_reason.is_some()
    }
}

/// What the machine sees for one step.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub index: usize,
    pub bar: &'a Bar,
    pub prev: Option<&'a Bar>,
    /// True on the final bar of the feed (for `close_at_end`).
    pub is_last: bool,
}

struct Exit {
    reason: ExitReason,
    price: f64,
}

/// Owns the position state, the drawdown tracker and the one-bar signal delay.
#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    config: EngineConfig,
    evaluator: SignalEvaluator,
    risk: RiskController,
    volatility: VolatilityScaler,
    state: PositionState,
    drawdown: PortfolioDrawdownTracker,
    daily_entries: DailyEntryCounter,
    /// Raw signal of the previous bar; what this bar may act on.
    pending: Signal,
    prev_signed_size: f64,
}

impl PositionStateMachine {
    /// Build a machine from a validated configuration.
    pub fn new(config: &EngineConfig) -> Result<Self, super::config::ConfigError> {
        config.validate()?;
        Ok(Self {
            evaluator: config.signal_evaluator(),
            risk: RiskController::from_config(config),
            volatility: VolatilityScaler::new(config.volatility_scaling.clone()),
            state: PositionState::flat(),
            drawdown: PortfolioDrawdownTracker::new(),
            daily_entries: DailyEntryCounter::new(config.max_trades_per_day),
            pending: Signal::flat(),
            prev_signed_size: 0.0,
            config: config.clone(),
        })
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn drawdown(&self) -> &PortfolioDrawdownTracker {
        &self.drawdown
    }

    /// Advance one bar.
    pub fn step(&mut self, ctx: BarContext<'_>) -> BarDecision {
        let BarContext {
            index,
            bar,
            prev,
            is_last,
        } = ctx;

        let volatility_multiplier = self.volatility.observe(bar);
        let acted = self.pending;
        let raw = self.evaluator.evaluate(bar, prev);
        let drawdown = self.drawdown.current_drawdown();
        let cooldown_at_start = self.state.cooldown_remaining;

        let mut entry = None;
        let mut exit = None;
        let mut entry_suppressed = false;
        let mut entry_capped = false;

        if self.state.cooldown_remaining > 0 {
            self.state.cooldown_remaining -= 1;
        } else if !self.state.is_flat() {
            exit = self.evaluate_held(index, bar, acted, is_last, drawdown);
        } else if !acted.direction.is_flat() {
            if self.risk.circuit_breaker_tripped(drawdown) {
                entry_suppressed = true;
                tracing::debug!(
                    index,
                    drawdown,
                    direction = ?acted.direction,
                    "entry suppressed by circuit breaker"
                );
            } else if !self.daily_entries.allows(bar.timestamp.date()) {
                entry_capped = true;
                tracing::debug!(
                    index,
                    date = %bar.timestamp.date(),
                    cap = ?self.config.max_trades_per_day,
                    "entry blocked by daily entry cap"
                );
            } else if let Some(plan) = self.risk.plan_entry(
                PositionSide::from(acted.direction),
                index,
                bar,
                drawdown,
                volatility_multiplier,
            ) {
                tracing::debug!(
                    index,
                    side = ?plan.side,
                    price = plan.entry_price,
                    size = plan.size,
                    stop = plan.stop_loss_price,
                    "entry"
                );
                entry = Some((plan.side, plan.entry_price, plan.size));
                self.daily_entries.record(bar.timestamp.date());
                self.state.open(plan);
                if is_last && self.config.close_at_end {
                    exit = Some(self.close_position(index, ExitReason::EndOfData, bar.close));
                }
            } else {
                tracing::trace!(index, "entry skipped, no usable ATR or zero size");
            }
        }

        let decision = BarDecision {
            index,
            timestamp: bar.timestamp,
            side: self.state.side,
            size: self.state.size,
            stop_loss_price: (!self.state.is_flat()).then_some(self.state.stop_loss_price),
            trailing_stop_price: self.state.trailing_stop_price(),
            take_profit_price: if self.state.is_flat() {
                None
            } else {
                self.state.take_profit_price
            },
            entry_price: entry.map(|(_, price, _)| price),
            entry_side: entry.map(|(side, _, _)| side),
            entry_size: entry.map(|(_, _, size)| size),
            exit_price: exit.as_ref().map(|e: &Exit| e.price),
            exit_reason: exit.as_ref().map(|e: &Exit| e.reason),
            cooldown_remaining: cooldown_at_start,
            raw_signal: raw.direction,
            strength: raw.strength,
            drawdown,
            entry_suppressed,
            entry_capped,
        };

        let signed = self.state.signed_size();
        self.drawdown.record(bar_net_return(
            self.config.pnl_timing,
            self.prev_signed_size,
            signed,
            bar.realized_log_return(),
            self.config.cost_rate,
        ));
        self.prev_signed_size = signed;
        self.pending = raw;

        decision
    }

    /// Exit checks for a held position. Closes the position on a match.
    fn evaluate_held(
        &mut self,
        index: usize,
        bar: &Bar,
        acted: Signal,
        is_last: bool,
        drawdown: f64,
    ) -> Option<Exit> {
        let standing_trail = self.state.trailing_stop_price();
        match self.risk.stop_trigger() {
            StopTrigger::Intrabar => self.state.observe_extremes(bar.high, bar.low),
            StopTrigger::Close => self.state.observe_extremes(bar.close, bar.close),
        }
        self.risk.advance_trailing_stop(&mut self.state, bar);

        let side = self.state.side;
        let mut exit = None;
        for rule in &self.config.exit_priority {
            exit = match rule {
                ExitRule::StopLoss => self
                    .risk
                    .stop_touch(side, self.state.stop_loss_price, bar)
                    .map(|t| t.fill_price),
                ExitRule::TrailingStop => self
                    .state
                    .trailing_stop_price()
                    .and_then(|level| self.risk.trailing_touch(side, level, standing_trail, bar))
                    .map(|t| t.fill_price),
                ExitRule::TakeProfit => self
                    .state
                    .take_profit_price
                    .and_then(|level| self.risk.target_touch(side, level, bar))
                    .map(|t| t.fill_price),
                ExitRule::IndicatorExit => {
                    let faded = match side {
                        PositionSide::Long => acted.strength < self.config.exit_threshold,
                        PositionSide::Short => acted.strength > -self.config.exit_threshold,
                        PositionSide::Flat => false,
                    };
                    faded.then_some(bar.close)
                }
                ExitRule::MaxHold => (self.state.bars_held(index) >= self.config.max_hold_bars)
                    .then_some(bar.close),
            }
            .map(|price| Exit {
                reason: rule.reason(),
                price,
            });
            if exit.is_some() {
                break;
            }
        }

        if exit.is_none() && is_last && self.config.close_at_end {
            exit = Some(Exit {
                reason: ExitReason::EndOfData,
                price: bar.close,
            });
        }

        match exit {
            Some(exit) => Some(self.close_position(index, exit.reason, exit.price)),
            None => {
                if self.config.resize_while_held {
                    let size = self.risk.held_size(&self.state, drawdown);
                    if size > 0.0 {
                        self.state.size = size;
                    }
                }
                None
            }
        }
    }

    fn close_position(&mut self, index: usize, reason: ExitReason, price: f64) -> Exit {
        tracing::debug!(
            index,
            side = ?self.state.side,
            reason = %reason,
            price,
            bars_held = self.state.bars_held(index),
            "exit"
        );
        self.state.close(self.config.min_cooldown_bars);
        Exit { reason, price }
    }
}
