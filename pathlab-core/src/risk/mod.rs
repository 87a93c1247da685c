//! Risk control — protective levels, sizing and the entry gates.
//!
//! **Core invariant:** the trailing stop may tighten, never loosen. See [`ratchet`].

pub mod controller;
pub mod daily_cap;
pub mod drawdown;
pub mod ratchet;
pub mod sizing;

pub use controller::{RiskController, StopTrigger, TakeProfitPolicy, Touch};
pub use daily_cap::DailyEntryCounter;
pub use drawdown::PortfolioDrawdownTracker;
pub use ratchet::RatchetState;
pub use sizing::{
    volatility_multiplier, PositionSizer, RollingMedian, VolatilityScaler, VolatilityScaling,
};
