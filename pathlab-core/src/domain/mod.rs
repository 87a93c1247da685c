//! Domain types for PathLab

pub mod bar;
pub mod ids;
pub mod position;
pub mod trade;

pub use bar::{Bar, BarError, BarFeed};
pub use ids::{ConfigHash, DatasetHash, RunId};
pub use position::{EntryPlan, PositionSide, PositionState};
pub use trade::{round_trip_return, ExitReason, TradeRecord};
