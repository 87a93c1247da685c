//! Portfolio drawdown tracker — the circuit breaker's view of the equity path.

use serde::Serialize;

/// Running cumulative net log-return and its high-water mark.
///
/// The peak starts at 0, so a strategy that only loses is in drawdown from
/// its first losing bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioDrawdownTracker {
    cumulative_return: f64,
    peak_cumulative_return: f64,
}

impl PortfolioDrawdownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accrue one bar's net strategy return. Non-finite returns count as 0.
    pub fn record(&mut self, net_return: f64) {
        if net_return.is_finite() {
            self.cumulative_return += net_return;
        }
        self.peak_cumulative_return = self.peak_cumulative_return.max(self.cumulative_return);
    }

    pub fn cumulative_return(&self) -> f64 {
        self.cumulative_return
    }

    pub fn peak_cumulative_return(&self) -> f64 {
        self.peak_cumulative_return
    }

    /// `peak − cumulative`, never negative.
    pub fn current_drawdown(&self) -> f64 {
        (self.peak_cumulative_return - self.cumulative_return).max(0.0)
    }
}
