//! PnL accounting — per-bar gross/net log-returns, costs, equity and drawdown.
//!
//! ```text
//! gross_t = signed_size_t × log_return_t          (PnlTiming::SameBar)
//! gross_t = signed_size_{t−1} × log_return_t      (PnlTiming::NextBar)
//! cost_t  = cost_rate × |signed_size_t − signed_size_{t−1}|
//! net_t   = gross_t − cost_t
//! ```
//!
//! `signed_size_t` is the exposure recorded on bar t. Same-bar timing credits
//! it with bar t's own close-to-close return, so an exit bar earns nothing and
//! an entry bar earns its full bar. Next-bar timing credits only the exposure
//! carried in from the previous close.
//!
//! Cumulative series are running sums of log-returns. Drawdown is measured
//! against a running peak that starts at 0.

use serde::{Deserialize, Serialize};

use super::state_machine::BarDecision;
use crate::domain::Bar;

/// Which exposure earns a bar's log-return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PnlTiming {
    /// The exposure recorded on the bar.
    #[default]
    SameBar,
    /// The exposure recorded on the previous bar.
    NextBar,
}

impl PnlTiming {
    pub fn earning_exposure(self, prev_signed: f64, signed: f64) -> f64 {
        match self {
            PnlTiming::SameBar => signed,
            PnlTiming::NextBar => prev_signed,
        }
    }
}

/// Cost of moving from `prev_signed` to `signed` exposure.
pub fn bar_cost(prev_signed: f64, signed: f64, cost_rate: f64) -> f64 {
    cost_rate * (signed - prev_signed).abs()
}

/// Net strategy return of one bar. Shared by the accountant and the live
/// drawdown tracker so both see the same numbers.
pub fn bar_net_return(
    timing: PnlTiming,
    prev_signed: f64,
    signed: f64,
    log_return: f64,
    cost_rate: f64,
) -> f64 {
    timing.earning_exposure(prev_signed, signed) * log_return
        - bar_cost(prev_signed, signed, cost_rate)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnlAccountant {
    cost_rate: f64,
    timing: PnlTiming,
}

impl PnlAccountant {
    pub fn new(cost_rate: f64, timing: PnlTiming) -> Self {
        Self { cost_rate, timing }
    }

    /// Fold the position series over the bars' log-returns.
    pub fn account(&self, decisions: &[BarDecision], bars: &[Bar]) -> PnlSeries {
        let mut rows = Vec::with_capacity(decisions.len());
        let mut prev_signed = 0.0;
        let (mut cum_gross, mut cum_net, mut cum_market, mut total_costs) = (0.0, 0.0, 0.0, 0.0);
        let mut peak: f64 = 0.0;
        let mut max_drawdown: f64 = 0.0;
        let mut max_drawdown_pct: Option<f64> = None;

        for (decision, bar) in decisions.iter().zip(bars) {
            let signed = decision.signed_size();
            let market_return = bar.realized_log_return();
            let gross_return = self.timing.earning_exposure(prev_signed, signed) * market_return;
            let cost = bar_cost(prev_signed, signed, self.cost_rate);
            let net_return = gross_return - cost;

            cum_gross += gross_return;
            cum_net += net_return;
            cum_market += market_return;
            total_costs += cost;

            peak = peak.max(cum_net);
            let drawdown = cum_net - peak;
            max_drawdown = max_drawdown.min(drawdown);

            if peak > 0.0 && drawdown < 0.0 {
                // Log-return drawdown expressed as a fraction of peak equity.
                let pct = drawdown.exp_m1();
                max_drawdown_pct = Some(max_drawdown_pct.map_or(pct, |m: f64| m.min(pct)));
            }

            rows.push(PnlRow {
                signed_size: signed,
                market_return,
                gross_return,
                cost,
                net_return,
                cum_gross,
                cum_net,
                cum_market,
                drawdown,
            });
            prev_signed = signed;
        }

        PnlSeries {
            rows,
            total_gross: cum_gross,
            total_net: cum_net,
            total_costs,
            market_return: cum_market,
            max_drawdown,
            max_drawdown_pct,
        }
    }
}
