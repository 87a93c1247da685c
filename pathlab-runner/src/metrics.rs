//! Performance metrics — pure functions that compute summary statistics.
//!
//! Every metric is a pure function over the per-bar net returns or the trade
//! list. No dependency on the runner or on engine internals beyond the scan
//! output types.

use std::collections::BTreeMap;

use pathlab_core::domain::{ExitReason, TradeRecord};
use pathlab_core::engine::ScanResult;
use serde::{Deserialize, Serialize};

/// Cap for the profit factor when there are winners and no losers.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Aggregate performance metrics for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // ── Trades ──
    pub total_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub avg_duration_bars: f64,
    pub exit_reasons: BTreeMap<ExitReason, usize>,

    // ── Returns (cumulative log) ──
    pub gross_return: f64,
    pub net_return: f64,
    pub market_return: f64,
    pub total_costs: f64,

    // ── Risk ──
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub max_drawdown_pct: Option<f64>,
    pub calmar: f64,
    /// Fraction of bars with a non-zero position.
    pub exposure: f64,
}

impl PerformanceMetrics {
    /// Compute every metric from one scan.
    pub fn compute(scan: &ScanResult, bars_per_year: f64) -> Self {
        let trades = scan.ledger.trades();
        let net: Vec<f64> = scan.pnl.net_returns().collect();
        let pnl = &scan.pnl;
        Self {
            total_trades: trades.len(),
            win_rate: win_rate(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            profit_factor: profit_factor(trades),
            avg_duration_bars: avg_duration(trades),
            exit_reasons: scan.ledger.exit_reason_counts(),
            gross_return: pnl.total_gross,
            net_return: pnl.total_net,
            market_return: pnl.market_return,
            total_costs: pnl.total_costs,
            sharpe: sharpe_ratio(&net, bars_per_year),
            max_drawdown: pnl.max_drawdown,
            max_drawdown_pct: pnl.max_drawdown_pct,
            calmar: calmar_ratio(pnl.total_net, pnl.max_drawdown),
            exposure: exposure(scan.decisions.iter().map(|d| d.size)),
        }
    }
}

// ─── Return-series metrics ──────────────────────────────────────────

/// Annualized Sharpe ratio of per-bar returns, risk-free rate zero.
///
/// Sharpe = mean / std × sqrt(bars_per_year), with the population standard
/// deviation. Returns 0.0 for fewer than 2 bars or zero variance.
pub fn sharpe_ratio(returns: &[f64], bars_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(returns);
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean / std * bars_per_year.sqrt()
}

/// Net return over the magnitude of the worst drawdown. 0.0 when the run
/// never went under water.
pub fn calmar_ratio(net_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown.abs() < 1e-15 {
        return 0.0;
    }
    net_return / max_drawdown.abs()
}

/// Fraction of bars holding a position.
pub fn exposure(sizes: impl Iterator<Item = f64>) -> f64 {
    let (held, total) = sizes.fold((0usize, 0usize), |(held, total), size| {
        (held + usize::from(size > 0.0), total + 1)
    });
    if total == 0 {
        return 0.0;
    }
    held as f64 / total as f64
}

// ─── Trade metrics ──────────────────────────────────────────────────

/// Fraction of trades with a positive realized return.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Mean size-weighted return of winning trades; 0.0 with no winners.
pub fn avg_win(trades: &[TradeRecord]) -> f64 {
    let wins: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_winner())
        .map(TradeRecord::sized_return)
        .collect();
    mean_f64(&wins)
}

/// Mean size-weighted return of losing trades (≤ 0); 0.0 with no losers.
pub fn avg_loss(trades: &[TradeRecord]) -> f64 {
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| t.realized_return < 0.0)
        .map(TradeRecord::sized_return)
        .collect();
    mean_f64(&losses)
}

/// Gross profit / gross loss over size-weighted trade returns.
///
/// Returns [`PROFIT_FACTOR_CAP`] when there are profits but no losses, and
/// 0.0 when there are no profits.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let (profit, loss) = trades.iter().fold((0.0, 0.0), |(p, l), t| {
        let r = t.sized_return();
        if r > 0.0 {
            (p + r, l)
        } else {
            (p, l - r)
        }
    });
    if profit <= 0.0 {
        return 0.0;
    }
    if loss <= 0.0 {
        return PROFIT_FACTOR_CAP;
    }
    (profit / loss).min(PROFIT_FACTOR_CAP)
}

/// Mean holding time in bars.
pub fn avg_duration(trades: &[TradeRecord]) -> f64 {
    let durations: Vec<f64> = trades.iter().map(|t| t.duration_bars as f64).collect();
    mean_f64(&durations)
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
