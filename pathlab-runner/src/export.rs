//! Reporting and export — JSON and CSV artifact generation.
//!
//! - **JSON**: the full `BacktestResult`
//! - **CSV**: the per-bar position/PnL series and the trade ledger
//!
//! `save_artifacts` writes all three into one directory per run.

use std::fs;
use std::path::{Path, PathBuf};

use pathlab_core::domain::TradeRecord;
use thiserror::Error;
use tracing::info;

use crate::runner::BacktestResult;

/// Errors while producing artifacts.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV writer: {0}")]
    Flush(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))?;
    String::from_utf8(data).map_err(|e| ExportError::Flush(e.to_string()))
}

/// Export the per-bar series: decision fields joined with the PnL row.
///
/// Columns: index, timestamp, side, size, signed_size, stop_loss,
/// trailing_stop, take_profit, exit_reason, cooldown_remaining, strength,
/// gross_return, cost, net_return, cum_net, cum_market, drawdown
pub fn export_series_csv(result: &BacktestResult) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "index",
        "timestamp",
        "side",
        "size",
        "signed_size",
        "stop_loss",
        "trailing_stop",
        "take_profit",
        "exit_reason",
        "cooldown_remaining",
        "strength",
        "gross_return",
        "cost",
        "net_return",
        "cum_net",
        "cum_market",
        "drawdown",
    ])?;

    for (d, row) in result.decisions.iter().zip(&result.pnl.rows) {
        wtr.write_record([
            d.index.to_string(),
            d.timestamp.to_string(),
            d.side.as_i8().to_string(),
            format!("{:.6}", d.size),
            format!("{:.6}", row.signed_size),
            opt(d.stop_loss_price),
            opt(d.trailing_stop_price),
            opt(d.take_profit_price),
            d.exit_reason.map(|r| r.as_str().to_string()).unwrap_or_default(),
            d.cooldown_remaining.to_string(),
            opt(Some(d.strength).filter(|s| s.is_finite())),
            format!("{:.8}", row.gross_return),
            format!("{:.8}", row.cost),
            format!("{:.8}", row.net_return),
            format!("{:.8}", row.cum_net),
            format!("{:.8}", row.cum_market),
            format!("{:.8}", row.drawdown),
        ])?;
    }
    finish(wtr)
}

/// Export a trade ledger as CSV.
///
/// Columns: side, entry_index, entry_time, entry_price, exit_index,
/// exit_time, exit_price, exit_reason, size, realized_return, duration_bars
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "entry_index",
        "entry_time",
        "entry_price",
        "exit_index",
        "exit_time",
        "exit_price",
        "exit_reason",
        "size",
        "realized_return",
        "duration_bars",
    ])?;
    for t in trades {
        wtr.write_record([
            t.side.as_i8().to_string(),
            t.entry_index.to_string(),
            t.entry_time.to_string(),
            format!("{:.6}", t.entry_price),
            t.exit_index.to_string(),
            t.exit_time.to_string(),
            format!("{:.6}", t.exit_price),
            t.exit_reason.as_str().to_string(),
            format!("{:.6}", t.size),
            format!("{:.8}", t.realized_return),
            t.duration_bars.to_string(),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single run.
///
/// Creates `{output_dir}/{run_id}/` containing `result.json`, `series.csv`
/// and `trades.csv`. Returns the directory path.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf, ExportError> {
    let dir = output_dir.join(result.run_id());
    fs::create_dir_all(&dir).map_err(|source| ExportError::Io {
        path: dir.clone(),
        source,
    })?;

    let files = [
        ("result.json", export_json(result)?),
        ("series.csv", export_series_csv(result)?),
        ("trades.csv", export_trades_csv(&result.trades)?),
    ];
    for (name, contents) in files {
        let path = dir.join(name);
        fs::write(&path, contents).map_err(|source| ExportError::Io { path, source })?;
    }

    info!(dir = %dir.display(), trades = result.trades.len(), "artifacts saved");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pathlab_core::domain::{ExitReason, PositionSide};

    #[test]
    fn trades_csv_has_header_and_rows() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        let trades = vec![TradeRecord {
            side: PositionSide::Short,
            entry_index: 3,
            entry_time: t,
            entry_price: 100.0,
            exit_index: 7,
            exit_time: t + chrono::Duration::minutes(4),
            exit_price: 98.0,
            exit_reason: ExitReason::TrailingStop,
            size: 0.5,
            realized_return: (100.0f64 / 98.0).ln(),
            duration_bars: 4,
        }];
        let csv = export_trades_csv(&trades).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("side,entry_index,entry_time"));
        assert!(lines[1].starts_with("-1,3,2024-01-02 09:15:00,100.000000,7,"));
        assert!(lines[1].contains(",trailing_stop,"));
    }

    #[test]
    fn empty_trades_csv_is_header_only() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
