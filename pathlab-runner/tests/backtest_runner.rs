//! Integration tests for the runner: TOML in, metrics out, sweeps in parallel.

mod common;

use common::{init_tracing, random_walk_feed, ACTIVE_TOML};
use pathlab_core::engine::run_scan;
use pathlab_runner::config::BacktestConfig;
use pathlab_runner::runner::run_backtest;
use pathlab_runner::sweep::{ParamGrid, ParamSweep};

#[test]
fn toml_config_runs_end_to_end() {
    init_tracing();
    let config = BacktestConfig::from_toml(ACTIVE_TOML).unwrap();
    let feed = random_walk_feed(400, 11);
    let result = run_backtest(&config, &feed).unwrap();

    let m = &result.metrics;
    assert_eq!(result.name, "active");
    assert!(m.total_trades > 3, "only {} trades", m.total_trades);
    assert_eq!(m.total_trades, result.trades.len());
    assert!((0.0..=1.0).contains(&m.win_rate));
    assert!((0.0..=1.0).contains(&m.exposure));
    assert!(m.max_drawdown <= 0.0);
    assert!(m.total_costs >= 0.0);
    assert!((m.net_return - (m.gross_return - m.total_costs)).abs() < 1e-9);
    assert_eq!(m.exit_reasons.values().sum::<usize>(), m.total_trades);
    // close_at_end leaves nothing open.
    assert!(!result.open_at_end);
    assert_eq!(result.decisions.len(), 400);
    assert_eq!(result.pnl.rows.len(), 400);
}

#[test]
fn runner_matches_core_scan() {
    let config = BacktestConfig::from_toml(ACTIVE_TOML).unwrap();
    let feed = random_walk_feed(300, 3);
    let result = run_backtest(&config, &feed).unwrap();
    let scan = run_scan(&feed, &config.engine).unwrap();
    assert_eq!(result.decisions, scan.decisions);
    assert_eq!(result.trades, scan.ledger.trades());
    assert_eq!(result.pnl, scan.pnl);
}

#[test]
fn run_id_is_stable_and_input_sensitive() {
    let config = BacktestConfig::from_toml(ACTIVE_TOML).unwrap();
    let feed = random_walk_feed(200, 5);
    let a = run_backtest(&config, &feed).unwrap();
    let b = run_backtest(&config, &feed).unwrap();
    assert_eq!(a.run_id(), b.run_id());

    let mut other = config.clone();
    other.engine.entry_threshold = 1.2;
    let c = run_backtest(&other, &feed).unwrap();
    assert_ne!(a.run_id(), c.run_id());

    let d = run_backtest(&config, &random_walk_feed(200, 6)).unwrap();
    assert_ne!(a.run_id(), d.run_id());
}

#[test]
fn parallel_sweep_matches_sequential() {
    init_tracing();
    let base = BacktestConfig::from_toml(ACTIVE_TOML).unwrap();
    let feed = random_walk_feed(300, 21);
    let grid = ParamGrid {
        entry_thresholds: vec![0.8, 1.2, 1.6],
        min_cooldown_bars: vec![0, 4],
        stop_multipliers: vec![1.5, 2.5],
        ..ParamGrid::default()
    };

    let parallel = ParamSweep::new().sweep(&grid, &base, &feed);
    let sequential = ParamSweep::new()
        .with_parallelism(false)
        .sweep(&grid, &base, &feed);

    assert_eq!(parallel.len(), 12);
    assert_eq!(parallel.failures(), 0);
    assert_eq!(parallel.entries, sequential.entries);
    // Grid order is preserved.
    assert_eq!(parallel.entries[0].point.entry_threshold, 0.8);
    assert_eq!(parallel.entries[11].point.entry_threshold, 1.6);
}

#[test]
fn invalid_grid_point_is_reported_not_fatal() {
    let base = BacktestConfig::from_toml(ACTIVE_TOML).unwrap();
    let feed = random_walk_feed(100, 2);
    let grid = ParamGrid {
        max_hold_bars: vec![0, 5],
        ..ParamGrid::default()
    };
    let results = ParamSweep::new().sweep(&grid, &base, &feed);
    assert_eq!(results.len(), 2);
    assert_eq!(results.failures(), 1);
    assert!(results.entries[0].metrics.is_err());
    assert!(results.entries[0].run_id.is_none());
    assert!(results.entries[1].metrics.is_ok());
}

#[test]
fn daily_cap_from_toml_limits_trades() {
    let mut config = BacktestConfig::from_toml(ACTIVE_TOML).unwrap();
    let feed = random_walk_feed(400, 11);
    let free = run_backtest(&config, &feed).unwrap();
    assert_eq!(free.capped_entries, 0);

    config.engine.max_trades_per_day = Some(2);
    let capped = run_backtest(&config, &feed).unwrap();
    // 400 one-minute bars fit in one session.
    assert!(capped.metrics.total_trades <= 2);
    assert!(capped.capped_entries > 0);
    assert_ne!(capped.run_id(), free.run_id());
}
