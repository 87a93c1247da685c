//! Look-ahead contamination tests for the scan.
//!
//! Invariant: the decision at bar t depends only on bars 0..=t.
//!
//! Method: scan a full feed, a truncated prefix, and a feed whose tail after
//! bar k was rewritten. Decisions for bars 0..k must be identical in all three.

mod common;

use common::{feed, random_walk, Lcg};
use pathlab_core::domain::Bar;
use pathlab_core::engine::{run_scan, BarDecision, EngineConfig};
use pathlab_core::risk::TakeProfitPolicy;

fn assert_prefix_equal(a: &[BarDecision], b: &[BarDecision], k: usize) {
    for i in 0..k {
        assert_eq!(a[i], b[i], "decision at bar {i} changed when the future changed");
    }
}

/// Scramble every bar from `k` on: new prices, new indicator values.
fn rewrite_tail(bars: &[Bar], k: usize, seed: u64) -> Vec<Bar> {
    let mut rng = Lcg::new(seed);
    let mut out = bars.to_vec();
    for b in out.iter_mut().skip(k) {
        let scale = rng.range(0.8, 1.2);
        b.open *= scale;
        b.high *= scale;
        b.low *= scale;
        b.close *= scale;
        for v in b.indicators.values_mut() {
            if v.is_finite() {
                *v *= rng.range(-2.0, 2.0);
            }
        }
        // Keep the bar sane after rescaling.
        b.high = b.high.max(b.open).max(b.close);
        b.low = b.low.min(b.open).min(b.close);
        if let Some(atr) = b.indicators.get_mut("atr_14") {
            *atr = atr.abs();
        }
    }
    out
}

fn configs() -> Vec<EngineConfig> {
    vec![
        EngineConfig::default(),
        EngineConfig {
            take_profit: TakeProfitPolicy::AtrMultiple { multiplier: 2.0 },
            resize_while_held: true,
            min_cooldown_bars: 2,
            ..EngineConfig::default()
        },
        EngineConfig {
            filters: vec![],
            entry_threshold: 1.0,
            max_hold_bars: 7,
            min_cooldown_bars: 0,
            ..EngineConfig::default()
        },
    ]
}

#[test]
fn truncated_feed_gives_identical_prefix() {
    let bars = random_walk(400, 11);
    for config in configs() {
        let full = run_scan(&feed(bars.clone()), &config).unwrap();
        for k in [50, 137, 250, 399] {
            let truncated = run_scan(&feed(bars[..k].to_vec()), &config).unwrap();
            assert_eq!(truncated.decisions.len(), k);
            assert_prefix_equal(&full.decisions, &truncated.decisions, k);
            for i in 0..k {
                assert_eq!(full.pnl.rows[i], truncated.pnl.rows[i]);
            }
        }
    }
}

#[test]
fn rewritten_tail_gives_identical_prefix() {
    let bars = random_walk(300, 5);
    for config in configs() {
        let full = run_scan(&feed(bars.clone()), &config).unwrap();
        for (k, seed) in [(40, 1), (120, 2), (200, 3)] {
            let altered = rewrite_tail(&bars, k, seed);
            let other = run_scan(&feed(altered), &config).unwrap();
            assert_prefix_equal(&full.decisions, &other.decisions, k);
        }
    }
}

#[test]
fn random_walk_actually_trades() {
    // Guard against a vacuous look-ahead test.
    let bars = random_walk(400, 11);
    let result = run_scan(&feed(bars), &configs()[2]).unwrap();
    assert!(result.ledger.len() > 3, "only {} trades", result.ledger.len());
}

#[test]
fn reruns_are_deterministic() {
    let bars = random_walk(250, 99);
    let config = EngineConfig::default();
    let a = run_scan(&feed(bars.clone()), &config).unwrap();
    let b = run_scan(&feed(bars), &config).unwrap();
    assert_eq!(a.decisions, b.decisions);
    assert_eq!(a.ledger, b.ledger);
    assert_eq!(a.pnl, b.pnl);
}
