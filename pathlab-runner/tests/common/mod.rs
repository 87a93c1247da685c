#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use pathlab_core::domain::{Bar, BarFeed};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic random-walk feed carrying every field the default engine
/// configuration reads.
pub fn random_walk_feed(n: usize, seed: u64) -> BarFeed {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap();
    let mut state = seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
    let mut next = move |lo: f64, hi: f64| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        lo + (hi - lo) * ((state >> 11) as f64 / (1u64 << 53) as f64)
    };

    let mut bars = Vec::with_capacity(n);
    let mut close: f64 = 100.0;
    let mut z: f64 = 0.0;
    let (mut ema_12, mut ema_26) = (close, close);
    for i in 0..n {
        let prev_close = close;
        let open = close * (1.0 + next(-0.002, 0.002));
        close = (close * (1.0 + next(-0.01, 0.01))).max(5.0);
        let high = open.max(close) * (1.0 + next(0.0, 0.004));
        let low = open.min(close) * (1.0 - next(0.0, 0.004));
        ema_12 += (close - ema_12) * 2.0 / 13.0;
        ema_26 += (close - ema_26) * 2.0 / 27.0;
        z = 0.7 * z + next(-1.5, 1.5);
        let log_return = if i == 0 { f64::NAN } else { (close / prev_close).ln() };

        bars.push(
            Bar::new(
                start + Duration::minutes(i as i64),
                open,
                high,
                low,
                close,
                next(500.0, 1500.0),
                log_return,
            )
            .with_indicator("momentum_zscore_20", z * 1.5)
            .with_indicator("atr_14", close * next(0.003, 0.01))
            .with_indicator("ema_12", ema_12)
            .with_indicator("ema_26", ema_26)
            .with_indicator("rsi_14", next(20.0, 80.0))
            .with_indicator("vol_20", next(0.004, 0.02)),
        );
    }
    BarFeed::new(bars).unwrap()
}

/// A TOML configuration that trades often on the random walk.
pub const ACTIVE_TOML: &str = r#"
name = "active"

[engine]
entry_threshold = 1.0
max_hold_bars = 7
min_cooldown_bars = 0
filters = []
close_at_end = true

[engine.volatility_scaling]
enabled = false

[report]
bars_per_year = 252.0
"#;
