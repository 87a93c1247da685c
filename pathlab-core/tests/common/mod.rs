#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use pathlab_core::domain::{Bar, BarFeed};
use pathlab_core::engine::EngineConfig;
use pathlab_core::risk::VolatilityScaling;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once; `RUST_LOG=pathlab_core=debug` shows
/// entries and exits.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap()
        + Duration::minutes(i as i64)
}

/// A bar with a half-point range around `close`, open at `close`.
pub fn bar(i: usize, close: f64, z: f64, atr: f64) -> Bar {
    Bar::new(ts(i), close, close + 0.5, close - 0.5, close, 1_000.0, f64::NAN)
        .with_indicator("momentum_zscore_20", z)
        .with_indicator("atr_14", atr)
}

/// Fill in `log_return` from consecutive closes and wrap in a feed.
pub fn feed(mut bars: Vec<Bar>) -> BarFeed {
    for i in 1..bars.len() {
        bars[i].log_return = (bars[i].close / bars[i - 1].close).ln();
    }
    BarFeed::new(bars).unwrap()
}

/// Only the strength and ATR fields, no filters, no volatility scaling, no costs.
pub fn lean_config() -> EngineConfig {
    EngineConfig {
        filters: vec![],
        volatility_scaling: VolatilityScaling {
            enabled: false,
            ..VolatilityScaling::default()
        },
        cost_rate: 0.0,
        ..EngineConfig::default()
    }
}

/// Deterministic LCG in [0, 1).
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493))
    }

    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Random-walk bars carrying every field the default configuration reads.
///
/// The z-score is a smoothed random series so it crosses the entry band
/// regularly; EMAs are real EMAs of the closes.
pub fn random_walk(n: usize, seed: u64) -> Vec<Bar> {
    let mut rng = Lcg::new(seed);
    let mut bars = Vec::with_capacity(n);
    let mut close: f64 = 100.0;
    let mut z: f64 = 0.0;
    let (mut ema_12, mut ema_26) = (close, close);

    for i in 0..n {
        let open = close * (1.0 + rng.range(-0.002, 0.002));
        close = (close * (1.0 + rng.range(-0.01, 0.01))).max(5.0);
        let high = open.max(close) * (1.0 + rng.range(0.0, 0.004));
        let low = open.min(close) * (1.0 - rng.range(0.0, 0.004));
        ema_12 += (close - ema_12) * 2.0 / 13.0;
        ema_26 += (close - ema_26) * 2.0 / 27.0;
        z = 0.7 * z + rng.range(-1.5, 1.5);

        let warm = i >= 3;
        let volume = rng.range(500.0, 1500.0);
        let atr = if warm {
            close * rng.range(0.003, 0.01)
        } else {
            f64::NAN
        };
        bars.push(
            Bar::new(ts(i), open, high, low, close, volume, f64::NAN)
                .with_indicator("momentum_zscore_20", if warm { z * 1.5 } else { f64::NAN })
                .with_indicator("atr_14", atr)
                .with_indicator("ema_12", ema_12)
                .with_indicator("ema_26", ema_26)
                .with_indicator("rsi_14", rng.range(20.0, 80.0))
                .with_indicator("vol_20", rng.range(0.004, 0.02)),
        );
    }
    bars
}
