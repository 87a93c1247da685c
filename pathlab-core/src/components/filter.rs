//! Entry filters — tagged predicates that must all hold for a non-flat signal.
//!
//! Each variant is a boolean function of the current bar (momentum
//! acceleration also looks at the previous bar). A filter whose inputs are
//! missing or undefined fails closed, so NaN never takes part in a comparison.

use serde::{Deserialize, Serialize};

use super::signal::SignalDirection;
use crate::domain::Bar;

/// A single entry filter. Filters combine with logical AND; there is no
/// partial credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryFilter {
    /// Long only when `fast > slow`, short only when `fast < slow`.
    Trend { fast: String, slow: String },

    /// Long only when the MACD histogram is positive, short when negative.
    Macd { histogram: String },

    /// `volume / average >= min_ratio` for either direction.
    VolumeConfirmation { average: String, min_ratio: f64 },

    /// Strength must be rising (long) or falling (short) versus the previous bar.
    MomentumAcceleration,

    /// Skip longs at or above `upper` and shorts at or below `lower`.
    RsiExtremity { field: String, upper: f64, lower: f64 },

    /// Trade only in a quiet regime: `short < long` volatility.
    VolatilityRegime { short: String, long: String },
}

/// What a filter may look at.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub bar: &'a Bar,
    pub prev: Option<&'a Bar>,
    /// Indicator key of the signal strength (for momentum acceleration).
    pub strength_field: &'a str,
}

impl EntryFilter {
    pub fn name(&self) -> &'static str {
        match self {
            EntryFilter::Trend { .. } => "trend",
            EntryFilter::Macd { .. } => "macd",
            EntryFilter::VolumeConfirmation { .. } => "volume_confirmation",
            EntryFilter::MomentumAcceleration => "momentum_acceleration",
            EntryFilter::RsiExtremity { .. } => "rsi_extremity",
            EntryFilter::VolatilityRegime { .. } => "volatility_regime",
        }
    }

    /// Feed fields this filter reads.
    pub fn required_fields(&self, strength_field: &str) -> Vec<String> {
        match self {
            EntryFilter::Trend { fast, slow } => vec![fast.clone(), slow.clone()],
            EntryFilter::Macd { histogram } => vec![histogram.clone()],
            EntryFilter::VolumeConfirmation { average, .. } => {
                vec!["volume".to_string(), average.clone()]
            }
            EntryFilter::MomentumAcceleration => vec![strength_field.to_string()],
            EntryFilter::RsiExtremity { field, .. } => vec![field.clone()],
            EntryFilter::VolatilityRegime { short, long } => vec![short.clone(), long.clone()],
        }
    }

    /// Does the filter allow a signal in `direction` on this bar?
    pub fn passes(&self, direction: SignalDirection, ctx: &FilterContext<'_>) -> bool {
        let bar = ctx.bar;
        match self {
            EntryFilter::Trend { fast, slow } => match (bar.indicator(fast), bar.indicator(slow)) {
                (Some(f), Some(s)) => match direction {
                    SignalDirection::Long => f > s,
                    SignalDirection::Short => f < s,
                    SignalDirection::Flat => false,
                },
                _ => false,
            },
            EntryFilter::Macd { histogram } => match bar.indicator(histogram) {
                Some(h) => match direction {
                    SignalDirection::Long => h > 0.0,
                    SignalDirection::Short => h < 0.0,
                    SignalDirection::Flat => false,
                },
                None => false,
            },
            EntryFilter::VolumeConfirmation { average, min_ratio } => {
                match bar.indicator(average) {
                    Some(avg) if avg > 0.0 && bar.volume.is_finite() => {
                        bar.volume / avg >= *min_ratio
                    }
                    _ => false,
                }
            }
            EntryFilter::MomentumAcceleration => {
                let current = bar.indicator(ctx.strength_field);
                let previous = ctx.prev.and_then(|p| p.indicator(ctx.strength_field));
                match (current, previous) {
                    (Some(c), Some(p)) => match direction {
                        SignalDirection::Long => c > p,
                        SignalDirection::Short => c < p,
                        SignalDirection::Flat => false,
                    },
                    _ => false,
                }
            }
            EntryFilter::RsiExtremity {
                field,
                upper,
                lower,
            } => match bar.indicator(field) {
                Some(rsi) => match direction {
                    SignalDirection::Long => rsi < *upper,
                    SignalDirection::Short => rsi > *lower,
                    SignalDirection::Flat => false,
                },
                None => false,
            },
            EntryFilter::VolatilityRegime { short, long } => {
                match (bar.indicator(short), bar.indicator(long)) {
                    (Some(s), Some(l)) => s < l,
                    _ => false,
                }
            }
        }
    }

    pub fn default_trend() -> Self {
        EntryFilter::Trend {
            fast: "ema_12".into(),
            slow: "ema_26".into(),
        }
    }

    pub fn default_rsi() -> Self {
        EntryFilter::RsiExtremity {
            field: "rsi_14".into(),
            upper: 75.0,
            lower: 25.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar() -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        Bar::new(ts, 100.0, 101.0, 99.0, 100.5, 1_200.0, 0.0)
            .with_indicator("ema_12", 101.0)
            .with_indicator("ema_26", 100.0)
            .with_indicator("macd_histogram", 0.4)
            .with_indicator("volume_sma_20", 1_000.0)
            .with_indicator("rsi_14", 80.0)
            .with_indicator("momentum_zscore_20", 2.0)
            .with_indicator("vol_20", 0.01)
            .with_indicator("vol_60", 0.02)
    }

    fn ctx<'a>(bar: &'a Bar, prev: Option<&'a Bar>) -> FilterContext<'a> {
        FilterContext {
            bar,
            prev,
            strength_field: "momentum_zscore_20",
        }
    }

    #[test]
    fn trend_is_direction_aware() {
        let b = bar();
        let f = EntryFilter::default_trend();
        assert!(f.passes(SignalDirection::Long, &ctx(&b, None)));
        assert!(!f.passes(SignalDirection::Short, &ctx(&b, None)));
    }

    #[test]
    fn macd_sign_gates_direction() {
        let b = bar();
        let f = EntryFilter::Macd {
            histogram: "macd_histogram".into(),
        };
        assert!(f.passes(SignalDirection::Long, &ctx(&b, None)));
        assert!(!f.passes(SignalDirection::Short, &ctx(&b, None)));
    }

    #[test]
    fn volume_ratio_threshold() {
        let b = bar();
        let pass = EntryFilter::VolumeConfirmation {
            average: "volume_sma_20".into(),
            min_ratio: 1.1,
        };
        let fail = EntryFilter::VolumeConfirmation {
            average: "volume_sma_20".into(),
            min_ratio: 1.5,
        };
        assert!(pass.passes(SignalDirection::Short, &ctx(&b, None)));
        assert!(!fail.passes(SignalDirection::Long, &ctx(&b, None)));
    }

    #[test]
    fn rsi_blocks_overbought_longs_only() {
        let b = bar();
        let f = EntryFilter::default_rsi();
        assert!(!f.passes(SignalDirection::Long, &ctx(&b, None)));
        assert!(f.passes(SignalDirection::Short, &ctx(&b, None)));
    }

    #[test]
    fn acceleration_needs_previous_bar() {
        let b = bar();
        let prev = bar().with_indicator("momentum_zscore_20", 1.5);
        let f = EntryFilter::MomentumAcceleration;
        assert!(!f.passes(SignalDirection::Long, &ctx(&b, None)));
        assert!(f.passes(SignalDirection::Long, &ctx(&b, Some(&prev))));
        assert!(!f.passes(SignalDirection::Short, &ctx(&b, Some(&prev))));
    }

    #[test]
    fn undefined_inputs_fail_closed() {
        let b = bar().with_indicator("ema_12", f64::NAN);
        assert!(!EntryFilter::default_trend().passes(SignalDirection::Long, &ctx(&b, None)));
    }

    #[test]
    fn volatility_regime_requires_quiet_market() {
        let b = bar();
        let f = EntryFilter::VolatilityRegime {
            short: "vol_20".into(),
            long: "vol_60".into(),
        };
        assert!(f.passes(SignalDirection::Long, &ctx(&b, None)));
        let loud = bar().with_indicator("vol_20", 0.03);
        assert!(!f.passes(SignalDirection::Short, &ctx(&loud, None)));
    }

    #[test]
    fn filter_deserializes_from_tagged_table() {
        let json = r#"{"type":"rsi_extremity","field":"rsi_14","upper":70.0,"lower":30.0}"#;
        let f: EntryFilter = serde_json::from_str(json).unwrap();
        assert_eq!(f.name(), "rsi_extremity");
        assert_eq!(f.required_fields("z"), vec!["rsi_14".to_string()]);
    }
}
