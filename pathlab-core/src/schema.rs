//! Feed schema contract — the fields a configuration needs from the bar feed.
//!
//! Upstream indicator pipelines produce the feed; this module derives the
//! required column set from an [`EngineConfig`] and checks a feed against it
//! before any bar is processed. Every missing field is reported at once.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::BarFeed;
use crate::engine::config::{EngineConfig, ExitRule};
use crate::risk::TakeProfitPolicy;

/// Columns every feed carries.
pub const BASE_FIELDS: &[&str] = &["open", "high", "low", "close", "volume", "log_return"];

/// Result of checking a feed against a configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaValidation {
    pub is_valid: bool,
    /// Required fields absent from at least one bar, sorted.
    pub missing: Vec<String>,
}

/// Every feed field the configuration reads, sorted and de-duplicated.
pub fn required_fields(config: &EngineConfig) -> BTreeSet<String> {
    let mut fields: BTreeSet<String> = BASE_FIELDS.iter().map(|s| s.to_string()).collect();

    fields.insert(config.strength_field.clone());
    // ATR places the stop at entry, so it is needed even with stops disabled.
    fields.insert(config.atr_field.clone());

    for filter in &config.filters {
        fields.extend(filter.required_fields(&config.strength_field));
    }

    if config.volatility_scaling.enabled {
        fields.insert(config.volatility_scaling.field.clone());
    }

    if config.exit_rule_enabled(ExitRule::TakeProfit) {
        if let TakeProfitPolicy::Indicator { field } = &config.take_profit {
            fields.insert(field.clone());
        }
    }

    fields
}

/// Check that every required field is present on every bar.
pub fn validate_feed(feed: &BarFeed, config: &EngineConfig) -> SchemaValidation {
    let present = feed.fields();
    let missing: Vec<String> = required_fields(config)
        .into_iter()
        .filter(|f| !present.contains(f))
        .collect();
    SchemaValidation {
        is_valid: missing.is_empty(),
        missing,
    }
}
