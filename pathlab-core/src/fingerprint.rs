//! Run fingerprinting — deterministic identification of a scan's inputs.
//!
//! - `ConfigHash`: BLAKE3 of the configuration's canonical JSON.
//! - `DatasetHash`: BLAKE3 over every bar's timestamp, OHLCV bits and
//!   indicator values (sorted by key).
//! - `RunFingerprint`: both hashes plus the run ID they combine into.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{BarFeed, ConfigHash, DatasetHash, RunId};
use crate::engine::EngineConfig;

/// Hash of the configuration's JSON. Field order is fixed by the struct, so
/// the serialization is canonical.
pub fn config_hash(config: &EngineConfig) -> Result<ConfigHash, serde_json::Error> {
    let json = serde_json::to_vec(config)?;
    Ok(ConfigHash::from_bytes(&json))
}

/// Hash of the bar feed. Floats are hashed by bit pattern so undefined
/// (NaN) indicator values contribute deterministically.
pub fn dataset_hash(feed: &BarFeed) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for bar in feed.bars() {
        hasher.update(bar.timestamp.to_string().as_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close, bar.volume, bar.log_return] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
        for (name, value) in &bar.indicators {
            hasher.update(name.as_bytes());
            hasher.update(&value.to_bits().to_le_bytes());
        }
        hasher.update(b"\n");
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

/// Complete fingerprint of a single scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    // ── Identity ──
    pub run_id: String,

    // ── Inputs ──
    pub bar_count: usize,
    pub first_timestamp: NaiveDateTime,
    pub last_timestamp: NaiveDateTime,

    // ── Derived hashes ──
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
}

impl RunFingerprint {
    pub fn new(config: &EngineConfig, feed: &BarFeed) -> Result<Self, serde_json::Error> {
        let config_hash = config_hash(config)?;
        let dataset_hash = dataset_hash(feed);
        let run_id = RunId::new(config_hash.clone(), dataset_hash.clone()).hash();
        let bars = feed.bars();
        // BarFeed is never empty, but fall back to the epoch rather than panic.
        let first_timestamp = bars.first().map(|b| b.timestamp).unwrap_or_default();
        let last_timestamp = bars.last().map(|b| b.timestamp).unwrap_or_default();
        Ok(Self {
            run_id,
            bar_count: bars.len(),
            first_timestamp,
            last_timestamp,
            config_hash,
            dataset_hash,
        })
    }
}
