//! TOML-backed backtest configuration.
//!
//! ```toml
//! name = "nifty-1m"
//!
//! [engine]
//! entry_threshold = 1.8
//! trading_mode = "long_short"
//!
//! [report]
//! bars_per_year = 94500.0
//! ```

use std::path::Path;

use pathlab_core::engine::{ConfigError, EngineConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 252 sessions of 375 one-minute bars.
pub const DEFAULT_BARS_PER_YEAR: f64 = 94_500.0;

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// Reporting settings that do not affect the scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Bars in one year, for annualizing the Sharpe ratio.
    pub bars_per_year: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            bars_per_year: DEFAULT_BARS_PER_YEAR,
        }
    }
}

/// Top-level configuration for a single backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_name() -> String {
    "backtest".into()
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            engine: EngineConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl BacktestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, ConfigFileError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        if !(self.report.bars_per_year.is_finite() && self.report.bars_per_year > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "report.bars_per_year",
                value: self.report.bars_per_year,
                expected: "> 0",
            });
        }
        Ok(())
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
