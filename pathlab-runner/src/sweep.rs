//! Parameter sweep over a grid of engine settings.
//!
//! Every grid point is an independent run over the same feed, so the sweep
//! fans out with rayon. Results come back in grid order whether the sweep ran
//! in parallel or not.

use pathlab_core::domain::BarFeed;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::config::BacktestConfig;
use crate::metrics::PerformanceMetrics;
use crate::runner::run_backtest;

/// Values to try for each swept parameter.
///
/// Each axis lists the values to try; an empty axis keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParamGrid {
    pub entry_thresholds: Vec<f64>,
    pub exit_thresholds: Vec<f64>,
    pub min_cooldown_bars: Vec<usize>,
    pub max_hold_bars: Vec<usize>,
    pub stop_multipliers: Vec<f64>,
    pub trailing_multipliers: Vec<f64>,
}

/// One grid point: the values it overrode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub entry_threshold: f64,
    pub exit_threshold: f64,
    pub min_cooldown_bars: usize,
    pub max_hold_bars: usize,
    pub stop_multiplier: f64,
    pub trailing_multiplier: f64,
}

fn axis<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

impl ParamGrid {
    /// Number of configurations the grid expands to.
    pub fn size(&self) -> usize {
        [
            self.entry_thresholds.len(),
            self.exit_thresholds.len(),
            self.min_cooldown_bars.len(),
            self.max_hold_bars.len(),
            self.stop_multipliers.len(),
            self.trailing_multipliers.len(),
        ]
        .iter()
        .map(|n| (*n).max(1))
        .product()
    }

    /// Expand the grid around `base`. The last axis varies fastest.
    pub fn points(&self, base: &BacktestConfig) -> Vec<GridPoint> {
        let e = &base.engine;
        let mut points = Vec::with_capacity(self.size());
        for entry in axis(&self.entry_thresholds, e.entry_threshold) {
            for exit in axis(&self.exit_thresholds, e.exit_threshold) {
                for cooldown in axis(&self.min_cooldown_bars, e.min_cooldown_bars) {
                    for max_hold in axis(&self.max_hold_bars, e.max_hold_bars) {
                        for stop in axis(&self.stop_multipliers, e.stop_multiplier) {
                            for trail in axis(&self.trailing_multipliers, e.trailing_multiplier)
                            {
                                points.push(GridPoint {
                                    entry_threshold: entry,
                                    exit_threshold: exit,
                                    min_cooldown_bars: cooldown,
                                    max_hold_bars: max_hold,
                                    stop_multiplier: stop,
                                    trailing_multiplier: trail,
                                });
                            }
                        }
                    }
                }
            }
        }
        points
    }
}

impl GridPoint {
    /// The base configuration with this point's overrides applied.
    pub fn apply(&self, base: &BacktestConfig) -> BacktestConfig {
        let mut config = base.clone();
        config.name = format!(
            "{}[entry={},exit={},cd={},hold={},stop={},trail={}]",
            base.name,
            self.entry_threshold,
            self.exit_threshold,
            self.min_cooldown_bars,
            self.max_hold_bars,
            self.stop_multiplier,
            self.trailing_multiplier
        );
        let e = &mut config.engine;
        e.entry_threshold = self.entry_threshold;
        e.exit_threshold = self.exit_threshold;
        e.min_cooldown_bars = self.min_cooldown_bars;
        e.max_hold_bars = self.max_hold_bars;
        e.stop_multiplier = self.stop_multiplier;
        e.trailing_multiplier = self.trailing_multiplier;
        config
    }
}

/// Outcome of one grid point. A point whose configuration is invalid carries
/// the error instead of failing the whole sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepEntry {
    pub point: GridPoint,
    pub run_id: Option<String>,
    pub metrics: Result<PerformanceMetrics, String>,
}

/// All grid points, in grid order.
#[derive(Debug, Clone, Serialize)]
pub struct SweepResults {
    pub entries: Vec<SweepEntry>,
}

impl SweepResults {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of points that failed to run.
    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.metrics.is_err()).count()
    }
}

/// Parameter sweep executor.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every grid point over `feed`.
    pub fn sweep(&self, grid: &ParamGrid, base: &BacktestConfig, feed: &BarFeed) -> SweepResults {
        let span = info_span!(
            "sweep",
            run_name = %base.name,
            points = grid.size(),
            parallel = self.parallel
        );
        let _guard = span.enter();

        let points = grid.points(base);
        let run = |point: &GridPoint| run_point(point, base, feed);
        let entries: Vec<SweepEntry> = if self.parallel {
            points.par_iter().map(run).collect()
        } else {
            points.iter().map(run).collect()
        };

        let results = SweepResults { entries };
        info!(
            points = results.len(),
            failures = results.failures(),
            "sweep complete"
        );
        results
    }
}

fn run_point(point: &GridPoint, base: &BacktestConfig, feed: &BarFeed) -> SweepEntry {
    match run_backtest(&point.apply(base), feed) {
        Ok(result) => SweepEntry {
            point: *point,
            run_id: Some(result.fingerprint.run_id),
            metrics: Ok(result.metrics),
        },
        Err(err) => SweepEntry {
            point: *point,
            run_id: None,
            metrics: Err(err.to_string()),
        },
    }
}
