//! BTC Strategy Lab
//!
//! Indicator, grid-ladder and performance-estimate engine for hourly BTC
//! expert-advisor strategies, with a single-parameter sweep optimizer.

pub mod config;
pub mod data;
pub mod grid;
pub mod indicators;
pub mod optimizer;
pub mod performance;
pub mod snapshot;
pub mod types;

pub use config::{IndicatorPeriods, StrategyConfig};
pub use grid::{simulate_grid, AdaptiveGrid, GridLadder, GridLevel, GridSimulation};
pub use optimizer::{ParameterSweepOptimizer, SweepError, SweepOutcome, SweepParameter};
pub use performance::{estimate_performance, PerformanceEstimate, PerformanceMetrics};
pub use snapshot::{compute_snapshot, compute_snapshot_for, IndicatorSnapshot};
pub use types::*;
