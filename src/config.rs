//! Strategy configuration
//!
//! Presets are JSON files describing either a grid or a signal strategy plus
//! the settings every expert advisor shares. The engine only ever reads them.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::grid::AdaptiveGrid;
use crate::types::MaType;

/// Default RSI period when the strategy does not configure one
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Default ATR period when the strategy does not configure one
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// Deepest grid ladder a preset may request
pub const MAX_GRID_TRADES: usize = 100;

/// Structurally impossible presets
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),

    #[error("{field} must be at most {max} (got {value})")]
    TooLarge {
        field: &'static str,
        value: usize,
        max: usize,
    },

    #[error("backtest end {end} is before start {start}")]
    InvertedBacktestRange { start: NaiveDate, end: NaiveDate },

    #[error("rsi_oversold ({oversold}) must be below rsi_overbought ({overbought})")]
    InvertedRsiLevels { oversold: f64, overbought: f64 },
}

/// Full strategy configuration (one EA preset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub common: CommonSettings,
    pub strategy: StrategyParams,
}

impl StrategyConfig {
    /// Load a preset from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: StrategyConfig =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn grid(settings: GridSettings) -> Self {
        Self {
            common: CommonSettings::default(),
            strategy: StrategyParams::Grid(settings),
        }
    }

    pub fn signal(settings: SignalSettings) -> Self {
        Self {
            common: CommonSettings::default(),
            strategy: StrategyParams::Signal(settings),
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        match self.strategy {
            StrategyParams::Grid(_) => "grid",
            StrategyParams::Signal(_) => "signal",
        }
    }

    pub fn ma_type(&self) -> MaType {
        match &self.strategy {
            StrategyParams::Grid(g) => g.ma_type,
            StrategyParams::Signal(s) => s.ma_type,
        }
    }

    pub fn ma_period(&self) -> usize {
        match &self.strategy {
            StrategyParams::Grid(g) => g.ma_period,
            StrategyParams::Signal(s) => s.ma_period,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.common.validate()?;
        match &self.strategy {
            StrategyParams::Grid(g) => g.validate(),
            StrategyParams::Signal(s) => s.validate(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::grid(GridSettings::default())
    }
}

/// Strategy-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyParams {
    Grid(GridSettings),
    Signal(SignalSettings),
}

/// Settings shared by every EA regardless of strategy type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonSettings {
    pub magic_number: u64,
    /// Maximum spread (points) at which the EA still opens trades
    pub max_spread: f64,
    pub backtest_start: NaiveDate,
    pub backtest_end: NaiveDate,
    /// Account deposit in account currency
    pub deposit: f64,
    /// Round-turn commission per lot
    pub commission: f64,
    /// Assumed slippage in points
    pub slippage: f64,
}

impl Default for CommonSettings {
    fn default() -> Self {
        CommonSettings {
            magic_number: 123_456,
            max_spread: 5_000.0,
            backtest_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            backtest_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            deposit: 10_000.0,
            commission: 7.0,
            slippage: 30.0,
        }
    }
}

impl CommonSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.deposit <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "deposit",
                value: self.deposit,
            });
        }
        if self.backtest_end < self.backtest_start {
            return Err(ConfigError::InvertedBacktestRange {
                start: self.backtest_start,
                end: self.backtest_end,
            });
        }
        Ok(())
    }
}

/// Grid (averaging) strategy parameters. Distances are in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub initial_lot: f64,
    pub grid_distance: f64,
    pub grid_distance_multiplier: f64,
    pub grid_lot_multiplier: f64,
    pub max_grid_trades: usize,
    pub ma_type: MaType,
    pub ma_period: usize,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub use_trailing_stop: bool,
    pub trailing_start: f64,
    pub trailing_step: f64,
    pub use_atr_adaptive: bool,
    pub atr_period: usize,
    pub atr_distance_multiplier: f64,
    pub lot_sensitivity: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        GridSettings {
            initial_lot: 0.01,
            grid_distance: 1_000.0,
            grid_distance_multiplier: 1.0,
            grid_lot_multiplier: 1.5,
            max_grid_trades: 5,
            ma_type: MaType::Sma,
            ma_period: 50,
            take_profit: 1_500.0,
            stop_loss: 0.0,
            use_trailing_stop: false,
            trailing_start: 1_000.0,
            trailing_step: 500.0,
            use_atr_adaptive: false,
            atr_period: DEFAULT_ATR_PERIOD,
            atr_distance_multiplier: 1.0,
            lot_sensitivity: 0.0,
        }
    }
}

impl GridSettings {
    /// Adaptive parameters for the ladder simulator, present only when the
    /// preset enables ATR adaptation and an ATR reading exists
    pub fn adaptive(&self, atr: Option<f64>) -> Option<AdaptiveGrid> {
        if !self.use_atr_adaptive {
            return None;
        }
        atr.map(|atr| AdaptiveGrid {
            atr,
            distance_multiplier: self.atr_distance_multiplier,
            lot_sensitivity: self.lot_sensitivity,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive("initial_lot", self.initial_lot)?;
        positive("grid_distance", self.grid_distance)?;
        positive("grid_lot_multiplier", self.grid_lot_multiplier)?;
        positive("grid_distance_multiplier", self.grid_distance_multiplier)?;
        nonzero("max_grid_trades", self.max_grid_trades)?;
        if self.max_grid_trades > MAX_GRID_TRADES {
            return Err(ConfigError::TooLarge {
                field: "max_grid_trades",
                value: self.max_grid_trades,
                max: MAX_GRID_TRADES,
            });
        }
        nonzero("ma_period", self.ma_period)?;
        nonzero("atr_period", self.atr_period)?;
        Ok(())
    }
}

/// Signal (single-entry) strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSettings {
    pub lot_size: f64,
    pub ma_type: MaType,
    pub ma_period: usize,
    pub atr_period: usize,
    pub atr_sl_multiplier: f64,
    pub atr_tp_multiplier: f64,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub use_trailing_stop: bool,
    pub trailing_start: f64,
    pub trailing_step: f64,
}

impl Default for SignalSettings {
    fn default() -> Self {
        SignalSettings {
            lot_size: 0.05,
            ma_type: MaType::Ema,
            ma_period: 50,
            atr_period: DEFAULT_ATR_PERIOD,
            atr_sl_multiplier: 1.5,
            atr_tp_multiplier: 3.0,
            rsi_period: DEFAULT_RSI_PERIOD,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            use_trailing_stop: true,
            trailing_start: 1_000.0,
            trailing_step: 500.0,
        }
    }
}

impl SignalSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("lot_size", self.lot_size)?;
        nonzero("ma_period", self.ma_period)?;
        nonzero("atr_period", self.atr_period)?;
        nonzero("rsi_period", self.rsi_period)?;
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(ConfigError::InvertedRsiLevels {
                oversold: self.rsi_oversold,
                overbought: self.rsi_overbought,
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::ZeroCount(field))
    } else {
        Ok(())
    }
}

/// Indicator periods used to build a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorPeriods {
    pub ma: usize,
    pub ma_type: MaType,
    pub rsi: usize,
    pub atr: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        IndicatorPeriods {
            ma: 50,
            ma_type: MaType::Sma,
            rsi: DEFAULT_RSI_PERIOD,
            atr: DEFAULT_ATR_PERIOD,
        }
    }
}

impl From<&StrategyConfig> for IndicatorPeriods {
    fn from(config: &StrategyConfig) -> Self {
        match &config.strategy {
            StrategyParams::Grid(g) => IndicatorPeriods {
                ma: g.ma_period,
                ma_type: g.ma_type,
                rsi: DEFAULT_RSI_PERIOD,
                atr: g.atr_period,
            },
            StrategyParams::Signal(s) => IndicatorPeriods {
                ma: s.ma_period,
                ma_type: s.ma_type,
                rsi: s.rsi_period,
                atr: s.atr_period,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_presets_are_valid() {
        assert!(StrategyConfig::default().validate().is_ok());
        assert!(StrategyConfig::signal(SignalSettings::default())
            .validate()
            .is_ok());
    }

    #[test]
    fn test_parse_tagged_strategy() {
        let json = r#"{
            "strategy": { "type": "signal", "lot_size": 0.1, "rsi_period": 9 }
        }"#;
        let config: StrategyConfig = serde_json::from_str(json).unwrap();
        match &config.strategy {
            StrategyParams::Signal(s) => {
                assert_eq!(s.lot_size, 0.1);
                assert_eq!(s.rsi_period, 9);
                assert_eq!(s.atr_period, DEFAULT_ATR_PERIOD);
            }
            other => panic!("expected signal strategy, got {:?}", other),
        }
        assert_eq!(config.common, CommonSettings::default());
        assert_eq!(config.strategy_name(), "signal");
    }

    #[test]
    fn test_validation_errors() {
        let mut grid = GridSettings::default();
        grid.max_grid_trades = 0;
        assert_eq!(
            StrategyConfig::grid(grid).validate(),
            Err(ConfigError::ZeroCount("max_grid_trades"))
        );

        let mut signal = SignalSettings::default();
        signal.rsi_oversold = 80.0;
        assert!(matches!(
            StrategyConfig::signal(signal).validate(),
            Err(ConfigError::InvertedRsiLevels { .. })
        ));

        let mut config = StrategyConfig::default();
        config.common.backtest_end = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedBacktestRange { .. })
        ));
    }

    #[test]
    fn test_ladder_depth_upper_bound() {
        let json = r#"{ "strategy": { "type": "grid", "max_grid_trades": 1000000000000000000 } }"#;
        let config: StrategyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooLarge {
                field: "max_grid_trades",
                value: 1_000_000_000_000_000_000,
                max: MAX_GRID_TRADES,
            })
        );

        let mut grid = GridSettings::default();
        grid.max_grid_trades = MAX_GRID_TRADES;
        assert!(StrategyConfig::grid(grid).validate().is_ok());
    }

    #[test]
    fn test_indicator_periods_from_config() {
        let periods = IndicatorPeriods::from(&StrategyConfig::default());
        assert_eq!(periods.ma, 50);
        assert_eq!(periods.rsi, DEFAULT_RSI_PERIOD);

        let mut signal = SignalSettings::default();
        signal.rsi_period = 7;
        let periods = IndicatorPeriods::from(&StrategyConfig::signal(signal));
        assert_eq!(periods.rsi, 7);
        assert_eq!(periods.ma_type, MaType::Ema);
    }

    #[test]
    fn test_adaptive_requires_flag_and_atr() {
        let mut grid = GridSettings::default();
        assert!(grid.adaptive(Some(500.0)).is_none());

        grid.use_atr_adaptive = true;
        assert!(grid.adaptive(None).is_none());
        let adaptive = grid.adaptive(Some(500.0)).unwrap();
        assert_eq!(adaptive.atr, 500.0);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let config = StrategyConfig::default();
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = StrategyConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
