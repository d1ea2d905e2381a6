//! Heuristic performance estimates
//!
//! Closed-form scores derived from a strategy configuration alone. These are
//! not backtest results: they rank configurations against each other and must
//! stay bit-for-bit deterministic, since the optimizer calls them for every
//! swept value.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{
    CommonSettings, GridSettings, SignalSettings, StrategyConfig, StrategyParams,
    DEFAULT_ATR_PERIOD, DEFAULT_RSI_PERIOD,
};

/// Stop distance (points) used when a grid has neither a stop loss nor a ladder depth
const FALLBACK_GRID_STOP_POINTS: f64 = 1_000.0;

/// ATR stop multiple used when the configured one is zero
const FALLBACK_ATR_SL_MULTIPLIER: f64 = 1.5;

/// Lot growth cap so long compounding ladders stay finite
const MAX_LOT_GROWTH: f64 = 100.0;

/// Ladder depth beyond which lot growth is no longer tracked
const MAX_COMPOUNDING_STEPS: usize = 64;

pub const WIN_RATE_RANGE: (f64, f64) = (30.0, 85.0);
pub const DRAWDOWN_RANGE: (f64, f64) = (0.0, 95.0);
pub const PROFIT_FACTOR_RANGE: (f64, f64) = (0.2, 5.0);
pub const SHARPE_RANGE: (f64, f64) = (-2.0, 4.0);

/// Raw estimate, before display formatting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEstimate {
    pub profit_factor: f64,
    pub drawdown_percent: f64,
    pub win_rate_percent: f64,
    pub sharpe_ratio: f64,
}

/// Display form: ratios with 2 decimals, percentages with 1 decimal and `%`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub profit_factor: String,
    pub drawdown_percent: String,
    pub win_rate_percent: String,
    pub sharpe_ratio: String,
}

impl From<&PerformanceEstimate> for PerformanceMetrics {
    fn from(estimate: &PerformanceEstimate) -> Self {
        PerformanceMetrics {
            profit_factor: format!("{:.2}", estimate.profit_factor),
            drawdown_percent: format!("{:.1}%", estimate.drawdown_percent),
            win_rate_percent: format!("{:.1}%", estimate.win_rate_percent),
            sharpe_ratio: format!("{:.2}", estimate.sharpe_ratio),
        }
    }
}

impl PerformanceEstimate {
    pub fn metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics::from(self)
    }
}

impl fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PF {} | DD {} | Win {} | Sharpe {}",
            self.profit_factor, self.drawdown_percent, self.win_rate_percent, self.sharpe_ratio
        )
    }
}

/// Clamp into `[lo, hi]`; NaN collapses to `lo`
fn bounded(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

/// Profit factor implied by a win rate and reward/risk ratio
fn implied_profit_factor(win_rate_percent: f64, risk_reward: f64, costs: &CommonSettings) -> f64 {
    let win = win_rate_percent / 100.0;
    let raw = win * risk_reward / (1.0 - win);
    // Commission per lot and slippage (points) shave the edge
    let cost_drag = 1.0 / (1.0 + (costs.commission + costs.slippage * 0.1) / 100.0);
    bounded(raw * cost_drag, PROFIT_FACTOR_RANGE)
}

/// Slower trend filters skip more chop, saturating at a 200-bar average
fn trend_filter_bonus(ma_period: usize, weight: f64) -> f64 {
    (ma_period as f64).min(200.0) / 200.0 * weight
}

fn implied_sharpe(profit_factor: f64, win_rate_percent: f64, drawdown_percent: f64) -> f64 {
    let raw = (profit_factor - 1.0) * 2.0 + (win_rate_percent - 50.0) / 50.0
        - drawdown_percent / 50.0;
    bounded(raw, SHARPE_RANGE)
}

/// Estimate metrics for a configuration
pub fn estimate_performance(config: &StrategyConfig) -> PerformanceEstimate {
    match &config.strategy {
        StrategyParams::Grid(grid) => estimate_grid(grid, &config.common),
        StrategyParams::Signal(signal) => estimate_signal(signal, &config.common),
    }
}

fn estimate_grid(grid: &GridSettings, common: &CommonSettings) -> PerformanceEstimate {
    let trades = grid.max_grid_trades.max(1) as f64;
    let trailing = if grid.use_trailing_stop { 1.0 } else { 0.0 };

    // Without a hard stop, the full ladder depth is the risk
    let stop_points = if grid.stop_loss > 0.0 {
        grid.stop_loss
    } else if grid.grid_distance > 0.0 {
        grid.grid_distance * trades
    } else {
        FALLBACK_GRID_STOP_POINTS
    };
    let risk_reward = grid.take_profit.max(0.0) / stop_points;

    // Exponent bounded so huge trade counts cannot overflow the cast
    let compounding_steps = (grid.max_grid_trades.clamp(1, MAX_COMPOUNDING_STEPS) - 1) as i32;
    let lot_growth = grid
        .grid_lot_multiplier
        .max(0.0)
        .powi(compounding_steps)
        .min(MAX_LOT_GROWTH);
    let exposure = grid.initial_lot * 10_000.0 / common.deposit.max(1.0) * lot_growth * 5.0;

    let win_rate = bounded(
        80.0 - risk_reward * 10.0
            + trades.min(10.0) * 0.6
            + trend_filter_bonus(grid.ma_period, 3.0)
            + trailing * 2.0,
        WIN_RATE_RANGE,
    );
    let drawdown = bounded(
        6.0 + trades * 1.5 * grid.grid_lot_multiplier + (lot_growth - 1.0) * 2.0 + exposure
            - (grid.grid_distance_multiplier - 1.0) * 8.0
            - trailing * 3.0,
        DRAWDOWN_RANGE,
    );
    let profit_factor = implied_profit_factor(win_rate, risk_reward, common);
    let sharpe_ratio = implied_sharpe(profit_factor, win_rate, drawdown);

    PerformanceEstimate {
        profit_factor,
        drawdown_percent: drawdown,
        win_rate_percent: win_rate,
        sharpe_ratio,
    }
}

fn estimate_signal(signal: &SignalSettings, common: &CommonSettings) -> PerformanceEstimate {
    let trailing = if signal.use_trailing_stop { 1.0 } else { 0.0 };

    let sl_multiplier = if signal.atr_sl_multiplier > 0.0 {
        signal.atr_sl_multiplier
    } else {
        FALLBACK_ATR_SL_MULTIPLIER
    };
    let risk_reward = signal.atr_tp_multiplier.max(0.0) / sl_multiplier;
    let rsi_band = (signal.rsi_overbought - signal.rsi_oversold).clamp(0.0, 100.0);
    let exposure = signal.lot_size * 10_000.0 / common.deposit.max(1.0) * 8.0;

    let rsi_detune = (signal.rsi_period as f64 - DEFAULT_RSI_PERIOD as f64).abs() * 0.25;
    let atr_noise = (DEFAULT_ATR_PERIOD as f64 - signal.atr_period as f64).max(0.0) * 0.2;

    let win_rate = bounded(
        60.0 - (risk_reward - 1.0) * 12.0 + (rsi_band - 40.0) * 0.1
            + trend_filter_bonus(signal.ma_period, 4.0)
            - rsi_detune
            + trailing * 3.0,
        WIN_RATE_RANGE,
    );
    let drawdown = bounded(
        4.0 + exposure + sl_multiplier * 3.0 + atr_noise - trailing * 1.5,
        DRAWDOWN_RANGE,
    );
    let profit_factor = implied_profit_factor(win_rate, risk_reward, common);
    let sharpe_ratio = implied_sharpe(profit_factor, win_rate, drawdown);

    PerformanceEstimate {
        profit_factor,
        drawdown_percent: drawdown,
        win_rate_percent: win_rate,
        sharpe_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_estimate_is_deterministic() {
        for config in [
            StrategyConfig::default(),
            StrategyConfig::signal(SignalSettings::default()),
        ] {
            let first = estimate_performance(&config).metrics();
            let second = estimate_performance(&config).metrics();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_default_grid_estimate() {
        let estimate = estimate_performance(&StrategyConfig::default());

        // stop = 1000 * 5, rr = 0.3, win = 80 - 3 + 3 + 50/200 * 3
        assert_abs_diff_eq!(estimate.win_rate_percent, 80.75, epsilon = 1e-9);

        let lot_growth = 1.5f64.powi(4);
        let drawdown = 6.0 + 5.0 * 1.5 * 1.5 + (lot_growth - 1.0) * 2.0 + 0.01 * lot_growth * 5.0;
        assert_abs_diff_eq!(estimate.drawdown_percent, drawdown, epsilon = 1e-9);

        let pf = 0.8075 * 0.3 / 0.1925 / 1.1;
        assert_abs_diff_eq!(estimate.profit_factor, pf, epsilon = 1e-9);

        let sharpe = (pf - 1.0) * 2.0 + 30.75 / 50.0 - drawdown / 50.0;
        assert_abs_diff_eq!(estimate.sharpe_ratio, sharpe, epsilon = 1e-9);
    }

    #[test]
    fn test_default_signal_estimate() {
        let estimate = estimate_performance(&StrategyConfig::signal(SignalSettings::default()));

        // rr = 2, band = 40, MA 50 -> +1, trailing on
        assert_abs_diff_eq!(estimate.win_rate_percent, 52.0, epsilon = 1e-9);
        assert_abs_diff_eq!(estimate.drawdown_percent, 4.0 + 0.4 + 4.5 - 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(
            estimate.profit_factor,
            0.52 * 2.0 / 0.48 / 1.1,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_periods_move_the_estimate() {
        let base = estimate_performance(&StrategyConfig::signal(SignalSettings::default()));

        let mut detuned = SignalSettings::default();
        detuned.rsi_period = 30;
        let estimate = estimate_performance(&StrategyConfig::signal(detuned));
        assert!(estimate.win_rate_percent < base.win_rate_percent);

        let mut fast_atr = SignalSettings::default();
        fast_atr.atr_period = 4;
        let estimate = estimate_performance(&StrategyConfig::signal(fast_atr));
        assert_abs_diff_eq!(
            estimate.drawdown_percent,
            base.drawdown_percent + 2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_metrics_formatting() {
        let estimate = PerformanceEstimate {
            profit_factor: 1.856,
            drawdown_percent: 12.44,
            win_rate_percent: 63.0,
            sharpe_ratio: -0.5,
        };
        let metrics = estimate.metrics();

        assert_eq!(metrics.profit_factor, "1.86");
        assert_eq!(metrics.drawdown_percent, "12.4%");
        assert_eq!(metrics.win_rate_percent, "63.0%");
        assert_eq!(metrics.sharpe_ratio, "-0.50");
    }

    #[test]
    fn test_zero_divisors_use_defaults() {
        let mut signal = SignalSettings::default();
        signal.atr_sl_multiplier = 0.0;
        let estimate = estimate_performance(&StrategyConfig::signal(signal));
        assert!(estimate.profit_factor.is_finite());
        assert!(estimate.sharpe_ratio.is_finite());

        let mut grid = GridSettings::default();
        grid.grid_distance = 0.0;
        grid.stop_loss = 0.0;
        let estimate = estimate_performance(&StrategyConfig::grid(grid));
        assert!(estimate.profit_factor.is_finite());
    }

    #[test]
    fn test_outputs_are_clamped() {
        let mut grid = GridSettings::default();
        grid.max_grid_trades = 40;
        grid.grid_lot_multiplier = 3.0;
        grid.take_profit = 100_000.0;
        let estimate = estimate_performance(&StrategyConfig::grid(grid));

        assert!(estimate.drawdown_percent <= DRAWDOWN_RANGE.1);
        assert!(estimate.win_rate_percent >= WIN_RATE_RANGE.0);
        assert!(estimate.profit_factor <= PROFIT_FACTOR_RANGE.1);
        assert!(estimate.sharpe_ratio >= SHARPE_RANGE.0);
        assert!(estimate.sharpe_ratio <= SHARPE_RANGE.1);
    }

    #[test]
    fn test_huge_ladder_depth_stays_bounded() {
        for trades in [1usize << 31, (1usize << 31) + 7, usize::MAX] {
            let mut grid = GridSettings::default();
            grid.max_grid_trades = trades;
            let estimate = estimate_performance(&StrategyConfig::grid(grid));

            assert!(estimate.profit_factor.is_finite());
            assert_abs_diff_eq!(estimate.drawdown_percent, DRAWDOWN_RANGE.1);
            assert!(estimate.sharpe_ratio >= SHARPE_RANGE.0);
        }
    }
}
