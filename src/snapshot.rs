//! Indicator snapshot assembly
//!
//! Bundles the latest reading of every indicator for one candle series. The
//! moving average is mandatory; every other reading is present only when the
//! series is long enough for it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{IndicatorPeriods, StrategyConfig};
use crate::indicators::{
    self, MacdValue, StochasticValue, DIVERGENCE_LOOKBACK, STOCHASTIC_D_PERIOD, STOCHASTIC_PERIOD,
};
use crate::types::{CandleSeries, Divergence, Trend};

/// Latest indicator readings for a candle series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub latest_price: f64,
    pub ma_value: f64,
    pub trend: Trend,
    pub rsi_value: Option<f64>,
    pub atr_value: Option<f64>,
    pub macd: Option<MacdValue>,
    pub stochastic: Option<StochasticValue>,
    pub rsi_divergence: Divergence,
    pub periods: IndicatorPeriods,
}

/// Compute a snapshot with explicit periods
///
/// Returns `None` when the series is too short for the moving average.
pub fn compute_snapshot(
    series: &CandleSeries,
    periods: &IndicatorPeriods,
) -> Option<IndicatorSnapshot> {
    let latest_price = series.last()?.close;
    let closes = series.closes();
    let bars = series.bars();

    let Some(ma_value) = indicators::moving_average(&closes, periods.ma, periods.ma_type) else {
        debug!(
            bars = series.len(),
            ma_period = periods.ma,
            "Series too short for moving average"
        );
        return None;
    };

    let rsi_series = indicators::rsi(&closes, periods.rsi);
    let rsi_value = rsi_series.last().copied().flatten();

    let snapshot = IndicatorSnapshot {
        latest_price,
        ma_value,
        trend: Trend::from_price(latest_price, ma_value),
        rsi_value,
        atr_value: indicators::atr_last(bars, periods.atr),
        macd: indicators::macd(&closes),
        stochastic: indicators::stochastic(bars, STOCHASTIC_PERIOD, STOCHASTIC_D_PERIOD),
        rsi_divergence: indicators::rsi_divergence(bars, &rsi_series, DIVERGENCE_LOOKBACK),
        periods: *periods,
    };

    debug!(
        latest_price,
        ma_value,
        trend = ?snapshot.trend,
        rsi = ?snapshot.rsi_value,
        atr = ?snapshot.atr_value,
        divergence = ?snapshot.rsi_divergence,
        "Computed indicator snapshot"
    );

    Some(snapshot)
}

/// Compute a snapshot with the periods a strategy configuration implies
pub fn compute_snapshot_for(
    series: &CandleSeries,
    config: &StrategyConfig,
) -> Option<IndicatorSnapshot> {
    compute_snapshot(series, &IndicatorPeriods::from(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GridSettings, SignalSettings};
    use crate::types::{Bar, MaType};
    use approx::assert_abs_diff_eq;

    fn rising_series(count: usize) -> CandleSeries {
        (0..count)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar::new(i as i64 * 3600, close - 0.5, close + 1.0, close - 1.0, close)
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn periods(ma: usize) -> IndicatorPeriods {
        IndicatorPeriods {
            ma,
            ma_type: MaType::Sma,
            rsi: 14,
            atr: 14,
        }
    }

    #[test]
    fn test_short_series_has_no_snapshot() {
        assert!(compute_snapshot(&rising_series(49), &periods(50)).is_none());
        assert!(compute_snapshot(&CandleSeries::default(), &periods(1)).is_none());
    }

    #[test]
    fn test_partial_snapshot() {
        // Enough for a 5-bar MA, not for RSI/ATR/MACD/Stochastic
        let snapshot = compute_snapshot(&rising_series(10), &periods(5)).unwrap();

        assert_abs_diff_eq!(snapshot.latest_price, 109.0);
        assert_abs_diff_eq!(snapshot.ma_value, 107.0);
        assert_eq!(snapshot.trend, Trend::Uptrend);
        assert!(snapshot.rsi_value.is_none());
        assert!(snapshot.atr_value.is_none());
        assert!(snapshot.macd.is_none());
        assert!(snapshot.stochastic.is_none());
        assert_eq!(snapshot.rsi_divergence, Divergence::None);
    }

    #[test]
    fn test_full_snapshot() {
        let snapshot = compute_snapshot(&rising_series(60), &periods(50)).unwrap();

        // Monotonic gains only
        assert_abs_diff_eq!(snapshot.rsi_value.unwrap(), 100.0);
        // Every true range is max(2, |h - prev close| = 2) = 2
        assert_abs_diff_eq!(snapshot.atr_value.unwrap(), 2.0, epsilon = 1e-9);
        assert!(snapshot.macd.unwrap().macd_line > 0.0);
        let stoch = snapshot.stochastic.unwrap();
        assert!(stoch.k > 50.0 && stoch.k <= 100.0);
        assert_eq!(snapshot.periods, periods(50));
    }

    #[test]
    fn test_flat_series_trends_down() {
        let series: CandleSeries = (0..20)
            .map(|i| Bar::new(i * 3600, 100.0, 100.0, 100.0, 100.0))
            .collect::<Vec<_>>()
            .into();
        let snapshot = compute_snapshot(&series, &periods(10)).unwrap();

        // Price equal to MA counts as downtrend
        assert_eq!(snapshot.trend, Trend::Downtrend);
        assert_abs_diff_eq!(snapshot.stochastic.unwrap().k, 0.0);
    }

    #[test]
    fn test_periods_follow_strategy() {
        let series = rising_series(80);

        let grid = StrategyConfig::grid(GridSettings {
            ma_period: 20,
            atr_period: 7,
            ..GridSettings::default()
        });
        let snapshot = compute_snapshot_for(&series, &grid).unwrap();
        assert_eq!(snapshot.periods.ma, 20);
        assert_eq!(snapshot.periods.atr, 7);
        assert_eq!(snapshot.periods.rsi, 14);

        let signal = StrategyConfig::signal(SignalSettings {
            rsi_period: 9,
            ..SignalSettings::default()
        });
        let snapshot = compute_snapshot_for(&series, &signal).unwrap();
        assert_eq!(snapshot.periods.rsi, 9);
        assert_eq!(snapshot.periods.ma_type, MaType::Ema);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = compute_snapshot(&rising_series(10), &periods(5)).unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["trend"], "Uptrend");
        assert!(json["rsi_value"].is_null());
        assert_eq!(json["periods"]["ma_type"], "SMA");
    }
}
