//! Integration tests for the strategy lab
//!
//! These tests verify that all components work together correctly.

use approx::assert_abs_diff_eq;
use std::io::Write;
use std::sync::{Arc, Mutex};

use btc_strategy_lab::config::{GridSettings, SignalSettings, StrategyParams};
use btc_strategy_lab::data;
use btc_strategy_lab::optimizer::{
    best_candidate, sweep_blocking, validate_request, SweepField, SweepRange, SweepState,
};
use btc_strategy_lab::{
    compute_snapshot_for, estimate_performance, simulate_grid, Bar, CandleSeries, Divergence,
    IndicatorPeriods, ParameterSweepOptimizer, StrategyConfig, SweepOutcome, SweepParameter,
    Trend,
};

// =============================================================================
// Test Utilities
// =============================================================================

/// Fixed end time: 2024-06-01 00:00:00 UTC
const END_TIME: i64 = 1_717_200_000;

fn mock(count: usize) -> CandleSeries {
    data::mock_series(count, 70_000.0, END_TIME)
}

fn grid_settings(adaptive: bool) -> GridSettings {
    GridSettings {
        use_atr_adaptive: adaptive,
        atr_distance_multiplier: 1.5,
        ..GridSettings::default()
    }
}

// =============================================================================
// Presets
// =============================================================================

#[test]
fn test_bundled_presets_load() {
    let grid = StrategyConfig::from_file("configs/grid_default.json").unwrap();
    assert_eq!(grid.strategy_name(), "grid");
    assert!(matches!(grid.strategy, StrategyParams::Grid(ref g) if g.use_atr_adaptive));

    let signal = StrategyConfig::from_file("configs/signal_default.json").unwrap();
    assert_eq!(signal.strategy_name(), "signal");
    assert_eq!(signal.strategy, StrategyParams::Signal(SignalSettings::default()));
}

// =============================================================================
// Snapshot -> Grid
// =============================================================================

#[test]
fn test_snapshot_on_mock_series() {
    let series = mock(200);
    assert!(data::validate_series(&series).is_valid());

    let config = StrategyConfig::default();
    let snapshot = compute_snapshot_for(&series, &config).unwrap();

    assert_eq!(snapshot.periods, IndicatorPeriods::from(&config));
    assert_eq!(snapshot.latest_price, series.last().unwrap().close);
    assert!(snapshot.rsi_value.is_some_and(|r| (0.0..=100.0).contains(&r)));
    assert!(snapshot.atr_value.is_some_and(|a| a > 0.0));
    assert!(snapshot.macd.is_some());
    assert!(snapshot.stochastic.is_some());

    let expected_trend = if snapshot.latest_price > snapshot.ma_value {
        Trend::Uptrend
    } else {
        Trend::Downtrend
    };
    assert_eq!(snapshot.trend, expected_trend);
}

#[test]
fn test_snapshot_is_deterministic() {
    let config = StrategyConfig::signal(SignalSettings::default());
    let a = compute_snapshot_for(&mock(120), &config);
    let b = compute_snapshot_for(&mock(120), &config);
    assert_eq!(a, b);
}

#[test]
fn test_adaptive_grid_from_snapshot_atr() {
    let series = mock(200);
    let settings = grid_settings(true);
    let config = StrategyConfig::grid(settings.clone());
    let snapshot = compute_snapshot_for(&series, &config).unwrap();

    let adaptive = settings.adaptive(snapshot.atr_value).unwrap();
    let atr = snapshot.atr_value.unwrap();
    let sim = simulate_grid(snapshot.latest_price, &settings, Some(&adaptive));

    assert_eq!(sim.buy.len(), settings.max_grid_trades);
    assert_eq!(sim.sell.len(), settings.max_grid_trades);
    // First step is ATR * multiplier in price units
    assert_abs_diff_eq!(
        sim.buy.levels[0].entry_price,
        snapshot.latest_price - atr * 1.5,
        epsilon = 1e-6
    );
    assert_abs_diff_eq!(
        sim.sell.levels[0].entry_price,
        snapshot.latest_price + atr * 1.5,
        epsilon = 1e-6
    );
}

#[test]
fn test_fixed_grid_ignores_atr() {
    let settings = grid_settings(false);
    assert!(settings.adaptive(Some(250.0)).is_none());

    let sim = simulate_grid(70_000.0, &settings, None);
    let entries: Vec<f64> = sim.buy.levels.iter().map(|l| l.entry_price).collect();
    for (actual, expected) in entries.iter().zip([69_990.0, 69_980.0, 69_970.0, 69_960.0, 69_950.0]) {
        assert_abs_diff_eq!(*actual, expected, epsilon = 1e-9);
    }
    assert_abs_diff_eq!(sim.buy.levels[2].cumulative_lots, 0.06, epsilon = 1e-12);
}

// =============================================================================
// CSV -> Snapshot
// =============================================================================

#[test]
fn test_csv_to_snapshot() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "time,open,high,low,close").unwrap();
    for bar in mock(80).bars() {
        writeln!(
            file,
            "{},{},{},{},{}",
            bar.time, bar.open, bar.high, bar.low, bar.close
        )
        .unwrap();
    }
    file.flush().unwrap();

    let loaded = data::load_csv(file.path()).unwrap();
    assert_eq!(loaded.len(), 80);

    let config = StrategyConfig::default();
    let from_csv = compute_snapshot_for(&loaded, &config).unwrap();
    let direct = compute_snapshot_for(&mock(80), &config).unwrap();
    assert_abs_diff_eq!(from_csv.ma_value, direct.ma_value, epsilon = 1e-6);
    assert_eq!(from_csv.trend, direct.trend);
}

#[test]
fn test_short_series_gives_no_snapshot() {
    let config = StrategyConfig::default();
    assert!(compute_snapshot_for(&mock(30), &config).is_none());
}

#[test]
fn test_degenerate_bars_do_not_panic() {
    let series = CandleSeries::new(
        (0..60)
            .map(|i| Bar::new(i * 3600, 100.0, 90.0, 110.0, 100.0))
            .collect(),
    );
    assert!(!data::validate_series(&series).is_valid());

    let snapshot = compute_snapshot_for(&series, &StrategyConfig::default()).unwrap();
    assert_eq!(snapshot.trend, Trend::Downtrend);
    assert_eq!(snapshot.rsi_divergence, Divergence::None);
}

// =============================================================================
// Estimates and Sweeps
// =============================================================================

#[test]
fn test_estimate_formats_metrics() {
    let metrics = estimate_performance(&StrategyConfig::default()).metrics();
    assert!(metrics.drawdown_percent.ends_with('%'));
    assert!(metrics.win_rate_percent.ends_with('%'));
    assert_eq!(metrics.profit_factor.split('.').nth(1).map(str::len), Some(2));
    assert_eq!(metrics.sharpe_ratio.split('.').nth(1).map(str::len), Some(2));
}

#[test]
fn test_blocking_sweep_picks_max_sharpe() {
    let config = StrategyConfig::default();
    let range = SweepRange::new(500.0, 3_000.0, 500.0).unwrap();
    let candidates = sweep_blocking(&config, SweepParameter::TakeProfit, &range);

    assert_eq!(candidates.len(), 6);
    let best = best_candidate(&candidates).unwrap();
    assert!(candidates
        .iter()
        .all(|c| c.estimate.sharpe_ratio <= best.estimate.sharpe_ratio));
}

#[test]
fn test_request_validation_collects_field_errors() {
    let config = StrategyConfig::default();
    let errors = validate_request(&config, "rsi_period", "abc", "10", "0").unwrap_err();

    let fields: Vec<SweepField> = errors.iter().map(|e| e.field()).collect();
    assert!(fields.contains(&SweepField::Parameter));
    assert!(fields.contains(&SweepField::Start));
}

#[tokio::test]
async fn test_async_sweep_streams_and_completes() {
    let optimizer = ParameterSweepOptimizer::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let handle = optimizer.run_sweep(
        StrategyConfig::signal(SignalSettings::default()),
        "atr_tp_multiplier",
        "1",
        "4",
        "0.5",
        move |candidates| sink.lock().unwrap().push(candidates.len()),
        |errors| panic!("unexpected errors: {:?}", errors),
    );

    match handle.join().await {
        SweepOutcome::Completed { candidates, best } => {
            assert_eq!(candidates.len(), 7);
            assert!(best.is_some());
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(optimizer.state(), SweepState::Completed);
}

#[tokio::test]
async fn test_async_sweep_rejects_bad_range() {
    let optimizer = ParameterSweepOptimizer::new();
    let mut reported = Vec::new();

    let handle = optimizer.run_sweep(
        StrategyConfig::default(),
        "grid_distance",
        "2000",
        "1000",
        "100",
        |_| panic!("no progress expected"),
        |errors| reported.extend(errors.iter().map(|e| e.field())),
    );

    assert!(matches!(handle.join().await, SweepOutcome::Rejected(_)));
    assert_eq!(reported, vec![SweepField::End]);
    assert_eq!(optimizer.state(), SweepState::Idle);
}
