//! Analyze command implementation

use anyhow::Result;
use btc_strategy_lab::{compute_snapshot_for, IndicatorSnapshot, StrategyConfig};
use tracing::{info, warn};

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

fn print_snapshot(snapshot: &IndicatorSnapshot) {
    let periods = &snapshot.periods;
    let row = |label: String, value: String| println!("{:<20}{}", label, value);

    println!("\n{}", "=".repeat(60));
    println!("INDICATOR SNAPSHOT");
    println!("{}", "=".repeat(60));
    row("Latest Price:".into(), format!("{:.2}", snapshot.latest_price));
    row(
        format!("{} ({}):", periods.ma_type, periods.ma),
        format!("{:.2}", snapshot.ma_value),
    );
    row("Trend:".into(), format!("{:?}", snapshot.trend));
    row(format!("RSI ({}):", periods.rsi), fmt_opt(snapshot.rsi_value));
    row(format!("ATR ({}):", periods.atr), fmt_opt(snapshot.atr_value));
    row(
        "MACD (12,26,9):".into(),
        snapshot.macd.map_or_else(
            || "n/a".to_string(),
            |m| format!("{:.2} / {:.2} / {:.2}", m.macd_line, m.signal_line, m.histogram),
        ),
    );
    row(
        "Stochastic (14,3):".into(),
        snapshot.stochastic.map_or_else(
            || "n/a".to_string(),
            |s| format!("%K {:.2} / %D {:.2}", s.k, s.d),
        ),
    );
    row("RSI Divergence:".into(), format!("{:?}", snapshot.rsi_divergence));
    println!("{}", "=".repeat(60));
}

pub fn run(config_path: String, data_path: Option<String>, bars: usize, json: bool) -> Result<()> {
    info!("Starting analysis");

    let config = StrategyConfig::from_file(&config_path)?;
    info!(
        "Loaded {} preset from: {}",
        config.strategy_name(),
        config_path
    );

    let series = super::load_series(data_path.as_deref(), bars)?;

    let Some(snapshot) = compute_snapshot_for(&series, &config) else {
        warn!(
            "Not enough bars for the {}-period moving average ({} available)",
            config.ma_period(),
            series.len()
        );
        println!(
            "Not enough data: {} bars, {} required",
            series.len(),
            config.ma_period()
        );
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }

    Ok(())
}
