//! Estimate command implementation

use anyhow::Result;
use btc_strategy_lab::{estimate_performance, StrategyConfig};
use tracing::info;

pub fn run(config_path: String) -> Result<()> {
    let config = StrategyConfig::from_file(&config_path)?;
    info!(
        "Estimating {} preset from: {}",
        config.strategy_name(),
        config_path
    );

    let metrics = estimate_performance(&config).metrics();
    info!("{}", metrics);

    println!("\n{}", "=".repeat(60));
    println!("ESTIMATED PERFORMANCE ({})", config.strategy_name());
    println!("{}", "=".repeat(60));
    println!("Profit Factor:      {}", metrics.profit_factor);
    println!("Max Drawdown:       {}", metrics.drawdown_percent);
    println!("Win Rate:           {}", metrics.win_rate_percent);
    println!("Sharpe Ratio:       {}", metrics.sharpe_ratio);
    println!("{}", "=".repeat(60));
    println!("Heuristic scores from the preset alone, not a backtest.");

    Ok(())
}
