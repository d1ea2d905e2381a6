//! Grid command implementation

use anyhow::{bail, Context, Result};
use btc_strategy_lab::config::StrategyParams;
use btc_strategy_lab::{compute_snapshot_for, simulate_grid, GridLadder, StrategyConfig};
use tracing::{info, warn};

/// Bars loaded when the start price or ATR comes from a series
const GRID_HISTORY_BARS: usize = 200;

fn print_ladder(ladder: &GridLadder) {
    println!("\n{} LADDER", ladder.side);
    println!(
        "{:<6} {:>12} {:>8} {:>10} {:>12}",
        "Level", "Entry", "Lots", "Total", "Avg Price"
    );
    println!("{}", "-".repeat(52));
    for level in &ladder.levels {
        println!(
            "{:<6} {:>12.2} {:>8.2} {:>10.2} {:>12.2}",
            level.index, level.entry_price, level.lot_size, level.cumulative_lots, level.average_price
        );
    }
}

pub fn run(config_path: String, price: Option<f64>, data_path: Option<String>) -> Result<()> {
    info!("Starting grid projection");

    let config = StrategyConfig::from_file(&config_path)?;
    let StrategyParams::Grid(settings) = &config.strategy else {
        bail!(
            "Preset {} is a {} strategy; grid projection needs a grid preset",
            config_path,
            config.strategy_name()
        );
    };

    // Series needed for the latest close or for the adaptive ATR
    let snapshot = if price.is_none() || settings.use_atr_adaptive {
        let series = super::load_series(data_path.as_deref(), GRID_HISTORY_BARS)?;
        compute_snapshot_for(&series, &config)
    } else {
        None
    };

    let start_price = price
        .or_else(|| snapshot.as_ref().map(|s| s.latest_price))
        .context("No start price: pass --price or provide enough bars")?;

    let atr = snapshot.as_ref().and_then(|s| s.atr_value);
    let adaptive = settings.adaptive(atr);
    if settings.use_atr_adaptive && adaptive.is_none() {
        warn!("ATR unavailable, using fixed grid distance");
    }

    let simulation = simulate_grid(start_price, settings, adaptive.as_ref());
    if simulation.is_empty() {
        warn!("Start price {} produced no grid levels", start_price);
    }

    println!("\n{}", "=".repeat(60));
    println!("GRID PROJECTION");
    println!("{}", "=".repeat(60));
    println!("Start Price:        {:.2}", start_price);
    match &adaptive {
        Some(a) => println!(
            "Mode:               ATR adaptive (ATR {:.2}, x{:.2})",
            a.atr, a.distance_multiplier
        ),
        None => println!("Mode:               fixed ({} points)", settings.grid_distance),
    }
    println!("Max Trades:         {}", settings.max_grid_trades);

    print_ladder(&simulation.buy);
    print_ladder(&simulation.sell);

    for ladder in [&simulation.buy, &simulation.sell] {
        if let (Some(avg), Some(deepest)) = (ladder.final_average_price(), ladder.deepest_entry()) {
            println!(
                "{} full ladder: {:.2} lots, break-even {:.2}, deepest entry {:.2}",
                ladder.side,
                ladder.total_lots(),
                avg,
                deepest
            );
        }
    }

    Ok(())
}
