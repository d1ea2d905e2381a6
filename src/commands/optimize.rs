//! Optimize command implementation with progress tracking

use anyhow::{bail, Result};
use btc_strategy_lab::optimizer::{
    best_candidate, scan_parameters, OptimizationCandidate, ParameterSweepOptimizer,
    SweepOutcome, SweepParameter, SweepRange,
};
use btc_strategy_lab::StrategyConfig;
use indicatif::{ProgressBar, ProgressStyle};
use ordered_float::OrderedFloat;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}] ✓ {msg}")?
            .progress_chars("█░ "),
    );
    Ok(pb)
}

fn print_candidates(parameter: &str, candidates: &[OptimizationCandidate], top: usize) {
    let mut ranked: Vec<&OptimizationCandidate> = candidates.iter().collect();
    // Stable sort keeps sweep order among equal Sharpe ratios
    ranked.sort_by_key(|c| std::cmp::Reverse(OrderedFloat(c.estimate.sharpe_ratio)));

    let display_count = top.min(ranked.len());
    println!("\n{}", "=".repeat(70));
    println!("TOP {} VALUES FOR {} (sorted by sharpe)", display_count, parameter);
    println!("{}", "=".repeat(70));
    println!(
        "{:<4} {:>12} {:>8} {:>8} {:>8} {:>8}",
        "Rank", "Value", "Sharpe", "PF", "MaxDD", "WinR"
    );
    println!("{}", "-".repeat(70));
    for (i, c) in ranked.iter().take(top).enumerate() {
        println!(
            "{:<4} {:>12.4} {:>8} {:>8} {:>8} {:>8}",
            i + 1,
            c.parameter_value,
            c.metrics.sharpe_ratio,
            c.metrics.profit_factor,
            c.metrics.drawdown_percent,
            c.metrics.win_rate_percent
        );
    }
    println!("{}", "=".repeat(70));
}

/// Sweep one parameter with a live progress bar
pub fn run(
    config_path: String,
    parameter: String,
    start: String,
    end: String,
    step: String,
    top: usize,
) -> Result<()> {
    info!("Starting optimization");

    let config = StrategyConfig::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let steps = SweepRange::parse(&start, &end, &step).map_or(0, |range| range.len());
    let pb = progress_bar(steps as u64)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let optimizer = Arc::new(ParameterSweepOptimizer::new());

        // Ctrl-C stops the sweep; finished values are still reported
        let closer = Arc::clone(&optimizer);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                closer.close();
            }
        });

        let progress = pb.clone();

        let handle = optimizer.run_sweep(
            config,
            &parameter,
            &start,
            &end,
            &step,
            move |candidates| {
                progress.set_position(candidates.len() as u64);
                if let Some(best) = best_candidate(candidates) {
                    progress.set_message(format!(
                        "best {} @ {:.4}",
                        best.metrics.sharpe_ratio, best.parameter_value
                    ));
                }
            },
            |errors| {
                for error in errors {
                    eprintln!("  {}: {}", error.field(), error);
                }
            },
        );

        match handle.join().await {
            SweepOutcome::Completed { candidates, best } => {
                pb.finish_with_message("done");
                print_candidates(&parameter, &candidates, top);
                if let Some(best) = best {
                    println!(
                        "Best {} = {:.4} ({})",
                        parameter, best.parameter_value, best.metrics
                    );
                }
                Ok(())
            }
            SweepOutcome::Cancelled { candidates } => {
                pb.abandon_with_message("cancelled");
                warn!("Sweep cancelled after {} values", candidates.len());
                print_candidates(&parameter, &candidates, top);
                Ok(())
            }
            SweepOutcome::Rejected(errors) => {
                pb.finish_and_clear();
                bail!("Sweep request rejected ({} errors)", errors.len())
            }
        }
    })
}

/// Sweep every applicable parameter over its default range
pub fn run_all(config_path: String, top: usize) -> Result<()> {
    info!("Starting full parameter scan");

    let config = StrategyConfig::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let sweeps: Vec<_> = SweepParameter::ALL
        .into_iter()
        .filter(|p| p.applies_to(&config))
        .map(|p| (p, p.default_range()))
        .collect();

    let total: usize = sweeps.iter().map(|(_, range)| range.len()).sum();
    println!("\n{}", "=".repeat(70));
    println!("PARAMETER SCAN SUMMARY");
    println!("{}", "=".repeat(70));
    println!("  Strategy:      {}", config.strategy_name());
    println!("  Parameters:    {}", sweeps.len());
    println!("  Total tests:   {}", total);
    println!("{}\n", "=".repeat(70));

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("scanning");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let scans = scan_parameters(&config, &sweeps);
    spinner.finish_and_clear();

    println!(
        "{:<26} {:>12} {:>12} {:>8} {:>8} {:>8}",
        "Parameter", "Current", "Best", "Sharpe", "PF", "MaxDD"
    );
    println!("{}", "-".repeat(80));
    for scan in &scans {
        let current = scan
            .parameter
            .current_value(&config)
            .map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
        match &scan.best {
            Some(best) => println!(
                "{:<26} {:>12} {:>12.4} {:>8} {:>8} {:>8}",
                scan.parameter.key(),
                current,
                best.parameter_value,
                best.metrics.sharpe_ratio,
                best.metrics.profit_factor,
                best.metrics.drawdown_percent
            ),
            None => println!("{:<26} {:>12} {:>12}", scan.parameter.key(), current, "-"),
        }
    }

    if let Some(scan) = scans
        .iter()
        .filter(|s| s.best.is_some())
        .max_by_key(|s| s.best.as_ref().map(|b| OrderedFloat(b.estimate.sharpe_ratio)))
    {
        print_candidates(scan.parameter.key(), &scan.candidates, top);
    }

    Ok(())
}
