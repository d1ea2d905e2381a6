//! BTC strategy lab - main entry point
//!
//! This binary provides four subcommands:
//! - analyze: Indicator snapshot for a candle series
//! - grid: Project buy/sell grid ladders
//! - estimate: Heuristic performance metrics for a preset
//! - optimize: Sweep one (or every) parameter of a preset

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "btc-strategy-lab")]
#[command(about = "Indicator snapshots, grid ladders and parameter sweeps for BTC EA presets", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the indicator snapshot for a candle series
    Analyze {
        /// Path to strategy preset
        #[arg(short, long, default_value = "configs/grid_default.json")]
        config: String,

        /// CSV file with time,open,high,low,close rows (mock series when omitted)
        #[arg(short, long)]
        data: Option<String>,

        /// Number of trailing bars to analyze
        #[arg(short, long, default_value = "200")]
        bars: usize,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Project the buy and sell grid ladders
    Grid {
        /// Path to grid preset
        #[arg(short, long, default_value = "configs/grid_default.json")]
        config: String,

        /// Start price (defaults to the latest close)
        #[arg(short, long)]
        price: Option<f64>,

        /// CSV file with time,open,high,low,close rows (mock series when omitted)
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Estimate performance metrics for a preset
    Estimate {
        /// Path to strategy preset
        #[arg(short, long, default_value = "configs/grid_default.json")]
        config: String,
    },

    /// Sweep one parameter across a range
    Optimize {
        /// Path to base preset
        #[arg(short, long, default_value = "configs/grid_default.json")]
        config: String,

        /// Parameter key, e.g. "grid_distance" or "rsi_period"
        #[arg(short, long, required_unless_present = "all")]
        param: Option<String>,

        /// Range start
        #[arg(long, default_value = "")]
        start: String,

        /// Range end
        #[arg(long, default_value = "")]
        end: String,

        /// Range step
        #[arg(long, default_value = "")]
        step: String,

        /// Sweep every applicable parameter over its default range
        #[arg(long, conflicts_with = "param")]
        all: bool,

        /// Number of candidates to show per table
        #[arg(short, long, default_value = "10")]
        top: usize,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // File appender
    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Sweeps draw a progress bar; keep the console free of log lines
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        // Same format as the console, without ANSI colors
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
    }
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    // RUST_LOG may come from .env
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Analyze { .. } => ("analyze", false),
        Commands::Grid { .. } => ("grid", false),
        Commands::Estimate { .. } => ("estimate", false),
        Commands::Optimize { .. } => ("optimize", true),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Analyze {
            config,
            data,
            bars,
            json,
        } => commands::analyze::run(config, data, bars, json),

        Commands::Grid {
            config,
            price,
            data,
        } => commands::grid::run(config, price, data),

        Commands::Estimate { config } => commands::estimate::run(config),

        Commands::Optimize {
            config,
            param,
            start,
            end,
            step,
            all,
            top,
        } => {
            if all {
                commands::optimize::run_all(config, top)
            } else {
                commands::optimize::run(config, param.unwrap_or_default(), start, end, step, top)
            }
        }
    }
}
