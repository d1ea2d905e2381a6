//! Command implementations

pub mod analyze;
pub mod estimate;
pub mod grid;
pub mod optimize;

use anyhow::Result;
use btc_strategy_lab::{data, CandleSeries};
use chrono::Utc;
use tracing::{info, warn};

/// Start price of the mock series when no CSV is given
const MOCK_START_PRICE: f64 = 70_000.0;

/// Load `bars` trailing bars from a CSV file, or generate a mock series
pub fn load_series(data_path: Option<&str>, bars: usize) -> Result<CandleSeries> {
    let series = match data_path {
        Some(path) => {
            let series = data::load_csv(path)?;
            CandleSeries::new(series.tail(bars).to_vec())
        }
        None => {
            info!("No data file given, using {} mock bars", bars);
            data::mock_series(bars, MOCK_START_PRICE, Utc::now().timestamp())
        }
    };

    let validation = data::validate_series(&series);
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    for error in &validation.errors {
        warn!("{}", error);
    }

    Ok(series)
}
