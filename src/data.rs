//! Data loading and management
//!
//! Loads hourly bars from CSV files, generates the deterministic mock series
//! used when no feed is available, and checks a series for consistency.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::Path;
use tracing::{info, warn};

use crate::types::{Bar, CandleSeries, BAR_INTERVAL_SECS};

// =============================================================================
// CSV Data Loading
// =============================================================================

/// Parse a timestamp column: unix seconds, RFC 3339, or `%Y-%m-%d %H:%M:%S` (UTC)
fn parse_time(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return Ok(secs);
    }

    value
        .parse::<DateTime<Utc>>()
        .map(|dt| dt.timestamp())
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc().timestamp())
        })
        .with_context(|| format!("Failed to parse time: {}", value))
}

fn parse_price(record: &csv::StringRecord, column: usize, name: &str) -> Result<f64> {
    record
        .get(column)
        .with_context(|| format!("Missing {} column", name))?
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}", name))
}

/// Load hourly bars from a `time,open,high,low,close` CSV file with a header row
pub fn load_csv(path: impl AsRef<Path>) -> Result<CandleSeries> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let mut bars = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let time = parse_time(record.get(0).context("Missing time column")?)
            .with_context(|| format!("Row {}", row_idx + 1))?;
        let open = parse_price(&record, 1, "open")?;
        let high = parse_price(&record, 2, "high")?;
        let low = parse_price(&record, 3, "low")?;
        let close = parse_price(&record, 4, "close")?;

        bars.push(Bar::new(time, open, high, low, close));
    }

    info!("Loaded {} bars from {}", bars.len(), path.display());
    Ok(CandleSeries::new(bars))
}

// =============================================================================
// Mock Feed
// =============================================================================

/// Generate a deterministic hourly series ending at `end_time`
///
/// `end_time` is floored to the hour. Prices follow two overlapping waves
/// around `start_price` with a slow upward drift, so the same arguments always
/// produce the same bars.
pub fn mock_series(count: usize, start_price: f64, end_time: i64) -> CandleSeries {
    let last_time = end_time - end_time.rem_euclid(BAR_INTERVAL_SECS);
    let first_time = last_time - (count as i64 - 1).max(0) * BAR_INTERVAL_SECS;

    let price_at = |i: f64| {
        let wave = 0.03 * (i / 24.0).sin() + 0.012 * (i / 5.0).sin();
        start_price * (1.0 + wave + 0.0002 * i)
    };

    let bars = (0..count)
        .map(|i| {
            let open = price_at(i as f64);
            let close = price_at(i as f64 + 1.0);
            let wick = start_price * (0.002 + 0.001 * ((i as f64) * 1.7).sin().abs());
            Bar::new(
                first_time + i as i64 * BAR_INTERVAL_SECS,
                open,
                open.max(close) + wick,
                open.min(close) - wick,
                close,
            )
        })
        .collect();

    CandleSeries::new(bars)
}

// =============================================================================
// Data Validation
// =============================================================================

/// Check a series for consistency
///
/// Broken OHLC envelopes and non-increasing timestamps are errors; gaps other
/// than one hour are warnings. Nothing is rejected here.
pub fn validate_series(series: &CandleSeries) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if series.is_empty() {
        errors.push("No bars provided".to_string());
        return ValidationResult { errors, warnings };
    }

    let bars = series.bars();
    for (i, bar) in bars.iter().enumerate() {
        if let Err(e) = bar.validate() {
            errors.push(format!("Bar {}: {}", i, e));
        }

        if i > 0 {
            let spacing = bar.time - bars[i - 1].time;
            if spacing <= 0 {
                errors.push(format!("Bar {}: time not increasing ({}s)", i, spacing));
            } else if spacing != BAR_INTERVAL_SECS {
                warnings.push(format!(
                    "Bar {}: spacing {}s, expected {}s",
                    i, spacing, BAR_INTERVAL_SECS
                ));
            }
        }
    }

    if !errors.is_empty() {
        warn!("Series has {} validation errors", errors.len());
    }

    ValidationResult { errors, warnings }
}

/// Result of data validation
#[derive(Debug)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv_mixed_time_formats() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,open,high,low,close").unwrap();
        writeln!(file, "1704067200,42000,42100,41900,42050").unwrap();
        writeln!(file, "2024-01-01T01:00:00Z,42050,42200,42000,42150").unwrap();
        writeln!(file, "2024-01-01 02:00:00,42150,42300,42100,42250").unwrap();
        file.flush().unwrap();

        let series = load_csv(file.path()).unwrap();
        assert_eq!(series.len(), 3);
        let times: Vec<i64> = series.bars().iter().map(|b| b.time).collect();
        assert_eq!(times, vec![1_704_067_200, 1_704_070_800, 1_704_074_400]);
        assert_eq!(series.last().unwrap().close, 42_250.0);
        assert!(validate_series(&series).is_valid());
    }

    #[test]
    fn test_load_csv_bad_price() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,open,high,low,close").unwrap();
        writeln!(file, "1704067200,42000,abc,41900,42050").unwrap();
        file.flush().unwrap();

        let err = load_csv(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("high"));
    }

    #[test]
    fn test_load_csv_missing_file() {
        assert!(load_csv("does/not/exist.csv").is_err());
    }

    #[test]
    fn test_mock_series_is_deterministic_and_hourly() {
        let a = mock_series(200, 70_000.0, 1_704_070_799);
        let b = mock_series(200, 70_000.0, 1_704_070_799);
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);

        // Floored to the hour
        assert_eq!(a.last().unwrap().time, 1_704_067_200);

        let result = validate_series(&a);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_mock_series_empty() {
        assert!(mock_series(0, 70_000.0, 0).is_empty());
    }

    #[test]
    fn test_validate_reports_errors_and_warnings() {
        let series = CandleSeries::new(vec![
            Bar::new(0, 100.0, 105.0, 95.0, 102.0),
            Bar::new(7200, 102.0, 101.0, 103.0, 102.0),
            Bar::new(7200, 102.0, 104.0, 101.0, 103.0),
        ]);
        let result = validate_series(&series);

        assert!(!result.is_valid());
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_validate_empty_series() {
        assert!(!validate_series(&CandleSeries::default()).is_valid());
    }
}
