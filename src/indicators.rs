//! Technical indicators
//!
//! Pure functions over close prices or bars. Series outputs are index-aligned
//! with their input and hold `None` until the warm-up window is filled, so a
//! short history yields "no value" rather than a misleading zero.
//!
//! Available indicators:
//! - Moving averages: SMA, EMA
//! - Momentum: RSI (Wilder), MACD, Stochastic %K/%D
//! - Volatility: True Range, ATR (Wilder)
//! - Patterns: local extrema, RSI divergence

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::types::{Bar, Divergence, MaType};

pub const MACD_FAST_PERIOD: usize = 12;
pub const MACD_SLOW_PERIOD: usize = 26;
pub const MACD_SIGNAL_PERIOD: usize = 9;
pub const STOCHASTIC_PERIOD: usize = 14;
pub const STOCHASTIC_D_PERIOD: usize = 3;
pub const DIVERGENCE_LOOKBACK: usize = 40;

// =============================================================================
// Moving Averages
// =============================================================================

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if period == 0 || i + 1 < period {
            result.push(None);
        } else {
            let sum: f64 = values[i + 1 - period..=i].iter().sum();
            result.push(Some(sum / period as f64));
        }
    }

    result
}

/// Mean of the trailing `period` values
pub fn sma_last(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: f64 = values[values.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average, seeded with the SMA of the first `period` values
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    if period == 0 || values.len() < period {
        result.resize(values.len(), None);
        return result;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;

    result.resize(period - 1, None);
    result.push(Some(seed));

    let mut prev_ema = seed;
    for &value in &values[period..] {
        prev_ema = (value - prev_ema) * multiplier + prev_ema;
        result.push(Some(prev_ema));
    }

    result
}

/// Latest EMA value
pub fn ema_last(values: &[f64], period: usize) -> Option<f64> {
    ema(values, period).last().copied().flatten()
}

/// Latest value of the configured moving average
pub fn moving_average(values: &[f64], period: usize, ma_type: MaType) -> Option<f64> {
    match ma_type {
        MaType::Sma => sma_last(values, period),
        MaType::Ema => ema_last(values, period),
    }
}

/// Apply Wilder's smoothing to a series
///
/// The first value is the mean of the first `period` inputs, then
/// `smoothed = (prev * (period - 1) + current) / period`.
fn wilders_smooth(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    if period == 0 || values.len() < period {
        result.resize(values.len(), None);
        return result;
    }

    let mut smoothed = values[..period].iter().sum::<f64>() / period as f64;
    result.resize(period - 1, None);
    result.push(Some(smoothed));

    for &value in &values[period..] {
        smoothed = (smoothed * (period - 1) as f64 + value) / period as f64;
        result.push(Some(smoothed));
    }

    result
}

// =============================================================================
// Momentum Indicators
// =============================================================================

/// Calculate RSI (Relative Strength Index) with Wilder's smoothing
///
/// The first value sits at index `period` (it needs `period` price changes).
/// A zero average loss reads as RSI 100.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() <= period {
        return vec![None; values.len()];
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = values
        .iter()
        .tuple_windows()
        .map(|(prev, curr)| {
            let change = curr - prev;
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let avg_gains = wilders_smooth(&gains, period);
    let avg_losses = wilders_smooth(&losses, period);

    let mut rsi_values = Vec::with_capacity(values.len());
    rsi_values.push(None);

    for (avg_gain, avg_loss) in avg_gains.into_iter().zip(avg_losses) {
        let value = match (avg_gain, avg_loss) {
            (Some(_), Some(loss)) if loss == 0.0 => Some(100.0),
            (Some(gain), Some(loss)) => Some(100.0 - 100.0 / (1.0 + gain / loss)),
            _ => None,
        };
        rsi_values.push(value);
    }

    rsi_values
}

/// Latest RSI value
pub fn rsi_last(values: &[f64], period: usize) -> Option<f64> {
    rsi(values, period).last().copied().flatten()
}

/// MACD line, signal line and histogram at one bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
}

/// Index-aligned MACD lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdSeries {
    pub macd_line: Vec<Option<f64>>,
    pub signal_line: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// Calculate MACD series
///
/// The fast EMA starts earlier than the slow one; the MACD line exists only on
/// their common trailing suffix. The signal line is an EMA over that suffix.
pub fn macd_series(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> MacdSeries {
    let fast = ema(values, fast_period);
    let slow = ema(values, slow_period);

    let macd_line: Vec<Option<f64>> = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let offset = macd_line
        .iter()
        .position(Option::is_some)
        .unwrap_or(macd_line.len());
    let compact: Vec<f64> = macd_line[offset..].iter().flatten().copied().collect();

    let mut signal_line = vec![None; offset];
    signal_line.extend(ema(&compact, signal_period));

    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    MacdSeries {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Latest standard MACD (12, 26, 9); needs at least 35 closes
pub fn macd(values: &[f64]) -> Option<MacdValue> {
    if values.len() < MACD_SLOW_PERIOD + MACD_SIGNAL_PERIOD {
        return None;
    }

    let series = macd_series(
        values,
        MACD_FAST_PERIOD,
        MACD_SLOW_PERIOD,
        MACD_SIGNAL_PERIOD,
    );
    let macd_line = series.macd_line.last().copied().flatten()?;
    let signal_line = series.signal_line.last().copied().flatten()?;

    Some(MacdValue {
        macd_line,
        signal_line,
        histogram: macd_line - signal_line,
    })
}

/// Stochastic oscillator reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticValue {
    pub k: f64,
    pub d: f64,
}

/// Calculate Stochastic %K over a trailing `period` window
///
/// A flat window (highest high == lowest low) uses a divisor of 1, so %K
/// reads 0 instead of NaN.
pub fn stochastic_k(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(bars.len());

    for i in 0..bars.len() {
        if period == 0 || i + 1 < period {
            result.push(None);
            continue;
        }

        let window = &bars[i + 1 - period..=i];
        let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let range = highest - lowest;
        let divisor = if range > 0.0 { range } else { 1.0 };

        result.push(Some(100.0 * (bars[i].close - lowest) / divisor));
    }

    result
}

/// Latest Stochastic %K and %D (SMA of the last `d_period` %K values)
pub fn stochastic(bars: &[Bar], period: usize, d_period: usize) -> Option<StochasticValue> {
    if period == 0 || d_period == 0 || bars.len() < period + d_period - 1 {
        return None;
    }

    let k_values: Vec<f64> = stochastic_k(bars, period).into_iter().flatten().collect();
    let k = *k_values.last()?;
    let d = sma_last(&k_values, d_period)?;

    Some(StochasticValue { k, d })
}

// =============================================================================
// Volatility Indicators
// =============================================================================

/// Calculate True Range
///
/// The first bar has no previous close, so its entry is `None`.
pub fn true_range(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut tr = Vec::with_capacity(bars.len());

    if bars.is_empty() {
        return tr;
    }
    tr.push(None);

    for (prev, bar) in bars.iter().tuple_windows() {
        let hl = bar.high - bar.low;
        let hc = (bar.high - prev.close).abs();
        let lc = (bar.low - prev.close).abs();
        tr.push(Some(hl.max(hc).max(lc)));
    }

    tr
}

/// Calculate Average True Range (ATR) using Wilder's smoothing
///
/// The seed is the mean of the first `period` true ranges, so the first
/// value sits at index `period` and the series needs more than `period` bars.
pub fn atr(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    if period == 0 || bars.len() <= period {
        return vec![None; bars.len()];
    }

    let tr: Vec<f64> = true_range(bars).into_iter().flatten().collect();

    let mut result = Vec::with_capacity(bars.len());
    result.push(None);
    result.extend(wilders_smooth(&tr, period));
    result
}

/// Latest ATR value
pub fn atr_last(bars: &[Bar], period: usize) -> Option<f64> {
    atr(bars, period).last().copied().flatten()
}

// =============================================================================
// Divergence
// =============================================================================

/// Indices of bars whose high exceeds both neighbours' highs
pub fn local_highs(bars: &[Bar]) -> Vec<usize> {
    bars.iter()
        .tuple_windows()
        .enumerate()
        .filter(|(_, (prev, bar, next))| bar.high > prev.high && bar.high > next.high)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Indices of bars whose low is below both neighbours' lows
pub fn local_lows(bars: &[Bar]) -> Vec<usize> {
    bars.iter()
        .tuple_windows()
        .enumerate()
        .filter(|(_, (prev, bar, next))| bar.low < prev.low && bar.low < next.low)
        .map(|(i, _)| i + 1)
        .collect()
}

/// An extremum eligible for divergence: (index, price, rsi)
type Pivot = (usize, f64, f64);

fn last_two(pivots: &[Pivot]) -> Option<(Pivot, Pivot)> {
    match pivots {
        [.., earlier, later] => Some((*earlier, *later)),
        _ => None,
    }
}

/// Detect RSI divergence over the trailing `lookback` bars
///
/// `rsi` is aligned with `bars` (as produced by [`rsi`]); when the slices
/// differ in length they are aligned on their common trailing suffix.
/// Extrema without an RSI reading are skipped. When both sides fire, the
/// signal whose later extremum is more recent wins.
pub fn rsi_divergence(bars: &[Bar], rsi: &[Option<f64>], lookback: usize) -> Divergence {
    let n = bars.len().min(rsi.len()).min(lookback);
    if n < 3 {
        return Divergence::None;
    }

    let bars = &bars[bars.len() - n..];
    let rsi = &rsi[rsi.len() - n..];

    let highs: Vec<Pivot> = local_highs(bars)
        .into_iter()
        .filter_map(|i| rsi[i].map(|r| (i, bars[i].high, r)))
        .collect();
    let lows: Vec<Pivot> = local_lows(bars)
        .into_iter()
        .filter_map(|i| rsi[i].map(|r| (i, bars[i].low, r)))
        .collect();

    // Higher high on weaker momentum
    let bearish = last_two(&highs)
        .filter(|(earlier, later)| later.1 > earlier.1 && later.2 < earlier.2)
        .map(|(_, later)| later.0);

    // Lower low on stronger momentum
    let bullish = last_two(&lows)
        .filter(|(earlier, later)| later.1 < earlier.1 && later.2 > earlier.2)
        .map(|(_, later)| later.0);

    match (bullish, bearish) {
        (Some(bull_idx), Some(bear_idx)) if bull_idx > bear_idx => Divergence::Bullish,
        (_, Some(_)) => Divergence::Bearish,
        (Some(_), None) => Divergence::Bullish,
        (None, None) => Divergence::None,
    }
}

// =============================================================================
// Tests
// =============================================================================
