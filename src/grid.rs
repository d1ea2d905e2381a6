//! Grid ladder simulation
//!
//! Projects the averaging ladder a grid EA would build from a start price:
//! entry levels spaced by a (possibly widening) point distance and lot sizes
//! that compound by the lot multiplier. Buy ladders step down, sell ladders
//! step up; the two are computed independently.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{GridSettings, MAX_GRID_TRADES};
use crate::types::Side;

/// Price value of one point for BTC quotes
pub const POINT_FACTOR: f64 = 0.01;

/// Smallest lot the broker accepts
pub const MIN_LOT: f64 = 0.01;

/// Volatility-adaptive grid parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveGrid {
    /// ATR in price units
    pub atr: f64,
    /// Base distance = ATR * distance_multiplier (converted to points)
    pub distance_multiplier: f64,
    /// Extra lot multiplier per unit of ATR / price
    pub lot_sensitivity: f64,
}

impl AdaptiveGrid {
    fn usable_atr(&self) -> Option<f64> {
        (self.atr.is_finite() && self.atr > 0.0).then_some(self.atr)
    }
}

/// One planned grid entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    /// 1-based level number
    pub index: usize,
    pub entry_price: f64,
    pub lot_size: f64,
    pub cumulative_lots: f64,
    /// Volume-weighted average entry of all levels up to this one
    pub average_price: f64,
}

/// Ordered levels for one side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLadder {
    pub side: Side,
    pub levels: Vec<GridLevel>,
}

impl GridLadder {
    fn empty(side: Side) -> Self {
        Self {
            side,
            levels: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn total_lots(&self) -> f64 {
        self.levels.last().map_or(0.0, |l| l.cumulative_lots)
    }

    /// Break-even price once every level is filled
    pub fn final_average_price(&self) -> Option<f64> {
        self.levels.last().map(|l| l.average_price)
    }

    pub fn deepest_entry(&self) -> Option<f64> {
        self.levels.last().map(|l| l.entry_price)
    }
}

/// Buy and sell ladders projected from the same start price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSimulation {
    pub start_price: f64,
    pub buy: GridLadder,
    pub sell: GridLadder,
}

impl GridSimulation {
    pub fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.sell.is_empty()
    }
}

/// Round a lot to 2 decimals (half away from zero)
pub fn round_lot(lot: f64) -> f64 {
    (lot * 100.0).round() / 100.0
}

/// Simulate both grid ladders for `start_price`
///
/// A non-positive or non-finite start price yields empty ladders.
pub fn simulate_grid(
    start_price: f64,
    settings: &GridSettings,
    adaptive: Option<&AdaptiveGrid>,
) -> GridSimulation {
    GridSimulation {
        start_price,
        buy: build_ladder(Side::Buy, start_price, settings, adaptive),
        sell: build_ladder(Side::Sell, start_price, settings, adaptive),
    }
}

/// Build the ladder for one side
pub fn build_ladder(
    side: Side,
    start_price: f64,
    settings: &GridSettings,
    adaptive: Option<&AdaptiveGrid>,
) -> GridLadder {
    if !start_price.is_finite() || start_price <= 0.0 || settings.max_grid_trades == 0 {
        return GridLadder::empty(side);
    }

    let adaptive_atr = adaptive.and_then(|a| a.usable_atr().map(|atr| (a, atr)));

    let base_distance = match adaptive_atr {
        Some((a, atr)) => atr * a.distance_multiplier / POINT_FACTOR,
        None => settings.grid_distance,
    };
    let lot_multiplier = match adaptive_atr {
        Some((a, atr)) => settings.grid_lot_multiplier + a.lot_sensitivity * (atr / start_price),
        None => settings.grid_lot_multiplier,
    };
    let spacing_growth = settings.grid_distance_multiplier - 1.0;

    debug!(
        side = %side,
        start_price,
        base_distance,
        lot_multiplier,
        adaptive = adaptive_atr.is_some(),
        "Building grid ladder"
    );

    let mut levels = Vec::with_capacity(settings.max_grid_trades.min(MAX_GRID_TRADES));
    let mut cumulative_distance = 0.0;
    let mut cumulative_lots = 0.0;
    let mut weighted_sum = 0.0;
    let mut lot_size = settings.initial_lot;

    for index in 1..=settings.max_grid_trades {
        if index > 1 {
            lot_size = MIN_LOT.max(round_lot(lot_size * lot_multiplier));
        }

        cumulative_distance += base_distance * (1.0 + (index - 1) as f64 * spacing_growth);
        let entry_price = start_price + side.direction() * cumulative_distance * POINT_FACTOR;

        cumulative_lots += lot_size;
        weighted_sum += entry_price * lot_size;

        levels.push(GridLevel {
            index,
            entry_price,
            lot_size,
            cumulative_lots,
            average_price: weighted_sum / cumulative_lots,
        });
    }

    GridLadder { side, levels }
}
