//! Single-parameter sweep optimizer
//!
//! Mutates one field of a strategy configuration across a validated range,
//! re-estimates performance for every value and streams the growing result
//! list to the caller. Sweeps run as tokio tasks that yield between steps, so
//! intermediate results never starve other work. Starting a new sweep
//! supersedes the previous one: its task stops before the next emit.

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{StrategyConfig, StrategyParams};
use crate::performance::{estimate_performance, PerformanceEstimate, PerformanceMetrics};

/// Largest number of steps a sweep may span
pub const MAX_SWEEP_STEPS: f64 = 50.0;

// =============================================================================
// Parameters
// =============================================================================

/// Numeric configuration fields that can be swept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepParameter {
    // Grid only
    InitialLot,
    GridDistance,
    GridDistanceMultiplier,
    GridLotMultiplier,
    MaxGridTrades,
    TakeProfit,
    StopLoss,
    AtrDistanceMultiplier,
    LotSensitivity,
    // Both strategies
    MaPeriod,
    AtrPeriod,
    TrailingStart,
    TrailingStep,
    // Signal only
    LotSize,
    AtrSlMultiplier,
    AtrTpMultiplier,
    RsiPeriod,
    RsiOverbought,
    RsiOversold,
}

impl SweepParameter {
    pub const ALL: [SweepParameter; 19] = [
        SweepParameter::InitialLot,
        SweepParameter::GridDistance,
        SweepParameter::GridDistanceMultiplier,
        SweepParameter::GridLotMultiplier,
        SweepParameter::MaxGridTrades,
        SweepParameter::TakeProfit,
        SweepParameter::StopLoss,
        SweepParameter::AtrDistanceMultiplier,
        SweepParameter::LotSensitivity,
        SweepParameter::MaPeriod,
        SweepParameter::AtrPeriod,
        SweepParameter::TrailingStart,
        SweepParameter::TrailingStep,
        SweepParameter::LotSize,
        SweepParameter::AtrSlMultiplier,
        SweepParameter::AtrTpMultiplier,
        SweepParameter::RsiPeriod,
        SweepParameter::RsiOverbought,
        SweepParameter::RsiOversold,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SweepParameter::InitialLot => "initial_lot",
            SweepParameter::GridDistance => "grid_distance",
            SweepParameter::GridDistanceMultiplier => "grid_distance_multiplier",
            SweepParameter::GridLotMultiplier => "grid_lot_multiplier",
            SweepParameter::MaxGridTrades => "max_grid_trades",
            SweepParameter::TakeProfit => "take_profit",
            SweepParameter::StopLoss => "stop_loss",
            SweepParameter::AtrDistanceMultiplier => "atr_distance_multiplier",
            SweepParameter::LotSensitivity => "lot_sensitivity",
            SweepParameter::MaPeriod => "ma_period",
            SweepParameter::AtrPeriod => "atr_period",
            SweepParameter::TrailingStart => "trailing_start",
            SweepParameter::TrailingStep => "trailing_step",
            SweepParameter::LotSize => "lot_size",
            SweepParameter::AtrSlMultiplier => "atr_sl_multiplier",
            SweepParameter::AtrTpMultiplier => "atr_tp_multiplier",
            SweepParameter::RsiPeriod => "rsi_period",
            SweepParameter::RsiOverbought => "rsi_overbought",
            SweepParameter::RsiOversold => "rsi_oversold",
        }
    }

    /// Fields stored as whole numbers; swept values are rounded before use
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            SweepParameter::MaxGridTrades
                | SweepParameter::MaPeriod
                | SweepParameter::AtrPeriod
                | SweepParameter::RsiPeriod
        )
    }

    /// Current value of this field, or `None` when the strategy has no such field
    pub fn current_value(self, config: &StrategyConfig) -> Option<f64> {
        match &config.strategy {
            StrategyParams::Grid(g) => match self {
                SweepParameter::InitialLot => Some(g.initial_lot),
                SweepParameter::GridDistance => Some(g.grid_distance),
                SweepParameter::GridDistanceMultiplier => Some(g.grid_distance_multiplier),
                SweepParameter::GridLotMultiplier => Some(g.grid_lot_multiplier),
                SweepParameter::MaxGridTrades => Some(g.max_grid_trades as f64),
                SweepParameter::TakeProfit => Some(g.take_profit),
                SweepParameter::StopLoss => Some(g.stop_loss),
                SweepParameter::AtrDistanceMultiplier => Some(g.atr_distance_multiplier),
                SweepParameter::LotSensitivity => Some(g.lot_sensitivity),
                SweepParameter::MaPeriod => Some(g.ma_period as f64),
                SweepParameter::AtrPeriod => Some(g.atr_period as f64),
                SweepParameter::TrailingStart => Some(g.trailing_start),
                SweepParameter::TrailingStep => Some(g.trailing_step),
                _ => None,
            },
            StrategyParams::Signal(s) => match self {
                SweepParameter::MaPeriod => Some(s.ma_period as f64),
                SweepParameter::AtrPeriod => Some(s.atr_period as f64),
                SweepParameter::TrailingStart => Some(s.trailing_start),
                SweepParameter::TrailingStep => Some(s.trailing_step),
                SweepParameter::LotSize => Some(s.lot_size),
                SweepParameter::AtrSlMultiplier => Some(s.atr_sl_multiplier),
                SweepParameter::AtrTpMultiplier => Some(s.atr_tp_multiplier),
                SweepParameter::RsiPeriod => Some(s.rsi_period as f64),
                SweepParameter::RsiOverbought => Some(s.rsi_overbought),
                SweepParameter::RsiOversold => Some(s.rsi_oversold),
                _ => None,
            },
        }
    }

    pub fn applies_to(self, config: &StrategyConfig) -> bool {
        self.current_value(config).is_some()
    }

    /// Clone `config` with this field set to `value`
    ///
    /// Returns `None` when the strategy has no such field.
    pub fn apply(self, config: &StrategyConfig, value: f64) -> Option<StrategyConfig> {
        let mut cfg = config.clone();
        let count = value.round().max(0.0) as usize;

        match &mut cfg.strategy {
            StrategyParams::Grid(g) => match self {
                SweepParameter::InitialLot => g.initial_lot = value,
                SweepParameter::GridDistance => g.grid_distance = value,
                SweepParameter::GridDistanceMultiplier => g.grid_distance_multiplier = value,
                SweepParameter::GridLotMultiplier => g.grid_lot_multiplier = value,
                SweepParameter::MaxGridTrades => g.max_grid_trades = count,
                SweepParameter::TakeProfit => g.take_profit = value,
                SweepParameter::StopLoss => g.stop_loss = value,
                SweepParameter::AtrDistanceMultiplier => g.atr_distance_multiplier = value,
                SweepParameter::LotSensitivity => g.lot_sensitivity = value,
                SweepParameter::MaPeriod => g.ma_period = count,
                SweepParameter::AtrPeriod => g.atr_period = count,
                SweepParameter::TrailingStart => g.trailing_start = value,
                SweepParameter::TrailingStep => g.trailing_step = value,
                _ => return None,
            },
            StrategyParams::Signal(s) => match self {
                SweepParameter::MaPeriod => s.ma_period = count,
                SweepParameter::AtrPeriod => s.atr_period = count,
                SweepParameter::TrailingStart => s.trailing_start = value,
                SweepParameter::TrailingStep => s.trailing_step = value,
                SweepParameter::LotSize => s.lot_size = value,
                SweepParameter::AtrSlMultiplier => s.atr_sl_multiplier = value,
                SweepParameter::AtrTpMultiplier => s.atr_tp_multiplier = value,
                SweepParameter::RsiPeriod => s.rsi_period = count,
                SweepParameter::RsiOverbought => s.rsi_overbought = value,
                SweepParameter::RsiOversold => s.rsi_oversold = value,
                _ => return None,
            },
        }

        Some(cfg)
    }

    /// Range used when scanning every parameter at once
    pub fn default_range(self) -> SweepRange {
        let (start, end, step) = match self {
            SweepParameter::InitialLot => (0.01, 0.1, 0.01),
            SweepParameter::GridDistance => (500.0, 3_000.0, 250.0),
            SweepParameter::GridDistanceMultiplier => (1.0, 2.0, 0.1),
            SweepParameter::GridLotMultiplier => (1.0, 2.5, 0.1),
            SweepParameter::MaxGridTrades => (2.0, 15.0, 1.0),
            SweepParameter::TakeProfit => (500.0, 5_000.0, 500.0),
            SweepParameter::StopLoss => (0.0, 10_000.0, 1_000.0),
            SweepParameter::AtrDistanceMultiplier => (0.5, 3.0, 0.25),
            SweepParameter::LotSensitivity => (0.0, 50.0, 5.0),
            SweepParameter::MaPeriod => (10.0, 200.0, 10.0),
            SweepParameter::AtrPeriod => (5.0, 30.0, 1.0),
            SweepParameter::TrailingStart => (500.0, 3_000.0, 250.0),
            SweepParameter::TrailingStep => (100.0, 1_000.0, 100.0),
            SweepParameter::LotSize => (0.01, 0.2, 0.01),
            SweepParameter::AtrSlMultiplier => (0.5, 4.0, 0.25),
            SweepParameter::AtrTpMultiplier => (1.0, 6.0, 0.5),
            SweepParameter::RsiPeriod => (5.0, 30.0, 1.0),
            SweepParameter::RsiOverbought => (60.0, 85.0, 1.0),
            SweepParameter::RsiOversold => (15.0, 40.0, 1.0),
        };
        SweepRange { start, end, step }
    }
}

impl fmt::Display for SweepParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for SweepParameter {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        SweepParameter::ALL
            .into_iter()
            .find(|p| p.key() == key)
            .ok_or_else(|| SweepError::UnknownParameter(key.to_string()))
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Request field an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepField {
    Parameter,
    Start,
    End,
    Step,
}

impl fmt::Display for SweepField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SweepField::Parameter => "parameter",
            SweepField::Start => "start",
            SweepField::End => "end",
            SweepField::Step => "step",
        };
        write!(f, "{}", name)
    }
}

/// Rejected sweep request
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SweepError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("parameter '{parameter}' does not apply to the {strategy} strategy")]
    NotApplicable {
        parameter: SweepParameter,
        strategy: &'static str,
    },

    #[error("{field} is not a number: '{input}'")]
    NotANumber { field: SweepField, input: String },

    #[error("start ({start}) must be less than end ({end})")]
    StartNotBelowEnd { start: f64, end: f64 },

    #[error("step must be positive (got {0})")]
    NonPositiveStep(f64),

    #[error("range too large: {steps} steps exceeds the limit of {}", MAX_SWEEP_STEPS)]
    RangeTooLarge { steps: f64 },

    #[error("step {step} is too coarse for a range of {span}")]
    StepTooCoarse { step: f64, span: f64 },
}

impl SweepError {
    /// Request field the error should be shown against
    pub fn field(&self) -> SweepField {
        match self {
            SweepError::UnknownParameter(_) | SweepError::NotApplicable { .. } => {
                SweepField::Parameter
            }
            SweepError::NotANumber { field, .. } => *field,
            SweepError::StartNotBelowEnd { .. } => SweepField::End,
            SweepError::NonPositiveStep(_)
            | SweepError::RangeTooLarge { .. }
            | SweepError::StepTooCoarse { .. } => SweepField::Step,
        }
    }
}

/// Validated sweep bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepRange {
    start: f64,
    end: f64,
    step: f64,
}

impl SweepRange {
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self, SweepError> {
        if !(start < end) {
            return Err(SweepError::StartNotBelowEnd { start, end });
        }
        if !(step > 0.0) {
            return Err(SweepError::NonPositiveStep(step));
        }

        let span = end - start;
        let steps = span / step;
        if steps > MAX_SWEEP_STEPS {
            return Err(SweepError::RangeTooLarge { steps });
        }
        if steps.round() < 1.0 {
            return Err(SweepError::StepTooCoarse { step, span });
        }

        Ok(SweepRange { start, end, step })
    }

    /// Parse and validate textual bounds
    ///
    /// Every unparseable field is reported; range errors are reported only
    /// once all three fields are numbers.
    pub fn parse(start: &str, end: &str, step: &str) -> Result<Self, Vec<SweepError>> {
        let parse_field = |field: SweepField, input: &str| {
            input
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| SweepError::NotANumber {
                    field,
                    input: input.to_string(),
                })
        };

        let parsed = [
            parse_field(SweepField::Start, start),
            parse_field(SweepField::End, end),
            parse_field(SweepField::Step, step),
        ];

        match parsed {
            [Ok(start), Ok(end), Ok(step)] => {
                SweepRange::new(start, end, step).map_err(|e| vec![e])
            }
            fields => Err(fields.into_iter().filter_map(Result::err).collect()),
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Values `start, start + step, ...` up to `end` with half a step of tolerance
    pub fn values(&self) -> impl Iterator<Item = f64> {
        let SweepRange { start, end, step } = *self;
        let limit = end + step / 2.0;
        (0u32..)
            .map(move |i| start + f64::from(i) * step)
            .take_while(move |&v| v <= limit)
    }

    pub fn len(&self) -> usize {
        self.values().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validate a full sweep request against a configuration
pub fn validate_request(
    config: &StrategyConfig,
    parameter_key: &str,
    start: &str,
    end: &str,
    step: &str,
) -> Result<(SweepParameter, SweepRange), Vec<SweepError>> {
    let parameter = parameter_key
        .parse::<SweepParameter>()
        .and_then(|p| {
            if p.applies_to(config) {
                Ok(p)
            } else {
                Err(SweepError::NotApplicable {
                    parameter: p,
                    strategy: config.strategy_name(),
                })
            }
        });
    let range = SweepRange::parse(start, end, step);

    match (parameter, range) {
        (Ok(parameter), Ok(range)) => Ok((parameter, range)),
        (parameter, range) => {
            let mut errors: Vec<SweepError> = parameter.err().into_iter().collect();
            errors.extend(range.err().unwrap_or_default());
            Err(errors)
        }
    }
}

// =============================================================================
// Candidates
// =============================================================================

/// Result for one tested value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationCandidate {
    pub parameter_value: f64,
    pub estimate: PerformanceEstimate,
    pub metrics: PerformanceMetrics,
}

/// Estimate `config` with `parameter` set to `value`
pub fn evaluate(
    config: &StrategyConfig,
    parameter: SweepParameter,
    value: f64,
) -> Option<OptimizationCandidate> {
    let cfg = parameter.apply(config, value)?;
    let estimate = estimate_performance(&cfg);
    Some(OptimizationCandidate {
        parameter_value: value,
        metrics: estimate.metrics(),
        estimate,
    })
}

/// Candidate with the highest Sharpe ratio; the earliest wins ties
pub fn best_candidate(candidates: &[OptimizationCandidate]) -> Option<&OptimizationCandidate> {
    candidates.iter().fold(None, |best, candidate| match best {
        Some(b) if OrderedFloat(candidate.estimate.sharpe_ratio) <= OrderedFloat(b.estimate.sharpe_ratio) => {
            Some(b)
        }
        _ => Some(candidate),
    })
}

/// Run a sweep to completion on the current thread
pub fn sweep_blocking(
    config: &StrategyConfig,
    parameter: SweepParameter,
    range: &SweepRange,
) -> Vec<OptimizationCandidate> {
    range
        .values()
        .filter_map(|value| evaluate(config, parameter, value))
        .collect()
}

/// Sweep of one parameter inside a multi-parameter scan
#[derive(Debug, Clone, Serialize)]
pub struct ParameterScan {
    pub parameter: SweepParameter,
    pub range: SweepRange,
    pub candidates: Vec<OptimizationCandidate>,
    pub best: Option<OptimizationCandidate>,
}

/// Sweep several parameters independently, in parallel
///
/// Each sweep starts from the same base configuration. Results keep the
/// order of `sweeps`.
pub fn scan_parameters(
    config: &StrategyConfig,
    sweeps: &[(SweepParameter, SweepRange)],
) -> Vec<ParameterScan> {
    info!("Scanning {} parameters", sweeps.len());

    sweeps
        .par_iter()
        .map(|&(parameter, range)| {
            let candidates = sweep_blocking(config, parameter, &range);
            let best = best_candidate(&candidates).cloned();
            debug!(%parameter, tested = candidates.len(), "Parameter scan finished");
            ParameterScan {
                parameter,
                range,
                candidates,
                best,
            }
        })
        .collect()
}

// =============================================================================
// Incremental sweep runner
// =============================================================================

/// Lifecycle of the optimizer's current sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepState {
    Idle,
    Validating,
    Running,
    Completed,
    Cancelled,
}

/// How a sweep ended
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Completed {
        candidates: Vec<OptimizationCandidate>,
        best: Option<OptimizationCandidate>,
    },
    Cancelled {
        candidates: Vec<OptimizationCandidate>,
    },
    Rejected(Vec<SweepError>),
}

/// Identifies one run; stale once the optimizer moves to another run
#[derive(Debug, Clone)]
struct RunToken {
    generation: Arc<AtomicU64>,
    id: u64,
}

impl RunToken {
    fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.id
    }

    /// Retire this run if it is still current
    fn retire(&self) -> bool {
        self.generation
            .compare_exchange(self.id, self.id + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

enum HandleInner {
    Running(JoinHandle<SweepOutcome>),
    Rejected(Vec<SweepError>),
}

/// Handle to one sweep run
pub struct SweepHandle {
    token: RunToken,
    state: Arc<watch::Sender<SweepState>>,
    inner: HandleInner,
}

impl SweepHandle {
    /// Stop the run before its next emit
    ///
    /// Only a running sweep can be cancelled; completed, rejected and
    /// superseded runs are left as they are.
    pub fn cancel(&self) {
        let cancelled = self.state.send_if_modified(|state| {
            if *state == SweepState::Running && self.token.retire() {
                *state = SweepState::Cancelled;
                true
            } else {
                false
            }
        });
        if cancelled {
            info!("Sweep cancelled");
        }
    }

    pub async fn join(self) -> SweepOutcome {
        match self.inner {
            HandleInner::Rejected(errors) => SweepOutcome::Rejected(errors),
            HandleInner::Running(task) => match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Sweep task failed: {}", e);
                    SweepOutcome::Cancelled {
                        candidates: Vec::new(),
                    }
                }
            },
        }
    }
}

/// Runs one sweep at a time; a new request supersedes the previous run
pub struct ParameterSweepOptimizer {
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<SweepState>>,
}

impl Default for ParameterSweepOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterSweepOptimizer {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SweepState::Idle);
        ParameterSweepOptimizer {
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> SweepState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SweepState> {
        self.state.subscribe()
    }

    /// Validate a request and start sweeping in a tokio task
    ///
    /// `on_progress` receives the full candidate list after every step.
    /// `on_error` is called once with every field error when validation
    /// fails; no candidates are produced in that case. Must be called from
    /// within a tokio runtime.
    #[allow(clippy::too_many_arguments)]
    pub fn run_sweep<P, E>(
        &self,
        config: StrategyConfig,
        parameter_key: &str,
        start: &str,
        end: &str,
        step: &str,
        mut on_progress: P,
        on_error: E,
    ) -> SweepHandle
    where
        P: FnMut(&[OptimizationCandidate]) + Send + 'static,
        E: FnOnce(&[SweepError]),
    {
        let token = RunToken {
            generation: Arc::clone(&self.generation),
            id: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        };
        let state = Arc::clone(&self.state);
        state.send_replace(SweepState::Validating);

        let (parameter, range) =
            match validate_request(&config, parameter_key, start, end, step) {
                Ok(request) => request,
                Err(errors) => {
                    warn!(
                        parameter = parameter_key,
                        "Sweep rejected: {}",
                        errors
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join("; ")
                    );
                    on_error(&errors);
                    if token.is_current() {
                        state.send_replace(SweepState::Idle);
                    }
                    return SweepHandle {
                        token,
                        state,
                        inner: HandleInner::Rejected(errors),
                    };
                }
            };

        info!(
            %parameter,
            start = range.start,
            end = range.end,
            step = range.step,
            steps = range.len(),
            "Starting parameter sweep"
        );
        state.send_replace(SweepState::Running);

        let task_token = token.clone();
        let task_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            let mut candidates = Vec::with_capacity(range.len());

            for value in range.values() {
                if !task_token.is_current() {
                    debug!(%parameter, tested = candidates.len(), "Superseded sweep stopped");
                    return SweepOutcome::Cancelled { candidates };
                }

                if let Some(candidate) = evaluate(&config, parameter, value) {
                    debug!(
                        %parameter,
                        value,
                        sharpe = candidate.estimate.sharpe_ratio,
                        "Sweep step"
                    );
                    candidates.push(candidate);
                    if !task_token.is_current() {
                        return SweepOutcome::Cancelled { candidates };
                    }
                    on_progress(&candidates);
                }

                tokio::task::yield_now().await;
            }

            // Checked under the state lock so a newer run's state is never overwritten
            let completed = task_state.send_if_modified(|state| {
                if task_token.is_current() && *state == SweepState::Running {
                    *state = SweepState::Completed;
                    true
                } else {
                    false
                }
            });
            if !completed {
                return SweepOutcome::Cancelled { candidates };
            }

            let best = best_candidate(&candidates).cloned();
            if let Some(b) = &best {
                info!(
                    %parameter,
                    value = b.parameter_value,
                    sharpe = %b.metrics.sharpe_ratio,
                    "Sweep completed"
                );
            }

            SweepOutcome::Completed { candidates, best }
        });

        SweepHandle {
            token,
            state,
            inner: HandleInner::Running(task),
        }
    }

    /// Cancel whatever run is current
    pub fn close(&self) {
        let current = self.generation.load(Ordering::SeqCst);
        let token = RunToken {
            generation: Arc::clone(&self.generation),
            id: current,
        };
        self.state.send_if_modified(|state| {
            if token.retire() && *state == SweepState::Running {
                *state = SweepState::Cancelled;
                true
            } else {
                false
            }
        });
    }
}
