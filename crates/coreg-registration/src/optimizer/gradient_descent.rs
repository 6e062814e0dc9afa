//! Regular gradient descent over rigid parameters.
//!
//! One iteration:
//!
//! 1. stop if the iteration budget is spent, or on cancellation or time limit;
//! 2. evaluate cost and derivative (an empty sample ends the run);
//! 3. stop when the window convergence value falls to the threshold;
//! 4. on the first iteration, stop if the gradient vanishes;
//! 5. divide the gradient by the parameter scales, estimate the learning
//!    rate if configured, step, and notify observers.
//!
//! With an estimated learning rate every step moves a sample point by at
//! most the maximum step size. When the scaled gradient reverses against
//! the previous one, the learning rate and the step bound are multiplied by
//! the relaxation factor.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use coreg_core::transform::{RigidParameters, RigidTransform};

use super::convergence::WindowConvergenceMonitor;
use super::scales::PhysicalShiftEstimator;
use super::trait_::CostFunction;
use crate::error::{RegistrationError, Result};
use crate::progress::{CancellationToken, ProgressInfo, ProgressTracker};

/// A first-iteration gradient with every component below this is degenerate.
pub const DEGENERATE_GRADIENT_TOLERANCE: f64 = 1e-12;

/// When the learning rate is derived from the physical step size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LearningRateEstimation {
    /// Use the configured learning rate as is.
    Never,
    /// Estimate once, at the first step.
    #[default]
    Once,
    /// Re-estimate at every step.
    EachIteration,
}

/// Gradient descent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientDescentConfig {
    pub learning_rate: f64,
    pub max_iterations: usize,
    /// Converged once the window convergence value is at or below this.
    pub convergence_min_value: f64,
    pub convergence_window_size: usize,
    pub estimate_learning_rate: LearningRateEstimation,
    /// Largest physical displacement of a sample point per step when the
    /// learning rate is estimated. Defaults to the smallest fixed spacing.
    pub maximum_step_size: Option<f64>,
    /// Applied to the step bound on each gradient reversal when the learning
    /// rate is estimated. `1.0` disables relaxation.
    pub relaxation_factor: f64,
    /// Wall-clock budget in seconds.
    pub time_limit_secs: Option<f64>,
}

impl Default for GradientDescentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            max_iterations: 100,
            convergence_min_value: 1e-6,
            convergence_window_size: 10,
            estimate_learning_rate: LearningRateEstimation::Once,
            maximum_step_size: None,
            relaxation_factor: 0.5,
            time_limit_secs: None,
        }
    }
}

impl GradientDescentConfig {
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_convergence(mut self, min_value: f64, window_size: usize) -> Self {
        self.convergence_min_value = min_value;
        self.convergence_window_size = window_size;
        self
    }

    pub fn with_learning_rate_estimation(mut self, estimation: LearningRateEstimation) -> Self {
        self.estimate_learning_rate = estimation;
        self
    }

    pub fn with_maximum_step_size(mut self, step: f64) -> Self {
        self.maximum_step_size = Some(step);
        self
    }

    pub fn with_relaxation_factor(mut self, factor: f64) -> Self {
        self.relaxation_factor = factor;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_secs = Some(limit.as_secs_f64());
        self
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Converged,
    MaxIterationsReached,
    /// The first gradient was numerically zero.
    LineSearchFailed,
    Cancelled,
    EmptySample,
}

impl StopReason {
    /// Human-readable stop condition.
    pub fn description(&self) -> &'static str {
        match self {
            StopReason::Converged => "Convergence checker passed at iteration",
            StopReason::MaxIterationsReached => "Maximum number of iterations reached",
            StopReason::LineSearchFailed => "Gradient magnitude vanished at the first iteration",
            StopReason::Cancelled => "Optimization cancelled or time limit exceeded",
            StopReason::EmptySample => "No sampled point mapped inside the moving image",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Lifecycle of a [`GradientDescent`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Initialized,
    Iterating,
    Stopped(StopReason),
}

/// Outcome of an optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Returned parameters. For `Cancelled` and `EmptySample` these are the best seen.
    pub parameters: RigidParameters,
    pub best_parameters: RigidParameters,
    pub stop_reason: StopReason,
    /// Completed gradient steps.
    pub iterations: usize,
    /// Last evaluated cost.
    pub value: Option<f64>,
    pub best_value: Option<f64>,
    pub learning_rate: f64,
    pub convergence_value: Option<f64>,
    pub scales: RigidParameters,
}

impl OptimizationResult {
    /// Stop description with the iteration count.
    pub fn stop_description(&self) -> String {
        match self.stop_reason {
            StopReason::Converged => format!("{} {}", self.stop_reason.description(), self.iterations),
            reason => format!("{} ({} iterations)", reason.description(), self.iterations),
        }
    }
}

/// Regular gradient descent with physical-shift scaling.
#[derive(Debug, Clone)]
pub struct GradientDescent {
    config: GradientDescentConfig,
    state: OptimizerState,
    cancellation: CancellationToken,
    tracker: ProgressTracker,
}

impl GradientDescent {
    pub fn new(config: GradientDescentConfig) -> Self {
        Self {
            config,
            state: OptimizerState::Initialized,
            cancellation: CancellationToken::new(),
            tracker: ProgressTracker::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn config(&self) -> &GradientDescentConfig {
        &self.config
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Minimize `cost` starting from `initial`.
    ///
    /// Errors from the cost function other than an empty sample are
    /// propagated.
    pub fn run<C: CostFunction>(
        &mut self,
        initial: &RigidTransform,
        cost: &mut C,
        estimator: &PhysicalShiftEstimator,
    ) -> Result<OptimizationResult> {
        let config = self.config.clone();
        let scales = estimator.estimate_scales(initial);
        let maximum_step = config
            .maximum_step_size
            .unwrap_or_else(|| estimator.maximum_step_size());
        let time_limit = config.time_limit_secs.map(Duration::from_secs_f64);

        let mut learning_rate = config.learning_rate;
        let mut relaxation = 1.0;
        let mut previous_gradient: Option<RigidParameters> = None;
        let mut parameters = *initial.parameters();
        let mut best_parameters = parameters;
        let mut value: Option<f64> = None;
        let mut best_value: Option<f64> = None;
        let mut convergence_value = None;
        let mut monitor = WindowConvergenceMonitor::new(config.convergence_window_size);
        let mut iteration = 0;
        let started = Instant::now();

        self.state = OptimizerState::Iterating;
        self.tracker.start();

        let stop_reason = loop {
            if iteration >= config.max_iterations {
                break StopReason::MaxIterationsReached;
            }
            if self.cancellation.is_cancelled() || time_limit.map_or(false, |limit| started.elapsed() >= limit) {
                break StopReason::Cancelled;
            }

            let (current, gradient) = match cost.value_and_derivative(&parameters) {
                Ok(evaluation) => evaluation,
                Err(RegistrationError::EmptySample(message)) => {
                    tracing::warn!("Stopping at iteration {}: {}", iteration, message);
                    break StopReason::EmptySample;
                }
                Err(error) => {
                    self.tracker.error(&error.to_string());
                    self.state = OptimizerState::Initialized;
                    return Err(error);
                }
            };

            value = Some(current);
            if best_value.map_or(true, |best| current < best) {
                best_value = Some(current);
                best_parameters = parameters;
            }

            monitor.add_energy_value(current);
            if let Some(convergence) = monitor.convergence_value() {
                convergence_value = Some(convergence);
                if convergence <= config.convergence_min_value {
                    break StopReason::Converged;
                }
            }

            if iteration == 0 && gradient.iter().all(|g| g.abs() < DEGENERATE_GRADIENT_TOLERANCE) {
                break StopReason::LineSearchFailed;
            }

            let direction = -gradient.component_div(&scales);
            let estimate = match config.estimate_learning_rate {
                LearningRateEstimation::Never => false,
                LearningRateEstimation::Once => iteration == 0,
                LearningRateEstimation::EachIteration => true,
            };
            let bounded = config.estimate_learning_rate != LearningRateEstimation::Never;
            let current_transform = initial.with_parameters(parameters);

            if bounded {
                // Reversal measured in the metric of the parameter scales.
                if previous_gradient.map_or(false, |previous| direction.dot(&previous) > 0.0) {
                    relaxation *= config.relaxation_factor;
                    if config.estimate_learning_rate == LearningRateEstimation::Once {
                        learning_rate *= config.relaxation_factor;
                    }
                    tracing::debug!("Gradient reversed at iteration {}, relaxation {:.4e}", iteration, relaxation);
                }
                previous_gradient = Some(gradient);
            }

            if estimate {
                let shift = estimator.estimate_step_scale(&current_transform, &direction);
                learning_rate = if shift > f64::EPSILON { maximum_step * relaxation / shift } else { 1.0 };
                tracing::debug!("Estimated learning rate {:.6e} (unit step shift {:.4e} mm)", learning_rate, shift);
            }

            let mut step = direction * learning_rate;
            if bounded {
                let step_bound = maximum_step * relaxation;
                let shift = estimator.estimate_step_scale(&current_transform, &step);
                if shift > step_bound {
                    step *= step_bound / shift;
                }
            }
            parameters += step;

            self.tracker.update(
                ProgressInfo::new(iteration, Some(config.max_iterations), current, learning_rate, parameters)
                    .with_convergence_value(convergence_value),
            );
            iteration += 1;
        };

        if matches!(stop_reason, StopReason::Cancelled | StopReason::EmptySample) {
            parameters = best_parameters;
        }

        self.state = OptimizerState::Stopped(stop_reason);
        let result = OptimizationResult {
            parameters,
            best_parameters,
            stop_reason,
            iterations: iteration,
            value,
            best_value,
            learning_rate,
            convergence_value,
            scales,
        };
        self.tracker.complete(iteration, &result.stop_description());
        Ok(result)
    }
}
