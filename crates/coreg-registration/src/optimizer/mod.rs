//! Optimization of rigid transform parameters.
//!
//! [`GradientDescent`] minimizes a [`CostFunction`] with parameter scales
//! from [`PhysicalShiftEstimator`] and stops on window convergence, iteration
//! budget, cancellation or a degenerate first gradient.

pub mod trait_;
pub mod convergence;
pub mod scales;
pub mod gradient_descent;

pub use trait_::CostFunction;
pub use convergence::WindowConvergenceMonitor;
pub use scales::{PhysicalShiftEstimator, SMALL_PARAMETER_VARIATION};
pub use gradient_descent::{
    GradientDescent, GradientDescentConfig, LearningRateEstimation, OptimizationResult, OptimizerState,
    StopReason, DEGENERATE_GRADIENT_TOLERANCE,
};
