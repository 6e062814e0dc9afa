//! Rigid registration driver: Mattes MI + gradient descent.

use burn::tensor::backend::Backend;
use coreg_core::image::{Image, ImageBuffer};
use coreg_core::transform::{CenteredTransformInitializer, RigidParameters, RigidTransform};

use crate::config::RegistrationConfig;
use crate::error::Result;
use crate::metric::{MattesMutualInformation, Metric};
use crate::optimizer::{CostFunction, GradientDescent, OptimizationResult, PhysicalShiftEstimator, StopReason};
use crate::progress::{CancellationToken, ProgressCallback, ProgressTracker};
use crate::validation::validate_image_grids;

/// Adapts a [`Metric`] to a parameter-space [`CostFunction`].
struct MetricCost<'a, M: Metric> {
    metric: &'a mut M,
    template: RigidTransform,
}

impl<M: Metric> CostFunction for MetricCost<'_, M> {
    fn value_and_derivative(&mut self, parameters: &RigidParameters) -> Result<(f64, RigidParameters)> {
        let evaluation = self.metric.value_and_derivative(&self.template.with_parameters(*parameters))?;
        Ok((evaluation.value, evaluation.derivative))
    }
}

/// Outcome of [`ImageRegistrationMethod::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResult {
    /// Final transform, mapping fixed physical points into the moving image.
    pub transform: RigidTransform,
    pub initial_transform: RigidTransform,
    pub optimization: OptimizationResult,
}

impl RegistrationResult {
    pub fn stop_reason(&self) -> StopReason {
        self.optimization.stop_reason
    }

    pub fn stop_description(&self) -> String {
        self.optimization.stop_description()
    }

    /// Final mutual information (the negated last cost), if any evaluation ran.
    pub fn metric_value(&self) -> Option<f64> {
        self.optimization.value.map(|v| -v)
    }
}

/// Registers a moving volume onto a fixed volume with a rigid transform.
#[derive(Debug, Clone, Default)]
pub struct ImageRegistrationMethod {
    config: RegistrationConfig,
    tracker: ProgressTracker,
    cancellation: CancellationToken,
}

impl ImageRegistrationMethod {
    pub fn new(config: RegistrationConfig) -> Self {
        Self {
            config,
            tracker: ProgressTracker::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_callback(mut self, callback: std::sync::Arc<dyn ProgressCallback>) -> Self {
        self.tracker.add_callback(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Token that cancels a running [`execute`](Self::execute).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Initialize from the image centres and register.
    pub fn execute<B: Backend>(&self, fixed: &Image<B, 3>, moving: &Image<B, 3>) -> Result<RegistrationResult> {
        self.execute_buffers(fixed.to_buffer()?, moving.to_buffer()?)
    }

    /// [`execute`](Self::execute) on host snapshots.
    pub fn execute_buffers(&self, fixed: ImageBuffer, moving: ImageBuffer) -> Result<RegistrationResult> {
        validate_image_grids(fixed.grid(), moving.grid())?;
        let initial = CenteredTransformInitializer::new(self.config.initializer).initialize_buffers(&fixed, &moving);
        self.execute_from(fixed, moving, initial)
    }

    /// Register starting from an explicit initial transform.
    pub fn execute_from(
        &self,
        fixed: ImageBuffer,
        moving: ImageBuffer,
        initial: RigidTransform,
    ) -> Result<RegistrationResult> {
        self.config.validate()?;
        let estimator = PhysicalShiftEstimator::new(fixed.grid());
        let mut metric = MattesMutualInformation::new(fixed, moving, &self.config.metric)?;

        tracing::info!(
            "Registering with {} ({} bins, {} samples per evaluation), center {:?}, initial translation {:?}",
            metric.name(),
            metric.histogram_bins(),
            metric.samples_per_evaluation(),
            initial.center().to_array(),
            initial.translation().to_array()
        );

        let mut optimizer = GradientDescent::new(self.config.optimizer.clone())
            .with_cancellation(self.cancellation.clone())
            .with_tracker(self.tracker.clone());
        let mut cost = MetricCost {
            metric: &mut metric,
            template: initial,
        };
        let optimization = optimizer.run(&initial, &mut cost, &estimator)?;
        let transform = initial.with_parameters(optimization.parameters);

        tracing::info!(
            "Optimizer stop condition: {}; final metric value {}",
            optimization.stop_description(),
            optimization.value.map(|v| format!("{:.6}", -v)).unwrap_or_else(|| "n/a".to_string())
        );

        Ok(RegistrationResult {
            transform,
            initial_transform: initial,
            optimization,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::GradientDescentConfig;
    use coreg_core::image::ImageGrid;
    use coreg_core::spatial::{Direction3, Point3, Spacing3};

    fn ramp(origin: [f64; 3]) -> ImageBuffer {
        let grid = ImageGrid::new([6, 6, 6], Point3::new(origin), Spacing3::uniform(1.0), Direction3::identity());
        let values = (0..grid.num_voxels()).map(|i| (i % 17) as f32).collect();
        ImageBuffer::new(grid, values).unwrap()
    }

    #[test]
    fn test_zero_iterations_returns_initial_transform() {
        let config = RegistrationConfig::default()
            .with_optimizer(GradientDescentConfig::default().with_max_iterations(0));
        let method = ImageRegistrationMethod::new(config);
        let result = method.execute_buffers(ramp([0.0; 3]), ramp([2.0, 0.0, -1.0])).unwrap();
        assert_eq!(result.stop_reason(), StopReason::MaxIterationsReached);
        assert_eq!(result.transform, result.initial_transform);
        assert_eq!(result.transform.translation().to_array(), [2.0, 0.0, -1.0]);
        assert_eq!(result.metric_value(), None);
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let mut config = RegistrationConfig::default();
        config.metric.sampling_percentage = 2.0;
        let method = ImageRegistrationMethod::new(config);
        assert!(method.execute_buffers(ramp([0.0; 3]), ramp([0.0; 3])).is_err());
    }
}
