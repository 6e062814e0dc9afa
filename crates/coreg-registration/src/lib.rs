pub mod metric;
pub mod optimizer;
pub mod registration;
pub mod error;
pub mod validation;
pub mod progress;
pub mod config;
pub mod quality;
pub mod pipeline;

pub use error::{RegistrationError, Result};
pub use config::{MetricConfig, PipelineConfig, RegistrationConfig, SegmentationConfig};
pub use metric::{MattesMutualInformation, Metric, MetricEvaluation};
pub use optimizer::{GradientDescent, GradientDescentConfig, LearningRateEstimation, OptimizationResult, StopReason};
pub use progress::{CancellationToken, ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressInfo, ProgressTracker};
pub use registration::{ImageRegistrationMethod, RegistrationResult};
pub use quality::{evaluate_alignment_quality, QualityEvaluation, QualityReport, QualityWarning};
pub use pipeline::{CoRegistrationPipeline, PipelineOutput};
