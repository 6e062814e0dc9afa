//! Progress tracking, observers and cancellation for the optimizer loop.
//!
//! Observers are notified once per completed gradient step. A
//! [`CancellationToken`] can be shared with an observer (or another thread)
//! to stop the optimizer at the next iteration boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use coreg_core::transform::RigidParameters;

/// Progress information for one optimizer iteration.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Iteration number (0-based) of the step that just completed.
    pub iteration: usize,
    /// Iteration budget.
    pub total_iterations: Option<usize>,
    /// Cost value (negative mutual information) evaluated at this iteration.
    pub cost: f64,
    /// Learning rate used for the step.
    pub learning_rate: f64,
    /// Window convergence value, once the window is full.
    pub convergence_value: Option<f64>,
    /// Parameters after the step.
    pub parameters: RigidParameters,
    /// Time elapsed since start.
    pub elapsed: Duration,
    /// Estimated remaining time.
    pub estimated_remaining: Option<Duration>,
}

impl ProgressInfo {
    /// Create new progress information.
    pub fn new(
        iteration: usize,
        total_iterations: Option<usize>,
        cost: f64,
        learning_rate: f64,
        parameters: RigidParameters,
    ) -> Self {
        Self {
            iteration,
            total_iterations,
            cost,
            learning_rate,
            convergence_value: None,
            parameters,
            elapsed: Duration::ZERO,
            estimated_remaining: None,
        }
    }

    /// Attach the convergence value.
    pub fn with_convergence_value(mut self, value: Option<f64>) -> Self {
        self.convergence_value = value;
        self
    }

    /// Mutual information at this iteration (the negated cost).
    pub fn metric_value(&self) -> f64 {
        -self.cost
    }

    /// Calculate progress percentage.
    pub fn progress_percent(&self) -> Option<f64> {
        self.total_iterations
            .filter(|&total| total > 0)
            .map(|total| ((self.iteration + 1) as f64 / total as f64) * 100.0)
    }

    /// Calculate estimated remaining time.
    pub fn calculate_remaining(&mut self) {
        if let Some(total) = self.total_iterations {
            let done = self.iteration + 1;
            let avg_time_per_iter = self.elapsed.as_secs_f64() / done as f64;
            let remaining_iters = total.saturating_sub(done);
            self.estimated_remaining =
                Some(Duration::from_secs_f64(avg_time_per_iter * remaining_iters as f64));
        }
    }
}

/// Observer of optimizer progress.
pub trait ProgressCallback: Send + Sync {
    /// Called after each gradient step.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when optimization starts.
    fn on_start(&self) {}

    /// Called when optimization stops, with the stop condition description.
    fn on_complete(&self, _iterations: usize, _stop_description: &str) {}

    /// Called when optimization fails.
    fn on_error(&self, _error: &str) {}
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log interval (iterations).
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 10 }
    }
}

impl ConsoleProgressCallback {
    /// Create a new console progress callback.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        let last = info.total_iterations == Some(info.iteration + 1);
        if info.iteration % self.log_interval == 0 || last {
            let remaining = info
                .estimated_remaining
                .map(|d| format!("{:.2}s", d.as_secs_f64()))
                .unwrap_or_else(|| "N/A".to_string());
            tracing::info!(
                "Iter {:>3} | MI: {:.6} | LR: {:.3e} | Conv: {} | Params: [{}] | ETA: {}",
                info.iteration,
                info.metric_value(),
                info.learning_rate,
                info.convergence_value
                    .map(|v| format!("{:.3e}", v))
                    .unwrap_or_else(|| "-".to_string()),
                format_parameters(&info.parameters),
                remaining
            );
        }
    }

    fn on_start(&self) {
        tracing::info!("Registration started");
    }

    fn on_complete(&self, iterations: usize, stop_description: &str) {
        tracing::info!("Registration stopped after {} iterations: {}", iterations, stop_description);
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Registration failed: {}", error);
    }
}

fn format_parameters(parameters: &RigidParameters) -> String {
    parameters
        .iter()
        .map(|p| format!("{:.4}", p))
        .collect::<Vec<_>>()
        .join(", ")
}

/// History callback that records all progress information.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl HistoryCallback {
    /// Create a new history callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded history.
    pub fn get_history(&self) -> Vec<ProgressInfo> {
        lock(&self.history).clone()
    }

    /// Number of recorded iterations.
    pub fn len(&self) -> usize {
        lock(&self.history).len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear the history.
    pub fn clear(&self) {
        lock(&self.history).clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        lock(&self.history).push(info.clone());
    }
}

// A panicking observer must not take the tracker down with it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared flag that requests the optimizer to stop at the next iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Progress tracker that manages multiple callbacks.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Arc<Mutex<Option<Instant>>>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    /// Builder-style [`add_callback`](Self::add_callback).
    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.add_callback(callback);
        self
    }

    /// Number of registered callbacks.
    pub fn num_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    /// Start tracking.
    pub fn start(&self) {
        *lock(&self.start_time) = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_start();
        }
    }

    /// Time elapsed since [`start`](Self::start).
    pub fn elapsed(&self) -> Duration {
        lock(&self.start_time)
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Notify all callbacks of a completed iteration.
    pub fn update(&self, mut info: ProgressInfo) {
        info.elapsed = self.elapsed();
        info.calculate_remaining();
        for callback in &self.callbacks {
            callback.on_progress(&info);
        }
    }

    /// Complete tracking.
    pub fn complete(&self, iterations: usize, stop_description: &str) {
        for callback in &self.callbacks {
            callback.on_complete(iterations, stop_description);
        }
    }

    /// Report error.
    pub fn error(&self, error: &str) {
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(iteration: usize, cost: f64) -> ProgressInfo {
        ProgressInfo::new(iteration, Some(10), cost, 0.5, RigidParameters::zeros())
    }

    #[test]
    fn test_progress_info() {
        let info = info(4, -0.5);
        assert_eq!(info.iteration, 4);
        assert_eq!(info.metric_value(), 0.5);
        assert_eq!(info.progress_percent(), Some(50.0));
    }

    #[test]
    fn test_progress_info_remaining() {
        let mut info = info(1, -0.5);
        info.elapsed = Duration::from_secs(2);
        info.calculate_remaining();
        assert_eq!(info.estimated_remaining, Some(Duration::from_secs(8)));
    }

    #[test]
    fn test_history_callback() {
        let history = Arc::new(HistoryCallback::new());
        let tracker = ProgressTracker::new().with_callback(history.clone());
        tracker.start();
        tracker.update(info(0, -0.1));
        tracker.update(info(1, -0.2));
        assert_eq!(history.len(), 2);
        assert_eq!(history.get_history()[1].cost, -0.2);
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }
}
