use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use coreg_registration::{ProgressCallback, ProgressInfo};

/// Terminal progress bar over optimizer iterations.
pub struct BarProgressCallback {
    bar: ProgressBar,
}

impl BarProgressCallback {
    pub fn new(max_iterations: usize) -> Result<Self> {
        let bar = ProgressBar::new(max_iterations as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.iteration as u64 + 1);
        self.bar.set_message(format!("MI {:.5}", info.metric_value()));
    }

    fn on_complete(&self, iterations: usize, stop_description: &str) {
        self.bar.finish_with_message(format!("{} iterations: {}", iterations, stop_description));
    }

    fn on_error(&self, error: &str) {
        self.bar.abandon_with_message(error.to_string());
    }
}
