//! Window-based convergence monitoring.

use std::collections::VecDeque;

/// Tracks the last `window_size` cost values and reports how fast they are
/// still decreasing.
///
/// The convergence value is the negated least-squares slope of the window,
/// with the values divided by their total absolute magnitude and placed at
/// evenly spaced positions on `[0, 1]`. It is undefined until the window is
/// full.
#[derive(Debug, Clone)]
pub struct WindowConvergenceMonitor {
    window_size: usize,
    energies: VecDeque<f64>,
}

impl WindowConvergenceMonitor {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(2),
            energies: VecDeque::with_capacity(window_size.max(2)),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Push a cost value, discarding the oldest one once the window is full.
    pub fn add_energy_value(&mut self, value: f64) {
        if self.energies.len() == self.window_size {
            self.energies.pop_front();
        }
        self.energies.push_back(value);
    }

    pub fn clear(&mut self) {
        self.energies.clear();
    }

    /// `-slope` of the normalized window, or `None` before it fills up.
    pub fn convergence_value(&self) -> Option<f64> {
        if self.energies.len() < self.window_size {
            return None;
        }
        let total: f64 = self.energies.iter().map(|e| e.abs()).sum();
        if total <= f64::EPSILON {
            return Some(0.0);
        }

        let n = self.energies.len();
        let last = (n - 1) as f64;
        let mean_t = 0.5;
        let mean_e = self.energies.iter().sum::<f64>() / (n as f64 * total);

        let (mut covariance, mut variance) = (0.0, 0.0);
        for (i, energy) in self.energies.iter().enumerate() {
            let dt = i as f64 / last - mean_t;
            covariance += dt * (energy / total - mean_e);
            variance += dt * dt;
        }
        Some(-covariance / variance)
    }
}
