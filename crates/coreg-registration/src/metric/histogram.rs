//! Joint probability density estimation for Mattes mutual information.
//!
//! Fixed intensities are binned with a zero-order (box) kernel and moving
//! intensities with a cubic B-spline Parzen window, so the density is
//! differentiable with respect to the moving intensity.

/// Bins reserved at each end of the histogram so that the cubic window of
/// any in-range intensity stays inside the table.
pub const HISTOGRAM_PADDING: usize = 2;

/// Probabilities below this are treated as zero.
pub const PROBABILITY_EPSILON: f64 = 1e-16;

/// Cubic B-spline kernel, support `(-2, 2)`.
#[inline]
pub fn cubic_bspline(u: f64) -> f64 {
    let a = u.abs();
    if a < 1.0 {
        (4.0 - 6.0 * a * a + 3.0 * a * a * a) / 6.0
    } else if a < 2.0 {
        let t = 2.0 - a;
        t * t * t / 6.0
    } else {
        0.0
    }
}

/// Derivative of [`cubic_bspline`].
#[inline]
pub fn cubic_bspline_derivative(u: f64) -> f64 {
    let a = u.abs();
    if a < 1.0 {
        -2.0 * u + 1.5 * u * a
    } else if a < 2.0 {
        let t = 2.0 - a;
        -0.5 * t * t * u.signum()
    } else {
        0.0
    }
}

/// Maps intensities onto continuous bin coordinates.
///
/// The intensity range `[min, max]` covers `bins - 4` bins, leaving
/// [`HISTOGRAM_PADDING`] bins at either end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityBinning {
    bins: usize,
    bin_size: f64,
    normalized_min: f64,
}

impl IntensityBinning {
    /// Binning for intensities in `[min, max]`. A degenerate range gets a unit bin size.
    pub fn new(min: f64, max: f64, bins: usize) -> Self {
        let usable = bins.saturating_sub(2 * HISTOGRAM_PADDING).max(1) as f64;
        let range = max - min;
        let bin_size = if range > 0.0 { range / usable } else { 1.0 };
        Self {
            bins,
            bin_size,
            normalized_min: min / bin_size - HISTOGRAM_PADDING as f64,
        }
    }

    /// Number of bins.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Intensity width of one bin.
    pub fn bin_size(&self) -> f64 {
        self.bin_size
    }

    /// Continuous bin coordinate of an intensity.
    #[inline]
    pub fn term(&self, value: f64) -> f64 {
        value / self.bin_size - self.normalized_min
    }

    /// Bin index of a continuous coordinate, clamped to `[2, bins - 3]`.
    /// NaN maps to the lowest usable bin.
    #[inline]
    pub fn index(&self, term: f64) -> usize {
        if term.is_nan() {
            return HISTOGRAM_PADDING;
        }
        let lo = HISTOGRAM_PADDING as f64;
        let hi = (self.bins - HISTOGRAM_PADDING - 1) as f64;
        term.floor().clamp(lo, hi) as usize
    }
}

/// One sample's contribution to the joint density.
#[derive(Debug, Clone, Copy)]
pub struct ParzenContribution {
    /// Fixed bin (zero-order kernel).
    pub fixed_bin: usize,
    /// First moving bin of the 4-wide cubic window.
    pub moving_start: usize,
    /// Continuous moving bin coordinate.
    pub moving_term: f64,
}

impl ParzenContribution {
    /// Contribution of a fixed/moving intensity pair.
    #[inline]
    pub fn new(fixed: &IntensityBinning, moving: &IntensityBinning, fixed_value: f64, moving_value: f64) -> Self {
        let moving_term = moving.term(moving_value);
        Self {
            fixed_bin: fixed.index(fixed.term(fixed_value)),
            moving_start: moving.index(moving_term) - 1,
            moving_term,
        }
    }

    /// Cubic weights of the moving window bins `moving_start..moving_start + 4`.
    #[inline]
    pub fn weights(&self) -> [f64; 4] {
        std::array::from_fn(|k| cubic_bspline((self.moving_start + k) as f64 - self.moving_term))
    }

    /// Kernel derivatives of the window bins with respect to the moving term.
    #[inline]
    pub fn weight_derivatives(&self) -> [f64; 4] {
        // d/dterm of beta(j - term)
        std::array::from_fn(|k| -cubic_bspline_derivative((self.moving_start + k) as f64 - self.moving_term))
    }
}

/// Normalized joint density with its marginals.
#[derive(Debug, Clone)]
pub struct JointHistogram {
    bins: usize,
    joint: Vec<f64>,
    fixed_marginal: Vec<f64>,
    moving_marginal: Vec<f64>,
    samples: usize,
}

impl JointHistogram {
    /// Empty `bins x bins` histogram.
    pub fn new(bins: usize) -> Self {
        Self {
            bins,
            joint: vec![0.0; bins * bins],
            fixed_marginal: vec![0.0; bins],
            moving_marginal: vec![0.0; bins],
            samples: 0,
        }
    }

    /// Accumulate unnormalized weights for one sample.
    pub fn accumulate(&mut self, contribution: &ParzenContribution) {
        let row = contribution.fixed_bin * self.bins;
        for (k, w) in contribution.weights().into_iter().enumerate() {
            self.joint[row + contribution.moving_start + k] += w;
        }
        self.samples += 1;
    }

    /// Divide by the sample count and derive the marginals.
    pub fn normalize(&mut self) {
        if self.samples == 0 {
            return;
        }
        let n = self.samples as f64;
        self.joint.iter_mut().for_each(|p| *p /= n);
        self.fixed_marginal.iter_mut().for_each(|p| *p = 0.0);
        self.moving_marginal.iter_mut().for_each(|p| *p = 0.0);
        for i in 0..self.bins {
            for j in 0..self.bins {
                let p = self.joint[i * self.bins + j];
                self.fixed_marginal[i] += p;
                self.moving_marginal[j] += p;
            }
        }
    }

    /// Number of accumulated samples.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Number of bins per axis.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Joint probability of fixed bin `i`, moving bin `j`.
    #[inline]
    pub fn joint(&self, i: usize, j: usize) -> f64 {
        self.joint[i * self.bins + j]
    }

    /// Fixed marginal.
    pub fn fixed_marginal(&self) -> &[f64] {
        &self.fixed_marginal
    }

    /// Moving marginal.
    pub fn moving_marginal(&self) -> &[f64] {
        &self.moving_marginal
    }

    /// `sum p log(p / (pf pm))`, skipping near-zero probabilities.
    pub fn mutual_information(&self) -> f64 {
        let mut mi = 0.0;
        for i in 0..self.bins {
            let pf = self.fixed_marginal[i];
            if pf < PROBABILITY_EPSILON {
                continue;
            }
            for j in 0..self.bins {
                let p = self.joint(i, j);
                let pm = self.moving_marginal[j];
                if p < PROBABILITY_EPSILON || pm < PROBABILITY_EPSILON {
                    continue;
                }
                mi += p * (p / (pf * pm)).ln();
            }
        }
        mi
    }

    /// `log(p / pm)` per cell, zero where either probability is negligible.
    pub fn log_ratios(&self) -> Vec<f64> {
        let mut ratios = vec![0.0; self.bins * self.bins];
        for i in 0..self.bins {
            for j in 0..self.bins {
                let p = self.joint(i, j);
                let pm = self.moving_marginal[j];
                if p >= PROBABILITY_EPSILON && pm >= PROBABILITY_EPSILON {
                    ratios[i * self.bins + j] = (p / pm).ln();
                }
            }
        }
        ratios
    }
}
