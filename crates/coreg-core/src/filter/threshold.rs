//! Intensity thresholds producing binary masks.

use crate::image::ImageBuffer;
use crate::segmentation::BinaryMask;

/// Foreground where the value is strictly above `threshold`.
pub fn binary_threshold(image: &ImageBuffer, threshold: f64) -> BinaryMask {
    let voxels = image.values().iter().map(|&v| v as f64 > threshold).collect();
    BinaryMask::from_buffer_voxels(*image.grid(), voxels)
}

/// Otsu threshold over a `bins`-bin histogram spanning the value range.
///
/// Returns the upper edge of the bin that maximises the between-class
/// variance; voxels above it are foreground. A constant image returns its
/// value, so nothing is foreground.
pub fn otsu_threshold(values: &[f32], bins: usize) -> f64 {
    let bins = bins.max(2);
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });
    if values.is_empty() || hi <= lo {
        return if values.is_empty() { 0.0 } else { hi };
    }

    let width = (hi - lo) / bins as f64;
    let mut hist = vec![0u64; bins];
    for &v in values {
        let bin = (((v as f64 - lo) / width) as usize).min(bins - 1);
        hist[bin] += 1;
    }

    let total = values.len() as f64;
    let center = |i: usize| lo + (i as f64 + 0.5) * width;
    let sum_all: f64 = hist.iter().enumerate().map(|(i, &c)| center(i) * c as f64).sum();

    let mut weight_background = 0.0f64;
    let mut sum_background = 0.0f64;
    let mut best_between = -1.0f64;
    let mut best_bin = 0usize;

    for (i, &count) in hist.iter().enumerate() {
        weight_background += count as f64;
        if weight_background <= f64::EPSILON {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground <= f64::EPSILON {
            break;
        }

        sum_background += center(i) * count as f64;
        let mean_background = sum_background / weight_background;
        let mean_foreground = (sum_all - sum_background) / weight_foreground;
        let diff = mean_background - mean_foreground;
        let between = weight_background * weight_foreground * diff * diff;

        if between > best_between {
            best_between = between;
            best_bin = i;
        }
    }

    lo + (best_bin as f64 + 1.0) * width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageGrid;

    #[test]
    fn test_binary_threshold_is_strict() {
        let grid = ImageGrid::with_size([4, 1, 1]);
        let image = ImageBuffer::new(grid, vec![-1000.0, -300.0, -299.0, 40.0]).unwrap();
        let mask = binary_threshold(&image, -300.0);
        assert_eq!(mask.voxels(), &[false, false, true, true]);
    }

    #[test]
    fn test_otsu_splits_bimodal_values() {
        let mut values = vec![30.0f32; 500];
        values.extend(std::iter::repeat(220.0f32).take(300));
        let t = otsu_threshold(&values, 128);
        assert!(t >= 30.0 && t < 220.0, "threshold {t}");
    }

    #[test]
    fn test_otsu_with_noise_lands_between_modes() {
        let mut values = Vec::new();
        for i in 0..400 {
            values.push(10.0 + (i % 7) as f32);
            values.push(200.0 + (i % 11) as f32);
        }
        let t = otsu_threshold(&values, 128);
        assert!(t > 16.0 && t < 200.0, "threshold {t}");
    }

    #[test]
    fn test_otsu_constant_image_has_no_foreground() {
        let values = vec![5.0f32; 10];
        let t = otsu_threshold(&values, 128);
        assert!(values.iter().all(|&v| (v as f64) <= t));
    }
}
