//! Random voxel sampling for metric evaluation.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

/// Draws a fresh set of distinct voxel offsets at every call.
#[derive(Debug, Clone)]
pub struct VoxelSampler {
    percentage: f64,
    rng: StdRng,
}

impl VoxelSampler {
    /// Sampler taking `percentage` of the voxels, seeded when `seed` is given.
    pub fn new(percentage: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { percentage, rng }
    }

    /// Sampling fraction.
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// `max(1, floor(percentage * total))`, never more than `total`.
    pub fn sample_count(&self, total: usize) -> usize {
        ((self.percentage * total as f64).floor() as usize).clamp(1, total.max(1))
    }

    /// Sorted distinct offsets into a volume of `total` voxels.
    pub fn draw(&mut self, total: usize) -> Vec<usize> {
        if total == 0 {
            return Vec::new();
        }
        let amount = self.sample_count(total);
        if amount == total {
            return (0..total).collect();
        }
        let mut offsets = index::sample(&mut self.rng, total, amount).into_vec();
        offsets.sort_unstable();
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count() {
        let sampler = VoxelSampler::new(0.01, Some(1));
        assert_eq!(sampler.sample_count(1000), 10);
        assert_eq!(sampler.sample_count(50), 1);
        assert_eq!(VoxelSampler::new(1.0, None).sample_count(7), 7);
    }

    #[test]
    fn test_draw_is_distinct_and_in_range() {
        let mut sampler = VoxelSampler::new(0.25, Some(7));
        let offsets = sampler.draw(400);
        assert_eq!(offsets.len(), 100);
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert!(offsets.iter().all(|&o| o < 400));
    }

    #[test]
    fn test_seeded_draws_repeat() {
        let mut a = VoxelSampler::new(0.1, Some(42));
        let mut b = VoxelSampler::new(0.1, Some(42));
        assert_eq!(a.draw(1000), b.draw(1000));
        // Consecutive draws are fresh.
        assert_ne!(a.draw(1000), a.draw(1000));
    }

    #[test]
    fn test_full_sampling_takes_every_voxel() {
        let mut sampler = VoxelSampler::new(1.0, None);
        assert_eq!(sampler.draw(5), vec![0, 1, 2, 3, 4]);
    }
}
