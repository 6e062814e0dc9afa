//! Label overlap statistics between two binary masks.

use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::mask::BinaryMask;

/// Voxel counts of a source/target mask pair and the measures derived
/// from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOverlapMeasures {
    pub source_count: usize,
    pub target_count: usize,
    pub intersection: usize,
}

impl LabelOverlapMeasures {
    /// Compare `source` against `target`. Both must share the same grid.
    pub fn compute(source: &BinaryMask, target: &BinaryMask) -> Result<Self> {
        source.grid().ensure_same_geometry(target.grid())?;
        let mut measures = Self {
            source_count: 0,
            target_count: 0,
            intersection: 0,
        };
        for (&s, &t) in source.voxels().iter().zip(target.voxels()) {
            measures.source_count += s as usize;
            measures.target_count += t as usize;
            measures.intersection += (s && t) as usize;
        }
        Ok(measures)
    }

    pub fn union(&self) -> usize {
        self.source_count + self.target_count - self.intersection
    }

    fn has_empty_operand(&self) -> bool {
        self.source_count == 0 || self.target_count == 0
    }

    /// `2|S∩T| / (|S| + |T|)` in `[0, 1]`.
    ///
    /// For non-empty masks it is 1 exactly when they are identical. When
    /// either mask is empty it is 0, including two empty masks, which are
    /// identical but share no voxels.
    pub fn dice(&self) -> f64 {
        if self.has_empty_operand() {
            return 0.0;
        }
        2.0 * self.intersection as f64 / (self.source_count + self.target_count) as f64
    }

    /// `|S∩T| / |S∪T|` in `[0, 1]`, never above [`dice`](Self::dice).
    ///
    /// Same empty-mask rule as `dice`: 0 when either mask is empty, so two
    /// empty masks give 0, not 1.
    pub fn jaccard(&self) -> f64 {
        if self.has_empty_operand() {
            return 0.0;
        }
        self.intersection as f64 / self.union() as f64
    }

    /// `2(|S| - |T|) / (|S| + |T|)`.
    pub fn volume_similarity(&self) -> f64 {
        let total = self.source_count + self.target_count;
        if total == 0 {
            return 0.0;
        }
        2.0 * (self.source_count as f64 - self.target_count as f64) / total as f64
    }

    /// Fraction of the target missed by the source.
    pub fn false_negative_error(&self) -> f64 {
        if self.target_count == 0 {
            return 0.0;
        }
        (self.target_count - self.intersection) as f64 / self.target_count as f64
    }

    /// Fraction of the source lying outside the target.
    pub fn false_positive_error(&self) -> f64 {
        if self.source_count == 0 {
            return 0.0;
        }
        (self.source_count - self.intersection) as f64 / self.source_count as f64
    }
}

/// Overlap of `source` restricted to `target` (`source ∧ target`) against
/// `target`.
pub fn restricted_overlap(source: &BinaryMask, target: &BinaryMask) -> Result<LabelOverlapMeasures> {
    let restricted = source.and(target)?;
    LabelOverlapMeasures::compute(&restricted, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageError;
    use crate::image::ImageGrid;

    fn cube(grid: ImageGrid, start: usize, side: usize) -> BinaryMask {
        let r = start..start + side;
        BinaryMask::from_fn(grid, |x, y, z| r.contains(&x) && r.contains(&y) && r.contains(&z))
    }

    #[test]
    fn test_identical_masks() {
        let grid = ImageGrid::with_size([6, 6, 6]);
        let a = cube(grid, 1, 3);
        let m = LabelOverlapMeasures::compute(&a, &a).unwrap();
        assert_eq!(m.dice(), 1.0);
        assert_eq!(m.jaccard(), 1.0);
        assert_eq!(m.volume_similarity(), 0.0);
        assert_eq!(m.false_negative_error(), 0.0);
    }

    #[test]
    fn test_one_voxel_offset() {
        let grid = ImageGrid::with_size([8, 8, 8]);
        let a = cube(grid, 1, 4);
        let b = BinaryMask::from_fn(grid, |x, y, z| {
            (2..6).contains(&x) && (1..5).contains(&y) && (1..5).contains(&z)
        });
        let m = LabelOverlapMeasures::compute(&a, &b).unwrap();
        assert_eq!(m.intersection, 48);
        assert!(m.dice() < 1.0);
        assert!((m.dice() - 0.75).abs() < 1e-12);
        assert!((m.jaccard() - 48.0 / 80.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_operand_gives_zero() {
        let grid = ImageGrid::with_size([4, 4, 4]);
        let empty = BinaryMask::empty(grid);
        let a = cube(grid, 0, 2);
        let m = LabelOverlapMeasures::compute(&empty, &a).unwrap();
        assert_eq!(m.dice(), 0.0);
        assert_eq!(m.jaccard(), 0.0);
        let both = LabelOverlapMeasures::compute(&empty, &empty).unwrap();
        assert_eq!(both.dice(), 0.0);
    }

    #[test]
    fn test_two_empty_masks_score_zero_not_one() {
        let grid = ImageGrid::with_size([3, 3, 3]);
        let empty = BinaryMask::empty(grid);
        let m = LabelOverlapMeasures::compute(&empty, &empty.clone()).unwrap();
        assert_eq!(m.union(), 0);
        assert_eq!(m.dice(), 0.0);
        assert_eq!(m.jaccard(), 0.0);

        let full = cube(grid, 0, 3);
        let same = LabelOverlapMeasures::compute(&full, &full).unwrap();
        assert_eq!(same.dice(), 1.0);
        assert_eq!(same.jaccard(), 1.0);
    }

    #[test]
    fn test_geometry_mismatch_is_an_error() {
        let a = BinaryMask::empty(ImageGrid::with_size([4, 4, 4]));
        let b = BinaryMask::empty(ImageGrid::with_size([4, 4, 5]));
        assert!(matches!(
            LabelOverlapMeasures::compute(&a, &b),
            Err(ImageError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_restricted_overlap_ignores_source_outside_target() {
        let grid = ImageGrid::with_size([8, 8, 8]);
        let big = cube(grid, 0, 6);
        let small = cube(grid, 1, 3);
        let plain = LabelOverlapMeasures::compute(&big, &small).unwrap();
        let restricted = restricted_overlap(&big, &small).unwrap();
        assert!(plain.dice() < 1.0);
        assert_eq!(restricted.dice(), 1.0);
        assert_eq!(restricted.source_count, 27);
    }
}
