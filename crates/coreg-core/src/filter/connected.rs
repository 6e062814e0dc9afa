//! Connected component labelling.

use std::collections::VecDeque;
use crate::segmentation::BinaryMask;
use super::morphology::face_neighbors;

/// 6-connected component labels.
///
/// Label 0 is background; components are numbered from 1 in raster order of
/// their first voxel.
#[derive(Debug, Clone)]
pub struct ComponentLabels {
    labels: Vec<u32>,
    sizes: Vec<usize>,
}

impl ComponentLabels {
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Number of components.
    pub fn count(&self) -> usize {
        self.sizes.len()
    }

    /// Voxel count of component `label` (1-based).
    pub fn size_of(&self, label: u32) -> usize {
        label
            .checked_sub(1)
            .and_then(|i| self.sizes.get(i as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Label of the largest component; ties go to the lowest label.
    pub fn largest(&self) -> Option<u32> {
        let mut best: Option<(u32, usize)> = None;
        for (i, &size) in self.sizes.iter().enumerate() {
            if best.map_or(true, |(_, s)| size > s) {
                best = Some((i as u32 + 1, size));
            }
        }
        best.map(|(label, _)| label)
    }
}

/// Label the 6-connected components of `mask`.
pub fn label_components(mask: &BinaryMask) -> ComponentLabels {
    let grid = *mask.grid();
    let size = grid.size();
    let voxels = mask.voxels();
    let mut labels = vec![0u32; voxels.len()];
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..voxels.len() {
        if !voxels[start] || labels[start] != 0 {
            continue;
        }
        let label = sizes.len() as u32 + 1;
        let mut count = 0usize;
        labels[start] = label;
        queue.push_back(grid.voxel_index(start));

        while let Some(voxel) = queue.pop_front() {
            count += 1;
            for [i, j, k] in face_neighbors(voxel, size) {
                let n = grid.linear_index(i, j, k);
                if voxels[n] && labels[n] == 0 {
                    labels[n] = label;
                    queue.push_back([i, j, k]);
                }
            }
        }
        sizes.push(count);
    }

    ComponentLabels { labels, sizes }
}

/// Keep only the largest 6-connected component.
pub fn keep_largest_component(mask: &BinaryMask) -> BinaryMask {
    let components = label_components(mask);
    match components.largest() {
        Some(keep) => {
            let voxels = components.labels().iter().map(|&l| l == keep).collect();
            BinaryMask::from_buffer_voxels(*mask.grid(), voxels)
        }
        None => BinaryMask::empty(*mask.grid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageGrid;

    #[test]
    fn test_labels_in_raster_order() {
        let grid = ImageGrid::with_size([5, 1, 1]);
        let mask = BinaryMask::new(grid, vec![true, false, true, true, false]).unwrap();
        let components = label_components(&mask);
        assert_eq!(components.labels(), &[1, 0, 2, 2, 0]);
        assert_eq!(components.count(), 2);
        assert_eq!(components.size_of(2), 2);
        assert_eq!(components.largest(), Some(2));
    }

    #[test]
    fn test_diagonal_voxels_are_separate() {
        let grid = ImageGrid::with_size([2, 2, 1]);
        let mask = BinaryMask::new(grid, vec![true, false, false, true]).unwrap();
        assert_eq!(label_components(&mask).count(), 2);
    }

    #[test]
    fn test_tie_keeps_lowest_label() {
        let grid = ImageGrid::with_size([5, 1, 1]);
        let mask = BinaryMask::new(grid, vec![true, true, false, true, true]).unwrap();
        let kept = keep_largest_component(&mask);
        assert_eq!(kept.voxels(), &[true, true, false, false, false]);
    }

    #[test]
    fn test_empty_mask_stays_empty() {
        let mask = BinaryMask::empty(ImageGrid::with_size([3, 3, 3]));
        assert!(keep_largest_component(&mask).is_empty());
        assert_eq!(label_components(&mask).largest(), None);
    }
}
