//! Binary hole filling.

use std::collections::VecDeque;
use crate::segmentation::BinaryMask;

/// Offsets of the 6-connected neighbours of voxel `(x, y, z)` inside `size`.
pub(crate) fn face_neighbors(
    [x, y, z]: [usize; 3],
    [nx, ny, nz]: [usize; 3],
) -> impl Iterator<Item = [usize; 3]> {
    let candidates = [
        (x > 0).then(|| [x - 1, y, z]),
        (x + 1 < nx).then(|| [x + 1, y, z]),
        (y > 0).then(|| [x, y - 1, z]),
        (y + 1 < ny).then(|| [x, y + 1, z]),
        (z > 0).then(|| [x, y, z - 1]),
        (z + 1 < nz).then(|| [x, y, z + 1]),
    ];
    candidates.into_iter().flatten()
}

/// Fill background regions that are not 6-connected to the volume border.
pub fn fill_holes(mask: &BinaryMask) -> BinaryMask {
    let grid = *mask.grid();
    let size = grid.size();
    let [nx, ny, nz] = size;
    let voxels = mask.voxels();

    // Flood the background from every border voxel.
    let mut outside = vec![false; voxels.len()];
    let mut queue = VecDeque::new();
    for (offset, &set) in voxels.iter().enumerate() {
        if set {
            continue;
        }
        let [x, y, z] = grid.voxel_index(offset);
        if x == 0 || y == 0 || z == 0 || x == nx - 1 || y == ny - 1 || z == nz - 1 {
            outside[offset] = true;
            queue.push_back([x, y, z]);
        }
    }

    while let Some(voxel) = queue.pop_front() {
        for [i, j, k] in face_neighbors(voxel, size) {
            let n = grid.linear_index(i, j, k);
            if !voxels[n] && !outside[n] {
                outside[n] = true;
                queue.push_back([i, j, k]);
            }
        }
    }

    let filled = outside.into_iter().map(|o| !o).collect();
    BinaryMask::from_buffer_voxels(grid, filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageGrid;

    #[test]
    fn test_fill_enclosed_cavity() {
        let grid = ImageGrid::with_size([5, 5, 5]);
        // Hollow shell occupying 1..=3 on every axis.
        let shell = BinaryMask::from_fn(grid, |x, y, z| {
            let inside = (1..=3).contains(&x) && (1..=3).contains(&y) && (1..=3).contains(&z);
            inside && !(x == 2 && y == 2 && z == 2)
        });
        assert!(!shell.get(2, 2, 2));
        let filled = fill_holes(&shell);
        assert!(filled.get(2, 2, 2));
        assert_eq!(filled.count(), 27);
    }

    #[test]
    fn test_open_cavity_is_not_filled() {
        let grid = ImageGrid::with_size([5, 5, 5]);
        // A tube along z is open at both ends.
        let tube = BinaryMask::from_fn(grid, |x, y, _| {
            (1..=3).contains(&x) && (1..=3).contains(&y) && !(x == 2 && y == 2)
        });
        let filled = fill_holes(&tube);
        assert_eq!(filled, tube);
    }

    #[test]
    fn test_neighbors_respect_bounds() {
        assert_eq!(face_neighbors([0, 0, 0], [2, 2, 2]).count(), 3);
        assert_eq!(face_neighbors([1, 1, 1], [3, 3, 3]).count(), 6);
    }
}
