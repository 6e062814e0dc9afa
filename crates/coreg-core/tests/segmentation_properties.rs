use coreg_core::filter::{fill_holes, label_components};
use coreg_core::image::{ImageBuffer, ImageGrid};
use coreg_core::segmentation::{BodyMaskSegmenter, Modality};
use proptest::prelude::*;

const N: usize = 14;

proptest! {
    #[test]
    fn segmentation_keeps_only_the_large_blob(
        specks in prop::collection::vec((0usize..N, 0usize..N, 0usize..N), 0..12)
    ) {
        let grid = ImageGrid::with_size([N, N, N]);
        let in_blob = |x: usize, y: usize, z: usize| {
            (4..10).contains(&x) && (4..10).contains(&y) && (4..10).contains(&z)
        };
        // Specks never touch the blob.
        let near_blob = |x: usize, y: usize, z: usize| {
            (3..11).contains(&x) && (3..11).contains(&y) && (3..11).contains(&z)
        };
        let mut values = vec![-1000.0f32; grid.num_voxels()];
        for z in 0..N {
            for y in 0..N {
                for x in 0..N {
                    if in_blob(x, y, z) {
                        values[grid.linear_index(x, y, z)] = 50.0;
                    }
                }
            }
        }
        for &(x, y, z) in &specks {
            if !near_blob(x, y, z) {
                values[grid.linear_index(x, y, z)] = 50.0;
            }
        }

        let image = ImageBuffer::new(grid, values).unwrap();
        let mask = BodyMaskSegmenter::default().segment(&image, Modality::Ct);

        prop_assert_eq!(mask.count(), 216);
        prop_assert_eq!(label_components(&mask).count(), 1);
        prop_assert_eq!(fill_holes(&mask), mask.clone());
    }
}
