use coreg_core::image::ImageGrid;
use coreg_core::segmentation::{restricted_overlap, BinaryMask, LabelOverlapMeasures};
use proptest::prelude::*;

const SIZE: [usize; 3] = [4, 4, 3];

fn mask_strategy() -> impl Strategy<Value = BinaryMask> {
    prop::collection::vec(any::<bool>(), SIZE.iter().product::<usize>())
        .prop_map(|voxels| BinaryMask::new(ImageGrid::with_size(SIZE), voxels).unwrap())
}

proptest! {
    #[test]
    fn overlap_coefficients_are_bounded_and_ordered(a in mask_strategy(), b in mask_strategy()) {
        let m = LabelOverlapMeasures::compute(&a, &b).unwrap();
        let (dice, jaccard) = (m.dice(), m.jaccard());
        prop_assert!((0.0..=1.0).contains(&dice));
        prop_assert!((0.0..=1.0).contains(&jaccard));
        prop_assert!(dice >= jaccard - 1e-12);
    }

    #[test]
    fn overlap_is_one_iff_identical(a in mask_strategy(), b in mask_strategy()) {
        let m = LabelOverlapMeasures::compute(&a, &b).unwrap();
        let identical = !a.is_empty() && a == b;
        prop_assert_eq!(m.dice() == 1.0, identical);
        prop_assert_eq!(m.jaccard() == 1.0, identical);
    }

    #[test]
    fn overlap_is_zero_iff_disjoint_or_empty(a in mask_strategy(), b in mask_strategy()) {
        let m = LabelOverlapMeasures::compute(&a, &b).unwrap();
        let disjoint = a.voxels().iter().zip(b.voxels()).all(|(&x, &y)| !(x && y));
        prop_assert_eq!(m.dice() == 0.0, disjoint);
        prop_assert_eq!(m.jaccard() == 0.0, disjoint);
    }

    #[test]
    fn overlap_is_symmetric(a in mask_strategy(), b in mask_strategy()) {
        let ab = LabelOverlapMeasures::compute(&a, &b).unwrap();
        let ba = LabelOverlapMeasures::compute(&b, &a).unwrap();
        prop_assert_eq!(ab.dice(), ba.dice());
        prop_assert_eq!(ab.jaccard(), ba.jaccard());
    }

    #[test]
    fn restricted_overlap_never_has_false_positives(a in mask_strategy(), b in mask_strategy()) {
        let m = restricted_overlap(&a, &b).unwrap();
        prop_assert_eq!(m.false_positive_error(), 0.0);
        prop_assert!(m.source_count <= m.target_count);
    }
}
