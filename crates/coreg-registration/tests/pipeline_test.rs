use burn_ndarray::NdArray;

use coreg_core::image::{Image, ImageGrid, PixelKind};
use coreg_core::spatial::{Direction3, Point3, Spacing3, Vector3};
use coreg_core::transform::RigidTransform;
use coreg_registration::quality::evaluate_alignment_quality;
use coreg_registration::{
    CoRegistrationPipeline, GradientDescentConfig, MetricConfig, PipelineConfig, RegistrationConfig,
    SegmentationConfig,
};

type B = NdArray<f32>;

const SIZE: usize = 22;

fn grid() -> ImageGrid {
    ImageGrid::new(
        [SIZE; 3],
        Point3::new([-10.0, 5.0, 30.0]),
        Spacing3::uniform(1.0),
        Direction3::identity(),
    )
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Body occupancy (soft ellipsoid) and a bone blob, relative to `c`.
fn anatomy(p: [f64; 3], c: [f64; 3]) -> (f64, f64) {
    let d: Vec<f64> = (0..3).map(|i| p[i] - c[i]).collect();
    let r = ((d[0] / 7.0).powi(2) + (d[1] / 6.0).powi(2) + (d[2] / 5.0).powi(2)).sqrt();
    let body = sigmoid(12.0 * (1.0 - r));
    let bone_r2 = (d[0] - 2.5).powi(2) + (d[1] + 1.5).powi(2) + d[2].powi(2);
    let bone = (-bone_r2 / (2.0 * 2.5 * 2.5)).exp();
    (body, bone)
}

fn image(kind: PixelKind, f: impl Fn(Point3) -> f64) -> Image<B, 3> {
    let grid = grid();
    let values = (0..grid.num_voxels())
        .map(|o| {
            let [x, y, z] = grid.voxel_index(o);
            f(grid.index_to_physical([x as f64, y as f64, z as f64])).round() as f32
        })
        .collect();
    Image::from_values(&grid, values, kind, &Default::default()).unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig::default().with_registration(
        RegistrationConfig::default()
            .with_metric(
                MetricConfig::default()
                    .with_histogram_bins(32)
                    .with_sampling_percentage(1.0)
                    .with_seed(5),
            )
            .with_optimizer(GradientDescentConfig::default().with_max_iterations(200)),
    )
}

#[test]
fn test_pipeline_improves_body_overlap() {
    let center = grid().center();
    let c = center.to_array();
    let truth = RigidTransform::from_components([0.0, 0.04, 0.0], Vector3::new([2.0, -1.5, 1.0]), center);
    let inverse = truth.inverse();

    let ct = image(PixelKind::Int16, |p| {
        let (body, bone) = anatomy(p.to_array(), c);
        -1000.0 + 1400.0 * body + 600.0 * bone * body
    });
    let mri = image(PixelKind::UInt16, |q| {
        let (body, bone) = anatomy(inverse.transform_point(&q).to_array(), c);
        10.0 + 290.0 * body - 150.0 * bone * body
    });

    let before = evaluate_alignment_quality(&ct, &mri, &SegmentationConfig::default()).unwrap();

    let pipeline = CoRegistrationPipeline::new(config()).unwrap();
    let output = pipeline.run(&ct, &mri).unwrap();

    assert_eq!(output.ct_fixed.pixel_kind(), PixelKind::Float32);
    assert_eq!(output.mri_aligned.pixel_kind(), PixelKind::UInt16);
    assert_eq!(output.mri_aligned.size(), [SIZE; 3]);
    assert!((output.mri_shift + 10.0).abs() < 1e-6);

    let report = &output.quality.report;
    assert!(report.warnings.is_empty());
    assert!(report.ct_voxels > 0 && report.mri_voxels > 0);
    assert!(
        report.dice() > before.report.dice(),
        "dice {} before {}",
        report.dice(),
        before.report.dice()
    );
    assert!(report.dice() > 0.85, "dice {}", report.dice());
    assert!(report.jaccard() <= report.dice());
}

#[test]
fn test_invalid_pipeline_config_is_rejected() {
    let config = config().with_segmentation(SegmentationConfig::default().with_otsu_bins(1));
    assert!(CoRegistrationPipeline::new(config).is_err());
}
