//! Rigid transform implementation.
//!
//! Rotation by three Euler angles followed by a translation, about a fixed
//! centre: `T(x) = R(x - c) + c + t` with `R = Rz(γ) * Ry(β) * Rx(α)`.

use burn::tensor::{Tensor, TensorData};
use burn::tensor::backend::Backend;
use nalgebra::{Matrix3, SMatrix, SVector, Vector3 as NaVector3};
use crate::error::{ImageError, Result};
use crate::spatial::{Direction3, Point3, Vector3};
use super::trait_::Transform;

/// Number of rigid parameters.
pub const RIGID_PARAMETER_COUNT: usize = 6;

/// `[αx, αy, αz, tx, ty, tz]`: Euler angles in radians, then translation.
pub type RigidParameters = SVector<f64, RIGID_PARAMETER_COUNT>;

/// Jacobian of the mapped point with respect to the 6 parameters.
pub type RigidJacobian = SMatrix<f64, 3, RIGID_PARAMETER_COUNT>;

/// Rigid Transform (Rotation + Translation) in 3-D.
///
/// The centre of rotation is fixed at construction; only the 6 parameters
/// change during optimisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    parameters: RigidParameters,
    center: Point3,
}

impl RigidTransform {
    /// Create a rigid transform from its parameters and centre.
    pub fn new(parameters: RigidParameters, center: Point3) -> Self {
        Self { parameters, center }
    }

    /// Identity transform rotating about `center`.
    pub fn identity(center: Point3) -> Self {
        Self::new(RigidParameters::zeros(), center)
    }

    /// Build from Euler angles `(x, y, z)` and a translation.
    pub fn from_components(angles: [f64; 3], translation: Vector3, center: Point3) -> Self {
        let parameters = RigidParameters::from_column_slice(&[
            angles[0],
            angles[1],
            angles[2],
            translation[0],
            translation[1],
            translation[2],
        ]);
        Self::new(parameters, center)
    }

    /// Build from a rotation matrix. Fails unless `rotation` is a proper
    /// rotation.
    pub fn from_matrix(rotation: &Matrix3<f64>, translation: Vector3, center: Point3) -> Result<Self> {
        if !Direction3::from_matrix(*rotation).is_proper_rotation() {
            return Err(ImageError::transform("matrix is not a proper rotation"));
        }
        Ok(Self::from_components(euler_angles(rotation), translation, center))
    }

    pub fn parameters(&self) -> &RigidParameters {
        &self.parameters
    }

    /// Same centre, new parameters.
    pub fn with_parameters(&self, parameters: RigidParameters) -> Self {
        Self::new(parameters, self.center)
    }

    pub fn set_parameters(&mut self, parameters: RigidParameters) {
        self.parameters = parameters;
    }

    pub fn center(&self) -> &Point3 {
        &self.center
    }

    /// Euler angles `(x, y, z)` in radians.
    pub fn angles(&self) -> [f64; 3] {
        [self.parameters[0], self.parameters[1], self.parameters[2]]
    }

    pub fn translation(&self) -> Vector3 {
        Vector3::new([self.parameters[3], self.parameters[4], self.parameters[5]])
    }

    /// Rotation matrix `Rz * Ry * Rx`.
    pub fn matrix(&self) -> Matrix3<f64> {
        let [rx, ry, rz] = axis_rotations(self.angles());
        rz * ry * rx
    }

    /// Map a single point: `R(p - c) + c + t`.
    pub fn transform_point(&self, point: &Point3) -> Point3 {
        let centered = (*point - self.center).0;
        let rotated = self.matrix() * centered;
        self.center + Vector3::from(rotated) + self.translation()
    }

    /// `∂T(p)/∂μ` as a 3×6 matrix: rotation derivatives applied to `p - c`
    /// in the first three columns, identity in the last three.
    pub fn jacobian(&self, point: &Point3) -> RigidJacobian {
        let centered = (*point - self.center).0;
        let [rx, ry, rz] = axis_rotations(self.angles());
        let [drx, dry, drz] = axis_rotation_derivatives(self.angles());

        let columns: [NaVector3<f64>; 3] = [
            rz * ry * drx * centered,
            rz * dry * rx * centered,
            drz * ry * rx * centered,
        ];

        let mut jacobian = RigidJacobian::zeros();
        for (k, column) in columns.iter().enumerate() {
            jacobian.set_column(k, column);
        }
        for k in 0..3 {
            jacobian[(k, 3 + k)] = 1.0;
        }
        jacobian
    }

    /// Inverse mapping about the same centre: rotation `R^T`, translation
    /// `-R^T t`.
    pub fn inverse(&self) -> Self {
        let inverse_rotation = self.matrix().transpose();
        let translation = -(inverse_rotation * self.translation().0);
        Self::from_components(
            euler_angles(&inverse_rotation),
            Vector3::from(translation),
            self.center,
        )
    }
}

impl<B: Backend> Transform<B, 3> for RigidTransform {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        // Row vectors: y = (x - c) @ R^T + c + t
        let [n_points, _] = points.dims();
        let device = points.device();

        let r = self.matrix();
        let mut r_t = Vec::with_capacity(9);
        for row in 0..3 {
            for col in 0..3 {
                r_t.push(r[(col, row)] as f32);
            }
        }
        let r_t = Tensor::<B, 2>::from_data(TensorData::new(r_t, [3, 3]), &device);
        let c = row_tensor::<B>(&self.center.to_array(), &device);
        let c_plus_t = row_tensor::<B>(
            &(self.center + self.translation()).to_array(),
            &device,
        );

        // Keep each matmul within GPU dispatch limits.
        const CHUNK_SIZE: usize = 32768;

        if n_points <= CHUNK_SIZE {
            (points - c).matmul(r_t) + c_plus_t
        } else {
            let num_chunks = n_points.div_ceil(CHUNK_SIZE);
            let mut chunks = Vec::with_capacity(num_chunks);
            for i in 0..num_chunks {
                let start = i * CHUNK_SIZE;
                let end = std::cmp::min(start + CHUNK_SIZE, n_points);
                let chunk = points.clone().slice([start..end]);
                chunks.push((chunk - c.clone()).matmul(r_t.clone()) + c_plus_t.clone());
            }
            Tensor::cat(chunks, 0)
        }
    }
}

fn row_tensor<B: Backend>(values: &[f64; 3], device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    Tensor::<B, 1>::from_data(TensorData::new(values, [3]), device).reshape([1, 3])
}

fn axis_rotations(angles: [f64; 3]) -> [Matrix3<f64>; 3] {
    let (sx, cx) = angles[0].sin_cos();
    let (sy, cy) = angles[1].sin_cos();
    let (sz, cz) = angles[2].sin_cos();
    [
        Matrix3::new(1.0, 0.0, 0.0, 0.0, cx, -sx, 0.0, sx, cx),
        Matrix3::new(cy, 0.0, sy, 0.0, 1.0, 0.0, -sy, 0.0, cy),
        Matrix3::new(cz, -sz, 0.0, sz, cz, 0.0, 0.0, 0.0, 1.0),
    ]
}

fn axis_rotation_derivatives(angles: [f64; 3]) -> [Matrix3<f64>; 3] {
    let (sx, cx) = angles[0].sin_cos();
    let (sy, cy) = angles[1].sin_cos();
    let (sz, cz) = angles[2].sin_cos();
    [
        Matrix3::new(0.0, 0.0, 0.0, 0.0, -sx, -cx, 0.0, cx, -sx),
        Matrix3::new(-sy, 0.0, cy, 0.0, 0.0, 0.0, -cy, 0.0, -sy),
        Matrix3::new(-sz, -cz, 0.0, cz, -sz, 0.0, 0.0, 0.0, 0.0),
    ]
}

/// Euler angles `(x, y, z)` of `R = Rz * Ry * Rx`.
fn euler_angles(r: &Matrix3<f64>) -> [f64; 3] {
    let beta = (-r[(2, 0)]).clamp(-1.0, 1.0).asin();
    if beta.cos().abs() > 1e-9 {
        let alpha = r[(2, 1)].atan2(r[(2, 2)]);
        let gamma = r[(1, 0)].atan2(r[(0, 0)]);
        [alpha, beta, gamma]
    } else {
        // Gimbal lock: only α ± γ is defined, pin α to zero.
        let gamma = (-r[(0, 1)]).atan2(r[(1, 1)]);
        [0.0, beta, gamma]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use proptest::prelude::*;
    use std::f64::consts::FRAC_PI_2;

    type TestBackend = NdArray<f32>;

    fn sample_transform() -> RigidTransform {
        RigidTransform::from_components(
            [0.1, -0.2, 0.3],
            Vector3::new([1.0, -2.0, 3.0]),
            Point3::new([5.0, 6.0, 7.0]),
        )
    }

    #[test]
    fn test_identity_maps_points_to_themselves() {
        let t = RigidTransform::identity(Point3::new([1.0, 2.0, 3.0]));
        let p = Point3::new([4.0, -1.0, 0.5]);
        assert!(t.transform_point(&p).distance(&p) < 1e-12);
    }

    #[test]
    fn test_rotation_about_z() {
        let t = RigidTransform::from_components([0.0, 0.0, FRAC_PI_2], Vector3::zeros(), Point3::origin());
        let p = t.transform_point(&Point3::new([1.0, 0.0, 0.0]));
        assert!(p.distance(&Point3::new([0.0, 1.0, 0.0])) < 1e-12);
    }

    #[test]
    fn test_center_is_fixed_point_of_rotation() {
        let center = Point3::new([5.0, 6.0, 7.0]);
        let t = RigidTransform::from_components([0.4, 0.1, -0.7], Vector3::zeros(), center);
        assert!(t.transform_point(&center).distance(&center) < 1e-12);
    }

    #[test]
    fn test_inverse_of_pure_translation() {
        let t = RigidTransform::from_components([0.0; 3], Vector3::new([2.0, -1.0, 0.5]), Point3::origin());
        let inverse = t.inverse();
        assert_eq!(inverse.translation(), Vector3::new([-2.0, 1.0, -0.5]));
        let p = Point3::new([1.0, 1.0, 1.0]);
        assert!(inverse.transform_point(&p).distance(&Point3::new([-1.0, 2.0, 0.5])) < 1e-12);
    }

    #[test]
    fn test_matrix_is_proper_rotation() {
        let r = sample_transform().matrix();
        assert!(Direction3::from_matrix(r).is_proper_rotation());
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let t = sample_transform();
        let p = Point3::new([-3.0, 2.0, 11.0]);
        let jacobian = t.jacobian(&p);
        let h = 1e-6;
        for k in 0..RIGID_PARAMETER_COUNT {
            let mut plus = *t.parameters();
            let mut minus = *t.parameters();
            plus[k] += h;
            minus[k] -= h;
            let a = t.with_parameters(plus).transform_point(&p);
            let b = t.with_parameters(minus).transform_point(&p);
            for row in 0..3 {
                let numeric = (a[row] - b[row]) / (2.0 * h);
                assert!((numeric - jacobian[(row, k)]).abs() < 1e-6, "param {k} row {row}");
            }
        }
    }

    #[test]
    fn test_from_matrix_recovers_angles() {
        let t = sample_transform();
        let rebuilt = RigidTransform::from_matrix(&t.matrix(), t.translation(), *t.center()).unwrap();
        for k in 0..RIGID_PARAMETER_COUNT {
            assert!((rebuilt.parameters()[k] - t.parameters()[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_from_matrix_handles_gimbal_lock() {
        let t = RigidTransform::from_components([0.3, FRAC_PI_2, 0.2], Vector3::zeros(), Point3::origin());
        let rebuilt = RigidTransform::from_matrix(&t.matrix(), Vector3::zeros(), Point3::origin()).unwrap();
        assert!((rebuilt.matrix() - t.matrix()).norm() < 1e-9);
    }

    #[test]
    fn test_from_matrix_rejects_reflection() {
        let reflection = Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(RigidTransform::from_matrix(&reflection, Vector3::zeros(), Point3::origin()).is_err());
    }

    #[test]
    fn test_tensor_path_matches_host_path() {
        let device = Default::default();
        let t = sample_transform();
        let points = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]], &device);
        let mapped = Transform::<TestBackend, 3>::transform_points(&t, points).into_data();
        let slice = mapped.as_slice::<f32>().unwrap();
        let expected = t.transform_point(&Point3::new([1.0, 2.0, 3.0]));
        for i in 0..3 {
            assert!((slice[3 + i] as f64 - expected[i]).abs() < 1e-4);
        }
    }

    proptest! {
        #[test]
        fn prop_inverse_roundtrip(
            ax in -3.0f64..3.0, ay in -1.5f64..1.5, az in -3.0f64..3.0,
            tx in -50.0f64..50.0, ty in -50.0f64..50.0, tz in -50.0f64..50.0,
            px in -100.0f64..100.0, py in -100.0f64..100.0, pz in -100.0f64..100.0,
        ) {
            let t = RigidTransform::from_components(
                [ax, ay, az],
                Vector3::new([tx, ty, tz]),
                Point3::new([3.0, -4.0, 10.0]),
            );
            let p = Point3::new([px, py, pz]);
            let back = t.inverse().transform_point(&t.transform_point(&p));
            prop_assert!(back.distance(&p) < 1e-8);
        }
    }
}
