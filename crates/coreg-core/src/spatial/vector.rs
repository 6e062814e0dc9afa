//! Physical displacements; also the storage of voxel spacing.

use nalgebra::SVector;
use serde::{Serialize, Deserialize};

/// Displacement in physical space (translations, offsets, spacing).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector<const D: usize>(pub SVector<f64, D>);

impl<const D: usize> Vector<D> {
    pub fn new(components: [f64; D]) -> Self {
        Self(SVector::from(components))
    }

    pub fn zeros() -> Self {
        Self(SVector::zeros())
    }

    pub fn to_array(&self) -> [f64; D] {
        self.0.into()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.0.norm()
    }

    pub fn inner(&self) -> &SVector<f64, D> {
        &self.0
    }
}

impl<const D: usize> From<SVector<f64, D>> for Vector<D> {
    fn from(inner: SVector<f64, D>) -> Self {
        Self(inner)
    }
}

impl<const D: usize> std::ops::Index<usize> for Vector<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Vector<D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const D: usize> std::ops::Add for Vector<D> {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self(self.0 + other.0)
    }
}

impl<const D: usize> std::ops::Sub for Vector<D> {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self(self.0 - other.0)
    }
}

impl<const D: usize> std::ops::Mul<f64> for Vector<D> {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self(self.0 * scalar)
    }
}

impl<const D: usize> std::ops::Div<f64> for Vector<D> {
    type Output = Self;

    fn div(self, scalar: f64) -> Self::Output {
        Self(self.0 / scalar)
    }
}

impl<const D: usize> std::ops::Neg for Vector<D> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Vector3 = Vector<3>;

    #[test]
    fn test_vector_creation() {
        let v = Vector3::new([1.0, 2.0, 3.0]);
        assert_eq!(v.to_array(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_vector_arithmetic() {
        let v1 = Vector3::new([1.0, 2.0, 3.0]);
        let v2 = Vector3::new([4.0, 5.0, 6.0]);

        assert_eq!(v1 + v2, Vector3::new([5.0, 7.0, 9.0]));
        assert_eq!(v2 - v1, Vector3::new([3.0, 3.0, 3.0]));
        assert_eq!(v1 * 2.0, Vector3::new([2.0, 4.0, 6.0]));
        assert_eq!(v2 / 2.0, Vector3::new([2.0, 2.5, 3.0]));
        assert_eq!(-v1, Vector3::new([-1.0, -2.0, -3.0]));
    }

    #[test]
    fn test_vector_from_nalgebra() {
        let v = Vector3::from(SVector::<f64, 3>::new(1.0, -2.0, 4.0));
        assert_eq!(v.to_array(), [1.0, -2.0, 4.0]);
    }

    #[test]
    fn test_vector_norm() {
        let v = Vector3::new([2.0, 3.0, 6.0]);
        assert!((v.norm() - 7.0).abs() < 1e-12);
    }
}
