//! Physical positions (image origins, voxel centres, rotation centres).

use nalgebra::Point as NaPoint;
use super::Vector;
use serde::{Serialize, Deserialize};

/// Position in physical space, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<const D: usize>(pub NaPoint<f64, D>);

impl<const D: usize> Point<D> {
    pub fn new(coords: [f64; D]) -> Self {
        Self(NaPoint::from(coords))
    }

    pub fn origin() -> Self {
        Self(NaPoint::origin())
    }

    pub fn to_array(&self) -> [f64; D] {
        self.0.coords.into()
    }

    /// Position vector of the point (point - origin).
    pub fn coords(&self) -> Vector<D> {
        Vector(self.0.coords)
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Self) -> f64 {
        (self.0.coords - other.0.coords).norm()
    }

    pub fn inner(&self) -> &NaPoint<f64, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0.coords[index]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Point<D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0.coords[index]
    }
}

impl<const D: usize> std::ops::Sub for Point<D> {
    type Output = Vector<D>;

    fn sub(self, other: Self) -> Self::Output {
        Vector(self.0.coords - other.0.coords)
    }
}

impl<const D: usize> std::ops::Add<Vector<D>> for Point<D> {
    type Output = Self;

    fn add(self, vector: Vector<D>) -> Self::Output {
        Self(self.0 + vector.0)
    }
}

impl<const D: usize> std::ops::Sub<Vector<D>> for Point<D> {
    type Output = Self;

    fn sub(self, vector: Vector<D>) -> Self::Output {
        Self(self.0 - vector.0)
    }
}
