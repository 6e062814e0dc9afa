//! Image orientation matrices.

use nalgebra::SMatrix;
use super::Vector;
use serde::{Serialize, Deserialize};

/// Direction matrix representing image orientation.
///
/// Column i holds the physical direction of the i-th image axis. For valid
/// images the matrix is orthonormal, so its inverse is its transpose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    /// Wrap a nalgebra matrix.
    pub fn from_matrix(matrix: SMatrix<f64, D, D>) -> Self {
        Self(matrix)
    }

    /// Check if the columns are unit length and mutually orthogonal.
    pub fn is_orthonormal(&self, tolerance: f64) -> bool {
        let product = self.0.transpose() * self.0;
        (0..D).all(|i| {
            (0..D).all(|j| {
                let expected = if i == j { 1.0 } else { 0.0 };
                (product[(i, j)] - expected).abs() < tolerance
            })
        })
    }

    /// Orthonormal with determinant +1.
    pub fn is_proper_rotation(&self) -> bool {
        self.is_orthonormal(1e-6) && (self.determinant() - 1.0).abs() < 1e-6
    }

    /// Determinant by Gaussian elimination with partial pivoting.
    pub fn determinant(&self) -> f64 {
        let mut m = self.0;
        let mut det = 1.0;
        for i in 0..D {
            let mut pivot = i;
            for k in (i + 1)..D {
                if m[(k, i)].abs() > m[(pivot, i)].abs() {
                    pivot = k;
                }
            }
            if m[(pivot, i)].abs() < 1e-12 {
                return 0.0;
            }
            if pivot != i {
                m.swap_rows(i, pivot);
                det = -det;
            }
            det *= m[(i, i)];
            for j in (i + 1)..D {
                let factor = m[(j, i)] / m[(i, i)];
                for k in i..D {
                    m[(j, k)] -= factor * m[(i, k)];
                }
            }
        }
        det
    }

    pub fn inner(&self) -> &SMatrix<f64, D, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::IndexMut<(usize, usize)> for Direction<D> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const D: usize> std::ops::Mul for Direction<D> {
    type Output = Self;

    fn mul(self, other: Self) -> Self::Output {
        Self(self.0 * other.0)
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, vector: Vector<D>) -> Self::Output {
        Vector(self.0 * vector.0)
    }
}
