//! Centred initialisation of a rigid transform.

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::Result;
use crate::image::{Image, ImageBuffer};
use crate::spatial::{Point3, Vector3};
use super::rigid::RigidTransform;

/// How the centre of each volume is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InitializerMode {
    /// Centre of the voxel grid's bounding box.
    #[default]
    Geometry,
    /// Intensity-weighted centre of mass.
    Moments,
}

/// Aligns the centres of a fixed and a moving volume.
///
/// The produced transform rotates about the fixed centre, has identity
/// rotation, and translates by `moving_center - fixed_center`, so the fixed
/// centre maps onto the moving centre.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenteredTransformInitializer {
    mode: InitializerMode,
}

impl CenteredTransformInitializer {
    pub fn new(mode: InitializerMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> InitializerMode {
        self.mode
    }

    /// Initialise from tensor-backed images.
    pub fn initialize<B: Backend>(&self, fixed: &Image<B, 3>, moving: &Image<B, 3>) -> Result<RigidTransform> {
        match self.mode {
            InitializerMode::Geometry => Ok(centered(fixed.center(), moving.center())),
            InitializerMode::Moments => Ok(self.initialize_buffers(&fixed.to_buffer()?, &moving.to_buffer()?)),
        }
    }

    /// Initialise from host snapshots.
    pub fn initialize_buffers(&self, fixed: &ImageBuffer, moving: &ImageBuffer) -> RigidTransform {
        let (fixed_center, moving_center) = match self.mode {
            InitializerMode::Geometry => (fixed.grid().center(), moving.grid().center()),
            InitializerMode::Moments => (center_of_mass(fixed), center_of_mass(moving)),
        };
        centered(fixed_center, moving_center)
    }
}

fn centered(fixed_center: Point3, moving_center: Point3) -> RigidTransform {
    let offset: Vector3 = moving_center - fixed_center;
    debug!(
        fixed_center = ?fixed_center.to_array(),
        moving_center = ?moving_center.to_array(),
        "centred transform initialised"
    );
    RigidTransform::from_components([0.0; 3], offset, fixed_center)
}

/// Intensity-weighted centre in physical space. Falls back to the grid
/// centre when the total mass vanishes.
pub fn center_of_mass(image: &ImageBuffer) -> Point3 {
    let grid = image.grid();
    let [nx, ny, nz] = grid.size();
    let mut mass = 0.0f64;
    let mut weighted = [0.0f64; 3];
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let v = image.get(x, y, z) as f64;
                if v == 0.0 {
                    continue;
                }
                mass += v;
                weighted[0] += v * x as f64;
                weighted[1] += v * y as f64;
                weighted[2] += v * z as f64;
            }
        }
    }
    if mass.abs() <= f64::EPSILON {
        return grid.center();
    }
    grid.index_to_physical([weighted[0] / mass, weighted[1] / mass, weighted[2] / mass])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageGrid;
    use crate::spatial::{Direction3, Spacing3};

    fn buffer(size: [usize; 3], origin: [f64; 3], f: impl Fn(usize, usize, usize) -> f32) -> ImageBuffer {
        let grid = ImageGrid::new(size, Point3::new(origin), Spacing3::uniform(1.0), Direction3::identity());
        let mut values = Vec::new();
        for z in 0..size[2] {
            for y in 0..size[1] {
                for x in 0..size[0] {
                    values.push(f(x, y, z));
                }
            }
        }
        ImageBuffer::new(grid, values).unwrap()
    }

    #[test]
    fn test_geometry_maps_fixed_center_onto_moving_center() {
        let fixed = buffer([5, 5, 5], [0.0, 0.0, 0.0], |_, _, _| 1.0);
        let moving = buffer([9, 5, 3], [10.0, -4.0, 2.0], |_, _, _| 1.0);
        let t = CenteredTransformInitializer::default().initialize_buffers(&fixed, &moving);
        assert_eq!(t.center().to_array(), [2.0, 2.0, 2.0]);
        assert_eq!(t.angles(), [0.0; 3]);
        let mapped = t.transform_point(&fixed.grid().center());
        assert!(mapped.distance(&moving.grid().center()) < 1e-12);
    }

    #[test]
    fn test_moments_uses_intensity_weighting() {
        let fixed = buffer([4, 4, 4], [0.0; 3], |x, y, z| if (x, y, z) == (3, 3, 3) { 1.0 } else { 0.0 });
        let center = center_of_mass(&fixed);
        assert_eq!(center.to_array(), [3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_moments_falls_back_to_geometry_on_zero_mass() {
        let empty = buffer([3, 3, 3], [1.0, 1.0, 1.0], |_, _, _| 0.0);
        assert_eq!(center_of_mass(&empty).to_array(), [2.0, 2.0, 2.0]);
    }
}
