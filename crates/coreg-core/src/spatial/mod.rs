//! Physical-space primitives (nalgebra newtypes) and their 3-D aliases.

pub mod direction;
pub mod point;
pub mod spacing;
pub mod vector;

pub use direction::Direction;
pub use point::Point;
pub use spacing::Spacing;
pub use vector::Vector;

/// Physical position in LPS millimetres.
pub type Point3 = Point<3>;
pub type Vector3 = Vector<3>;
/// Voxel size along `(x, y, z)`.
pub type Spacing3 = Spacing<3>;
/// Columns are the physical directions of the `x`, `y`, `z` index axes.
pub type Direction3 = Direction<3>;
