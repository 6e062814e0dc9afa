//! Transform types and operations.

pub mod trait_;
pub mod rigid;
pub mod initializer;

pub use trait_::Transform;
pub use rigid::{RigidTransform, RigidParameters, RigidJacobian, RIGID_PARAMETER_COUNT};
pub use initializer::{CenteredTransformInitializer, InitializerMode};
