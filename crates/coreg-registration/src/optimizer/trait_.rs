//! Cost function seam between metrics and optimizers.

use coreg_core::transform::RigidParameters;
use crate::error::Result;

/// Scalar cost of a parameter vector together with its derivative.
///
/// Optimizers minimize the cost. Closures of the matching shape implement
/// the trait, which keeps synthetic costs in tests short.
pub trait CostFunction {
    /// Evaluate the cost and `d cost / d parameters`.
    fn value_and_derivative(&mut self, parameters: &RigidParameters) -> Result<(f64, RigidParameters)>;
}

impl<F> CostFunction for F
where
    F: FnMut(&RigidParameters) -> Result<(f64, RigidParameters)>,
{
    fn value_and_derivative(&mut self, parameters: &RigidParameters) -> Result<(f64, RigidParameters)> {
        self(parameters)
    }
}
