use super::param_group::ParamGroup;
use crate::error::GradTrackError;
use crate::nn::module::param_tensor;
use crate::nn::parameter::Parameter;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Trait defining the common interface for all optimizers.
///
/// Optimizers are responsible for updating model parameters based on their gradients.
pub trait Optimizer: std::fmt::Debug {
    /// Performs a single optimization step using the accumulated gradients.
    fn step(&mut self) -> Result<(), GradTrackError>;

    /// Clears the gradients of all parameters managed by the optimizer.
    fn zero_grad(&mut self) -> Result<(), GradTrackError> {
        for param in self.params() {
            param_tensor(&param)?.clear_grad()?;
        }
        Ok(())
    }

    /// Adds a new parameter group to the optimizer.
    fn add_param_group(&mut self, param_group: ParamGroup);

    /// Returns an immutable slice of the parameter groups managed by the optimizer.
    fn param_groups(&self) -> &[ParamGroup];

    /// Every parameter of every group, in group order, each listed once even when
    /// several groups share it.
    fn params(&self) -> Vec<Arc<RwLock<Parameter>>> {
        let mut seen = HashSet::new();
        let mut params = Vec::new();
        for group in self.param_groups() {
            for param in &group.params {
                if seen.insert(param_id(param)) {
                    params.push(param.clone());
                }
            }
        }
        params
    }
}

/// Stable identity of a shared parameter, used to key per-parameter state.
pub fn param_id(param: &Arc<RwLock<Parameter>>) -> usize {
    Arc::as_ptr(param) as *const () as usize
}
