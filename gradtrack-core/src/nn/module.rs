use crate::error::GradTrackError;
use crate::nn::Parameter;
use crate::tensor::Tensor;
use std::sync::{Arc, RwLock};

/// The base trait for all neural network modules (layers, containers, etc.).
pub trait Module: std::fmt::Debug + Send + Sync {
    /// Performs a forward pass of the module.
    fn forward(&self, input: &Tensor) -> Result<Tensor, GradTrackError>;

    /// Returns all learnable parameters of the module along with their names.
    /// Names are unique within the module and dotted for nested modules
    /// (e.g., "first.weight", "first.bias").
    fn named_parameters(&self) -> Vec<(String, Arc<RwLock<Parameter>>)>;

    /// Returns all learnable parameters of the module, in `named_parameters` order.
    fn parameters(&self) -> Vec<Arc<RwLock<Parameter>>> {
        self.named_parameters()
            .into_iter()
            .map(|(_, param)| param)
            .collect()
    }
}

/// Clones the tensor handle out of a shared parameter.
pub fn param_tensor(param: &Arc<RwLock<Parameter>>) -> Result<Tensor, GradTrackError> {
    let guard = param.read().map_err(|e| GradTrackError::LockError {
        lock_type: "read".to_string(),
        reason: format!("Parameter: {}", e),
    })?;
    Ok(guard.tensor.clone())
}
