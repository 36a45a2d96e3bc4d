use crate::error::GradTrackError;
use crate::tensor::Tensor;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A wrapper around a Tensor indicating it is a learnable parameter of a Module.
/// Parameters automatically have `requires_grad` set to `true`.
pub struct Parameter {
    pub tensor: Tensor,
    pub name: Option<String>,
}

impl Parameter {
    /// Creates a new Parameter from a Tensor.
    /// Ensures that the underlying Tensor requires gradients.
    pub fn new(tensor: Tensor, name: Option<String>) -> Result<Self, GradTrackError> {
        tensor.set_requires_grad(true)?;
        Ok(Parameter { tensor, name })
    }

    pub fn new_unnamed(tensor: Tensor) -> Result<Self, GradTrackError> {
        Self::new(tensor, None)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn tensor_mut(&mut self) -> &mut Tensor {
        &mut self.tensor
    }

    /// Consumes the Parameter and returns the underlying Tensor.
    pub fn into_inner(self) -> Tensor {
        self.tensor
    }
}

// Allow accessing the underlying Tensor via Deref.
impl Deref for Parameter {
    type Target = Tensor;

    fn deref(&self) -> &Self::Target {
        &self.tensor
    }
}

impl DerefMut for Parameter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tensor
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parameter(name={:?}, {:?})",
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.tensor
        )
    }
}

impl Clone for Parameter {
    /// Cloning a Parameter clones the underlying Tensor handle (shallow clone via Arc).
    fn clone(&self) -> Self {
        Parameter {
            tensor: self.tensor.clone(),
            name: self.name.clone(),
        }
    }
}
