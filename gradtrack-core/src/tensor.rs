// gradtrack-core/src/tensor.rs
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::error::GradTrackError;

/// Internal storage and metadata for a Tensor.
///
/// Data is always f32, row-major and contiguous. The gradient, once populated by
/// a backward pass, has the same shape as the tensor itself.
pub struct TensorData {
    pub(crate) data: Vec<f32>,
    pub(crate) shape: Vec<usize>,
    /// Flag indicating if the tensor receives gradients during backward.
    pub(crate) requires_grad: bool,
    /// `None` until a backward pass touches the tensor.
    pub(crate) grad: Option<Tensor>,
}

// Manual implementation of Debug so the gradient does not recurse into a wall of numbers.
impl Debug for TensorData {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TensorData")
            .field("data", &self.data)
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("grad_defined", &self.grad.is_some())
            .finish()
    }
}

/// The public, user-facing Tensor type.
///
/// Wraps `TensorData` in an `Arc<RwLock<>>`: cloning a `Tensor` is shallow and
/// shares both the data and the gradient slot.
#[derive(Clone)]
pub struct Tensor {
    pub(crate) data: Arc<RwLock<TensorData>>,
}

impl Debug for Tensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.data.read() {
            Ok(guard) => write!(f, "Tensor({:?})", *guard),
            Err(_) => write!(f, "Tensor(<poisoned>)"),
        }
    }
}

impl Tensor {
    fn from_tensor_data(td: TensorData) -> Self {
        Tensor {
            data: Arc::new(RwLock::new(td)),
        }
    }

    /// Creates a new `Tensor` from raw f32 data and a shape.
    ///
    /// # Errors
    /// Returns `GradTrackError::TensorCreationError` if the length of `data` does not
    /// match the number of elements described by `shape`.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, GradTrackError> {
        let numel: usize = shape.iter().product();
        if data.len() != numel {
            return Err(GradTrackError::TensorCreationError {
                data_len: data.len(),
                shape,
            });
        }
        Ok(Self::from_tensor_data(TensorData {
            data,
            shape,
            requires_grad: false,
            grad: None,
        }))
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn full(shape: &[usize], value: f32) -> Self {
        let numel: usize = shape.iter().product();
        Self::from_tensor_data(TensorData {
            data: vec![value; numel],
            shape: shape.to_vec(),
            requires_grad: false,
            grad: None,
        })
    }

    /// Creates a tensor filled with samples from the standard normal distribution.
    pub fn randn<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Result<Self, GradTrackError> {
        let normal = Normal::new(0.0f32, 1.0f32)
            .map_err(|e| GradTrackError::InternalError(format!("Normal distribution: {}", e)))?;
        let numel: usize = shape.iter().product();
        let data: Vec<f32> = (0..numel).map(|_| normal.sample(rng)).collect();
        Self::new(data, shape.to_vec())
    }

    /// Creates a tensor filled with samples drawn uniformly from `[low, high)`.
    pub fn uniform<R: Rng + ?Sized>(
        shape: &[usize],
        low: f32,
        high: f32,
        rng: &mut R,
    ) -> Result<Self, GradTrackError> {
        if !(low < high) {
            return Err(GradTrackError::ConfigurationError(format!(
                "uniform bounds must satisfy low < high, got [{}, {})",
                low, high
            )));
        }
        let dist = Uniform::new(low, high);
        let numel: usize = shape.iter().product();
        let data: Vec<f32> = (0..numel).map(|_| dist.sample(rng)).collect();
        Self::new(data, shape.to_vec())
    }

    pub(crate) fn read_data(&self) -> Result<RwLockReadGuard<'_, TensorData>, GradTrackError> {
        self.data.read().map_err(|e| GradTrackError::LockError {
            lock_type: "read".to_string(),
            reason: format!("TensorData: {}", e),
        })
    }

    pub(crate) fn write_data(&self) -> Result<RwLockWriteGuard<'_, TensorData>, GradTrackError> {
        self.data.write().map_err(|e| GradTrackError::LockError {
            lock_type: "write".to_string(),
            reason: format!("TensorData: {}", e),
        })
    }

    pub fn shape(&self) -> Result<Vec<usize>, GradTrackError> {
        Ok(self.read_data()?.shape.clone())
    }

    pub fn numel(&self) -> Result<usize, GradTrackError> {
        Ok(self.read_data()?.data.len())
    }

    /// Returns a copy of the tensor data in row-major order.
    pub fn get_f32_data(&self) -> Result<Vec<f32>, GradTrackError> {
        Ok(self.read_data()?.data.clone())
    }

    pub fn requires_grad(&self) -> Result<bool, GradTrackError> {
        Ok(self.read_data()?.requires_grad)
    }

    pub fn set_requires_grad(&self, requires_grad: bool) -> Result<(), GradTrackError> {
        self.write_data()?.requires_grad = requires_grad;
        Ok(())
    }

    /// Returns a shallow handle to the gradient, if one was accumulated.
    pub fn grad(&self) -> Result<Option<Tensor>, GradTrackError> {
        Ok(self.read_data()?.grad.clone())
    }

    /// Runs `f` on the gradient data without copying it.
    ///
    /// `f` receives `None` when the tensor has no gradient.
    pub fn with_grad_data<R>(
        &self,
        f: impl FnOnce(Option<&[f32]>) -> R,
    ) -> Result<R, GradTrackError> {
        let guard = self.read_data()?;
        match guard.grad.as_ref() {
            Some(grad) => {
                let grad_guard = grad.read_data()?;
                Ok(f(Some(&grad_guard.data)))
            }
            None => Ok(f(None)),
        }
    }

    /// Adds `grad` into the gradient slot, creating it on first use.
    ///
    /// The incoming data is copied, so the caller keeps ownership of its tensor.
    pub fn acc_grad(&self, grad: &Tensor) -> Result<(), GradTrackError> {
        let (incoming, incoming_shape) = {
            let g = grad.read_data()?;
            (g.data.clone(), g.shape.clone())
        };
        let mut guard = self.write_data()?;
        if incoming_shape != guard.shape {
            return Err(GradTrackError::GradientAccumulationShapeMismatch {
                expected: guard.shape.clone(),
                actual: incoming_shape,
            });
        }
        match guard.grad.as_ref() {
            Some(existing) => {
                let mut existing_guard = existing.write_data()?;
                for (acc, g) in existing_guard.data.iter_mut().zip(incoming.iter()) {
                    *acc += *g;
                }
            }
            None => {
                guard.grad = Some(Tensor::new(incoming, incoming_shape)?);
            }
        }
        Ok(())
    }

    pub fn set_grad(&self, grad: Option<Tensor>) -> Result<(), GradTrackError> {
        if let Some(g) = grad.as_ref() {
            let expected = self.shape()?;
            let actual = g.shape()?;
            if expected != actual {
                return Err(GradTrackError::GradientAccumulationShapeMismatch { expected, actual });
            }
        }
        self.write_data()?.grad = grad;
        Ok(())
    }

    pub fn clear_grad(&self) -> Result<(), GradTrackError> {
        self.write_data()?.grad = None;
        Ok(())
    }

    /// In-place update `self -= scale * delta`, used by optimizers.
    pub fn sub_scaled_(&self, delta: &[f32], scale: f32) -> Result<(), GradTrackError> {
        let mut guard = self.write_data()?;
        if delta.len() != guard.data.len() {
            return Err(GradTrackError::ShapeMismatch {
                expected: guard.shape.clone(),
                actual: vec![delta.len()],
                operation: "sub_scaled_".to_string(),
            });
        }
        for (value, d) in guard.data.iter_mut().zip(delta.iter()) {
            *value -= scale * *d;
        }
        Ok(())
    }
}
