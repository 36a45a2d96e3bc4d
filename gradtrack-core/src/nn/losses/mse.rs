// gradtrack-core/src/nn/losses/mse.rs

use crate::error::GradTrackError;
use crate::tensor::Tensor;

/// Specifies the reduction to apply to the output: 'mean' | 'sum'
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Sum,
}

impl std::str::FromStr for Reduction {
    type Err = GradTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Reduction::Mean),
            "sum" => Ok(Reduction::Sum),
            _ => Err(GradTrackError::ConfigurationError(format!(
                "Unsupported reduction type: {}",
                s
            ))),
        }
    }
}

/// Computes the Mean Squared Error (MSE) loss between input and target tensors.
#[derive(Debug, Clone)]
pub struct MSELoss {
    reduction: Reduction,
}

impl MSELoss {
    pub fn new(reduction: Reduction) -> Self {
        MSELoss { reduction }
    }

    fn paired_data(
        input: &Tensor,
        target: &Tensor,
        operation: &str,
    ) -> Result<(Vec<f32>, Vec<f32>, Vec<usize>), GradTrackError> {
        let input_shape = input.shape()?;
        let target_shape = target.shape()?;
        if input_shape != target_shape {
            return Err(GradTrackError::ShapeMismatch {
                expected: input_shape,
                actual: target_shape,
                operation: operation.to_string(),
            });
        }
        Ok((input.get_f32_data()?, target.get_f32_data()?, input_shape))
    }

    fn scale(&self, numel: usize) -> f32 {
        match self.reduction {
            Reduction::Mean => 1.0 / numel.max(1) as f32,
            Reduction::Sum => 1.0,
        }
    }

    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Result<f32, GradTrackError> {
        let (x, y, _) = Self::paired_data(input, target, "MSELoss forward")?;
        let sum: f32 = x.iter().zip(y.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
        Ok(sum * self.scale(x.len()))
    }

    /// Gradient w.r.t. `input`: `2 * (input - target)`, divided by N for `Mean`.
    pub fn backward(&self, input: &Tensor, target: &Tensor) -> Result<Tensor, GradTrackError> {
        let (x, y, shape) = Self::paired_data(input, target, "MSELoss backward")?;
        let scale = 2.0 * self.scale(x.len());
        let grad = x.iter().zip(y.iter()).map(|(a, b)| scale * (a - b)).collect();
        Tensor::new(grad, shape)
    }
}

impl Default for MSELoss {
    fn default() -> Self {
        MSELoss::new(Reduction::Mean)
    }
}
