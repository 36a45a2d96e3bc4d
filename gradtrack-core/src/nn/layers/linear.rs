use crate::error::GradTrackError;
use crate::nn::module::{param_tensor, Module};
use crate::nn::parameter::Parameter;
use crate::tensor::Tensor;
use rand::Rng;
use std::sync::{Arc, RwLock};

/// Applies a linear transformation to the incoming data: y = xW^T + b
///
/// There is no autograd graph: `backward` must be called explicitly with the
/// input seen by `forward` and the upstream gradient.
#[derive(Debug)]
pub struct Linear {
    pub(crate) weight: Arc<RwLock<Parameter>>,
    pub(crate) bias: Option<Arc<RwLock<Parameter>>>,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Creates a new Linear layer with weights and bias drawn from
    /// `U(-1/sqrt(in_features), 1/sqrt(in_features))`.
    ///
    /// # Arguments
    ///
    /// * `in_features` - Size of each input sample.
    /// * `out_features` - Size of each output sample.
    /// * `has_bias` - If `true`, the layer will learn an additive bias.
    /// * `rng` - Source of randomness for initialization.
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        has_bias: bool,
        rng: &mut R,
    ) -> Result<Self, GradTrackError> {
        if in_features == 0 || out_features == 0 {
            return Err(GradTrackError::ConfigurationError(format!(
                "Linear features must be non-zero, got in={} out={}",
                in_features, out_features
            )));
        }
        let bound = 1.0 / (in_features as f32).sqrt();
        let weight_tensor = Tensor::uniform(&[out_features, in_features], -bound, bound, rng)?;
        let weight = Parameter::new(weight_tensor, Some("weight".to_string()))?;

        let bias = if has_bias {
            let bias_tensor = Tensor::uniform(&[out_features], -bound, bound, rng)?;
            Some(Arc::new(RwLock::new(Parameter::new(
                bias_tensor,
                Some("bias".to_string()),
            )?)))
        } else {
            None
        };

        Ok(Linear {
            weight: Arc::new(RwLock::new(weight)),
            bias,
            in_features,
            out_features,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    pub fn weight(&self) -> &Arc<RwLock<Parameter>> {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Arc<RwLock<Parameter>>> {
        self.bias.as_ref()
    }

    /// Renames the layer's parameters to `{prefix}.weight` / `{prefix}.bias`.
    pub fn with_prefix(self, prefix: &str) -> Result<Self, GradTrackError> {
        for (local, param) in self.local_parameters() {
            let mut guard = param.write().map_err(|e| GradTrackError::LockError {
                lock_type: "write".to_string(),
                reason: format!("Parameter: {}", e),
            })?;
            guard.set_name(format!("{}.{}", prefix, local));
        }
        Ok(self)
    }

    fn local_parameters(&self) -> Vec<(&'static str, Arc<RwLock<Parameter>>)> {
        let mut params = vec![("weight", self.weight.clone())];
        if let Some(bias) = &self.bias {
            params.push(("bias", bias.clone()));
        }
        params
    }

    fn check_input(&self, shape: &[usize], operation: &str) -> Result<usize, GradTrackError> {
        if shape.len() != 2 || shape[1] != self.in_features {
            return Err(GradTrackError::ShapeMismatch {
                expected: vec![shape.first().copied().unwrap_or(0), self.in_features],
                actual: shape.to_vec(),
                operation: operation.to_string(),
            });
        }
        Ok(shape[0])
    }

    /// Accumulates `dW = g^T x` and `db = sum_n g` into the parameters' gradients
    /// and returns `dx = g W`.
    pub fn backward(&self, input: &Tensor, grad_output: &Tensor) -> Result<Tensor, GradTrackError> {
        let batch = self.check_input(&input.shape()?, "Linear backward (input)")?;
        let grad_shape = grad_output.shape()?;
        if grad_shape != [batch, self.out_features] {
            return Err(GradTrackError::ShapeMismatch {
                expected: vec![batch, self.out_features],
                actual: grad_shape,
                operation: "Linear backward (grad_output)".to_string(),
            });
        }

        let x = input.get_f32_data()?;
        let g = grad_output.get_f32_data()?;
        let weight = param_tensor(&self.weight)?;
        let w = weight.get_f32_data()?;
        let (n_in, n_out) = (self.in_features, self.out_features);

        let mut grad_w = vec![0.0f32; n_out * n_in];
        let mut grad_x = vec![0.0f32; batch * n_in];
        for n in 0..batch {
            for o in 0..n_out {
                let go = g[n * n_out + o];
                for i in 0..n_in {
                    grad_w[o * n_in + i] += go * x[n * n_in + i];
                    grad_x[n * n_in + i] += go * w[o * n_in + i];
                }
            }
        }
        weight.acc_grad(&Tensor::new(grad_w, vec![n_out, n_in])?)?;

        if let Some(bias) = &self.bias {
            let mut grad_b = vec![0.0f32; n_out];
            for n in 0..batch {
                for o in 0..n_out {
                    grad_b[o] += g[n * n_out + o];
                }
            }
            param_tensor(bias)?.acc_grad(&Tensor::new(grad_b, vec![n_out])?)?;
        }

        Tensor::new(grad_x, vec![batch, n_in])
    }
}

impl Module for Linear {
    fn forward(&self, input: &Tensor) -> Result<Tensor, GradTrackError> {
        let batch = self.check_input(&input.shape()?, "Linear forward")?;
        let x = input.get_f32_data()?;
        let w = param_tensor(&self.weight)?.get_f32_data()?;
        let b = match &self.bias {
            Some(bias) => Some(param_tensor(bias)?.get_f32_data()?),
            None => None,
        };
        let (n_in, n_out) = (self.in_features, self.out_features);

        let mut out = vec![0.0f32; batch * n_out];
        for n in 0..batch {
            for o in 0..n_out {
                let mut acc = b.as_ref().map_or(0.0, |b| b[o]);
                for i in 0..n_in {
                    acc += x[n * n_in + i] * w[o * n_in + i];
                }
                out[n * n_out + o] = acc;
            }
        }
        Tensor::new(out, vec![batch, n_out])
    }

    fn named_parameters(&self) -> Vec<(String, Arc<RwLock<Parameter>>)> {
        self.local_parameters()
            .into_iter()
            .map(|(local, param)| {
                let name = param
                    .read()
                    .ok()
                    .and_then(|p| p.name.clone())
                    .unwrap_or_else(|| local.to_string());
                (name, param)
            })
            .collect()
    }
}
