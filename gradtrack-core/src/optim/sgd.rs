use crate::error::GradTrackError;
use crate::nn::module::param_tensor;
use crate::nn::parameter::Parameter;
use crate::optim::optimizer_trait::{param_id, Optimizer};
use crate::optim::param_group::ParamGroup;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Implements the Stochastic Gradient Descent (SGD) optimizer.
///
/// Supports momentum and weight decay.
#[derive(Debug)]
pub struct SgdOptimizer {
    param_groups: Vec<ParamGroup>,
    lr: f32,
    momentum: f32,
    weight_decay: f32,
    momentum_buffers: HashMap<usize, Vec<f32>>,
}

impl SgdOptimizer {
    /// Creates a new `SgdOptimizer` with all `params` in a default group.
    ///
    /// To use multiple parameter groups with different learning rates, create the
    /// optimizer with the first set of parameters, then use `add_param_group`.
    pub fn new(
        params: impl IntoIterator<Item = Arc<RwLock<Parameter>>>,
        lr: f32,
        momentum: f32,
        weight_decay: f32,
    ) -> Result<Self, GradTrackError> {
        if lr < 0.0 {
            return Err(GradTrackError::ConfigurationError(
                "Learning rate must be non-negative".to_string(),
            ));
        }
        if momentum < 0.0 {
            return Err(GradTrackError::ConfigurationError(
                "Momentum must be non-negative".to_string(),
            ));
        }
        if weight_decay < 0.0 {
            return Err(GradTrackError::ConfigurationError(
                "Weight decay must be non-negative".to_string(),
            ));
        }
        let default_group = ParamGroup::new(params.into_iter().collect());
        Ok(SgdOptimizer {
            param_groups: vec![default_group],
            lr,
            momentum,
            weight_decay,
            momentum_buffers: HashMap::new(),
        })
    }
}

impl Optimizer for SgdOptimizer {
    fn step(&mut self) -> Result<(), GradTrackError> {
        for group in self.param_groups.iter() {
            let lr = group.options.lr.unwrap_or(self.lr);
            let weight_decay = group.options.weight_decay.unwrap_or(self.weight_decay);
            let momentum = group.options.momentum.unwrap_or(self.momentum);

            for param_arc in group.params.iter() {
                let tensor = param_tensor(param_arc)?;
                if !tensor.requires_grad()? {
                    continue;
                }
                let grad = match tensor.with_grad_data(|g| g.map(|d| d.to_vec()))? {
                    Some(g) => g,
                    None => {
                        log::debug!("SGD step: parameter has no gradient, skipped.");
                        continue;
                    }
                };

                let mut d_p = grad;
                if weight_decay != 0.0 {
                    let data = tensor.get_f32_data()?;
                    for (d, p) in d_p.iter_mut().zip(data.iter()) {
                        *d += weight_decay * p;
                    }
                }

                if momentum != 0.0 {
                    let buffer = self
                        .momentum_buffers
                        .entry(param_id(param_arc))
                        .or_insert_with(|| vec![0.0; d_p.len()]);
                    for (b, d) in buffer.iter_mut().zip(d_p.iter()) {
                        *b = momentum * *b + d;
                    }
                    d_p.copy_from_slice(buffer);
                }

                tensor.sub_scaled_(&d_p, lr)?;
            }
        }
        Ok(())
    }

    fn add_param_group(&mut self, param_group: ParamGroup) {
        self.param_groups.push(param_group);
    }

    fn param_groups(&self) -> &[ParamGroup] {
        &self.param_groups
    }
}
