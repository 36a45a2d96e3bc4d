use crate::error::GradTrackError;
use crate::nn::module::param_tensor;
use crate::nn::parameter::Parameter;
use crate::optim::optimizer_trait::{param_id, Optimizer};
use crate::optim::param_group::ParamGroup;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Represents the state for a single parameter in the Adam optimizer.
#[derive(Default, Clone, Debug)]
pub struct AdamParamState {
    /// First moment vector (exponential moving average of gradients).
    pub m: Vec<f32>,
    /// Second moment vector (exponential moving average of squared gradients).
    pub v: Vec<f32>,
    pub step: u64,
}

/// Adam Optimizer (L2 weight decay folded into the gradient).
#[derive(Debug)]
pub struct AdamOptimizer {
    param_groups: Vec<ParamGroup>,
    lr: f32,
    betas: (f32, f32),
    eps: f32,
    weight_decay: f32,
    state: HashMap<usize, AdamParamState>,
}

impl AdamOptimizer {
    pub fn new(
        params: Vec<Arc<RwLock<Parameter>>>,
        lr: f32,
        beta1: f32,
        beta2: f32,
        eps: f32,
        weight_decay: f32,
    ) -> Result<Self, GradTrackError> {
        if lr <= 0.0 {
            return Err(GradTrackError::ConfigurationError(
                "Learning rate must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&beta1) {
            return Err(GradTrackError::ConfigurationError(
                "Beta1 must be in [0, 1)".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&beta2) {
            return Err(GradTrackError::ConfigurationError(
                "Beta2 must be in [0, 1)".to_string(),
            ));
        }
        if eps <= 0.0 {
            return Err(GradTrackError::ConfigurationError(
                "Epsilon must be positive".to_string(),
            ));
        }
        if weight_decay < 0.0 {
            return Err(GradTrackError::ConfigurationError(
                "Weight decay must be non-negative".to_string(),
            ));
        }

        Ok(AdamOptimizer {
            param_groups: vec![ParamGroup::new(params)],
            lr,
            betas: (beta1, beta2),
            eps,
            weight_decay,
            state: HashMap::new(),
        })
    }

    /// Adam with the usual defaults: betas (0.9, 0.999), eps 1e-8, no weight decay.
    pub fn with_defaults(params: Vec<Arc<RwLock<Parameter>>>, lr: f32) -> Result<Self, GradTrackError> {
        Self::new(params, lr, 0.9, 0.999, 1e-8, 0.0)
    }
}

impl Optimizer for AdamOptimizer {
    fn step(&mut self) -> Result<(), GradTrackError> {
        for group in self.param_groups.iter() {
            let lr = group.options.lr.unwrap_or(self.lr);
            let (beta1, beta2) = group.options.betas.unwrap_or(self.betas);
            let eps = group.options.eps.unwrap_or(self.eps);
            let weight_decay = group.options.weight_decay.unwrap_or(self.weight_decay);

            for param_arc in group.params.iter() {
                let tensor = param_tensor(param_arc)?;
                let mut grad = match tensor.with_grad_data(|g| g.map(|d| d.to_vec()))? {
                    Some(g) => g,
                    None => {
                        log::debug!("Adam step: parameter has no gradient, skipped.");
                        continue;
                    }
                };
                if weight_decay != 0.0 {
                    let data = tensor.get_f32_data()?;
                    for (g, p) in grad.iter_mut().zip(data.iter()) {
                        *g += weight_decay * p;
                    }
                }

                let state = self.state.entry(param_id(param_arc)).or_insert_with(|| AdamParamState {
                    m: vec![0.0; grad.len()],
                    v: vec![0.0; grad.len()],
                    step: 0,
                });
                state.step += 1;
                let bias_correction1 = 1.0 - beta1.powi(state.step as i32);
                let bias_correction2 = 1.0 - beta2.powi(state.step as i32);

                let mut update = vec![0.0f32; grad.len()];
                for (k, g) in grad.iter().enumerate() {
                    state.m[k] = beta1 * state.m[k] + (1.0 - beta1) * g;
                    state.v[k] = beta2 * state.v[k] + (1.0 - beta2) * g * g;
                    let m_hat = state.m[k] / bias_correction1;
                    let v_hat = state.v[k] / bias_correction2;
                    update[k] = m_hat / (v_hat.sqrt() + eps);
                }
                tensor.sub_scaled_(&update, lr)?;
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
