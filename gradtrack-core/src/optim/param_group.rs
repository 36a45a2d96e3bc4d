use crate::nn::parameter::Parameter;
use std::sync::{Arc, RwLock};

/// Defines a group of parameters with specific optimizer hyperparameters.
///
/// This allows applying different settings (like learning rate or weight decay)
/// to different parts of a model.
#[derive(Clone, Debug)]
pub struct ParamGroup {
    /// The parameters included in this group, shared with the owning module.
    pub params: Vec<Arc<RwLock<Parameter>>>,

    /// Specific options/hyperparameters for this group.
    pub options: ParamGroupOptions,
}

/// Options specific to a parameter group. `None` falls back to the optimizer default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamGroupOptions {
    pub lr: Option<f32>,
    pub betas: Option<(f32, f32)>,
    pub eps: Option<f32>,
    pub weight_decay: Option<f32>,
    pub momentum: Option<f32>,
}

impl ParamGroup {
    /// Creates a new parameter group with default options.
    pub fn new(params: Vec<Arc<RwLock<Parameter>>>) -> Self {
        ParamGroup {
            params,
            options: ParamGroupOptions::default(),
        }
    }

    pub fn with_lr(mut self, lr: f32) -> Self {
        self.options.lr = Some(lr);
        self
    }
}
