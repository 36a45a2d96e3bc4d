use super::norm_order::NormOrder;
use gradtrack_core::nn::Parameter;
use gradtrack_core::optim::optimizer_trait::param_id;
use gradtrack_core::GradTrackError;
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// A parameter as seen by the collector: the name used in metric keys plus the
/// shared handle whose gradient is read.
#[derive(Debug, Clone)]
pub struct NamedParameter {
    pub name: String,
    pub param: Arc<RwLock<Parameter>>,
}

/// The parameters of one optimizer, in the order the optimizer lists them.
#[derive(Debug, Clone)]
pub struct OptimizerParams {
    pub optimizer_idx: usize,
    pub params: Vec<NamedParameter>,
}

/// Norm of one parameter's gradient for the current step.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGradNorm {
    pub name: String,
    /// `norm_p(flatten(grad))`.
    pub norm: f64,
    /// `|g_k|` for every element of the flattened gradient, i.e. the norm of each
    /// element taken as a one-element vector.
    pub element_norms: Vec<f64>,
}

/// Everything collected for one optimizer during one step.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerGradNorms {
    pub optimizer_idx: usize,
    pub params: Vec<ParamGradNorm>,
    /// Norm of the concatenation of all collected gradients; `None` when no
    /// parameter of the optimizer had a gradient.
    pub total: Option<f64>,
}

/// Reads per-parameter gradients and reduces each to a scalar norm.
#[derive(Debug, Clone, Copy)]
pub struct GradientCollector {
    order: NormOrder,
}

impl GradientCollector {
    pub fn new(order: NormOrder) -> Self {
        GradientCollector { order }
    }

    /// # Errors
    /// `InvalidNormOrder` unless `p` is positive (infinity allowed).
    pub fn try_from_p(p: f64) -> Result<Self, GradTrackError> {
        Ok(Self::new(NormOrder::new(p)?))
    }

    pub fn order(&self) -> NormOrder {
        self.order
    }

    /// Computes the gradient norm of every parameter of `optimizer` that has a gradient.
    ///
    /// Parameters without gradient are skipped. A parameter listed several times
    /// (overlapping param groups) is collected once. Gradients are only read.
    ///
    /// # Errors
    /// `EmptyOptimizer` if the optimizer holds no parameters at all, `LockError`
    /// if a parameter lock is poisoned.
    pub fn collect(&self, optimizer: &OptimizerParams) -> Result<OptimizerGradNorms, GradTrackError> {
        if optimizer.params.is_empty() {
            return Err(GradTrackError::EmptyOptimizer {
                optimizer_idx: optimizer.optimizer_idx,
            });
        }

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(optimizer.params.len());
        for named in &optimizer.params {
            if !seen.insert(param_id(&named.param)) {
                continue;
            }
            let guard = named.param.read().map_err(|e| GradTrackError::LockError {
                lock_type: "read".to_string(),
                reason: format!("Parameter '{}': {}", named.name, e),
            })?;
            let order = self.order;
            let measured = guard.tensor.with_grad_data(|grad| {
                grad.map(|g| {
                    let element_norms: Vec<f64> = g.iter().map(|v| (*v as f64).abs()).collect();
                    (order.norm(g), element_norms)
                })
            })?;
            match measured {
                Some((norm, element_norms)) => records.push(ParamGradNorm {
                    name: named.name.clone(),
                    norm,
                    element_norms,
                }),
                None => debug!(
                    "optimizer {}: skipping '{}', no gradient",
                    optimizer.optimizer_idx, named.name
                ),
            }
        }

        let total = if records.is_empty() {
            None
        } else {
            Some(self.order.combine(records.iter().map(|r| r.norm)))
        };
        Ok(OptimizerGradNorms {
            optimizer_idx: optimizer.optimizer_idx,
            params: records,
            total,
        })
    }
}
