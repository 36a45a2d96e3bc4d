//! A minimal, sequential training loop that tracks gradient norms.

use crate::config::TrainerConfig;
use crate::grad_norm::{GradNormTracker, NamedParameter, OptimizerParams};
use crate::metrics::{LoggedMetrics, MetricsSink};
use gradtrack_core::nn::Parameter;
use gradtrack_core::optim::optimizer_trait::param_id;
use gradtrack_core::optim::Optimizer;
use gradtrack_core::GradTrackError;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// What the trainer needs from a model.
pub trait TrainingModule {
    type Batch;

    /// Dotted parameter names, used to name per-parameter metrics.
    fn named_parameters(&self) -> Vec<(String, Arc<RwLock<Parameter>>)>;

    /// Called once per `fit`. The position of each optimizer is its index in
    /// metric names.
    fn configure_optimizers(&self) -> Result<Vec<Box<dyn Optimizer>>, GradTrackError>;

    /// Forward and backward on one batch. Gradients are accumulated on the
    /// parameters; the loss is returned for logging.
    fn training_step(&mut self, batch: &Self::Batch, batch_idx: usize) -> Result<f32, GradTrackError>;
}

/// Pairs every optimizer's parameters with their names.
///
/// Names come from `named` (matched by `Arc` identity), then from the parameter
/// itself, then fall back to `param_{k}`.
pub fn named_optimizer_params(
    named: &[(String, Arc<RwLock<Parameter>>)],
    optimizers: &[Box<dyn Optimizer>],
) -> Result<Vec<OptimizerParams>, GradTrackError> {
    let names: HashMap<usize, &str> = named
        .iter()
        .map(|(name, param)| (param_id(param), name.as_str()))
        .collect();

    let mut listed = Vec::with_capacity(optimizers.len());
    for (optimizer_idx, optimizer) in optimizers.iter().enumerate() {
        let mut params = Vec::new();
        for (k, param) in optimizer.params().into_iter().enumerate() {
            let name = match names.get(&param_id(&param)) {
                Some(name) => name.to_string(),
                None => {
                    let guard = param.read().map_err(|e| GradTrackError::LockError {
                        lock_type: "read".to_string(),
                        reason: format!("Parameter: {}", e),
                    })?;
                    guard.name.clone().unwrap_or_else(|| format!("param_{}", k))
                }
            };
            params.push(NamedParameter { name, param });
        }
        listed.push(OptimizerParams {
            optimizer_idx,
            params,
        });
    }
    Ok(listed)
}

/// The trainer's store plus any extra sinks, written together.
#[derive(Default)]
struct Sinks {
    store: LoggedMetrics,
    extra: Vec<Box<dyn MetricsSink>>,
}

impl MetricsSink for Sinks {
    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>, step: usize) -> Result<(), GradTrackError> {
        self.store.log_metrics(metrics, step)?;
        for sink in self.extra.iter_mut() {
            sink.log_metrics(metrics, step)?;
        }
        Ok(())
    }
}

pub struct Trainer {
    config: TrainerConfig,
    tracker: Option<GradNormTracker>,
    sinks: Sinks,
    global_step: usize,
}

impl Trainer {
    /// # Errors
    /// Any invalid setting (`InvalidNormOrder`, `InvalidAggregationMode`,
    /// `ConfigurationError`) is reported here, before training starts.
    pub fn new(config: TrainerConfig) -> Result<Self, GradTrackError> {
        let tracker = config.validate()?;
        match &tracker {
            Some(t) => info!(
                "tracking grad norms: order {}, mode '{}'",
                t.order(),
                t.mode()
            ),
            None => debug!("grad norm tracking disabled"),
        }
        Ok(Trainer {
            config,
            tracker,
            sinks: Sinks::default(),
            global_step: 0,
        })
    }

    /// Adds a sink that receives everything the trainer logs.
    pub fn add_sink(&mut self, sink: Box<dyn MetricsSink>) {
        self.sinks.extra.push(sink);
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn grad_norm_tracker(&self) -> Option<&GradNormTracker> {
        self.tracker.as_ref()
    }

    pub fn logged_metrics(&self) -> &LoggedMetrics {
        &self.sinks.store
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    fn max_steps(&self) -> Option<usize> {
        if self.config.fast_dev_run {
            Some(1)
        } else {
            self.config.max_steps
        }
    }

    fn should_log(&self, step: usize) -> bool {
        self.config.fast_dev_run || step % self.config.log_every_n_steps == 0
    }

    /// Runs one pass over `batches`, one optimization step per batch.
    ///
    /// Per step: clear gradients, forward/backward, track grad norms (on logged
    /// steps), step every optimizer. A logged step reaches the sinks as a single
    /// mapping holding `loss` and the grad norms. Gradients are cleared again at
    /// the end.
    pub fn fit<M: TrainingModule>(&mut self, model: &mut M, batches: &[M::Batch]) -> Result<(), GradTrackError> {
        let mut optimizers = model.configure_optimizers()?;
        let optimizer_params = named_optimizer_params(&model.named_parameters(), &optimizers)?;
        let max_steps = self.max_steps();
        info!(
            "fit: {} optimizer(s), {} batch(es), max_steps {:?}",
            optimizers.len(),
            batches.len(),
            max_steps
        );

        for (batch_idx, batch) in batches.iter().enumerate() {
            if max_steps.map_or(false, |max| batch_idx >= max) {
                break;
            }
            for optimizer in optimizers.iter_mut() {
                optimizer.zero_grad()?;
            }

            let loss = model.training_step(batch, batch_idx)?;
            let step = self.global_step;

            if self.should_log(step) {
                let mut step_metrics = BTreeMap::new();
                step_metrics.insert("loss".to_string(), loss as f64);
                if let Some(tracker) = &self.tracker {
                    let metrics = tracker.track(&optimizer_params)?;
                    debug!("step {}: {} grad norm metric(s)", step, metrics.len());
                    step_metrics.extend(metrics.render());
                }
                self.sinks.log_metrics(&step_metrics, step)?;
            }

            for optimizer in optimizers.iter_mut() {
                optimizer.step()?;
            }
            self.global_step += 1;
        }

        for optimizer in optimizers.iter_mut() {
            optimizer.zero_grad()?;
        }
        Ok(())
    }
}
