//! Gradient-norm tracking.
//!
//! Once per logged step, after backward and before the optimizers update the
//! parameters, the [`GradientCollector`] reduces every gradient of every
//! optimizer to a norm, and the [`GradNormAggregator`] turns those norms into
//! mean/std statistics keyed by [`MetricKey`]. Statistics over a single value
//! only ever produce a `_mean`.

pub mod aggregator;
pub mod collector;
pub mod metric_key;
pub mod norm_order;

pub use aggregator::{AggregationMode, GradNormAggregator};
pub use collector::{GradientCollector, NamedParameter, OptimizerGradNorms, OptimizerParams, ParamGradNorm};
pub use metric_key::{GradNormMetrics, MetricKey, NormSubject, Statistic};
pub use norm_order::{vector_norm, NormOrder};

use crate::metrics::MetricsSink;
use gradtrack_core::GradTrackError;
use log::debug;

/// Collector and aggregator wired together for one trainer.
#[derive(Debug, Clone, Copy)]
pub struct GradNormTracker {
    collector: GradientCollector,
    aggregator: GradNormAggregator,
}

impl GradNormTracker {
    pub fn new(order: NormOrder, mode: AggregationMode) -> Self {
        GradNormTracker {
            collector: GradientCollector::new(order),
            aggregator: GradNormAggregator::new(order, mode),
        }
    }

    /// Validates both settings before building the tracker.
    pub fn from_settings(p: f64, mode: &str) -> Result<Self, GradTrackError> {
        let order = NormOrder::new(p)?;
        let mode: AggregationMode = mode.parse()?;
        Ok(Self::new(order, mode))
    }

    pub fn order(&self) -> NormOrder {
        self.collector.order()
    }

    pub fn mode(&self) -> AggregationMode {
        self.aggregator.mode()
    }

    /// Collects norms for every optimizer. Optimizers without parameters
    /// contribute nothing.
    pub fn collect(&self, optimizers: &[OptimizerParams]) -> Result<Vec<OptimizerGradNorms>, GradTrackError> {
        let mut collected = Vec::with_capacity(optimizers.len());
        for optimizer in optimizers {
            match self.collector.collect(optimizer) {
                Ok(norms) => collected.push(norms),
                Err(GradTrackError::EmptyOptimizer { optimizer_idx }) => {
                    debug!("optimizer {} has no parameters, no grad norms emitted", optimizer_idx);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(collected)
    }

    pub fn track(&self, optimizers: &[OptimizerParams]) -> Result<GradNormMetrics, GradTrackError> {
        let collected = self.collect(optimizers)?;
        Ok(self.aggregator.aggregate(&collected))
    }

    /// Tracks and, once aggregation has fully completed, writes the rendered
    /// metrics to `sink` for `step`.
    pub fn track_and_log(
        &self,
        optimizers: &[OptimizerParams],
        step: usize,
        sink: &mut dyn MetricsSink,
    ) -> Result<GradNormMetrics, GradTrackError> {
        let metrics = self.track(optimizers)?;
        if !metrics.is_empty() {
            sink.log_metrics(&metrics.render(), step)?;
        }
        Ok(metrics)
    }
}

#[cfg(test)]
mod collector_test;
