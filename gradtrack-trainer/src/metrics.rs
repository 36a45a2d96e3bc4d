//! Metrics sinks.
//!
//! A sink receives a name → value mapping once per logged step. The in-memory
//! [`LoggedMetrics`] store is what the trainer exposes; [`LogSink`] forwards the
//! same values to the `log` facade.

use gradtrack_core::GradTrackError;
use log::info;
use std::collections::BTreeMap;

/// Narrow write interface for everything that records metrics.
pub trait MetricsSink {
    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>, step: usize) -> Result<(), GradTrackError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggedMetric {
    pub name: String,
    pub value: f64,
    pub step: usize,
}

/// Append-only history plus a latest-value view (last write per name wins).
#[derive(Debug, Clone, Default)]
pub struct LoggedMetrics {
    history: Vec<LoggedMetric>,
    latest: BTreeMap<String, f64>,
}

impl LoggedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_scalar(&mut self, name: &str, value: f64, step: usize) {
        self.history.push(LoggedMetric {
            name: name.to_string(),
            value,
            step,
        });
        self.latest.insert(name.to_string(), value);
    }

    /// Latest value logged under `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.latest.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.latest.contains_key(name)
    }

    pub fn latest(&self) -> &BTreeMap<String, f64> {
        &self.latest
    }

    pub fn history(&self) -> &[LoggedMetric] {
        &self.history
    }

    /// Steps at which `name` was written, in logging order.
    pub fn steps_for(&self, name: &str) -> Vec<usize> {
        self.history
            .iter()
            .filter(|m| m.name == name)
            .map(|m| m.step)
            .collect()
    }

    /// Number of distinct metric names.
    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

impl MetricsSink for LoggedMetrics {
    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>, step: usize) -> Result<(), GradTrackError> {
        for (name, value) in metrics {
            self.log_scalar(name, *value, step);
        }
        Ok(())
    }
}

/// Writes every metric through `log::info!` under the `gradtrack::metrics` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>, step: usize) -> Result<(), GradTrackError> {
        for (name, value) in metrics {
            info!(target: "gradtrack::metrics", "step {}: {} = {}", step, name, value);
        }
        Ok(())
    }
}
