//! Gradient-norm tracking for a training loop.
//!
//! - [`grad_norm`]: collection of per-parameter gradient norms and their
//!   aggregation into mean/std metrics under an [`AggregationMode`].
//! - [`metrics`]: the sink interface and the in-memory logged-metrics store.
//! - [`config`] / [`trainer`]: the settings surface and a sequential step loop
//!   that drives the tracker.

pub mod config;
pub mod grad_norm;
pub mod metrics;
pub mod trainer;

pub use config::{TrackGradNorm, TrainerConfig};
pub use grad_norm::{AggregationMode, GradNormMetrics, GradNormTracker, MetricKey, NormOrder};
pub use gradtrack_core::GradTrackError;
pub use metrics::{LogSink, LoggedMetrics, MetricsSink};
pub use trainer::{Trainer, TrainingModule};
