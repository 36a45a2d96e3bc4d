use super::collector::{OptimizerGradNorms, ParamGradNorm};
use super::metric_key::{GradNormMetrics, MetricKey, NormSubject, Statistic};
use super::norm_order::NormOrder;
use gradtrack_core::GradTrackError;
use log::warn;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Grouping policy for gradient-norm statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AggregationMode {
    /// Per-parameter statistics and one total, not qualified by optimizer.
    #[default]
    Parameters,
    /// Only the total norm of each optimizer.
    Optimizer,
    /// Per-parameter and total statistics, qualified by optimizer.
    OptimizerAndParameters,
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::Parameters => "parameters",
            AggregationMode::Optimizer => "optimizer",
            AggregationMode::OptimizerAndParameters => "optimizer+parameters",
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationMode {
    type Err = GradTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parameters" => Ok(AggregationMode::Parameters),
            "optimizer" => Ok(AggregationMode::Optimizer),
            "optimizer+parameters" => Ok(AggregationMode::OptimizerAndParameters),
            _ => Err(GradTrackError::InvalidAggregationMode {
                mode: s.to_string(),
            }),
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator); `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Turns collected norms into named statistics under one `AggregationMode`.
#[derive(Debug, Clone, Copy)]
pub struct GradNormAggregator {
    order: NormOrder,
    mode: AggregationMode,
}

impl GradNormAggregator {
    pub fn new(order: NormOrder, mode: AggregationMode) -> Self {
        GradNormAggregator { order, mode }
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    pub fn order(&self) -> NormOrder {
        self.order
    }

    /// Pure: the same input always yields the same metrics.
    pub fn aggregate(&self, norms: &[OptimizerGradNorms]) -> GradNormMetrics {
        let mut metrics = GradNormMetrics::new();
        match self.mode {
            AggregationMode::Parameters => self.aggregate_over_parameters(norms, &mut metrics),
            AggregationMode::Optimizer => {
                for group in norms {
                    if let Some(total) = group.total {
                        self.insert_group(&mut metrics, Some(group.optimizer_idx), NormSubject::Total, &[total]);
                    }
                }
            }
            AggregationMode::OptimizerAndParameters => {
                for group in norms {
                    let idx = Some(group.optimizer_idx);
                    for record in &group.params {
                        self.insert_group(
                            &mut metrics,
                            idx,
                            NormSubject::Parameter(record.name.clone()),
                            &record.element_norms,
                        );
                    }
                    let per_param: Vec<f64> = group.params.iter().map(|r| r.norm).collect();
                    self.insert_group(&mut metrics, idx, NormSubject::Total, &per_param);
                }
            }
        }
        metrics
    }

    fn aggregate_over_parameters(&self, norms: &[OptimizerGradNorms], metrics: &mut GradNormMetrics) {
        // Names are not optimizer-qualified here, so a name shared by two
        // optimizers keeps the record of the later one.
        let mut latest: BTreeMap<&str, (usize, &ParamGradNorm)> = BTreeMap::new();
        for group in norms {
            for record in &group.params {
                if let Some((prev_idx, _)) = latest.insert(record.name.as_str(), (group.optimizer_idx, record)) {
                    if prev_idx != group.optimizer_idx {
                        warn!(
                            "parameter '{}' is tracked by optimizers {} and {}; keeping the norms from optimizer {}",
                            record.name, prev_idx, group.optimizer_idx, group.optimizer_idx
                        );
                    }
                }
            }
        }

        for (name, (_, record)) in &latest {
            self.insert_group(
                metrics,
                None,
                NormSubject::Parameter((*name).to_string()),
                &record.element_norms,
            );
        }
        // Each optimizer writes its own total under the same unqualified name,
        // in optimizer order; the last optimizer with gradients is what remains.
        for group in norms {
            if let Some(total) = group.total {
                self.insert_group(metrics, None, NormSubject::Total, &[total]);
            }
        }
    }

    /// Emits `_mean` for any non-empty group and `_std` only for groups of two or more.
    fn insert_group(
        &self,
        metrics: &mut GradNormMetrics,
        optimizer: Option<usize>,
        subject: NormSubject,
        values: &[f64],
    ) {
        if let Some(std) = sample_std(values) {
            metrics.insert(
                MetricKey::new(optimizer, self.order, subject.clone(), Statistic::Std),
                std,
            );
        }
        if let Some(m) = mean(values) {
            metrics.insert(MetricKey::new(optimizer, self.order, subject, Statistic::Mean), m);
        }
    }
}
