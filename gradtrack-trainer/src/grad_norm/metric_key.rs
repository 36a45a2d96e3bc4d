use super::norm_order::NormOrder;
use std::collections::BTreeMap;
use std::fmt;

/// What a norm statistic is about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NormSubject {
    /// A single named parameter, e.g. `first.weight`.
    Parameter(String),
    /// All parameters of the group taken together.
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Statistic {
    Mean,
    Std,
}

/// Structured metric name, rendered as
/// `[opt_{i}_]grad_{p}_norm_{subject}_{mean|std}` only at the logging boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricKey {
    pub optimizer: Option<usize>,
    pub order: NormOrder,
    pub subject: NormSubject,
    pub statistic: Statistic,
}

impl MetricKey {
    pub fn new(
        optimizer: Option<usize>,
        order: NormOrder,
        subject: NormSubject,
        statistic: Statistic,
    ) -> Self {
        MetricKey {
            optimizer,
            order,
            subject,
            statistic,
        }
    }

    pub fn parameter(optimizer: Option<usize>, order: NormOrder, name: &str, statistic: Statistic) -> Self {
        Self::new(optimizer, order, NormSubject::Parameter(name.to_string()), statistic)
    }

    pub fn total(optimizer: Option<usize>, order: NormOrder, statistic: Statistic) -> Self {
        Self::new(optimizer, order, NormSubject::Total, statistic)
    }
}

impl fmt::Display for NormSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormSubject::Parameter(name) => f.write_str(name),
            NormSubject::Total => f.write_str("total"),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Mean => f.write_str("mean"),
            Statistic::Std => f.write_str("std"),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(idx) = self.optimizer {
            write!(f, "opt_{}_", idx)?;
        }
        write!(f, "grad_{}_norm_{}_{}", self.order, self.subject, self.statistic)
    }
}

/// Output of one aggregation: typed keys to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradNormMetrics {
    values: BTreeMap<MetricKey, f64>,
}

impl GradNormMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write for a key wins.
    pub fn insert(&mut self, key: MetricKey, value: f64) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &MetricKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn contains(&self, key: &MetricKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricKey, &f64)> {
        self.values.iter()
    }

    /// Renders every key to its metric name.
    pub fn render(&self) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }
}
