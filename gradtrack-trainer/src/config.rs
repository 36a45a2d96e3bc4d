use crate::grad_norm::{AggregationMode, GradNormTracker, NormOrder};
use gradtrack_core::GradTrackError;
use serde::{Deserialize, Serialize};

/// Raw `track_grad_norm` value as written in a config file.
///
/// Accepts a number (`2`, `1.5`), a string (`"2"`, `"inf"`, `"infinity"`) or a
/// boolean. Falsy values (`false`, `0`, `""`, `null`) disable tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackGradNorm {
    Flag(bool),
    Number(f64),
    Text(String),
}

fn default_track_grad_norm_mode() -> String {
    AggregationMode::default().as_str().to_string()
}

fn default_log_every_n_steps() -> usize {
    50
}

/// Trainer settings, fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default)]
    pub track_grad_norm: Option<TrackGradNorm>,
    #[serde(default = "default_track_grad_norm_mode")]
    pub track_grad_norm_mode: String,
    #[serde(default = "default_log_every_n_steps")]
    pub log_every_n_steps: usize,
    #[serde(default)]
    pub max_steps: Option<usize>,
    /// Runs a single step and logs it.
    #[serde(default)]
    pub fast_dev_run: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            track_grad_norm: None,
            track_grad_norm_mode: default_track_grad_norm_mode(),
            log_every_n_steps: default_log_every_n_steps(),
            max_steps: None,
            fast_dev_run: false,
        }
    }
}

impl TrainerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, GradTrackError> {
        serde_json::from_str(json).map_err(|e| GradTrackError::ConfigParse(e.to_string()))
    }

    pub fn with_track_grad_norm(mut self, p: f64) -> Self {
        self.track_grad_norm = Some(TrackGradNorm::Number(p));
        self
    }

    pub fn with_track_grad_norm_str(mut self, p: &str) -> Self {
        self.track_grad_norm = Some(TrackGradNorm::Text(p.to_string()));
        self
    }

    pub fn with_track_grad_norm_mode(mut self, mode: &str) -> Self {
        self.track_grad_norm_mode = mode.to_string();
        self
    }

    pub fn with_log_every_n_steps(mut self, n: usize) -> Self {
        self.log_every_n_steps = n;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn with_fast_dev_run(mut self, fast_dev_run: bool) -> Self {
        self.fast_dev_run = fast_dev_run;
        self
    }

    /// Resolved norm order, `None` when tracking is disabled.
    pub fn norm_order(&self) -> Result<Option<NormOrder>, GradTrackError> {
        match &self.track_grad_norm {
            None | Some(TrackGradNorm::Flag(false)) => Ok(None),
            Some(TrackGradNorm::Flag(true)) => Err(GradTrackError::InvalidNormOrder {
                order: "true".to_string(),
            }),
            Some(TrackGradNorm::Number(p)) if *p == 0.0 => Ok(None),
            Some(TrackGradNorm::Number(p)) => NormOrder::new(*p).map(Some),
            Some(TrackGradNorm::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(TrackGradNorm::Text(s)) => s.parse::<NormOrder>().map(Some),
        }
    }

    pub fn aggregation_mode(&self) -> Result<AggregationMode, GradTrackError> {
        self.track_grad_norm_mode.parse()
    }

    /// Checks every setting and builds the grad-norm tracker, if enabled.
    ///
    /// The aggregation mode is validated even when tracking is disabled.
    pub fn validate(&self) -> Result<Option<GradNormTracker>, GradTrackError> {
        if self.log_every_n_steps == 0 {
            return Err(GradTrackError::ConfigurationError(
                "log_every_n_steps must be at least 1".to_string(),
            ));
        }
        let mode = self.aggregation_mode()?;
        Ok(self
            .norm_order()?
            .map(|order| GradNormTracker::new(order, mode)))
    }
}
