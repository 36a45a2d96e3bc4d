mod common;

use common::{batches, TestModel};
use gradtrack_trainer::{GradTrackError, LogSink, LoggedMetrics, MetricsSink, Trainer, TrainerConfig};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Records the step and metric names of every `log_metrics` call.
struct RecordingSink {
    calls: Arc<Mutex<Vec<(usize, Vec<String>)>>>,
}

impl MetricsSink for RecordingSink {
    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>, step: usize) -> Result<(), GradTrackError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((step, metrics.keys().cloned().collect()));
        Ok(())
    }
}

fn fit(config: TrainerConfig) -> LoggedMetrics {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut model = TestModel::new(42).expect("model");
    let mut trainer = Trainer::new(config).expect("valid config");
    trainer.fit(&mut model, &batches(16, 8, 7)).expect("fit");
    trainer.logged_metrics().clone()
}

fn fast_dev_config(mode: &str) -> TrainerConfig {
    TrainerConfig::default()
        .with_track_grad_norm(2.0)
        .with_track_grad_norm_mode(mode)
        .with_log_every_n_steps(1)
        .with_fast_dev_run(true)
}

fn assert_all_positive(logged: &LoggedMetrics, names: &[&str], what: &str) {
    for name in names {
        match logged.get(name) {
            Some(value) => assert!(value > 0.0, "{} = {} for {}", name, value, what),
            None => panic!("{} not logged for {}", name, what),
        }
    }
}

#[test]
fn test_grad_norm_aggregated_over_parameters() {
    let logged = fit(fast_dev_config("parameters"));

    assert!(
        !logged.contains("grad_2.0_norm_total_std"),
        "the total norm has no standard deviation when aggregating over parameters"
    );
    assert_all_positive(
        &logged,
        &[
            "grad_2.0_norm_first.weight_mean",
            "grad_2.0_norm_first.weight_std",
            "grad_2.0_norm_first.bias_mean",
            "grad_2.0_norm_first.bias_std",
            "grad_2.0_norm_total_mean",
        ],
        "first optimizer",
    );
    assert_all_positive(
        &logged,
        &[
            "grad_2.0_norm_second.weight_mean",
            "grad_2.0_norm_second.weight_std",
            "grad_2.0_norm_second.bias_mean",
            "grad_2.0_norm_second.bias_std",
            "grad_2.0_norm_total_mean",
        ],
        "second optimizer",
    );
    assert!(logged.latest().keys().all(|k| !k.starts_with("opt_")));
}

#[test]
fn test_grad_norm_aggregated_over_optimizers_and_parameters() {
    let logged = fit(fast_dev_config("optimizer+parameters"));

    assert_all_positive(
        &logged,
        &[
            "opt_0_grad_2.0_norm_first.weight_mean",
            "opt_0_grad_2.0_norm_first.weight_std",
            "opt_0_grad_2.0_norm_first.bias_mean",
            "opt_0_grad_2.0_norm_first.bias_std",
            "opt_0_grad_2.0_norm_total_mean",
            "opt_0_grad_2.0_norm_total_std",
        ],
        "first optimizer",
    );
    assert_all_positive(
        &logged,
        &[
            "opt_1_grad_2.0_norm_second.weight_mean",
            "opt_1_grad_2.0_norm_second.weight_std",
            "opt_1_grad_2.0_norm_second.bias_mean",
            "opt_1_grad_2.0_norm_second.bias_std",
            "opt_1_grad_2.0_norm_total_mean",
            "opt_1_grad_2.0_norm_total_std",
        ],
        "second optimizer",
    );
    assert!(!logged.contains("opt_0_grad_2.0_norm_second.weight_mean"));
    assert!(!logged.contains("opt_1_grad_2.0_norm_first.weight_mean"));
}

#[test]
fn test_grad_norm_aggregated_over_optimizers() {
    let logged = fit(fast_dev_config("optimizer"));

    for idx in 0..2 {
        for suffix in ["total_std", "mean", "std"] {
            let name = format!("opt_{}_grad_2.0_norm_{}", idx, suffix);
            assert!(!logged.contains(&name), "{} should not be tracked when aggregating over optimizers", name);
        }
    }
    assert_all_positive(&logged, &["opt_0_grad_2.0_norm_total_mean"], "first optimizer");
    assert_all_positive(&logged, &["opt_1_grad_2.0_norm_total_mean"], "second optimizer");

    let grad_metrics = logged.latest().keys().filter(|k| k.contains("_norm_")).count();
    assert_eq!(grad_metrics, 2);
}

#[test]
fn test_disabled_tracking_logs_only_loss() {
    for config in [
        TrainerConfig::default().with_fast_dev_run(true),
        TrainerConfig::default().with_track_grad_norm(0.0).with_fast_dev_run(true),
        TrainerConfig::from_json_str(r#"{"track_grad_norm": false, "fast_dev_run": true}"#).expect("config"),
    ] {
        let logged = fit(config);
        assert_eq!(logged.latest().keys().collect::<Vec<_>>(), vec!["loss"]);
    }
}

#[test]
fn test_infinity_norm_naming() {
    let logged = fit(
        TrainerConfig::default()
            .with_track_grad_norm_str("inf")
            .with_track_grad_norm_mode("optimizer")
            .with_fast_dev_run(true),
    );
    assert_all_positive(
        &logged,
        &["opt_0_grad_inf_norm_total_mean", "opt_1_grad_inf_norm_total_mean"],
        "infinity norm",
    );
}

#[test]
fn test_logging_cadence() {
    let config = TrainerConfig::default()
        .with_track_grad_norm(1.0)
        .with_track_grad_norm_mode("optimizer")
        .with_log_every_n_steps(5)
        .with_max_steps(12);
    let _ = env_logger::builder().is_test(true).try_init();
    let mut model = TestModel::new(3).expect("model");
    let mut trainer = Trainer::new(config).expect("valid config");
    trainer.add_sink(Box::new(LogSink));
    trainer.fit(&mut model, &batches(16, 4, 11)).expect("fit");

    assert_eq!(trainer.global_step(), 12);
    let logged = trainer.logged_metrics();
    assert_eq!(logged.steps_for("loss"), vec![0, 5, 10]);
    assert_eq!(logged.steps_for("opt_0_grad_1.0_norm_total_mean"), vec![0, 5, 10]);
    assert_eq!(logged.steps_for("opt_1_grad_1.0_norm_total_mean"), vec![0, 5, 10]);
}

#[test]
fn test_parameter_without_gradient_is_absent() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut model = TestModel::new(42).and_then(|m| m.with_unused_layer(5)).expect("model");
    let mut trainer = Trainer::new(fast_dev_config("optimizer+parameters")).expect("valid config");
    trainer.fit(&mut model, &batches(2, 8, 7)).expect("fit");

    let logged = trainer.logged_metrics();
    assert!(logged.contains("opt_1_grad_2.0_norm_second.weight_mean"));
    assert!(logged.latest().keys().all(|k| !k.contains("unused")));
}

#[test]
fn test_invalid_settings_fail_before_training() {
    for config in [
        TrainerConfig::default().with_track_grad_norm(-2.0),
        TrainerConfig::default().with_track_grad_norm_str("two"),
        TrainerConfig::default().with_track_grad_norm(2.0).with_track_grad_norm_mode("layers"),
        TrainerConfig::default().with_track_grad_norm_mode("layers"),
        TrainerConfig::default().with_log_every_n_steps(0),
    ] {
        assert!(Trainer::new(config).is_err());
    }
}

#[test]
fn test_tracking_does_not_change_training() {
    let train = |config: TrainerConfig| {
        let mut model = TestModel::new(9).expect("model");
        let mut trainer = Trainer::new(config).expect("valid config");
        trainer.fit(&mut model, &batches(6, 4, 13)).expect("fit");
        let weight = gradtrack_core::nn::module::param_tensor(model.second.weight()).expect("weight");
        weight.get_f32_data().expect("data")
    };
    let plain = train(TrainerConfig::default().with_log_every_n_steps(1));
    let tracked = train(
        TrainerConfig::default()
            .with_track_grad_norm(2.0)
            .with_track_grad_norm_mode("optimizer+parameters")
            .with_log_every_n_steps(1),
    );
    assert_eq!(plain, tracked);
}

#[test]
fn test_each_logged_step_is_submitted_once() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let config = TrainerConfig::default()
        .with_track_grad_norm(2.0)
        .with_track_grad_norm_mode("optimizer")
        .with_log_every_n_steps(2)
        .with_max_steps(5);
    let mut model = TestModel::new(4).expect("model");
    let mut trainer = Trainer::new(config).expect("valid config");
    trainer.add_sink(Box::new(RecordingSink { calls: calls.clone() }));
    trainer.fit(&mut model, &batches(8, 4, 21)).expect("fit");

    let calls = calls.lock().expect("calls lock");
    let steps: Vec<usize> = calls.iter().map(|(step, _)| *step).collect();
    assert_eq!(steps, vec![0, 2, 4]);
    for (_, names) in calls.iter() {
        assert_eq!(
            names,
            &vec![
                "loss".to_string(),
                "opt_0_grad_2.0_norm_total_mean".to_string(),
                "opt_1_grad_2.0_norm_total_mean".to_string(),
            ]
        );
    }
}
