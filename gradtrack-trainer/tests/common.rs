use gradtrack_core::nn::{Linear, MSELoss, Module, Parameter};
use gradtrack_core::optim::{AdamOptimizer, Optimizer, SgdOptimizer};
use gradtrack_core::{GradTrackError, Tensor};
use gradtrack_trainer::TrainingModule;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, RwLock};

pub const IN_FEATURES: usize = 6;
pub const HIDDEN: usize = 4;
pub const OUT_FEATURES: usize = 3;

/// Two stacked linear layers, each stepped by its own optimizer
/// (SGD for `first`, Adam for `second`).
#[derive(Debug)]
pub struct TestModel {
    pub first: Linear,
    pub second: Linear,
    /// Registered with the second optimizer but never used in forward.
    pub unused: Option<Linear>,
    loss: MSELoss,
}

#[allow(dead_code)]
impl TestModel {
    pub fn new(seed: u64) -> Result<Self, GradTrackError> {
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(TestModel {
            first: Linear::new(IN_FEATURES, HIDDEN, true, &mut rng)?.with_prefix("first")?,
            second: Linear::new(HIDDEN, OUT_FEATURES, true, &mut rng)?.with_prefix("second")?,
            unused: None,
            loss: MSELoss::default(),
        })
    }

    pub fn with_unused_layer(mut self, seed: u64) -> Result<Self, GradTrackError> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.unused = Some(Linear::new(HIDDEN, OUT_FEATURES, true, &mut rng)?.with_prefix("unused")?);
        Ok(self)
    }

    fn second_optimizer_params(&self) -> Vec<Arc<RwLock<Parameter>>> {
        let mut params = self.second.parameters();
        if let Some(unused) = &self.unused {
            params.extend(unused.parameters());
        }
        params
    }
}

impl TrainingModule for TestModel {
    type Batch = (Tensor, Tensor);

    fn named_parameters(&self) -> Vec<(String, Arc<RwLock<Parameter>>)> {
        let mut named = self.first.named_parameters();
        named.extend(self.second.named_parameters());
        if let Some(unused) = &self.unused {
            named.extend(unused.named_parameters());
        }
        named
    }

    fn configure_optimizers(&self) -> Result<Vec<Box<dyn Optimizer>>, GradTrackError> {
        let first = SgdOptimizer::new(self.first.parameters(), 0.01, 0.0, 0.0)?;
        let second = AdamOptimizer::with_defaults(self.second_optimizer_params(), 0.01)?;
        Ok(vec![Box::new(first), Box::new(second)])
    }

    fn training_step(&mut self, batch: &Self::Batch, _batch_idx: usize) -> Result<f32, GradTrackError> {
        let (xs, ys) = batch;
        let hidden = self.first.forward(xs)?;
        let out = self.second.forward(&hidden)?;
        let loss = self.loss.forward(&out, ys)?;

        let grad_out = self.loss.backward(&out, ys)?;
        let grad_hidden = self.second.backward(&hidden, &grad_out)?;
        self.first.backward(xs, &grad_hidden)?;
        Ok(loss)
    }
}

/// `count` random batches of `batch_size` samples, reproducible from `seed`.
#[allow(dead_code)]
pub fn batches(count: usize, batch_size: usize, seed: u64) -> Vec<(Tensor, Tensor)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let xs = Tensor::randn(&[batch_size, IN_FEATURES], &mut rng).expect("input batch");
            let ys = Tensor::randn(&[batch_size, OUT_FEATURES], &mut rng).expect("target batch");
            (xs, ys)
        })
        .collect()
}
