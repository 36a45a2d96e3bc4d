#[cfg(test)]
mod tests {
    use crate::grad_norm::collector::{GradientCollector, NamedParameter, OptimizerParams};
    use crate::grad_norm::norm_order::NormOrder;
    use approx::assert_relative_eq;
    use gradtrack_core::nn::Parameter;
    use gradtrack_core::{GradTrackError, Tensor};
    use std::sync::{Arc, RwLock};

    fn named_param(name: &str, data: Vec<f32>, grad: Option<Vec<f32>>) -> NamedParameter {
        let shape = vec![data.len()];
        let tensor = Tensor::new(data, shape.clone()).unwrap();
        if let Some(g) = grad {
            tensor.acc_grad(&Tensor::new(g, shape).unwrap()).unwrap();
        }
        let param = Parameter::new(tensor, Some(name.to_string())).unwrap();
        NamedParameter {
            name: name.to_string(),
            param: Arc::new(RwLock::new(param)),
        }
    }

    fn optimizer(idx: usize, params: Vec<NamedParameter>) -> OptimizerParams {
        OptimizerParams {
            optimizer_idx: idx,
            params,
        }
    }

    #[test]
    fn test_collect_norms_and_total() {
        let opt = optimizer(
            0,
            vec![
                named_param("first.weight", vec![0.0; 2], Some(vec![3.0, -4.0])),
                named_param("first.bias", vec![0.0; 3], Some(vec![1.0, 2.0, 2.0])),
            ],
        );
        let collected = GradientCollector::new(NormOrder::l2()).collect(&opt).unwrap();

        assert_eq!(collected.optimizer_idx, 0);
        assert_eq!(collected.params.len(), 2);
        assert_eq!(collected.params[0].name, "first.weight");
        assert_relative_eq!(collected.params[0].norm, 5.0);
        assert_eq!(collected.params[0].element_norms, vec![3.0, 4.0]);
        assert_relative_eq!(collected.params[1].norm, 3.0);
        // sqrt(9 + 16 + 1 + 4 + 4)
        assert_relative_eq!(collected.total.unwrap(), 34f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_collect_infinity_norm() {
        let opt = optimizer(
            1,
            vec![
                named_param("a", vec![0.0; 2], Some(vec![-7.0, 2.0])),
                named_param("b", vec![0.0; 1], Some(vec![5.0])),
            ],
        );
        let collected = GradientCollector::new(NormOrder::Infinity).collect(&opt).unwrap();
        assert_relative_eq!(collected.params[0].norm, 7.0);
        assert_relative_eq!(collected.total.unwrap(), 7.0);
    }

    #[test]
    fn test_params_without_grad_are_skipped() {
        let opt = optimizer(
            0,
            vec![
                named_param("used", vec![0.0; 2], Some(vec![1.0, 1.0])),
                named_param("frozen", vec![0.0; 2], None),
            ],
        );
        let collected = GradientCollector::new(NormOrder::l2()).collect(&opt).unwrap();
        assert_eq!(collected.params.len(), 1);
        assert!(collected.params.iter().all(|p| p.name != "frozen"));
    }

    #[test]
    fn test_all_params_without_grad_gives_no_total() {
        let opt = optimizer(0, vec![named_param("frozen", vec![0.0; 2], None)]);
        let collected = GradientCollector::new(NormOrder::l2()).collect(&opt).unwrap();
        assert!(collected.params.is_empty());
        assert!(collected.total.is_none());
    }

    #[test]
    fn test_empty_optimizer_error() {
        let result = GradientCollector::new(NormOrder::l2()).collect(&optimizer(3, Vec::new()));
        assert_eq!(result, Err(GradTrackError::EmptyOptimizer { optimizer_idx: 3 }));
    }

    #[test]
    fn test_shared_param_collected_once() {
        let p = named_param("shared", vec![0.0; 2], Some(vec![1.0, 0.0]));
        let opt = optimizer(0, vec![p.clone(), p]);
        let collected = GradientCollector::new(NormOrder::l2()).collect(&opt).unwrap();
        assert_eq!(collected.params.len(), 1);
        assert_relative_eq!(collected.total.unwrap(), 1.0);
    }

    #[test]
    fn test_collect_does_not_mutate_gradients() {
        let p = named_param("w", vec![0.0; 3], Some(vec![0.5, -1.5, 2.0]));
        let opt = optimizer(0, vec![p.clone()]);
        GradientCollector::new(NormOrder::Finite(3.0)).collect(&opt).unwrap();
        let grad = p.param.read().unwrap().grad().unwrap().unwrap();
        assert_eq!(grad.get_f32_data().unwrap(), vec![0.5, -1.5, 2.0]);
    }

    #[test]
    fn test_non_finite_gradient_propagates() {
        let opt = optimizer(0, vec![named_param("w", vec![0.0; 2], Some(vec![f32::NAN, 1.0]))]);
        let collected = GradientCollector::new(NormOrder::l2()).collect(&opt).unwrap();
        assert!(collected.params[0].norm.is_nan());
        assert!(collected.total.unwrap().is_nan());
    }

    #[test]
    fn test_try_from_p() {
        assert_eq!(
            GradientCollector::try_from_p(2.0).unwrap().order(),
            NormOrder::Finite(2.0)
        );
        assert!(matches!(
            GradientCollector::try_from_p(0.0),
            Err(GradTrackError::InvalidNormOrder { .. })
        ));
    }
}
