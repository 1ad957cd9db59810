use super::{check_input_grad, check_param_grad, GradCheckError};
use crate::error::RagNetError;
use crate::model::Model;
use crate::nn::layer::{Backprop, Layer};
use crate::ops::CpuOps;
use crate::ragged::Ragged;
use crate::tensor::Tensor;
use std::sync::Arc;

/// y = x * s for a scalar parameter s. `scale_grad` multiplies the reported
/// gradients so that a deliberately wrong backward can be produced.
#[derive(Debug)]
struct MockScale {
    model: Model<f64>,
    scale_grad: f64,
}

impl MockScale {
    fn new(s: f64, scale_grad: f64) -> Self {
        let mut model = Model::<f64>::new("mock-scale", Arc::new(CpuOps), &["s"], &[]);
        model.set_param("s", Tensor::from_vec1(vec![s]));
        MockScale { model, scale_grad }
    }
}

impl Layer<f64> for MockScale {
    fn model(&self) -> &Model<f64> {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model<f64> {
        &mut self.model
    }

    fn initialize(
        &mut self,
        _x: Option<&Ragged<f64>>,
        _y: Option<&Ragged<f64>>,
    ) -> Result<(), RagNetError> {
        Ok(())
    }

    fn forward<'a>(
        &'a self,
        x: &Ragged<f64>,
        _is_train: bool,
    ) -> Result<(Ragged<f64>, Backprop<'a, f64>), RagNetError> {
        let s = self.model.get_param("s")?.data()[0];
        let data: Vec<f64> = x.data().data().iter().map(|v| v * s).collect();
        let y = Ragged::new(Tensor::new(data, x.data().shape().to_vec())?, x.lengths().to_vec())?;

        let x_data = x.data().clone();
        let k = self.scale_grad;
        let backprop: Backprop<'a, f64> = Box::new(
            move |d_y: &Ragged<f64>| -> Result<Ragged<f64>, RagNetError> {
                let d_s: f64 = x_data
                    .data()
                    .iter()
                    .zip(d_y.data().data())
                    .map(|(a, b)| a * b)
                    .sum();
                self.model.inc_grad("s", &Tensor::from_vec1(vec![d_s * k]))?;
                let d_x: Vec<f64> = d_y.data().data().iter().map(|g| g * s * k).collect();
                let d_x = Tensor::new(d_x, d_y.data().shape().to_vec())?;
                Ragged::new(d_x, d_y.lengths().to_vec())
            },
        );
        Ok((y, backprop))
    }
}

fn batch(values: Vec<f64>) -> Ragged<f64> {
    let rows = values.len();
    Ragged::new(Tensor::new(values, vec![rows, 1]).unwrap(), vec![rows]).unwrap()
}

#[test]
fn test_correct_gradients_pass() -> Result<(), GradCheckError> {
    let mut layer = MockScale::new(1.5, 1.0);
    let x = batch(vec![1.0, -2.0, 0.5]);
    let d_y = batch(vec![0.3, 0.1, -1.0]);
    check_param_grad(&mut layer, "s", &x, &d_y, 1e-6, 1e-6)?;
    check_input_grad(&layer, &x, &d_y, 1e-6, 1e-6)
}

#[test]
fn test_wrong_param_gradient_is_reported() {
    let mut layer = MockScale::new(1.5, 2.0);
    let x = batch(vec![1.0, -2.0, 0.5]);
    let d_y = batch(vec![0.3, 0.1, -1.0]);
    match check_param_grad(&mut layer, "s", &x, &d_y, 1e-6, 1e-6) {
        Err(GradCheckError::GradientMismatch {
            element_index,
            analytical,
            numerical,
            ..
        }) => {
            assert_eq!(element_index, 0);
            approx::assert_relative_eq!(analytical, 2.0 * numerical, epsilon = 1e-6);
        }
        other => panic!("expected a gradient mismatch, got {:?}", other),
    }
    // The perturbed parameter is restored
    assert_eq!(layer.model().get_param("s").unwrap().data(), &[1.5]);
}

#[test]
fn test_wrong_input_gradient_is_reported() {
    let layer = MockScale::new(1.5, 0.5);
    let x = batch(vec![1.0, 2.0]);
    let d_y = batch(vec![1.0, 1.0]);
    assert!(matches!(
        check_input_grad(&layer, &x, &d_y, 1e-6, 1e-6),
        Err(GradCheckError::GradientMismatch { .. })
    ));
}

#[test]
fn test_missing_gradient_is_reported() {
    let mut layer = MockScale::new(1.0, 1.0);
    layer.model_mut().set_param("unused", Tensor::from_vec1(vec![0.0]));
    let x = batch(vec![1.0]);
    assert_eq!(
        check_param_grad(&mut layer, "unused", &x, &x, 1e-6, 1e-6),
        Err(GradCheckError::MissingAnalyticalGrad {
            name: "unused".to_string()
        })
    );
}

#[test]
fn test_unset_parameter_is_a_tensor_error() {
    let mut layer = MockScale::new(1.0, 1.0);
    let x = batch(vec![1.0]);
    assert!(matches!(
        check_param_grad(&mut layer, "missing", &x, &x, 1e-6, 1e-6),
        Err(GradCheckError::TensorError(RagNetError::ParameterNotDeclared { .. }))
    ));
}

#[test]
fn test_non_finite_analytical_gradient_is_reported() {
    let mut layer = MockScale::new(1.5, f64::INFINITY);
    let x = batch(vec![1.0, -2.0, 0.5]);
    let d_y = batch(vec![0.3, 0.1, -1.0]);
    match check_param_grad(&mut layer, "s", &x, &d_y, 1e-6, 1e-6) {
        Err(GradCheckError::AnalyticalGradNaNOrInfinite {
            element_index,
            value,
            ..
        }) => {
            assert_eq!(element_index, 0);
            assert!(value.is_infinite());
        }
        other => panic!("expected a non-finite analytical gradient, got {:?}", other),
    }
    assert!(matches!(
        check_input_grad(&layer, &x, &d_y, 1e-6, 1e-6),
        Err(GradCheckError::AnalyticalGradNaNOrInfinite { element_index: 0, .. })
    ));
}
