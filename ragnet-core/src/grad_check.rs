use crate::error::RagNetError;
use crate::nn::Layer;
use crate::ragged::Ragged;
use crate::tensor::Tensor;
use crate::types::Numeric;
use approx::relative_eq;
use log::debug;
use thiserror::Error;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed for {target} at element {element_index}: analytical {analytical:?} != numerical {numerical:?} (difference {difference:?})")]
    GradientMismatch {
        target: String,
        element_index: usize,
        analytical: f64,
        numerical: f64,
        difference: f64,
    },

    #[error("Numerical gradient is NaN or infinite for {target}, element {element_index}. Loss+: {loss_plus:?}, Loss-: {loss_minus:?}")]
    NumericalGradNaNOrInfinite {
        target: String,
        element_index: usize,
        loss_plus: f64,
        loss_minus: f64,
    },

    #[error("Analytical gradient is NaN or infinite for {target}, element {element_index}: {value:?}")]
    AnalyticalGradNaNOrInfinite {
        target: String,
        element_index: usize,
        value: f64,
    },

    #[error("Parameter '{name}' has no gradient after the backward pass")]
    MissingAnalyticalGrad { name: String },

    #[error("Tensor error during gradient check: {0}")]
    TensorError(RagNetError),
}

impl From<RagNetError> for GradCheckError {
    fn from(err: RagNetError) -> Self {
        GradCheckError::TensorError(err)
    }
}

fn to_f64<T: Numeric>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

fn from_f64<T: Numeric>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::nan)
}

/// Scalar loss `L = sum(y * d_y)`, whose gradient with respect to `y` is `d_y`.
fn weighted_loss<T: Numeric>(y: &Ragged<T>, d_y: &Ragged<T>) -> Result<f64, RagNetError> {
    if y.data().shape() != d_y.data().shape() {
        return Err(RagNetError::ShapeMismatch {
            expected: y.data().shape().to_vec(),
            actual: d_y.data().shape().to_vec(),
            operation: "grad_check loss".to_string(),
        });
    }
    Ok(y
        .data()
        .data()
        .iter()
        .zip(d_y.data().data())
        .map(|(&a, &b)| to_f64(a) * to_f64(b))
        .sum())
}

fn compare(
    target: &str,
    element_index: usize,
    analytical: f64,
    loss_plus: f64,
    loss_minus: f64,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError> {
    let numerical = (loss_plus - loss_minus) / (2.0 * epsilon);
    if !numerical.is_finite() {
        return Err(GradCheckError::NumericalGradNaNOrInfinite {
            target: target.to_string(),
            element_index,
            loss_plus,
            loss_minus,
        });
    }
    if !analytical.is_finite() {
        return Err(GradCheckError::AnalyticalGradNaNOrInfinite {
            target: target.to_string(),
            element_index,
            value: analytical,
        });
    }
    if !relative_eq!(
        analytical,
        numerical,
        epsilon = tolerance,
        max_relative = tolerance
    ) {
        return Err(GradCheckError::GradientMismatch {
            target: target.to_string(),
            element_index,
            analytical,
            numerical,
            difference: (analytical - numerical).abs(),
        });
    }
    Ok(())
}

/// Runs forward + backward once with a clean gradient store and returns the
/// accumulated gradient of parameter `name`.
fn analytical_param_grad<T, L>(
    layer: &L,
    name: &str,
    x: &Ragged<T>,
    d_y: &Ragged<T>,
) -> Result<Tensor<T>, GradCheckError>
where
    T: Numeric,
    L: Layer<T> + ?Sized,
{
    layer.model().zero_grads()?;
    let (_, backprop) = layer.forward(x, true)?;
    backprop(d_y)?;
    layer
        .model()
        .get_grad(name)?
        .ok_or_else(|| GradCheckError::MissingAnalyticalGrad {
            name: name.to_string(),
        })
}

/// Loss of the layer after replacing parameter `name` with `value`.
fn loss_with_param<T, L>(
    layer: &mut L,
    name: &str,
    value: Tensor<T>,
    x: &Ragged<T>,
    d_y: &Ragged<T>,
) -> Result<f64, RagNetError>
where
    T: Numeric,
    L: Layer<T> + ?Sized,
{
    layer.model_mut().set_param(name, value);
    let y = layer.predict(x)?;
    weighted_loss(&y, d_y)
}

/// Central finite-difference check of the gradient of parameter `name`,
/// element by element, under the loss `sum(forward(x) * d_y)`.
///
/// The parameter's gradient store is reset before the analytical pass, and the
/// parameter value is restored afterwards, even on failure.
pub fn check_param_grad<T, L>(
    layer: &mut L,
    name: &str,
    x: &Ragged<T>,
    d_y: &Ragged<T>,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError>
where
    T: Numeric,
    L: Layer<T> + ?Sized,
{
    let original = layer.model().get_param(name)?.clone();
    let analytical_grad = analytical_param_grad(layer, name, x, d_y)?;
    debug!(
        "check_param_grad: '{}' with {} elements, epsilon = {}",
        name,
        original.numel(),
        epsilon
    );

    let mut losses = Vec::with_capacity(original.numel());
    let mut outcome: Result<(), RagNetError> = Ok(());
    for idx in 0..original.numel() {
        let mut plus = original.clone();
        plus.data_mut()[idx] = from_f64(to_f64(original.data()[idx]) + epsilon);
        let mut minus = original.clone();
        minus.data_mut()[idx] = from_f64(to_f64(original.data()[idx]) - epsilon);

        let pair = loss_with_param(layer, name, plus, x, d_y).and_then(|loss_plus| {
            loss_with_param(layer, name, minus, x, d_y).map(|loss_minus| (loss_plus, loss_minus))
        });
        match pair {
            Ok(pair) => losses.push(pair),
            Err(err) => {
                outcome = Err(err);
                break;
            }
        }
    }
    layer.model_mut().set_param(name, original);
    outcome?;

    for (idx, (loss_plus, loss_minus)) in losses.into_iter().enumerate() {
        let target = format!("parameter '{}'", name);
        let analytical = to_f64(analytical_grad.data()[idx]);
        compare(&target, idx, analytical, loss_plus, loss_minus, epsilon, tolerance)?;
    }
    Ok(())
}

/// Directional finite-difference check: moving parameter `name` by
/// `epsilon * direction` must change the loss by `epsilon * (grad · direction)`
/// to first order.
pub fn check_param_grad_direction<T, L>(
    layer: &mut L,
    name: &str,
    direction: &Tensor<T>,
    x: &Ragged<T>,
    d_y: &Ragged<T>,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError>
where
    T: Numeric,
    L: Layer<T> + ?Sized,
{
    let original = layer.model().get_param(name)?.clone();
    let analytical_grad = analytical_param_grad(layer, name, x, d_y)?;
    if direction.shape() != original.shape() {
        return Err(RagNetError::ShapeMismatch {
            expected: original.shape().to_vec(),
            actual: direction.shape().to_vec(),
            operation: "check_param_grad_direction".to_string(),
        }
        .into());
    }

    let shifted = |sign: f64| -> Tensor<T> {
        let mut t = original.clone();
        for (v, &d) in t.data_mut().iter_mut().zip(direction.data()) {
            *v = from_f64(to_f64(*v) + sign * epsilon * to_f64(d));
        }
        t
    };
    let (plus, minus) = (shifted(1.0), shifted(-1.0));
    let pair = loss_with_param(layer, name, plus, x, d_y).and_then(|loss_plus| {
        loss_with_param(layer, name, minus, x, d_y).map(|loss_minus| (loss_plus, loss_minus))
    });
    layer.model_mut().set_param(name, original);
    let (loss_plus, loss_minus) = pair?;

    let analytical: f64 = analytical_grad
        .data()
        .iter()
        .zip(direction.data())
        .map(|(&g, &d)| to_f64(g) * to_f64(d))
        .sum();
    let target = format!("parameter '{}' along direction", name);
    compare(&target, 0, analytical, loss_plus, loss_minus, epsilon, tolerance)
}

/// Central finite-difference check of the input gradient returned by the
/// backward callback, element by element over `x.data()`.
///
/// The backward pass accumulates parameter gradients as usual.
pub fn check_input_grad<T, L>(
    layer: &L,
    x: &Ragged<T>,
    d_y: &Ragged<T>,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError>
where
    T: Numeric,
    L: Layer<T> + ?Sized,
{
    let d_x = {
        let (_, backprop) = layer.forward(x, true)?;
        backprop(d_y)?
    };
    debug!(
        "check_input_grad: {} elements, epsilon = {}",
        x.data().numel(),
        epsilon
    );

    let perturbed_loss = |idx: usize, delta: f64| -> Result<f64, RagNetError> {
        let mut data = x.data().clone();
        data.data_mut()[idx] = from_f64(to_f64(x.data().data()[idx]) + delta);
        let y = layer.predict(&Ragged::new(data, x.lengths().to_vec())?)?;
        weighted_loss(&y, d_y)
    };

    for idx in 0..x.data().numel() {
        let loss_plus = perturbed_loss(idx, epsilon)?;
        let loss_minus = perturbed_loss(idx, -epsilon)?;
        let analytical = to_f64(d_x.data().data()[idx]);
        compare("input", idx, analytical, loss_plus, loss_minus, epsilon, tolerance)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "grad_check_test.rs"]
mod tests;
