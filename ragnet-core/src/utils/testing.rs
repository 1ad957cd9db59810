use crate::error::RagNetError;
use crate::ragged::{checked_total, Ragged};
use crate::tensor::{checked_numel, Tensor};
use crate::types::Numeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Checks if a tensor is approximately equal to the expected shape and data.
/// Panics if shapes differ or any element differs by more than `tolerance`.
pub fn check_tensor_near<T: Numeric>(
    actual: &Tensor<T>,
    expected_shape: &[usize],
    expected_data: &[T],
    tolerance: T,
) {
    assert_eq!(actual.shape(), expected_shape, "Shape mismatch");
    assert_eq!(
        actual.numel(),
        expected_data.len(),
        "Data length mismatch"
    );
    for (i, (a, e)) in actual.data().iter().zip(expected_data).enumerate() {
        let diff = (*a - *e).abs();
        if diff > tolerance {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                i, a, e, diff, tolerance
            );
        }
    }
}

/// Creates a seeded RNG so that random test inputs are reproducible.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Tensor of the given shape filled with standard-normal samples times `scale`.
pub fn random_tensor<T: Numeric>(
    rng: &mut impl Rng,
    shape: &[usize],
    scale: f64,
) -> Result<Tensor<T>, RagNetError> {
    let numel = checked_numel(shape).ok_or_else(|| RagNetError::TensorCreationError {
        data_len: 0,
        shape: shape.to_vec(),
    })?;
    let data = (0..numel)
        .map(|_| {
            let v: f64 = rng.sample(StandardNormal);
            T::from(v * scale).unwrap_or_else(T::zero)
        })
        .collect();
    Tensor::new(data, shape.to_vec())
}

/// Ragged batch of `[sum(lengths), width]` random rows.
pub fn random_ragged<T: Numeric>(
    rng: &mut impl Rng,
    lengths: &[usize],
    width: usize,
    scale: f64,
) -> Result<Ragged<T>, RagNetError> {
    let total = checked_total(lengths).ok_or(RagNetError::RaggedLengthMismatch {
        total_rows: 0,
        lengths_sum: usize::MAX,
    })?;
    let data = random_tensor(rng, &[total, width], scale)?;
    Ragged::new(data, lengths.to_vec())
}
