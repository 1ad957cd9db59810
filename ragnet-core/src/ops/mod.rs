// src/ops/mod.rs
// Tensor operations backend consumed by the layers.

pub mod cpu;

pub use cpu::CpuOps;

use crate::error::RagNetError;
use crate::tensor::Tensor;
use crate::types::Numeric;
use std::fmt::Debug;
use std::sync::Arc;

/// The numeric backend a [`Model`](crate::model::Model) delegates to.
///
/// Layers never touch tensor buffers directly; they compose these primitives so
/// that the shape checks (and their errors) live in one place. Every method is
/// pure except `add_assign`.
pub trait Ops<T: Numeric>: Debug + Send + Sync {
    /// Short identifier of the backend, as accepted by [`get_ops`].
    fn name(&self) -> &'static str;

    /// Allocates a zero-filled tensor.
    ///
    /// # Errors
    /// `TensorCreationError` if the element count of `shape` overflows.
    fn allocate(&self, shape: &[usize]) -> Result<Tensor<T>, RagNetError>;

    /// General matrix multiply of rank-2 tensors: `op(a) @ op(b)` where `op`
    /// transposes when the matching flag is set.
    ///
    /// # Errors
    /// `RankMismatch` for non rank-2 inputs, `IncompatibleShapes` when the inner
    /// dimensions disagree.
    fn gemm(
        &self,
        a: &Tensor<T>,
        b: &Tensor<T>,
        trans1: bool,
        trans2: bool,
    ) -> Result<Tensor<T>, RagNetError>;

    /// Elementwise product. `b` has either the shape of `a`, or is a column
    /// `[rows, 1]` broadcast across the columns of a rank-2 `a`.
    fn mul(&self, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, RagNetError>;

    /// Row-wise reduction `[rows, cols] -> [rows, 1]`.
    fn sum_rows(&self, x: &Tensor<T>) -> Result<Tensor<T>, RagNetError>;

    /// Outer product of `a` (flattened to `m` values) and `b` (flattened to
    /// `n` values), shape `[m, n]`.
    fn outer(&self, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, RagNetError>;

    /// `a += b` in place. Shapes must be identical.
    fn add_assign(&self, a: &mut Tensor<T>, b: &Tensor<T>) -> Result<(), RagNetError>;

    /// Softmax applied independently inside each segment given by `lengths`,
    /// column by column. `x` is rank-2 with `sum(lengths)` rows.
    fn softmax_sequences(
        &self,
        x: &Tensor<T>,
        lengths: &[usize],
    ) -> Result<Tensor<T>, RagNetError>;

    /// Backward of [`Ops::softmax_sequences`]: given the forward output `y` and
    /// the gradient `d_y`, returns `y * d_y - y * sum_segment(y * d_y)`.
    fn backprop_softmax_sequences(
        &self,
        d_y: &Tensor<T>,
        y: &Tensor<T>,
        lengths: &[usize],
    ) -> Result<Tensor<T>, RagNetError>;
}

/// Looks up an ops backend by name. `"cpu"` and `"numpy"` both resolve to
/// [`CpuOps`].
pub fn get_ops<T: Numeric>(name: &str) -> Result<Arc<dyn Ops<T>>, RagNetError> {
    match name {
        "cpu" | "numpy" => Ok(Arc::new(CpuOps)),
        other => Err(RagNetError::UnknownBackend(other.to_string())),
    }
}
