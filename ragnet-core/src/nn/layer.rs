use crate::error::RagNetError;
use crate::model::Model;
use crate::ragged::Ragged;
use crate::types::Numeric;

/// Backward callback returned by [`Layer::forward`].
///
/// It maps the gradient of the loss with respect to the layer's output to the
/// gradient with respect to its input, accumulating parameter gradients into
/// the layer's [`Model`] as a side effect. It borrows the layer, so the layer
/// cannot be mutated (e.g. re-initialized) while a callback is alive. It may be
/// called more than once; each call accumulates again.
pub type Backprop<'a, T> = Box<dyn Fn(&Ragged<T>) -> Result<Ragged<T>, RagNetError> + 'a>;

/// The base trait for layers operating on ragged batches.
pub trait Layer<T: Numeric>: std::fmt::Debug + Send + Sync {
    /// The layer's parameter/dimension registry.
    fn model(&self) -> &Model<T>;

    fn model_mut(&mut self) -> &mut Model<T>;

    /// Infers missing dimensions from sample data and allocates parameters.
    /// Must run before the first [`Layer::forward`].
    fn initialize(
        &mut self,
        x: Option<&Ragged<T>>,
        y: Option<&Ragged<T>>,
    ) -> Result<(), RagNetError>;

    /// Computes the output and returns a callback to backpropagate through it.
    fn forward<'a>(
        &'a self,
        x: &Ragged<T>,
        is_train: bool,
    ) -> Result<(Ragged<T>, Backprop<'a, T>), RagNetError>;

    /// Inference-only forward pass.
    fn predict(&self, x: &Ragged<T>) -> Result<Ragged<T>, RagNetError> {
        let (y, _) = self.forward(x, false)?;
        Ok(y)
    }
}
