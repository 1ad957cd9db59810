use crate::error::RagNetError;
use crate::model::Model;
use crate::nn::layer::{Backprop, Layer};
use crate::ops::{CpuOps, Ops};
use crate::ragged::Ragged;
use crate::tensor::Tensor;
use crate::types::Numeric;
use crate::utils::get_width;
use log::{debug, trace};
use std::sync::Arc;

const Q: &str = "Q";
const N_O: &str = "nO";

/// Weights the rows of each sequence by their similarity to a learned vector.
///
/// For a ragged batch `X` with rows `x_i`, the layer learns one vector `Q` of
/// width `nO` and computes
///
/// ```text
/// score_i = x_i · Q
/// attn    = softmax of the scores, taken separately within each sequence
/// y_i     = attn_i * x_i
/// ```
///
/// so the weights of every sequence sum to one. The output has the same
/// lengths as the input.
///
/// Parameters: `Q` (shape `[nO]`, zero-initialized). Dimensions: `nO`, which
/// must equal the width of the input rows.
#[derive(Debug)]
pub struct ParametricAttention<T: Numeric> {
    model: Model<T>,
}

impl<T: Numeric> ParametricAttention<T> {
    pub const NAME: &'static str = "para-attn";

    /// Creates the layer on the CPU backend. `Q` stays unallocated until
    /// [`Layer::initialize`]; `n_o` may be left to be inferred there.
    pub fn new(n_o: Option<usize>) -> Self {
        Self::with_ops(n_o, Arc::new(CpuOps))
    }

    /// Creates the layer on a given ops backend.
    pub fn with_ops(n_o: Option<usize>, ops: Arc<dyn Ops<T>>) -> Self {
        ParametricAttention {
            model: Model::new(Self::NAME, ops, &[Q], &[(N_O, n_o)]),
        }
    }

    /// Per-row attention weights for `x`, shape `[total_rows, 1]`.
    ///
    /// # Errors
    /// `ParameterNotSet` before initialization; `IncompatibleShapes` /
    /// `RankMismatch` from the ops when `x` is not `[rows, nO]`.
    pub fn attention_weights(&self, x: &Ragged<T>) -> Result<Tensor<T>, RagNetError> {
        let q = self.model.get_param(Q)?;
        let ops = self.model.ops();
        let scores = ops.gemm(x.data(), &q.reshape(&[q.numel(), 1])?, false, false)?;
        ops.softmax_sequences(&scores, x.lengths())
    }
}

impl<T: Numeric> Layer<T> for ParametricAttention<T> {
    fn model(&self) -> &Model<T> {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model<T> {
        &mut self.model
    }

    fn initialize(
        &mut self,
        _x: Option<&Ragged<T>>,
        y: Option<&Ragged<T>>,
    ) -> Result<(), RagNetError> {
        if let Some(y) = y {
            let width = get_width(y.data())?;
            debug!("{}: inferring nO = {} from sample output", Self::NAME, width);
            self.model.set_dim(N_O, width)?;
        }
        let n_o = self.model.get_dim(N_O)?;
        let q = self.model.ops().allocate(&[n_o])?;
        self.model.set_param(Q, q);
        debug!("{}: initialized Q with width {}", Self::NAME, n_o);
        Ok(())
    }

    // `is_train` has no effect on this layer.
    fn forward<'a>(
        &'a self,
        x: &Ragged<T>,
        _is_train: bool,
    ) -> Result<(Ragged<T>, Backprop<'a, T>), RagNetError> {
        let model = &self.model;
        let q = model.get_param(Q)?.clone();
        let attention = self.attention_weights(x)?;
        let output = model.ops().mul(x.data(), &attention)?;
        trace!(
            "{}: forward over {} rows in {} sequences",
            Self::NAME,
            x.total_rows(),
            x.num_sequences()
        );

        let x_data = x.data().clone();
        let lengths = x.lengths().to_vec();
        let backprop: Backprop<'a, T> = Box::new(
            move |d_y: &Ragged<T>| -> Result<Ragged<T>, RagNetError> {
                let ops = model.ops();
                let d_y_data = d_y.data();

                // Apply step: y = x * attn
                let d_attention = ops.sum_rows(&ops.mul(&x_data, d_y_data)?)?;
                let mut d_x = ops.mul(d_y_data, &attention)?;

                // Score step: attn = softmax_sequences(x @ Q)
                let d_scores = ops.backprop_softmax_sequences(&d_attention, &attention, &lengths)?;
                let d_q = ops.gemm(&x_data, &d_scores, true, false)?;
                let d_q = d_q.reshape(&[d_q.numel()])?;
                let d_x_scores = ops.outer(&d_scores, &q)?;

                ops.add_assign(&mut d_x, &d_x_scores)?;
                model.inc_grad(Q, &d_q)?;
                trace!("{}: backward over {} rows", Self::NAME, d_x.shape()[0]);
                Ragged::new(d_x, d_y.lengths().to_vec())
            },
        );

        Ok((Ragged::new(output, x.lengths().to_vec())?, backprop))
    }
}

#[cfg(test)]
#[path = "parametric_attention_test.rs"]
mod tests;
