use super::Ops;
use crate::error::RagNetError;
use crate::ragged::checked_total;
use crate::tensor::Tensor;
use crate::types::Numeric;

/// Single-threaded CPU implementation of [`Ops`], with naive loops over
/// contiguous row-major buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuOps;

/// Validates that `x` is `[sum(lengths), cols]` and returns `cols`.
///
/// Once this passes, every `start + len` over `lengths` stays within `rows`.
fn check_segmented(
    x: &Tensor<impl Numeric>,
    lengths: &[usize],
    operation: &str,
) -> Result<usize, RagNetError> {
    let (rows, cols) = x.dims2()?;
    let lengths_sum = checked_total(lengths).ok_or(RagNetError::RaggedLengthMismatch {
        total_rows: rows,
        lengths_sum: usize::MAX,
    })?;
    if lengths_sum != rows {
        return Err(RagNetError::ShapeMismatch {
            expected: vec![lengths_sum, cols],
            actual: x.shape().to_vec(),
            operation: operation.to_string(),
        });
    }
    Ok(cols)
}

impl<T: Numeric> Ops<T> for CpuOps {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn allocate(&self, shape: &[usize]) -> Result<Tensor<T>, RagNetError> {
        Tensor::zeros(shape)
    }

    fn gemm(
        &self,
        a: &Tensor<T>,
        b: &Tensor<T>,
        trans1: bool,
        trans2: bool,
    ) -> Result<Tensor<T>, RagNetError> {
        let (a_rows, a_cols) = a.dims2()?;
        let (b_rows, b_cols) = b.dims2()?;
        let (m, k) = if trans1 { (a_cols, a_rows) } else { (a_rows, a_cols) };
        let (k2, n) = if trans2 { (b_cols, b_rows) } else { (b_rows, b_cols) };
        if k != k2 {
            return Err(RagNetError::IncompatibleShapes {
                shape1: a.shape().to_vec(),
                shape2: b.shape().to_vec(),
                operation: "gemm".to_string(),
            });
        }

        let a_data = a.data();
        let b_data = b.data();
        // Element (i, l) of op(a) and (l, j) of op(b) in the untransposed buffers.
        let a_at = |i: usize, l: usize| {
            if trans1 {
                a_data[l * a_cols + i]
            } else {
                a_data[i * a_cols + l]
            }
        };
        let b_at = |l: usize, j: usize| {
            if trans2 {
                b_data[j * b_cols + l]
            } else {
                b_data[l * b_cols + j]
            }
        };

        let mut output = vec![T::zero(); m * n];
        for i in 0..m {
            for j in 0..n {
                let mut sum = T::zero();
                for l in 0..k {
                    sum += a_at(i, l) * b_at(l, j);
                }
                output[i * n + j] = sum;
            }
        }
        Tensor::new(output, vec![m, n])
    }

    fn mul(&self, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, RagNetError> {
        if a.shape() == b.shape() {
            let data = a
                .data()
                .iter()
                .zip(b.data())
                .map(|(&x, &y)| x * y)
                .collect();
            return Tensor::new(data, a.shape().to_vec());
        }

        // Cas broadcast: a est [rows, cols], b est la colonne [rows, 1]
        let incompatible = || RagNetError::IncompatibleShapes {
            shape1: a.shape().to_vec(),
            shape2: b.shape().to_vec(),
            operation: "mul".to_string(),
        };
        let (rows, cols) = a.dims2().map_err(|_| incompatible())?;
        if b.shape() != [rows, 1] {
            return Err(incompatible());
        }
        let mut data = Vec::with_capacity(rows * cols);
        // chunks(0) panics; with cols == 0 the buffer is empty anyway
        for (row, &scale) in a.data().chunks(cols.max(1)).zip(b.data()) {
            data.extend(row.iter().map(|&x| x * scale));
        }
        Tensor::new(data, vec![rows, cols])
    }

    fn sum_rows(&self, x: &Tensor<T>) -> Result<Tensor<T>, RagNetError> {
        let (rows, cols) = x.dims2()?;
        let data = (0..rows)
            .map(|i| x.data()[i * cols..(i + 1) * cols].iter().copied().sum())
            .collect();
        Tensor::new(data, vec![rows, 1])
    }

    fn outer(&self, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, RagNetError> {
        let m = a.numel();
        let n = b.numel();
        let mut data = Vec::with_capacity(m * n);
        for &x in a.data() {
            data.extend(b.data().iter().map(|&y| x * y));
        }
        Tensor::new(data, vec![m, n])
    }

    fn add_assign(&self, a: &mut Tensor<T>, b: &Tensor<T>) -> Result<(), RagNetError> {
        if a.shape() != b.shape() {
            return Err(RagNetError::ShapeMismatch {
                expected: a.shape().to_vec(),
                actual: b.shape().to_vec(),
                operation: "add_assign".to_string(),
            });
        }
        for (x, &y) in a.data_mut().iter_mut().zip(b.data()) {
            *x += y;
        }
        Ok(())
    }

    fn softmax_sequences(
        &self,
        x: &Tensor<T>,
        lengths: &[usize],
    ) -> Result<Tensor<T>, RagNetError> {
        let cols = check_segmented(x, lengths, "softmax_sequences")?;
        let src = x.data();
        let mut out = vec![T::zero(); src.len()];

        let mut start = 0;
        for &len in lengths {
            let end = start + len;
            for c in 0..cols {
                let max = (start..end)
                    .map(|r| src[r * cols + c])
                    .fold(T::neg_infinity(), T::max);
                let mut total = T::zero();
                for r in start..end {
                    let e = (src[r * cols + c] - max).exp();
                    out[r * cols + c] = e;
                    total += e;
                }
                for r in start..end {
                    out[r * cols + c] /= total;
                }
            }
            start = end;
        }
        Tensor::new(out, x.shape().to_vec())
    }

    fn backprop_softmax_sequences(
        &self,
        d_y: &Tensor<T>,
        y: &Tensor<T>,
        lengths: &[usize],
    ) -> Result<Tensor<T>, RagNetError> {
        if d_y.shape() != y.shape() {
            return Err(RagNetError::ShapeMismatch {
                expected: y.shape().to_vec(),
                actual: d_y.shape().to_vec(),
                operation: "backprop_softmax_sequences".to_string(),
            });
        }
        let cols = check_segmented(y, lengths, "backprop_softmax_sequences")?;

        // d_x = y * d_y, puis on retire y * sum_segment(y * d_y)
        let mut d_x = self.mul(d_y, y)?;
        let y_data = y.data();
        let d_x_data = d_x.data_mut();

        let mut start = 0;
        for &len in lengths {
            let end = start + len;
            for c in 0..cols {
                let seg_sum: T = (start..end).map(|r| d_x_data[r * cols + c]).sum();
                for r in start..end {
                    d_x_data[r * cols + c] -= y_data[r * cols + c] * seg_sum;
                }
            }
            start = end;
        }
        Ok(d_x)
    }
}

#[cfg(test)]
#[path = "cpu_test.rs"]
mod tests;
