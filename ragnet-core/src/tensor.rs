use crate::error::RagNetError;
use crate::types::Numeric;

/// A contiguous, row-major, CPU-resident n-dimensional array.
///
/// `Tensor` is a plain value: cloning copies the buffer, and there is no
/// gradient tracking attached to it. Gradients are computed by the layers'
/// hand-written backward closures and accumulated in the owning
/// [`Model`](crate::model::Model).
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    data: Vec<T>,
    shape: Vec<usize>,
}

/// Number of elements of `shape`, or `None` if the product overflows `usize`.
pub(crate) fn checked_numel(shape: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl<T: Numeric> Tensor<T> {
    /// Creates a tensor from a flat buffer and a shape.
    ///
    /// # Errors
    /// `TensorCreationError` if `data.len()` is not the product of `shape`, or if
    /// that product does not fit in `usize`.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> Result<Self, RagNetError> {
        if checked_numel(&shape) != Some(data.len()) {
            return Err(RagNetError::TensorCreationError {
                data_len: data.len(),
                shape,
            });
        }
        Ok(Tensor { data, shape })
    }

    /// Creates a zero-filled tensor of the given shape.
    pub fn zeros(shape: &[usize]) -> Result<Self, RagNetError> {
        let numel = checked_numel(shape).ok_or_else(|| RagNetError::TensorCreationError {
            data_len: 0,
            shape: shape.to_vec(),
        })?;
        Ok(Tensor {
            data: vec![T::zero(); numel],
            shape: shape.to_vec(),
        })
    }

    /// Creates a rank-1 tensor holding `data`.
    pub fn from_vec1(data: Vec<T>) -> Self {
        let len = data.len();
        Tensor {
            data,
            shape: vec![len],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Returns a copy of this tensor viewed with a new shape.
    ///
    /// # Errors
    /// `ShapeMismatch` if the element counts differ.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self, RagNetError> {
        if checked_numel(shape) != Some(self.numel()) {
            return Err(RagNetError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: shape.to_vec(),
                operation: "reshape".to_string(),
            });
        }
        Ok(Tensor {
            data: self.data.clone(),
            shape: shape.to_vec(),
        })
    }

    /// Returns `(rows, cols)` of a rank-2 tensor.
    pub fn dims2(&self) -> Result<(usize, usize), RagNetError> {
        match self.shape.as_slice() {
            [rows, cols] => Ok((*rows, *cols)),
            _ => Err(RagNetError::RankMismatch {
                expected: 2,
                actual: self.rank(),
                operation: "dims2".to_string(),
            }),
        }
    }

    /// Borrows row `i` of a rank-2 tensor.
    pub fn row(&self, i: usize) -> Result<&[T], RagNetError> {
        let (rows, cols) = self.dims2()?;
        if i >= rows {
            return Err(RagNetError::IndexOutOfBounds { index: i, len: rows });
        }
        Ok(&self.data[i * cols..(i + 1) * cols])
    }
}

#[cfg(test)]
#[path = "tensor_test.rs"]
mod tests;
