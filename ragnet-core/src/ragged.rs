use crate::error::RagNetError;
use crate::tensor::Tensor;
use crate::types::Numeric;

/// Sum of `lengths`, or `None` if it overflows `usize`.
pub(crate) fn checked_total(lengths: &[usize]) -> Option<usize> {
    lengths.iter().try_fold(0usize, |acc, &l| acc.checked_add(l))
}

/// A batch of variable-length sequences stored as one contiguous buffer.
///
/// `data` holds the rows of every sequence back to back (first axis = rows),
/// and `lengths` gives the number of rows of each sequence, in insertion order.
/// The lengths always sum to the number of rows of `data`.
///
/// For lengths `[3, 1, 2]` the segments span rows `0..3`, `3..4` and `4..6`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ragged<T> {
    data: Tensor<T>,
    lengths: Vec<usize>,
}

impl<T: Numeric> Ragged<T> {
    /// Creates a ragged batch.
    ///
    /// # Errors
    /// `RaggedLengthMismatch` if `data` has rank 0 or if `lengths` does not sum
    /// to `data.shape()[0]` (an overflowing sum is reported as `usize::MAX`).
    /// Zero-length segments are accepted.
    pub fn new(data: Tensor<T>, lengths: Vec<usize>) -> Result<Self, RagNetError> {
        let total = checked_total(&lengths);
        let lengths_sum = total.unwrap_or(usize::MAX);
        let total_rows = data.shape().first().copied().unwrap_or(0);
        if data.rank() == 0 || total != Some(total_rows) {
            return Err(RagNetError::RaggedLengthMismatch {
                total_rows,
                lengths_sum,
            });
        }
        Ok(Ragged { data, lengths })
    }

    /// Concatenates rank-2 sequences of equal width into one batch.
    pub fn from_sequences(sequences: &[Tensor<T>]) -> Result<Self, RagNetError> {
        let first = sequences.first().ok_or(RagNetError::EmptyTensorList)?;
        let (_, width) = first.dims2()?;

        let mut lengths = Vec::with_capacity(sequences.len());
        let mut flat = Vec::new();
        for seq in sequences {
            let (rows, cols) = seq.dims2()?;
            if cols != width {
                return Err(RagNetError::IncompatibleShapes {
                    shape1: first.shape().to_vec(),
                    shape2: seq.shape().to_vec(),
                    operation: "Ragged::from_sequences".to_string(),
                });
            }
            lengths.push(rows);
            flat.extend_from_slice(seq.data());
        }
        let total_rows = checked_total(&lengths).ok_or(RagNetError::RaggedLengthMismatch {
            total_rows: flat.len(),
            lengths_sum: usize::MAX,
        })?;
        let data = Tensor::new(flat, vec![total_rows, width])?;
        Ragged::new(data, lengths)
    }

    pub fn data(&self) -> &Tensor<T> {
        &self.data
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn num_sequences(&self) -> usize {
        self.lengths.len()
    }

    pub fn total_rows(&self) -> usize {
        self.data.shape()[0]
    }

    /// Number of elements per row (product of the trailing dimensions).
    pub fn width(&self) -> usize {
        self.data.shape()[1..].iter().product()
    }

    /// Half-open row spans `(start, end)` of every segment, in order.
    pub fn starts_ends(&self) -> Vec<(usize, usize)> {
        let mut start = 0;
        self.lengths
            .iter()
            .map(|&len| {
                let span = (start, start + len);
                start += len;
                span
            })
            .collect()
    }

    /// Copies the rows of sequence `i` into a new tensor.
    pub fn sequence(&self, i: usize) -> Result<Tensor<T>, RagNetError> {
        let spans = self.starts_ends();
        let (start, end) = *spans.get(i).ok_or(RagNetError::IndexOutOfBounds {
            index: i,
            len: spans.len(),
        })?;
        let width = self.width();
        let mut shape = self.data.shape().to_vec();
        shape[0] = end - start;
        Tensor::new(self.data.data()[start * width..end * width].to_vec(), shape)
    }

    pub fn into_parts(self) -> (Tensor<T>, Vec<usize>) {
        (self.data, self.lengths)
    }
}

#[cfg(test)]
#[path = "ragged_test.rs"]
mod tests;
