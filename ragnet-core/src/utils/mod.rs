pub mod testing;

use crate::error::RagNetError;
use crate::tensor::Tensor;
use crate::types::Numeric;

/// Returns the feature width (last dimension) of a batch of rows.
///
/// # Errors
/// `RankMismatch` for tensors of rank 0 or 1, which carry no row structure.
pub fn get_width<T: Numeric>(x: &Tensor<T>) -> Result<usize, RagNetError> {
    match x.shape() {
        [_, .., last] => Ok(*last),
        _ => Err(RagNetError::RankMismatch {
            expected: 2,
            actual: x.rank(),
            operation: "get_width".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_width() {
        assert_eq!(get_width(&Tensor::<f32>::zeros(&[4, 3]).unwrap()), Ok(3));
        assert_eq!(get_width(&Tensor::<f32>::zeros(&[2, 5, 7]).unwrap()), Ok(7));
        assert!(matches!(
            get_width(&Tensor::<f32>::zeros(&[4]).unwrap()),
            Err(RagNetError::RankMismatch { actual: 1, .. })
        ));
    }
}
