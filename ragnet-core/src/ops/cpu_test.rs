use super::CpuOps;
use crate::error::RagNetError;
use crate::ops::{get_ops, Ops};
use crate::tensor::Tensor;
use crate::utils::testing::check_tensor_near;
use approx::assert_relative_eq;

fn t(data: Vec<f64>, shape: Vec<usize>) -> Tensor<f64> {
    Tensor::new(data, shape).expect("Failed to create test tensor")
}

#[test]
fn test_allocate_is_zeroed() {
    let q: Tensor<f32> = CpuOps.allocate(&[4]).unwrap();
    assert_eq!(q.shape(), &[4]);
    assert!(q.data().iter().all(|&v| v == 0.0));
}

#[test]
fn test_gemm_plain() -> Result<(), RagNetError> {
    let a = t(vec![1., 2., 3., 4., 5., 6.], vec![2, 3]);
    let b = t(vec![1., 0., 0., 1., 1., 1.], vec![3, 2]);
    let c = CpuOps.gemm(&a, &b, false, false)?;
    check_tensor_near(&c, &[2, 2], &[4., 5., 10., 11.], 1e-12);
    Ok(())
}

#[test]
fn test_gemm_transposed() -> Result<(), RagNetError> {
    // a^T @ b with a: [3, 2], b: [3, 1]
    let a = t(vec![1., 2., 3., 4., 5., 6.], vec![3, 2]);
    let b = t(vec![1., 1., 2.], vec![3, 1]);
    let c = CpuOps.gemm(&a, &b, true, false)?;
    check_tensor_near(&c, &[2, 1], &[14., 18.], 1e-12);

    // a @ b^T with a: [1, 3], b: [2, 3]
    let a = t(vec![1., 2., 3.], vec![1, 3]);
    let b = t(vec![1., 0., 0., 0., 1., 1.], vec![2, 3]);
    let c = CpuOps.gemm(&a, &b, false, true)?;
    check_tensor_near(&c, &[1, 2], &[1., 5.], 1e-12);
    Ok(())
}

#[test]
fn test_gemm_dimension_mismatch() {
    let a = t(vec![0.; 6], vec![2, 3]);
    let b = t(vec![0.; 4], vec![2, 2]);
    assert!(matches!(
        CpuOps.gemm(&a, &b, false, false),
        Err(RagNetError::IncompatibleShapes { .. })
    ));
    let v = t(vec![0.; 3], vec![3]);
    assert!(matches!(
        CpuOps.gemm(&a, &v, false, false),
        Err(RagNetError::RankMismatch { .. })
    ));
}

#[test]
fn test_mul_same_shape_and_column_broadcast() -> Result<(), RagNetError> {
    let a = t(vec![1., 2., 3., 4.], vec![2, 2]);
    let same = CpuOps.mul(&a, &a)?;
    check_tensor_near(&same, &[2, 2], &[1., 4., 9., 16.], 1e-12);

    let col = t(vec![10., -1.], vec![2, 1]);
    let scaled = CpuOps.mul(&a, &col)?;
    check_tensor_near(&scaled, &[2, 2], &[10., 20., -3., -4.], 1e-12);

    let bad = t(vec![1., 2.], vec![1, 2]);
    assert!(matches!(
        CpuOps.mul(&a, &bad),
        Err(RagNetError::IncompatibleShapes { .. })
    ));
    Ok(())
}

#[test]
fn test_sum_rows_and_outer() -> Result<(), RagNetError> {
    let a = t(vec![1., 2., 3., 4., 5., 6.], vec![3, 2]);
    let s = CpuOps.sum_rows(&a)?;
    check_tensor_near(&s, &[3, 1], &[3., 7., 11.], 1e-12);

    let col = t(vec![1., 2.], vec![2, 1]);
    let q = t(vec![3., 4., 5.], vec![3]);
    let o = CpuOps.outer(&col, &q)?;
    check_tensor_near(&o, &[2, 3], &[3., 4., 5., 6., 8., 10.], 1e-12);
    Ok(())
}

#[test]
fn test_add_assign() -> Result<(), RagNetError> {
    let mut a = t(vec![1., 2.], vec![2]);
    CpuOps.add_assign(&mut a, &t(vec![0.5, -2.], vec![2]))?;
    assert_eq!(a.data(), &[1.5, 0.]);
    assert!(matches!(
        CpuOps.add_assign(&mut a, &t(vec![1.], vec![1])),
        Err(RagNetError::ShapeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_softmax_sequences_is_segmented() -> Result<(), RagNetError> {
    let x = t(vec![0., 0., 1., 2., 3.], vec![5, 1]);
    let y = CpuOps.softmax_sequences(&x, &[2, 3])?;
    let d = y.data();
    assert_relative_eq!(d[0], 0.5, epsilon = 1e-12);
    assert_relative_eq!(d[1], 0.5, epsilon = 1e-12);
    let z = 1f64.exp() + 2f64.exp() + 3f64.exp();
    assert_relative_eq!(d[2], 1f64.exp() / z, epsilon = 1e-12);
    assert_relative_eq!(d[3], 2f64.exp() / z, epsilon = 1e-12);
    assert_relative_eq!(d[4], 3f64.exp() / z, epsilon = 1e-12);
    Ok(())
}

#[test]
fn test_softmax_sequences_stable_for_large_scores() -> Result<(), RagNetError> {
    let x = Tensor::new(vec![1000.0f32, 1000.0], vec![2, 1])?;
    let y = CpuOps.softmax_sequences(&x, &[2])?;
    check_tensor_near(&y, &[2, 1], &[0.5, 0.5], 1e-6);
    Ok(())
}

#[test]
fn test_softmax_sequences_length_mismatch() {
    let x = t(vec![0.; 3], vec![3, 1]);
    assert!(matches!(
        CpuOps.softmax_sequences(&x, &[1, 1]),
        Err(RagNetError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_softmax_sequences_overflowing_lengths() {
    // Wrapping addition would make these lengths sum to 1
    let x = t(vec![0.5], vec![1, 1]);
    let lengths = [usize::MAX, 2];
    assert_eq!(
        CpuOps.softmax_sequences(&x, &lengths),
        Err(RagNetError::RaggedLengthMismatch {
            total_rows: 1,
            lengths_sum: usize::MAX
        })
    );
    assert!(matches!(
        CpuOps.backprop_softmax_sequences(&x, &x, &lengths),
        Err(RagNetError::RaggedLengthMismatch { .. })
    ));
}

#[test]
fn test_backprop_softmax_sequences_matches_formula() -> Result<(), RagNetError> {
    let lengths = [2, 1];
    let x = t(vec![0.3, -0.7, 1.2], vec![3, 1]);
    let y = CpuOps.softmax_sequences(&x, &lengths)?;
    let d_y = t(vec![1.0, -2.0, 0.5], vec![3, 1]);
    let d_x = CpuOps.backprop_softmax_sequences(&d_y, &y, &lengths)?;

    let a = y.data();
    let g = d_y.data();
    let dot = a[0] * g[0] + a[1] * g[1];
    let expected = [a[0] * (g[0] - dot), a[1] * (g[1] - dot), 0.0];
    check_tensor_near(&d_x, &[3, 1], &expected, 1e-12);
    Ok(())
}

#[test]
fn test_get_ops() {
    assert_eq!(get_ops::<f32>("cpu").unwrap().name(), "cpu");
    assert_eq!(get_ops::<f64>("numpy").unwrap().name(), "cpu");
    assert_eq!(
        get_ops::<f32>("cupy").unwrap_err(),
        RagNetError::UnknownBackend("cupy".to_string())
    );
}
