mod common;

use arrayx::{Array, BackendConfig, BackendScope, Dtype};
use common::{f32_bytes, to_f32_vec};

#[test]
fn from_numpy_round_trips_shape_and_dtype() {
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let a = Array::from_numpy(&f32_bytes(&[1.0, 2.0, 3.0, 4.0]), &[2, 2], Dtype::F32).unwrap();
    assert_eq!(a.shape(), vec![2, 2]);
    assert_eq!(a.dtype(), Dtype::F32);
    let bytes = a.numpy().unwrap();
    assert_eq!(to_f32_vec(&bytes), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn sum_of_2x2_matrix_is_ten_keepdim() {
    // §8 concrete scenario 1.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let a = Array::from_numpy(&f32_bytes(&[1.0, 2.0, 3.0, 4.0]), &[2, 2], Dtype::F32).unwrap();
    let total = a.sum(None).unwrap();
    assert_eq!(total.shape(), vec![1, 1]);
    assert_eq!(to_f32_vec(&total.numpy().unwrap()), vec![10.0]);
}

#[test]
fn arange_reshape_matches_row_major_layout() {
    // §8 concrete scenario 2.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let a = Array::arange(&[6], 0.0, 1.0, Dtype::F32).unwrap().reshape(&[2, 3]).unwrap();
    assert_eq!(a.shape(), vec![2, 3]);
    assert_eq!(to_f32_vec(&a.numpy().unwrap()), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn binary_op_broadcasts_shapes() {
    // §8 invariant 2.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let a = Array::zeros(&[3, 1], Dtype::F32).unwrap();
    let b = Array::zeros(&[1, 4], Dtype::F32).unwrap();
    let c = a.add(&b).unwrap();
    assert_eq!(c.shape(), vec![3, 4]);
}

#[test]
fn reduction_keeps_reduced_axes_as_size_one() {
    // §8 invariant 3.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let a = Array::zeros(&[2, 3, 4], Dtype::F32).unwrap();
    let summed = a.sum(Some(&[1])).unwrap();
    assert_eq!(summed.shape(), vec![2, 1, 4]);
}

#[test]
fn permute_round_trips_with_its_inverse() {
    // §8 invariant 4.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let a = Array::arange(&[24], 0.0, 1.0, Dtype::F32).unwrap().reshape(&[2, 3, 4]).unwrap();
    let permuted = a.permute(&[2, 0, 1]).unwrap();
    let back = permuted.permute(&[1, 2, 0]).unwrap();
    assert_eq!(to_f32_vec(&back.numpy().unwrap()), to_f32_vec(&a.numpy().unwrap()));
}

#[test]
fn transpose_is_its_own_inverse() {
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let a = Array::arange(&[6], 0.0, 1.0, Dtype::F32).unwrap().reshape(&[2, 3]).unwrap();
    let back = a.transpose(0, 1).unwrap().transpose(0, 1).unwrap();
    assert_eq!(to_f32_vec(&back.numpy().unwrap()), to_f32_vec(&a.numpy().unwrap()));
}

#[test]
fn unsqueeze_then_squeeze_is_identity() {
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let a = Array::arange(&[6], 0.0, 1.0, Dtype::F32).unwrap().reshape(&[2, 3]).unwrap();
    let back = a.unsqueeze(&[1]).unwrap().squeeze(Some(&[1])).unwrap();
    assert_eq!(back.shape(), a.shape());
    assert_eq!(to_f32_vec(&back.numpy().unwrap()), to_f32_vec(&a.numpy().unwrap()));
}

#[test]
fn slice_backward_scatters_gradient_into_a_zero_tensor() {
    // §8 concrete scenario 3 (`zeros([2,5,3])[:,1:4] += ones([2,3,3])`),
    // expressed as the underlying graph mechanism: slicing `x` then summing
    // the slice scatters the upstream gradient back into a zero tensor
    // shaped like `x`, nonzero only inside the sliced window.
    use arrayx::shape::SliceSpec;

    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let x = Array::zeros(&[2, 5, 3], Dtype::F32).unwrap();
    let specs = [SliceSpec::full(2), SliceSpec { start: 1, stop: 4, step: 1 }, SliceSpec::full(3)];
    let window = x.slice(&specs).unwrap();
    let loss = window.sum(None).unwrap();
    loss.backward().unwrap();

    let grad = to_f32_vec(&x.grad().unwrap().numpy().unwrap());
    // row-major [2,5,3]: axis 1 in [1,4) is inside the window.
    for b in 0..2 {
        for r in 0..5 {
            for c in 0..3 {
                let idx = b * 15 + r * 3 + c;
                let expected = if (1..4).contains(&r) { 1.0 } else { 0.0 };
                assert_eq!(grad[idx], expected, "b={b} r={r} c={c}");
            }
        }
    }
}

#[test]
fn onehot_matches_expected_matrix() {
    // §8 concrete scenario 7.
    use arrayx::nn::onehot;
    use common::{i32_bytes, to_i32_vec};

    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let labels = Array::from_numpy(&i32_bytes(&[0, 2, 1]), &[3], Dtype::I32).unwrap();
    let encoded = onehot(&labels, 3).unwrap();
    assert_eq!(encoded.shape(), vec![3, 3]);
    assert_eq!(to_i32_vec(&encoded.numpy().unwrap()), vec![1, 0, 0, 0, 0, 1, 0, 1, 0]);
}
