mod common;

use arrayx::nn::{cross_entropy_loss, relu, GradientDescent, Linear, Module};
use arrayx::{Array, BackendConfig, BackendScope, Dtype};
use common::{assert_close, f32_bytes, i32_bytes, to_f32_vec};

#[test]
fn linear_forward_matches_x_at_w_transpose_plus_b() {
    // §8 concrete scenario 5.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let layer = Linear::new(3, 4, true).unwrap();
    let x = Array::from_numpy(&f32_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), &[2, 3], Dtype::F32).unwrap();
    let out = layer.call(&x).unwrap();
    assert_eq!(out.shape(), vec![2, 4]);

    let w = to_f32_vec(&layer.weight.numpy().unwrap()); // (4,3) row-major
    let b = to_f32_vec(&layer.bias.as_ref().unwrap().numpy().unwrap());
    let xs = to_f32_vec(&x.numpy().unwrap());
    let mut expected = vec![0.0f32; 8];
    for row in 0..2 {
        for col in 0..4 {
            let mut acc = b[col];
            for k in 0..3 {
                acc += xs[row * 3 + k] * w[col * 3 + k];
            }
            expected[row * 4 + col] = acc;
        }
    }
    assert_close(&to_f32_vec(&out.numpy().unwrap()), &expected, 1e-4);

    let loss = out.sum(None).unwrap();
    loss.backward().unwrap();
    assert_eq!(layer.weight.grad().unwrap().shape(), layer.weight.shape());
    assert_eq!(layer.bias.as_ref().unwrap().grad().unwrap().shape(), layer.bias.as_ref().unwrap().shape());
}

#[test]
fn relu_zeroes_negative_entries() {
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let x = Array::from_numpy(&f32_bytes(&[-2.0, -0.5, 0.0, 1.5, 3.0]), &[5], Dtype::F32).unwrap();
    let y = relu(&x).unwrap();
    assert_close(&to_f32_vec(&y.numpy().unwrap()), &[0.0, 0.0, 0.0, 1.5, 3.0], 1e-6);
}

#[test]
fn cross_entropy_loss_is_never_negative() {
    // §8 invariant 7.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let logits = Array::from_numpy(&f32_bytes(&[2.0, 0.5, -1.0, 0.1, 0.2, 3.0]), &[2, 3], Dtype::F32).unwrap();
    let labels = Array::from_numpy(&i32_bytes(&[0, 2]), &[2], Dtype::I32).unwrap();
    let loss = cross_entropy_loss(&logits, &labels).unwrap();
    assert_eq!(loss.shape(), vec![1, 1]);
    let value = to_f32_vec(&loss.numpy().unwrap())[0];
    assert!(value >= 0.0, "loss {value} should be non-negative");
}

#[test]
fn cross_entropy_loss_matches_hand_computed_value_for_a_confident_correct_prediction() {
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    // A single example, heavily favoring class 0: softmax is close to
    // [1, 0, 0], so -log(softmax[0]) should be close to zero.
    let logits = Array::from_numpy(&f32_bytes(&[20.0, 0.0, 0.0]), &[1, 3], Dtype::F32).unwrap();
    let labels = Array::from_numpy(&i32_bytes(&[0]), &[1], Dtype::I32).unwrap();
    let loss = cross_entropy_loss(&logits, &labels).unwrap();
    let value = to_f32_vec(&loss.numpy().unwrap())[0];
    assert!(value < 1e-3, "loss {value} should be near zero for a confident correct prediction");
}

#[test]
fn gradient_descent_step_is_compiled_once() {
    // §10.5: the update graph is built on the first step() and reused;
    // a later step() without a fresh backward() does not move the param.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let p = Array::from_numpy(&f32_bytes(&[5.0]), &[1], Dtype::F32).unwrap();
    let loss = p.sq().unwrap().sum(None).unwrap();
    loss.backward().unwrap();

    let opt = GradientDescent::new(vec![p.clone()], 0.1);
    opt.step().unwrap();
    let after_first = to_f32_vec(&opt.updated_params().unwrap()[0].numpy().unwrap())[0];
    assert_close(&[after_first], &[4.0], 1e-5); // 5 - 0.1 * (2*5)

    opt.step().unwrap();
    let after_second = to_f32_vec(&opt.updated_params().unwrap()[0].numpy().unwrap())[0];
    assert_close(&[after_second], &[after_first], 1e-6);
}
