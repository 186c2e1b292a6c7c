mod common;

use arrayx::{Array, BackendConfig, BackendScope, Dtype};
use common::{assert_close, f32_bytes, to_f32_vec};

#[test]
fn gradient_chain_matches_hand_derivative() {
    // §8 concrete scenario 4: x=[[1,2],[3,4]]; y=x.exp()*x; z=y.log();
    // w=z/x; L=w.sum(); L.backward().
    //
    // y = x·eᵡ, z = log(y) = x + log(x), w = z/x = 1 + log(x)/x.
    // dw/dx = (1/x)/x − log(x)/x² = (1 − log(x))/x².
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let x = Array::from_numpy(&f32_bytes(&[1.0, 2.0, 3.0, 4.0]), &[2, 2], Dtype::F32).unwrap();
    let y = x.exp().unwrap().mul(&x).unwrap();
    let z = y.log().unwrap();
    let w = z.div(&x).unwrap();
    let loss = w.sum(None).unwrap();
    loss.backward().unwrap();

    let grad = to_f32_vec(&x.grad().unwrap().numpy().unwrap());
    let expected: Vec<f32> = [1.0f32, 2.0, 3.0, 4.0].iter().map(|&v| (1.0 - v.ln()) / (v * v)).collect();
    assert_close(&grad, &expected, 1e-3);
}

#[test]
fn backward_called_twice_accumulates_gradient() {
    // §9 open question (a): calling backward twice accumulates.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let x = Array::from_numpy(&f32_bytes(&[1.0, 2.0]), &[2], Dtype::F32).unwrap();
    let loss = x.sq().unwrap().sum(None).unwrap();

    loss.backward().unwrap();
    let first = to_f32_vec(&x.grad().unwrap().numpy().unwrap());
    assert_close(&first, &[2.0, 4.0], 1e-6);

    loss.backward().unwrap();
    let second = to_f32_vec(&x.grad().unwrap().numpy().unwrap());
    assert_close(&second, &[4.0, 8.0], 1e-6);
}

#[test]
fn matmul_backward_matches_transposed_products() {
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let a = Array::from_numpy(&f32_bytes(&[1.0, 2.0, 3.0, 4.0]), &[2, 2], Dtype::F32).unwrap();
    let b = Array::from_numpy(&f32_bytes(&[5.0, 6.0, 7.0, 8.0]), &[2, 2], Dtype::F32).unwrap();
    let out = a.matmul(&b).unwrap();
    let loss = out.sum(None).unwrap();
    loss.backward().unwrap();

    // dL/dA = ones(2,2) @ Bᵀ, dL/dB = Aᵀ @ ones(2,2).
    let grad_a = to_f32_vec(&a.grad().unwrap().numpy().unwrap());
    let grad_b = to_f32_vec(&b.grad().unwrap().numpy().unwrap());
    assert_close(&grad_a, &[11.0, 15.0, 11.0, 15.0], 1e-5);
    assert_close(&grad_b, &[4.0, 4.0, 6.0, 6.0], 1e-5);
}

#[test]
fn reshape_backward_restores_original_shape() {
    // §8 invariant 5: each differentiable leaf's grad.shape == leaf.shape.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let x = Array::arange(&[6], 0.0, 1.0, Dtype::F32).unwrap();
    let reshaped = x.reshape(&[2, 3]).unwrap();
    let loss = reshaped.sum(None).unwrap();
    loss.backward().unwrap();
    assert_eq!(x.grad().unwrap().shape(), x.shape());
}
