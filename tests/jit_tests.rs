mod common;

use std::cell::Cell;

use arrayx::graph::jit::Jit;
use arrayx::{Array, BackendConfig, BackendScope, Dtype};
use common::{f32_bytes, to_f32_vec};

#[test]
fn cache_hit_returns_the_first_call_result_verbatim() {
    // §8 concrete scenario 6 / §9 "Canonical JIT key": three calls sharing a
    // (shape, dtype) signature invoke the builder exactly once; the cached
    // Array is the one from the first call, not a re-trace of later data.
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let calls = Cell::new(0usize);
    let jit = Jit::new("double", move |inputs: &[Array]| {
        calls.set(calls.get() + 1);
        inputs[0].scale(2.0)
    });

    let a = Array::from_numpy(&f32_bytes(&[1.0, 2.0]), &[2], Dtype::F32).unwrap();
    let b = Array::from_numpy(&f32_bytes(&[10.0, 20.0]), &[2], Dtype::F32).unwrap();
    let c = Array::from_numpy(&f32_bytes(&[100.0, 200.0]), &[2], Dtype::F32).unwrap();

    let r1 = jit.call(&[a]).unwrap();
    let r2 = jit.call(&[b]).unwrap();
    let r3 = jit.call(&[c]).unwrap();

    assert_eq!(jit.misses(), 1);
    assert_eq!(jit.hits(), 2);
    let expected = to_f32_vec(&r1.numpy().unwrap());
    assert_eq!(to_f32_vec(&r2.numpy().unwrap()), expected);
    assert_eq!(to_f32_vec(&r3.numpy().unwrap()), expected);
}

#[test]
fn differing_shapes_each_miss_the_cache() {
    let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
    let jit = Jit::new("identity", |inputs: &[Array]| Ok(inputs[0].clone()));
    let a = Array::zeros(&[2], Dtype::F32).unwrap();
    let b = Array::zeros(&[3], Dtype::F32).unwrap();
    jit.call(&[a]).unwrap();
    jit.call(&[b]).unwrap();
    assert_eq!(jit.misses(), 2);
    assert_eq!(jit.hits(), 0);
}
