//! Shared test helpers (§10.4). Not a test file itself — `cargo test` only
//! treats top-level `tests/*.rs` files as separate harnesses, so this
//! module is pulled in with `mod common;` from each of them.

use approx::abs_diff_eq;

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn i32_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn to_f32_vec(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes(c.try_into().unwrap())).collect()
}

pub fn to_i32_vec(bytes: &[u8]) -> Vec<i32> {
    bytes.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect()
}

/// `atol`-only float comparison (§10.4), the same shape as the teacher's
/// manual-epsilon checks, routed through `approx` for the gradient-check
/// tests rather than hand-rolled.
pub fn assert_close(actual: &[f32], expected: &[f32], atol: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch: {actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!(abs_diff_eq!(a, e, epsilon = atol), "{a} !~= {e} (atol={atol})");
    }
}
