//! Activation and loss helpers (§4.8).

use crate::array::Array;
use crate::dtype::Dtype;
use crate::errors::{AxError, AxResult};

/// `(x ≥ 0) ⊙ x`, with the bool mask cast back to `x`'s own dtype (§4.8).
pub fn relu(x: &Array) -> AxResult<Array> {
    let zero = x.zeros_like()?;
    let mask = x.ge(&zero)?.cast(x.dtype())?;
    x.mul(&mask)
}

/// `(x.unsqueeze(-1) == arange(C)).cast(int)` (§4.8). Fails with
/// `DtypeMismatch` on a non-integer `x` (§7: "onehot on a non-int").
pub fn onehot(x: &Array, num_classes: usize) -> AxResult<Array> {
    if !x.dtype().is_int() {
        return Err(AxError::DtypeMismatch { expected: "I32".into(), found: x.dtype().name().into() });
    }
    let axis = x.rank();
    let expanded = x.unsqueeze(&[axis])?;
    let classes = Array::arange(&[num_classes], 0.0, 1.0, x.dtype())?;
    let mask = expanded.eq(&classes)?;
    mask.cast(Dtype::I32)
}

/// Logsumexp-stabilized mean negative log-likelihood (§4.8, §8 property 7:
/// `loss == −mean(log softmax(logits)[labels])`).
pub fn cross_entropy_loss(logits: &Array, labels: &Array) -> AxResult<Array> {
    let num_classes = *logits.shape().last().expect("logits must be at least 1-D");
    let onehot_labels = onehot(labels, num_classes)?.cast(logits.dtype())?;

    let max_logits = logits.max(Some(&[-1]))?;
    let shifted = logits.sub(&max_logits)?;
    let sum_exp = shifted.exp()?.sum(Some(&[-1]))?;
    let log_softmax = shifted.sub(&sum_exp.log()?)?;

    let picked = log_softmax.mul(&onehot_labels)?.sum(Some(&[-1]))?;
    picked.neg()?.mean(None)
}
