use crate::backend::{Backend, CompareOp, TensorValue};
use crate::errors::AxResult;
use crate::graph::ops::Op;

/// Comparisons never carry a gradient (§4.4: "not differentiable; raise if
/// asked"); `Op::vjp`'s default already does that, so no override here.
#[derive(Debug)]
pub struct Compare(pub CompareOp);

impl Op for Compare {
    fn name(&self) -> &'static str {
        match self.0 {
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
        }
    }

    fn forward(&self, parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        backend.compare(self.0, &parents[0], &parents[1])
    }
}
