use crate::array::Array;
use crate::backend::{Backend, TensorValue};
use crate::errors::AxResult;
use crate::graph::ops::Op;

/// Batched matmul: last two dims are the matrix, leading dims broadcast
/// (§4.2, §4.4). Batch-unbroadcasting of the two gradient contributions is
/// handled centrally by `graph::autograd`, the same as for binary ops — the
/// raw contributions here may carry a wider batch shape than the original
/// parent and that's expected.
#[derive(Debug)]
pub struct MatMul;

impl Op for MatMul {
    fn name(&self) -> &'static str {
        "matmul"
    }

    fn forward(&self, parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        backend.matmul(&parents[0], &parents[1])
    }

    fn vjp(&self, parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        let (lhs, rhs) = (&parents[0], &parents[1]);
        let rhs_t = rhs.transpose(rhs.rank() - 2, rhs.rank() - 1)?;
        let lhs_t = lhs.transpose(lhs.rank() - 2, lhs.rank() - 1)?;
        let grad_lhs = grad_output.matmul(&rhs_t)?;
        let grad_rhs = lhs_t.matmul(grad_output)?;
        Ok(vec![Some(grad_lhs), Some(grad_rhs)])
    }
}
