use crate::array::Array;
use crate::backend::{Backend, ReduceOp, TensorValue};
use crate::errors::AxResult;
use crate::graph::ops::Op;

/// Reduction over `axes`, output keeping reduced axes as size 1 (§4.2
/// keepdim semantics). `input_shape` is cached for the VJP rules that
/// broadcast the output gradient back out.
#[derive(Debug)]
pub struct Reduce {
    pub op: ReduceOp,
    pub axes: Vec<usize>,
    pub input_shape: Vec<usize>,
}

impl Op for Reduce {
    fn name(&self) -> &'static str {
        match self.op {
            ReduceOp::Sum => "sum",
            ReduceOp::Mean => "mean",
            ReduceOp::Max => "max",
            ReduceOp::Min => "min",
            ReduceOp::ArgMax => "argmax",
            ReduceOp::ArgMin => "argmin",
        }
    }

    fn forward(&self, parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        backend.reduce(self.op, &parents[0], &self.axes)
    }

    fn vjp(&self, parents: &[Array], output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        let x = &parents[0];
        let contrib = match self.op {
            ReduceOp::Sum => grad_output.broadcast_to(&self.input_shape)?,
            ReduceOp::Mean => {
                let n: usize = self.axes.iter().map(|&a| self.input_shape[a]).product::<usize>().max(1);
                grad_output.broadcast_to(&self.input_shape)?.scale(1.0 / n as f64)?
            }
            ReduceOp::Max | ReduceOp::Min => {
                let out_b = output.broadcast_to(&self.input_shape)?;
                let mask = x.eq(&out_b)?.cast(x.dtype())?;
                grad_output.broadcast_to(&self.input_shape)?.mul(&mask)?
            }
            ReduceOp::ArgMax | ReduceOp::ArgMin => {
                return Err(crate::errors::AxError::NonDifferentiable(self.name().to_string()));
            }
        };
        Ok(vec![Some(contrib)])
    }
}
