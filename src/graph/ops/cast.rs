use crate::array::Array;
use crate::backend::{Backend, TensorValue};
use crate::dtype::Dtype;
use crate::errors::AxResult;
use crate::graph::ops::Op;

#[derive(Debug)]
pub struct Cast {
    pub target: Dtype,
    pub source: Dtype,
}

impl Op for Cast {
    fn name(&self) -> &'static str {
        "cast"
    }

    fn forward(&self, parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        backend.cast(&parents[0], self.target)
    }

    fn vjp(&self, _parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        // A cast *to* bool breaks the chain at construction time (the
        // resulting node is built with `requires_grad = false`, so this is
        // never reached); any other cast passes the gradient back through
        // a reverse cast (§4.4: "cast: cast g back").
        Ok(vec![Some(grad_output.cast(self.source)?)])
    }
}
