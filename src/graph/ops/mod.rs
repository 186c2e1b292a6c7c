//! The op catalogue (§4.4): one `Op` impl per primitive, each owning its
//! forward evaluator and (where differentiable) its VJP rule. Shape/dtype
//! inference happens once, at construction time, in `array.rs` — by the time
//! an `Op` is boxed into a `Node` its output `View`/`Dtype` are already
//! decided, so this trait only needs to carry forward/backward behavior.

pub mod cast;
pub mod compare;
pub mod construct;
pub mod elementwise;
pub mod matmul;
pub mod movement;
pub mod reduce;

use crate::array::Array;
use crate::backend::{Backend, TensorValue};
use crate::errors::{AxError, AxResult};

pub trait Op: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Forward evaluator: realized parent values in, a fresh `Storage`
    /// (wrapped in a `TensorValue`) out.
    fn forward(&self, parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue>;

    /// Gradient contribution to each parent, given the gradient w.r.t. this
    /// op's output. One entry per parent; `None` means "no contribution"
    /// (e.g. a non-differentiable side input). Unbroadcasting is handled by
    /// the caller (`graph::autograd`), not here.
    fn vjp(&self, parents: &[Array], output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        let _ = (parents, output, grad_output);
        Err(AxError::NonDifferentiable(self.name().to_string()))
    }
}
