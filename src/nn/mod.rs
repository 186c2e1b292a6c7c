//! NN/Optim helpers (§4.8) — thin, autograd-backed building blocks on top
//! of `Array`, not a layer zoo. `Module` mirrors `__call__`-forwards-to-
//! `forward`/recursive `parameters()` from the original's layer base class,
//! minus the hand-rolled `backward`/`update` methods the teacher's own
//! `Layer` trait carried — those are now `Array::backward` plus
//! [`optim::GradientDescent`].

pub mod linear;
pub mod loss;
pub mod optim;

pub use linear::Linear;
pub use loss::{cross_entropy_loss, onehot, relu};
pub use optim::GradientDescent;

use crate::array::Array;
use crate::errors::AxResult;

/// A differentiable building block with parameter Arrays (§4.8: "A Module
/// exposes parameters() recursively").
pub trait Module {
    fn forward(&self, input: &Array) -> AxResult<Array>;

    fn parameters(&self) -> Vec<Array>;

    fn call(&self, input: &Array) -> AxResult<Array> {
        self.forward(input)
    }
}
