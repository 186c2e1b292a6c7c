use crate::backend::{Backend, Scalar, TensorValue};
use crate::dtype::Dtype;
use crate::errors::AxResult;
use crate::graph::ops::Op;

/// Leaf op: `zeros`/`ones`/`full`/`*_like` (§6) all reduce to this with a
/// different `value`. Has no parents — `eval` realizes it by calling
/// straight into the backend, `backward` never calls its `vjp`.
#[derive(Debug)]
pub struct Fill {
    pub shape: Vec<usize>,
    pub dtype: Dtype,
    pub value: Scalar,
}

impl Op for Fill {
    fn name(&self) -> &'static str {
        "fill"
    }

    fn forward(&self, _parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        backend.fill(self.dtype, &self.shape, self.value)
    }
}

/// Leaf op backing `arange` (§6).
#[derive(Debug)]
pub struct Iota {
    pub shape: Vec<usize>,
    pub start: f64,
    pub step: f64,
    pub dtype: Dtype,
}

impl Op for Iota {
    fn name(&self) -> &'static str {
        "iota"
    }

    fn forward(&self, _parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        backend.iota(&self.shape, self.start, self.step, self.dtype)
    }
}

/// Leaf op backing `from_numpy` (§6): an already-encoded host buffer,
/// uploaded to the backend on first `eval`.
#[derive(Debug)]
pub struct FromHost {
    pub bytes: Vec<u8>,
    pub shape: Vec<usize>,
    pub dtype: Dtype,
}

impl Op for FromHost {
    fn name(&self) -> &'static str {
        "from_numpy"
    }

    fn forward(&self, _parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        backend.upload(&self.bytes, self.dtype, &self.shape)
    }
}

/// Backs `detach()` (§4.6): a transparent passthrough over the parent's
/// value. The severed gradient edge isn't expressed here — it comes from
/// the detached node being constructed with `requires_grad = false`, which
/// makes `backward` skip it regardless of `vjp`.
#[derive(Debug)]
pub struct Identity;

impl Op for Identity {
    fn name(&self) -> &'static str {
        "detach"
    }

    fn forward(&self, parents: &[TensorValue], _backend: &dyn Backend) -> AxResult<TensorValue> {
        Ok(parents[0].clone())
    }
}
