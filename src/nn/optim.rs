//! `GradientDescent` (§4.8), grounded in `nn/optim/__init__.py`'s `VGD`
//! (§10.5 supplemented feature): the update expression `p ← p − lr·p.grad`
//! is built once, on the first `step()`, then every call (including the
//! first) just `eval`s the already-built nodes. Since `eval` is a no-op on
//! an already-realized node, repeated `step()` calls do not re-read a
//! freshly accumulated gradient — this mirrors the original's one-shot
//! compile rather than a conventional per-iteration optimizer loop.

use std::cell::RefCell;

use crate::array::Array;
use crate::errors::{AxError, AxResult};

pub struct GradientDescent {
    params: Vec<Array>,
    lr: f64,
    compiled: RefCell<Option<Vec<Array>>>,
}

impl GradientDescent {
    pub fn new(params: Vec<Array>, lr: f64) -> Self {
        Self { params, lr, compiled: RefCell::new(None) }
    }

    pub fn params(&self) -> &[Array] {
        &self.params
    }

    /// The one-shot-compiled `p − lr·p.grad` Arrays, once `step()` has run
    /// at least once (§10.5). `None` before the first `step()`.
    pub fn updated_params(&self) -> Option<Vec<Array>> {
        self.compiled.borrow().clone()
    }

    pub fn step(&self) -> AxResult<()> {
        {
            let mut compiled = self.compiled.borrow_mut();
            if compiled.is_none() {
                let mut built = Vec::with_capacity(self.params.len());
                for p in &self.params {
                    let grad = p
                        .grad()
                        .ok_or_else(|| AxError::NotRealized(format!("{}: call backward() before step()", p.node_id())))?;
                    let update = grad.scale(self.lr)?;
                    built.push(p.detach()?.sub(&update)?);
                }
                *compiled = Some(built);
            }
        }
        for param in self.compiled.borrow().as_ref().unwrap() {
            param.eval()?;
        }
        Ok(())
    }
}
