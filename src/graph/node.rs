use std::cell::{Cell, RefCell};

use crate::backend::Storage;
use crate::dtype::Dtype;
use crate::graph::ops::Op;
use crate::shape::View;
use crate::types::NodeId;

/// A vertex in the expression DAG (§3). Immutable once constructed except
/// for `storage` (set once on first realization) and `grad` (set during
/// backward) — both behind interior mutability since a `Node` is reached
/// through a shared arena, never `&mut`.
pub struct Node {
    pub id: NodeId,
    pub op: Box<dyn Op>,
    pub parents: Vec<NodeId>,
    pub view: View,
    pub dtype: Dtype,
    pub requires_grad: bool,
    realized: Cell<bool>,
    storage: RefCell<Option<Storage>>,
    grad: Cell<Option<NodeId>>,
}

impl Node {
    pub fn new(
        id: NodeId,
        op: Box<dyn Op>,
        parents: Vec<NodeId>,
        view: View,
        dtype: Dtype,
        requires_grad: bool,
    ) -> Self {
        Self {
            id,
            op,
            parents,
            view,
            dtype,
            requires_grad,
            realized: Cell::new(false),
            storage: RefCell::new(None),
            grad: Cell::new(None),
        }
    }

    pub fn is_realized(&self) -> bool {
        self.realized.get()
    }

    pub fn storage(&self) -> Option<Storage> {
        self.storage.borrow().clone()
    }

    /// Set once, by the evaluator (§4.5). Idempotent in practice since
    /// `eval` never revisits a realized node.
    pub fn set_storage(&self, storage: Storage) {
        *self.storage.borrow_mut() = Some(storage);
        self.realized.set(true);
    }

    pub fn grad(&self) -> Option<NodeId> {
        self.grad.get()
    }

    pub fn set_grad(&self, grad: NodeId) {
        self.grad.set(Some(grad));
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("op", &self.op.name())
            .field("parents", &self.parents)
            .field("shape", &self.view.shape())
            .field("dtype", &self.dtype)
            .field("requires_grad", &self.requires_grad)
            .field("realized", &self.realized.get())
            .finish()
    }
}
