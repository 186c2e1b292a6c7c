pub mod autograd;
pub mod eval;
pub mod jit;
pub mod node;
pub mod ops;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use node::Node;

use crate::backend::Backend;
use crate::dtype::Dtype;
use crate::errors::{AxError, AxResult};
use crate::shape::View;
use crate::types::NodeId;

/// Append-only arena of `Node`s plus the active `Backend` (§3, §9 "Global
/// state"). One `Graph` is alive for the lifetime of a `BackendScope`;
/// `Array`s hold a reference-counted pointer to it (`crate::scope`). Each
/// `Node` is itself behind an `Rc` so callers can clone one out, drop the
/// arena borrow, and then recurse into ops that push further nodes (a `vjp`
/// call routinely does) without re-entering the same `RefCell`.
pub struct Graph {
    nodes: RefCell<Vec<Rc<Node>>>,
    backend: Box<dyn Backend>,
    active: Cell<bool>,
}

impl Graph {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            nodes: RefCell::new(Vec::new()),
            backend,
            active: Cell::new(true),
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn check_active(&self) -> AxResult<()> {
        if self.active.get() {
            Ok(())
        } else {
            Err(AxError::BackendUninitialized)
        }
    }

    /// Releases the arena (§3 "Lifecycles": "All Nodes, Storages, and caches
    /// are released at cleanup"). Called once by `BackendScope::drop`.
    pub fn deactivate(&self) {
        self.active.set(false);
        self.nodes.borrow_mut().clear();
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &self,
        op: Box<dyn ops::Op>,
        parents: Vec<NodeId>,
        view: View,
        dtype: Dtype,
        requires_grad: bool,
    ) -> AxResult<NodeId> {
        self.check_active()?;
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(Rc::new(Node::new(id, op, parents, view, dtype, requires_grad)));
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Rc<Node> {
        self.nodes.borrow()[id.0].clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }
}
