//! Scoped Backend acquisition (§4.2 "process-wide resource", §9 "Global
//! state"). Grounded in `python/ax.py`'s `context()` contextmanager:
//!
//! ```python
//! @contextmanager
//! def context():
//!     try:
//!         Backend.init()
//!         yield
//!     finally:
//!         Backend.cleanup()
//! ```
//!
//! `BackendScope::new` is the `init()` half; `Drop` is the `finally:
//! cleanup()` half, so `?`-early-return and panics both release the Backend
//! the same way Python's `try/finally` guarantees it on every exit path.
//! `Array` construction reaches the live `Graph` through a thread-local
//! rather than an explicit parameter, mirroring the original's
//! process-wide, implicitly-available `Backend` — every Array carries an
//! *implicit* reference to it (§9), not an explicit one threaded through
//! every call site.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{build_backend, BackendConfig};
use crate::errors::{AxError, AxResult};
use crate::graph::Graph;

thread_local! {
    static CURRENT: RefCell<Option<Rc<Graph>>> = const { RefCell::new(None) };
}

/// Fetches the ambient Graph `Array` constructors implicitly attach to.
/// Fails with `BackendUninitialized` outside a `BackendScope` (§4.2: "All
/// Array operations outside such a scope must fail with
/// BackendUninitialized").
pub(crate) fn current_graph() -> AxResult<Rc<Graph>> {
    CURRENT.with(|cell| cell.borrow().clone()).ok_or(AxError::BackendUninitialized)
}

/// RAII guard around a Backend's lifetime. Construct with [`BackendScope::new`];
/// the Backend (and every Node/Storage/cache reachable through it) is torn
/// down when the guard drops, whichever way the scope exits.
pub struct BackendScope {
    graph: Rc<Graph>,
    previous: Option<Rc<Graph>>,
}

impl BackendScope {
    pub fn new(config: BackendConfig) -> AxResult<Self> {
        let backend = build_backend(config)?;
        let graph = Rc::new(Graph::new(backend));
        let previous = CURRENT.with(|cell| cell.borrow_mut().replace(graph.clone()));
        Ok(Self { graph, previous })
    }

    /// The scope's Graph, for callers that want to build Arrays through
    /// `Array::from_parts`-style plumbing (e.g. tests) rather than only
    /// through the ambient thread-local.
    pub fn graph(&self) -> &Rc<Graph> {
        &self.graph
    }
}

impl Drop for BackendScope {
    fn drop(&mut self) {
        self.graph.deactivate();
        CURRENT.with(|cell| *cell.borrow_mut() = self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::dtype::Dtype;

    #[test]
    fn operations_fail_outside_a_scope() {
        let err = current_graph().unwrap_err();
        assert!(matches!(err, AxError::BackendUninitialized));
    }

    #[test]
    fn scope_init_and_cleanup_bracket_usage() {
        {
            let _scope = BackendScope::new(BackendConfig::Cpu).unwrap();
            let a = Array::zeros(&[2, 2], Dtype::F32).unwrap();
            assert_eq!(a.shape(), vec![2, 2]);
        }
        assert!(current_graph().is_err());
    }
}
