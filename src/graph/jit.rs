//! Memoizes a graph-building function by canonical input signature (§4.7).
//!
//! The canonical key is deliberately blind to an input `Array`'s contents —
//! only `(shape, dtype)` enters it (§9 "Canonical JIT key") — so a cache hit
//! returns the very `Array` produced on the first call with a matching
//! signature, not a re-trace against the new call's data. That is the
//! contract §8 scenario 6 tests: three calls with matching shape/dtype
//! invoke the builder once.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::array::Array;
use crate::errors::AxResult;

type Key = Vec<(Vec<usize>, &'static str)>;

pub struct Jit {
    name: String,
    builder: Box<dyn Fn(&[Array]) -> AxResult<Array>>,
    cache: RefCell<HashMap<Key, Array>>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl Jit {
    pub fn new(name: impl Into<String>, builder: impl Fn(&[Array]) -> AxResult<Array> + 'static) -> Self {
        Self {
            name: name.into(),
            builder: Box::new(builder),
            cache: RefCell::new(HashMap::new()),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    fn key(inputs: &[Array]) -> Key {
        inputs.iter().map(|a| (a.shape().to_vec(), a.dtype().name())).collect()
    }

    #[tracing::instrument(level = "debug", skip(self, inputs), fields(jit = %self.name))]
    pub fn call(&self, inputs: &[Array]) -> AxResult<Array> {
        let key = Self::key(inputs);
        if let Some(cached) = self.cache.borrow().get(&key) {
            self.hits.set(self.hits.get() + 1);
            tracing::debug!(jit = %self.name, "jit cache hit");
            return Ok(cached.clone());
        }
        self.misses.set(self.misses.get() + 1);
        tracing::debug!(jit = %self.name, "jit cache miss");
        let result = (self.builder)(inputs)?;
        self.cache.borrow_mut().insert(key, result.clone());
        Ok(result)
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    /// Cleared at `BackendScope` cleanup (§9 "The cache is keyed within a
    /// single Backend session and cleared at cleanup"); callers drop their
    /// `Jit` along with the scope, so this is mostly useful for tests that
    /// want to force a fresh compile without tearing the scope down.
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl std::fmt::Debug for Jit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jit")
            .field("name", &self.name)
            .field("hits", &self.hits.get())
            .field("misses", &self.misses.get())
            .finish()
    }
}
