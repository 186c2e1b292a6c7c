//! `arrayx`: a lazy n-dimensional array engine with an append-only
//! expression graph, reverse-mode autograd, a pluggable Backend, and a
//! tiny NN layer on top (§1–§2).

pub mod array;
pub mod backend;
pub mod dtype;
pub mod errors;
pub mod graph;
pub mod nn;
pub mod scope;
pub mod shape;
pub mod types;

pub use array::Array;
pub use backend::BackendConfig;
pub use dtype::Dtype;
pub use errors::{AxError, AxResult};
pub use scope::BackendScope;
