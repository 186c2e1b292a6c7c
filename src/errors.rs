use thiserror::Error;

/// Crate-wide error taxonomy. Shape/dtype errors are raised eagerly at graph
/// construction time; backend/allocation errors only surface once `eval` runs
/// a kernel (see `graph::eval`).
#[derive(Error, Debug)]
pub enum AxError {
    #[error("no backend is active; operations must run inside a BackendScope")]
    BackendUninitialized,

    #[error("shape mismatch: {context}: {expected:?} vs {found:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("axis {axis} out of range for rank {rank}")]
    AxisOutOfRange { axis: isize, rank: usize },

    #[error("dtype mismatch: expected {expected}, found {found}")]
    DtypeMismatch { expected: String, found: String },

    #[error("dtype {0} is not supported for this operation")]
    DtypeUnsupported(String),

    #[error("node is not differentiable: {0}")]
    NonDifferentiable(String),

    #[error("node not realized: {0}")]
    NotRealized(String),

    #[error("backend error in {op}: {message}")]
    BackendError { op: String, message: String },

    #[error("backend allocation failed: {0}")]
    OutOfMemory(String),

    #[error("invalid slice on axis {axis}: {reason}")]
    InvalidSlice { axis: usize, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AxResult<T> = Result<T, AxError>;
