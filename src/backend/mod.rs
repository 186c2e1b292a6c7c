pub mod cpu;
pub mod storage;
#[cfg(feature = "cuda")]
pub mod cuda;

pub use storage::{CpuBuffer, Storage};

use crate::dtype::Dtype;
use crate::errors::AxResult;
use crate::shape::View;

/// A realized value: a view over a concrete, backend-owned buffer. Forward
/// evaluators and VJP rules only ever see `TensorValue`s for already-realized
/// parents (§4.4: "a function from realized parent Storages to a new
/// Storage").
#[derive(Debug, Clone)]
pub struct TensorValue {
    pub view: View,
    pub storage: Storage,
}

impl TensorValue {
    pub fn new(view: View, storage: Storage) -> Self {
        Self { view, storage }
    }

    pub fn dtype(&self) -> Dtype {
        self.storage.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        self.view.shape()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Recip,
    Exp,
    Log,
    Sqrt,
    Sq,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Minimum,
    Maximum,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReduceOp {
    Sum,
    Mean,
    Max,
    Min,
    ArgMax,
    ArgMin,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    F32(f32),
    I32(i32),
    B8(bool),
}

impl Scalar {
    pub fn dtype(self) -> Dtype {
        match self {
            Scalar::F32(_) => Dtype::F32,
            Scalar::I32(_) => Dtype::I32,
            Scalar::B8(_) => Dtype::B8,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::F32(v) => v as f64,
            Scalar::I32(v) => v as f64,
            Scalar::B8(v) => v as u8 as f64,
        }
    }
}

/// Narrow capability set the core calls into (§4.2). Concrete backends
/// (CPU, CUDA behind the `cuda` feature) implement this trait; the graph
/// never special-cases which one is active.
pub trait Backend: std::fmt::Debug {
    fn allocate(&self, dtype: Dtype, num_elements: usize) -> AxResult<Storage>;

    fn upload(&self, bytes: &[u8], dtype: Dtype, shape: &[usize]) -> AxResult<TensorValue>;

    fn download(&self, value: &TensorValue) -> AxResult<Vec<u8>>;

    fn fill(&self, dtype: Dtype, shape: &[usize], scalar: Scalar) -> AxResult<TensorValue>;

    fn iota(&self, shape: &[usize], start: f64, step: f64, dtype: Dtype) -> AxResult<TensorValue>;

    fn elementwise_unary(&self, op: UnaryOp, input: &TensorValue) -> AxResult<TensorValue>;

    /// Accepts non-equal but broadcastable shapes; the backend performs
    /// implicit broadcast reads rather than materializing expanded operands.
    fn elementwise_binary(&self, op: BinaryOp, lhs: &TensorValue, rhs: &TensorValue) -> AxResult<TensorValue>;

    /// Output keeps reduced axes as size 1 (keepdim semantics, §4.2).
    fn reduce(&self, op: ReduceOp, input: &TensorValue, axes: &[usize]) -> AxResult<TensorValue>;

    /// Batched matmul; last two dims are the matrix, leading dims broadcast.
    fn matmul(&self, lhs: &TensorValue, rhs: &TensorValue) -> AxResult<TensorValue>;

    fn compare(&self, op: CompareOp, lhs: &TensorValue, rhs: &TensorValue) -> AxResult<TensorValue>;

    fn cast(&self, input: &TensorValue, target: Dtype) -> AxResult<TensorValue>;

    /// Used when an op needs a dense layout (e.g. reshape of a
    /// non-contiguous view).
    fn copy_contiguous(&self, input: &TensorValue) -> AxResult<TensorValue>;
}

/// Which concrete backend a `BackendScope` should bring up. The only
/// process-wide knob the spec defines (§10.3); mirrors the teacher's `cuda`
/// Cargo feature switching `CPUBackend`/`CUDABackend`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendConfig {
    #[default]
    Cpu,
    #[cfg(feature = "cuda")]
    Cuda { device_index: usize },
}

pub fn build_backend(config: BackendConfig) -> AxResult<Box<dyn Backend>> {
    match config {
        BackendConfig::Cpu => Ok(Box::new(cpu::CpuBackend::new())),
        #[cfg(feature = "cuda")]
        BackendConfig::Cuda { device_index } => {
            Ok(Box::new(cuda::CudaBackend::new(device_index)?))
        }
    }
}
