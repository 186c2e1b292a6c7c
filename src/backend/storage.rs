use ndarray::ArrayD;
use std::sync::Arc;

use crate::dtype::Dtype;
use crate::errors::{AxError, AxResult};

/// Dense, dtype-tagged buffer. `ArrayD` already carries its own shape, but
/// `Storage` is addressed only through a `View` (§3: storage is "exclusively
/// owned by the backend"); the CPU backend is the only code that reaches
/// into a buffer directly.
#[derive(Debug, Clone)]
pub enum CpuBuffer {
    F32(ArrayD<f32>),
    I32(ArrayD<i32>),
    B8(ArrayD<bool>),
}

impl CpuBuffer {
    pub fn dtype(&self) -> Dtype {
        match self {
            CpuBuffer::F32(_) => Dtype::F32,
            CpuBuffer::I32(_) => Dtype::I32,
            CpuBuffer::B8(_) => Dtype::B8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CpuBuffer::F32(a) => a.len(),
            CpuBuffer::I32(a) => a.len(),
            CpuBuffer::B8(a) => a.len(),
        }
    }

    pub fn as_f32(&self) -> AxResult<&ArrayD<f32>> {
        match self {
            CpuBuffer::F32(a) => Ok(a),
            other => Err(AxError::DtypeMismatch {
                expected: "f32".into(),
                found: other.dtype().name().into(),
            }),
        }
    }

    pub fn as_i32(&self) -> AxResult<&ArrayD<i32>> {
        match self {
            CpuBuffer::I32(a) => Ok(a),
            other => Err(AxError::DtypeMismatch {
                expected: "i32".into(),
                found: other.dtype().name().into(),
            }),
        }
    }

    pub fn as_b8(&self) -> AxResult<&ArrayD<bool>> {
        match self {
            CpuBuffer::B8(a) => Ok(a),
            other => Err(AxError::DtypeMismatch {
                expected: "b8".into(),
                found: other.dtype().name().into(),
            }),
        }
    }
}

/// Opaque, reference-counted buffer of a single dtype (§3). Once produced by
/// a backend call it is never mutated in place; every op that "changes" a
/// tensor allocates a fresh `Storage` (§9: "Storage is never overwritten in
/// place").
#[derive(Debug, Clone)]
pub struct Storage(Arc<CpuBuffer>);

impl Storage {
    pub fn new(buffer: CpuBuffer) -> Self {
        Self(Arc::new(buffer))
    }

    pub fn dtype(&self) -> Dtype {
        self.0.dtype()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn buffer(&self) -> &CpuBuffer {
        &self.0
    }
}
