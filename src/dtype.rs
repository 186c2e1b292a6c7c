use crate::errors::{AxError, AxResult};

/// Broad family a [`Dtype`] belongs to; drives promotion (§4.1/§9: "dynamic
/// typing ... dispatch on (op, dtype) rather than on host type").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    Bool,
    Int,
    Float,
}

/// Element type carried by a `Storage`. Intentionally small and tagged rather
/// than generic: the graph dispatches on `(op, dtype)` at runtime, the way
/// the backend dispatches on `(op, device)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    F32,
    I32,
    B8,
}

impl Dtype {
    pub fn category(self) -> DtypeCategory {
        match self {
            Dtype::F32 => DtypeCategory::Float,
            Dtype::I32 => DtypeCategory::Int,
            Dtype::B8 => DtypeCategory::Bool,
        }
    }

    pub fn byte_width(self) -> usize {
        match self {
            Dtype::F32 => 4,
            Dtype::I32 => 4,
            Dtype::B8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dtype::F32 => "f32",
            Dtype::I32 => "i32",
            Dtype::B8 => "b8",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self.category(), DtypeCategory::Float)
    }

    pub fn is_int(self) -> bool {
        matches!(self.category(), DtypeCategory::Int)
    }

    pub fn is_bool(self) -> bool {
        matches!(self.category(), DtypeCategory::Bool)
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Promotion table: bool < int < float. Mixed binary ops promote to the
/// wider category; float32 dominates since it is the only float we carry.
pub fn promote(a: Dtype, b: Dtype) -> Dtype {
    use DtypeCategory::*;
    match (a.category(), b.category()) {
        (Float, _) | (_, Float) => Dtype::F32,
        (Int, _) | (_, Int) => Dtype::I32,
        (Bool, Bool) => Dtype::B8,
    }
}

pub fn require_int(dtype: Dtype, op: &str) -> AxResult<()> {
    if dtype.is_int() {
        Ok(())
    } else {
        Err(AxError::DtypeUnsupported(format!(
            "{op} requires an integer dtype, found {dtype}"
        )))
    }
}

pub fn require_float(dtype: Dtype, op: &str) -> AxResult<()> {
    if dtype.is_float() {
        Ok(())
    } else {
        Err(AxError::DtypeUnsupported(format!(
            "{op} requires a floating dtype, found {dtype}"
        )))
    }
}
