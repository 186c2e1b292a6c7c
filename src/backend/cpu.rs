use ndarray::{ArrayD, IxDyn};

use crate::backend::storage::{CpuBuffer, Storage};
use crate::backend::{Backend, BinaryOp, CompareOp, ReduceOp, Scalar, TensorValue, UnaryOp};
use crate::dtype::Dtype;
use crate::errors::{AxError, AxResult};
use crate::shape::View;

/// Reference CPU backend. Favors a single generic (read-as-f64,
/// write-as-target-dtype) code path over per-dtype specialization — this is
/// the naive, nested-loop texture the teacher's own `conv2d`/`max_pool2d`
/// kernels use ("Naive implementation for now") rather than a vectorized one.
#[derive(Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Row-major odometer over a shape; yields every multi-index once.
struct ShapeIter<'a> {
    shape: &'a [usize],
    idx: Vec<usize>,
    done: bool,
}

fn shape_iter(shape: &[usize]) -> ShapeIter<'_> {
    ShapeIter {
        shape,
        idx: vec![0; shape.len()],
        done: shape.iter().any(|&s| s == 0),
    }
}

impl<'a> Iterator for ShapeIter<'a> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        let cur = self.idx.clone();
        if self.shape.is_empty() {
            self.done = true;
            return Some(cur);
        }
        for i in (0..self.shape.len()).rev() {
            self.idx[i] += 1;
            if self.idx[i] < self.shape[i] {
                break;
            }
            self.idx[i] = 0;
            if i == 0 {
                self.done = true;
            }
        }
        Some(cur)
    }
}

fn read_scalar(buf: &CpuBuffer, addr: usize) -> f64 {
    match buf {
        CpuBuffer::F32(a) => a.as_slice().expect("flat buffer")[addr] as f64,
        CpuBuffer::I32(a) => a.as_slice().expect("flat buffer")[addr] as f64,
        CpuBuffer::B8(a) => {
            if a.as_slice().expect("flat buffer")[addr] {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn build_buffer(dtype: Dtype, values: Vec<f64>) -> CpuBuffer {
    let n = values.len();
    match dtype {
        Dtype::F32 => CpuBuffer::F32(
            ArrayD::from_shape_vec(IxDyn(&[n]), values.into_iter().map(|v| v as f32).collect()).unwrap(),
        ),
        Dtype::I32 => CpuBuffer::I32(
            ArrayD::from_shape_vec(IxDyn(&[n]), values.into_iter().map(|v| v.trunc() as i32).collect())
                .unwrap(),
        ),
        Dtype::B8 => CpuBuffer::B8(
            ArrayD::from_shape_vec(IxDyn(&[n]), values.into_iter().map(|v| v != 0.0).collect()).unwrap(),
        ),
    }
}

/// Reads an element at `out_idx` of a (possibly lower-rank / size-1)
/// broadcast operand.
fn broadcast_addr(view: &View, out_idx: &[usize]) -> usize {
    let rank = view.rank();
    let pad = out_idx.len() - rank;
    let mut addr = view.offset() as isize;
    for k in 0..rank {
        let o = out_idx[pad + k];
        let i = if view.shape()[k] == 1 { 0 } else { o };
        addr += i as isize * view.strides()[k];
    }
    addr as usize
}

fn matmul_addr(view: &View, batch_idx: &[usize], i: usize, j: usize) -> usize {
    let batch_rank = view.rank() - 2;
    let pad = batch_idx.len() - batch_rank;
    let mut addr = view.offset() as isize;
    for b in 0..batch_rank {
        let o = batch_idx[pad + b];
        let actual = if view.shape()[b] == 1 { 0 } else { o };
        addr += actual as isize * view.strides()[b];
    }
    addr += i as isize * view.strides()[batch_rank];
    addr += j as isize * view.strides()[batch_rank + 1];
    addr as usize
}

impl Backend for CpuBackend {
    #[tracing::instrument(level = "trace", skip(self), fields(backend = "cpu"))]
    fn allocate(&self, dtype: Dtype, num_elements: usize) -> AxResult<Storage> {
        Ok(Storage::new(build_buffer(dtype, vec![0.0; num_elements])))
    }

    #[tracing::instrument(level = "trace", skip(self, bytes), fields(backend = "cpu"))]
    fn upload(&self, bytes: &[u8], dtype: Dtype, shape: &[usize]) -> AxResult<TensorValue> {
        let n: usize = shape.iter().product();
        let width = dtype.byte_width();
        if bytes.len() != n * width {
            return Err(AxError::ShapeMismatch {
                context: format!("upload: expected {} bytes for dtype {dtype}, found {}", n * width, bytes.len()),
                expected: vec![n * width],
                found: vec![bytes.len()],
            });
        }
        let values: Vec<f64> = match dtype {
            Dtype::F32 => bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes(c.try_into().unwrap()) as f64)
                .collect(),
            Dtype::I32 => bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes(c.try_into().unwrap()) as f64)
                .collect(),
            Dtype::B8 => bytes.iter().map(|&b| if b != 0 { 1.0 } else { 0.0 }).collect(),
        };
        let storage = Storage::new(build_buffer(dtype, values));
        Ok(TensorValue::new(View::contiguous(shape), storage))
    }

    #[tracing::instrument(level = "trace", skip(self, value), fields(backend = "cpu"))]
    fn download(&self, value: &TensorValue) -> AxResult<Vec<u8>> {
        let buf = value.storage.buffer();
        let mut bytes = Vec::with_capacity(value.view.numel() * value.dtype().byte_width());
        for idx in shape_iter(value.view.shape()) {
            let addr = value.view.addr(&idx);
            match buf {
                CpuBuffer::F32(a) => bytes.extend_from_slice(&a.as_slice().unwrap()[addr].to_le_bytes()),
                CpuBuffer::I32(a) => bytes.extend_from_slice(&a.as_slice().unwrap()[addr].to_le_bytes()),
                CpuBuffer::B8(a) => bytes.push(a.as_slice().unwrap()[addr] as u8),
            }
        }
        Ok(bytes)
    }

    #[tracing::instrument(level = "trace", skip(self), fields(backend = "cpu"))]
    fn fill(&self, dtype: Dtype, shape: &[usize], scalar: Scalar) -> AxResult<TensorValue> {
        let n: usize = shape.iter().product();
        let storage = Storage::new(build_buffer(dtype, vec![scalar.as_f64(); n]));
        Ok(TensorValue::new(View::contiguous(shape), storage))
    }

    #[tracing::instrument(level = "trace", skip(self), fields(backend = "cpu"))]
    fn iota(&self, shape: &[usize], start: f64, step: f64, dtype: Dtype) -> AxResult<TensorValue> {
        let n: usize = shape.iter().product();
        let values: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
        let storage = Storage::new(build_buffer(dtype, values));
        Ok(TensorValue::new(View::contiguous(shape), storage))
    }

    #[tracing::instrument(level = "trace", skip(self, input), fields(backend = "cpu", ?op))]
    fn elementwise_unary(&self, op: UnaryOp, input: &TensorValue) -> AxResult<TensorValue> {
        let buf = input.storage.buffer();
        let mut out = Vec::with_capacity(input.view.numel());
        for idx in shape_iter(input.view.shape()) {
            let x = read_scalar(buf, input.view.addr(&idx));
            out.push(match op {
                UnaryOp::Neg => -x,
                UnaryOp::Recip => 1.0 / x,
                UnaryOp::Exp => x.exp(),
                UnaryOp::Log => x.ln(),
                UnaryOp::Sqrt => x.sqrt(),
                UnaryOp::Sq => x * x,
            });
        }
        let storage = Storage::new(build_buffer(input.dtype(), out));
        Ok(TensorValue::new(View::contiguous(input.view.shape()), storage))
    }

    #[tracing::instrument(level = "trace", skip(self, lhs, rhs), fields(backend = "cpu", ?op))]
    fn elementwise_binary(&self, op: BinaryOp, lhs: &TensorValue, rhs: &TensorValue) -> AxResult<TensorValue> {
        let out_shape = crate::shape::broadcast_shapes(lhs.shape(), rhs.shape())?;
        let dtype = crate::dtype::promote(lhs.dtype(), rhs.dtype());
        let lbuf = lhs.storage.buffer();
        let rbuf = rhs.storage.buffer();
        let mut out = Vec::with_capacity(out_shape.iter().product());
        for idx in shape_iter(&out_shape) {
            let a = read_scalar(lbuf, broadcast_addr(&lhs.view, &idx));
            let b = read_scalar(rbuf, broadcast_addr(&rhs.view, &idx));
            out.push(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if dtype.is_int() {
                        (a as i64 / b as i64) as f64 // truncation toward zero (§9)
                    } else {
                        a / b
                    }
                }
                BinaryOp::Minimum => a.min(b),
                BinaryOp::Maximum => a.max(b),
            });
        }
        let storage = Storage::new(build_buffer(dtype, out));
        Ok(TensorValue::new(View::contiguous(&out_shape), storage))
    }

    #[tracing::instrument(level = "trace", skip(self, input), fields(backend = "cpu", ?op))]
    fn reduce(&self, op: ReduceOp, input: &TensorValue, axes: &[usize]) -> AxResult<TensorValue> {
        let in_shape = input.view.shape().to_vec();
        let out_shape: Vec<usize> = in_shape
            .iter()
            .enumerate()
            .map(|(i, &s)| if axes.contains(&i) { 1 } else { s })
            .collect();
        let out_numel: usize = out_shape.iter().product();
        let buf = input.storage.buffer();

        let is_arg = matches!(op, ReduceOp::ArgMax | ReduceOp::ArgMin);
        let mut acc: Vec<f64> = match op {
            ReduceOp::Sum | ReduceOp::Mean => vec![0.0; out_numel],
            ReduceOp::Max | ReduceOp::ArgMax => vec![f64::NEG_INFINITY; out_numel],
            ReduceOp::Min | ReduceOp::ArgMin => vec![f64::INFINITY; out_numel],
        };
        let mut best_pos = vec![0i64; out_numel];
        let mut counts = vec![0usize; out_numel];

        let out_strides = crate::shape::row_major_strides(&out_shape);
        for idx in shape_iter(&in_shape) {
            let out_idx: Vec<usize> = idx.iter().enumerate().map(|(i, &v)| if axes.contains(&i) { 0 } else { v }).collect();
            let out_flat: usize = out_idx.iter().zip(out_strides.iter()).map(|(&i, &s)| i as isize * s).sum::<isize>() as usize;
            let v = read_scalar(buf, input.view.addr(&idx));
            match op {
                ReduceOp::Sum | ReduceOp::Mean => acc[out_flat] += v,
                ReduceOp::Max => acc[out_flat] = acc[out_flat].max(v),
                ReduceOp::Min => acc[out_flat] = acc[out_flat].min(v),
                ReduceOp::ArgMax => {
                    if v > acc[out_flat] {
                        acc[out_flat] = v;
                        best_pos[out_flat] = counts[out_flat] as i64;
                    }
                }
                ReduceOp::ArgMin => {
                    if v < acc[out_flat] {
                        acc[out_flat] = v;
                        best_pos[out_flat] = counts[out_flat] as i64;
                    }
                }
            }
            counts[out_flat] += 1;
        }

        let (values, dtype) = if is_arg {
            (best_pos.into_iter().map(|v| v as f64).collect(), Dtype::I32)
        } else if matches!(op, ReduceOp::Mean) {
            let means: Vec<f64> = acc.iter().zip(counts.iter()).map(|(&s, &c)| s / c.max(1) as f64).collect();
            (means, input.dtype())
        } else {
            (acc, input.dtype())
        };
        let storage = Storage::new(build_buffer(dtype, values));
        Ok(TensorValue::new(View::contiguous(&out_shape), storage))
    }

    #[tracing::instrument(level = "trace", skip(self, lhs, rhs), fields(backend = "cpu"))]
    fn matmul(&self, lhs: &TensorValue, rhs: &TensorValue) -> AxResult<TensorValue> {
        if lhs.view.rank() < 2 || rhs.view.rank() < 2 {
            return Err(AxError::ShapeMismatch {
                context: "matmul: both operands must have rank >= 2".into(),
                expected: vec![2],
                found: vec![lhs.view.rank().min(rhs.view.rank())],
            });
        }
        let (m, k) = (lhs.shape()[lhs.view.rank() - 2], lhs.shape()[lhs.view.rank() - 1]);
        let (k2, n) = (rhs.shape()[rhs.view.rank() - 2], rhs.shape()[rhs.view.rank() - 1]);
        if k != k2 {
            return Err(AxError::ShapeMismatch {
                context: "matmul: inner dimensions must match".into(),
                expected: vec![k],
                found: vec![k2],
            });
        }
        let lbatch = &lhs.shape()[..lhs.view.rank() - 2];
        let rbatch = &rhs.shape()[..rhs.view.rank() - 2];
        let batch_shape = crate::shape::broadcast_shapes(lbatch, rbatch)?;
        let mut out_shape = batch_shape.clone();
        out_shape.push(m);
        out_shape.push(n);

        let dtype = crate::dtype::promote(lhs.dtype(), rhs.dtype());
        let lbuf = lhs.storage.buffer();
        let rbuf = rhs.storage.buffer();
        let mut out = vec![0.0f64; out_shape.iter().product()];
        let out_strides = crate::shape::row_major_strides(&out_shape);

        for batch_idx in shape_iter(&batch_shape) {
            for i in 0..m {
                for j in 0..n {
                    let mut sum = 0.0;
                    for p in 0..k {
                        let a = read_scalar(lbuf, matmul_addr(&lhs.view, &batch_idx, i, p));
                        let b = read_scalar(rbuf, matmul_addr(&rhs.view, &batch_idx, p, j));
                        sum += a * b;
                    }
                    let mut full_idx = batch_idx.clone();
                    full_idx.push(i);
                    full_idx.push(j);
                    let flat: usize = full_idx.iter().zip(out_strides.iter()).map(|(&x, &s)| x as isize * s).sum::<isize>() as usize;
                    out[flat] = sum;
                }
            }
        }
        let storage = Storage::new(build_buffer(dtype, out));
        Ok(TensorValue::new(View::contiguous(&out_shape), storage))
    }

    #[tracing::instrument(level = "trace", skip(self, lhs, rhs), fields(backend = "cpu", ?op))]
    fn compare(&self, op: CompareOp, lhs: &TensorValue, rhs: &TensorValue) -> AxResult<TensorValue> {
        let out_shape = crate::shape::broadcast_shapes(lhs.shape(), rhs.shape())?;
        let lbuf = lhs.storage.buffer();
        let rbuf = rhs.storage.buffer();
        let mut out = Vec::with_capacity(out_shape.iter().product());
        for idx in shape_iter(&out_shape) {
            let a = read_scalar(lbuf, broadcast_addr(&lhs.view, &idx));
            let b = read_scalar(rbuf, broadcast_addr(&rhs.view, &idx));
            let result = match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
            };
            out.push(if result { 1.0 } else { 0.0 });
        }
        let storage = Storage::new(build_buffer(Dtype::B8, out));
        Ok(TensorValue::new(View::contiguous(&out_shape), storage))
    }

    #[tracing::instrument(level = "trace", skip(self, input), fields(backend = "cpu", ?target))]
    fn cast(&self, input: &TensorValue, target: Dtype) -> AxResult<TensorValue> {
        let buf = input.storage.buffer();
        let mut out = Vec::with_capacity(input.view.numel());
        for idx in shape_iter(input.view.shape()) {
            out.push(read_scalar(buf, input.view.addr(&idx)));
        }
        let storage = Storage::new(build_buffer(target, out));
        Ok(TensorValue::new(View::contiguous(input.view.shape()), storage))
    }

    #[tracing::instrument(level = "trace", skip(self, input), fields(backend = "cpu"))]
    fn copy_contiguous(&self, input: &TensorValue) -> AxResult<TensorValue> {
        let buf = input.storage.buffer();
        let mut out = Vec::with_capacity(input.view.numel());
        for idx in shape_iter(input.view.shape()) {
            out.push(read_scalar(buf, input.view.addr(&idx)));
        }
        let storage = Storage::new(build_buffer(input.dtype(), out));
        Ok(TensorValue::new(View::contiguous(input.view.shape()), storage))
    }
}
