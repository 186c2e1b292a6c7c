//! The user-facing handle onto a graph `Node` (§3 "Array"). Cloning an
//! `Array` shares the same node (the `Rc<Graph>` + `NodeId` pair is cheap to
//! copy); every combinator below returns a *new* `Array` pointing at a new
//! node rather than mutating the one `self` points to (§9).

use std::rc::Rc;

use crate::backend::{BinaryOp, CompareOp, ReduceOp, Scalar, TensorValue, UnaryOp};
use crate::dtype::{self, Dtype};
use crate::errors::{AxError, AxResult};
use crate::graph::ops::cast::Cast;
use crate::graph::ops::compare::Compare;
use crate::graph::ops::construct::{Fill, FromHost, Identity, Iota};
use crate::graph::ops::elementwise::{Binary, Unary};
use crate::graph::ops::matmul::MatMul;
use crate::graph::ops::movement::{BroadcastTo, Flatten, Permute, Reshape, Slice, Squeeze, Transpose, Unsqueeze, UnSlice};
use crate::graph::ops::reduce::Reduce;
use crate::graph::ops::Op;
use crate::graph::{autograd, eval, Graph};
use crate::shape::{self, SliceSpec, View};
use crate::types::NodeId;

#[derive(Clone)]
pub struct Array {
    graph: Rc<Graph>,
    id: NodeId,
}

fn push_node(
    graph: &Rc<Graph>,
    op: Box<dyn Op>,
    parents: Vec<NodeId>,
    view: View,
    dtype: Dtype,
    requires_grad: bool,
) -> AxResult<Array> {
    let id = graph.push(op, parents, view, dtype, requires_grad)?;
    Ok(Array::from_parts(graph.clone(), id))
}

fn to_scalar(value: f64, dtype: Dtype) -> Scalar {
    match dtype {
        Dtype::F32 => Scalar::F32(value as f32),
        Dtype::I32 => Scalar::I32(value as i32),
        Dtype::B8 => Scalar::B8(value != 0.0),
    }
}

impl Array {
    pub(crate) fn from_parts(graph: Rc<Graph>, id: NodeId) -> Self {
        Self { graph, id }
    }

    pub(crate) fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn shape(&self) -> Vec<usize> {
        self.graph.node(self.id).view.shape().to_vec()
    }

    pub fn dtype(&self) -> Dtype {
        self.graph.node(self.id).dtype
    }

    pub fn rank(&self) -> usize {
        self.graph.node(self.id).view.rank()
    }

    pub fn numel(&self) -> usize {
        self.graph.node(self.id).view.numel()
    }

    pub fn requires_grad(&self) -> bool {
        self.graph.node(self.id).requires_grad
    }

    // ---- constructors -------------------------------------------------

    pub fn zeros(shape: &[usize], dtype: Dtype) -> AxResult<Array> {
        Array::full(shape, 0.0, dtype)
    }

    pub fn ones(shape: &[usize], dtype: Dtype) -> AxResult<Array> {
        Array::full(shape, 1.0, dtype)
    }

    pub fn full(shape: &[usize], value: f64, dtype: Dtype) -> AxResult<Array> {
        let graph = crate::scope::current_graph()?;
        let scalar = to_scalar(value, dtype);
        push_node(
            &graph,
            Box::new(Fill { shape: shape.to_vec(), dtype, value: scalar }),
            vec![],
            View::contiguous(shape),
            dtype,
            true,
        )
    }

    /// §9 open question (b): the distilled spec's own surface table (§6)
    /// shows `arange(..., dtype=F32)` but §9 explicitly resolves the
    /// no-dtype case to `I32`; Rust has no keyword defaults to paper over
    /// the contradiction, so `dtype` here is always explicit and this
    /// crate doesn't pretend to pick a default.
    pub fn arange(shape: &[usize], start: f64, step: f64, dtype: Dtype) -> AxResult<Array> {
        let graph = crate::scope::current_graph()?;
        push_node(
            &graph,
            Box::new(Iota { shape: shape.to_vec(), start, step, dtype }),
            vec![],
            View::contiguous(shape),
            dtype,
            true,
        )
    }

    pub fn from_numpy(bytes: &[u8], shape: &[usize], dtype: Dtype) -> AxResult<Array> {
        let graph = crate::scope::current_graph()?;
        let n: usize = shape.iter().product();
        let expected = n * dtype.byte_width();
        if bytes.len() != expected {
            return Err(AxError::ShapeMismatch {
                context: format!("from_numpy: expected {expected} bytes for shape {shape:?}, found {}", bytes.len()),
                expected: vec![expected],
                found: vec![bytes.len()],
            });
        }
        push_node(
            &graph,
            Box::new(FromHost { bytes: bytes.to_vec(), shape: shape.to_vec(), dtype }),
            vec![],
            View::contiguous(shape),
            dtype,
            true,
        )
    }

    fn const_like(&self, value: f64) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let shape = node.view.shape().to_vec();
        let dtype = node.dtype;
        drop(node);
        let scalar = to_scalar(value, dtype);
        push_node(&self.graph, Box::new(Fill { shape: shape.clone(), dtype, value: scalar }), vec![], View::contiguous(&shape), dtype, true)
    }

    pub fn zeros_like(&self) -> AxResult<Array> {
        self.const_like(0.0)
    }

    pub fn ones_like(&self) -> AxResult<Array> {
        self.const_like(1.0)
    }

    pub fn full_like(&self, value: f64) -> AxResult<Array> {
        self.const_like(value)
    }

    /// Multiplies by a host-side constant broadcast to `self`'s shape —
    /// used by VJP rules (`2·g·x`, `g/(2·sqrt(x))`) that need a literal
    /// scalar rather than another graph input.
    pub fn scale(&self, factor: f64) -> AxResult<Array> {
        let c = self.const_like(factor)?;
        self.mul(&c)
    }

    // ---- elementwise unary ---------------------------------------------

    fn unary(&self, op: UnaryOp) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let view = node.view.clone();
        let dtype = node.dtype;
        let rg = node.requires_grad;
        drop(node);
        push_node(&self.graph, Box::new(Unary(op)), vec![self.id], View::contiguous(view.shape()), dtype, rg)
    }

    pub fn neg(&self) -> AxResult<Array> {
        self.unary(UnaryOp::Neg)
    }

    pub fn recip(&self) -> AxResult<Array> {
        dtype::require_float(self.dtype(), "recip")?;
        self.unary(UnaryOp::Recip)
    }

    pub fn exp(&self) -> AxResult<Array> {
        dtype::require_float(self.dtype(), "exp")?;
        self.unary(UnaryOp::Exp)
    }

    pub fn log(&self) -> AxResult<Array> {
        dtype::require_float(self.dtype(), "log")?;
        self.unary(UnaryOp::Log)
    }

    pub fn sqrt(&self) -> AxResult<Array> {
        dtype::require_float(self.dtype(), "sqrt")?;
        self.unary(UnaryOp::Sqrt)
    }

    pub fn sq(&self) -> AxResult<Array> {
        self.unary(UnaryOp::Sq)
    }

    // ---- elementwise binary ---------------------------------------------

    fn binary(&self, op: BinaryOp, other: &Array) -> AxResult<Array> {
        let a = self.graph.node(self.id);
        let b = self.graph.node(other.id);
        let shape = shape::broadcast_shapes(a.view.shape(), b.view.shape())?;
        let dtype = dtype::promote(a.dtype, b.dtype);
        let rg = a.requires_grad || b.requires_grad;
        drop((a, b));
        push_node(&self.graph, Box::new(Binary(op)), vec![self.id, other.id], View::contiguous(&shape), dtype, rg)
    }

    pub fn add(&self, other: &Array) -> AxResult<Array> {
        self.binary(BinaryOp::Add, other)
    }

    pub fn sub(&self, other: &Array) -> AxResult<Array> {
        self.binary(BinaryOp::Sub, other)
    }

    pub fn mul(&self, other: &Array) -> AxResult<Array> {
        self.binary(BinaryOp::Mul, other)
    }

    pub fn div(&self, other: &Array) -> AxResult<Array> {
        self.binary(BinaryOp::Div, other)
    }

    pub fn minimum(&self, other: &Array) -> AxResult<Array> {
        self.binary(BinaryOp::Minimum, other)
    }

    pub fn maximum(&self, other: &Array) -> AxResult<Array> {
        self.binary(BinaryOp::Maximum, other)
    }

    // ---- comparisons (never differentiable, §4.4) ----------------------

    fn compare_op(&self, op: CompareOp, other: &Array) -> AxResult<Array> {
        let a = self.graph.node(self.id);
        let b = self.graph.node(other.id);
        let shape = shape::broadcast_shapes(a.view.shape(), b.view.shape())?;
        drop((a, b));
        push_node(&self.graph, Box::new(Compare(op)), vec![self.id, other.id], View::contiguous(&shape), Dtype::B8, false)
    }

    pub fn lt(&self, other: &Array) -> AxResult<Array> {
        self.compare_op(CompareOp::Lt, other)
    }

    pub fn le(&self, other: &Array) -> AxResult<Array> {
        self.compare_op(CompareOp::Le, other)
    }

    pub fn gt(&self, other: &Array) -> AxResult<Array> {
        self.compare_op(CompareOp::Gt, other)
    }

    pub fn ge(&self, other: &Array) -> AxResult<Array> {
        self.compare_op(CompareOp::Ge, other)
    }

    pub fn eq(&self, other: &Array) -> AxResult<Array> {
        self.compare_op(CompareOp::Eq, other)
    }

    pub fn ne(&self, other: &Array) -> AxResult<Array> {
        self.compare_op(CompareOp::Ne, other)
    }

    // ---- reductions (keepdim, §4.2) -------------------------------------

    fn reduce_op(&self, op: ReduceOp, axes: Option<&[isize]>) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let rank = node.view.rank();
        let resolved = match axes {
            Some(a) => shape::normalize_axes(a, rank)?,
            None => (0..rank).collect(),
        };
        let input_shape = node.view.shape().to_vec();
        let out_shape: Vec<usize> =
            input_shape.iter().enumerate().map(|(i, &s)| if resolved.contains(&i) { 1 } else { s }).collect();
        let is_arg = matches!(op, ReduceOp::ArgMax | ReduceOp::ArgMin);
        let out_dtype = if is_arg { Dtype::I32 } else { node.dtype };
        let rg = node.requires_grad && !is_arg;
        drop(node);
        push_node(
            &self.graph,
            Box::new(Reduce { op, axes: resolved, input_shape }),
            vec![self.id],
            View::contiguous(&out_shape),
            out_dtype,
            rg,
        )
    }

    pub fn sum(&self, axes: Option<&[isize]>) -> AxResult<Array> {
        self.reduce_op(ReduceOp::Sum, axes)
    }

    pub fn mean(&self, axes: Option<&[isize]>) -> AxResult<Array> {
        self.reduce_op(ReduceOp::Mean, axes)
    }

    pub fn max(&self, axes: Option<&[isize]>) -> AxResult<Array> {
        self.reduce_op(ReduceOp::Max, axes)
    }

    pub fn min(&self, axes: Option<&[isize]>) -> AxResult<Array> {
        self.reduce_op(ReduceOp::Min, axes)
    }

    pub fn argmax(&self, axes: Option<&[isize]>) -> AxResult<Array> {
        self.reduce_op(ReduceOp::ArgMax, axes)
    }

    pub fn argmin(&self, axes: Option<&[isize]>) -> AxResult<Array> {
        self.reduce_op(ReduceOp::ArgMin, axes)
    }

    /// Internal: used by autograd's unbroadcasting to sum by `usize` axes
    /// already resolved (no need to re-wrap/normalize negatives).
    pub(crate) fn sum_axes(&self, axes: &[usize]) -> AxResult<Array> {
        let signed: Vec<isize> = axes.iter().map(|&a| a as isize).collect();
        self.sum(Some(&signed))
    }

    // ---- movement --------------------------------------------------------

    pub fn reshape(&self, new_shape: &[usize]) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let in_numel = node.view.numel();
        let out_numel: usize = new_shape.iter().product();
        if in_numel != out_numel {
            return Err(AxError::ShapeMismatch {
                context: "reshape: element count mismatch".into(),
                expected: node.view.shape().to_vec(),
                found: new_shape.to_vec(),
            });
        }
        let input_shape = node.view.shape().to_vec();
        let dtype = node.dtype;
        let rg = node.requires_grad;
        let view = node.view.reshape(new_shape).unwrap_or_else(|_| View::contiguous(new_shape));
        drop(node);
        push_node(&self.graph, Box::new(Reshape { target_shape: new_shape.to_vec(), input_shape }), vec![self.id], view, dtype, rg)
    }

    pub fn broadcast_to(&self, target_shape: &[usize]) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let view = node.view.broadcast_to(target_shape)?;
        let input_shape = node.view.shape().to_vec();
        let dtype = node.dtype;
        let rg = node.requires_grad;
        drop(node);
        push_node(
            &self.graph,
            Box::new(BroadcastTo { target_shape: target_shape.to_vec(), input_shape }),
            vec![self.id],
            view,
            dtype,
            rg,
        )
    }

    pub fn permute(&self, perm: &[usize]) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let view = node.view.permute(perm)?;
        let dtype = node.dtype;
        let rg = node.requires_grad;
        drop(node);
        push_node(&self.graph, Box::new(Permute { perm: perm.to_vec() }), vec![self.id], view, dtype, rg)
    }

    pub fn transpose(&self, i: usize, j: usize) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let view = node.view.transpose(i, j)?;
        let dtype = node.dtype;
        let rg = node.requires_grad;
        drop(node);
        push_node(&self.graph, Box::new(Transpose { i, j }), vec![self.id], view, dtype, rg)
    }

    pub fn squeeze(&self, axes: Option<&[usize]>) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let view = node.view.squeeze(axes)?;
        let dtype = node.dtype;
        let rg = node.requires_grad;
        drop(node);
        push_node(&self.graph, Box::new(Squeeze { axes: axes.map(|a| a.to_vec()) }), vec![self.id], view, dtype, rg)
    }

    pub fn unsqueeze(&self, axes: &[usize]) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let view = node.view.unsqueeze(axes)?;
        let dtype = node.dtype;
        let rg = node.requires_grad;
        drop(node);
        push_node(&self.graph, Box::new(Unsqueeze { axes: axes.to_vec() }), vec![self.id], view, dtype, rg)
    }

    pub fn flatten(&self, start: usize, end: usize) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let input_shape = node.view.shape().to_vec();
        let merged: usize = input_shape[start..end].iter().product();
        let mut out_shape = input_shape[..start].to_vec();
        out_shape.push(merged);
        out_shape.extend_from_slice(&input_shape[end..]);
        let dtype = node.dtype;
        let rg = node.requires_grad;
        let view = node.view.flatten(start, end).unwrap_or_else(|_| View::contiguous(&out_shape));
        drop(node);
        push_node(&self.graph, Box::new(Flatten { start, end, input_shape }), vec![self.id], view, dtype, rg)
    }

    pub fn slice(&self, specs: &[SliceSpec]) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let view = shape::slice_view(&node.view, specs)?;
        let input_shape = node.view.shape().to_vec();
        let dtype = node.dtype;
        let rg = node.requires_grad;
        drop(node);
        push_node(&self.graph, Box::new(Slice { specs: specs.to_vec(), input_shape }), vec![self.id], view, dtype, rg)
    }

    pub(crate) fn unslice(&self, specs: &[SliceSpec], input_shape: &[usize]) -> AxResult<Array> {
        let dtype = self.dtype();
        push_node(
            &self.graph,
            Box::new(UnSlice { specs: specs.to_vec(), input_shape: input_shape.to_vec() }),
            vec![self.id],
            View::contiguous(input_shape),
            dtype,
            false,
        )
    }

    // ---- matmul ----------------------------------------------------------

    pub fn matmul(&self, other: &Array) -> AxResult<Array> {
        let a = self.graph.node(self.id);
        let b = self.graph.node(other.id);
        if a.view.rank() < 2 || b.view.rank() < 2 {
            return Err(AxError::ShapeMismatch {
                context: "matmul: both operands must have rank >= 2".into(),
                expected: vec![2],
                found: vec![a.view.rank().min(b.view.rank())],
            });
        }
        let (m, k) = (a.view.shape()[a.view.rank() - 2], a.view.shape()[a.view.rank() - 1]);
        let (k2, n) = (b.view.shape()[b.view.rank() - 2], b.view.shape()[b.view.rank() - 1]);
        if k != k2 {
            return Err(AxError::ShapeMismatch {
                context: "matmul: inner dimensions must match".into(),
                expected: vec![k],
                found: vec![k2],
            });
        }
        let batch = shape::broadcast_shapes(&a.view.shape()[..a.view.rank() - 2], &b.view.shape()[..b.view.rank() - 2])?;
        let mut out_shape = batch;
        out_shape.push(m);
        out_shape.push(n);
        let dtype = dtype::promote(a.dtype, b.dtype);
        let rg = a.requires_grad || b.requires_grad;
        drop((a, b));
        push_node(&self.graph, Box::new(MatMul), vec![self.id, other.id], View::contiguous(&out_shape), dtype, rg)
    }

    // ---- cast / detach -----------------------------------------------------

    pub fn cast(&self, target: Dtype) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        if node.dtype == target {
            drop(node);
            return Ok(self.clone());
        }
        let shape = node.view.shape().to_vec();
        let source = node.dtype;
        let rg = node.requires_grad && !target.is_bool();
        drop(node);
        push_node(&self.graph, Box::new(Cast { target, source }), vec![self.id], View::contiguous(&shape), target, rg)
    }

    pub fn astype(&self, target: Dtype) -> AxResult<Array> {
        self.cast(target)
    }

    pub fn detach(&self) -> AxResult<Array> {
        let node = self.graph.node(self.id);
        let view = node.view.clone();
        let dtype = node.dtype;
        drop(node);
        push_node(&self.graph, Box::new(Identity), vec![self.id], view, dtype, false)
    }

    // ---- materialization ---------------------------------------------------

    pub fn eval(&self) -> AxResult<()> {
        eval::eval(&self.graph, self.id)
    }

    pub fn item(&self) -> AxResult<f64> {
        self.eval()?;
        let node = self.graph.node(self.id);
        if node.view.numel() != 1 {
            return Err(AxError::ShapeMismatch {
                context: "item: array must have exactly one element".into(),
                expected: vec![1],
                found: node.view.shape().to_vec(),
            });
        }
        let storage = node.storage().ok_or_else(|| AxError::NotRealized(format!("%{}", self.id.0)))?;
        let view = node.view.clone();
        let dtype = node.dtype;
        drop(node);
        let bytes = self.graph.backend().download(&TensorValue::new(view, storage))?;
        Ok(decode_scalar(&bytes, dtype))
    }

    /// Streams the contiguous bytes of this array back to the host (§4.5
    /// "numpy()/download()"). The actual ndarray/numpy wrapping is left to
    /// callers (and to `tests/`, which reconstruct an `ndarray::ArrayD` from
    /// these bytes for comparisons) — this crate's core only owns the byte
    /// boundary.
    pub fn numpy(&self) -> AxResult<Vec<u8>> {
        self.eval()?;
        let node = self.graph.node(self.id);
        let storage = node.storage().ok_or_else(|| AxError::NotRealized(format!("%{}", self.id.0)))?;
        let view = node.view.clone();
        drop(node);
        self.graph.backend().download(&TensorValue::new(view, storage))
    }

    pub fn backward(&self) -> AxResult<()> {
        autograd::backward(&self.graph, self.id)
    }

    pub fn grad(&self) -> Option<Array> {
        self.graph.node(self.id).grad().map(|id| Array::from_parts(self.graph.clone(), id))
    }
}

fn decode_scalar(bytes: &[u8], dtype: Dtype) -> f64 {
    match dtype {
        Dtype::F32 => f32::from_le_bytes(bytes[0..4].try_into().unwrap()) as f64,
        Dtype::I32 => i32::from_le_bytes(bytes[0..4].try_into().unwrap()) as f64,
        Dtype::B8 => {
            if bytes[0] != 0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array").field("id", &self.id).field("shape", &self.shape()).field("dtype", &self.dtype()).finish()
    }
}
