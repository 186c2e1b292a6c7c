use crate::array::Array;
use crate::backend::{Backend, TensorValue};
use crate::errors::{AxError, AxResult};
use crate::graph::ops::Op;
use crate::shape::{slice_view, SliceSpec};

#[derive(Debug)]
pub struct Reshape {
    pub target_shape: Vec<usize>,
    pub input_shape: Vec<usize>,
}

impl Op for Reshape {
    fn name(&self) -> &'static str {
        "reshape"
    }

    fn forward(&self, parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        let input = &parents[0];
        match input.view.reshape(&self.target_shape) {
            Ok(view) => Ok(TensorValue::new(view, input.storage.clone())),
            Err(_) => {
                let dense = backend.copy_contiguous(input)?;
                let view = dense.view.reshape(&self.target_shape).map_err(|_| AxError::ShapeMismatch {
                    context: "reshape: realized copy is unexpectedly non-contiguous".into(),
                    expected: self.target_shape.clone(),
                    found: dense.view.shape().to_vec(),
                })?;
                Ok(TensorValue::new(view, dense.storage))
            }
        }
    }

    fn vjp(&self, _parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        Ok(vec![Some(grad_output.reshape(&self.input_shape)?)])
    }
}

#[derive(Debug)]
pub struct Permute {
    pub perm: Vec<usize>,
}

impl Op for Permute {
    fn name(&self) -> &'static str {
        "permute"
    }

    fn forward(&self, parents: &[TensorValue], _backend: &dyn Backend) -> AxResult<TensorValue> {
        let input = &parents[0];
        Ok(TensorValue::new(input.view.permute(&self.perm)?, input.storage.clone()))
    }

    fn vjp(&self, _parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        let mut inv = vec![0usize; self.perm.len()];
        for (i, &p) in self.perm.iter().enumerate() {
            inv[p] = i;
        }
        Ok(vec![Some(grad_output.permute(&inv)?)])
    }
}

#[derive(Debug)]
pub struct Transpose {
    pub i: usize,
    pub j: usize,
}

impl Op for Transpose {
    fn name(&self) -> &'static str {
        "transpose"
    }

    fn forward(&self, parents: &[TensorValue], _backend: &dyn Backend) -> AxResult<TensorValue> {
        let input = &parents[0];
        Ok(TensorValue::new(input.view.transpose(self.i, self.j)?, input.storage.clone()))
    }

    fn vjp(&self, _parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        Ok(vec![Some(grad_output.transpose(self.i, self.j)?)])
    }
}

#[derive(Debug)]
pub struct Squeeze {
    pub axes: Option<Vec<usize>>,
}

impl Op for Squeeze {
    fn name(&self) -> &'static str {
        "squeeze"
    }

    fn forward(&self, parents: &[TensorValue], _backend: &dyn Backend) -> AxResult<TensorValue> {
        let input = &parents[0];
        Ok(TensorValue::new(input.view.squeeze(self.axes.as_deref())?, input.storage.clone()))
    }

    fn vjp(&self, parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        let axes = match &self.axes {
            Some(a) => a.clone(),
            None => parents[0]
                .shape()
                .iter()
                .enumerate()
                .filter(|&(_, &s)| s == 1)
                .map(|(i, _)| i)
                .collect(),
        };
        Ok(vec![Some(grad_output.unsqueeze(&axes)?)])
    }
}

#[derive(Debug)]
pub struct Unsqueeze {
    pub axes: Vec<usize>,
}

impl Op for Unsqueeze {
    fn name(&self) -> &'static str {
        "unsqueeze"
    }

    fn forward(&self, parents: &[TensorValue], _backend: &dyn Backend) -> AxResult<TensorValue> {
        let input = &parents[0];
        Ok(TensorValue::new(input.view.unsqueeze(&self.axes)?, input.storage.clone()))
    }

    fn vjp(&self, _parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        Ok(vec![Some(grad_output.squeeze(Some(&self.axes))?)])
    }
}

#[derive(Debug)]
pub struct Flatten {
    pub start: usize,
    pub end: usize,
    pub input_shape: Vec<usize>,
}

impl Op for Flatten {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn forward(&self, parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        let input = &parents[0];
        match input.view.flatten(self.start, self.end) {
            Ok(view) => Ok(TensorValue::new(view, input.storage.clone())),
            Err(_) => {
                let dense = backend.copy_contiguous(input)?;
                let view = dense.view.flatten(self.start, self.end).map_err(|_| AxError::ShapeMismatch {
                    context: "flatten: realized copy is unexpectedly non-mergeable".into(),
                    expected: vec![],
                    found: vec![],
                })?;
                Ok(TensorValue::new(view, dense.storage))
            }
        }
    }

    fn vjp(&self, _parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        Ok(vec![Some(grad_output.reshape(&self.input_shape)?)])
    }
}

/// Zero-copy broadcast to a larger shape (§4.1), used by `reduce` VJPs to
/// expand a summed gradient back out over the axes it was reduced along.
#[derive(Debug)]
pub struct BroadcastTo {
    pub target_shape: Vec<usize>,
    pub input_shape: Vec<usize>,
}

impl Op for BroadcastTo {
    fn name(&self) -> &'static str {
        "broadcast_to"
    }

    fn forward(&self, parents: &[TensorValue], _backend: &dyn Backend) -> AxResult<TensorValue> {
        let input = &parents[0];
        Ok(TensorValue::new(input.view.broadcast_to(&self.target_shape)?, input.storage.clone()))
    }

    fn vjp(&self, _parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        let rank = self.target_shape.len();
        let pad = rank - self.input_shape.len();
        let mut axes: Vec<usize> = (0..pad).collect();
        for i in 0..self.input_shape.len() {
            if self.input_shape[i] == 1 && self.target_shape[pad + i] != 1 {
                axes.push(pad + i);
            }
        }
        let summed = if axes.is_empty() { grad_output.clone() } else { grad_output.sum_axes(&axes)? };
        Ok(vec![Some(summed.reshape(&self.input_shape)?)])
    }
}

#[derive(Debug)]
pub struct Slice {
    pub specs: Vec<SliceSpec>,
    pub input_shape: Vec<usize>,
}

impl Op for Slice {
    fn name(&self) -> &'static str {
        "slice"
    }

    fn forward(&self, parents: &[TensorValue], _backend: &dyn Backend) -> AxResult<TensorValue> {
        let input = &parents[0];
        Ok(TensorValue::new(slice_view(&input.view, &self.specs)?, input.storage.clone()))
    }

    fn vjp(&self, _parents: &[Array], _output: &Array, grad_output: &Array) -> AxResult<Vec<Option<Array>>> {
        Ok(vec![Some(grad_output.unslice(&self.specs, &self.input_shape)?)])
    }
}

/// Backward of `Slice`: scatters `g` into a zero tensor shaped like the
/// original input (§4.4: "scatter g into a zero tensor of input shape").
/// Built only from `upload`/`download` plus host-side index arithmetic, so
/// the narrow `Backend` capability set (§4.2) doesn't need a dedicated
/// scatter primitive.
#[derive(Debug)]
pub struct UnSlice {
    pub specs: Vec<SliceSpec>,
    pub input_shape: Vec<usize>,
}

impl Op for UnSlice {
    fn name(&self) -> &'static str {
        "unslice"
    }

    fn forward(&self, parents: &[TensorValue], backend: &dyn Backend) -> AxResult<TensorValue> {
        let g = &parents[0];
        let dtype = g.dtype();
        let width = dtype.byte_width();
        let g_bytes = backend.download(g)?;
        let target_numel: usize = self.input_shape.iter().product();
        let mut out_bytes = vec![0u8; target_numel * width];
        let target_strides = crate::shape::row_major_strides(&self.input_shape);
        let sliced_shape = g.shape().to_vec();

        for (flat, idx) in shape_indices(&sliced_shape).enumerate() {
            let mut target_idx = Vec::with_capacity(idx.len());
            for (axis, &i) in idx.iter().enumerate() {
                let spec = &self.specs[axis];
                let start = resolve_start(spec.start, self.input_shape[axis]);
                target_idx.push((start + i as isize * spec.step) as usize);
            }
            let target_flat: usize = target_idx
                .iter()
                .zip(target_strides.iter())
                .map(|(&i, &s)| i as isize * s)
                .sum::<isize>() as usize;
            let src = flat * width;
            let dst = target_flat * width;
            out_bytes[dst..dst + width].copy_from_slice(&g_bytes[src..src + width]);
        }

        backend.upload(&out_bytes, dtype, &self.input_shape)
    }
}

fn resolve_start(raw: isize, size: usize) -> isize {
    if raw < 0 {
        raw + size as isize
    } else {
        raw
    }
}

/// Row-major multi-indices over `shape`, matching the iteration order
/// `Backend::download` uses to pack bytes.
fn shape_indices(shape: &[usize]) -> impl Iterator<Item = Vec<usize>> + '_ {
    let total: usize = shape.iter().product();
    (0..total).map(move |mut flat| {
        let mut idx = vec![0usize; shape.len()];
        for axis in (0..shape.len()).rev() {
            idx[axis] = flat % shape[axis];
            flat /= shape[axis];
        }
        idx
    })
}
