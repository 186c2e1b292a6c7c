//! Shape and stride algebra (§4.1). Every function here is pure: it
//! computes a new view descriptor from an existing one and never touches
//! storage. Ops that need a dense layout (reshape of a non-contiguous view,
//! flatten across non-mergeable axes) get a [`NotContiguous`] back and are
//! responsible for realizing a contiguous copy before retrying.

use crate::errors::{AxError, AxResult};

/// `(shape, strides, offset)` over a `Storage`. Addressing is
/// `offset + Σ i_k·stride_k`. Strides are in elements, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
}

/// Returned by operations that require a dense layout when the view is not
/// contiguous; the caller realizes a copy and retries.
pub struct NotContiguous;

pub fn row_major_strides(shape: &[usize]) -> Vec<isize> {
    let mut strides = vec![1isize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1] as isize;
    }
    strides
}

impl View {
    pub fn contiguous(shape: &[usize]) -> Self {
        Self {
            strides: row_major_strides(shape),
            shape: shape.to_vec(),
            offset: 0,
        }
    }

    pub fn from_parts(shape: Vec<usize>, strides: Vec<isize>, offset: usize) -> Self {
        debug_assert_eq!(shape.len(), strides.len());
        Self { shape, strides, offset }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_contiguous(&self) -> bool {
        self.strides == row_major_strides(&self.shape)
    }

    /// Element address for a multi-index, used by the CPU backend's naive
    /// strided reader.
    pub fn addr(&self, index: &[usize]) -> usize {
        let mut a = self.offset as isize;
        for (i, s) in index.iter().zip(self.strides.iter()) {
            a += *i as isize * s;
        }
        a as usize
    }

    pub fn reshape(&self, new_shape: &[usize]) -> Result<View, NotContiguous> {
        if !self.is_contiguous() {
            return Err(NotContiguous);
        }
        Ok(View::contiguous(new_shape))
    }

    pub fn permute(&self, perm: &[usize]) -> AxResult<View> {
        if perm.len() != self.rank() {
            return Err(AxError::ShapeMismatch {
                context: "permute: perm length must equal rank".into(),
                expected: vec![self.rank()],
                found: vec![perm.len()],
            });
        }
        let mut seen = vec![false; perm.len()];
        for &p in perm {
            if p >= perm.len() || seen[p] {
                return Err(AxError::ShapeMismatch {
                    context: "permute: perm is not a permutation of 0..rank".into(),
                    expected: (0..perm.len()).collect(),
                    found: perm.to_vec(),
                });
            }
            seen[p] = true;
        }
        let shape = perm.iter().map(|&p| self.shape[p]).collect();
        let strides = perm.iter().map(|&p| self.strides[p]).collect();
        Ok(View::from_parts(shape, strides, self.offset))
    }

    pub fn transpose(&self, i: usize, j: usize) -> AxResult<View> {
        let rank = self.rank();
        if i >= rank || j >= rank {
            return Err(AxError::AxisOutOfRange {
                axis: i.max(j) as isize,
                rank,
            });
        }
        let mut perm: Vec<usize> = (0..rank).collect();
        perm.swap(i, j);
        self.permute(&perm)
    }

    pub fn squeeze(&self, axes: Option<&[usize]>) -> AxResult<View> {
        let rank = self.rank();
        let target: Vec<usize> = match axes {
            Some(axes) => normalize_axes(&axes.iter().map(|&a| a as isize).collect::<Vec<_>>(), rank)?,
            None => (0..rank).filter(|&a| self.shape[a] == 1).collect(),
        };
        for &a in &target {
            if self.shape[a] != 1 {
                return Err(AxError::ShapeMismatch {
                    context: format!("squeeze: axis {a} has size {} (expected 1)", self.shape[a]),
                    expected: vec![1],
                    found: vec![self.shape[a]],
                });
            }
        }
        let mut shape = Vec::with_capacity(rank);
        let mut strides = Vec::with_capacity(rank);
        for a in 0..rank {
            if !target.contains(&a) {
                shape.push(self.shape[a]);
                strides.push(self.strides[a]);
            }
        }
        Ok(View::from_parts(shape, strides, self.offset))
    }

    pub fn unsqueeze(&self, axes: &[usize]) -> AxResult<View> {
        let new_rank = self.rank() + axes.len();
        let mut sorted = axes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != axes.len() || sorted.iter().any(|&a| a >= new_rank) {
            return Err(AxError::AxisOutOfRange {
                axis: *axes.iter().max().unwrap_or(&0) as isize,
                rank: new_rank,
            });
        }
        let mut shape = Vec::with_capacity(new_rank);
        let mut strides = Vec::with_capacity(new_rank);
        let mut src = 0;
        for a in 0..new_rank {
            if sorted.contains(&a) {
                shape.push(1);
                // stride of an inserted size-1 axis is irrelevant for
                // addressing; pick the stride that would result from a
                // contiguous insertion so the view stays well-formed.
                let s = if src < self.shape.len() { self.strides[src] } else { 1 };
                strides.push(s);
            } else {
                shape.push(self.shape[src]);
                strides.push(self.strides[src]);
                src += 1;
            }
        }
        Ok(View::from_parts(shape, strides, self.offset))
    }

    /// Collapses axes `[start, end)` into a single axis. Succeeds without a
    /// copy only if those axes are mergeable in place (`stride[k] ==
    /// stride[k+1] * shape[k+1]` across the range).
    pub fn flatten(&self, start: usize, end: usize) -> Result<View, NotContiguous> {
        assert!(start <= end && end <= self.rank());
        if start == end {
            return Ok(self.unsqueeze_mergeable(start));
        }
        for k in start..end - 1 {
            if self.strides[k] != self.strides[k + 1] * self.shape[k + 1] as isize {
                return Err(NotContiguous);
            }
        }
        let merged: usize = self.shape[start..end].iter().product();
        let merged_stride = self.strides[end - 1];
        let mut shape = self.shape[..start].to_vec();
        shape.push(merged);
        shape.extend_from_slice(&self.shape[end..]);
        let mut strides = self.strides[..start].to_vec();
        strides.push(merged_stride);
        strides.extend_from_slice(&self.strides[end..]);
        Ok(View::from_parts(shape, strides, self.offset))
    }

    fn unsqueeze_mergeable(&self, at: usize) -> View {
        self.unsqueeze(&[at]).expect("single-axis insert is always in range")
    }

    /// Right-aligned broadcast to `target_shape` (§4.1): prepended axes and
    /// existing size-1 axes get stride 0, a zero-copy expansion over the
    /// same storage.
    pub fn broadcast_to(&self, target_shape: &[usize]) -> AxResult<View> {
        let rank = target_shape.len();
        if rank < self.rank() {
            return Err(AxError::ShapeMismatch {
                context: "broadcast_to: target rank is smaller than source rank".into(),
                expected: self.shape.clone(),
                found: target_shape.to_vec(),
            });
        }
        let pad = rank - self.rank();
        let mut strides = vec![0isize; rank];
        for i in 0..self.rank() {
            let src_size = self.shape[i];
            let dst_size = target_shape[pad + i];
            if src_size == dst_size {
                strides[pad + i] = self.strides[i];
            } else if src_size == 1 {
                strides[pad + i] = 0;
            } else {
                return Err(AxError::ShapeMismatch {
                    context: format!("broadcast_to: axis {i} has size {src_size}, cannot broadcast to {dst_size}"),
                    expected: self.shape.clone(),
                    found: target_shape.to_vec(),
                });
            }
        }
        Ok(View::from_parts(target_shape.to_vec(), strides, self.offset))
    }
}

/// Right-aligned broadcast of two shapes (§4.1).
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> AxResult<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0usize; rank];
    for i in 0..rank {
        let pa = if a.len() + i >= rank { a[i + a.len() - rank] } else { 1 };
        let pb = if b.len() + i >= rank { b[i + b.len() - rank] } else { 1 };
        out[i] = match (pa, pb) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            (x, y) => {
                return Err(AxError::ShapeMismatch {
                    context: format!("cannot broadcast axis {i}: {x} vs {y}"),
                    expected: a.to_vec(),
                    found: b.to_vec(),
                })
            }
        };
    }
    Ok(out)
}

/// Negatives wrap mod rank; result sorted and deduplicated.
pub fn normalize_axes(axes: &[isize], rank: usize) -> AxResult<Vec<usize>> {
    let mut out = Vec::with_capacity(axes.len());
    for &a in axes {
        let norm = if a < 0 { a + rank as isize } else { a };
        if norm < 0 || norm as usize >= rank {
            return Err(AxError::AxisOutOfRange { axis: a, rank });
        }
        out.push(norm as usize);
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

/// A single axis's `(start, stop, step)` slice request.
#[derive(Debug, Clone, Copy)]
pub struct SliceSpec {
    pub start: isize,
    pub stop: isize,
    pub step: isize,
}

impl SliceSpec {
    pub fn full(size: usize) -> Self {
        Self { start: 0, stop: size as isize, step: 1 }
    }
}

fn resolve_index(raw: isize, size: usize) -> isize {
    if raw < 0 {
        raw + size as isize
    } else {
        raw
    }
}

pub fn slice_view(view: &View, specs: &[SliceSpec]) -> AxResult<View> {
    if specs.len() != view.rank() {
        return Err(AxError::ShapeMismatch {
            context: "slice: one spec required per axis".into(),
            expected: vec![view.rank()],
            found: vec![specs.len()],
        });
    }
    let mut shape = Vec::with_capacity(specs.len());
    let mut strides = Vec::with_capacity(specs.len());
    let mut offset = view.offset() as isize;

    for (axis, spec) in specs.iter().enumerate() {
        if spec.step == 0 {
            return Err(AxError::InvalidSlice { axis, reason: "step cannot be zero".into() });
        }
        let size = view.shape()[axis] as isize;
        let start = resolve_index(spec.start, view.shape()[axis]).clamp(
            if spec.step > 0 { 0 } else { -1 },
            if spec.step > 0 { size } else { size - 1 },
        );
        let stop = resolve_index(spec.stop, view.shape()[axis]).clamp(
            if spec.step > 0 { 0 } else { -1 },
            if spec.step > 0 { size } else { size - 1 },
        );
        let span = (stop - start) * spec.step.signum();
        let len = if span <= 0 { 0 } else { (span + spec.step.abs() - 1) / spec.step.abs() };

        shape.push(len as usize);
        strides.push(view.strides()[axis] * spec.step);
        offset += start * view.strides()[axis];
    }

    Ok(View::from_parts(shape, strides, offset as usize))
}
