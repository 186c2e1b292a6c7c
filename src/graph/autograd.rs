//! Reverse-mode gradient construction over the DAG (§4.6).

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::array::Array;
use crate::errors::AxResult;
use crate::graph::{eval, Graph};
use crate::types::NodeId;

/// `backward(root)`:
/// 1. realize the subgraph rooted at `root`.
/// 2. find `R`, the `requires_grad` nodes reachable from `root`.
/// 3. seed `g[root] = ones_like(root)`.
/// 4. walk `R` in descending-id (reverse topological) order, accumulating
///    each parent's gradient contribution (unbroadcast to that parent's
///    shape) as a new sum node — never mutating an existing one.
/// 5. attach every `g[v]` to `v`'s `grad` field. Calling this twice on the
///    same root *adds* to existing grads (§4.6); nothing here zeroes them.
#[tracing::instrument(level = "debug", skip(graph))]
pub fn backward(graph: &Rc<Graph>, root: NodeId) -> AxResult<()> {
    eval::eval(graph, root)?;

    let mut reachable = BTreeSet::new();
    collect_reachable(graph, root, &mut reachable);

    let root_array = Array::from_parts(graph.clone(), root);
    let seed = root_array.ones_like()?;

    let mut grads: HashMap<usize, Array> = HashMap::new();
    grads.insert(root.0, seed);

    for &idx in reachable.iter().rev() {
        let id = NodeId(idx);
        let node = graph.node(id);
        if !node.requires_grad {
            continue;
        }
        let Some(g) = grads.get(&idx).cloned() else {
            continue;
        };

        attach_grad(graph, id, &g)?;

        if node.parents.is_empty() {
            continue;
        }

        let parent_arrays: Vec<Array> = node.parents.iter().map(|&p| Array::from_parts(graph.clone(), p)).collect();
        let output_array = Array::from_parts(graph.clone(), id);
        let contributions = node.op.vjp(&parent_arrays, &output_array, &g)?;

        for (&parent_id, contrib) in node.parents.iter().zip(contributions) {
            let Some(contrib) = contrib else { continue };
            let parent_node = graph.node(parent_id);
            if !parent_node.requires_grad {
                continue;
            }
            let unbroadcast = unbroadcast_to(&contrib, parent_node.view.shape())?;
            let combined = match grads.remove(&parent_id.0) {
                Some(existing) => existing.add(&unbroadcast)?,
                None => unbroadcast,
            };
            grads.insert(parent_id.0, combined);
        }
    }

    Ok(())
}

fn attach_grad(graph: &Rc<Graph>, id: NodeId, g: &Array) -> AxResult<()> {
    let node = graph.node(id);
    let combined = match node.grad() {
        Some(existing_id) => Array::from_parts(graph.clone(), existing_id).add(g)?,
        None => g.clone(),
    };
    node.set_grad(combined.node_id());
    Ok(())
}

/// Sums `contrib` down to `target_shape` along axes where the forward pass
/// broadcast a size-1 (or missing) axis up to a larger one (§4.4
/// "unbroadcasting").
fn unbroadcast_to(contrib: &Array, target_shape: &[usize]) -> AxResult<Array> {
    let contrib_shape = contrib.shape().to_vec();
    if contrib_shape == target_shape {
        return Ok(contrib.clone());
    }
    let rank = contrib_shape.len();
    let target_rank = target_shape.len();
    let pad = rank - target_rank;

    let mut axes = Vec::new();
    axes.extend(0..pad);
    for i in 0..target_rank {
        if target_shape[i] == 1 && contrib_shape[pad + i] != 1 {
            axes.push(pad + i);
        }
    }

    let reduced = if axes.is_empty() { contrib.clone() } else { contrib.sum_axes(&axes)? };
    reduced.reshape(target_shape)
}

fn collect_reachable(graph: &Graph, id: NodeId, out: &mut BTreeSet<usize>) {
    if !out.insert(id.0) {
        return;
    }
    let node = graph.node(id);
    for &p in &node.parents {
        collect_reachable(graph, p, out);
    }
}
