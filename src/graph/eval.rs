//! Topological materialization of a node and its ancestors (§4.5).

use std::collections::BTreeSet;

use crate::backend::TensorValue;
use crate::errors::{AxError, AxResult};
use crate::graph::Graph;
use crate::types::NodeId;

/// Materializes `target`'s Storage and every not-yet-realized ancestor.
/// Idempotent: re-calling on an already-realized node is a no-op.
#[tracing::instrument(level = "debug", skip(graph))]
pub fn eval(graph: &Graph, target: NodeId) -> AxResult<()> {
    graph.check_active()?;
    if graph.node(target).is_realized() {
        return Ok(());
    }

    let mut needed = BTreeSet::new();
    collect_unrealized_ancestors(graph, target, &mut needed);

    // `needed` is a `BTreeSet<usize>` over node ids; ascending order equals
    // topological order since parent ids are always strictly less than
    // their child's (§4.3).
    for idx in needed {
        let node = graph.node(NodeId(idx));
        if node.is_realized() {
            continue;
        }
        let parent_values = node
            .parents
            .iter()
            .map(|&p| {
                let parent = graph.node(p);
                parent
                    .storage()
                    .map(|storage| TensorValue::new(parent.view.clone(), storage))
                    .ok_or_else(|| AxError::NotRealized(format!("%{}", p.0)))
            })
            .collect::<AxResult<Vec<_>>>()?;

        tracing::debug!(op = node.op.name(), id = idx, "realizing node");
        let result = node.op.forward(&parent_values, graph.backend())?;
        node.set_storage(result.storage);
    }
    Ok(())
}

fn collect_unrealized_ancestors(graph: &Graph, id: NodeId, out: &mut BTreeSet<usize>) {
    if !out.insert(id.0) {
        return;
    }
    let node = graph.node(id);
    if node.is_realized() {
        return;
    }
    for &p in &node.parents {
        collect_unrealized_ancestors(graph, p, out);
    }
}
