//! Static memory-lifetime planning over a `Graph`: for each owned
//! `Value`, the span of topological indices across which it must stay
//! live, and the peak concurrently-live byte total across that span.

use std::collections::HashMap;

use crate::dtype::DType;
use crate::ids::ValueId;

use super::Graph;

/// One `Value`'s liveness window, expressed in topological-order indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLifetime {
    pub first_index: usize,
    pub last_index: usize,
    pub bytes: usize,
}

/// The output of `Graph::plan_memory`: one lifetime entry per owned
/// `Value`, and the high-water mark of concurrently-live bytes implied by
/// those lifetimes.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlan {
    pub peak_bytes: usize,
    pub lifetimes: HashMap<ValueId, ValueLifetime>,
}

/// Topo-sort the graph; for each value, derive `[first_index, last_index]`
/// from its producer's and consumers' topo positions (extended to the
/// last node if the value is a graph output); then sweep the timeline to
/// find the peak concurrently live byte total.
///
/// Returns an empty plan (`peak_bytes == 0`, no lifetimes) if the graph
/// does not fully topologically sort (i.e. contains a cycle).
pub fn plan_memory(graph: &mut Graph) -> MemoryPlan {
    let order = graph.topological_sort();
    if order.len() != graph.node_count() {
        return MemoryPlan::default();
    }
    let n = order.len();

    let mut lifetimes: HashMap<ValueId, ValueLifetime> = HashMap::with_capacity(graph.value_count());
    for (value_id, value) in graph.values_iter() {
        let first_index = match value.producer() {
            Some(node_id) => graph.node(node_id).and_then(|n| n.topo_index()).unwrap_or(0),
            None => 0,
        };
        let mut last_index = first_index;
        for &consumer in value.consumers() {
            if let Some(idx) = graph.node(consumer).and_then(|n| n.topo_index()) {
                last_index = last_index.max(idx);
            }
        }
        if n > 0 && graph.outputs().contains(&value_id) {
            last_index = last_index.max(n - 1);
        }
        let bytes = if value.dtype() == DType::Unknown {
            0
        } else {
            (value.shape().num_elements().max(0) as usize) * value.dtype().byte_size()
        };
        lifetimes.insert(value_id, ValueLifetime { first_index, last_index, bytes });
    }

    let mut peak_bytes = 0usize;
    for i in 0..n.max(1) {
        let live: usize = lifetimes
            .values()
            .filter(|lt| lt.first_index <= i && i <= lt.last_index)
            .map(|lt| lt.bytes)
            .sum();
        peak_bytes = peak_bytes.max(live);
    }

    MemoryPlan { peak_bytes, lifetimes }
}
