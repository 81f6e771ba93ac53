//! The dataflow graph IR: `Value`s (typed tensor handles), `Node`s
//! (operator instances wired to `Value`s), and the `Graph` that owns both
//! and drives topological scheduling, structural validation, memory
//! planning and execution.

pub mod memory_planner;
pub mod node;

use std::collections::{HashMap, VecDeque};

use tracing::{trace, warn};

use crate::attribute::AttributeMap;
use crate::dtype::DType;
use crate::error::{GPError, GPResult};
use crate::ids::{NodeId, ValueId};
use crate::operator::Operator;
use crate::quant::QuantizationParams;
use crate::shape::Shape;
use crate::tensor::Tensor;
use crate::value::Value;

pub use memory_planner::{MemoryPlan, ValueLifetime};
pub use node::{ExecutionFlags, Node};

/// A user-provided graph transformation. `apply_pass` runs it to
/// completion; the pass is responsible for leaving the graph in a state
/// that `validate()` accepts, if it needs to be executed afterwards.
pub trait GraphPass {
    fn run(&mut self, graph: &mut Graph) -> GPResult<()>;
}

impl<F> GraphPass for F
where
    F: FnMut(&mut Graph) -> GPResult<()>,
{
    fn run(&mut self, graph: &mut Graph) -> GPResult<()> {
        self(graph)
    }
}

/// The dataflow graph. Owns every `Value` and `Node`; all cross-references
/// between them are by id, which is what lets both be stored in the same
/// container without a borrow cycle.
#[derive(Debug)]
pub struct Graph {
    values: HashMap<ValueId, Value>,
    nodes: HashMap<NodeId, Node>,
    inputs: Vec<ValueId>,
    outputs: Vec<ValueId>,
    model_name: String,
    model_version: String,
    attributes: AttributeMap,
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            values: HashMap::new(),
            nodes: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            model_name: String::new(),
            model_version: String::new(),
            attributes: AttributeMap::new(),
        }
    }

    // -- Value/Node minting and lookup ----------------------------------

    pub fn create_value(
        &mut self,
        shape: Shape,
        dtype: DType,
        quant_params: Option<QuantizationParams>,
        name: Option<String>,
    ) -> ValueId {
        let name = name.unwrap_or_default();
        let value = Value::new(shape, dtype, quant_params, name);
        let id = value.id();
        self.values.insert(id, value);
        id
    }

    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(&id)
    }

    pub fn value_mut(&mut self, id: ValueId) -> Option<&mut Value> {
        self.values.get_mut(&id)
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn values_iter(&self) -> impl Iterator<Item = (ValueId, &Value)> {
        self.values.iter().map(|(&id, v)| (id, v))
    }

    pub fn add_node(&mut self, op: Option<Box<dyn Operator>>, name: Option<String>) -> NodeId {
        let node = Node::new(name, op);
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes_iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(&id, n)| (id, n))
    }

    /// Detaches every edge touching `id` (consumer links on its inputs,
    /// producer links on its outputs it produces), then erases the node.
    pub fn remove_node(&mut self, id: NodeId) -> GPResult<()> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| GPError::runtime(format!("remove_node: no such node {id}")))?;
        let inputs = node.inputs().to_vec();
        let outputs = node.outputs().to_vec();

        for input in inputs {
            if let Some(v) = self.values.get_mut(&input) {
                v.remove_consumer(id);
            }
        }
        for output in outputs {
            if let Some(v) = self.values.get_mut(&output) {
                if v.producer() == Some(id) {
                    v.set_producer(None);
                }
            }
        }
        self.nodes.remove(&id);
        Ok(())
    }

    // -- Wiring -----------------------------------------------------------

    /// §4.9: for each old input, remove self from its consumer set;
    /// replace; for each new input add self as consumer.
    pub fn set_node_inputs(&mut self, node_id: NodeId, new_inputs: Vec<ValueId>) -> GPResult<()> {
        for &v in &new_inputs {
            if !self.values.contains_key(&v) {
                return Err(GPError::runtime(format!(
                    "set_node_inputs: value {v} is not owned by this graph"
                )));
            }
        }
        let old_inputs = {
            let node = self
                .nodes
                .get(&node_id)
                .ok_or_else(|| GPError::runtime(format!("set_node_inputs: no such node {node_id}")))?;
            node.inputs().to_vec()
        };
        for old in old_inputs {
            if let Some(v) = self.values.get_mut(&old) {
                v.remove_consumer(node_id);
            }
        }
        for &new in &new_inputs {
            if let Some(v) = self.values.get_mut(&new) {
                v.add_consumer(node_id);
            }
        }
        self.nodes.get_mut(&node_id).unwrap().set_inputs_raw(new_inputs);
        Ok(())
    }

    /// §4.9: for each old output with `producer == self`, clear producer;
    /// replace; set producer on each new output.
    pub fn set_node_outputs(&mut self, node_id: NodeId, new_outputs: Vec<ValueId>) -> GPResult<()> {
        for &v in &new_outputs {
            if !self.values.contains_key(&v) {
                return Err(GPError::runtime(format!(
                    "set_node_outputs: value {v} is not owned by this graph"
                )));
            }
        }
        let old_outputs = {
            let node = self
                .nodes
                .get(&node_id)
                .ok_or_else(|| GPError::runtime(format!("set_node_outputs: no such node {node_id}")))?;
            node.outputs().to_vec()
        };
        for old in old_outputs {
            if let Some(v) = self.values.get_mut(&old) {
                if v.producer() == Some(node_id) {
                    v.set_producer(None);
                }
            }
        }
        for &new in &new_outputs {
            if let Some(v) = self.values.get_mut(&new) {
                v.set_producer(Some(node_id));
            }
        }
        self.nodes.get_mut(&node_id).unwrap().set_outputs_raw(new_outputs);
        Ok(())
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    pub fn set_inputs(&mut self, inputs: Vec<ValueId>) {
        self.inputs = inputs;
    }

    pub fn set_outputs(&mut self, outputs: Vec<ValueId>) {
        self.outputs = outputs;
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn set_model_name(&mut self, name: impl Into<String>) {
        self.model_name = name.into();
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn set_model_version(&mut self, version: impl Into<String>) {
        self.model_version = version.into();
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }

    // -- Scheduling ---------------------------------------------------------

    /// Kahn's algorithm. In-degree for node N counts N's input Values
    /// whose producer is non-null (not deduplicated: an input Value
    /// appearing twice, or two input Values sharing a producer, each
    /// contribute to the count independently, matching how they're
    /// decremented below). On full coverage every node gets its topo
    /// index recorded; on a cycle, indices are cleared and the partial
    /// order (covering only the acyclic prefix) is returned.
    pub fn topological_sort(&mut self) -> Vec<NodeId> {
        for node in self.nodes.values_mut() {
            node.set_topo_index(None);
        }

        let mut in_degree: HashMap<NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        for (&id, node) in self.nodes.iter() {
            let degree = node
                .inputs()
                .iter()
                .filter(|v| self.values.get(v).and_then(|v| v.producer()).is_some())
                .count();
            in_degree.insert(id, degree);
        }

        let mut queue: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let outputs = self.nodes.get(&id).map(|n| n.outputs().to_vec()).unwrap_or_default();
            for output in outputs {
                let consumers = self
                    .values
                    .get(&output)
                    .map(|v| v.consumers().to_vec())
                    .unwrap_or_default();
                for consumer in consumers {
                    if let Some(degree) = in_degree.get_mut(&consumer) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(consumer);
                        }
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            for (index, &id) in order.iter().enumerate() {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.set_topo_index(Some(index));
                }
            }
        } else {
            warn!(
                covered = order.len(),
                total = self.nodes.len(),
                "topological_sort: graph contains a cycle"
            );
        }

        order
    }

    /// §4.10(a-f): every structural invariant the graph must hold before
    /// `execute()` is allowed to run.
    pub fn validate(&mut self) -> GPResult<()> {
        for (&node_id, node) in self.nodes.iter() {
            if let Some(op) = node.op() {
                op.validate()?;
            }
            for &input in node.inputs() {
                let value = self
                    .values
                    .get(&input)
                    .ok_or_else(|| GPError::runtime(format!("validate: node {node_id} input {input} not owned by this graph")))?;
                if !value.consumers().contains(&node_id) {
                    return Err(GPError::runtime(format!(
                        "validate: value {input} does not list node {node_id} as a consumer"
                    )));
                }
            }
            for &output in node.outputs() {
                let value = self
                    .values
                    .get(&output)
                    .ok_or_else(|| GPError::runtime(format!("validate: node {node_id} output {output} not owned by this graph")))?;
                if value.producer() != Some(node_id) {
                    return Err(GPError::runtime(format!(
                        "validate: value {output} producer does not match node {node_id}"
                    )));
                }
            }
        }

        for &input in &self.inputs {
            if !self.values.contains_key(&input) {
                return Err(GPError::runtime(format!("validate: graph input {input} not owned by this graph")));
            }
        }
        for &output in &self.outputs {
            if !self.values.contains_key(&output) {
                return Err(GPError::runtime(format!("validate: graph output {output} not owned by this graph")));
            }
        }

        let order = self.topological_sort();
        if order.len() != self.nodes.len() {
            return Err(GPError::runtime(format!(
                "validate: graph contains a cycle ({} of {} nodes ordered)",
                order.len(),
                self.nodes.len()
            )));
        }

        Ok(())
    }

    pub fn plan_memory(&mut self) -> MemoryPlan {
        memory_planner::plan_memory(self)
    }

    /// §4.10: if no nodes, return the input unchanged. If exactly one
    /// graph input, bind a shallow view of the caller's tensor to it.
    /// Re-validates on every call (the implementation does not track a
    /// "dirty" bit). Runs every node in topological order, gathering each
    /// node's bound input tensors, handing them to the operator, and
    /// binding the returned tensors onto the node's output Values. If
    /// exactly one graph output is bound, returns a shallow copy of its
    /// tensor; otherwise returns the caller's input tensor back.
    #[tracing::instrument(skip(self, input_tensor), fields(nodes = self.nodes.len()))]
    pub fn execute(&mut self, input_tensor: Tensor) -> GPResult<Tensor> {
        if self.nodes.is_empty() {
            return Ok(input_tensor);
        }

        if self.inputs.len() == 1 {
            let value_id = self.inputs[0];
            let value = self
                .values
                .get_mut(&value_id)
                .ok_or_else(|| GPError::runtime(format!("execute: graph input {value_id} not owned by this graph")))?;
            value.set_tensor(input_tensor.shallow_copy());
        }

        self.validate()?;
        let order = self.topological_sort();
        if order.len() != self.nodes.len() {
            return Err(GPError::runtime("execute: graph contains a cycle"));
        }

        for node_id in order {
            let inputs = self.nodes.get(&node_id).map(|n| n.inputs().to_vec()).unwrap_or_default();
            let mut input_tensors = Vec::with_capacity(inputs.len());
            for input_id in &inputs {
                let value = self
                    .values
                    .get(input_id)
                    .ok_or_else(|| GPError::runtime(format!("execute: input {input_id} not owned by this graph")))?;
                let tensor = value.tensor().ok_or_else(|| {
                    GPError::runtime(format!("execute: value {input_id} has no bound tensor"))
                })?;
                if tensor.shape() != value.shape() || tensor.dtype() != value.dtype() {
                    return Err(GPError::runtime(format!(
                        "execute: bound tensor for value {input_id} does not match its declared shape/dtype"
                    )));
                }
                input_tensors.push(tensor.shallow_copy());
            }
            let input_refs: Vec<&Tensor> = input_tensors.iter().collect();

            let outputs = {
                let node = self
                    .nodes
                    .get_mut(&node_id)
                    .ok_or_else(|| GPError::runtime(format!("execute: no such node {node_id}")))?;
                let op = node
                    .op_mut()
                    .ok_or_else(|| GPError::runtime(format!("execute: node {node_id} has no operator")))?;
                trace!(node = %node_id, op = op.type_tag(), "executing node");
                op.execute(&input_refs)?
            };

            let output_ids = self.nodes.get(&node_id).map(|n| n.outputs().to_vec()).unwrap_or_default();
            if outputs.len() != output_ids.len() {
                return Err(GPError::runtime(format!(
                    "execute: node {node_id} operator produced {} outputs, expected {}",
                    outputs.len(),
                    output_ids.len()
                )));
            }
            for (output_id, tensor) in output_ids.into_iter().zip(outputs) {
                if let Some(value) = self.values.get_mut(&output_id) {
                    value.set_tensor(tensor);
                }
            }
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.flags_mut().executed = true;
            }
        }

        if self.outputs.len() == 1 {
            let value = self
                .values
                .get(&self.outputs[0])
                .ok_or_else(|| GPError::runtime("execute: graph output not owned by this graph"))?;
            if let Some(tensor) = value.tensor() {
                return Ok(tensor.shallow_copy());
            }
        }

        Ok(input_tensor)
    }

    /// Runs a user-provided transformation to completion. Validity is the
    /// pass's own responsibility; this does not re-validate afterwards.
    pub fn apply_pass<P: GraphPass>(&mut self, mut pass: P) -> GPResult<()> {
        pass.run(self)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    #[derive(Debug, Clone)]
    struct Identity;
    impl Operator for Identity {
        fn type_tag(&self) -> &str {
            "Identity"
        }
        fn execute(&mut self, inputs: &[&Tensor]) -> GPResult<Vec<Tensor>> {
            Ok(vec![inputs[0].shallow_copy()])
        }
        fn clone_box(&self) -> Box<dyn Operator> {
            Box::new(self.clone())
        }
    }

    fn linear_chain() -> (Graph, ValueId, ValueId, ValueId, NodeId, NodeId) {
        let mut g = Graph::new();
        let x = g.create_value(Shape::from_dims([2, 3, 4]), DType::F32, None, Some("x".into()));
        let y = g.create_value(Shape::from_dims([2, 3, 4]), DType::F32, None, Some("y".into()));
        let z = g.create_value(Shape::from_dims([2, 3, 4]), DType::F32, None, Some("z".into()));
        let n1 = g.add_node(Some(Box::new(Identity)), Some("n1".into()));
        let n2 = g.add_node(Some(Box::new(Identity)), Some("n2".into()));
        g.set_node_inputs(n1, vec![x]).unwrap();
        g.set_node_outputs(n1, vec![y]).unwrap();
        g.set_node_inputs(n2, vec![y]).unwrap();
        g.set_node_outputs(n2, vec![z]).unwrap();
        g.set_inputs(vec![x]);
        g.set_outputs(vec![z]);
        (g, x, y, z, n1, n2)
    }

    #[test]
    fn scenario_d_topological_sort_orders_linear_chain() {
        let (mut g, ..) = linear_chain();
        let (n1, n2) = {
            let order = g.topological_sort();
            (order[0], order[1])
        };
        assert_ne!(n1, n2);
        assert_eq!(g.node(n1).unwrap().topo_index(), Some(0));
        assert_eq!(g.node(n2).unwrap().topo_index(), Some(1));
    }

    #[test]
    fn scenario_e_cycle_detection_fails_validate_and_partial_sort() {
        let mut g = Graph::new();
        let a = g.create_value(Shape::from_dims([2, 2]), DType::F32, None, None);
        let b = g.create_value(Shape::from_dims([2, 2]), DType::F32, None, None);
        let n1 = g.add_node(Some(Box::new(Identity)), None);
        let n2 = g.add_node(Some(Box::new(Identity)), None);
        g.set_node_inputs(n1, vec![b]).unwrap();
        g.set_node_outputs(n1, vec![a]).unwrap();
        g.set_node_inputs(n2, vec![a]).unwrap();
        g.set_node_outputs(n2, vec![b]).unwrap();

        assert!(g.validate().is_err());
        let order = g.topological_sort();
        assert!(order.len() < 2);
    }

    #[test]
    fn remove_node_detaches_consumer_and_producer_edges() {
        let (mut g, x, y, _z, n1, _n2) = linear_chain();
        g.remove_node(n1).unwrap();
        assert!(g.node(n1).is_none());
        assert!(!g.value(x).unwrap().consumers().contains(&n1));
        assert_eq!(g.value(y).unwrap().producer(), None);
    }

    #[test]
    fn execute_with_no_nodes_returns_input_unchanged() {
        let mut g = Graph::new();
        let t = Tensor::new(Shape::from_dims([2, 2]), DType::F32, None).unwrap();
        let out = g.execute(t).unwrap();
        assert_eq!(out.shape(), &Shape::from_dims([2, 2]));
    }

    #[test]
    fn execute_runs_linear_chain_and_returns_final_output() {
        let (mut g, ..) = linear_chain();
        let t = Tensor::new(Shape::from_dims([2, 3, 4]), DType::F32, None).unwrap();
        let out = g.execute(t).unwrap();
        assert_eq!(out.shape(), &Shape::from_dims([2, 3, 4]));
        assert_eq!(out.dtype(), DType::F32);
    }

    #[test]
    fn set_node_inputs_updates_consumer_sets_on_both_sides() {
        let mut g = Graph::new();
        let a = g.create_value(Shape::from_dims([1]), DType::F32, None, None);
        let b = g.create_value(Shape::from_dims([1]), DType::F32, None, None);
        let n = g.add_node(Some(Box::new(Identity)), None);
        g.set_node_inputs(n, vec![a]).unwrap();
        assert!(g.value(a).unwrap().consumers().contains(&n));
        g.set_node_inputs(n, vec![b]).unwrap();
        assert!(!g.value(a).unwrap().consumers().contains(&n));
        assert!(g.value(b).unwrap().consumers().contains(&n));
    }

    #[test]
    fn set_node_outputs_updates_producer_links() {
        let mut g = Graph::new();
        let a = g.create_value(Shape::from_dims([1]), DType::F32, None, None);
        let b = g.create_value(Shape::from_dims([1]), DType::F32, None, None);
        let n = g.add_node(Some(Box::new(Identity)), None);
        g.set_node_outputs(n, vec![a]).unwrap();
        assert_eq!(g.value(a).unwrap().producer(), Some(n));
        g.set_node_outputs(n, vec![b]).unwrap();
        assert_eq!(g.value(a).unwrap().producer(), None);
        assert_eq!(g.value(b).unwrap().producer(), Some(n));
    }

    #[test]
    fn apply_pass_runs_a_closure_over_the_graph() {
        let mut g = Graph::new();
        g.apply_pass(|graph: &mut Graph| {
            graph.set_model_name("renamed");
            Ok(())
        })
        .unwrap();
        assert_eq!(g.model_name(), "renamed");
    }
}
