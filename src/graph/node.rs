//! An operator instance wired into a `Graph`: the operator it owns, the
//! `Value`s it reads and writes, and advisory scheduler state.

use crate::ids::{NodeId, ValueId};
use crate::operator::Operator;

/// Advisory scheduling state for future/pluggable schedulers. Not
/// consulted by `Graph::execute` itself, which always runs the full
/// topological order; a scheduler built on top of this crate can use
/// these flags to track partial progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionFlags {
    pub ready: bool,
    pub scheduled: bool,
    pub executed: bool,
}

/// One operator instance in the graph, plus the `Value`s wired to its
/// inputs and outputs.
///
/// Owned exclusively by a `Graph`. The cross-links to `Value`s
/// (`producer`/`consumers`) are maintained by `Graph`'s wiring methods,
/// not by `Node` itself — see `Graph::set_node_inputs`/`set_node_outputs`,
/// which are the only places producer/consumer edges are mutated outside
/// of node removal.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    op: Option<Box<dyn Operator>>,
    inputs: Vec<ValueId>,
    outputs: Vec<ValueId>,
    topo_index: Option<usize>,
    flags: ExecutionFlags,
    debug_info: String,
}

impl Node {
    pub(crate) fn new(name: Option<String>, op: Option<Box<dyn Operator>>) -> Self {
        let id = NodeId::next();
        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ => format!("node_{}", id.as_u64()),
        };
        Node {
            id,
            name,
            op,
            inputs: Vec::new(),
            outputs: Vec::new(),
            topo_index: None,
            flags: ExecutionFlags::default(),
            debug_info: String::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op(&self) -> Option<&dyn Operator> {
        self.op.as_deref()
    }

    pub fn op_mut(&mut self) -> Option<&mut (dyn Operator + 'static)> {
        self.op.as_deref_mut()
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    /// Replace this node's recorded input list. Does not touch any
    /// `Value`'s consumer set — callers needing the full wiring semantics
    /// described in §4.9 use `Graph::set_node_inputs`.
    pub(crate) fn set_inputs_raw(&mut self, inputs: Vec<ValueId>) {
        self.inputs = inputs;
    }

    /// Replace this node's recorded output list. See
    /// `set_inputs_raw`'s note: no producer-link side effects here.
    pub(crate) fn set_outputs_raw(&mut self, outputs: Vec<ValueId>) {
        self.outputs = outputs;
    }

    pub fn topo_index(&self) -> Option<usize> {
        self.topo_index
    }

    pub(crate) fn set_topo_index(&mut self, index: Option<usize>) {
        self.topo_index = index;
    }

    pub fn flags(&self) -> ExecutionFlags {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut ExecutionFlags {
        &mut self.flags
    }

    pub fn reset_execution_state(&mut self) {
        self.flags = ExecutionFlags::default();
    }

    pub fn debug_info(&self) -> &str {
        &self.debug_info
    }

    pub fn set_debug_info(&mut self, info: impl Into<String>) {
        self.debug_info = info.into();
    }
}
