//! A symbolic tensor handle: shape/dtype metadata plus the producer and
//! consumer edges that wire it into a `Graph`.

use crate::dtype::DType;
use crate::ids::{NodeId, ValueId};
use crate::quant::QuantizationParams;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// A node in the dataflow graph's type system: metadata for one tensor
/// that flows between operators, plus the `execute()`-scoped binding to an
/// actual `Tensor`.
///
/// Owned exclusively by a `Graph`; `producer`/`consumers` reference
/// `Node`s by id rather than by borrow, which is what lets `Graph` hold
/// both `Value`s and `Node`s without a reference cycle.
#[derive(Debug)]
pub struct Value {
    id: ValueId,
    shape: Shape,
    dtype: DType,
    quant_params: Option<QuantizationParams>,
    name: String,
    producer: Option<NodeId>,
    consumers: Vec<NodeId>,
    bound_tensor: Option<Tensor>,
}

impl Value {
    pub(crate) fn new(shape: Shape, dtype: DType, quant_params: Option<QuantizationParams>, name: String) -> Self {
        Value {
            id: ValueId::next(),
            shape,
            dtype,
            quant_params,
            name,
            producer: None,
            consumers: Vec::new(),
            bound_tensor: None,
        }
    }

    pub fn id(&self) -> ValueId {
        self.id
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn quant_params(&self) -> Option<&QuantizationParams> {
        self.quant_params.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn producer(&self) -> Option<NodeId> {
        self.producer
    }

    /// Overwrites the producer link. Callers are responsible for
    /// maintaining the inverse link on the previous producer (this is
    /// `Graph`'s job, not `Value`'s — see `Graph::set_node_outputs`).
    pub fn set_producer(&mut self, producer: Option<NodeId>) {
        self.producer = producer;
    }

    pub fn consumers(&self) -> &[NodeId] {
        &self.consumers
    }

    /// Idempotent insertion preserving insertion order (set semantics: a
    /// `NodeId` already present is not duplicated).
    pub fn add_consumer(&mut self, consumer: NodeId) {
        if !self.consumers.contains(&consumer) {
            self.consumers.push(consumer);
        }
    }

    /// Removes every occurrence of `consumer` (in practice at most one,
    /// given `add_consumer`'s idempotence, but this doesn't assume it).
    pub fn remove_consumer(&mut self, consumer: NodeId) {
        self.consumers.retain(|&c| c != consumer);
    }

    pub fn tensor(&self) -> Option<&Tensor> {
        self.bound_tensor.as_ref()
    }

    /// Bind a runtime tensor to this value. Non-owning in spirit: the
    /// bound `Tensor` is typically itself a shallow view, and the binding
    /// is only meant to live across one `execute()` call.
    pub fn set_tensor(&mut self, tensor: Tensor) {
        self.bound_tensor = Some(tensor);
    }

    pub fn clear_tensor(&mut self) {
        self.bound_tensor = None;
    }
}
