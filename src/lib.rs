//! The in-memory runtime foundation of a neural-network inference engine:
//! a typed tensor/view layer, a dataflow graph IR, and an arena plus
//! pluggable allocator layer beneath both.
//!
//! This crate does not compute gradients, infer dynamic shapes beyond
//! broadcast, mutate a graph during execution, or know anything about
//! GPUs or distributed execution. It supplies the structures a kernel
//! library and a graph-building frontend (an ONNX loader, say) plug into.

pub mod alloc;
pub mod arena;
pub mod attribute;
pub mod buffer;
pub mod dtype;
pub mod error;
pub mod graph;
pub mod ids;
pub mod operator;
pub mod quant;
pub mod shape;
pub mod tensor;
pub mod value;

pub use alloc::{Allocator, AllocatorStats, ArenaAllocator, SystemAllocator};
pub use arena::{Arena, ArenaStats};
pub use attribute::{AttributeMap, AttributeValue};
pub use dtype::DType;
pub use error::{GPError, GPResult};
pub use graph::{ExecutionFlags, Graph, GraphPass, MemoryPlan, Node, ValueLifetime};
pub use ids::{NodeId, ValueId};
pub use operator::Operator;
pub use quant::QuantizationParams;
pub use shape::Shape;
pub use tensor::Tensor;
pub use value::Value;
