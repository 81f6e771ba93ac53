//! The operator capability set: the one polymorphic boundary concrete ops
//! (MatMul, ReLU, Softmax, ...) plug into from outside this crate.
//!
//! Per the design notes, inheritance is replaced with a small trait-object
//! capability set — `validate`, `execute`, `clone`, `estimate_memory_bytes`
//! — rather than modeling an operator as also owning its own copy of the
//! graph wiring (`Node` already owns that in `inputs`/`outputs`). An
//! operator only ever sees the `Tensor`s bound to those `Value`s, handed to
//! it by `Graph::execute`.

use std::fmt;

use crate::attribute::AttributeMap;
use crate::error::{GPError, GPResult};
use crate::tensor::Tensor;

/// Implemented by every concrete operator kernel. Kernels themselves
/// (MatMul, ReLU, Softmax, ...) are deliberately out of this crate's
/// scope; this trait is the contract they're built against.
pub trait Operator: fmt::Debug + Send {
    /// A short, non-empty identifier for the operator kind (e.g.
    /// `"MatMul"`), fixed at construction.
    fn type_tag(&self) -> &str;

    /// Operator-specific configuration (kernel size, padding mode, ...),
    /// if any.
    fn attributes(&self) -> Option<&AttributeMap> {
        None
    }

    /// Structural self-check, independent of any runtime tensor binding
    /// (those preconditions belong to `execute`, and are enforced by
    /// `Graph::execute` before this is ever called). The default rejects
    /// an empty `type_tag`; concrete operators override this to add
    /// attribute/config constraints specific to their semantics.
    ///
    /// This trait deliberately has no I/O wiring of its own (see the
    /// module doc: `Node` owns `inputs`/`outputs` so an `Operator` never
    /// holds a `ValueId`), so the "no null I/O reference" half of this
    /// invariant is not checkable from here — there is no reference on
    /// this type that could be null. It is instead enforced one layer up,
    /// by `Graph::validate`, which confirms every input/output `ValueId`
    /// wired to a `Node` is owned by the graph and that the producer/
    /// consumer edges agree before any `Operator::validate` is called.
    /// An operator built and validated standalone, outside a `Graph`,
    /// therefore only gets the `type_tag` half of the check; it has no
    /// I/O wiring yet for the other half to apply to.
    fn validate(&self) -> GPResult<()> {
        if self.type_tag().is_empty() {
            return Err(GPError::invalid_argument(
                "Operator::validate: type_tag must not be empty",
            ));
        }
        Ok(())
    }

    /// Compute outputs from inputs. Preconditions (enforced by the
    /// caller, normally `Graph::execute`): every input tensor's shape and
    /// dtype match the declared `Value` metadata it's bound to.
    fn execute(&mut self, inputs: &[&Tensor]) -> GPResult<Vec<Tensor>>;

    /// A boxed clone of this operator, used when a `Node` is duplicated
    /// (e.g. by a graph-rewriting pass).
    fn clone_box(&self) -> Box<dyn Operator>;

    /// A rough upper bound on the bytes this operator allocates per call,
    /// used by memory-budget-aware passes. Zero is a valid (if
    /// uninformative) answer.
    fn estimate_memory_bytes(&self) -> usize {
        0
    }
}

impl Clone for Box<dyn Operator> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
