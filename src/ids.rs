//! Stable, process-wide identifiers for graph-owned objects.
//!
//! `Value`s and `Node`s are looked up by these ids rather than by Rust
//! reference, which is what lets `Graph` be the sole owner of both while
//! `Node`s and `Value`s hold non-owning cross-references to each other
//! (see §9 of the design notes: resolving the Graph/Node/Value reference
//! cycle by routing every cross-reference through a stable id instead of
//! a borrow).

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VALUE_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Uniquely identifies a `Value` for the lifetime of the process (ids are
/// never reused, even across different `Graph`s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u64);

impl ValueId {
    pub(crate) fn next() -> Self {
        ValueId(NEXT_VALUE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Uniquely identifies a `Node` for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}
