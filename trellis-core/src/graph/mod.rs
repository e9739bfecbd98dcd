//! Graph Storage
//!
//! This module holds the structural half of the claim graph: node
//! identity and state, and the directed dependency edges between nodes.
//!
//! # Design Decisions
//!
//! 1. Node ids are dense arena indices with a side interning table,
//!    rather than reference-linked node objects. This sidesteps
//!    ownership cycles entirely and makes stack-membership checks and
//!    adjacency lookups cheap.
//!
//! 2. Edges are stored in both directions so staleness propagation
//!    (walk dependents) and edge re-capture (discard a node's recorded
//!    dependencies) are both direct reads.
//!
//! 3. The stores know nothing about evaluation. Callbacks, pulling, and
//!    staleness semantics live in [`crate::engine`].

mod edge;
mod node;

pub use edge::{Edge, EdgeKind, EdgeStore};
pub use node::{Freshness, NodeId, NodeState, NodeStore};
