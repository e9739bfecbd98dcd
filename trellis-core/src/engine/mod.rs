//! Evaluation Engine
//!
//! This module implements the behavioral half of the claim graph: the
//! callback registry, the demand-driven pull engine with cycle
//! detection, staleness propagation with observers, and the convergence
//! driver for genuinely cyclic node sets.
//!
//! # Concepts
//!
//! ## Pulling
//!
//! A pull is a demand: "give me this node's value, computing it if you
//! must". Fresh nodes answer from cache. Stale or unevaluated nodes run
//! the callback registered for their kind, inside a context that records
//! every dependency read as an edge.
//!
//! ## Cutoff
//!
//! Every node's output is split into a green value (a comparable
//! summary) and a red value (the full payload). Staleness only
//! propagates when the green changes; recomputing to the same summary
//! stops invalidation at that node.
//!
//! ## Forward references
//!
//! Pulling a node that is already being evaluated on the current call
//! chain returns a forward reference instead of recursing. Cyclic
//! groups are resolved by [`ClaimGraph::converge`], which iterates the
//! group until its greens stop changing or a budget runs out.

mod context;
mod registry;
mod runtime;

pub use context::{EvaluationContext, PullResult};
pub use registry::{CallbackRegistry, EvalOutput, EvaluateCallback, GraphError};
pub use runtime::{
    ClaimGraph, Convergence, EqualityFn, GraphOptions, DEFAULT_CONVERGENCE_BUDGET,
};
