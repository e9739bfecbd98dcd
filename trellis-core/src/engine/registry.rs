//! Callback Registry
//!
//! Maps a node kind to the function that knows how to (re)compute nodes
//! of that kind. Nodes that are only ever written through
//! [`ClaimGraph::set_input_value`](crate::ClaimGraph::set_input_value)
//! never need a callback; pulling an uncomputed node of an unregistered
//! kind is the engine's one hard error.

use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::engine::context::EvaluationContext;
use crate::graph::NodeId;

/// The output of one evaluation: the cutoff summary and the full payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOutput<G, R> {
    /// Comparable summary used to decide whether dependents must change.
    pub green: G,
    /// Full value returned to consumers.
    pub red: R,
}

/// The function that computes nodes of one kind.
///
/// Callbacks receive the node being evaluated and an
/// [`EvaluationContext`] through which they pull dependencies (recording
/// edges as they go) and lazily introduce nodes discovered during
/// evaluation.
pub type EvaluateCallback<G, R> =
    Rc<dyn Fn(NodeId, &mut EvaluationContext<'_, G, R>) -> Result<EvalOutput<G, R>, GraphError>>;

/// Hard errors surfaced by the claim graph.
///
/// Cycles and non-convergence are deliberately not here: both are
/// ordinary return values ([`PullResult::Cycle`](crate::PullResult) and
/// [`Convergence`](crate::Convergence)). The only hard error is
/// programmer misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A stale or unevaluated node was pulled, but no callback is
    /// registered for its kind.
    #[error("no callback registered for kind `{kind}` while pulling `{node}`")]
    MissingCallback {
        /// The kind missing a registration.
        kind: String,
        /// The `"<kind>::<key>"` label of the node being pulled.
        node: String,
    },
}

/// Per-kind registry of evaluate callbacks.
pub struct CallbackRegistry<G, R> {
    callbacks: IndexMap<String, EvaluateCallback<G, R>>,
}

impl<G, R> CallbackRegistry<G, R> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            callbacks: IndexMap::new(),
        }
    }

    /// Bind `callback` to `kind`. The last registration for a kind wins.
    pub fn register(&mut self, kind: &str, callback: EvaluateCallback<G, R>) {
        self.callbacks.insert(kind.to_owned(), callback);
    }

    /// Look up the callback for `kind`.
    pub fn get(&self, kind: &str) -> Option<&EvaluateCallback<G, R>> {
        self.callbacks.get(kind)
    }
}

impl<G, R> Default for CallbackRegistry<G, R> {
    fn default() -> Self {
        Self::new()
    }
}
