//! Evaluation Context
//!
//! The evaluation context is how a callback interacts with the graph
//! while it runs. Every dependency read goes through the context so the
//! engine can attribute the read to the node being evaluated and record
//! the edge; the context also lets callbacks introduce nodes discovered
//! only during evaluation (e.g. a newly-seen file dependency).
//!
//! The context borrows the graph mutably for the duration of the
//! callback, so there is exactly one evaluation context alive per graph
//! at any stack depth. Nesting happens through recursion: a pull made
//! through the context may evaluate the dependency, which runs that
//! node's callback with its own context further down the call stack.

use crate::engine::registry::GraphError;
use crate::engine::runtime::ClaimGraph;
use crate::graph::{EdgeKind, NodeId};

/// The result of pulling a node.
///
/// A pull that would re-enter a node already being evaluated does not
/// recurse; it reports the cycle and leaves the caller to choose a
/// fallback (commonly a neutral seed on the first convergence pass).
/// This is a first-class value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullResult<G, R> {
    /// The node's output, served from cache or freshly computed.
    Value {
        /// Cutoff summary of the output.
        green: G,
        /// Full payload of the output.
        red: R,
    },

    /// The pull would revisit a node currently on the evaluation stack.
    Cycle {
        /// The node the pull tried to re-enter.
        forward_ref: NodeId,
    },
}

impl<G, R> PullResult<G, R> {
    /// The green value, or `None` for a forward reference.
    pub fn green(&self) -> Option<&G> {
        match self {
            Self::Value { green, .. } => Some(green),
            Self::Cycle { .. } => None,
        }
    }

    /// The red value, or `None` for a forward reference.
    pub fn red(&self) -> Option<&R> {
        match self {
            Self::Value { red, .. } => Some(red),
            Self::Cycle { .. } => None,
        }
    }

    /// Whether this pull hit a cycle.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle { .. })
    }

    /// The forward-referenced node, if this pull hit a cycle.
    pub fn forward_ref(&self) -> Option<NodeId> {
        match self {
            Self::Value { .. } => None,
            Self::Cycle { forward_ref } => Some(*forward_ref),
        }
    }

    /// Consume the result, yielding the output pair unless it was a
    /// forward reference.
    pub fn into_value(self) -> Option<(G, R)> {
        match self {
            Self::Value { green, red } => Some((green, red)),
            Self::Cycle { .. } => None,
        }
    }
}

/// Window through which a callback reads its dependencies.
pub struct EvaluationContext<'a, G, R> {
    graph: &'a mut ClaimGraph<G, R>,
    node: NodeId,
}

impl<'a, G, R> EvaluationContext<'a, G, R>
where
    G: Clone + PartialEq,
    R: Clone,
{
    pub(crate) fn new(graph: &'a mut ClaimGraph<G, R>, node: NodeId) -> Self {
        Self { graph, node }
    }

    /// The node this context is evaluating.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The kind of the node being evaluated.
    pub fn kind(&self) -> &str {
        self.graph.nodes().state(self.node).kind()
    }

    /// The key of the node being evaluated.
    pub fn key(&self) -> &str {
        self.graph.nodes().state(self.node).key()
    }

    /// Pull a dependency, recording a [`EdgeKind::Data`] edge from it to
    /// the node being evaluated.
    pub fn pull(&mut self, dep: NodeId) -> Result<PullResult<G, R>, GraphError> {
        self.pull_edge(dep, EdgeKind::Data)
    }

    /// Pull a dependency, recording an edge of the given kind.
    pub fn pull_edge(
        &mut self,
        dep: NodeId,
        kind: EdgeKind,
    ) -> Result<PullResult<G, R>, GraphError> {
        self.graph.pull_from(dep, kind, Some(self.node))
    }

    /// Intern a node discovered during evaluation.
    ///
    /// Creating a node records no edge; pull it afterwards to depend on
    /// it.
    pub fn create_node(&mut self, kind: &str, key: &str) -> NodeId {
        self.graph.create_node(kind, key)
    }
}
