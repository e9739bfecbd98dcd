//! Claim Graph Engine
//!
//! The claim graph is the central coordinator of incremental compilation:
//! a demand-driven dependency-tracking evaluator that any compiler phase
//! can plug into to get correct, minimal re-computation as inputs change.
//!
//! # How It Works
//!
//! 1. Producers seed leaf nodes with [`ClaimGraph::set_input_value`].
//!
//! 2. Consumers call [`ClaimGraph::pull`] on whatever node they need.
//!    A fresh node is served from cache; a stale or unevaluated node is
//!    computed by the callback registered for its kind, which pulls its
//!    own dependencies recursively through an
//!    [`EvaluationContext`]. Every dependency read records an edge, so
//!    after an evaluation the edges into a node are exactly the
//!    dependencies it read.
//!
//! 3. When a write or a re-evaluation produces a changed green value,
//!    the staleness propagator walks dependents transitively and flips
//!    them to stale. An unchanged green suppresses the walk entirely:
//!    this value-sensitive cutoff is what keeps re-computation minimal.
//!
//! 4. A pull that would re-enter a node already being evaluated returns
//!    a forward reference instead of recursing. Genuinely cyclic node
//!    sets are driven to a fixed point with [`ClaimGraph::converge`],
//!    which re-evaluates the set until the greens stabilize or a budget
//!    runs out.
//!
//! # Threading
//!
//! The graph is single-threaded and synchronous by contract: all state
//! is owned by the [`ClaimGraph`] value and mutated through `&mut self`,
//! and pull recursion is ordinary call-stack recursion. Callers that
//! need concurrency serialize access externally (one graph per worker,
//! or an outer lock).

use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::engine::context::{EvaluationContext, PullResult};
use crate::engine::registry::{CallbackRegistry, EvalOutput, EvaluateCallback, GraphError};
use crate::graph::{Edge, EdgeKind, EdgeStore, Freshness, NodeId, NodeState, NodeStore};

/// Budget used by [`ClaimGraph::converge`] when the caller does not
/// supply one.
pub const DEFAULT_CONVERGENCE_BUDGET: usize = 16;

/// Comparator deciding whether two green values count as "the same
/// answer" for cutoff purposes.
pub type EqualityFn<G> = Box<dyn Fn(&G, &G) -> bool>;

/// Observer invoked with the batch of nodes that turned stale in one
/// propagation pass.
type StaleHandler = Box<dyn FnMut(&[NodeId])>;

/// Construction options for a [`ClaimGraph`].
pub struct GraphOptions<G> {
    /// Implicit `max_iterations` for [`ClaimGraph::converge`].
    pub convergence_budget: usize,

    /// Custom green comparator. `None` uses `PartialEq`.
    pub equality: Option<EqualityFn<G>>,
}

impl<G> Default for GraphOptions<G> {
    fn default() -> Self {
        Self {
            convergence_budget: DEFAULT_CONVERGENCE_BUDGET,
            equality: None,
        }
    }
}

/// Outcome of driving a node set toward a fixed point.
///
/// Non-convergence is not an error: the last computed values stay in
/// place and the caller decides whether to accept them or surface a
/// diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Convergence {
    /// Whether the greens stabilized within the budget.
    pub converged: bool,
    /// Number of iterations actually run.
    pub iterations: usize,
}

/// The incremental claim graph.
///
/// # Type Parameters
///
/// - `G`: the green (cutoff) value type. Compared to decide whether
///   dependents need to change.
/// - `R`: the red (payload) value type returned to consumers.
///
/// # Example
///
/// ```
/// use trellis_core::{ClaimGraph, EvalOutput};
///
/// let mut graph: ClaimGraph<String, String> = ClaimGraph::new();
/// let file = graph.create_node("file", "greeting.html");
/// let upper = graph.create_node("upper", "greeting.html");
///
/// graph.register_callback("upper", move |_id, ctx| {
///     let source = ctx.pull(file)?;
///     let green = source.green().cloned().unwrap_or_default();
///     Ok(EvalOutput {
///         green: green.to_uppercase(),
///         red: String::new(),
///     })
/// });
///
/// graph.set_input_value(file, "hello".to_string(), "hello".to_string());
/// let result = graph.pull(upper)?;
/// assert_eq!(result.green().map(String::as_str), Some("HELLO"));
/// # Ok::<(), trellis_core::GraphError>(())
/// ```
pub struct ClaimGraph<G, R> {
    nodes: NodeStore<G, R>,
    edges: EdgeStore,
    registry: CallbackRegistry<G, R>,

    /// Nodes actively being evaluated on the current call chain, in
    /// push order. Membership here is what turns a recursive pull into
    /// a forward reference.
    active: Vec<NodeId>,

    options: GraphOptions<G>,
    stale_handlers: Vec<StaleHandler>,
}

impl<G, R> ClaimGraph<G, R>
where
    G: Clone + PartialEq,
    R: Clone,
{
    /// Create a graph with default options.
    pub fn new() -> Self {
        Self::with_options(GraphOptions::default())
    }

    /// Create a graph with the given options.
    pub fn with_options(options: GraphOptions<G>) -> Self {
        Self {
            nodes: NodeStore::new(),
            edges: EdgeStore::new(),
            registry: CallbackRegistry::new(),
            active: Vec::new(),
            options,
            stale_handlers: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Store surface
    // ------------------------------------------------------------------

    /// Intern the node for `(kind, key)`. Idempotent: the same pair
    /// always yields the same id.
    pub fn create_node(&mut self, kind: &str, key: &str) -> NodeId {
        self.nodes.create(kind, key)
    }

    /// Look up `(kind, key)` without allocating.
    pub fn find_node(&self, kind: &str, key: &str) -> Option<NodeId> {
        self.nodes.find(kind, key)
    }

    /// Get a node's state.
    pub fn get_node(&self, id: NodeId) -> Option<&NodeState<G, R>> {
        self.nodes.get(id)
    }

    /// The `"<kind>::<key>"` label of a node, for debugging and logging.
    pub fn node_label(&self, id: NodeId) -> Option<String> {
        self.nodes.get(id).map(NodeState::label)
    }

    /// Record that `to` depends on `from`. Idempotent on the full
    /// `(from, to, kind)` triple.
    ///
    /// Note that a later evaluation of `to` replaces its recorded
    /// dependencies, manually added edges included.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        self.edges.add(from, to, kind);
    }

    /// The edges leaving `from` (its dependents).
    pub fn edges_from(&self, from: NodeId) -> &[Edge] {
        self.edges.edges_from(from)
    }

    /// The edges entering `to` (the dependencies its last evaluation
    /// read).
    pub fn edges_to(&self, to: NodeId) -> &[Edge] {
        self.edges.edges_to(to)
    }

    /// Number of distinct `(kind, key)` pairs allocated.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of nodes currently stale.
    pub fn stale_count(&self) -> usize {
        self.nodes.stale_count()
    }

    pub(crate) fn nodes(&self) -> &NodeStore<G, R> {
        &self.nodes
    }

    // ------------------------------------------------------------------
    // Inputs and callbacks
    // ------------------------------------------------------------------

    /// Seed a node with a produced value, marking it fresh.
    ///
    /// The write is unconditional, but dependents are only invalidated
    /// when the green value actually changed under the graph's
    /// comparator. Re-seeding an identical summary (e.g. re-parsing
    /// unchanged content) causes no downstream work and no stale
    /// notification, even if the red payload differs.
    pub fn set_input_value(&mut self, id: NodeId, green: G, red: R) {
        let changed = match self.nodes.state(id).green() {
            Some(previous) => !self.green_equal(previous, &green),
            None => true,
        };

        self.nodes.state_mut(id).set_output(green, red);
        self.nodes.set_freshness(id, Freshness::Fresh);

        if changed {
            trace!(node = %self.nodes.state(id).label(), "input green changed");
            self.propagate_from(id);
        } else {
            trace!(node = %self.nodes.state(id).label(), "input cutoff");
        }
    }

    /// Bind the evaluate callback for a kind. The last registration for
    /// a kind wins; registering before the first pull of that kind is
    /// the caller's responsibility.
    pub fn register_callback<F>(&mut self, kind: &str, callback: F)
    where
        F: Fn(NodeId, &mut EvaluationContext<'_, G, R>) -> Result<EvalOutput<G, R>, GraphError>
            + 'static,
    {
        self.registry.register(kind, Rc::new(callback));
    }

    // ------------------------------------------------------------------
    // Pull engine
    // ------------------------------------------------------------------

    /// Demand a node's value, evaluating it if necessary.
    ///
    /// Fresh nodes are served from cache without invoking any callback.
    /// Stale or unevaluated nodes are computed by their kind's callback,
    /// which pulls its own dependencies through the
    /// [`EvaluationContext`]; a dependency is evaluated at most once per
    /// staleness epoch no matter how many times it is requested.
    ///
    /// # Errors
    ///
    /// [`GraphError::MissingCallback`] if the node needs computing and
    /// its kind has no registered callback.
    pub fn pull(&mut self, id: NodeId) -> Result<PullResult<G, R>, GraphError> {
        self.pull_from(id, EdgeKind::Data, None)
    }

    /// The pull algorithm. `dependent` is the node whose evaluation
    /// requested this pull, if any; that attribution is what records the
    /// dependency edge.
    pub(crate) fn pull_from(
        &mut self,
        id: NodeId,
        edge_kind: EdgeKind,
        dependent: Option<NodeId>,
    ) -> Result<PullResult<G, R>, GraphError> {
        // Re-entering a node already on the call chain would recurse
        // forever. Report the cycle; no state changes, no edge.
        if self.active.contains(&id) {
            trace!(node = %self.nodes.state(id).label(), "forward reference");
            return Ok(PullResult::Cycle { forward_ref: id });
        }

        // Attribute the read to the enclosing evaluation.
        if let Some(to) = dependent {
            self.edges.add(id, to, edge_kind);
        }

        // Memoization: a fresh node is served from cache.
        if self.nodes.state(id).freshness() == Freshness::Fresh {
            let state = self.nodes.state(id);
            if let (Some(green), Some(red)) = (state.green(), state.red()) {
                trace!(node = %state.label(), "cache hit");
                return Ok(PullResult::Value {
                    green: green.clone(),
                    red: red.clone(),
                });
            }
        }

        let kind = self.nodes.state(id).kind().to_owned();
        let Some(callback) = self.registry.get(&kind).cloned() else {
            return Err(GraphError::MissingCallback {
                kind,
                node: self.nodes.state(id).label(),
            });
        };

        debug!(node = %self.nodes.state(id).label(), "evaluating");
        self.evaluate(id, callback)
    }

    /// Run a node's callback and commit its output.
    fn evaluate(
        &mut self,
        id: NodeId,
        callback: EvaluateCallback<G, R>,
    ) -> Result<PullResult<G, R>, GraphError> {
        self.active.push(id);

        // The edges recorded by the previous evaluation no longer
        // describe anything; the pulls made by this run rebuild them.
        self.edges.clear_edges_to(id);

        let result = {
            let mut ctx = EvaluationContext::new(self, id);
            callback(id, &mut ctx)
        };

        self.active.pop();
        let output = result?;

        let changed = match self.nodes.state(id).green() {
            Some(previous) => !self.green_equal(previous, &output.green),
            None => true,
        };

        self.nodes
            .state_mut(id)
            .set_output(output.green.clone(), output.red.clone());
        self.nodes.set_freshness(id, Freshness::Fresh);

        // Cutoff applies to computed nodes exactly as to inputs: an
        // unchanged green leaves the downstream untouched.
        if changed {
            self.propagate_from(id);
        }

        Ok(PullResult::Value {
            green: output.green,
            red: output.red,
        })
    }

    // ------------------------------------------------------------------
    // Staleness propagation
    // ------------------------------------------------------------------

    /// Invalidate a node and, transitively, everything that depends on
    /// it. Marking is idempotent, so the walk terminates even when the
    /// edges form a cycle. Observers registered with
    /// [`ClaimGraph::on_stale`] see the batch of nodes that actually
    /// transitioned.
    pub fn mark_stale(&mut self, id: NodeId) {
        let mut batch = Vec::new();
        self.mark_stale_into(id, &mut batch);
        self.notify_stale(&batch);
    }

    /// Register an observer for staleness propagation passes. Handlers
    /// are invoked once per pass with the nodes that transitioned; a
    /// pass that marks nothing (cutoff) notifies nobody.
    pub fn on_stale<F>(&mut self, handler: F)
    where
        F: FnMut(&[NodeId]) + 'static,
    {
        self.stale_handlers.push(Box::new(handler));
    }

    /// Change-driven propagation: invalidate the dependents of a node
    /// whose green just changed, but not the node itself.
    fn propagate_from(&mut self, id: NodeId) {
        let mut batch = Vec::new();
        let dependents: SmallVec<[NodeId; 8]> =
            self.edges.edges_from(id).iter().map(|e| e.to).collect();
        for dependent in dependents {
            self.mark_stale_into(dependent, &mut batch);
        }
        if !batch.is_empty() {
            debug!(count = batch.len(), "staleness propagated");
        }
        self.notify_stale(&batch);
    }

    fn mark_stale_into(&mut self, id: NodeId, batch: &mut Vec<NodeId>) {
        // Already stale: stop. This is what bounds the walk on cycles.
        if self.nodes.state(id).freshness() == Freshness::Stale {
            return;
        }
        self.nodes.set_freshness(id, Freshness::Stale);
        batch.push(id);

        // Both data and completeness edges propagate identically; the
        // kind is descriptive metadata only.
        let dependents: SmallVec<[NodeId; 8]> =
            self.edges.edges_from(id).iter().map(|e| e.to).collect();
        for dependent in dependents {
            self.mark_stale_into(dependent, batch);
        }
    }

    fn notify_stale(&mut self, batch: &[NodeId]) {
        if batch.is_empty() {
            return;
        }
        // Handlers are detached while they run so they cannot alias the
        // registry; any handlers they register are merged back after.
        let mut handlers = std::mem::take(&mut self.stale_handlers);
        for handler in handlers.iter_mut() {
            handler(batch);
        }
        handlers.append(&mut self.stale_handlers);
        self.stale_handlers = handlers;
    }

    // ------------------------------------------------------------------
    // Convergence
    // ------------------------------------------------------------------

    /// Drive a (typically cyclic) node set to a fixed point.
    ///
    /// Each iteration marks every listed node stale and pulls it, then
    /// compares the resulting greens against the previous iteration's.
    /// The loop stops as soon as every green is unchanged, or after
    /// `max_iterations` passes (`None` uses the graph's
    /// `convergence_budget`).
    ///
    /// Within an iteration, forward references let callbacks substitute
    /// a neutral seed for a not-yet-computed member so the set makes
    /// monotonic progress across iterations.
    pub fn converge(
        &mut self,
        ids: &[NodeId],
        max_iterations: Option<usize>,
    ) -> Result<Convergence, GraphError> {
        let budget = max_iterations.unwrap_or(self.options.convergence_budget);
        let mut previous: Option<Vec<Option<G>>> = None;

        for iteration in 1..=budget {
            for &id in ids {
                self.mark_stale(id);
            }
            for &id in ids {
                self.pull(id)?;
            }

            let greens: Vec<Option<G>> = ids
                .iter()
                .map(|&id| self.nodes.state(id).green().cloned())
                .collect();
            debug!(iteration, "convergence pass");

            if let Some(previous) = &previous {
                let stable =
                    previous
                        .iter()
                        .zip(&greens)
                        .all(|(before, after)| match (before, after) {
                            (Some(a), Some(b)) => self.green_equal(a, b),
                            (None, None) => true,
                            _ => false,
                        });
                if stable {
                    debug!(iterations = iteration, "converged");
                    return Ok(Convergence {
                        converged: true,
                        iterations: iteration,
                    });
                }
            }
            previous = Some(greens);
        }

        debug!(iterations = budget, "convergence budget exhausted");
        Ok(Convergence {
            converged: false,
            iterations: budget,
        })
    }

    fn green_equal(&self, a: &G, b: &G) -> bool {
        match &self.options.equality {
            Some(equality) => equality(a, b),
            None => a == b,
        }
    }
}

impl<G, R> Default for ClaimGraph<G, R>
where
    G: Clone + PartialEq,
    R: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
