//! Graph Nodes
//!
//! This module defines the node identity and state storage for the claim
//! graph.
//!
//! # Identity
//!
//! A node is identified by its `(kind, key)` pair: the kind selects which
//! callback knows how to compute it, the key names the instance (a file
//! path, an evaluation unit, a resource name). Allocation is structural
//! interning, not a counter: asking the store for the same `(kind, key)`
//! twice always returns the same [`NodeId`].
//!
//! Ids are dense arena indices, so state lookup is a plain `Vec` access
//! and membership checks on the active-evaluation stack stay cheap. The
//! human-readable `"<kind>::<key>"` form is available as a label for
//! diagnostics; it is not the id representation.

use indexmap::IndexMap;

/// Unique identifier for a node in the claim graph.
///
/// Ids are allocated by [`NodeStore::create`] and are only meaningful for
/// the graph that allocated them. Handing an id from one graph to another
/// is a programmer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Get the dense arena index of this id.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Cache state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The node has never been written or successfully evaluated.
    /// This is the only state a node cannot return to.
    Unevaluated,

    /// The memoized output is valid and can be served without recomputing.
    Fresh,

    /// The memoized output is invalid; the next pull must recompute.
    Stale,
}

/// One unit of cached computation.
///
/// # Type Parameters
///
/// - `G`: the green value, a comparable summary of the node's output used
///   to decide whether dependents need to change.
/// - `R`: the red value, the full payload a consumer wants. It may carry
///   detail (diagnostics, identity) that does not affect dependents.
#[derive(Debug)]
pub struct NodeState<G, R> {
    /// Kind tag selecting the evaluate callback for this node.
    kind: String,

    /// Instance name within the kind.
    key: String,

    /// Current cache state.
    freshness: Freshness,

    /// Cutoff summary of the last output, if any.
    green: Option<G>,

    /// Full payload of the last output, if any.
    red: Option<R>,
}

impl<G, R> NodeState<G, R> {
    fn new(kind: &str, key: &str) -> Self {
        Self {
            kind: kind.to_owned(),
            key: key.to_owned(),
            freshness: Freshness::Unevaluated,
            green: None,
            red: None,
        }
    }

    /// Get the node's kind tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Get the node's key within its kind.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the current cache state.
    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    /// Get the cutoff summary of the last output, if any.
    pub fn green(&self) -> Option<&G> {
        self.green.as_ref()
    }

    /// Get the full payload of the last output, if any.
    pub fn red(&self) -> Option<&R> {
        self.red.as_ref()
    }

    /// The `"<kind>::<key>"` form of the node's identity, for logs and
    /// error messages.
    pub fn label(&self) -> String {
        format!("{}::{}", self.kind, self.key)
    }

    pub(crate) fn set_output(&mut self, green: G, red: R) {
        self.green = Some(green);
        self.red = Some(red);
    }
}

/// Interning key for the `(kind, key)` pair.
#[derive(Debug, PartialEq, Eq, Hash)]
struct NodeKey {
    kind: String,
    key: String,
}

// Lets the store look nodes up by borrowed strings without allocating.
// Hashing must agree with NodeKey's derived Hash: both hash the kind
// string then the key string.
impl indexmap::Equivalent<NodeKey> for (&str, &str) {
    fn equivalent(&self, other: &NodeKey) -> bool {
        self.0 == other.kind && self.1 == other.key
    }
}

/// Arena of node state with structural interning over `(kind, key)`.
#[derive(Debug)]
pub struct NodeStore<G, R> {
    /// Node state, indexed by [`NodeId::index`].
    nodes: Vec<NodeState<G, R>>,

    /// Interning table mapping `(kind, key)` to the allocated id.
    index: IndexMap<NodeKey, NodeId>,

    /// Number of nodes currently `Stale`, maintained on every freshness
    /// transition so the counter is an O(1) read.
    stale: usize,
}

impl<G, R> NodeStore<G, R> {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: IndexMap::new(),
            stale: 0,
        }
    }

    /// Allocate the node for `(kind, key)`, or return the existing id.
    pub fn create(&mut self, kind: &str, key: &str) -> NodeId {
        if let Some(&id) = self.index.get(&(kind, key)) {
            return id;
        }

        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(NodeState::new(kind, key));
        self.index.insert(
            NodeKey {
                kind: kind.to_owned(),
                key: key.to_owned(),
            },
            id,
        );
        id
    }

    /// Look up the id for `(kind, key)` without allocating.
    pub fn find(&self, kind: &str, key: &str) -> Option<NodeId> {
        self.index.get(&(kind, key)).copied()
    }

    /// Get a node's state, or `None` for an id this store never allocated.
    pub fn get(&self, id: NodeId) -> Option<&NodeState<G, R>> {
        self.nodes.get(id.index())
    }

    /// Get a node's state, assuming the id came from this store.
    pub(crate) fn state(&self, id: NodeId) -> &NodeState<G, R> {
        &self.nodes[id.index()]
    }

    /// Get a node's state mutably, assuming the id came from this store.
    pub(crate) fn state_mut(&mut self, id: NodeId) -> &mut NodeState<G, R> {
        &mut self.nodes[id.index()]
    }

    /// Transition a node's freshness, keeping the stale counter current.
    pub(crate) fn set_freshness(&mut self, id: NodeId, freshness: Freshness) {
        let state = &mut self.nodes[id.index()];
        match (state.freshness, freshness) {
            (Freshness::Stale, Freshness::Stale) => {}
            (Freshness::Stale, _) => self.stale -= 1,
            (_, Freshness::Stale) => self.stale += 1,
            _ => {}
        }
        state.freshness = freshness;
    }

    /// Number of distinct `(kind, key)` pairs allocated.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes currently stale.
    pub fn stale_count(&self) -> usize {
        self.stale
    }
}

impl<G, R> Default for NodeStore<G, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut store: NodeStore<String, String> = NodeStore::new();

        let a = store.create("file", "index.html");
        let b = store.create("file", "index.html");
        let c = store.create("file", "other.html");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn kind_and_key_are_both_part_of_identity() {
        let mut store: NodeStore<String, String> = NodeStore::new();

        let file = store.create("file", "x");
        let eval = store.create("eval", "x");

        assert_ne!(file, eval);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn find_does_not_allocate() {
        let mut store: NodeStore<String, String> = NodeStore::new();

        assert!(store.find("file", "index.html").is_none());
        let id = store.create("file", "index.html");
        assert_eq!(store.find("file", "index.html"), Some(id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn nodes_start_unevaluated() {
        let mut store: NodeStore<String, String> = NodeStore::new();
        let id = store.create("file", "index.html");

        let state = store.get(id).unwrap();
        assert_eq!(state.freshness(), Freshness::Unevaluated);
        assert!(state.green().is_none());
        assert!(state.red().is_none());
    }

    #[test]
    fn label_combines_kind_and_key() {
        let mut store: NodeStore<String, String> = NodeStore::new();
        let id = store.create("eval", "b");

        assert_eq!(store.get(id).unwrap().label(), "eval::b");
    }

    #[test]
    fn freshness_transitions_maintain_stale_count() {
        let mut store: NodeStore<String, String> = NodeStore::new();
        let a = store.create("file", "a");
        let b = store.create("file", "b");

        assert_eq!(store.stale_count(), 0);

        store.set_freshness(a, Freshness::Stale);
        store.set_freshness(b, Freshness::Stale);
        assert_eq!(store.stale_count(), 2);

        // Re-marking a stale node must not double count.
        store.set_freshness(a, Freshness::Stale);
        assert_eq!(store.stale_count(), 2);

        store.set_freshness(a, Freshness::Fresh);
        assert_eq!(store.stale_count(), 1);

        store.set_freshness(b, Freshness::Fresh);
        assert_eq!(store.stale_count(), 0);
    }
}
