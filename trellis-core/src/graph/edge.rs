//! Dependency Edges
//!
//! Directed, kind-tagged edges between nodes. An edge `(from, to)` means
//! `to` depends on `from`: when `from` changes, `to` may need to
//! recompute.
//!
//! Edges are stored in both directions as adjacency lists keyed by the
//! dense node index, so "who depends on this node" and "what does this
//! node depend on" are both O(degree) reads. Edge identity is the full
//! `(from, to, kind)` triple; re-adding an existing triple is a no-op.

use smallvec::SmallVec;

use super::node::NodeId;

/// Descriptive tag on a dependency edge.
///
/// The kind is metadata for consumers (e.g. distinguishing a value read
/// from a "did the full set converge" read); it does not change how
/// staleness propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EdgeKind {
    /// The dependent read the node's value.
    #[default]
    Data,

    /// The dependent relied on the node set being complete.
    Completeness,
}

/// A directed dependency: `to` depends on `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// The node being depended on.
    pub from: NodeId,
    /// The dependent node.
    pub to: NodeId,
    /// Descriptive tag for consumers.
    pub kind: EdgeKind,
}

/// Adjacency list storage. Most nodes have a handful of edges, so the
/// lists stay inline until they grow past four entries.
type EdgeList = SmallVec<[Edge; 4]>;

/// Ensures `lists` has an entry at `idx`, filling with empty lists.
#[inline]
fn grow(lists: &mut Vec<EdgeList>, idx: usize) {
    if idx >= lists.len() {
        lists.resize_with(idx + 1, EdgeList::new);
    }
}

/// Bidirectional edge storage for the claim graph.
#[derive(Debug, Default)]
pub struct EdgeStore {
    /// `forward[from.index()]` holds the edges leaving `from`, i.e. the
    /// edges whose dependents must be revisited when `from` changes.
    forward: Vec<EdgeList>,

    /// `reverse[to.index()]` holds the edges entering `to`, i.e. the
    /// dependencies `to` read during its most recent evaluation.
    reverse: Vec<EdgeList>,

    /// Total number of distinct edges, an O(1) read.
    count: usize,
}

impl EdgeStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge, deduplicated on the full triple.
    ///
    /// Returns `true` if the edge was newly added.
    pub fn add(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> bool {
        let edge = Edge { from, to, kind };

        grow(&mut self.forward, from.index());
        if self.forward[from.index()].contains(&edge) {
            return false;
        }
        self.forward[from.index()].push(edge);

        grow(&mut self.reverse, to.index());
        self.reverse[to.index()].push(edge);

        self.count += 1;
        true
    }

    /// The edges leaving `from` (its dependents).
    pub fn edges_from(&self, from: NodeId) -> &[Edge] {
        self.forward
            .get(from.index())
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// The edges entering `to` (its dependencies).
    pub fn edges_to(&self, to: NodeId) -> &[Edge] {
        self.reverse
            .get(to.index())
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// Discard every edge entering `to`.
    ///
    /// Called before re-evaluating `to` so the edges recorded afterwards
    /// reflect exactly the dependencies the new evaluation reads. Edges
    /// leaving `to` are untouched.
    pub fn clear_edges_to(&mut self, to: NodeId) {
        let Some(entering) = self.reverse.get_mut(to.index()) else {
            return;
        };
        let entering = std::mem::take(entering);

        for edge in &entering {
            if let Some(leaving) = self.forward.get_mut(edge.from.index()) {
                if let Some(pos) = leaving.iter().position(|e| e == edge) {
                    leaving.swap_remove(pos);
                }
            }
        }
        self.count -= entering.len();
    }

    /// Total number of edges.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the store holds no edges.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: usize) -> NodeId {
        NodeId::from_index(index)
    }

    #[test]
    fn add_and_query_both_directions() {
        let mut store = EdgeStore::new();

        store.add(id(0), id(1), EdgeKind::Data);
        store.add(id(0), id(2), EdgeKind::Data);

        let from = store.edges_from(id(0));
        assert_eq!(from.len(), 2);
        assert!(from.iter().any(|e| e.to == id(1)));
        assert!(from.iter().any(|e| e.to == id(2)));

        let to = store.edges_to(id(1));
        assert_eq!(to.len(), 1);
        assert_eq!(to[0].from, id(0));
    }

    #[test]
    fn duplicate_triples_are_not_stored() {
        let mut store = EdgeStore::new();

        assert!(store.add(id(0), id(1), EdgeKind::Data));
        assert!(!store.add(id(0), id(1), EdgeKind::Data));

        assert_eq!(store.len(), 1);
        assert_eq!(store.edges_from(id(0)).len(), 1);
        assert_eq!(store.edges_to(id(1)).len(), 1);
    }

    #[test]
    fn edge_kind_is_part_of_identity() {
        let mut store = EdgeStore::new();

        assert!(store.add(id(0), id(1), EdgeKind::Data));
        assert!(store.add(id(0), id(1), EdgeKind::Completeness));

        assert_eq!(store.len(), 2);
    }

    #[test]
    fn clear_edges_to_removes_both_directions() {
        let mut store = EdgeStore::new();

        store.add(id(0), id(2), EdgeKind::Data);
        store.add(id(1), id(2), EdgeKind::Data);
        store.add(id(2), id(3), EdgeKind::Data);

        store.clear_edges_to(id(2));

        assert!(store.edges_to(id(2)).is_empty());
        assert!(store.edges_from(id(0)).is_empty());
        assert!(store.edges_from(id(1)).is_empty());
        // The edge leaving node 2 survives.
        assert_eq!(store.edges_from(id(2)).len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn queries_on_untouched_ids_are_empty() {
        let store = EdgeStore::new();

        assert!(store.edges_from(id(7)).is_empty());
        assert!(store.edges_to(id(7)).is_empty());
    }
}
