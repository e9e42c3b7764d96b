//! Directed acyclic graph used to order build targets.
//!
//! The graph stores arbitrary node data and keeps both edge directions so that
//! callers can walk from a node to what it needs (its dependencies) or to what
//! needs it (its dependents). Edges point from a dependency to its dependent:
//! `add_edge(a, b, ..)` means `a` must finish before `b` starts.
//!
//! # Features
//!
//! - Cycle rejection at edge insertion, reporting the existing path that the
//!   new edge would close
//! - Deterministic topological sorting using Kahn's algorithm (ties are broken
//!   by insertion order)
//! - Breadth-first dependency closure of a seed set
//! - Optional serde support
//!
//! # Example
//!
//! ```
//! use restamp_graph::DAG;
//!
//! let mut dag = DAG::<&str>::new();
//!
//! let lib = dag.add_node("build-lib");
//! let app = dag.add_node("build-app");
//! let test = dag.add_node("test-app");
//!
//! dag.add_edge(lib, app, ()).unwrap(); // app depends on lib
//! dag.add_edge(app, test, ()).unwrap(); // test depends on app
//!
//! assert_eq!(dag.topological_sort().unwrap(), vec![lib, app, test]);
//! assert!(dag.closure([app]).contains(&lib));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, VecDeque};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Node identifier in the DAG.
///
/// Identifiers are dense and ordered by insertion, so sorting by `NodeId`
/// reproduces declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in insertion order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Error types for DAG operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The edge `from -> to` was rejected because `to` already reaches `from`.
    ///
    /// `path` is that existing path, starting at `to` and ending at `from`.
    #[error("Adding edge {from} -> {to} would create a cycle")]
    WouldCycle {
        /// Source of the rejected edge
        from: NodeId,
        /// Target of the rejected edge
        to: NodeId,
        /// Existing path from `to` back to `from`
        path: Vec<NodeId>,
    },

    /// The graph contains a cycle; lists the nodes that could not be ordered
    #[error("Cycle detected in graph, {} nodes cannot be ordered", .0.len())]
    CycleDetected(Vec<NodeId>),

    /// Node not found
    #[error("Node {0} not found in graph")]
    NodeNotFound(NodeId),
}

/// Result type for DAG operations.
pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Node<N> {
    data: N,
    // Nodes this one must precede, in edge insertion order
    outgoing: Vec<NodeId>,
    // Nodes that must precede this one, in edge insertion order
    incoming: Vec<NodeId>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct Edge<E> {
    from: NodeId,
    to: NodeId,
    data: E,
}

/// Generic directed acyclic graph (DAG).
///
/// - O(1) node lookup
/// - O(V + E) edge insertion (reachability check)
/// - O((V + E) log V) topological sort
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DAG<N, E = ()> {
    nodes: Vec<Node<N>>,
    edges: Vec<Edge<E>>,
}

impl<N, E> Default for DAG<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, E> DAG<N, E> {
    /// Create a new empty DAG.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Add a node to the graph and return its ID.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        id
    }

    /// Add a directed edge from `from` to `to` with associated data.
    ///
    /// The edge represents precedence: `from` must be processed before `to`.
    /// If task B depends on task A, call `add_edge(A, B, ...)`.
    ///
    /// Returns `Ok(false)` when the edge already exists; the duplicate is not
    /// recorded.
    ///
    /// # Errors
    ///
    /// - `GraphError::NodeNotFound` if either node doesn't exist
    /// - `GraphError::WouldCycle` if adding the edge would create a cycle
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, data: E) -> GraphResult<bool> {
        self.check(from)?;
        self.check(to)?;

        if self.nodes[from.0].outgoing.contains(&to) {
            return Ok(false);
        }

        if let Some(path) = self.path(to, from) {
            return Err(GraphError::WouldCycle { from, to, path });
        }

        self.edges.push(Edge { from, to, data });
        self.nodes[from.0].outgoing.push(to);
        self.nodes[to.0].incoming.push(from);

        Ok(true)
    }

    fn check(&self, id: NodeId) -> GraphResult<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::NodeNotFound(id))
        }
    }

    /// Shortest path from `start` to `end` following edge direction.
    ///
    /// A node trivially reaches itself, so `path(a, a)` is `Some(vec![a])`.
    #[must_use]
    pub fn path(&self, start: NodeId, end: NodeId) -> Option<Vec<NodeId>> {
        if start.0 >= self.nodes.len() || end.0 >= self.nodes.len() {
            return None;
        }

        let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
        let mut visited = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if current == end {
                let mut path = vec![end];
                let mut cursor = end;
                while let Some(&prev) = parent.get(&cursor) {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }

            for &next in &self.nodes[current.0].outgoing {
                if visited.insert(next) {
                    let _ = parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        None
    }

    /// Get a reference to a node's data.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn node(&self, id: NodeId) -> GraphResult<&N> {
        self.nodes
            .get(id.0)
            .map(|node| &node.data)
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Get a mutable reference to a node's data.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut N> {
        self.nodes
            .get_mut(id.0)
            .map(|node| &mut node.data)
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// All node IDs in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Get the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterate over edges as `(from, to, data)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, &E)> {
        self.edges.iter().map(|edge| (edge.from, edge.to, &edge.data))
    }

    /// Direct dependencies (incoming edges) of a node, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn dependencies(&self, id: NodeId) -> GraphResult<&[NodeId]> {
        self.nodes
            .get(id.0)
            .map(|node| node.incoming.as_slice())
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Direct dependents (outgoing edges) of a node, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if the node doesn't exist.
    pub fn dependents(&self, id: NodeId) -> GraphResult<&[NodeId]> {
        self.nodes
            .get(id.0)
            .map(|node| node.outgoing.as_slice())
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Perform topological sort using Kahn's algorithm.
    ///
    /// Returns nodes in dependency order (dependencies before dependents).
    /// Whenever several nodes are ready the earliest inserted one is emitted
    /// first, so the result is stable across runs.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::CycleDetected` if the graph contains a cycle.
    pub fn topological_sort(&self) -> GraphResult<Vec<NodeId>> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.incoming.len()).collect();

        let mut ready: BinaryHeap<Reverse<NodeId>> = self
            .node_ids()
            .filter(|id| in_degree[id.0] == 0)
            .map(Reverse)
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(Reverse(node_id)) = ready.pop() {
            result.push(node_id);

            for &next in &self.nodes[node_id.0].outgoing {
                in_degree[next.0] -= 1;
                if in_degree[next.0] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if result.len() == self.nodes.len() {
            Ok(result)
        } else {
            let stuck = self.node_ids().filter(|id| in_degree[id.0] > 0).collect();
            Err(GraphError::CycleDetected(stuck))
        }
    }

    /// The seeds plus everything they transitively depend on.
    ///
    /// Breadth-first over incoming edges; every node is visited at most once,
    /// so repeated seeds and shared dependencies cost nothing extra. Unknown
    /// seeds are ignored.
    pub fn closure(&self, seeds: impl IntoIterator<Item = NodeId>) -> BTreeSet<NodeId> {
        let mut known = BTreeSet::new();
        let mut frontier = VecDeque::new();

        for seed in seeds {
            if seed.0 < self.nodes.len() && known.insert(seed) {
                frontier.push_back(seed);
            }
        }

        while let Some(current) = frontier.pop_front() {
            for &dep in &self.nodes[current.0].incoming {
                if known.insert(dep) {
                    frontier.push_back(dep);
                }
            }
        }

        known
    }
}
