use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the reference node, pinned at 0 V.
pub const GROUND: &str = "0";

/// A point of common potential, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Node(String);

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn ground() -> Self {
        Self(GROUND.to_string())
    }

    pub fn is_ground(&self) -> bool {
        self.0 == GROUND
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Node {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Node {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Insertion-ordered mapping from non-ground nodes to unknown indices.
///
/// Index `i` is the row/column of the node voltage unknown in the Jacobian.
/// Ground never gets an index.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeMap {
    indices: HashMap<Node, usize>,
    names: Vec<Node>,
}

impl NodeMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Return the index of `node`, allocating the next one on first reference.
    pub(crate) fn insert(&mut self, node: &Node) -> Option<usize> {
        if node.is_ground() {
            return None;
        }
        if let Some(&index) = self.indices.get(node) {
            return Some(index);
        }
        let index = self.names.len();
        self.indices.insert(node.clone(), index);
        self.names.push(node.clone());
        Some(index)
    }

    /// `None` for ground and for nodes the circuit never referenced.
    pub(crate) fn index(&self, node: &str) -> Option<usize> {
        self.indices.get(&Node::new(node)).copied()
    }

    pub(crate) fn contains(&self, node: &str) -> bool {
        node == GROUND || self.indices.contains_key(&Node::new(node))
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn names(&self) -> &[Node] {
        &self.names
    }
}

/// Voltage of `plus` relative to `minus`, with `None` standing for ground.
pub(crate) fn voltage_diff(voltages: &[f64], plus: Option<usize>, minus: Option<usize>) -> f64 {
    match (plus, minus) {
        (Some(plus), Some(minus)) => voltages[plus] - voltages[minus],
        (Some(plus), None) => voltages[plus],
        (None, Some(minus)) => -voltages[minus],
        (None, None) => 0.0,
    }
}
