use std::fmt;
use std::sync::Arc;

use crate::branch::Branch;
use crate::nodes::Node;

/// One branch of a connected component, with the nodes it touches.
#[derive(Debug, Clone)]
pub struct Connection {
    pub head: Node,
    pub tail: Node,
    /// `(plus, minus)` pairs defining the local voltage vector, in order.
    pub senses: Vec<(Node, Node)>,
    pub branch: Arc<dyn Branch>,
}

impl Connection {
    /// A branch whose only control voltage is the one across itself.
    pub fn across(head: &Node, tail: &Node, branch: Arc<dyn Branch>) -> Self {
        Self {
            head: head.clone(),
            tail: tail.clone(),
            senses: vec![(head.clone(), tail.clone())],
            branch,
        }
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = &Node> {
        [&self.head, &self.tail]
            .into_iter()
            .chain(self.senses.iter().flat_map(|(p, m)| [p, m]))
    }
}

/// A device that owns one or more branches.
pub trait Component: fmt::Debug + Send + Sync {
    /// Short device family name, e.g. `"bjt"`.
    fn kind(&self) -> &'static str;

    /// Terminal names, in the order `connect` expects its nodes.
    fn terminals(&self) -> &'static [&'static str];

    /// Bind the device to concrete nodes, one per terminal.
    ///
    /// Every node named by a returned connection must be one of `nodes`.
    fn connect(&self, nodes: &[Node]) -> Vec<Connection>;
}
