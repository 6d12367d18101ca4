//! Circuit assembly: components in, node ordering and branch incidence out.
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use log::{debug, warn};

use crate::branch::Branch;
use crate::component::{Component, Connection};
use crate::error::TopologyError;
use crate::nodes::{Node, NodeMap, voltage_diff};
use crate::union_find::UnionFind;

/// Handle to a component inside a [`Circuit`], in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A branch resolved against the circuit's node ordering. `None` is ground.
#[derive(Debug, Clone)]
pub(crate) struct BranchStamp {
    pub(crate) component: ComponentId,
    pub(crate) head: Option<usize>,
    pub(crate) tail: Option<usize>,
    pub(crate) senses: Vec<(Option<usize>, Option<usize>)>,
    pub(crate) branch: Arc<dyn Branch>,
}

impl BranchStamp {
    /// Fill `out` with the branch's local voltage vector at the global solution `v`.
    pub(crate) fn local_voltages(&self, v: &[f64], out: &mut Vec<f64>) {
        out.clear();
        out.extend(
            self.senses
                .iter()
                .map(|&(plus, minus)| voltage_diff(v, plus, minus)),
        );
    }

    fn same_incidence(&self, other: &BranchStamp) -> bool {
        self.head == other.head && self.tail == other.tail && self.senses == other.senses
    }
}

#[derive(Debug)]
struct ComponentEntry {
    name: String,
    component: Box<dyn Component>,
    terminals: Vec<Node>,
    branches: Range<usize>,
}

/// A connected group of non-ground nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Island {
    pub nodes: Vec<String>,
    /// Whether some branch links the island to ground.
    pub grounded: bool,
}

/// Collects components and the nodes they are wired to.
#[derive(Debug, Default)]
pub struct CircuitBuilder {
    entries: Vec<(String, Box<dyn Component>, Vec<Node>)>,
}

impl CircuitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `component` wired to `terminals` (in the order of [`Component::terminals`]).
    pub fn add<C: Component + 'static>(
        &mut self,
        name: impl Into<String>,
        component: C,
        terminals: &[&str],
    ) -> ComponentId {
        let terminals = terminals.iter().map(|&t| Node::new(t)).collect();
        self.add_boxed(name, Box::new(component), terminals)
    }

    pub fn add_boxed(
        &mut self,
        name: impl Into<String>,
        component: Box<dyn Component>,
        terminals: Vec<Node>,
    ) -> ComponentId {
        let id = ComponentId(self.entries.len());
        self.entries.push((name.into(), component, terminals));
        id
    }

    /// Connect every component and compute the node ordering.
    pub fn build(self) -> Result<Circuit, TopologyError> {
        let mut nodes = NodeMap::new();
        let mut components = Vec::with_capacity(self.entries.len());
        let mut stamps = Vec::new();
        let mut seen_names = HashSet::new();

        for (index, (name, component, terminals)) in self.entries.into_iter().enumerate() {
            if !seen_names.insert(name.clone()) {
                return Err(TopologyError::DuplicateComponent { component: name });
            }
            check_terminal_count(&name, component.as_ref(), &terminals)?;

            let id = ComponentId(index);
            let start = stamps.len();
            for (branch, connection) in component.connect(&terminals).into_iter().enumerate() {
                check_foreign_nodes(&name, branch, &connection, &terminals)?;
                let stamp = BranchStamp {
                    component: id,
                    head: nodes.insert(&connection.head),
                    tail: nodes.insert(&connection.tail),
                    senses: connection
                        .senses
                        .iter()
                        .map(|(plus, minus)| (nodes.insert(plus), nodes.insert(minus)))
                        .collect(),
                    branch: connection.branch,
                };
                check_degenerate(&name, branch, &stamp)?;
                stamps.push(stamp);
            }

            components.push(ComponentEntry {
                name,
                component,
                terminals,
                branches: start..stamps.len(),
            });
        }

        let circuit = Circuit {
            nodes,
            components,
            stamps,
        };
        debug!(
            "assembled circuit: {} components, {} branches, {} nodes",
            circuit.components.len(),
            circuit.stamps.len(),
            circuit.node_count()
        );
        for island in circuit.islands().iter().filter(|i| !i.grounded) {
            warn!("nodes {:?} have no path to ground", island.nodes);
        }
        Ok(circuit)
    }
}

fn check_terminal_count(
    name: &str,
    component: &dyn Component,
    terminals: &[Node],
) -> Result<(), TopologyError> {
    let expected = component.terminals().len();
    if expected != terminals.len() {
        return Err(TopologyError::TerminalCount {
            component: name.to_string(),
            kind: component.kind(),
            expected,
            actual: terminals.len(),
        });
    }
    Ok(())
}

fn check_foreign_nodes(
    name: &str,
    branch: usize,
    connection: &Connection,
    terminals: &[Node],
) -> Result<(), TopologyError> {
    match connection.nodes().find(|n| !terminals.contains(n)) {
        Some(node) => Err(TopologyError::ForeignNode {
            component: name.to_string(),
            branch,
            node: node.to_string(),
        }),
        None => Ok(()),
    }
}

fn check_degenerate(name: &str, branch: usize, stamp: &BranchStamp) -> Result<(), TopologyError> {
    let live = stamp.head.is_some()
        || stamp.tail.is_some()
        || stamp
            .senses
            .iter()
            .any(|(plus, minus)| plus.is_some() || minus.is_some());
    if live {
        Ok(())
    } else {
        Err(TopologyError::DegenerateBranch {
            component: name.to_string(),
            branch,
        })
    }
}

/// An assembled circuit: the unknown ordering and every branch's global indices.
///
/// The topology is fixed once built. Device parameters can still change through
/// [`Circuit::replace_component`].
#[derive(Debug)]
pub struct Circuit {
    nodes: NodeMap,
    components: Vec<ComponentEntry>,
    stamps: Vec<BranchStamp>,
}

impl Circuit {
    pub fn builder() -> CircuitBuilder {
        CircuitBuilder::new()
    }

    /// Number of unknowns (non-ground nodes).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node names in unknown order.
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.names().iter().map(Node::name).collect()
    }

    /// Index of `node` in the solution vector; `None` for ground or unknown nodes.
    pub fn node_index(&self, node: &str) -> Option<usize> {
        self.nodes.index(node)
    }

    pub fn has_node(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    pub fn branch_count(&self) -> usize {
        self.stamps.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + use<> {
        (0..self.components.len()).map(ComponentId)
    }

    pub fn component_id(&self, name: &str) -> Option<ComponentId> {
        self.components
            .iter()
            .position(|c| c.name == name)
            .map(ComponentId)
    }

    pub fn component(&self, id: ComponentId) -> Option<&dyn Component> {
        self.components.get(id.0).map(|c| c.component.as_ref())
    }

    pub fn component_name(&self, id: ComponentId) -> Option<&str> {
        self.components.get(id.0).map(|c| c.name.as_str())
    }

    /// Nodes the component was connected to, in terminal order.
    pub fn terminals(&self, id: ComponentId) -> Option<&[Node]> {
        self.components.get(id.0).map(|c| c.terminals.as_slice())
    }

    pub(crate) fn stamps(&self) -> &[BranchStamp] {
        &self.stamps
    }

    pub(crate) fn branch_range(&self, id: ComponentId) -> Option<Range<usize>> {
        self.components.get(id.0).map(|c| c.branches.clone())
    }

    /// Swap in a component with new parameters but the same incidence.
    ///
    /// The node ordering and branch layout are kept, so solutions and warm
    /// starts computed before the swap stay index-compatible.
    pub fn replace_component<C: Component + 'static>(
        &mut self,
        id: ComponentId,
        component: C,
    ) -> Result<(), TopologyError> {
        let entry = self
            .components
            .get(id.0)
            .ok_or(TopologyError::UnknownComponent { id: id.0 })?;
        check_terminal_count(&entry.name, &component, &entry.terminals)?;

        let incompatible = || TopologyError::IncompatibleReplacement {
            component: entry.name.clone(),
        };

        let connections = component.connect(&entry.terminals);
        if connections.len() != entry.branches.len() {
            return Err(incompatible());
        }

        let lookup = |node: &Node| -> Result<Option<usize>, TopologyError> {
            if node.is_ground() {
                Ok(None)
            } else {
                self.nodes.index(node.name()).map(Some).ok_or_else(incompatible)
            }
        };

        let mut replacements = Vec::with_capacity(connections.len());
        for (branch, (connection, existing)) in connections
            .into_iter()
            .zip(&self.stamps[entry.branches.clone()])
            .enumerate()
        {
            check_foreign_nodes(&entry.name, branch, &connection, &entry.terminals)?;
            let senses = connection
                .senses
                .iter()
                .map(|(plus, minus)| Ok((lookup(plus)?, lookup(minus)?)))
                .collect::<Result<Vec<_>, TopologyError>>()?;
            let stamp = BranchStamp {
                component: id,
                head: lookup(&connection.head)?,
                tail: lookup(&connection.tail)?,
                senses,
                branch: connection.branch,
            };
            if !stamp.same_incidence(existing) {
                return Err(incompatible());
            }
            replacements.push(stamp);
        }

        let range = entry.branches.clone();
        debug!("replacing parameters of '{}'", entry.name);
        for (slot, stamp) in self.stamps[range].iter_mut().zip(replacements) {
            *slot = stamp;
        }
        self.components[id.0].component = Box::new(component);
        Ok(())
    }

    /// Groups of nodes joined by branches, ignoring ground.
    ///
    /// Groups that never touch ground make the Jacobian singular in DC.
    pub fn islands(&self) -> Vec<Island> {
        let n = self.node_count();
        let mut uf = UnionFind::new(n);
        let mut touches_ground = vec![false; n];

        for stamp in &self.stamps {
            match (stamp.head, stamp.tail) {
                (Some(head), Some(tail)) => uf.union(head, tail),
                (Some(node), None) | (None, Some(node)) => touches_ground[node] = true,
                (None, None) => {}
            }
        }

        let names = self.nodes.names();
        uf.groups()
            .into_iter()
            .map(|members| Island {
                grounded: members.iter().any(|&m| touches_ground[m]),
                nodes: members.iter().map(|&m| names[m].to_string()).collect(),
            })
            .collect()
    }
}
