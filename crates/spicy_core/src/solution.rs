use crate::circuit::{Circuit, ComponentId};
use crate::nodes::Node;

/// A converged operating point of a circuit.
///
/// Holds the node voltages (unknown order), the branch currents at
/// convergence (branch order), and how the point was reached. All accessors
/// read the stored values; no device is evaluated again.
#[derive(Debug, Clone)]
pub struct Solution<'c> {
    circuit: &'c Circuit,
    voltages: Vec<f64>,
    currents: Vec<f64>,
    iterations: usize,
    time: f64,
}

impl<'c> Solution<'c> {
    pub(crate) fn new(
        circuit: &'c Circuit,
        voltages: Vec<f64>,
        currents: Vec<f64>,
        iterations: usize,
        time: f64,
    ) -> Self {
        Self {
            circuit,
            voltages,
            currents,
            iterations,
            time,
        }
    }

    pub fn circuit(&self) -> &'c Circuit {
        self.circuit
    }

    /// Voltage of `node` relative to ground. Ground is 0 V; unknown nodes are `None`.
    pub fn voltage(&self, node: &str) -> Option<f64> {
        if node == crate::nodes::GROUND {
            return Some(0.0);
        }
        self.circuit.node_index(node).map(|i| self.voltages[i])
    }

    pub(crate) fn node_voltage(&self, node: &Node) -> Option<f64> {
        self.voltage(node.name())
    }

    /// All node voltages in unknown order, usable as a warm start.
    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    pub fn node_voltages(&self) -> Vec<(&'c str, f64)> {
        self.circuit
            .node_names()
            .into_iter()
            .zip(self.voltages.iter().copied())
            .collect()
    }

    /// Currents of every branch, in branch order.
    pub fn currents(&self) -> &[f64] {
        &self.currents
    }

    /// Head-to-tail currents of the branches owned by component `id`.
    pub fn branch_currents(&self, id: ComponentId) -> Option<&[f64]> {
        let range = self.circuit.branch_range(id)?;
        self.currents.get(range)
    }

    /// Net current flowing into component `id` through terminal `terminal`.
    ///
    /// Sums every branch of the component whose head or tail sits on that
    /// terminal's node. `None` when another terminal of the same component is
    /// tied to that node, since the split between the two terminals is not
    /// observable from node voltages.
    pub fn current_into(&self, id: ComponentId, terminal: usize) -> Option<f64> {
        let terminals = self.circuit.terminals(id)?;
        let node = terminals.get(terminal)?;
        if terminals.iter().filter(|t| *t == node).count() > 1 {
            return None;
        }
        let index = self.circuit.node_index(node.name());
        let range = self.circuit.branch_range(id)?;

        let mut total = 0.0;
        for (stamp, i) in self.circuit.stamps()[range.clone()]
            .iter()
            .zip(&self.currents[range])
        {
            if stamp.head == index {
                total += i;
            }
            if stamp.tail == index {
                total -= i;
            }
        }
        Some(total)
    }

    /// `V(terminals[plus]) - V(terminals[minus])` of component `id`.
    pub fn voltage_across(&self, id: ComponentId, plus: usize, minus: usize) -> Option<f64> {
        let terminals = self.circuit.terminals(id)?;
        let vp = self.node_voltage(terminals.get(plus)?)?;
        let vm = self.node_voltage(terminals.get(minus)?)?;
        Some(vp - vm)
    }

    /// Newton iterations spent on this point.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn into_voltages(self) -> Vec<f64> {
        self.voltages
    }
}
