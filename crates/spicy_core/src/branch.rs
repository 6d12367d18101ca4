//! The two-terminal current relation every device model is built from.
//!
//! A branch carries current from its `head` node to its `tail` node. The value
//! of that current is a function of a *local* voltage vector whose entries are
//! the node-pair differences declared when the owning component was connected
//! (see [`crate::component::Connection`]). The solver only ever talks to
//! devices through this trait.
use std::fmt;

use crate::trans::IntegrationMethod;

/// Evaluation context for one Newton iteration.
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    /// Step size in seconds. Zero for a DC operating point.
    pub dt: f64,
    /// Simulation time the evaluation refers to.
    pub time: f64,
    pub method: IntegrationMethod,
    /// Memory from the previous accepted time step, only for reactive branches
    /// during a transient step.
    pub state: Option<&'a BranchState>,
}

impl<'a> Step<'a> {
    /// Context for a DC operating point at `time`.
    pub fn dc(time: f64) -> Self {
        Self {
            dt: 0.0,
            time,
            method: IntegrationMethod::default(),
            state: None,
        }
    }

    pub fn is_dc(&self) -> bool {
        self.dt == 0.0
    }

    pub(crate) fn with_state(self, state: Option<&'a BranchState>) -> Step<'a> {
        Step { state, ..self }
    }
}

/// Previous-step memory of a reactive branch.
///
/// Owned by the transient driver, one per reactive branch, and only mutated
/// between time steps through [`Branch::update_state`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BranchState {
    /// Controlling voltage at the last accepted step.
    pub voltage: f64,
    /// Branch current at the last accepted step.
    pub current: f64,
}

pub trait Branch: fmt::Debug + Send + Sync {
    /// Current flowing from head to tail.
    ///
    /// Must be pure and continuous in `v`.
    fn current(&self, v: &[f64], step: &Step<'_>) -> f64;

    /// Partial derivatives of [`Branch::current`] with respect to each entry of `v`,
    /// in the same order.
    fn jacobian(&self, v: &[f64], step: &Step<'_>) -> Vec<f64>;

    /// Fraction in `(0, 1]` of the Newton update `v_old -> v_new` this branch accepts.
    ///
    /// Exponential devices use it to keep junction voltages inside the region
    /// where the linearization is trustworthy.
    fn limit_step(&self, _v_old: &[f64], _v_new: &[f64]) -> f64 {
        1.0
    }

    /// Initial memory for reactive branches, seeded from the starting solution.
    /// `None` means the branch is memoryless.
    fn initial_state(&self, _v: &[f64]) -> Option<BranchState> {
        None
    }

    /// Fold an accepted step into the branch memory.
    fn update_state(&self, _v: &[f64], _step: &Step<'_>, _state: &mut BranchState) {}
}
