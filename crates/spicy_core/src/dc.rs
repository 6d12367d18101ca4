use log::info;

use crate::branch::Step;
use crate::circuit::Circuit;
use crate::error::SolveError;
use crate::newton::{NewtonConfig, NewtonSolver};
use crate::solution::Solution;

/// DC operating point at `t = 0`, starting from all nodes at 0 V.
pub fn solve_dc<'c>(circuit: &'c Circuit, config: &NewtonConfig) -> Result<Solution<'c>, SolveError> {
    solve_dc_from(circuit, vec![0.0; circuit.node_count()], config)
}

/// DC operating point warm-started from `guess` (one entry per node, in
/// [`Circuit::node_names`] order).
pub fn solve_dc_from<'c>(
    circuit: &'c Circuit,
    guess: Vec<f64>,
    config: &NewtonConfig,
) -> Result<Solution<'c>, SolveError> {
    solve_dc_at(circuit, guess, 0.0, config)
}

/// DC operating point with time-dependent sources evaluated at `time`.
pub fn solve_dc_at<'c>(
    circuit: &'c Circuit,
    guess: Vec<f64>,
    time: f64,
    config: &NewtonConfig,
) -> Result<Solution<'c>, SolveError> {
    let outcome = NewtonSolver::new(circuit, config).solve(guess, &Step::dc(time), &[])?;
    info!(
        "operating point: {} nodes solved in {} iterations",
        circuit.node_count(),
        outcome.iterations
    );
    Ok(Solution::new(
        circuit,
        outcome.voltages,
        outcome.currents,
        outcome.iterations,
        time,
    ))
}
