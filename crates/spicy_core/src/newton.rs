//! Damped Newton-Raphson on the nodal KCL equations.
//!
//! Each iteration evaluates every branch in insertion order, stamps the
//! residual `F(V)` and Jacobian `J(V)`, solves `J dV = -F` and takes the
//! largest fraction of `dV` every branch accepts.
use log::{debug, trace};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::branch::{BranchState, Step};
use crate::circuit::Circuit;
use crate::error::SolveError;
use crate::matrix::SystemMatrix;
use crate::solver::error::LuError;
use crate::solver::lu::DenseLu;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    pub max_iterations: usize,
    /// Absolute voltage update tolerance (V).
    pub v_abstol: f64,
    pub v_reltol: f64,
    /// Absolute KCL residual tolerance (A).
    pub i_abstol: f64,
    /// Relative to the sum of branch current magnitudes at the node.
    pub i_reltol: f64,
    /// Shorten updates with the branches' `limit_step`.
    pub damping: bool,
    /// `max |F|` above which the iteration is declared diverged.
    pub divergence_threshold: f64,
    /// Conductance from every node to ground (S). Zero disables it.
    pub gmin: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            v_abstol: 1e-6,
            v_reltol: 1e-6,
            i_abstol: 1e-12,
            i_reltol: 1e-6,
            damping: true,
            divergence_threshold: 1e15,
            gmin: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NewtonOutcome {
    pub(crate) voltages: Vec<f64>,
    /// Branch currents at `voltages`.
    pub(crate) currents: Vec<f64>,
    pub(crate) iterations: usize,
}

/// Per-solve workspace. Cheap to create; never shared between threads.
#[derive(Debug)]
pub(crate) struct NewtonSolver<'a> {
    circuit: &'a Circuit,
    config: &'a NewtonConfig,
    matrix: SystemMatrix,
    currents: Vec<f64>,
    local: Vec<f64>,
    local_new: Vec<f64>,
}

impl<'a> NewtonSolver<'a> {
    pub(crate) fn new(circuit: &'a Circuit, config: &'a NewtonConfig) -> Self {
        Self {
            circuit,
            config,
            matrix: SystemMatrix::new(circuit.node_count()),
            currents: vec![0.0; circuit.branch_count()],
            local: Vec::new(),
            local_new: Vec::new(),
        }
    }

    /// Iterate from `guess` until converged or failed.
    ///
    /// `states[b]` is the memory of branch `b` (empty for DC).
    pub(crate) fn solve(
        &mut self,
        guess: Vec<f64>,
        step: &Step<'_>,
        states: &[Option<BranchState>],
    ) -> Result<NewtonOutcome, SolveError> {
        let n = self.matrix.dim();
        if guess.len() != n {
            return Err(SolveError::GuessLength {
                expected: n,
                actual: guess.len(),
            });
        }

        let mut v = guess;
        self.assemble(&v, step, states);
        self.check_divergence(&v, 0)?;

        for iteration in 1..=self.config.max_iterations {
            let lu = DenseLu::factor(self.matrix.jacobian())
                .map_err(|e| self.lu_error(e, iteration))?;
            let rhs: Array1<f64> = self.matrix.residual().mapv(|f| -f);
            let dx = lu
                .solve(&rhs)
                .map_err(|e| self.lu_error(e, iteration))?;

            let alpha = if self.config.damping {
                self.damping_factor(&v, &dx)
            } else {
                1.0
            };

            let mut update_ok = true;
            for (i, (vi, dxi)) in v.iter_mut().zip(dx.iter()).enumerate() {
                let dv = alpha * dxi;
                *vi += dv;
                if dv.abs() > self.config.v_abstol + self.config.v_reltol * vi.abs() {
                    update_ok = false;
                    trace!("node {i} still moving by {dv:e}");
                }
            }

            self.assemble(&v, step, states);
            self.check_divergence(&v, iteration)?;

            trace!(
                "newton iteration {iteration}: alpha = {alpha:.3e}, max |F| = {:.3e}",
                self.matrix.residual_norm()
            );

            if update_ok && self.residual_within_tolerance() {
                debug!(
                    "newton converged in {iteration} iterations at t = {}",
                    step.time
                );
                return Ok(NewtonOutcome {
                    voltages: v,
                    currents: self.currents.clone(),
                    iterations: iteration,
                });
            }
        }

        debug!(
            "newton gave up after {} iterations, max |F| = {:.3e}",
            self.config.max_iterations,
            self.matrix.residual_norm()
        );
        Err(SolveError::MaxIterationsExceeded {
            iterations: self.config.max_iterations,
            residual: self.residual(),
        })
    }

    /// Branch currents at `v` without iterating.
    pub(crate) fn evaluate(&mut self, v: &[f64], step: &Step<'_>) -> Vec<f64> {
        self.assemble(v, step, &[]);
        self.currents.clone()
    }

    /// Evaluate every branch at `v` and stamp `F` and `J`.
    fn assemble(&mut self, v: &[f64], step: &Step<'_>, states: &[Option<BranchState>]) {
        self.matrix.clear();
        for (b, stamp) in self.circuit.stamps().iter().enumerate() {
            let step = step.with_state(states.get(b).and_then(Option::as_ref));
            stamp.local_voltages(v, &mut self.local);

            let current = stamp.branch.current(&self.local, &step);
            let partials = stamp.branch.jacobian(&self.local, &step);
            debug_assert_eq!(partials.len(), stamp.senses.len());

            self.matrix.stamp_current(stamp.head, stamp.tail, current);
            for (&(plus, minus), g) in stamp.senses.iter().zip(partials) {
                self.matrix
                    .stamp_partial(stamp.head, stamp.tail, plus, minus, g);
            }
            self.currents[b] = current;
        }
        if self.config.gmin > 0.0 {
            self.matrix.stamp_gmin(self.config.gmin, v);
        }
    }

    /// Smallest fraction of `dx` accepted by any branch.
    fn damping_factor(&mut self, v: &[f64], dx: &[f64]) -> f64 {
        let v_new: Vec<f64> = v.iter().zip(dx).map(|(a, d)| a + d).collect();
        let mut alpha: f64 = 1.0;
        for stamp in self.circuit.stamps() {
            stamp.local_voltages(v, &mut self.local);
            stamp.local_voltages(&v_new, &mut self.local_new);
            let fraction = stamp.branch.limit_step(&self.local, &self.local_new);
            if fraction.is_finite() && fraction > 0.0 {
                alpha = alpha.min(fraction);
            }
        }
        alpha
    }

    fn residual_within_tolerance(&self) -> bool {
        self.matrix
            .residual()
            .iter()
            .zip(self.matrix.current_scale())
            .all(|(f, scale)| f.abs() <= self.config.i_abstol + self.config.i_reltol * scale)
    }

    /// The residual threshold only applies once an update has been taken; a
    /// starting guess is rejected only when it evaluates to non-finite values.
    fn check_divergence(&self, v: &[f64], iterations: usize) -> Result<(), SolveError> {
        let finite = self.matrix.is_finite() && v.iter().all(|x| x.is_finite());
        let norm = self.matrix.residual_norm();
        let runaway = iterations > 0 && norm > self.config.divergence_threshold;
        if !finite || runaway {
            debug!("newton diverged after {iterations} iterations (max |F| = {norm:e})");
            return Err(SolveError::Diverged {
                iterations,
                residual: self.residual(),
            });
        }
        Ok(())
    }

    fn lu_error(&self, error: LuError, iterations: usize) -> SolveError {
        let LuError::Singular { column } = error;
        debug!("singular jacobian at column {column}");
        SolveError::SingularSystem {
            column,
            iterations,
            residual: self.residual(),
        }
    }

    fn residual(&self) -> Vec<f64> {
        self.matrix.residual().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitBuilder;
    use crate::devices::{CurrentSource, Diode, Resistor};

    #[test]
    fn test_linear_circuit_converges_after_one_correction() {
        // 1 mA into a 1k/1k ladder
        let mut builder = CircuitBuilder::new();
        builder.add("I1", CurrentSource::new(1e-3), &["0", "n2"]);
        builder.add("R1", Resistor::new(1e3).expect("valid"), &["n2", "n1"]);
        builder.add("R2", Resistor::new(1e3).expect("valid"), &["n1", "0"]);
        let circuit = builder.build().expect("build");

        let config = NewtonConfig::default();
        let mut solver = NewtonSolver::new(&circuit, &config);
        let outcome = solver
            .solve(vec![0.0; 2], &Step::dc(0.0), &[])
            .expect("converges");

        // the second iteration only confirms the first update
        assert_eq!(outcome.iterations, 2);
        assert!((outcome.voltages[0] - 2.0).abs() < 1e-9);
        assert!((outcome.voltages[1] - 1.0).abs() < 1e-9);
        assert!((outcome.currents[1] - 1e-3).abs() < 1e-12);
    }

    #[test]
    fn test_damping_reduces_diode_overshoot() {
        let mut builder = CircuitBuilder::new();
        builder.add("I1", CurrentSource::new(10e-3), &["0", "a"]);
        builder.add("D1", Diode::new(1e-14, 1.0).expect("valid"), &["a", "0"]);
        let circuit = builder.build().expect("build");

        let damped = NewtonConfig::default();
        let outcome = NewtonSolver::new(&circuit, &damped)
            .solve(vec![0.0], &Step::dc(0.0), &[])
            .expect("damped newton converges");
        let expected = 0.02585 * (10e-3_f64 / 1e-14 + 1.0).ln();
        assert!((outcome.voltages[0] - expected).abs() < 1e-6);
        assert!(outcome.iterations < damped.max_iterations);
    }

    #[test]
    fn test_large_finite_guess_is_iterated_not_rejected() {
        // 1 mA into 1k, started 2e18 V away: |F| exceeds the divergence threshold
        let mut builder = CircuitBuilder::new();
        builder.add("I1", CurrentSource::new(1e-3), &["0", "a"]);
        builder.add("R1", Resistor::new(1e3).expect("valid"), &["a", "0"]);
        let circuit = builder.build().expect("build");

        let config = NewtonConfig::default();
        let outcome = NewtonSolver::new(&circuit, &config)
            .solve(vec![2e18], &Step::dc(0.0), &[])
            .expect("one linear correction brings it back");
        assert!((outcome.voltages[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_guess_length_is_checked() {
        let mut builder = CircuitBuilder::new();
        builder.add("R1", Resistor::new(1.0).expect("valid"), &["a", "0"]);
        let circuit = builder.build().expect("build");
        let config = NewtonConfig::default();
        let err = NewtonSolver::new(&circuit, &config)
            .solve(vec![0.0; 3], &Step::dc(0.0), &[])
            .unwrap_err();
        assert_eq!(
            err,
            SolveError::GuessLength {
                expected: 1,
                actual: 3
            }
        );
    }

    #[test]
    fn test_gmin_rescues_floating_node() {
        let mut builder = CircuitBuilder::new();
        builder.add("I1", CurrentSource::new(1e-3), &["0", "a"]);
        builder.add("R1", Resistor::new(1e3).expect("valid"), &["a", "0"]);
        builder.add("R2", Resistor::new(1e3).expect("valid"), &["b", "c"]);
        let circuit = builder.build().expect("build");

        let strict = NewtonConfig::default();
        let err = NewtonSolver::new(&circuit, &strict)
            .solve(vec![0.0; 3], &Step::dc(0.0), &[])
            .unwrap_err();
        assert!(matches!(err, SolveError::SingularSystem { iterations: 1, .. }));

        let relaxed = NewtonConfig {
            gmin: 1e-12,
            ..NewtonConfig::default()
        };
        let outcome = NewtonSolver::new(&circuit, &relaxed)
            .solve(vec![0.0; 3], &Step::dc(0.0), &[])
            .expect("gmin ties b and c to ground");
        assert!((outcome.voltages[0] - 1.0).abs() < 1e-6);
        assert_eq!(outcome.voltages[1], 0.0);
    }
}
