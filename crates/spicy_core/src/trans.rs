//! Transient analysis: a sequence of Newton solves over caller-chosen time points.
//!
//! Each interval warm-starts from the previous converged voltages. Reactive
//! branches carry one [`BranchState`] each, owned here and folded forward only
//! after a step has converged. A failed interval is retried as two halves,
//! recursively, until the halving budget runs out.
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::SimulationConfig;
use crate::branch::{BranchState, Step};
use crate::circuit::Circuit;
use crate::dc::solve_dc_at;
use crate::error::{SolveError, TransientError};
use crate::newton::{NewtonOutcome, NewtonSolver};
use crate::solution::Solution;

/// Companion model used by reactive branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegrationMethod {
    #[default]
    BackwardEuler,
    Trapezoidal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientConfig {
    pub method: IntegrationMethod,
    /// How many times an interval may be split in half after a failed solve.
    pub max_step_halvings: usize,
}

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::BackwardEuler,
            max_step_halvings: 10,
        }
    }
}

/// Cost of reaching one output time point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepStats {
    pub time: f64,
    /// Newton iterations over all attempts, failed ones included.
    pub iterations: usize,
    pub halvings: usize,
}

#[derive(Debug, Clone)]
pub struct TransientResult<'c> {
    solutions: Vec<Solution<'c>>,
    steps: Vec<StepStats>,
}

impl<'c> TransientResult<'c> {
    /// One solution per requested time point.
    pub fn solutions(&self) -> &[Solution<'c>] {
        &self.solutions
    }

    /// Statistics aligned with [`TransientResult::solutions`]. The first entry
    /// describes the initial operating point.
    pub fn steps(&self) -> &[StepStats] {
        &self.steps
    }

    pub fn times(&self) -> Vec<f64> {
        self.solutions.iter().map(Solution::time).collect()
    }

    /// Voltage of `node` at every time point.
    pub fn node_trace(&self, node: &str) -> Option<Vec<f64>> {
        self.solutions.iter().map(|s| s.voltage(node)).collect()
    }

    pub fn final_solution(&self) -> Option<&Solution<'c>> {
        self.solutions.last()
    }

    pub fn total_iterations(&self) -> usize {
        self.steps.iter().map(|s| s.iterations).sum()
    }
}

/// Transient run starting from the DC operating point at `time_points[0]`.
pub fn solve_transient<'c>(
    circuit: &'c Circuit,
    time_points: &[f64],
    config: &SimulationConfig,
) -> Result<TransientResult<'c>, TransientError> {
    check_time_points(time_points)?;
    let t0 = time_points[0];
    let initial = solve_dc_at(circuit, vec![0.0; circuit.node_count()], t0, &config.newton)
        .map_err(TransientError::InitialOperatingPoint)?;
    run(circuit, initial, time_points, config)
}

/// Transient run from caller-supplied node voltages at `time_points[0]`.
pub fn solve_transient_from<'c>(
    circuit: &'c Circuit,
    initial: Vec<f64>,
    time_points: &[f64],
    config: &SimulationConfig,
) -> Result<TransientResult<'c>, TransientError> {
    check_time_points(time_points)?;
    if initial.len() != circuit.node_count() {
        return Err(TransientError::InitialSolutionLength {
            expected: circuit.node_count(),
            actual: initial.len(),
        });
    }
    let t0 = time_points[0];
    let currents = NewtonSolver::new(circuit, &config.newton).evaluate(&initial, &Step::dc(t0));
    let initial = Solution::new(circuit, initial, currents, 0, t0);
    run(circuit, initial, time_points, config)
}

fn check_time_points(time_points: &[f64]) -> Result<(), TransientError> {
    if time_points.is_empty() {
        return Err(TransientError::InvalidTimePoints { index: 0 });
    }
    if let Some(index) = time_points.iter().position(|t| !t.is_finite()) {
        return Err(TransientError::InvalidTimePoints { index });
    }
    if let Some(index) = time_points.windows(2).position(|w| w[1] <= w[0]) {
        return Err(TransientError::InvalidTimePoints { index: index + 1 });
    }
    Ok(())
}

fn run<'c>(
    circuit: &'c Circuit,
    initial: Solution<'c>,
    time_points: &[f64],
    config: &SimulationConfig,
) -> Result<TransientResult<'c>, TransientError> {
    let mut driver = TransientDriver {
        circuit,
        config,
        solver: NewtonSolver::new(circuit, &config.newton),
        method: config.transient.method,
        local: Vec::new(),
    };
    let mut states = driver.initial_states(initial.voltages());

    let mut steps = Vec::with_capacity(time_points.len());
    steps.push(StepStats {
        time: initial.time(),
        iterations: initial.iterations(),
        halvings: 0,
    });
    let mut solutions = Vec::with_capacity(time_points.len());
    solutions.push(initial);

    for (index, window) in time_points.windows(2).enumerate() {
        let (t_start, t_end) = (window[0], window[1]);
        // the initial solution carries no branch current history, so the
        // first interval always integrates with backward Euler
        driver.method = if index == 0 {
            IntegrationMethod::BackwardEuler
        } else {
            config.transient.method
        };
        let v_start = solutions
            .last()
            .map(|s| s.voltages().to_vec())
            .unwrap_or_default();

        let mut stats = StepStats {
            time: t_end,
            ..StepStats::default()
        };
        let outcome = driver
            .advance(&v_start, t_start, t_end, &mut states, 0, &mut stats)
            .map_err(|source| TransientError::StepFailed {
                time: t_end,
                dt: t_end - t_start,
                source,
            })?;
        debug!(
            "t = {t_end:e}: {} iterations, {} halvings",
            stats.iterations, stats.halvings
        );

        solutions.push(Solution::new(
            circuit,
            outcome.voltages,
            outcome.currents,
            stats.iterations,
            t_end,
        ));
        steps.push(stats);
    }

    let result = TransientResult { solutions, steps };
    info!(
        "transient: {} time points, {} newton iterations",
        result.solutions.len(),
        result.total_iterations()
    );
    Ok(result)
}

struct TransientDriver<'a> {
    circuit: &'a Circuit,
    config: &'a SimulationConfig,
    solver: NewtonSolver<'a>,
    method: IntegrationMethod,
    local: Vec<f64>,
}

impl TransientDriver<'_> {
    fn initial_states(&mut self, v: &[f64]) -> Vec<Option<BranchState>> {
        self.circuit
            .stamps()
            .iter()
            .map(|stamp| {
                stamp.local_voltages(v, &mut self.local);
                stamp.branch.initial_state(&self.local)
            })
            .collect()
    }

    /// Solve the interval `t_start -> t_end`, halving it on recoverable failures.
    fn advance(
        &mut self,
        v_start: &[f64],
        t_start: f64,
        t_end: f64,
        states: &mut [Option<BranchState>],
        depth: usize,
        stats: &mut StepStats,
    ) -> Result<NewtonOutcome, SolveError> {
        let step = Step {
            dt: t_end - t_start,
            time: t_end,
            method: self.method,
            state: None,
        };

        match self.solver.solve(v_start.to_vec(), &step, states) {
            Ok(outcome) => {
                stats.iterations += outcome.iterations;
                self.commit(&outcome.voltages, &step, states);
                Ok(outcome)
            }
            Err(err) if err.is_recoverable() && depth < self.config.transient.max_step_halvings => {
                stats.iterations += err.iterations();
                stats.halvings += 1;
                let t_mid = t_start + 0.5 * (t_end - t_start);
                warn!(
                    "step to t = {t_end:e} failed ({err}), retrying with dt = {:e}",
                    t_mid - t_start
                );
                let mid = self.advance(v_start, t_start, t_mid, states, depth + 1, stats)?;
                self.advance(&mid.voltages, t_mid, t_end, states, depth + 1, stats)
            }
            Err(err) => {
                stats.iterations += err.iterations();
                Err(err)
            }
        }
    }

    /// Fold an accepted step into every reactive branch's memory.
    fn commit(&mut self, v: &[f64], step: &Step<'_>, states: &mut [Option<BranchState>]) {
        for (stamp, state) in self.circuit.stamps().iter().zip(states.iter_mut()) {
            if let Some(state) = state {
                stamp.local_voltages(v, &mut self.local);
                stamp.branch.update_state(&self.local, step, state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Capacitor, Resistor, VoltageSource};
    use crate::waveform::Waveform;
    use rstest::rstest;

    // keeps float noise out of comparisons against closed forms
    fn round_sig(x: f64, sig: i32) -> f64 {
        if x == 0.0 {
            return 0.0;
        }
        let scale = 10f64.powi(sig - 1 - x.abs().log10().floor() as i32);
        (x * scale).round() / scale
    }

    fn rc_step() -> Circuit {
        // 1 V step at t = 0 into 1k / 1uF, tau = 1 ms
        let mut builder = Circuit::builder();
        let step = Waveform::Pulse {
            initial: 0.0,
            pulsed: 1.0,
            delay: 0.0,
            rise_time: 0.0,
            fall_time: 0.0,
            width: 1.0,
            period: 0.0,
        };
        builder.add("V1", VoltageSource::ideal(step), &["in", "0"]);
        builder.add("R1", Resistor::new(1e3).expect("valid"), &["in", "out"]);
        builder.add("C1", Capacitor::new(1e-6).expect("valid"), &["out", "0"]);
        builder.build().expect("build")
    }

    fn uniform(dt: f64, n: usize) -> Vec<f64> {
        (0..=n).map(|i| i as f64 * dt).collect()
    }

    #[rstest]
    #[case(IntegrationMethod::BackwardEuler, 2e-2)]
    #[case(IntegrationMethod::Trapezoidal, 1e-3)]
    fn test_rc_charging_tracks_exponential(#[case] method: IntegrationMethod, #[case] tol: f64) {
        let circuit = rc_step();
        let config = SimulationConfig {
            transient: TransientConfig {
                method,
                ..TransientConfig::default()
            },
            ..SimulationConfig::default()
        };
        // start discharged; the source is already at 1 V at t = 0
        let times = uniform(1e-5, 300);
        let result = solve_transient_from(&circuit, vec![1.0, 0.0], &times, &config)
            .expect("transient");

        let out = result.node_trace("out").expect("node");
        for (t, v) in times.iter().zip(&out).step_by(50) {
            let expected = 1.0 - (-t / 1e-3).exp();
            assert!((v - expected).abs() < tol, "t = {t}: {v} vs {expected}");
        }
        assert_eq!(result.solutions().len(), times.len());
    }

    #[test]
    fn test_dc_start_holds_steady_state() {
        let circuit = rc_step();
        let times = uniform(1e-4, 5);
        let result = solve_transient(&circuit, &times, &SimulationConfig::default())
            .expect("transient");
        // the source is at 1 V at t = 0, so the capacitor starts charged
        for v in result.node_trace("out").expect("node") {
            assert_eq!(round_sig(v, 6), 1.0);
        }
        assert_eq!(result.steps()[0].halvings, 0);
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&[0.0, 1.0, 1.0], 2)]
    #[case(&[0.0, 2.0, 1.0], 2)]
    #[case(&[0.0, f64::NAN], 1)]
    fn test_time_points_are_validated(#[case] times: &[f64], #[case] index: usize) {
        let circuit = rc_step();
        let err = solve_transient(&circuit, times, &SimulationConfig::default()).unwrap_err();
        assert_eq!(err, TransientError::InvalidTimePoints { index });
    }

    #[test]
    fn test_initial_solution_length_is_checked() {
        let circuit = rc_step();
        let err = solve_transient_from(&circuit, vec![0.0], &[0.0, 1.0], &SimulationConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            TransientError::InitialSolutionLength {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_round_sig() {
        assert_eq!(round_sig(0.123456789, 3), 0.123);
        assert_eq!(round_sig(1.0000004, 6), 1.0);
    }
}
