//! Linear capacitor with a companion model per integration method.
//!
//! In DC the branch is open. In a transient step it becomes a conductance
//! `g` in parallel with a history current built from the previous step:
//!
//! * backward Euler: `g = C / dt`, `i = g (v - v_prev)`
//! * trapezoidal:    `g = 2C / dt`, `i = g (v - v_prev) - i_prev`
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::branch::{Branch, BranchState, Step};
use crate::component::{Component, Connection};
use crate::error::DeviceError;
use crate::nodes::Node;
use crate::trans::IntegrationMethod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capacitor {
    capacitance: f64,
}

impl Capacitor {
    pub fn new(capacitance: f64) -> Result<Self, DeviceError> {
        Ok(Self {
            capacitance: DeviceError::check_positive("capacitance", capacitance)?,
        })
    }

    pub fn capacitance(&self) -> f64 {
        self.capacitance
    }

    fn companion_conductance(&self, step: &Step<'_>) -> f64 {
        match step.method {
            IntegrationMethod::BackwardEuler => self.capacitance / step.dt,
            IntegrationMethod::Trapezoidal => 2.0 * self.capacitance / step.dt,
        }
    }

    fn companion_current(&self, v: f64, step: &Step<'_>, prev: &BranchState) -> f64 {
        if step.is_dc() {
            return 0.0;
        }
        let g = self.companion_conductance(step);
        match step.method {
            IntegrationMethod::BackwardEuler => g * (v - prev.voltage),
            IntegrationMethod::Trapezoidal => g * (v - prev.voltage) - prev.current,
        }
    }
}

impl Branch for Capacitor {
    fn current(&self, v: &[f64], step: &Step<'_>) -> f64 {
        let prev = step.state.copied().unwrap_or_default();
        self.companion_current(v[0], step, &prev)
    }

    fn jacobian(&self, _v: &[f64], step: &Step<'_>) -> Vec<f64> {
        if step.is_dc() {
            vec![0.0]
        } else {
            vec![self.companion_conductance(step)]
        }
    }

    fn initial_state(&self, v: &[f64]) -> Option<BranchState> {
        Some(BranchState {
            voltage: v[0],
            current: 0.0,
        })
    }

    fn update_state(&self, v: &[f64], step: &Step<'_>, state: &mut BranchState) {
        let current = self.companion_current(v[0], step, state);
        *state = BranchState {
            voltage: v[0],
            current,
        };
    }
}

impl Component for Capacitor {
    fn kind(&self) -> &'static str {
        "capacitor"
    }

    fn terminals(&self) -> &'static [&'static str] {
        &["positive", "negative"]
    }

    fn connect(&self, nodes: &[Node]) -> Vec<Connection> {
        match nodes {
            [p, n] => vec![Connection::across(p, n, Arc::new(self.clone()))],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::testing::assert_jacobian_matches;
    use rstest::rstest;

    fn step(method: IntegrationMethod, state: &BranchState) -> Step<'_> {
        Step {
            dt: 1e-3,
            time: 1e-3,
            method,
            state: Some(state),
        }
    }

    #[rstest]
    #[case(IntegrationMethod::BackwardEuler, 1e-3)]
    #[case(IntegrationMethod::Trapezoidal, 2e-3 - 5e-4)]
    fn test_companion_current(#[case] method: IntegrationMethod, #[case] expected: f64) {
        let c = Capacitor::new(1e-6).expect("valid");
        let prev = BranchState {
            voltage: 1.0,
            current: 5e-4,
        };
        let i = c.current(&[2.0], &step(method, &prev));
        assert!((i - expected).abs() < 1e-15, "{i} != {expected}");
        assert_jacobian_matches(&c, &[2.0], &step(method, &prev), 1e-12);
    }

    #[test]
    fn test_open_circuit_in_dc() {
        let c = Capacitor::new(1e-6).expect("valid");
        assert_eq!(c.current(&[5.0], &Step::dc(0.0)), 0.0);
        assert_eq!(c.jacobian(&[5.0], &Step::dc(0.0)), vec![0.0]);
    }

    #[test]
    fn test_update_state_records_accepted_step() {
        let c = Capacitor::new(1e-6).expect("valid");
        let mut state = c.initial_state(&[1.0]).expect("reactive");
        assert_eq!(
            state,
            BranchState {
                voltage: 1.0,
                current: 0.0
            }
        );

        let s = Step {
            dt: 1e-3,
            time: 1e-3,
            method: IntegrationMethod::BackwardEuler,
            state: None,
        };
        c.update_state(&[1.5], &s, &mut state);
        assert_eq!(state.voltage, 1.5);
        assert!((state.current - 5e-4).abs() < 1e-15);
    }
}
