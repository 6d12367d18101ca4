use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::junction::{
    DEFAULT_THERMAL_VOLTAGE, critical_voltage, junction_step_fraction, limited_exp_m1,
};
use crate::branch::{Branch, Step};
use crate::component::{Component, Connection};
use crate::error::DeviceError;
use crate::nodes::Node;

/// Shockley diode, anode to cathode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diode {
    /// Saturation current (A).
    saturation_current: f64,
    /// Emission coefficient (ideality factor), dimensionless.
    emission_coeff: f64,
    /// Thermal voltage (Vt) used in exp(Vd / (n * Vt)).
    thermal_voltage: f64,
}

impl Diode {
    pub fn new(saturation_current: f64, emission_coeff: f64) -> Result<Self, DeviceError> {
        Self::with_thermal_voltage(saturation_current, emission_coeff, DEFAULT_THERMAL_VOLTAGE)
    }

    pub fn with_thermal_voltage(
        saturation_current: f64,
        emission_coeff: f64,
        thermal_voltage: f64,
    ) -> Result<Self, DeviceError> {
        Ok(Self {
            saturation_current: DeviceError::check_positive("is", saturation_current)?,
            emission_coeff: DeviceError::check_positive("n", emission_coeff)?,
            thermal_voltage: DeviceError::check_positive("vt", thermal_voltage)?,
        })
    }

    fn nvt(&self) -> f64 {
        self.emission_coeff * self.thermal_voltage
    }
}

impl Branch for Diode {
    fn current(&self, v: &[f64], _step: &Step<'_>) -> f64 {
        self.saturation_current * limited_exp_m1(v[0] / self.nvt()).0
    }

    fn jacobian(&self, v: &[f64], _step: &Step<'_>) -> Vec<f64> {
        let nvt = self.nvt();
        vec![self.saturation_current / nvt * limited_exp_m1(v[0] / nvt).1]
    }

    fn limit_step(&self, v_old: &[f64], v_new: &[f64]) -> f64 {
        let nvt = self.nvt();
        let v_crit = critical_voltage(self.saturation_current, nvt);
        junction_step_fraction(v_old[0], v_new[0], nvt, v_crit)
    }
}

impl Component for Diode {
    fn kind(&self) -> &'static str {
        "diode"
    }

    fn terminals(&self) -> &'static [&'static str] {
        &["anode", "cathode"]
    }

    fn connect(&self, nodes: &[Node]) -> Vec<Connection> {
        match nodes {
            [anode, cathode] => vec![Connection::across(anode, cathode, Arc::new(self.clone()))],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::testing::assert_jacobian_matches;
    use rstest::rstest;

    #[rstest]
    #[case(-0.5)]
    #[case(0.0)]
    #[case(0.4)]
    #[case(0.7)]
    fn test_jacobian_matches_finite_difference(#[case] vd: f64) {
        let diode = Diode::new(1e-14, 1.5).expect("valid");
        assert_jacobian_matches(&diode, &[vd], &Step::dc(0.0), 1e-20);
    }

    #[test]
    fn test_jacobian_matches_over_bias_grid() {
        // n = 1.5 puts the exponent bound near 3.1 V, inside the sweep
        let diode = Diode::new(1e-14, 1.5).expect("valid");
        for k in 0..=110 {
            let vd = -2.0 + 0.05 * k as f64;
            assert_jacobian_matches(&diode, &[vd], &Step::dc(0.0), 1e-20);
        }
        let bound = 80.0 * 1.5 * DEFAULT_THERMAL_VOLTAGE;
        for vd in [bound - 1e-3, bound + 1e-3] {
            assert_jacobian_matches(&diode, &[vd], &Step::dc(0.0), 1e-20);
        }
    }

    #[test]
    fn test_reverse_bias_saturates() {
        let diode = Diode::new(1e-14, 1.0).expect("valid");
        let i = diode.current(&[-5.0], &Step::dc(0.0));
        assert!((i + 1e-14).abs() < 1e-20);
    }

    #[test]
    fn test_large_forward_step_is_damped() {
        let diode = Diode::new(1e-14, 1.0).expect("valid");
        let fraction = diode.limit_step(&[0.0], &[10.0]);
        assert!(fraction < 0.1, "fraction = {fraction}");
    }

    #[test]
    fn test_emission_coefficient_must_be_positive() {
        assert_eq!(
            Diode::new(1e-14, -1.0).unwrap_err(),
            DeviceError::NotPositive {
                parameter: "n",
                value: -1.0
            }
        );
    }
}
