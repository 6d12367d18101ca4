//! Simplified Ebers-Moll NPN transistor.
//!
//! The device is split into two junction branches that share one parameter
//! block: collector-base (`c -> b`) scaled by `alpha_f`, and base-emitter
//! (`b -> e`). Both branches see the same local vector `[v_cb, v_be]`, so the
//! per-branch Jacobian rows line up with the 2x2 device Jacobian.
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::junction::{
    DEFAULT_THERMAL_VOLTAGE, critical_voltage, junction_step_fraction, limited_exp_m1,
};
use crate::branch::{Branch, Step};
use crate::circuit::ComponentId;
use crate::component::{Component, Connection};
use crate::error::DeviceError;
use crate::nodes::Node;
use crate::solution::Solution;

const CB: usize = 0;
const BE: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BjtParams {
    /// Emitter saturation current (A).
    pub i_es: f64,
    /// Forward common-base current gain.
    pub alpha_f: f64,
    /// Thermal voltage (V).
    pub vt: f64,
}

impl BjtParams {
    pub fn new(i_es: f64, alpha_f: f64, vt: f64) -> Result<Self, DeviceError> {
        let i_es = DeviceError::check_positive("i_es", i_es)?;
        let alpha_f = DeviceError::check_finite("alpha_f", alpha_f)?;
        if !(alpha_f > 0.0 && alpha_f <= 1.0) {
            return Err(DeviceError::OutOfRange {
                parameter: "alpha_f",
                range: "(0, 1]",
                value: alpha_f,
            });
        }
        let vt = DeviceError::check_positive("vt", vt)?;
        Ok(Self { i_es, alpha_f, vt })
    }

    fn critical_voltage(&self) -> f64 {
        critical_voltage(self.i_es, self.vt)
    }

    /// `i_es * (exp(v / vt) - 1)` and its derivative.
    fn junction(&self, v: f64) -> (f64, f64) {
        let (e, de) = limited_exp_m1(v / self.vt);
        (self.i_es * e, self.i_es / self.vt * de)
    }
}

/// NPN transistor with terminals `(collector, base, emitter)`.
#[derive(Debug, Clone)]
pub struct Bjt {
    params: Arc<BjtParams>,
}

impl Bjt {
    /// Transistor at the default room-temperature thermal voltage.
    pub fn new(i_es: f64, alpha_f: f64) -> Result<Self, DeviceError> {
        Ok(Self::from_params(BjtParams::new(
            i_es,
            alpha_f,
            DEFAULT_THERMAL_VOLTAGE,
        )?))
    }

    pub fn from_params(params: BjtParams) -> Self {
        Self {
            params: Arc::new(params),
        }
    }

    pub fn params(&self) -> &BjtParams {
        &self.params
    }

    /// Junction voltages and terminal currents of the transistor `id` in `solution`.
    ///
    /// `None` when `id` is not a BJT of the solved circuit.
    pub fn operating_point(solution: &Solution<'_>, id: ComponentId) -> Option<BjtOperatingPoint> {
        let circuit = solution.circuit();
        if circuit.component(id)?.kind() != "bjt" {
            return None;
        }
        let [c, b, e] = circuit.terminals(id)? else {
            return None;
        };
        let &[i_cb, i_be] = solution.branch_currents(id)? else {
            return None;
        };
        let (vc, vb, ve) = (
            solution.node_voltage(c)?,
            solution.node_voltage(b)?,
            solution.node_voltage(e)?,
        );
        Some(BjtOperatingPoint {
            v_cb: vc - vb,
            v_be: vb - ve,
            i_cb,
            i_be,
        })
    }
}

impl Component for Bjt {
    fn kind(&self) -> &'static str {
        "bjt"
    }

    fn terminals(&self) -> &'static [&'static str] {
        &["collector", "base", "emitter"]
    }

    fn connect(&self, nodes: &[Node]) -> Vec<Connection> {
        let [c, b, e] = nodes else {
            return Vec::new();
        };
        let senses = vec![(c.clone(), b.clone()), (b.clone(), e.clone())];
        let v_crit = self.params.critical_voltage();
        vec![
            Connection {
                head: c.clone(),
                tail: b.clone(),
                senses: senses.clone(),
                branch: Arc::new(CollectorBase {
                    params: Arc::clone(&self.params),
                    v_crit,
                }),
            },
            Connection {
                head: b.clone(),
                tail: e.clone(),
                senses,
                branch: Arc::new(BaseEmitter {
                    params: Arc::clone(&self.params),
                    v_crit,
                }),
            },
        ]
    }
}

#[derive(Debug)]
struct CollectorBase {
    params: Arc<BjtParams>,
    v_crit: f64,
}

impl Branch for CollectorBase {
    fn current(&self, v: &[f64], _step: &Step<'_>) -> f64 {
        self.params.alpha_f * self.params.junction(v[CB]).0
    }

    fn jacobian(&self, v: &[f64], _step: &Step<'_>) -> Vec<f64> {
        vec![self.params.alpha_f * self.params.junction(v[CB]).1, 0.0]
    }

    fn limit_step(&self, v_old: &[f64], v_new: &[f64]) -> f64 {
        junction_step_fraction(v_old[CB], v_new[CB], self.params.vt, self.v_crit)
    }
}

#[derive(Debug)]
struct BaseEmitter {
    params: Arc<BjtParams>,
    v_crit: f64,
}

impl Branch for BaseEmitter {
    fn current(&self, v: &[f64], _step: &Step<'_>) -> f64 {
        self.params.junction(v[BE]).0
    }

    fn jacobian(&self, v: &[f64], _step: &Step<'_>) -> Vec<f64> {
        vec![0.0, self.params.junction(v[BE]).1]
    }

    fn limit_step(&self, v_old: &[f64], v_new: &[f64]) -> f64 {
        junction_step_fraction(v_old[BE], v_new[BE], self.params.vt, self.v_crit)
    }
}

/// Derived quantities of a solved transistor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BjtOperatingPoint {
    pub v_cb: f64,
    pub v_be: f64,
    /// Collector-base branch current.
    pub i_cb: f64,
    /// Base-emitter branch current.
    pub i_be: f64,
}

impl BjtOperatingPoint {
    pub fn v_ce(&self) -> f64 {
        self.v_cb + self.v_be
    }

    /// Current flowing into the collector terminal.
    pub fn i_c(&self) -> f64 {
        self.i_cb
    }

    /// Current flowing out of the emitter terminal.
    pub fn i_e(&self) -> f64 {
        self.i_be
    }

    /// Current flowing into the base terminal.
    pub fn i_b(&self) -> f64 {
        self.i_be - self.i_cb
    }
}
