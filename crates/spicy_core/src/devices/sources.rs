//! Independent sources.
//!
//! There are no auxiliary current unknowns in a pure nodal formulation, so a
//! voltage source is modelled as its Thevenin equivalent: the EMF in series
//! with a small resistance.
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::branch::{Branch, Step};
use crate::component::{Component, Connection};
use crate::error::DeviceError;
use crate::nodes::Node;
use crate::waveform::Waveform;

/// Series resistance used by [`VoltageSource::ideal`] (ohms).
pub const DEFAULT_SERIES_RESISTANCE: f64 = 1e-3;

/// Current source driving `waveform(t)` amps from `positive`, through the
/// source, into `negative`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSource {
    waveform: Waveform,
}

impl CurrentSource {
    pub fn new(waveform: impl Into<Waveform>) -> Self {
        Self {
            waveform: waveform.into(),
        }
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }
}

impl Branch for CurrentSource {
    fn current(&self, _v: &[f64], step: &Step<'_>) -> f64 {
        self.waveform.value(step.time)
    }

    fn jacobian(&self, _v: &[f64], _step: &Step<'_>) -> Vec<f64> {
        Vec::new()
    }
}

impl Component for CurrentSource {
    fn kind(&self) -> &'static str {
        "current_source"
    }

    fn terminals(&self) -> &'static [&'static str] {
        &["positive", "negative"]
    }

    fn connect(&self, nodes: &[Node]) -> Vec<Connection> {
        match nodes {
            [p, n] => vec![Connection {
                head: p.clone(),
                tail: n.clone(),
                senses: Vec::new(),
                branch: Arc::new(self.clone()),
            }],
            _ => Vec::new(),
        }
    }
}

/// Voltage source holding `V(positive) - V(negative)` at `waveform(t)` behind
/// `series_resistance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageSource {
    waveform: Waveform,
    series_resistance: f64,
}

impl VoltageSource {
    pub fn new(
        waveform: impl Into<Waveform>,
        series_resistance: f64,
    ) -> Result<Self, DeviceError> {
        Ok(Self {
            waveform: waveform.into(),
            series_resistance: DeviceError::check_positive(
                "series_resistance",
                series_resistance,
            )?,
        })
    }

    pub fn ideal(waveform: impl Into<Waveform>) -> Self {
        Self {
            waveform: waveform.into(),
            series_resistance: DEFAULT_SERIES_RESISTANCE,
        }
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    pub fn series_resistance(&self) -> f64 {
        self.series_resistance
    }
}

impl Branch for VoltageSource {
    fn current(&self, v: &[f64], step: &Step<'_>) -> f64 {
        (v[0] - self.waveform.value(step.time)) / self.series_resistance
    }

    fn jacobian(&self, _v: &[f64], _step: &Step<'_>) -> Vec<f64> {
        vec![1.0 / self.series_resistance]
    }
}

impl Component for VoltageSource {
    fn kind(&self) -> &'static str {
        "voltage_source"
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

    #[test]
    fn test_thevenin_current_at_source_time() {
        let source = VoltageSource::new(Waveform::sine(0.0, 1.0, 1.0), 10.0).expect("valid");
        // quarter period: emf = 1 V, node held at 0 V -> 0.1 A pushed into `positive`
        let i = source.current(&[0.0], &Step::dc(0.25));
        assert!((i + 0.1).abs() < 1e-12);
        assert_jacobian_matches(&source, &[0.3], &Step::dc(0.25), 1e-9);
    }

    #[test]
    fn test_current_source_has_no_control_voltages() {
        let source = CurrentSource::new(2e-3);
        assert_eq!(source.current(&[], &Step::dc(0.0)), 2e-3);
        assert!(source.jacobian(&[], &Step::dc(0.0)).is_empty());
    }

    #[test]
    fn test_series_resistance_must_be_positive() {
        assert!(VoltageSource::new(5.0, 0.0).is_err());
    }
}
