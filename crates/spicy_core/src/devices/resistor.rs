use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::branch::{Branch, Step};
use crate::component::{Component, Connection};
use crate::error::DeviceError;
use crate::nodes::Node;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resistor {
    resistance: f64,
}

impl Resistor {
    pub fn new(resistance: f64) -> Result<Self, DeviceError> {
        Ok(Self {
            resistance: DeviceError::check_positive("resistance", resistance)?,
        })
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl Branch for Resistor {
    fn current(&self, v: &[f64], _step: &Step<'_>) -> f64 {
        v[0] / self.resistance
    }

    fn jacobian(&self, _v: &[f64], _step: &Step<'_>) -> Vec<f64> {
        vec![self.conductance()]
    }
}

impl Component for Resistor {
    fn kind(&self) -> &'static str {
        "resistor"
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
    fn test_ohms_law() {
        let r = Resistor::new(2e3).expect("valid");
        assert_eq!(r.current(&[4.0], &Step::dc(0.0)), 2e-3);
        assert_jacobian_matches(&r, &[4.0], &Step::dc(0.0), 1e-12);
    }

    #[test]
    fn test_zero_resistance_is_rejected() {
        assert!(matches!(
            Resistor::new(0.0),
            Err(DeviceError::NotPositive { .. })
        ));
    }
}
