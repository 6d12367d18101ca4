mod bjt;
mod capacitor;
mod diode;
pub(crate) mod junction;
mod resistor;
mod sources;

pub use bjt::{Bjt, BjtOperatingPoint, BjtParams};
pub use capacitor::Capacitor;
pub use diode::Diode;
pub use junction::DEFAULT_THERMAL_VOLTAGE;
pub use resistor::Resistor;
pub use sources::{CurrentSource, DEFAULT_SERIES_RESISTANCE, VoltageSource};
