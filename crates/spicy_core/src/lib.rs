//! Nonlinear circuit equation solving.
//!
//! Circuits are assembled from [`Component`]s, each contributing one or more
//! [`Branch`]es whose current is a function of a few node-pair voltages. The
//! node voltages are found by damped Newton-Raphson on the KCL equations,
//! either as a single DC operating point ([`solve_dc`]) or as a sequence of
//! warm-started steps ([`solve_transient`]).
//!
//! ```no_run
//! use spicy_core::devices::{Bjt, VoltageSource};
//! use spicy_core::{Circuit, SimulationConfig, solve_dc};
//!
//! let mut builder = Circuit::builder();
//! builder.add("Vcc", VoltageSource::new(10.0, 1e3)?, &["c", "0"]);
//! builder.add("Vbb", VoltageSource::new(5.0, 43e3)?, &["b", "0"]);
//! let q1 = builder.add("Q1", Bjt::new(1e-12, 0.99)?, &["c", "b", "0"]);
//! let circuit = builder.build()?;
//!
//! let config = SimulationConfig::default();
//! let op = solve_dc(&circuit, &config.newton)?;
//! let q = Bjt::operating_point(&op, q1).expect("q1 is a bjt");
//! println!("v_be = {:.4} V, i_c = {:.4e} A", q.v_be, q.i_c());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use serde::{Deserialize, Serialize};

pub mod branch;
pub mod circuit;
pub mod component;
pub mod dc;
pub mod devices;
pub mod error;
mod matrix;
pub mod newton;
pub mod nodes;
pub mod solution;
mod solver;
pub mod trans;
mod union_find;
pub mod waveform;

pub use branch::{Branch, BranchState, Step};
pub use circuit::{Circuit, CircuitBuilder, ComponentId, Island};
pub use component::{Component, Connection};
pub use dc::{solve_dc, solve_dc_at, solve_dc_from};
pub use error::{DeviceError, SolveError, TopologyError, TransientError};
pub use newton::NewtonConfig;
pub use nodes::{GROUND, Node};
pub use solution::Solution;
pub use trans::{
    IntegrationMethod, StepStats, TransientConfig, TransientResult, solve_transient,
    solve_transient_from,
};
pub use waveform::Waveform;

/// Settings for every analysis. Missing fields fall back to their defaults
/// when deserialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub newton: NewtonConfig,
    pub transient: TransientConfig,
}
