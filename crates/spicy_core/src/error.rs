use thiserror::Error;

/// Invalid device parameters, rejected at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("{parameter} must be finite (got {value})")]
    NotFinite { parameter: &'static str, value: f64 },

    #[error("{parameter} must be > 0 (got {value})")]
    NotPositive { parameter: &'static str, value: f64 },

    #[error("{parameter} must lie in {range} (got {value})")]
    OutOfRange {
        parameter: &'static str,
        range: &'static str,
        value: f64,
    },
}

impl DeviceError {
    pub(crate) fn check_finite(parameter: &'static str, value: f64) -> Result<f64, Self> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Self::NotFinite { parameter, value })
        }
    }

    pub(crate) fn check_positive(parameter: &'static str, value: f64) -> Result<f64, Self> {
        let value = Self::check_finite(parameter, value)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(Self::NotPositive { parameter, value })
        }
    }
}

/// Problems with how components are wired together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("component '{component}' already exists")]
    DuplicateComponent { component: String },

    #[error("component '{component}' ({kind}) expects {expected} terminals, got {actual}")]
    TerminalCount {
        component: String,
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("branch {branch} of '{component}' references node '{node}' it was not connected to")]
    ForeignNode {
        component: String,
        branch: usize,
        node: String,
    },

    #[error("branch {branch} of '{component}' touches no non-ground node")]
    DegenerateBranch { component: String, branch: usize },

    #[error("replacement for '{component}' does not match its existing connections")]
    IncompatibleReplacement { component: String },

    #[error("unknown component id {id}")]
    UnknownComponent { id: usize },
}

/// Newton-Raphson failures. Every variant carries the iteration count and the
/// last KCL residual (one entry per non-ground node).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("newton iteration diverged after {iterations} iterations")]
    Diverged { iterations: usize, residual: Vec<f64> },

    #[error("newton iteration did not converge within {iterations} iterations")]
    MaxIterationsExceeded { iterations: usize, residual: Vec<f64> },

    #[error("singular jacobian at column {column} after {iterations} iterations (floating node?)")]
    SingularSystem {
        column: usize,
        iterations: usize,
        residual: Vec<f64>,
    },

    #[error("initial guess has {actual} entries, circuit has {expected} nodes")]
    GuessLength { expected: usize, actual: usize },
}

impl SolveError {
    pub fn iterations(&self) -> usize {
        match self {
            Self::Diverged { iterations, .. }
            | Self::MaxIterationsExceeded { iterations, .. }
            | Self::SingularSystem { iterations, .. } => *iterations,
            Self::GuessLength { .. } => 0,
        }
    }

    pub fn residual(&self) -> &[f64] {
        match self {
            Self::Diverged { residual, .. }
            | Self::MaxIterationsExceeded { residual, .. }
            | Self::SingularSystem { residual, .. } => residual,
            Self::GuessLength { .. } => &[],
        }
    }

    /// Failures a smaller time step may cure.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::GuessLength { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransientError {
    #[error("time points must be finite and strictly increasing (index {index})")]
    InvalidTimePoints { index: usize },

    #[error("initial solution has {actual} entries, circuit has {expected} nodes")]
    InitialSolutionLength { expected: usize, actual: usize },

    #[error("initial operating point failed: {0}")]
    InitialOperatingPoint(#[source] SolveError),

    #[error("step ending at t={time} failed (dt={dt}): {source}")]
    StepFailed {
        time: f64,
        dt: f64,
        #[source]
        source: SolveError,
    },
}
