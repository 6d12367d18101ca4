use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum LuError {
    #[error("matrix is singular at column {column}")]
    Singular { column: usize },
}
