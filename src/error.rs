use derive_more::Display;

pub type Result<T> = core::result::Result<T, GraphError>;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Grid resolution was zero, or `resolution²` does not fit in a `usize`.
    #[display("invalid grid resolution: {_0}")]
    InvalidResolution(usize),
    /// A cell factory or tick output produced the wrong number of cells.
    #[display("expected {expected} cells, got {actual}")]
    CellCountMismatch { expected: usize, actual: usize },
    /// No catalog function has this name.
    #[display("unknown surface function: {_0:?}")]
    UnknownFunction(String),
}

impl std::error::Error for GraphError {}
