//! Error types for the descent core

use thiserror::Error;

use crate::state::GridId;

/// Descent core error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from a persisted store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A history record that was never written
    #[error("grid {grid}: gradient history record {record} does not exist")]
    MissingRecord { grid: GridId, record: usize },

    /// Attempt to overwrite an existing history record
    #[error("grid {grid}: gradient history record {record} already written")]
    RecordExists { grid: GridId, record: usize },

    /// Record indices are 1-based
    #[error("grid {grid}: invalid gradient history record index {record}")]
    InvalidRecord { grid: GridId, record: usize },

    /// Field layout disagrees with the grid
    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: String,
        found: String,
    },

    /// Step-size denominator `<d,G> - <d,Ghat>` is numerically zero
    #[error(
        "iteration {iteration}: degenerate step size, <d,G> = {dot_old:e}, <d,Ghat> = {dot_new:e}"
    )]
    DegenerateStep {
        iteration: usize,
        dot_old: f64,
        dot_new: f64,
    },

    /// A scalar of the iteration state became NaN or infinite
    #[error("iteration {iteration}: non-finite {quantity} = {value}")]
    NonFinite {
        iteration: usize,
        quantity: &'static str,
        value: f64,
    },

    /// A norm used as a divisor vanished
    #[error("iteration {iteration}: {quantity} is zero")]
    ZeroNorm {
        iteration: usize,
        quantity: &'static str,
    },

    /// `advance` called with an iteration that does not follow the last one
    #[error("grid {grid}: iteration {iteration} out of sequence (last completed: {last:?})")]
    OutOfSequence {
        grid: GridId,
        iteration: usize,
        last: Option<usize>,
    },

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reported by a dot-product service
    #[error("dot product failed: {0}")]
    DotProduct(String),
}

impl Error {
    pub(crate) fn shape(
        what: impl Into<String>,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        Error::ShapeMismatch {
            what: what.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
