// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for hull construction, ground-state scoring, and data loading.
//!
//! Every precondition the scoring pipeline relies on has its own variant so
//! callers can pattern-match on the failure mode instead of parsing strings.
//! Nothing in the crate retries or substitutes an approximation: an error
//! means the input violated a precondition.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ClexHullError>;

/// Errors arising from regrouping, geometry, scoring, fitting, or I/O.
#[derive(Debug, Error)]
pub enum ClexHullError {
    /// No records were supplied to the tabular regrouper.
    #[error("no records to regroup")]
    EmptyInput,

    /// A record's key set differs from the first record's.
    #[error("record {index} has inconsistent keys (missing: {missing:?}, extra: {extra:?})")]
    InconsistentKeys {
        /// Position of the offending record.
        index: usize,
        /// Keys present in the first record but absent here.
        missing: Vec<String>,
        /// Keys present here but absent from the first record.
        extra: Vec<String>,
    },

    /// Points are not in general position for hull construction.
    #[error("degenerate hull geometry: {0}")]
    DegenerateGeometry(String),

    /// No hull facet faces downward in energy.
    #[error("no facet of the convex hull faces downward in energy")]
    NoLowerHull,

    /// Two lower-hull vertices share a composition value.
    #[error("duplicate composition {composition} at configurations {first} and {second}")]
    DuplicateComposition {
        /// The shared composition value.
        composition: f64,
        /// Index of the first configuration.
        first: usize,
        /// Index of the second configuration.
        second: usize,
    },

    /// Summed stability windows are not strictly positive.
    #[error("ground-state accuracy undefined: total stability window is {0}")]
    DegenerateMetric(f64),

    /// Two inputs that must agree in length or width do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A field could not be interpreted as a rectangular numeric array.
    #[error("invalid shape for field '{field}': {reason}")]
    InvalidShape {
        /// Field name.
        field: String,
        /// What went wrong.
        reason: String,
    },

    /// A required field is absent from the dataset.
    #[error("missing field '{0}'")]
    MissingField(String),

    /// The operation is only defined for a different number of composition axes.
    #[error("stability windows need exactly {expected} composition axis, got {got}")]
    UnsupportedDimension {
        /// Required number of composition axes.
        expected: usize,
        /// Number supplied.
        got: usize,
    },

    /// A linear system had a vanishing pivot.
    #[error("singular linear system: {0}")]
    SingularSystem(String),

    /// Reading, parsing, or writing data failed.
    #[error("data loading failed: {0}")]
    DataLoad(String),

    /// The analysis configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for ClexHullError {
    fn from(e: std::io::Error) -> Self {
        Self::DataLoad(e.to_string())
    }
}

impl From<serde_json::Error> for ClexHullError {
    fn from(e: serde_json::Error) -> Self {
        Self::DataLoad(format!("JSON: {e}"))
    }
}
