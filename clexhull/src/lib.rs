// SPDX-License-Identifier: AGPL-3.0-only

//! clexhull: ground-state accuracy of cluster-expansion energy fits
//!
//! Scores how well predicted formation energies reproduce the reference
//! ground states (lower convex hull) of a set of configurations. Each
//! predicted ground state is weighted by its chemical-potential stability
//! window rather than counted.
//!
//! ## Modules
//!   - `data`: record loading, columnar regrouping, typed dataset
//!   - `shape`: n-d numeric arrays for regrouped columns (stack, squeeze)
//!   - `linalg`: dense row-major matrix, LU solve, determinant
//!   - `hull`: incremental convex hull; `hull::lower` lower-hull extraction
//!   - `windows`: hull slopes and stability windows (one composition axis)
//!   - `metric`: window-weighted ground-state accuracy
//!   - `predictor`: energy predictors: fixed ECI, ridge with LOO-CV
//!   - `hull_distance`: Delaunay interpolation and distance below a hull
//!   - `pipeline`: end-to-end analysis and JSON report
//!   - `config`: analysis settings (JSON + `--key=value` overrides)
//!   - `tolerances`: every numerical threshold, in one place
//!   - `validation`: pass/fail harness for the validation binary
//!
//! ## Binaries
//!   - `ground_state_accuracy`: fit ridge ECI to a record file and report
//!   - `validate_ground_state`: known-answer checks, exit code 0/1

pub mod config;
pub mod data;
pub mod error;
pub mod hull;
pub mod hull_distance;
pub mod linalg;
pub mod metric;
pub mod pipeline;
pub mod predictor;
pub mod shape;
pub mod tolerances;
pub mod validation;
pub mod windows;

pub use error::{ClexHullError, Result};
