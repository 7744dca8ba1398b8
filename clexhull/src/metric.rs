// SPDX-License-Identifier: AGPL-3.0-only

//! Ground-state accuracy: window-weighted recovery of reference ground states.
//!
//! A fit that reproduces every reference ground state scores 1. Each
//! predicted interior ground state is weighted by its chemical-potential
//! window, so missing a configuration that is stable over a wide μ range
//! costs more than missing a marginal one. The compositional extremes are
//! excluded because their windows are unbounded.
//!
//! ```text
//! score = Σ_{v ∈ interior(predicted) ∩ truth} w_v / Σ_{v ∈ interior(predicted)} w_v
//! ```

use crate::error::{ClexHullError, Result};
use crate::hull::{lower::lower_hull_with_tolerance, ConvexHull, LowerHull};
use crate::linalg::Matrix;
use crate::tolerances::LOWER_HULL_NORMAL_TOLERANCE;
use crate::windows::{stability_windows, StabilityWindows};
use serde::Serialize;
use std::collections::BTreeSet;

/// Full result of a ground-state accuracy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundStateAccuracy {
    /// Window-weighted recovery, in [0, 1]
    pub score: f64,
    /// Summed windows of recovered interior ground states
    pub numerator: f64,
    /// Summed windows of all predicted interior ground states
    pub denominator: f64,
    /// Vertices of the predicted lower hull
    pub predicted_ground_states: Vec<usize>,
    /// Predicted interior ground states that are also reference ground states
    pub recovered: Vec<usize>,
    /// Predicted interior ground states absent from the reference set
    pub spurious: Vec<usize>,
    /// Slopes and windows of the predicted lower hull
    pub windows: StabilityWindows,
}

/// Lower hull of a composition–energy data set.
///
/// # Errors
///
/// Propagates [`ClexHullError::DegenerateGeometry`],
/// [`ClexHullError::ShapeMismatch`], and [`ClexHullError::NoLowerHull`].
pub fn lower_hull_of(comp: &Matrix, energy: &[f64], tolerance: f64) -> Result<LowerHull> {
    let hull = ConvexHull::from_composition_energy(comp, energy)?;
    lower_hull_with_tolerance(&hull, tolerance)
}

/// Reference ground-state indices: vertices of the lower hull.
///
/// # Errors
///
/// As [`lower_hull_of`].
pub fn reference_ground_states(comp: &Matrix, energy: &[f64]) -> Result<Vec<usize>> {
    Ok(lower_hull_of(comp, energy, LOWER_HULL_NORMAL_TOLERANCE)?
        .vertices()
        .to_vec())
}

/// Score predicted energies against a reference ground-state set with an
/// explicit lower-hull tolerance.
///
/// # Errors
///
/// Hull errors as [`lower_hull_of`];
/// [`ClexHullError::UnsupportedDimension`] unless there is exactly one
/// composition axis; [`ClexHullError::DuplicateComposition`] from the slope
/// step; [`ClexHullError::DegenerateMetric`] if the summed interior windows
/// are not strictly positive.
pub fn evaluate_with_tolerance(
    comp: &Matrix,
    predicted_energy: &[f64],
    true_ground_states: &BTreeSet<usize>,
    tolerance: f64,
) -> Result<GroundStateAccuracy> {
    let lower = lower_hull_of(comp, predicted_energy, tolerance)?;
    if comp.cols() != 1 {
        return Err(ClexHullError::UnsupportedDimension {
            expected: 1,
            got: comp.cols(),
        });
    }

    let vertices = lower.vertices();
    let x: Vec<f64> = vertices.iter().map(|&v| comp.get(v, 0)).collect();
    let e: Vec<f64> = vertices.iter().map(|&v| predicted_energy[v]).collect();
    let windows = stability_windows(vertices, &x, &e)?;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    let mut recovered = Vec::new();
    let mut spurious = Vec::new();
    for (v, w) in windows.interior() {
        denominator += w;
        if true_ground_states.contains(&v) {
            numerator += w;
            recovered.push(v);
        } else {
            spurious.push(v);
        }
    }
    if !(denominator.is_finite() && denominator > 0.0) {
        return Err(ClexHullError::DegenerateMetric(denominator));
    }

    let score = numerator / denominator;
    tracing::debug!(
        score,
        n_predicted = vertices.len(),
        n_recovered = recovered.len(),
        n_spurious = spurious.len(),
        "ground-state accuracy"
    );
    Ok(GroundStateAccuracy {
        score,
        numerator,
        denominator,
        predicted_ground_states: vertices.to_vec(),
        recovered,
        spurious,
        windows,
    })
}

/// Score predicted energies against a reference ground-state set.
///
/// # Errors
///
/// As [`evaluate_with_tolerance`].
pub fn evaluate(
    comp: &Matrix,
    predicted_energy: &[f64],
    true_ground_states: &BTreeSet<usize>,
) -> Result<GroundStateAccuracy> {
    evaluate_with_tolerance(
        comp,
        predicted_energy,
        true_ground_states,
        LOWER_HULL_NORMAL_TOLERANCE,
    )
}

/// Ground-state accuracy score only.
///
/// # Errors
///
/// As [`evaluate_with_tolerance`].
pub fn ground_state_accuracy(
    comp: &Matrix,
    predicted_energy: &[f64],
    true_ground_states: &[usize],
) -> Result<f64> {
    let truth: BTreeSet<usize> = true_ground_states.iter().copied().collect();
    Ok(evaluate(comp, predicted_energy, &truth)?.score)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tolerances::EXACT_F64;

    const GRID: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

    fn comp() -> Matrix {
        Matrix::column_vector(&GRID)
    }

    #[test]
    fn identical_prediction_scores_one() {
        let e = [0.0, -0.5, -1.5, -0.5, 0.0];
        let truth = reference_ground_states(&comp(), &e).unwrap();
        assert_eq!(truth, vec![0, 2, 4]);
        let score = ground_state_accuracy(&comp(), &e, &truth).unwrap();
        assert!((score - 1.0).abs() < EXACT_F64);
    }

    #[test]
    fn displaced_minimum_drops_score() {
        let truth = [0, 2, 4];
        let predicted = [0.0, -0.5, -0.4, -0.5, 0.0];
        let report = evaluate(&comp(), &predicted, &truth.into_iter().collect()).unwrap();
        assert_eq!(report.predicted_ground_states, vec![0, 1, 3, 4]);
        assert!(report.score < 1.0);
        assert!(report.score.abs() < EXACT_F64);
        assert_eq!(report.spurious, vec![1, 3]);
        assert!((report.denominator - 4.0).abs() < EXACT_F64);
    }

    #[test]
    fn convex_five_point_partial_truth() {
        let e = [0.0, -1.0, -1.5, -1.0, 0.0];
        let report = evaluate(&comp(), &e, &[0, 2, 4].into_iter().collect()).unwrap();
        assert_eq!(report.predicted_ground_states, vec![0, 1, 2, 3, 4]);
        assert!((report.score - 0.5).abs() < EXACT_F64);
        assert_eq!(report.recovered, vec![2]);
    }

    #[test]
    fn extremes_never_count() {
        // truth holds only the extremes: no interior window is recovered
        let e = [0.0, -0.5, -1.5, -0.5, 0.0];
        let score = ground_state_accuracy(&comp(), &e, &[0, 4]).unwrap();
        assert!(score.abs() < EXACT_F64);
    }

    #[test]
    fn two_vertex_lower_hull_is_degenerate_metric() {
        let c = Matrix::column_vector(&[0.0, 1.0, 0.5]);
        let err = ground_state_accuracy(&c, &[0.0, 0.0, 1.0], &[0, 1]).unwrap_err();
        assert!(matches!(err, ClexHullError::DegenerateMetric(_)));
    }

    #[test]
    fn collinear_prediction_is_degenerate_geometry() {
        let c = Matrix::column_vector(&[0.0, 0.5, 1.0]);
        let err = ground_state_accuracy(&c, &[0.0, -1.0, -2.0], &[0, 2]).unwrap_err();
        assert!(matches!(err, ClexHullError::DegenerateGeometry(_)));
    }

    #[test]
    fn ternary_compositions_unsupported() {
        let c = Matrix::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.3, 0.3],
        ])
        .unwrap();
        let err = ground_state_accuracy(&c, &[0.0, 0.0, 0.0, -1.0], &[0, 1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            ClexHullError::UnsupportedDimension { expected: 1, got: 2 }
        ));
    }

    #[test]
    fn weights_follow_window_width() {
        // slopes -2, -1, 5: vertex 1 has window 1, vertex 2 has window 6
        let c = Matrix::column_vector(&[0.0, 0.5, 0.75, 1.0]);
        let e = [0.0, -1.0, -1.25, 0.0];
        let report = evaluate(&c, &e, &[0, 2, 3].into_iter().collect()).unwrap();
        assert_eq!(report.windows.windows.len(), 2);
        assert!((report.score - 6.0 / 7.0).abs() < EXACT_F64);
    }
}
