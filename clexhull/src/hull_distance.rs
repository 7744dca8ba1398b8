// SPDX-License-Identifier: AGPL-3.0-only

//! Distance of configurations from a (predicted) lower hull.
//!
//! The hull energy at an arbitrary composition is the piecewise-linear
//! interpolation of the hull vertices' energies over a Delaunay
//! triangulation of their compositions. The triangulation is the lower hull
//! of the paraboloid lift `x ↦ (x, |x − x̄|²)`, so it reuses [`ConvexHull`].
//!
//! A configuration whose energy falls below the interpolated hull breaks the
//! hull: the fit proposes it as a new ground state.

use crate::data::ClexDataset;
use crate::error::{ClexHullError, Result};
use crate::hull::{lower::lower_hull_with_tolerance, ConvexHull};
use crate::linalg::{solve, Matrix};
use crate::metric::lower_hull_of;
use crate::predictor::{EciModel, EnergyPredictor};
use crate::tolerances::{BARYCENTRIC_TOLERANCE, LOWER_HULL_NORMAL_TOLERANCE};
use std::collections::BTreeMap;

/// Barycentric weights of `point` with respect to the D+1 `corners` of a
/// D-simplex (one corner per row). The weights sum to 1 and reproduce
/// `point` as `Σ wᵢ cornerᵢ`.
///
/// # Errors
///
/// [`ClexHullError::ShapeMismatch`] if `corners` is not `(D+1) × D` for a
/// `D`-dimensional point; [`ClexHullError::SingularSystem`] if the corners
/// are affinely dependent.
pub fn simplex_corner_weights(point: &[f64], corners: &Matrix) -> Result<Vec<f64>> {
    let d = point.len();
    if corners.cols() != d || corners.rows() != d + 1 {
        return Err(ClexHullError::ShapeMismatch(format!(
            "{}x{} corners for a {d}-dimensional point",
            corners.rows(),
            corners.cols()
        )));
    }
    // rows 0..d: coordinates, row d: Σ w = 1
    let n = d + 1;
    let mut a = Matrix::zeros(n, n);
    for i in 0..n {
        for k in 0..d {
            a.set(k, i, corners.get(i, k));
        }
        a.set(d, i, 1.0);
    }
    let mut rhs = point.to_vec();
    rhs.push(1.0);
    solve(&a, &rhs)
}

/// Delaunay triangulation of a fixed set of composition points.
#[derive(Debug, Clone)]
pub struct DelaunayMesh {
    comps: Matrix,
    simplices: Vec<Vec<usize>>,
}

impl DelaunayMesh {
    /// Triangulate the rows of `comps`.
    ///
    /// Exactly D+1 points form a single simplex; more points are triangulated
    /// through the lower hull of their paraboloid lift.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::DegenerateGeometry`] for fewer than D+1 points or
    /// points that do not span composition space.
    pub fn new(comps: &Matrix) -> Result<Self> {
        let d = comps.cols();
        let n = comps.rows();
        if d == 0 || n < d + 1 {
            return Err(ClexHullError::DegenerateGeometry(format!(
                "{n} points cannot be triangulated in {d} dimensions"
            )));
        }

        let simplices = if n == d + 1 {
            let all: Vec<usize> = (0..n).collect();
            // rejects a flat simplex
            simplex_corner_weights(comps.row(0), comps).map_err(|_| {
                ClexHullError::DegenerateGeometry("hull vertices form a flat simplex".to_string())
            })?;
            vec![all]
        } else {
            let lift = ConvexHull::new(paraboloid_lift(comps)?)?;
            let lower = lower_hull_with_tolerance(&lift, LOWER_HULL_NORMAL_TOLERANCE)?;
            lower
                .simplices(&lift)
                .into_iter()
                .map(<[usize]>::to_vec)
                .collect()
        };
        tracing::debug!(n_points = n, n_simplices = simplices.len(), "triangulated hull compositions");
        Ok(Self {
            comps: comps.clone(),
            simplices,
        })
    }

    /// Point-index simplices of the triangulation.
    #[must_use]
    pub fn simplices(&self) -> &[Vec<usize>] {
        &self.simplices
    }

    /// First simplex containing `x` and the barycentric weights of `x` in it.
    ///
    /// `None` when `x` lies outside every simplex.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::ShapeMismatch`] if `x` has the wrong dimension.
    pub fn locate(&self, x: &[f64]) -> Result<Option<(&[usize], Vec<f64>)>> {
        if x.len() != self.comps.cols() {
            return Err(ClexHullError::ShapeMismatch(format!(
                "{}-dimensional query against {}-dimensional mesh",
                x.len(),
                self.comps.cols()
            )));
        }
        for simplex in &self.simplices {
            let corners = self.comps.select_rows(simplex);
            let weights = match simplex_corner_weights(x, &corners) {
                Ok(w) => w,
                Err(ClexHullError::SingularSystem(_)) => continue,
                Err(e) => return Err(e),
            };
            if weights.iter().all(|&w| w >= -BARYCENTRIC_TOLERANCE) {
                return Ok(Some((simplex.as_slice(), weights)));
            }
        }
        Ok(None)
    }
}

/// `(x − x̄, |x − x̄|²)` for each row; centering keeps the lift well scaled.
fn paraboloid_lift(comps: &Matrix) -> Result<Matrix> {
    let d = comps.cols();
    let n = comps.rows();
    let centroid: Vec<f64> = (0..d)
        .map(|k| comps.column(k).iter().sum::<f64>() / n as f64)
        .collect();
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let mut row: Vec<f64> = comps.row(i).iter().zip(&centroid).map(|(x, c)| x - c).collect();
            let r2 = row.iter().map(|v| v * v).sum();
            row.push(r2);
            row
        })
        .collect();
    Matrix::from_rows(&rows)
}

/// Piecewise-linear energy surface over a set of hull points.
#[derive(Debug, Clone)]
pub struct HullInterpolator {
    mesh: DelaunayMesh,
    energies: Vec<f64>,
}

impl HullInterpolator {
    /// # Errors
    ///
    /// [`ClexHullError::ShapeMismatch`] if the lengths differ; otherwise as
    /// [`DelaunayMesh::new`].
    pub fn new(comps: &Matrix, energies: &[f64]) -> Result<Self> {
        let mesh = DelaunayMesh::new(comps)?;
        Self::from_mesh(mesh, energies)
    }

    /// Reuse an existing triangulation with new vertex energies.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::ShapeMismatch`] if `energies` does not match the
    /// mesh points.
    pub fn from_mesh(mesh: DelaunayMesh, energies: &[f64]) -> Result<Self> {
        if mesh.comps.rows() != energies.len() {
            return Err(ClexHullError::ShapeMismatch(format!(
                "{} hull points but {} energies",
                mesh.comps.rows(),
                energies.len()
            )));
        }
        Ok(Self {
            mesh,
            energies: energies.to_vec(),
        })
    }

    /// Interpolated hull energy at `x`; `None` outside the hull's domain or
    /// for a query of the wrong dimension.
    #[must_use]
    pub fn interpolate(&self, x: &[f64]) -> Option<f64> {
        let (simplex, weights) = self.mesh.locate(x).ok()??;
        Some(
            simplex
                .iter()
                .zip(&weights)
                .map(|(&v, w)| w * self.energies[v])
                .sum(),
        )
    }
}

/// Energy of each test configuration minus the interpolated hull energy at
/// its composition. Negative values lie below the hull; `None` marks
/// compositions outside the hull's domain.
///
/// # Errors
///
/// As [`HullInterpolator::new`], plus [`ClexHullError::ShapeMismatch`] for
/// mismatched test arrays.
pub fn hull_distance(
    hull_comps: &Matrix,
    hull_energies: &[f64],
    test_comps: &Matrix,
    test_energies: &[f64],
) -> Result<Vec<Option<f64>>> {
    if test_comps.rows() != test_energies.len() {
        return Err(ClexHullError::ShapeMismatch(format!(
            "{} test compositions but {} energies",
            test_comps.rows(),
            test_energies.len()
        )));
    }
    if test_comps.cols() != hull_comps.cols() {
        return Err(ClexHullError::ShapeMismatch(format!(
            "test compositions have {} axes, hull has {}",
            test_comps.cols(),
            hull_comps.cols()
        )));
    }
    let interp = HullInterpolator::new(hull_comps, hull_energies)?;
    Ok(test_energies
        .iter()
        .enumerate()
        .map(|(i, e)| interp.interpolate(test_comps.row(i)).map(|h| e - h))
        .collect())
}

/// Count, over a set of ECI vectors, how often each configuration falls
/// below the predicted hull of the reference ground states.
///
/// The reference lower hull is built from the calculated configurations.
/// For every ECI vector, all configurations (calculated or not) and the
/// reference hull configurations are predicted; a configuration is proposed
/// when its hull distance is below `-tolerance`. Keys are original dataset
/// indices; configurations never proposed are absent.
///
/// # Errors
///
/// [`ClexHullError::EmptyInput`] if nothing is calculated; hull errors from
/// the reference set; prediction errors from the ECI vectors.
pub fn proposed_ground_states(
    dataset: &ClexDataset,
    eci_set: &[EciModel],
    tolerance: f64,
) -> Result<BTreeMap<usize, usize>> {
    let calc = dataset.calculated();
    if calc.formation_energy.is_empty() {
        return Err(ClexHullError::EmptyInput);
    }
    let reference = lower_hull_of(&calc.comp, &calc.formation_energy, LOWER_HULL_NORMAL_TOLERANCE)?;
    let hull_corr = calc.corr.select_rows(reference.vertices());
    let mesh = DelaunayMesh::new(&calc.comp.select_rows(reference.vertices()))?;

    let located: Vec<Option<(Vec<usize>, Vec<f64>)>> = (0..dataset.len())
        .map(|i| {
            Ok(mesh
                .locate(dataset.comp.row(i))?
                .map(|(s, w)| (s.to_vec(), w)))
        })
        .collect::<Result<_>>()?;

    let mut counts = BTreeMap::new();
    for model in eci_set {
        let predicted = model.predict(&dataset.corr)?;
        let hull_energy = model.predict(&hull_corr)?;
        for (i, loc) in located.iter().enumerate() {
            let Some((simplex, weights)) = loc else {
                continue;
            };
            let on_hull: f64 = simplex
                .iter()
                .zip(weights)
                .map(|(&v, w)| w * hull_energy[v])
                .sum();
            if predicted[i] - on_hull < -tolerance {
                *counts.entry(i).or_insert(0) += 1;
            }
        }
    }
    tracing::info!(
        n_eci = eci_set.len(),
        n_proposed = counts.len(),
        "collected proposed ground states"
    );
    Ok(counts)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::data::ConfigRecord;
    use crate::tolerances::{EXACT_F64, HULL_DISTANCE_TOLERANCE};

    #[test]
    fn corner_weights_of_triangle_centroid() {
        let corners = Matrix::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let w = simplex_corner_weights(&[1.0 / 3.0, 1.0 / 3.0], &corners).unwrap();
        for wi in &w {
            assert!((wi - 1.0 / 3.0).abs() < EXACT_F64);
        }
    }

    #[test]
    fn corner_weights_on_segment() {
        let corners = Matrix::column_vector(&[0.0, 1.0]);
        let w = simplex_corner_weights(&[0.25], &corners).unwrap();
        assert!((w[0] - 0.75).abs() < EXACT_F64);
        assert!((w[1] - 0.25).abs() < EXACT_F64);
        let outside = simplex_corner_weights(&[1.5], &corners).unwrap();
        assert!(outside[0] < 0.0);
    }

    #[test]
    fn corner_weights_degenerate_simplex() {
        let corners = Matrix::from_rows(&[vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();
        assert!(matches!(
            simplex_corner_weights(&[0.5, 0.5], &corners),
            Err(ClexHullError::SingularSystem(_))
        ));
        assert!(matches!(
            simplex_corner_weights(&[0.5], &corners),
            Err(ClexHullError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn binary_mesh_is_consecutive_segments() {
        let comps = Matrix::column_vector(&[1.0, 0.0, 0.5, 0.25]);
        let mesh = DelaunayMesh::new(&comps).unwrap();
        let mut simplices: Vec<Vec<usize>> = mesh.simplices().to_vec();
        simplices.sort();
        assert_eq!(simplices, vec![vec![0, 2], vec![1, 3], vec![2, 3]]);
    }

    #[test]
    fn two_point_mesh_is_single_simplex() {
        let interp = HullInterpolator::new(&Matrix::column_vector(&[0.0, 1.0]), &[0.0, -1.0]).unwrap();
        assert!((interp.interpolate(&[0.3]).unwrap() + 0.3).abs() < EXACT_F64);
        assert!(interp.interpolate(&[1.2]).is_none());
    }

    #[test]
    fn interpolation_is_piecewise_linear() {
        let comps = Matrix::column_vector(&[0.0, 0.5, 1.0]);
        let interp = HullInterpolator::new(&comps, &[0.0, -1.0, 0.0]).unwrap();
        assert!((interp.interpolate(&[0.25]).unwrap() + 0.5).abs() < EXACT_F64);
        assert!((interp.interpolate(&[0.75]).unwrap() + 0.5).abs() < EXACT_F64);
        assert!((interp.interpolate(&[0.5]).unwrap() + 1.0).abs() < EXACT_F64);
        assert!(interp.interpolate(&[-0.1]).is_none());
        assert!(interp.interpolate(&[0.5, 0.5]).is_none());
    }

    #[test]
    fn ternary_interpolation_reproduces_plane() {
        // E = 1 + 2a - 3b is linear, so any triangulation reproduces it
        let comps = Matrix::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.3, 0.2],
        ])
        .unwrap();
        let e: Vec<f64> = comps.to_rows().iter().map(|r| 1.0 + 2.0 * r[0] - 3.0 * r[1]).collect();
        let interp = HullInterpolator::new(&comps, &e).unwrap();
        assert_eq!(interp.mesh.simplices().len(), 3);
        let got = interp.interpolate(&[0.1, 0.6]).unwrap();
        assert!((got - (1.0 + 0.2 - 1.8)).abs() < 1e-9);
        assert!(interp.interpolate(&[0.8, 0.8]).is_none());
    }

    #[test]
    fn hull_distance_signs() {
        let hull_c = Matrix::column_vector(&[0.0, 0.5, 1.0]);
        let test_c = Matrix::column_vector(&[0.25, 0.5, 0.75, 2.0]);
        let d = hull_distance(&hull_c, &[0.0, -1.0, 0.0], &test_c, &[-0.7, -1.0, 0.1, 0.0]).unwrap();
        assert!((d[0].unwrap() + 0.2).abs() < EXACT_F64);
        assert!(d[1].unwrap().abs() < EXACT_F64);
        assert!((d[2].unwrap() - 0.6).abs() < EXACT_F64);
        assert!(d[3].is_none());
    }

    #[test]
    fn hull_distance_rejects_mismatch() {
        let c = Matrix::column_vector(&[0.0, 1.0]);
        assert!(matches!(
            hull_distance(&c, &[0.0, 0.0], &c, &[0.0]),
            Err(ClexHullError::ShapeMismatch(_))
        ));
    }

    fn binary_dataset() -> ClexDataset {
        // corr = [1, x, x²]; reference hull is {0, 2, 4}
        let xs = [0.0, 0.25, 0.5, 0.75, 1.0, 0.6];
        let energies = [Some(0.0), Some(-0.5), Some(-1.5), Some(-0.5), Some(0.0), None];
        let records: Vec<ConfigRecord> = xs
            .iter()
            .zip(energies)
            .enumerate()
            .map(|(i, (&x, e))| ConfigRecord {
                name: format!("c{i}"),
                comp: vec![x],
                corr: vec![1.0, x, x * x],
                formation_energy: e,
            })
            .collect();
        ClexDataset::from_records(&records).unwrap()
    }

    #[test]
    fn linear_eci_proposes_nothing() {
        // E linear in x: every configuration sits exactly on the predicted hull
        let counts = proposed_ground_states(
            &binary_dataset(),
            &[EciModel { eci: vec![0.1, -0.4, 0.0] }],
            HULL_DISTANCE_TOLERANCE,
        )
        .unwrap();
        assert!(counts.is_empty());
    }

    #[test]
    fn convex_eci_proposes_interior_configs() {
        // E = x² - x is convex: hull segments between 0, 0.5, 1 lie above
        // the interior points 0.25, 0.6, 0.75
        let model = EciModel { eci: vec![0.0, -1.0, 1.0] };
        let counts = proposed_ground_states(&binary_dataset(), &[model.clone(), model], 1e-9).unwrap();
        let keys: Vec<usize> = counts.keys().copied().collect();
        assert_eq!(keys, vec![1, 3, 5]);
        assert!(counts.values().all(|&c| c == 2));
    }

    #[test]
    fn nothing_calculated_is_empty_input() {
        let mut ds = binary_dataset();
        ds.formation_energy = vec![None; ds.len()];
        assert!(matches!(
            proposed_ground_states(&ds, &[], 0.0),
            Err(ClexHullError::EmptyInput)
        ));
    }
}
