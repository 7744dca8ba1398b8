// SPDX-License-Identifier: AGPL-3.0-only

//! Convex hulls of composition–energy points.
//!
//! Classic incremental (beneath-beyond) construction in d = D+1 dimensions:
//!
//! 1. Grow an initial d-simplex from extreme points, rejecting point sets
//!    whose affine span is lower-dimensional.
//! 2. Insert each remaining point: find the facets it sees, take the horizon
//!    ridges (ridges of exactly one visible facet), and replace the visible
//!    facets with the cone from the point to the horizon.
//! 3. Keep only extreme vertices. A point inserted before the points that
//!    flatten its neighborhood survives step 2 as a vertex on an edge or
//!    inside a flat patch; its incident facet normals then fail to span all
//!    d dimensions. Rebuild over the extreme points until none is dropped.
//!
//! Facets are simplices of d point indices carrying a unit outward normal and
//! offset: interior points satisfy `normal · x + offset <= 0`. Points within
//! [`HULL_PLANE_TOLERANCE`] of a facet plane are coplanar and never become
//! vertices, whatever the input order.

pub mod lower;

pub use lower::{lower_hull, LowerHull};

use crate::error::{ClexHullError, Result};
use crate::linalg::{determinant, dot, Matrix};
use crate::tolerances::{AFFINE_RANK_TOLERANCE, HULL_PLANE_TOLERANCE};
use std::collections::{BTreeMap, HashMap};

/// One hull facet: a simplex and its hyperplane.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    vertices: Vec<usize>,
    normal: Vec<f64>,
    offset: f64,
}

impl Facet {
    /// Point indices of the simplex, ascending.
    #[must_use]
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// Unit outward normal.
    #[must_use]
    pub fn normal(&self) -> &[f64] {
        &self.normal
    }

    /// Plane offset: `normal · x + offset = 0` on the facet.
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    /// Signed distance of `x` from the facet plane (positive = outside).
    #[must_use]
    pub fn signed_distance(&self, x: &[f64]) -> f64 {
        dot(&self.normal, x) + self.offset
    }
}

/// Immutable convex hull of a fixed point set.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    points: Matrix,
    facets: Vec<Facet>,
    vertices: Vec<usize>,
}

impl ConvexHull {
    /// Hull of composition rows extended by their energies.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::ShapeMismatch`] if the lengths differ, otherwise as
    /// [`ConvexHull::new`].
    pub fn from_composition_energy(comp: &Matrix, energy: &[f64]) -> Result<Self> {
        if comp.rows() != energy.len() {
            return Err(ClexHullError::ShapeMismatch(format!(
                "{} compositions but {} energies",
                comp.rows(),
                energy.len()
            )));
        }
        Self::new(comp.append_column(energy)?)
    }

    /// Hull of the rows of `points`.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::DegenerateGeometry`] when the points are non-finite,
    /// too few, or not full-dimensional.
    pub fn new(points: Matrix) -> Result<Self> {
        let dim = points.cols();
        let n = points.rows();
        if dim < 2 {
            return Err(ClexHullError::DegenerateGeometry(format!(
                "hull needs at least 2 dimensions, got {dim}"
            )));
        }
        if n < dim + 1 {
            return Err(ClexHullError::DegenerateGeometry(format!(
                "{n} points cannot span {dim} dimensions"
            )));
        }
        if points.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(ClexHullError::DegenerateGeometry(
                "non-finite coordinate".to_string(),
            ));
        }

        let scale = points.max_abs().max(1.0);
        let mut candidates: Vec<usize> = (0..n).collect();
        let mut facets = build_facets(&points, &candidates, scale)?;
        let mut vertices = facet_vertices(&facets);
        loop {
            let extreme = extreme_vertices(&facets, dim);
            if extreme.len() == vertices.len() {
                break;
            }
            tracing::trace!(
                dropped = vertices.len() - extreme.len(),
                "rebuilding hull without flat-boundary vertices"
            );
            candidates = extreme;
            facets = build_facets(&points, &candidates, scale)?;
            vertices = facet_vertices(&facets);
        }

        tracing::debug!(
            n_points = n,
            dim,
            n_facets = facets.len(),
            n_vertices = vertices.len(),
            "built convex hull"
        );
        Ok(Self {
            points,
            facets,
            vertices,
        })
    }

    /// Input points, one per row.
    #[must_use]
    pub const fn points(&self) -> &Matrix {
        &self.points
    }

    #[must_use]
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// Sorted indices of points that are hull vertices.
    #[must_use]
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// Dimension of the points (D+1).
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.points.cols()
    }
}

/// Incremental hull facets over the `candidates` rows of `points`.
fn build_facets(points: &Matrix, candidates: &[usize], scale: f64) -> Result<Vec<Facet>> {
    let dim = points.cols();
    let simplex = initial_simplex(points, candidates, scale)?;
    let interior: Vec<f64> = (0..dim)
        .map(|k| simplex.iter().map(|&i| points.get(i, k)).sum::<f64>() / (dim + 1) as f64)
        .collect();

    let mut facets = Vec::with_capacity(2 * (dim + 1));
    for skip in 0..simplex.len() {
        let verts: Vec<usize> = simplex
            .iter()
            .enumerate()
            .filter_map(|(j, &v)| (j != skip).then_some(v))
            .collect();
        facets.push(make_facet(points, verts, &interior)?);
    }

    let visible_tol = HULL_PLANE_TOLERANCE * scale;
    for &idx in candidates {
        if simplex.contains(&idx) {
            continue;
        }
        let p = points.row(idx);
        let (visible, kept): (Vec<Facet>, Vec<Facet>) = facets
            .into_iter()
            .partition(|f| f.signed_distance(p) > visible_tol);
        facets = kept;
        if visible.is_empty() {
            continue;
        }
        for ridge in horizon(&visible) {
            let mut verts = ridge;
            verts.push(idx);
            verts.sort_unstable();
            facets.push(make_facet(points, verts, &interior)?);
        }
    }
    Ok(facets)
}

fn facet_vertices(facets: &[Facet]) -> Vec<usize> {
    let mut vertices: Vec<usize> = facets.iter().flat_map(|f| f.vertices.iter().copied()).collect();
    vertices.sort_unstable();
    vertices.dedup();
    vertices
}

/// Sorted vertices whose incident facet normals span all `dim` dimensions.
///
/// The normal cone of a point in the relative interior of a k-face has
/// dimension d − k, so only 0-faces (true vertices) reach full rank.
fn extreme_vertices(facets: &[Facet], dim: usize) -> Vec<usize> {
    let mut incident: BTreeMap<usize, Vec<&[f64]>> = BTreeMap::new();
    for f in facets {
        for &v in &f.vertices {
            incident.entry(v).or_default().push(&f.normal);
        }
    }
    incident
        .into_iter()
        .filter_map(|(v, normals)| (normal_rank(&normals, dim) == dim).then_some(v))
        .collect()
}

/// Rank of a set of unit normals; directions closer than
/// [`HULL_PLANE_TOLERANCE`] to the span of earlier ones add nothing.
fn normal_rank(normals: &[&[f64]], dim: usize) -> usize {
    let origin = vec![0.0; dim];
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(dim);
    for normal in normals {
        if basis.len() == dim {
            break;
        }
        let residual = residual_from_span(normal, &origin, &basis);
        let len = dot(&residual, &residual).sqrt();
        if len > HULL_PLANE_TOLERANCE {
            basis.push(residual.iter().map(|r| r / len).collect());
        }
    }
    basis.len()
}

/// Pick d+1 affinely independent candidates, each farthest from the span of
/// the previous ones.
fn initial_simplex(points: &Matrix, candidates: &[usize], scale: f64) -> Result<Vec<usize>> {
    let dim = points.cols();
    let first = candidates
        .iter()
        .copied()
        .min_by(|&a, &b| points.get(a, 0).total_cmp(&points.get(b, 0)))
        .ok_or_else(|| ClexHullError::DegenerateGeometry("no points to build a hull from".to_string()))?;
    let origin = points.row(first);

    let mut simplex = vec![first];
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(dim);
    for rank in 1..=dim {
        let mut best: Option<(usize, f64, Vec<f64>)> = None;
        for &idx in candidates {
            if simplex.contains(&idx) {
                continue;
            }
            let residual = residual_from_span(points.row(idx), origin, &basis);
            let dist = dot(&residual, &residual).sqrt();
            if best.as_ref().map_or(true, |(_, d, _)| dist > *d) {
                best = Some((idx, dist, residual));
            }
        }
        match best {
            Some((idx, dist, residual)) if dist > AFFINE_RANK_TOLERANCE * scale => {
                simplex.push(idx);
                basis.push(residual.iter().map(|r| r / dist).collect());
            }
            _ => {
                return Err(ClexHullError::DegenerateGeometry(format!(
                    "points span only {} of {dim} dimensions",
                    rank - 1
                )))
            }
        }
    }
    Ok(simplex)
}

/// Component of `p - origin` orthogonal to the orthonormal `basis`.
fn residual_from_span(p: &[f64], origin: &[f64], basis: &[Vec<f64>]) -> Vec<f64> {
    let mut r: Vec<f64> = p.iter().zip(origin).map(|(a, b)| a - b).collect();
    for b in basis {
        let c = dot(&r, b);
        for (ri, bi) in r.iter_mut().zip(b) {
            *ri -= c * bi;
        }
    }
    r
}

/// Ridges belonging to exactly one visible facet.
fn horizon(visible: &[Facet]) -> Vec<Vec<usize>> {
    let mut counts: HashMap<Vec<usize>, usize> = HashMap::new();
    let mut order: Vec<Vec<usize>> = Vec::new();
    for f in visible {
        for skip in 0..f.vertices.len() {
            let ridge: Vec<usize> = f
                .vertices
                .iter()
                .enumerate()
                .filter_map(|(j, &v)| (j != skip).then_some(v))
                .collect();
            let count = counts.entry(ridge.clone()).or_insert(0);
            if *count == 0 {
                order.push(ridge);
            }
            *count += 1;
        }
    }
    order.into_iter().filter(|r| counts[r] == 1).collect()
}

/// Hyperplane through `verts`, oriented away from `interior`.
///
/// The normal is the generalized cross product of the d-1 edge vectors:
/// component k is the signed minor with column k removed.
fn make_facet(points: &Matrix, mut verts: Vec<usize>, interior: &[f64]) -> Result<Facet> {
    verts.sort_unstable();
    let dim = points.cols();
    let base = points.row(verts[0]);
    let edges: Vec<Vec<f64>> = verts[1..]
        .iter()
        .map(|&v| points.row(v).iter().zip(base).map(|(a, b)| a - b).collect())
        .collect();

    let m = dim - 1;
    let mut minor = Vec::with_capacity(m * m);
    let mut normal = Vec::with_capacity(dim);
    for k in 0..dim {
        minor.clear();
        for e in &edges {
            minor.extend(e.iter().enumerate().filter_map(|(j, &v)| (j != k).then_some(v)));
        }
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        normal.push(sign * determinant(&minor, m));
    }

    let norm = dot(&normal, &normal).sqrt();
    if !(norm.is_finite() && norm > f64::MIN_POSITIVE) {
        return Err(ClexHullError::DegenerateGeometry(format!(
            "facet {verts:?} has no well-defined normal"
        )));
    }
    for c in &mut normal {
        *c /= norm;
    }
    let mut offset = -dot(&normal, base);
    if dot(&normal, interior) + offset > 0.0 {
        for c in &mut normal {
            *c = -*c;
        }
        offset = -offset;
    }
    Ok(Facet {
        vertices: verts,
        normal,
        offset,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tolerances::EXACT_F64;

    fn hull_2d(xs: &[f64], ys: &[f64]) -> Result<ConvexHull> {
        let comp = Matrix::column_vector(xs);
        ConvexHull::from_composition_energy(&comp, ys)
    }

    #[test]
    fn square_has_four_edges() {
        let hull = hull_2d(&[0.0, 1.0, 1.0, 0.0], &[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(hull.facets().len(), 4);
        assert_eq!(hull.vertices(), &[0, 1, 2, 3]);
    }

    #[test]
    fn interior_point_is_not_a_vertex() {
        let hull = hull_2d(&[0.0, 1.0, 0.5, 0.5], &[0.0, 0.0, 1.0, 0.3]).unwrap();
        assert_eq!(hull.vertices(), &[0, 1, 2]);
        assert_eq!(hull.facets().len(), 3);
    }

    #[test]
    fn normals_are_unit_and_outward() {
        let hull = hull_2d(&[0.0, 0.25, 0.5, 0.75, 1.0], &[0.0, -0.5, -1.5, -0.5, 0.0]).unwrap();
        for f in hull.facets() {
            let norm = dot(f.normal(), f.normal()).sqrt();
            assert!((norm - 1.0).abs() < EXACT_F64);
            for i in 0..hull.points().rows() {
                assert!(f.signed_distance(hull.points().row(i)) < 1e-9);
            }
            for &v in f.vertices() {
                assert!(f.signed_distance(hull.points().row(v)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn collinear_points_degenerate() {
        let err = hull_2d(&[0.0, 0.5, 1.0], &[0.0, 1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ClexHullError::DegenerateGeometry(_)));
    }

    #[test]
    fn too_few_points_degenerate() {
        let err = hull_2d(&[0.0, 1.0], &[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, ClexHullError::DegenerateGeometry(_)));
    }

    #[test]
    fn nan_degenerate() {
        let err = hull_2d(&[0.0, 1.0, 0.5], &[0.0, f64::NAN, 1.0]).unwrap_err();
        assert!(matches!(err, ClexHullError::DegenerateGeometry(_)));
    }

    #[test]
    fn length_mismatch_rejected() {
        let comp = Matrix::column_vector(&[0.0, 1.0, 0.5]);
        let err = ConvexHull::from_composition_energy(&comp, &[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, ClexHullError::ShapeMismatch(_)));
    }

    #[test]
    fn tetrahedron_with_interior_point() {
        let pts = Matrix::from_rows(&[
            vec![0.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.1, 0.1, 0.1],
        ])
        .unwrap();
        let hull = ConvexHull::new(pts).unwrap();
        assert_eq!(hull.facets().len(), 4);
        assert_eq!(hull.vertices(), &[0, 1, 2, 3]);
        assert_eq!(hull.dim(), 3);
    }

    #[test]
    fn coplanar_3d_points_degenerate() {
        let comp = Matrix::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.5, 0.5],
        ])
        .unwrap();
        let err = ConvexHull::from_composition_energy(&comp, &[0.0, 1.0, 1.0, 1.0]).unwrap_err();
        assert!(matches!(err, ClexHullError::DegenerateGeometry(_)));
    }

    #[test]
    fn collinear_boundary_point_is_not_a_vertex() {
        // (0.5, 0) lies on the bottom edge
        let hull = hull_2d(&[0.0, 1.0, 0.5, 0.5], &[0.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(hull.vertices(), &[0, 1, 3]);
    }

    #[test]
    fn edge_point_inserted_before_its_far_endpoint_is_dropped() {
        // (1, 0) is a vertex until (2, 0) extends the bottom edge past it
        let xs = [0.0, 0.5, 1.0, 2.0, 2.5];
        let ys = [0.0, 1.0, 0.0, 0.0, 0.5];
        let hull = hull_2d(&xs, &ys).unwrap();
        assert_eq!(hull.vertices(), &[0, 1, 3, 4]);
        assert!(hull.facets().iter().all(|f| !f.vertices().contains(&2)));

        // same points, edge point listed last
        let hull = hull_2d(&[0.0, 0.5, 2.0, 2.5, 1.0], &[0.0, 1.0, 0.0, 0.5, 0.0]).unwrap();
        assert_eq!(hull.vertices(), &[0, 1, 2, 3]);
    }

    #[test]
    fn point_inside_flat_face_is_dropped() {
        // square pyramid; (0.25, 0.5, 0) joins the hull before (0, 1, 0)
        // closes the square base around it
        let pts = Matrix::from_rows(&[
            vec![0.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![0.25, 0.5, 0.0],
            vec![1.0, 1.0, 0.0],
            vec![0.5, 0.5, 1.0],
            vec![0.0, 1.0, 0.0],
        ])
        .unwrap();
        let hull = ConvexHull::new(pts).unwrap();
        assert_eq!(hull.vertices(), &[0, 1, 3, 4, 5]);
        assert_eq!(hull.facets().len(), 6);
    }

    #[test]
    fn normal_rank_ignores_parallel_normals() {
        let a = [0.0, -1.0];
        let b = [0.0, -1.0];
        let c = [0.6, -0.8];
        assert_eq!(normal_rank(&[&a[..], &b[..]], 2), 1);
        assert_eq!(normal_rank(&[&a[..], &b[..], &c[..]], 2), 2);
    }

    #[test]
    fn hull_is_deterministic() {
        let xs = [0.0, 0.1, 0.3, 0.45, 0.6, 0.8, 1.0];
        let ys = [0.0, -0.3, -0.2, -0.7, -0.1, -0.4, 0.0];
        let a = hull_2d(&xs, &ys).unwrap();
        let b = hull_2d(&xs, &ys).unwrap();
        assert_eq!(a.facets(), b.facets());
    }
}
