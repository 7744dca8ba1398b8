// SPDX-License-Identifier: AGPL-3.0-only

//! Lower hull: the facets visible from below in energy.
//!
//! Energy is the last point coordinate, so a facet is on the lower hull when
//! the last component of its outward unit normal is negative. Those facets
//! form the lowest-energy envelope over composition space; their vertices
//! are the ground states.

use super::ConvexHull;
use crate::error::{ClexHullError, Result};
use crate::tolerances::LOWER_HULL_NORMAL_TOLERANCE;

/// Lower-hull subset of a [`ConvexHull`]. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerHull {
    vertices: Vec<usize>,
    facets: Vec<usize>,
}

impl LowerHull {
    /// Sorted, unique point indices on the lower hull.
    #[must_use]
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// Positions of the lower facets within [`ConvexHull::facets`].
    #[must_use]
    pub fn facets(&self) -> &[usize] {
        &self.facets
    }

    /// Point-index simplices of the lower facets.
    #[must_use]
    pub fn simplices<'a>(&'a self, hull: &'a ConvexHull) -> Vec<&'a [usize]> {
        self.facets
            .iter()
            .map(|&f| hull.facets()[f].vertices())
            .collect()
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.vertices.binary_search(&index).is_ok()
    }
}

/// Extract the lower hull with an explicit tolerance on the normal's energy
/// component.
///
/// # Errors
///
/// Returns [`ClexHullError::NoLowerHull`] if no facet qualifies.
pub fn lower_hull_with_tolerance(hull: &ConvexHull, tolerance: f64) -> Result<LowerHull> {
    let energy_axis = hull.dim() - 1;
    let facets: Vec<usize> = hull
        .facets()
        .iter()
        .enumerate()
        .filter_map(|(i, f)| (f.normal()[energy_axis] < -tolerance).then_some(i))
        .collect();
    if facets.is_empty() {
        return Err(ClexHullError::NoLowerHull);
    }

    let mut vertices: Vec<usize> = facets
        .iter()
        .flat_map(|&f| hull.facets()[f].vertices().iter().copied())
        .collect();
    vertices.sort_unstable();
    vertices.dedup();

    tracing::debug!(
        n_facets = facets.len(),
        n_vertices = vertices.len(),
        "extracted lower hull"
    );
    Ok(LowerHull { vertices, facets })
}

/// Extract the lower hull with [`LOWER_HULL_NORMAL_TOLERANCE`].
///
/// # Errors
///
/// Returns [`ClexHullError::NoLowerHull`] if no facet qualifies.
pub fn lower_hull(hull: &ConvexHull) -> Result<LowerHull> {
    lower_hull_with_tolerance(hull, LOWER_HULL_NORMAL_TOLERANCE)
}
