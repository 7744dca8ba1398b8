// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized numerical tolerances with justification.
//!
//! Every threshold used by the hull builder, lower-hull extractor,
//! interpolation, and linear solves is defined here. No ad-hoc magic numbers
//! in the geometry code.
//!
//! | Tolerance | Applied to | Scale |
//! |-----------|------------|-------|
//! | `EXACT_F64` | results exact up to rounding (tests, validation) | absolute |
//! | `LOWER_HULL_NORMAL_TOLERANCE` | energy component of a unit normal | absolute |
//! | `HULL_PLANE_TOLERANCE` | signed point-plane distance | × coordinate scale |
//! | `HULL_PLANE_TOLERANCE` | rank of incident facet normals | absolute |
//! | `AFFINE_RANK_TOLERANCE` | distance from an affine span | × coordinate scale |
//! | `PIVOT_TOLERANCE` | Gaussian elimination pivots | × matrix scale |
//! | `BARYCENTRIC_TOLERANCE` | simplex membership | absolute |
//! | `HULL_DISTANCE_TOLERANCE` | energy below an interpolated hull | absolute (eV) |

/// Tolerance for results that should be exact in f64 arithmetic.
///
/// 1e-10 leaves five digits for rounding accumulated through a hull
/// construction followed by slope differences.
pub const EXACT_F64: f64 = 1e-10;

/// A facet is on the lower hull when its outward unit normal has an energy
/// component below `-LOWER_HULL_NORMAL_TOLERANCE`.
///
/// Normals are unit length, so this is an absolute threshold on a number in
/// [-1, 1]. 1e-14 is a few ULPs above zero: it rejects vertical facets whose
/// normal picked up rounding noise in the energy direction while accepting
/// any facet with a physically meaningful downward tilt.
pub const LOWER_HULL_NORMAL_TOLERANCE: f64 = 1e-14;

/// Visibility threshold for the incremental hull: a point is beyond a facet
/// when its signed distance exceeds this value times the coordinate scale.
///
/// Points within the band are treated as coplanar and do not become
/// vertices, matching the default behavior of Quickhull-style builders.
/// The same value bounds the residual of a unit facet normal against the
/// span of a vertex's other incident normals: below it the normals are
/// parallel and the vertex lies on a flat part of the boundary.
pub const HULL_PLANE_TOLERANCE: f64 = 1e-12;

/// Minimum distance (relative to the coordinate scale) of a candidate point
/// from the affine span of the current initial-simplex vertices.
///
/// Below this, the point set is treated as lower-dimensional (collinear,
/// coplanar) and hull construction fails.
pub const AFFINE_RANK_TOLERANCE: f64 = 1e-10;

/// Relative pivot threshold for Gaussian elimination with partial pivoting.
pub const PIVOT_TOLERANCE: f64 = 1e-13;

/// Barycentric weights above `-BARYCENTRIC_TOLERANCE` count as inside the
/// simplex, so points on shared edges resolve to either neighbor.
pub const BARYCENTRIC_TOLERANCE: f64 = 1e-9;

/// Configurations with hull distance below `-HULL_DISTANCE_TOLERANCE` are
/// reported as breaking the hull (eV per formation unit).
pub const HULL_DISTANCE_TOLERANCE: f64 = 1e-8;
