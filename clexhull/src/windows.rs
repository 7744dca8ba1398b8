// SPDX-License-Identifier: AGPL-3.0-only

//! Hull slopes and chemical-potential stability windows (one composition axis).
//!
//! Along a binary lower hull sorted by composition, segment k joins vertex k
//! to vertex k+1 and has slope μ_k = ΔE/Δx, the chemical potential at which
//! both ends coexist. Interior vertex k is the unique ground state for
//! μ ∈ (μ_{k-1}, μ_k), so its window width is μ_k − μ_{k-1}. The two
//! compositional extremes are stable over a half-infinite μ range and carry
//! no finite window.

use crate::error::{ClexHullError, Result};
use serde::Serialize;

/// Slopes and windows of a sorted set of hull vertices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityWindows {
    /// Configuration indices in ascending composition order
    pub order: Vec<usize>,
    /// Slope of each adjacent segment (`order.len() - 1` entries)
    pub slopes: Vec<f64>,
    /// Window of each interior vertex `order[1..len-1]`
    pub windows: Vec<f64>,
}

impl StabilityWindows {
    /// Interior vertices paired with their windows, ascending composition.
    pub fn interior(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        let n = self.order.len();
        let inner: &[usize] = if n > 2 { &self.order[1..n - 1] } else { &[] };
        inner.iter().copied().zip(self.windows.iter().copied())
    }

    /// Sum of all interior windows.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.windows.iter().sum()
    }

    /// The two compositional extremes (lowest, highest), if any vertices.
    #[must_use]
    pub fn extremes(&self) -> Option<(usize, usize)> {
        Some((*self.order.first()?, *self.order.last()?))
    }
}

/// Sort hull vertices by composition and compute slopes and windows.
///
/// `indices[k]` labels the vertex at `(comp[k], energy[k])`. Sorting is
/// stable, so equal compositions keep input order before being rejected.
///
/// # Errors
///
/// [`ClexHullError::ShapeMismatch`] if the three slices differ in length;
/// [`ClexHullError::DuplicateComposition`] if two vertices share a
/// composition value (zero slope denominator).
pub fn stability_windows(indices: &[usize], comp: &[f64], energy: &[f64]) -> Result<StabilityWindows> {
    if indices.len() != comp.len() || comp.len() != energy.len() {
        return Err(ClexHullError::ShapeMismatch(format!(
            "{} indices, {} compositions, {} energies",
            indices.len(),
            comp.len(),
            energy.len()
        )));
    }

    let mut sorted: Vec<usize> = (0..comp.len()).collect();
    sorted.sort_by(|&a, &b| comp[a].total_cmp(&comp[b]));

    let slopes = sorted
        .windows(2)
        .map(|pair| {
            let (l, r) = (pair[0], pair[1]);
            let dx = comp[r] - comp[l];
            if dx == 0.0 {
                return Err(ClexHullError::DuplicateComposition {
                    composition: comp[l],
                    first: indices[l],
                    second: indices[r],
                });
            }
            Ok((energy[r] - energy[l]) / dx)
        })
        .collect::<Result<Vec<f64>>>()?;

    let windows = slopes.windows(2).map(|s| s[1] - s[0]).collect();

    Ok(StabilityWindows {
        order: sorted.iter().map(|&k| indices[k]).collect(),
        slopes,
        windows,
    })
}
