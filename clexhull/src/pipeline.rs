// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end ground-state analysis of one energy predictor.
//!
//! 1. Keep the calculated configurations.
//! 2. Reference ground states: lower hull of the calculated energies.
//! 3. Predict every configuration's energy.
//! 4. Score the predicted hull of the calculated set (window-weighted).
//! 5. Report configurations that fall below the predicted hull of the
//!    reference ground states.
//!
//! All indices in the report refer to the original dataset order.

use crate::config::AnalysisConfig;
use crate::data::ClexDataset;
use crate::error::{ClexHullError, Result};
use crate::hull_distance::hull_distance;
use crate::metric::{evaluate_with_tolerance, lower_hull_of};
use crate::predictor::{rmse, EnergyPredictor};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// One interior vertex of the predicted hull.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowEntry {
    pub index: usize,
    pub name: String,
    pub composition: f64,
    /// Chemical-potential window
    pub window: f64,
    /// Whether the configuration is a reference ground state
    pub recovered: bool,
}

/// A configuration predicted below the reference-ground-state hull.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BelowHull {
    pub index: usize,
    pub name: String,
    pub predicted_energy: f64,
    /// Predicted energy minus the hull energy (negative)
    pub distance: f64,
    /// False when the configuration has no calculated energy
    pub calculated: bool,
}

/// Result of [`analyze`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundStateReport {
    pub n_configs: usize,
    pub n_calculated: usize,
    /// Lower-hull vertices of the calculated energies
    pub reference_ground_states: Vec<usize>,
    /// Lower-hull vertices of the predicted energies (calculated set)
    pub predicted_ground_states: Vec<usize>,
    /// Reference ground states absent from the predicted hull
    pub missed_ground_states: Vec<usize>,
    /// Predicted interior vertices that are not reference ground states
    pub spurious_ground_states: Vec<usize>,
    pub score: f64,
    pub windows: Vec<WindowEntry>,
    /// RMSE of predicted vs calculated energies
    pub rmse: f64,
    pub below_hull: Vec<BelowHull>,
}

impl GroundStateReport {
    /// Write the report as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::DataLoad`] if serialization or writing fails.
    pub fn save_report(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| ClexHullError::DataLoad(format!("create {}: {e}", dir.display())))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| ClexHullError::DataLoad(format!("write {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "wrote ground-state report");
        Ok(())
    }
}

/// Analyze `predictor` against the calculated energies of `dataset`.
///
/// # Errors
///
/// [`ClexHullError::EmptyInput`] if no configuration is calculated;
/// [`ClexHullError::ShapeMismatch`] if the predictor returns the wrong
/// number of energies; hull and metric errors otherwise.
pub fn analyze(
    dataset: &ClexDataset,
    predictor: &dyn EnergyPredictor,
    config: &AnalysisConfig,
) -> Result<GroundStateReport> {
    let calc = dataset.calculated();
    if calc.formation_energy.is_empty() {
        return Err(ClexHullError::EmptyInput);
    }
    let to_original = |local: &[usize]| -> Vec<usize> {
        local.iter().map(|&i| calc.original_index[i]).collect()
    };

    let reference = lower_hull_of(&calc.comp, &calc.formation_energy, config.lower_hull_tolerance)?;
    let truth: BTreeSet<usize> = reference.vertices().iter().copied().collect();

    let predicted_all = predictor.predict(&dataset.corr)?;
    if predicted_all.len() != dataset.len() {
        return Err(ClexHullError::ShapeMismatch(format!(
            "predictor returned {} energies for {} configurations",
            predicted_all.len(),
            dataset.len()
        )));
    }
    let predicted: Vec<f64> = calc.original_index.iter().map(|&i| predicted_all[i]).collect();
    let fit_rmse = rmse(&predicted, &calc.formation_energy)?;

    let accuracy = evaluate_with_tolerance(&calc.comp, &predicted, &truth, config.lower_hull_tolerance)?;
    let predicted_set: BTreeSet<usize> = accuracy.predicted_ground_states.iter().copied().collect();
    let missed: Vec<usize> = reference
        .vertices()
        .iter()
        .copied()
        .filter(|v| !predicted_set.contains(v))
        .collect();

    let windows = accuracy
        .windows
        .interior()
        .map(|(local, window)| {
            let index = calc.original_index[local];
            WindowEntry {
                index,
                name: dataset.names[index].clone(),
                composition: calc.comp.get(local, 0),
                window,
                recovered: truth.contains(&local),
            }
        })
        .collect();

    let hull_comp = calc.comp.select_rows(reference.vertices());
    let hull_energy: Vec<f64> = reference.vertices().iter().map(|&v| predicted[v]).collect();
    let distances = hull_distance(&hull_comp, &hull_energy, &dataset.comp, &predicted_all)?;
    let below_hull: Vec<BelowHull> = distances
        .iter()
        .enumerate()
        .filter_map(|(i, d)| {
            let d = (*d)?;
            (d < -config.hull_distance_tolerance).then(|| BelowHull {
                index: i,
                name: dataset.names[i].clone(),
                predicted_energy: predicted_all[i],
                distance: d,
                calculated: dataset.formation_energy[i].is_some(),
            })
        })
        .collect();

    let report = GroundStateReport {
        n_configs: dataset.len(),
        n_calculated: calc.formation_energy.len(),
        reference_ground_states: to_original(reference.vertices()),
        predicted_ground_states: to_original(&accuracy.predicted_ground_states),
        missed_ground_states: to_original(&missed),
        spurious_ground_states: to_original(&accuracy.spurious),
        score: accuracy.score,
        windows,
        rmse: fit_rmse,
        below_hull,
    };
    tracing::info!(
        score = report.score,
        rmse = report.rmse,
        n_reference = report.reference_ground_states.len(),
        n_predicted = report.predicted_ground_states.len(),
        n_below_hull = report.below_hull.len(),
        "ground-state analysis complete"
    );
    Ok(report)
}
