// SPDX-License-Identifier: AGPL-3.0-only

//! Energy predictors: anything that maps correlation descriptors to energies.
//!
//! The accuracy metric only needs predicted energies, so the fit is a
//! pluggable [`EnergyPredictor`]. Two implementations ship here:
//!
//! 1. [`EciModel`]: a fixed vector of effective cluster interactions;
//!    E = corr · eci.
//! 2. [`RidgeCv`]: ridge regression whose strength is chosen by
//!    leave-one-out cross-validation over a geometric grid.
//!
//! Closures `Fn(&Matrix) -> Vec<f64>` are predictors too.
//!
//! Fitted ECI leave the crate through [`EciModel::write_basis_json`], which
//! fills the `eci` slot of each orbit in a cluster basis file so Monte Carlo
//! tools can read them. Sampled ECI vectors come in through [`load_eci_set`].

use crate::error::{ClexHullError, Result};
use crate::linalg::{dot, LuFactors, Matrix};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Maps a correlation matrix (one row per configuration) to energies.
pub trait EnergyPredictor {
    /// Predicted energy for each row of `descriptors`.
    ///
    /// # Errors
    ///
    /// Implementations return [`ClexHullError::ShapeMismatch`] when the
    /// descriptor width does not match the model.
    fn predict(&self, descriptors: &Matrix) -> Result<Vec<f64>>;
}

impl<F> EnergyPredictor for F
where
    F: Fn(&Matrix) -> Vec<f64>,
{
    fn predict(&self, descriptors: &Matrix) -> Result<Vec<f64>> {
        let energies = self(descriptors);
        if energies.len() != descriptors.rows() {
            return Err(ClexHullError::ShapeMismatch(format!(
                "predictor returned {} energies for {} configurations",
                energies.len(),
                descriptors.rows()
            )));
        }
        Ok(energies)
    }
}

/// Linear cluster-expansion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EciModel {
    /// Effective cluster interactions, one per correlation column
    pub eci: Vec<f64>,
}

impl EnergyPredictor for EciModel {
    fn predict(&self, descriptors: &Matrix) -> Result<Vec<f64>> {
        descriptors.matvec(&self.eci)
    }
}

impl EciModel {
    /// Copy of a cluster basis description with `orbits[i].cluster_functions.eci`
    /// set to the i-th ECI. Every other key is left as it was.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::MissingField`] without an `orbits` array;
    /// [`ClexHullError::ShapeMismatch`] when the orbit count differs from the
    /// ECI count; [`ClexHullError::InvalidShape`] for an orbit lacking a
    /// `cluster_functions` object or a non-finite ECI.
    pub fn with_basis_eci(&self, basis: &Value) -> Result<Value> {
        let mut basis = basis.clone();
        let orbits = basis
            .get_mut("orbits")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| ClexHullError::MissingField("orbits".to_string()))?;
        if orbits.len() != self.eci.len() {
            return Err(ClexHullError::ShapeMismatch(format!(
                "basis has {} orbits but the model has {} ECI",
                orbits.len(),
                self.eci.len()
            )));
        }
        for (i, (orbit, &eci)) in orbits.iter_mut().zip(&self.eci).enumerate() {
            let number = serde_json::Number::from_f64(eci).ok_or_else(|| ClexHullError::InvalidShape {
                field: "eci".to_string(),
                reason: format!("ECI {i} is {eci}"),
            })?;
            let functions = orbit
                .get_mut("cluster_functions")
                .and_then(Value::as_object_mut)
                .ok_or_else(|| ClexHullError::InvalidShape {
                    field: "orbits".to_string(),
                    reason: format!("orbit {i} has no cluster_functions object"),
                })?;
            functions.insert("eci".to_string(), Value::Number(number));
        }
        Ok(basis)
    }

    /// Read the basis file at `basis_path`, fill in the ECI, and write the
    /// result to `out_path` as pretty JSON.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::DataLoad`] on I/O or parse failure, otherwise as
    /// [`EciModel::with_basis_eci`].
    pub fn write_basis_json(&self, basis_path: &Path, out_path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(basis_path)
            .map_err(|e| ClexHullError::DataLoad(format!("{}: {e}", basis_path.display())))?;
        let basis: Value = serde_json::from_str(&text)?;
        let filled = self.with_basis_eci(&basis)?;
        if let Some(dir) = out_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| ClexHullError::DataLoad(format!("create {}: {e}", dir.display())))?;
        }
        std::fs::write(out_path, serde_json::to_string_pretty(&filled)?)
            .map_err(|e| ClexHullError::DataLoad(format!("write {}: {e}", out_path.display())))?;
        tracing::info!(n_eci = self.eci.len(), path = %out_path.display(), "wrote ECI into basis");
        Ok(())
    }
}

/// Read a JSON array of ECI vectors (e.g. posterior samples), one model each.
///
/// # Errors
///
/// [`ClexHullError::DataLoad`] on I/O or parse failure;
/// [`ClexHullError::EmptyInput`] for an empty array;
/// [`ClexHullError::ShapeMismatch`] when the vectors differ in length.
pub fn load_eci_set(path: &Path) -> Result<Vec<EciModel>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ClexHullError::DataLoad(format!("{}: {e}", path.display())))?;
    let vectors: Vec<Vec<f64>> = serde_json::from_str(&text)?;
    let width = vectors.first().map(Vec::len).ok_or(ClexHullError::EmptyInput)?;
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != width) {
        return Err(ClexHullError::ShapeMismatch(format!(
            "ECI vector {i} has {} entries, expected {width}",
            v.len()
        )));
    }
    tracing::debug!(n_models = vectors.len(), width, "loaded ECI set");
    Ok(vectors.into_iter().map(|eci| EciModel { eci }).collect())
}

/// Default ridge strengths: geometric grid from 1e-8 to 1e2.
pub const DEFAULT_RIDGE_ALPHAS: [f64; 11] = [
    1e-8, 1e-7, 1e-6, 1e-5, 1e-4, 1e-3, 1e-2, 1e-1, 1.0, 1e1, 1e2,
];

/// Ridge regression with leave-one-out selection of the regularization.
#[derive(Debug, Clone, Copy, Default)]
pub struct RidgeCv;

/// Outcome of a [`RidgeCv`] fit.
#[derive(Debug, Clone, Serialize)]
pub struct RidgeFit {
    /// Model refit at the selected strength
    pub model: EciModel,
    /// Selected regularization strength
    pub alpha: f64,
    /// Leave-one-out RMSE at `alpha`
    pub loo_rmse: f64,
    /// `(alpha, loo_rmse)` for every candidate
    pub grid: Vec<(f64, f64)>,
}

impl RidgeCv {
    /// Fit `energy ≈ corr · eci`, choosing α from `alphas` by LOO-CV.
    ///
    /// Candidates whose system is singular or whose RMSE is not finite are
    /// recorded with an infinite RMSE and skipped.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::ShapeMismatch`] if `energy` does not match the rows
    /// of `corr`; [`ClexHullError::Config`] for an empty or non-positive
    /// grid; [`ClexHullError::SingularSystem`] if no candidate is usable.
    pub fn fit(corr: &Matrix, energy: &[f64], alphas: &[f64]) -> Result<RidgeFit> {
        if corr.rows() != energy.len() {
            return Err(ClexHullError::ShapeMismatch(format!(
                "{} descriptor rows but {} energies",
                corr.rows(),
                energy.len()
            )));
        }
        if alphas.is_empty() || alphas.iter().any(|a| !(a.is_finite() && *a > 0.0)) {
            return Err(ClexHullError::Config(
                "ridge alphas must be a non-empty list of positive numbers".to_string(),
            ));
        }

        let gram = corr.gram();
        let xty = corr.transpose_matvec(energy)?;

        let mut grid = Vec::with_capacity(alphas.len());
        let mut best: Option<(f64, f64, Vec<f64>)> = None;
        for &alpha in alphas {
            let rmse = match ridge_solve(&gram, &xty, alpha) {
                Ok((lu, eci)) => loo_rmse(corr, energy, &lu, &eci)?,
                Err(ClexHullError::SingularSystem(_)) => f64::INFINITY,
                Err(e) => return Err(e),
            };
            grid.push((alpha, rmse));
            tracing::debug!(alpha, rmse, "ridge LOO-CV candidate");
            if rmse.is_finite() && best.as_ref().map_or(true, |(_, b, _)| rmse < *b) {
                let (_, eci) = ridge_solve(&gram, &xty, alpha)?;
                best = Some((alpha, rmse, eci));
            }
        }

        let (alpha, loo_rmse, eci) = best.ok_or_else(|| {
            ClexHullError::SingularSystem("no ridge strength gave a usable fit".to_string())
        })?;
        tracing::info!(alpha, loo_rmse, n_eci = eci.len(), "ridge fit selected");
        Ok(RidgeFit {
            model: EciModel { eci },
            alpha,
            loo_rmse,
            grid,
        })
    }
}

/// Factor (XᵀX + αI) and solve for the coefficients.
fn ridge_solve(gram: &Matrix, xty: &[f64], alpha: f64) -> Result<(LuFactors, Vec<f64>)> {
    let k = gram.cols();
    let mut a = gram.clone();
    for i in 0..k {
        a.set(i, i, a.get(i, i) + alpha);
    }
    let lu = LuFactors::factor(&a)?;
    let eci = lu.solve(xty)?;
    Ok((lu, eci))
}

/// Virtual leave-one-out RMSE: LOOᵢ = (yᵢ − ŷᵢ) / (1 − Hᵢᵢ),
/// Hᵢᵢ = xᵢᵀ (XᵀX + αI)⁻¹ xᵢ.
///
/// Rows with Hᵢᵢ ≈ 1 (points the fit interpolates exactly) are skipped.
fn loo_rmse(corr: &Matrix, energy: &[f64], lu: &LuFactors, eci: &[f64]) -> Result<f64> {
    let mut sse = 0.0;
    let mut n_valid = 0_usize;
    for (i, &y) in energy.iter().enumerate() {
        let x = corr.row(i);
        let h_ii = dot(x, &lu.solve(x)?);
        let denom = 1.0 - h_ii;
        if denom.abs() > 1e-12 {
            let resid = (y - dot(x, eci)) / denom;
            sse += resid * resid;
            n_valid += 1;
        }
    }
    if n_valid == 0 {
        return Ok(f64::INFINITY);
    }
    Ok((sse / n_valid as f64).sqrt())
}

/// Root-mean-square difference of two equal-length series.
///
/// # Errors
///
/// [`ClexHullError::ShapeMismatch`] for unequal or empty inputs.
pub fn rmse(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() || a.is_empty() {
        return Err(ClexHullError::ShapeMismatch(format!(
            "rmse of series with {} and {} values",
            a.len(),
            b.len()
        )));
    }
    let sse: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    Ok((sse / a.len() as f64).sqrt())
}
