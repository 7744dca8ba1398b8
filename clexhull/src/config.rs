// SPDX-License-Identifier: AGPL-3.0-only

//! Analysis settings.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! is a valid configuration. Binaries layer `--key=value` flags on top.
//!
//! ```json
//! {
//!   "fields": { "comp": "comp", "corr": "corr", "energy": "formation_energy" },
//!   "lower_hull_tolerance": 1e-14,
//!   "ridge_alphas": [1e-6, 1e-4, 1e-2]
//! }
//! ```

use crate::data::FieldNames;
use crate::error::{ClexHullError, Result};
use crate::predictor::DEFAULT_RIDGE_ALPHAS;
use crate::tolerances::{HULL_DISTANCE_TOLERANCE, LOWER_HULL_NORMAL_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Record field names
    pub fields: FieldNames,
    /// Facets whose normal energy component is below `-lower_hull_tolerance`
    /// form the lower hull
    pub lower_hull_tolerance: f64,
    /// Configurations more than this far below a hull are reported
    pub hull_distance_tolerance: f64,
    /// Ridge strengths tried by cross-validation
    pub ridge_alphas: Vec<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fields: FieldNames::default(),
            lower_hull_tolerance: LOWER_HULL_NORMAL_TOLERANCE,
            hull_distance_tolerance: HULL_DISTANCE_TOLERANCE,
            ridge_alphas: DEFAULT_RIDGE_ALPHAS.to_vec(),
        }
    }
}

impl AnalysisConfig {
    /// Read and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::DataLoad`] if the file cannot be read or parsed;
    /// [`ClexHullError::Config`] if a value is out of range.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClexHullError::DataLoad(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded analysis config");
        Ok(config)
    }

    /// Check ranges.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::Config`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("lower_hull_tolerance", self.lower_hull_tolerance),
            ("hull_distance_tolerance", self.hull_distance_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ClexHullError::Config(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.ridge_alphas.is_empty() {
            return Err(ClexHullError::Config("ridge_alphas is empty".to_string()));
        }
        if let Some(bad) = self.ridge_alphas.iter().find(|a| !(a.is_finite() && **a > 0.0)) {
            return Err(ClexHullError::Config(format!(
                "ridge_alphas must be positive, got {bad}"
            )));
        }
        for (name, field) in [
            ("comp", &self.fields.comp),
            ("corr", &self.fields.corr),
            ("energy", &self.fields.energy),
        ] {
            if field.is_empty() {
                return Err(ClexHullError::Config(format!("field name `{name}` is empty")));
            }
        }
        Ok(())
    }

    /// Apply `--key=value` overrides, then validate.
    ///
    /// Recognized keys: `--lower-hull-tolerance`, `--hull-distance-tolerance`,
    /// `--ridge-alphas` (comma separated), `--comp-field`, `--corr-field`,
    /// `--energy-field`, `--name-field`. Other arguments are ignored.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::Config`] for unparsable values or failed validation.
    pub fn apply_cli_overrides(&mut self, args: &[String]) -> Result<()> {
        for arg in args {
            if let Some(val) = arg.strip_prefix("--lower-hull-tolerance=") {
                self.lower_hull_tolerance = parse_f64("--lower-hull-tolerance", val)?;
            } else if let Some(val) = arg.strip_prefix("--hull-distance-tolerance=") {
                self.hull_distance_tolerance = parse_f64("--hull-distance-tolerance", val)?;
            } else if let Some(val) = arg.strip_prefix("--ridge-alphas=") {
                self.ridge_alphas = val
                    .split(',')
                    .map(|s| parse_f64("--ridge-alphas", s.trim()))
                    .collect::<Result<_>>()?;
            } else if let Some(val) = arg.strip_prefix("--comp-field=") {
                self.fields.comp = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--corr-field=") {
                self.fields.corr = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--energy-field=") {
                self.fields.energy = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--name-field=") {
                self.fields.name = val.to_string();
            }
        }
        self.validate()
    }
}

fn parse_f64(flag: &str, val: &str) -> Result<f64> {
    val.parse()
        .map_err(|_| ClexHullError::Config(format!("{flag}: `{val}` is not a number")))
}

/// Value of `--key=value` in `args`, if present.
#[must_use]
pub fn cli_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    let prefix = format!("{key}=");
    args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn defaults_are_valid() {
        let c = AnalysisConfig::default();
        c.validate().unwrap();
        assert!((c.lower_hull_tolerance - 1e-14).abs() < f64::EPSILON);
        assert_eq!(c.fields.energy, "formation_energy");
        assert_eq!(c.ridge_alphas.len(), DEFAULT_RIDGE_ALPHAS.len());
    }

    #[test]
    fn empty_object_gives_defaults() {
        let c: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(c, AnalysisConfig::default());
    }

    #[test]
    fn partial_fields_keep_other_defaults() {
        let c: AnalysisConfig =
            serde_json::from_str(r#"{"fields": {"energy": "energy_per_atom"}}"#).unwrap();
        assert_eq!(c.fields.energy, "energy_per_atom");
        assert_eq!(c.fields.comp, "comp");
    }

    #[test]
    fn unknown_key_rejected() {
        let r: std::result::Result<AnalysisConfig, _> =
            serde_json::from_str(r#"{"lower_hull_tol": 1.0}"#);
        assert!(r.is_err());
    }

    #[test]
    fn from_path_reads_and_validates() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"ridge_alphas": [0.1, 1.0], "lower_hull_tolerance": 0.0}}"#).unwrap();
        let c = AnalysisConfig::from_path(f.path()).unwrap();
        assert_eq!(c.ridge_alphas, vec![0.1, 1.0]);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{"ridge_alphas": []}}"#).unwrap();
        assert!(matches!(
            AnalysisConfig::from_path(bad.path()),
            Err(ClexHullError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_data_load() {
        assert!(matches!(
            AnalysisConfig::from_path(Path::new("/nonexistent/clexhull.json")),
            Err(ClexHullError::DataLoad(_))
        ));
    }

    #[test]
    fn cli_overrides() {
        let mut c = AnalysisConfig::default();
        c.apply_cli_overrides(&args(&[
            "--data=x.json",
            "--ridge-alphas=1e-3, 1e-1",
            "--lower-hull-tolerance=1e-10",
            "--energy-field=e",
        ]))
        .unwrap();
        assert_eq!(c.ridge_alphas, vec![1e-3, 1e-1]);
        assert!((c.lower_hull_tolerance - 1e-10).abs() < f64::EPSILON);
        assert_eq!(c.fields.energy, "e");
    }

    #[test]
    fn cli_rejects_bad_values() {
        let mut c = AnalysisConfig::default();
        assert!(c.apply_cli_overrides(&args(&["--ridge-alphas=a,b"])).is_err());
        let mut c = AnalysisConfig::default();
        assert!(c
            .apply_cli_overrides(&args(&["--hull-distance-tolerance=-1"]))
            .is_err());
    }

    #[test]
    fn cli_value_lookup() {
        let a = args(&["--data=foo.json", "--output=out.json"]);
        assert_eq!(cli_value(&a, "--data"), Some("foo.json"));
        assert_eq!(cli_value(&a, "--config"), None);
    }
}
