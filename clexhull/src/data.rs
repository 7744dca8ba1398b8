// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration records: loading, regrouping, and the typed dataset.
//!
//! Upstream tools (e.g. `casm query -k comp corr formation_energy -j`) emit a
//! JSON array with one object per configuration. Two views are provided:
//!   - [`regroup`]: record list → insertion-ordered columns, with the
//!     composition and correlation columns normalized to matrices
//!   - [`ClexDataset`]: the explicit schema (names, composition matrix,
//!     correlation matrix, optional formation energies) the hull code consumes

use crate::error::{ClexHullError, Result};
use crate::linalg::Matrix;
use crate::shape::NdArray;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

/// One configuration as a free-form field map.
pub type RawRecord = Map<String, Value>;

/// Default name of the composition field.
pub const COMP_FIELD: &str = "comp";
/// Default name of the correlation-descriptor field.
pub const CORR_FIELD: &str = "corr";
/// Default name of the formation-energy field.
pub const ENERGY_FIELD: &str = "formation_energy";
/// Default name of the configuration label field.
pub const NAME_FIELD: &str = "name";

/// Field names used when regrouping and typing records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    /// Composition vector field
    pub comp: String,
    /// Correlation descriptor field
    pub corr: String,
    /// Formation energy field
    pub energy: String,
    /// Configuration label field
    pub name: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            comp: COMP_FIELD.to_string(),
            corr: CORR_FIELD.to_string(),
            energy: ENERGY_FIELD.to_string(),
            name: NAME_FIELD.to_string(),
        }
    }
}

/// A regrouped column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Column {
    /// Per-configuration values kept as-is
    Values(Vec<Value>),
    /// Numeric array whose leading axis indexes configurations
    Array(NdArray),
}

impl Column {
    /// Value for configuration `i` in record form.
    fn entry_json(&self, i: usize) -> Value {
        match self {
            Self::Values(v) => v[i].clone(),
            Self::Array(a) => a.entry_json(i),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Values(v) => v.len(),
            Self::Array(a) => a.shape()[0],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Field name → per-configuration column, in first-record key order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnarDataset {
    columns: IndexMap<String, Column>,
    n_configs: usize,
}

impl ColumnarDataset {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Column> {
        self.columns.get(field)
    }

    /// Field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    #[must_use]
    pub const fn n_configs(&self) -> usize {
        self.n_configs
    }

    /// Rebuild row-wise records (the inverse of [`regroup`] up to shape
    /// normalization).
    #[must_use]
    pub fn to_records(&self) -> Vec<RawRecord> {
        (0..self.n_configs)
            .map(|i| {
                self.columns
                    .iter()
                    .map(|(k, c)| (k.clone(), c.entry_json(i)))
                    .collect()
            })
            .collect()
    }

    fn array(&self, field: &str) -> Result<&NdArray> {
        match self.columns.get(field) {
            Some(Column::Array(a)) => Ok(a),
            Some(Column::Values(_)) => Err(ClexHullError::InvalidShape {
                field: field.to_string(),
                reason: "expected a numeric column".to_string(),
            }),
            None => Err(ClexHullError::MissingField(field.to_string())),
        }
    }

    fn values(&self, field: &str) -> Result<&[Value]> {
        match self.columns.get(field) {
            Some(Column::Values(v)) => Ok(v),
            Some(Column::Array(_)) => Err(ClexHullError::InvalidShape {
                field: field.to_string(),
                reason: "expected a raw value column".to_string(),
            }),
            None => Err(ClexHullError::MissingField(field.to_string())),
        }
    }
}

/// Regroup records into columns.
///
/// Keys come from the first record; every record must carry exactly that key
/// set. The composition field is normalized with
/// [`NdArray::to_composition_matrix`]; the correlation field is squeezed.
///
/// # Errors
///
/// [`ClexHullError::EmptyInput`] for no records,
/// [`ClexHullError::InconsistentKeys`] for a differing key set, and
/// [`ClexHullError::InvalidShape`] for non-numeric composition/correlation.
pub fn regroup(records: &[RawRecord], fields: &FieldNames) -> Result<ColumnarDataset> {
    let first = records.first().ok_or(ClexHullError::EmptyInput)?;
    let keys: Vec<&String> = first.keys().collect();
    let key_set: BTreeSet<&str> = keys.iter().map(|k| k.as_str()).collect();

    for (index, record) in records.iter().enumerate().skip(1) {
        let here: BTreeSet<&str> = record.keys().map(String::as_str).collect();
        if here != key_set {
            return Err(ClexHullError::InconsistentKeys {
                index,
                missing: key_set.difference(&here).map(|s| (*s).to_string()).collect(),
                extra: here.difference(&key_set).map(|s| (*s).to_string()).collect(),
            });
        }
    }

    let mut columns = IndexMap::with_capacity(keys.len());
    for key in keys {
        let values: Vec<Value> = records.iter().map(|r| r[key.as_str()].clone()).collect();
        let column = if *key == fields.comp {
            Column::Array(NdArray::stack_json(key, &values)?.to_composition_matrix(key)?)
        } else if *key == fields.corr {
            Column::Array(NdArray::stack_json(key, &values)?.squeeze())
        } else {
            Column::Values(values)
        };
        columns.insert(key.clone(), column);
    }

    tracing::debug!(
        n_configs = records.len(),
        n_fields = columns.len(),
        "regrouped records"
    );
    Ok(ColumnarDataset {
        columns,
        n_configs: records.len(),
    })
}

/// Load a JSON array of records.
///
/// # Errors
///
/// Returns [`ClexHullError::DataLoad`] if the file cannot be opened or is not
/// a JSON array of objects.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    let reader = std::io::BufReader::new(
        std::fs::File::open(path)
            .map_err(|e| ClexHullError::DataLoad(format!("{}: {e}", path.display())))?,
    );
    let records: Vec<RawRecord> = serde_json::from_reader(reader)?;
    Ok(records)
}

/// One configuration with the explicit schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Configuration label
    pub name: String,
    /// Composition vector
    pub comp: Vec<f64>,
    /// Correlation descriptor
    pub corr: Vec<f64>,
    /// Formation energy; `None` for uncalculated configurations
    #[serde(default, deserialize_with = "deserialize_energy")]
    pub formation_energy: Option<f64>,
}

fn deserialize_energy<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    energy_from_json(ENERGY_FIELD, &Value::deserialize(d)?).map_err(serde::de::Error::custom)
}

/// Uncalculated energies appear as `null` (newer tools) or `{}` (older ones);
/// anything else that is not a number is rejected.
fn energy_from_json(field: &str, v: &Value) -> Result<Option<f64>> {
    match v {
        Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| ClexHullError::InvalidShape {
            field: field.to_string(),
            reason: format!("{n} is not representable as f64"),
        }),
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        other => Err(ClexHullError::InvalidShape {
            field: field.to_string(),
            reason: format!("expected a number, null, or {{}}, got {other}"),
        }),
    }
}

/// Typed dataset: the boundary between free-form records and the hull code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClexDataset {
    /// Configuration labels
    pub names: Vec<String>,
    /// Compositions, `n × D`
    pub comp: Matrix,
    /// Correlations, `n × K`
    pub corr: Matrix,
    /// Formation energies (`None` = not calculated)
    pub formation_energy: Vec<Option<f64>>,
}

/// The calculated subset of a dataset plus its map back to original indices.
#[derive(Debug, Clone)]
pub struct CalculatedSubset {
    /// Original index of each retained configuration
    pub original_index: Vec<usize>,
    /// Compositions of retained configurations
    pub comp: Matrix,
    /// Correlations of retained configurations
    pub corr: Matrix,
    /// Formation energies of retained configurations
    pub formation_energy: Vec<f64>,
}

impl ClexDataset {
    /// Type a regrouped dataset.
    ///
    /// A missing name field falls back to positional labels.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::MissingField`] if composition, correlation, or energy
    /// is absent; [`ClexHullError::InvalidShape`] if they are malformed.
    pub fn from_columns(columns: &ColumnarDataset, fields: &FieldNames) -> Result<Self> {
        let comp = columns.array(&fields.comp)?.to_matrix()?;
        let corr_array = columns.array(&fields.corr)?;
        let corr = match corr_array.ndim() {
            1 => corr_array.to_column_matrix()?.to_matrix()?,
            _ => corr_array.to_matrix().map_err(|_| ClexHullError::InvalidShape {
                field: fields.corr.clone(),
                reason: format!("shape {:?} is not a matrix", corr_array.shape()),
            })?,
        };
        let formation_energy = columns
            .values(&fields.energy)?
            .iter()
            .map(|v| energy_from_json(&fields.energy, v))
            .collect::<Result<Vec<_>>>()?;
        let names = match columns.values(&fields.name) {
            Ok(v) => v
                .iter()
                .map(|n| n.as_str().map_or_else(|| n.to_string(), str::to_string))
                .collect(),
            Err(ClexHullError::MissingField(_)) => {
                (0..columns.n_configs()).map(|i| format!("config_{i}")).collect()
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            names,
            comp,
            corr,
            formation_energy,
        })
    }

    /// Build directly from typed records.
    ///
    /// # Errors
    ///
    /// [`ClexHullError::EmptyInput`] for no records and
    /// [`ClexHullError::ShapeMismatch`] for records of differing widths.
    pub fn from_records(records: &[ConfigRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(ClexHullError::EmptyInput);
        }
        let comp_rows: Vec<Vec<f64>> = records.iter().map(|r| r.comp.clone()).collect();
        let corr_rows: Vec<Vec<f64>> = records.iter().map(|r| r.corr.clone()).collect();
        Ok(Self {
            names: records.iter().map(|r| r.name.clone()).collect(),
            comp: Matrix::from_rows(&comp_rows)?,
            corr: Matrix::from_rows(&corr_rows)?,
            formation_energy: records.iter().map(|r| r.formation_energy).collect(),
        })
    }

    /// Load, regroup, and type a record file.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`load_records`], [`regroup`], and
    /// [`ClexDataset::from_columns`].
    pub fn load(path: &Path, fields: &FieldNames) -> Result<Self> {
        let records = load_records(path)?;
        let columns = regroup(&records, fields)?;
        Self::from_columns(&columns, fields)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of composition axes.
    #[must_use]
    pub const fn n_axes(&self) -> usize {
        self.comp.cols()
    }

    /// Configurations that have a formation energy.
    #[must_use]
    pub fn calculated(&self) -> CalculatedSubset {
        let original_index: Vec<usize> = self
            .formation_energy
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.map(|_| i))
            .collect();
        let dropped = self.len() - original_index.len();
        if dropped > 0 {
            tracing::warn!(dropped, "skipping configurations without a formation energy");
        }
        CalculatedSubset {
            comp: self.comp.select_rows(&original_index),
            corr: self.corr.select_rows(&original_index),
            formation_energy: original_index
                .iter()
                .filter_map(|&i| self.formation_energy[i])
                .collect(),
            original_index,
        }
    }
}
