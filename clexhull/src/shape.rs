// SPDX-License-Identifier: AGPL-3.0-only

//! Named array-shape conversions used at the ingestion boundary.
//!
//! Upstream records carry compositions and correlations as nested JSON
//! arrays of whatever rank the producing tool chose (`[0.5]`, `[[0.5]]`,
//! `0.5`, ...). These functions turn a per-configuration column of such
//! values into an explicit rank-n array and normalize its shape, each with a
//! stated pre/postcondition, so the geometry code only ever sees matrices.

use crate::error::{ClexHullError, Result};
use crate::linalg::Matrix;
use serde::Serialize;
use serde_json::Value;

/// Dense n-dimensional f64 array in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NdArray {
    /// Wrap flat data with a shape.
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::ShapeMismatch`] if the shape's product does
    /// not equal `data.len()`.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ClexHullError::ShapeMismatch(format!(
                "shape {shape:?} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Stack per-configuration JSON values into one array whose leading axis
    /// indexes configurations.
    ///
    /// Every value must be a number or a rectangular nested array of numbers,
    /// and all values must share one shape.
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::InvalidShape`] for non-numeric, ragged, or
    /// mutually inconsistent values.
    pub fn stack_json(field: &str, values: &[Value]) -> Result<Self> {
        let mut data = Vec::new();
        let mut inner: Option<Vec<usize>> = None;
        for (i, v) in values.iter().enumerate() {
            let shape = json_shape(v).ok_or_else(|| ClexHullError::InvalidShape {
                field: field.to_string(),
                reason: format!("configuration {i} is not a rectangular numeric array"),
            })?;
            match &inner {
                None => inner = Some(shape),
                Some(s) if *s != shape => {
                    return Err(ClexHullError::InvalidShape {
                        field: field.to_string(),
                        reason: format!("configuration {i} has shape {shape:?}, expected {s:?}"),
                    })
                }
                Some(_) => {}
            }
            flatten_json(v, &mut data);
        }
        let mut shape = vec![values.len()];
        shape.extend(inner.unwrap_or_default());
        Self::new(shape, data)
    }

    /// Remove every singleton axis except the leading configuration axis.
    ///
    /// Post: `ndim() >= 1`, `shape()[0]` unchanged, no other axis has length 1.
    #[must_use]
    pub fn squeeze(&self) -> Self {
        let mut shape = Vec::with_capacity(self.shape.len());
        for (axis, &len) in self.shape.iter().enumerate() {
            if axis == 0 || len != 1 {
                shape.push(len);
            }
        }
        Self {
            shape,
            data: self.data.clone(),
        }
    }

    /// One-column matrix from a rank-1 array.
    ///
    /// Pre: `ndim() == 1`. Post: shape `(n, 1)`.
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::ShapeMismatch`] if the array is not rank 1.
    pub fn to_column_matrix(&self) -> Result<Self> {
        if self.ndim() != 1 {
            return Err(ClexHullError::ShapeMismatch(format!(
                "column matrix needs a rank-1 array, got shape {:?}",
                self.shape
            )));
        }
        Ok(Self {
            shape: vec![self.shape[0], 1],
            data: self.data.clone(),
        })
    }

    /// Normalize a stacked composition column to `(n_configs, n_axes)`.
    ///
    /// Rank > 2 is squeezed first; a rank-1 result becomes a single column.
    /// Pre: rank ≥ 1. Post: rank 2.
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::InvalidShape`] if non-singleton axes remain
    /// beyond rank 2.
    pub fn to_composition_matrix(&self, field: &str) -> Result<Self> {
        let squeezed = if self.ndim() > 2 {
            self.squeeze()
        } else {
            self.clone()
        };
        match squeezed.ndim() {
            1 => squeezed.to_column_matrix(),
            2 => Ok(squeezed),
            _ => Err(ClexHullError::InvalidShape {
                field: field.to_string(),
                reason: format!("composition of shape {:?} is not a matrix", self.shape),
            }),
        }
    }

    /// View a rank-2 (or rank-1, as a column) array as a [`Matrix`].
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::ShapeMismatch`] for rank 0 or rank > 2.
    pub fn to_matrix(&self) -> Result<Matrix> {
        match self.shape.as_slice() {
            [n] => Matrix::from_flat(*n, 1, self.data.clone()),
            [r, c] => Matrix::from_flat(*r, *c, self.data.clone()),
            other => Err(ClexHullError::ShapeMismatch(format!(
                "cannot view shape {other:?} as a matrix"
            ))),
        }
    }

    /// JSON value of configuration `i` (sub-array along the leading axis).
    #[must_use]
    pub fn entry_json(&self, i: usize) -> Value {
        let inner = &self.shape[1..];
        let stride: usize = inner.iter().product();
        nest_json(&self.data[i * stride..(i + 1) * stride], inner)
    }
}

fn json_shape(v: &Value) -> Option<Vec<usize>> {
    match v {
        Value::Number(n) => n.as_f64().map(|_| Vec::new()),
        Value::Array(items) => {
            let Some(first) = items.first() else {
                return Some(vec![0]);
            };
            let inner = json_shape(first)?;
            for item in &items[1..] {
                if json_shape(item)? != inner {
                    return None;
                }
            }
            let mut shape = vec![items.len()];
            shape.extend(inner);
            Some(shape)
        }
        _ => None,
    }
}

fn flatten_json(v: &Value, out: &mut Vec<f64>) {
    match v {
        Value::Number(n) => out.push(n.as_f64().unwrap_or(f64::NAN)),
        Value::Array(items) => items.iter().for_each(|item| flatten_json(item, out)),
        _ => {}
    }
}

fn nest_json(data: &[f64], shape: &[usize]) -> Value {
    match shape.split_first() {
        None => data.first().copied().map_or(Value::Null, Value::from),
        Some((&len, rest)) => {
            let stride: usize = rest.iter().product();
            Value::Array(
                (0..len)
                    .map(|k| nest_json(&data[k * stride..(k + 1) * stride], rest))
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stack_scalars_is_rank_one() {
        let a = NdArray::stack_json("comp", &[json!(0.0), json!(0.5), json!(1.0)]).unwrap();
        assert_eq!(a.shape(), &[3]);
    }

    #[test]
    fn stack_nested_keeps_inner_shape() {
        let a = NdArray::stack_json("comp", &[json!([[0.1]]), json!([[0.2]])]).unwrap();
        assert_eq!(a.shape(), &[2, 1, 1]);
        assert_eq!(a.data(), &[0.1, 0.2]);
    }

    #[test]
    fn ragged_values_rejected() {
        let err = NdArray::stack_json("corr", &[json!([1.0, 2.0]), json!([1.0])]).unwrap_err();
        assert!(matches!(err, ClexHullError::InvalidShape { .. }));
        let err = NdArray::stack_json("corr", &[json!([[1.0, 2.0], [1.0]])]).unwrap_err();
        assert!(matches!(err, ClexHullError::InvalidShape { .. }));
    }

    #[test]
    fn non_numeric_rejected() {
        let err = NdArray::stack_json("comp", &[json!("x")]).unwrap_err();
        assert!(matches!(err, ClexHullError::InvalidShape { .. }));
    }

    #[test]
    fn squeeze_keeps_leading_axis() {
        let a = NdArray::new(vec![1, 1, 3, 1], vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(a.squeeze().shape(), &[1, 3]);
    }

    #[test]
    fn composition_rank_one_becomes_column() {
        let a = NdArray::new(vec![4], vec![0.0, 0.25, 0.5, 1.0]).unwrap();
        let m = a.to_composition_matrix("comp").unwrap();
        assert_eq!(m.shape(), &[4, 1]);
    }

    #[test]
    fn composition_rank_three_trailing_singleton() {
        let a = NdArray::new(vec![3, 1, 1], vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(a.to_composition_matrix("comp").unwrap().shape(), &[3, 1]);
        let b = NdArray::new(vec![3, 2, 1], vec![0.0; 6]).unwrap();
        assert_eq!(b.to_composition_matrix("comp").unwrap().shape(), &[3, 2]);
    }

    #[test]
    fn composition_rank_two_untouched() {
        let a = NdArray::new(vec![2, 2], vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(a.to_composition_matrix("comp").unwrap(), a);
    }

    #[test]
    fn composition_true_tensor_rejected() {
        let a = NdArray::new(vec![2, 2, 2], vec![0.0; 8]).unwrap();
        assert!(a.to_composition_matrix("comp").is_err());
    }

    #[test]
    fn entry_json_reconstructs_nesting() {
        let a = NdArray::stack_json("comp", &[json!([[0.1]]), json!([[0.2]])]).unwrap();
        assert_eq!(a.entry_json(1), json!([[0.2]]));
        let s = NdArray::stack_json("e", &[json!(1.5), json!(2.5)]).unwrap();
        assert_eq!(s.entry_json(0), json!(1.5));
    }

    #[test]
    fn to_matrix_from_column() {
        let a = NdArray::new(vec![3, 1], vec![1.0, 2.0, 3.0]).unwrap();
        let m = a.to_matrix().unwrap();
        assert_eq!((m.rows(), m.cols()), (3, 1));
    }
}
