// SPDX-License-Identifier: AGPL-3.0-only

//! Dense row-major matrices and the small direct solvers the hull and
//! ridge code need.
//!
//! Flat `Vec<f64>` storage; no external linear-algebra dependency.

use crate::error::{ClexHullError, Result};
use crate::tolerances::PIVOT_TOLERANCE;
use serde::Serialize;

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Zero matrix of the given shape.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wrap flat row-major data.
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::ShapeMismatch`] if `data.len() != rows * cols`.
    pub fn from_flat(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ClexHullError::ShapeMismatch(format!(
                "{} values cannot fill a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from equal-length rows.
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::ShapeMismatch`] for ragged rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(ClexHullError::ShapeMismatch(format!(
                    "row {i} has {} columns, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Single-column matrix from a vector.
    #[must_use]
    pub fn column_vector(values: &[f64]) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Row-major backing slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    pub fn set(&mut self, i: usize, j: usize, v: f64) {
        self.data[i * self.cols + j] = v;
    }

    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Copy of column `j`.
    #[must_use]
    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.rows).map(|i| self.get(i, j)).collect()
    }

    /// Rows as owned vectors.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|i| self.row(i).to_vec()).collect()
    }

    /// New matrix holding the given rows in the given order.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            rows: indices.len(),
            cols: self.cols,
            data,
        }
    }

    /// New matrix with `column` appended on the right.
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::ShapeMismatch`] if the lengths disagree.
    pub fn append_column(&self, column: &[f64]) -> Result<Self> {
        if column.len() != self.rows {
            return Err(ClexHullError::ShapeMismatch(format!(
                "cannot append a column of {} values to {} rows",
                column.len(),
                self.rows
            )));
        }
        let cols = self.cols + 1;
        let mut data = Vec::with_capacity(self.rows * cols);
        for (i, &v) in column.iter().enumerate() {
            data.extend_from_slice(self.row(i));
            data.push(v);
        }
        Ok(Self {
            rows: self.rows,
            cols,
            data,
        })
    }

    /// y = A x
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::ShapeMismatch`] if `x.len() != cols`.
    pub fn matvec(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.cols {
            return Err(ClexHullError::ShapeMismatch(format!(
                "vector of length {} against {} columns",
                x.len(),
                self.cols
            )));
        }
        Ok((0..self.rows)
            .map(|i| self.row(i).iter().zip(x).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// Aᵀ A (cols × cols).
    #[must_use]
    pub fn gram(&self) -> Self {
        let k = self.cols;
        let mut g = Self::zeros(k, k);
        for r in 0..self.rows {
            let row = self.row(r);
            for i in 0..k {
                let ri = row[i];
                for j in i..k {
                    g.data[i * k + j] += ri * row[j];
                }
            }
        }
        for i in 0..k {
            for j in 0..i {
                g.data[i * k + j] = g.data[j * k + i];
            }
        }
        g
    }

    /// Aᵀ y
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::ShapeMismatch`] if `y.len() != rows`.
    pub fn transpose_matvec(&self, y: &[f64]) -> Result<Vec<f64>> {
        if y.len() != self.rows {
            return Err(ClexHullError::ShapeMismatch(format!(
                "vector of length {} against {} rows",
                y.len(),
                self.rows
            )));
        }
        let mut out = vec![0.0; self.cols];
        for (r, &yr) in y.iter().enumerate() {
            for (o, &a) in out.iter_mut().zip(self.row(r)) {
                *o += a * yr;
            }
        }
        Ok(out)
    }

    /// Largest absolute entry (0 for an empty matrix).
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }
}

/// LU factorization with partial pivoting, reusable across right-hand sides.
#[derive(Debug, Clone)]
pub struct LuFactors {
    n: usize,
    lu: Vec<f64>,
    perm: Vec<usize>,
}

impl LuFactors {
    /// Factor a square matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::ShapeMismatch`] for non-square `A` and
    /// [`ClexHullError::SingularSystem`] when a pivot falls below
    /// [`PIVOT_TOLERANCE`] relative to the largest entry of `A`.
    pub fn factor(a: &Matrix) -> Result<Self> {
        let n = a.rows();
        if a.cols() != n {
            return Err(ClexHullError::ShapeMismatch(format!(
                "LU needs a square matrix, got {}x{}",
                a.rows(),
                a.cols()
            )));
        }
        let scale = a.max_abs().max(f64::MIN_POSITIVE);
        let mut lu = a.as_slice().to_vec();
        let mut perm: Vec<usize> = (0..n).collect();

        for col in 0..n {
            let pivot_row = (col..n)
                .max_by(|&i, &j| lu[i * n + col].abs().total_cmp(&lu[j * n + col].abs()))
                .unwrap_or(col);
            let pivot = lu[pivot_row * n + col];
            if pivot.abs() <= PIVOT_TOLERANCE * scale {
                return Err(ClexHullError::SingularSystem(format!(
                    "pivot {pivot:.3e} in column {col}"
                )));
            }
            if pivot_row != col {
                for j in 0..n {
                    lu.swap(col * n + j, pivot_row * n + j);
                }
                perm.swap(col, pivot_row);
            }
            for i in (col + 1)..n {
                let factor = lu[i * n + col] / pivot;
                lu[i * n + col] = factor;
                for j in (col + 1)..n {
                    lu[i * n + j] -= factor * lu[col * n + j];
                }
            }
        }
        Ok(Self { n, lu, perm })
    }

    /// Solve `A x = b` with the stored factors.
    ///
    /// # Errors
    ///
    /// Returns [`ClexHullError::ShapeMismatch`] if `b` has the wrong length.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        let n = self.n;
        if b.len() != n {
            return Err(ClexHullError::ShapeMismatch(format!(
                "right-hand side of length {} for a {n}x{n} system",
                b.len()
            )));
        }
        let mut x: Vec<f64> = self.perm.iter().map(|&p| b[p]).collect();
        for i in 0..n {
            let s: f64 = (0..i).map(|j| self.lu[i * n + j] * x[j]).sum();
            x[i] -= s;
        }
        for i in (0..n).rev() {
            let s: f64 = ((i + 1)..n).map(|j| self.lu[i * n + j] * x[j]).sum();
            x[i] = (x[i] - s) / self.lu[i * n + i];
        }
        Ok(x)
    }
}

/// Solve `A x = b` for square `A` by Gaussian elimination with partial pivoting.
///
/// # Errors
///
/// As [`LuFactors::factor`] and [`LuFactors::solve`].
pub fn solve(a: &Matrix, b: &[f64]) -> Result<Vec<f64>> {
    LuFactors::factor(a)?.solve(b)
}

/// Determinant of a square matrix given as flat row-major data of side `n`.
///
/// Returns 0 for a singular matrix; never errors.
#[must_use]
pub fn determinant(data: &[f64], n: usize) -> f64 {
    debug_assert_eq!(data.len(), n * n);
    if n == 0 {
        return 1.0;
    }
    let mut m = data.to_vec();
    let mut det = 1.0;
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| m[i * n + col].abs().total_cmp(&m[j * n + col].abs()))
            .unwrap_or(col);
        let pivot = m[pivot_row * n + col];
        if pivot == 0.0 {
            return 0.0;
        }
        if pivot_row != col {
            for j in 0..n {
                m.swap(col * n + j, pivot_row * n + j);
            }
            det = -det;
        }
        det *= pivot;
        for i in (col + 1)..n {
            let factor = m[i * n + col] / pivot;
            for j in col..n {
                m[i * n + j] -= factor * m[col * n + j];
            }
        }
    }
    det
}

/// Dot product of equal-length slices.
#[must_use]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
