//! Tabular data container for the training and inference paths.
//!
//! This module provides [`Table`], a named-column matrix of survey codes.
//! All survey fields are small integer codes; they are stored as `f32`
//! (exactly representable) so the same buffer can feed the tree trainer
//! and the scoring backends without conversion.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Errors produced by [`Table`] construction and column access.
#[derive(Debug, Error)]
pub enum DataError {
    /// A referenced column does not exist in the table.
    #[error("missing column `{0}`")]
    MissingColumn(String),

    /// A column name appears more than once.
    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),

    /// Column count does not match data shape.
    #[error("shape mismatch: {names} column names for {cols} data columns")]
    ShapeMismatch { names: usize, cols: usize },

    /// A pushed column has the wrong number of rows.
    #[error("column `{name}` has {len} rows, table has {rows}")]
    LengthMismatch {
        name: String,
        len: usize,
        rows: usize,
    },
}

// =============================================================================
// Table
// =============================================================================

/// A named-column `f32` matrix in row-major layout `[n_rows, n_cols]`.
///
/// Column order is significant: the model's internal feature order is the
/// column order of the table it was trained on, and the inference path
/// rebuilds its frame in exactly the same order.
#[derive(Debug, Clone)]
pub struct Table {
    names: Vec<String>,
    data: Array2<f32>,
}

impl Table {
    /// Create a table from column names and row-major data.
    pub fn new(names: Vec<String>, data: Array2<f32>) -> Result<Self, DataError> {
        if names.len() != data.ncols() {
            return Err(DataError::ShapeMismatch {
                names: names.len(),
                cols: data.ncols(),
            });
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].iter().any(|n| n == name) {
                return Err(DataError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { names, data })
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    /// Column names in storage order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Row-major view of the underlying matrix.
    pub fn matrix(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Whether the table has a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// View of a single column.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f32>, DataError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))?;
        Ok(self.data.column(idx))
    }

    /// Append a derived column.
    pub fn push_column(&mut self, name: &str, values: Array1<f32>) -> Result<(), DataError> {
        if self.has_column(name) {
            return Err(DataError::DuplicateColumn(name.to_string()));
        }
        if values.len() != self.n_rows() {
            return Err(DataError::LengthMismatch {
                name: name.to_string(),
                len: values.len(),
                rows: self.n_rows(),
            });
        }
        let mut data = Array2::zeros((self.n_rows(), self.n_cols() + 1));
        data.slice_mut(s![.., ..self.n_cols()]).assign(&self.data);
        data.column_mut(self.n_cols()).assign(&values);
        self.names.push(name.to_string());
        self.data = data;
        Ok(())
    }

    /// Copy of the table without the named column. Removing a column that
    /// does not exist returns the table unchanged.
    pub fn without_column(&self, name: &str) -> Table {
        match self.column_index(name) {
            None => self.clone(),
            Some(idx) => {
                let keep: Vec<usize> = (0..self.n_cols()).filter(|&c| c != idx).collect();
                let names = keep.iter().map(|&c| self.names[c].clone()).collect();
                let data = self.data.select(Axis(1), &keep);
                Table { names, data }
            }
        }
    }

    /// Split off the named target column, returning the remaining feature
    /// table and the target values.
    pub fn split_target(&self, target: &str) -> Result<(Table, Array1<f32>), DataError> {
        let idx = self
            .column_index(target)
            .ok_or_else(|| DataError::MissingColumn(target.to_string()))?;
        let y = self.data.column(idx).to_owned();
        Ok((self.without_column(target), y))
    }

    /// New table containing only the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            names: self.names.clone(),
            data: self.data.select(Axis(0), rows),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
