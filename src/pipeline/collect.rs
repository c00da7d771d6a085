//! Training data collection from the relational source.
//!
//! Pulls every labeled row of the survey table into a [`Table`]. The
//! pipeline applies no filtering: all rows returned by the source are
//! used. An unreachable source or an empty table is fatal.

use ndarray::Array2;
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info};

use crate::data::{DataError, Table};

/// Default name of the survey response table.
pub const SOURCE_TABLE: &str = "mental_health";

/// Errors reading the training data source.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("data source error: {0}")]
    Source(#[from] rusqlite::Error),

    #[error("data source table `{0}` returned no rows")]
    EmptySource(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Load every row of `table_name` as a [`Table`].
///
/// Integer codes are read through SQLite's numeric affinity and stored
/// as `f32`. A leading ORM `id` column, when present, is dropped.
pub fn load_table(conn: &Connection, table_name: &str) -> Result<Table, CollectError> {
    info!(table = table_name, "loading training data");

    let mut stmt = conn.prepare(&format!("SELECT * FROM {table_name}"))?;
    let names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let n_cols = names.len();

    let mut values: Vec<f32> = Vec::new();
    let mut n_rows = 0usize;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        for col in 0..n_cols {
            values.push(row.get::<_, f64>(col)? as f32);
        }
        n_rows += 1;
    }

    if n_rows == 0 {
        return Err(CollectError::EmptySource(table_name.to_string()));
    }

    let data = Array2::from_shape_vec((n_rows, n_cols), values)
        .expect("row-major buffer matches counted shape");
    let table = Table::new(names, data)?;
    debug!(rows = n_rows, cols = table.n_cols(), "loaded data from source");

    Ok(table.without_column("id"))
}

// =============================================================================
// Tests
// =============================================================================
