//! Survey schema and feature engineering.
//!
//! The model consumes a fixed set of 55 integer-coded survey fields plus
//! one target field. This module owns the canonical column orders (the
//! uppercase training names and their one-to-one lowercase external
//! aliases), derives the three composite/interaction features, and
//! declares the categorical/continuous partition used by downstream
//! consumers.
//!
//! Composite features are deterministic functions of base fields and are
//! recomputed with the same code at training and inference time. Survey
//! sentinel codes (77/88/97/99) are ordinary integer values here, not
//! missing data.

use ndarray::Array1;
use thiserror::Error;

use crate::data::{DataError, Table};

// =============================================================================
// Canonical schema
// =============================================================================

/// Target column: number-of-poor-mental-health-days category.
pub const TARGET: &str = "_MENT14D";

/// Training column names, in the model's internal feature order.
pub const TRAIN_COLUMNS: [&str; 55] = [
    "POORHLTH", "PHYSHLTH", "GENHLTH", "DIFFWALK", "DIFFALON", "CHECKUP1", "DIFFDRES", "ADDEPEV3",
    "ACEDEPRS", "SDLONELY", "LSATISFY", "EMTSUPRT", "DECIDE", "CDSOCIA1", "CDDISCU1", "CIMEMLO1",
    "SMOKDAY2", "ALCDAY4", "MARIJAN1", "EXEROFT1", "USENOW3", "FIREARM5", "INCOME3", "EDUCA",
    "EMPLOY1", "SEX", "MARITAL", "ADULT", "RRCLASS3", "QSTLANG", "_STATE", "VETERAN3", "MEDCOST1",
    "SDHBILLS", "SDHEMPLY", "SDHFOOD1", "SDHSTRE1", "SDHUTILS", "SDHTRNSP", "CDHOUS1", "FOODSTMP",
    "PREGNANT", "ASTHNOW", "HAVARTH4", "CHCSCNC1", "CHCOCNC1", "DIABETE4", "CHCCOPD3", "CHOLCHK3",
    "BPMEDS1", "BPHIGH6", "CVDSTRK3", "CVDCRHD4", "CHCKDNY2", "CHOLMED3",
];

/// External (lowercase) field names accepted by the prediction call, in
/// one-to-one positional correspondence with [`TRAIN_COLUMNS`].
pub const EXTERNAL_ORDER: [&str; 55] = [
    "poorhlth", "physhlth", "genhlth", "diffwalk", "diffalon", "checkup1", "diffdres", "addepev3",
    "acedeprs", "sdlonely", "lsatisfy", "emtsuprt", "decide", "cdsocia1", "cddiscu1", "cimemlo1",
    "smokday2", "alcday4", "marijan1", "exeroft1", "usenow3", "firearm5", "income3", "educa",
    "employ1", "sex", "marital", "adult", "rrclass3", "qstlang", "state", "veteran3", "medcost1",
    "sdhbills", "sdhemply", "sdhfood1", "sdhstre1", "sdhutils", "sdhtrnsp", "cdhous1", "foodstmp",
    "pregnant", "asthnow", "havarth4", "chcscnc1", "chcocnc1", "diabete4", "chccopd3", "cholchk3",
    "bpmeds1", "bphigh6", "cvdstrk3", "cvdcrhd4", "chckdny2", "cholmed3",
];

/// Raw continuous fields (kept as-is, no categorical treatment).
pub const CONTINUOUS_COLUMNS: [&str; 3] = ["PHYSHLTH", "POORHLTH", "MARIJAN1"];

/// Derived composite/interaction column names, in append order.
pub const COMPOSITE_COLUMNS: [&str; 3] = [
    "Physical_Mental_Interaction",
    "Income_Education_Interaction",
    "Mental_Health_Composite",
];

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while preparing features.
///
/// A missing base column is a data-source contract violation and aborts
/// the run.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("required base column `{0}` is missing from the data source")]
    MissingColumn(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

// =============================================================================
// PreparedData
// =============================================================================

/// A table with composite features integrated, plus the declared
/// target/feature partition.
///
/// The partition is informational (it guides encoding decisions in
/// downstream consumers) and is recomputed on every preparation, never
/// cached across schema changes.
#[derive(Debug, Clone)]
pub struct PreparedData {
    table: Table,
    /// Columns treated as categorical-but-numeric.
    pub categorical_columns: Vec<String>,
}

impl PreparedData {
    /// The prepared table, composites included.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Consume the preparation, yielding the table.
    pub fn into_table(self) -> Table {
        self.table
    }
}

/// Integrate composite features and compute the column partition.
///
/// Works on both training tables (which carry [`TARGET`]) and inference
/// frames (which do not). Every base column referenced by a composite
/// must be present.
pub fn prepare(mut table: Table) -> Result<PreparedData, FeatureError> {
    integrate_composite_features(&mut table)?;

    let excluded: Vec<&str> = CONTINUOUS_COLUMNS
        .iter()
        .chain(COMPOSITE_COLUMNS.iter())
        .copied()
        .chain(std::iter::once(TARGET))
        .collect();

    let categorical_columns = table
        .names()
        .iter()
        .filter(|name| !excluded.contains(&name.as_str()))
        .cloned()
        .collect();

    Ok(PreparedData {
        table,
        categorical_columns,
    })
}

/// Append the three derived columns to the table.
///
/// - `Physical_Mental_Interaction = int(GENHLTH) * int(PHYSHLTH)`
/// - `Income_Education_Interaction = int(INCOME3) * int(EDUCA)`
/// - `Mental_Health_Composite = mean(EMTSUPRT, ADDEPEV3, POORHLTH)`
fn integrate_composite_features(table: &mut Table) -> Result<(), FeatureError> {
    let pm = int_product(table, "GENHLTH", "PHYSHLTH")?;
    let ie = int_product(table, "INCOME3", "EDUCA")?;
    let mh = row_mean(table, &["EMTSUPRT", "ADDEPEV3", "POORHLTH"])?;

    table.push_column(COMPOSITE_COLUMNS[0], pm)?;
    table.push_column(COMPOSITE_COLUMNS[1], ie)?;
    table.push_column(COMPOSITE_COLUMNS[2], mh)?;
    Ok(())
}

fn base_column<'t>(
    table: &'t Table,
    name: &str,
) -> Result<ndarray::ArrayView1<'t, f32>, FeatureError> {
    table
        .column(name)
        .map_err(|_| FeatureError::MissingColumn(name.to_string()))
}

/// Element-wise product of two columns, both cast to integer first.
fn int_product(table: &Table, a: &str, b: &str) -> Result<Array1<f32>, FeatureError> {
    let ca = base_column(table, a)?;
    let cb = base_column(table, b)?;
    Ok(Array1::from_iter(
        ca.iter()
            .zip(cb.iter())
            .map(|(&x, &y)| ((x as i64) * (y as i64)) as f32),
    ))
}

/// Row-wise arithmetic mean over the named columns (raw codes, no rescale).
fn row_mean(table: &Table, names: &[&str]) -> Result<Array1<f32>, FeatureError> {
    let cols: Vec<_> = names
        .iter()
        .map(|n| base_column(table, n))
        .collect::<Result<_, _>>()?;
    let n = names.len() as f32;
    Ok(Array1::from_iter((0..table.n_rows()).map(|row| {
        let sum: f32 = cols.iter().map(|c| c[row]).sum();
        sum / n
    })))
}

// =============================================================================
// Tests
// =============================================================================
