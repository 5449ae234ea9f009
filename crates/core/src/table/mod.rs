//! Flattening aligned rasters into a per-cell feature table.
//!
//! Every grid cell becomes one [`Row`] holding the value of every band of
//! every input raster, keyed by feature name, plus the cell-centre
//! coordinate under the reserved keys `x` and `y`. Rows follow the raster
//! reading order: row-major, top-left first.

mod export;
mod value;

pub use value::Value;

use crate::error::{Error, Result};
use crate::raster::RasterDataset;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// Reserved column holding the cell-centre x coordinate
pub const X_COLUMN: &str = "x";
/// Reserved column holding the cell-centre y coordinate
pub const Y_COLUMN: &str = "y";

/// Options for [`make_table`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableOptions {
    /// Emit [`Value::Null`] for nodata (and NaN) cells instead of the
    /// sentinel value
    pub mask_nodata: bool,
}

/// Feature values of one grid cell.
///
/// Column names are shared between all rows of a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<Arc<str>, Value>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Cell-centre x coordinate
    pub fn x(&self) -> f64 {
        self.coordinate(X_COLUMN)
    }

    /// Cell-centre y coordinate
    pub fn y(&self) -> f64 {
        self.coordinate(Y_COLUMN)
    }

    fn coordinate(&self, key: &str) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(f64::NAN)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, name: &Arc<str>, value: Value) {
        self.values.insert(Arc::clone(name), value);
    }
}

/// Ordered per-cell rows plus the column order used for export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Feature columns in input order, followed by `x` and `y`
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// All values of one column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        if !self.columns.iter().any(|c| c == name) {
            return None;
        }
        Some(
            self.rows
                .iter()
                .map(|row| row.get(name).copied().unwrap_or(Value::Null))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Feature names of every band of a dataset.
///
/// A band's own description wins; otherwise the dataset's base name is
/// used alone for single-band rasters and as `<base>_<n>` (1-based) for
/// multi-band rasters.
pub fn feature_names(dataset: &RasterDataset) -> Vec<String> {
    let base = dataset.base_name();
    let multi = dataset.band_count() > 1;
    dataset
        .bands()
        .iter()
        .enumerate()
        .map(|(i, band)| match band.description() {
            Some(desc) => desc.to_string(),
            None if multi => format!("{}_{}", base, i + 1),
            None => base.to_string(),
        })
        .collect()
}

/// Flatten aligned rasters into one row per grid cell.
///
/// The grid size and geotransform are taken from the first raster; the
/// caller is responsible for alignment (see
/// [`crate::pipeline::rasters_to_table`]). Every band must match the
/// reference grid size.
pub fn make_table(rasters: &[RasterDataset], options: &TableOptions) -> Result<Table> {
    let reference = rasters.first().ok_or(Error::EmptyInput)?;
    let (rows, cols) = reference.shape();
    let transform = *reference.transform();
    let cells = rows * cols;

    let mut table_rows = vec![Row::default(); cells];
    let mut columns = Vec::new();
    let mut seen: HashSet<String> = [X_COLUMN, Y_COLUMN].iter().map(|s| s.to_string()).collect();

    for raster in rasters {
        for (band, name) in raster.bands().iter().zip(feature_names(raster)) {
            let (ar, ac) = band.shape();
            if (ar, ac) != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar,
                    ac,
                });
            }
            if !seen.insert(name.clone()) {
                return Err(Error::DuplicateColumn(name));
            }

            let key: Arc<str> = Arc::from(name.as_str());
            let values = band.data().to_values(band.nodata(), options.mask_nodata);
            for (row, value) in table_rows.iter_mut().zip(values) {
                row.insert(&key, value);
            }
            columns.push(name);
        }
    }

    let (x_key, y_key): (Arc<str>, Arc<str>) = (Arc::from(X_COLUMN), Arc::from(Y_COLUMN));
    for (i, row) in table_rows.iter_mut().enumerate() {
        let (x, y) = transform.pixel_to_geo(i % cols, i / cols);
        row.insert(&x_key, Value::Float(x));
        row.insert(&y_key, Value::Float(y));
    }
    columns.push(X_COLUMN.to_string());
    columns.push(Y_COLUMN.to_string());

    info!(
        rows = table_rows.len(),
        columns = columns.len(),
        rasters = rasters.len(),
        "built feature table"
    );

    Ok(Table {
        columns,
        rows: table_rows,
    })
}
