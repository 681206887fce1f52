//! Conversion from a polars [`DataFrame`] into a [`DataTable`].

use super::{Cell, CellType, ColumnSpec, DataTable, Row, Schema};
use crate::error::{BatchingError, Result, ResultExt};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Options for [`DataTable::from_dataframe`].
#[derive(Debug, Clone, Default)]
pub struct FrameOptions {
    key_column: Option<String>,
    domains: HashMap<String, Vec<String>>,
}

impl FrameOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this column's values as row keys. The column is left out of the schema.
    #[must_use]
    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    /// Declare the full domain of a nominal column, in canonical order.
    ///
    /// Without this, the domain is every distinct value of the column in
    /// order of first appearance.
    #[must_use]
    pub fn domain<I, S>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains
            .insert(column.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

impl DataTable {
    /// Convert a polars frame into a table.
    ///
    /// Numeric, boolean, string, categorical and (nested) list columns are
    /// supported; nulls become [`Cell::Missing`].
    pub fn from_dataframe(df: &DataFrame, options: &FrameOptions) -> Result<Self> {
        let height = df.height();
        let keys = row_keys(df, options)?;

        let mut specs = Vec::with_capacity(df.width());
        let mut columns: Vec<Vec<Cell>> = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            let name = column.name().to_string();
            if options.key_column.as_deref() == Some(name.as_str()) {
                continue;
            }

            let series = column.as_materialized_series();
            let cell_type = cell_type_for(&name, series.dtype())?;
            let cells = series_cells(series, &cell_type)
                .context(format!("Converting column '{name}'"))?;

            let mut spec = ColumnSpec::new(name.clone(), cell_type);
            if spec.cell_type == CellType::String {
                let domain = match options.domains.get(&name) {
                    Some(declared) => declared.clone(),
                    None => dtype_domain(series.dtype())
                        .unwrap_or_else(|| observed_domain(&cells)),
                };
                debug!(column = %name, values = domain.len(), "captured nominal domain");
                spec = spec.with_domain(domain);
            }

            specs.push(spec);
            columns.push(cells);
        }

        let mut rows = Vec::with_capacity(height);
        for (idx, key) in keys.into_iter().enumerate() {
            let cells = columns
                .iter_mut()
                .map(|col| std::mem::replace(&mut col[idx], Cell::Missing))
                .collect();
            rows.push(Row::new(key, cells));
        }

        DataTable::new(Schema::new(specs)?, rows)
    }
}

fn row_keys(df: &DataFrame, options: &FrameOptions) -> Result<Vec<String>> {
    let Some(key_column) = options.key_column.as_deref() else {
        return Ok((0..df.height()).map(|i| format!("Row{i}")).collect());
    };

    let column = df
        .column(key_column)
        .map_err(|_| BatchingError::ColumnNotFound(key_column.to_string()))?;
    let keys = column.as_materialized_series().cast(&DataType::String)?;
    Ok(keys
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, key)| key.map_or_else(|| format!("Row{i}"), str::to_string))
        .collect())
}

/// Map a polars dtype onto the table's declared cell type.
fn cell_type_for(column: &str, dtype: &DataType) -> Result<CellType> {
    let cell_type = match dtype {
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::UInt8 | DataType::UInt16 => {
            CellType::Int
        }
        DataType::Int64 | DataType::UInt32 | DataType::UInt64 => CellType::Long,
        DataType::Float32 | DataType::Float64 => CellType::Double,
        DataType::Boolean => CellType::Boolean,
        DataType::String | DataType::Categorical(..) | DataType::Enum(..) => CellType::String,
        DataType::List(inner) => CellType::List(Box::new(cell_type_for(column, inner)?)),
        other => {
            return Err(BatchingError::UnsupportedColumnType {
                column: column.to_string(),
                actual: other.to_string(),
                required: "a numeric, boolean, string or list cell".to_string(),
            });
        }
    };
    Ok(cell_type)
}

fn series_cells(series: &Series, cell_type: &CellType) -> Result<Vec<Cell>> {
    let cells = match cell_type {
        CellType::Int => {
            let cast = series.cast(&DataType::Int32)?;
            cast.i32()?.into_iter().map(Cell::from).collect()
        }
        CellType::Long => {
            let cast = series.strict_cast(&DataType::Int64)?;
            cast.i64()?.into_iter().map(Cell::from).collect()
        }
        CellType::Double => {
            let cast = series.cast(&DataType::Float64)?;
            cast.f64()?.into_iter().map(Cell::from).collect()
        }
        CellType::Boolean => series.bool()?.into_iter().map(Cell::from).collect(),
        CellType::String => {
            let cast = series.cast(&DataType::String)?;
            cast.str()?.into_iter().map(Cell::from).collect()
        }
        CellType::List(element) => series
            .list()?
            .into_iter()
            .map(|inner| match inner {
                Some(values) => Ok(Cell::Collection(series_cells(&values, element)?)),
                None => Ok(Cell::Missing),
            })
            .collect::<Result<Vec<_>>>()?,
        CellType::Set(_) | CellType::Collection(_) => {
            return Err(BatchingError::UnsupportedColumnType {
                column: series.name().to_string(),
                actual: cell_type.to_string(),
                required: "a list column".to_string(),
            });
        }
    };
    Ok(cells)
}

/// Declared categories of an `Enum` column, in category order.
///
/// `Categorical` columns share a growable mapping, so they have no
/// declared domain and fall back to the observed values.
fn dtype_domain(dtype: &DataType) -> Option<Vec<String>> {
    match dtype {
        DataType::Enum(categories, _) => Some(
            categories
                .categories()
                .values_iter()
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

fn observed_domain(cells: &[Cell]) -> Vec<String> {
    let mut seen = HashSet::new();
    cells
        .iter()
        .filter_map(|cell| match cell {
            Cell::String(value) if seen.insert(value.as_str()) => Some(value.clone()),
            _ => None,
        })
        .collect()
}
