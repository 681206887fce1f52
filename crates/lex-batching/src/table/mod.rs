//! Row-oriented table model consumed by the batch iterator.
//!
//! A [`DataTable`] is an immutable schema plus rows. Iterators borrow it and
//! read it through [`RowCursor`]s, which are released when dropped.

mod frame;

pub use frame::FrameOptions;

use crate::error::{BatchingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::trace;

/// Declared type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Int,
    Long,
    Double,
    Boolean,
    String,
    List(Box<CellType>),
    Set(Box<CellType>),
    Collection(Box<CellType>),
}

impl CellType {
    /// Shorthand for `List(element)`.
    pub fn list(element: CellType) -> Self {
        CellType::List(Box::new(element))
    }

    /// Element type of a collection type, `None` for scalars.
    pub fn element_type(&self) -> Option<&CellType> {
        match self {
            CellType::List(inner) | CellType::Set(inner) | CellType::Collection(inner) => {
                Some(inner)
            }
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.element_type().is_some()
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellType::Int => write!(f, "Int"),
            CellType::Long => write!(f, "Long"),
            CellType::Double => write!(f, "Double"),
            CellType::Boolean => write!(f, "Boolean"),
            CellType::String => write!(f, "String"),
            CellType::List(inner) => write!(f, "List<{inner}>"),
            CellType::Set(inner) => write!(f, "Set<{inner}>"),
            CellType::Collection(inner) => write!(f, "Collection<{inner}>"),
        }
    }
}

/// A single value in a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Missing,
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    String(String),
    Collection(Vec<Cell>),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Name of the runtime shape, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Missing => "Missing",
            Cell::Int(_) => "Int",
            Cell::Long(_) => "Long",
            Cell::Double(_) => "Double",
            Cell::Boolean(_) => "Boolean",
            Cell::String(_) => "String",
            Cell::Collection(_) => "Collection",
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Double(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Int(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Long(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Boolean(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Missing, Into::into)
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub cell_type: CellType,
    /// Every value a nominal column is known to take, in canonical order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<String>>,
    /// Declared element count of a collection column, when fixed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arity: Option<usize>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, cell_type: CellType) -> Self {
        Self {
            name: name.into(),
            cell_type,
            domain: None,
            arity: None,
        }
    }

    /// Attach a nominal domain. Duplicates are dropped, first occurrence wins.
    #[must_use]
    pub fn with_domain<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let domain = values
            .into_iter()
            .map(Into::into)
            .filter(|v: &String| seen.insert(v.clone()))
            .collect();
        self.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }
}

/// Ordered list of columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    /// Build a schema, rejecting duplicate column names.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(BatchingError::InvalidConfig(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column or fail with [`BatchingError::ColumnNotFound`].
    pub fn require(&self, name: &str) -> Result<(usize, &ColumnSpec)> {
        self.index_of(name)
            .map(|idx| (idx, &self.columns[idx]))
            .ok_or_else(|| BatchingError::ColumnNotFound(name.to_string()))
    }
}

/// Stable identity of a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(String);

impl RowKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A keyed sequence of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    key: RowKey,
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(key: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            key: RowKey::new(key),
            cells,
        }
    }

    pub fn key(&self) -> &RowKey {
        &self.key
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }
}

/// An immutable table: schema plus rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    schema: Schema,
    rows: Vec<Row>,
}

impl DataTable {
    /// Build a table, checking that every row matches the schema width.
    pub fn new(schema: Schema, rows: Vec<Row>) -> Result<Self> {
        let expected = schema.len();
        if let Some(bad) = rows.iter().find(|r| r.cells.len() != expected) {
            return Err(BatchingError::RowArity {
                row: bad.key.to_string(),
                expected,
                actual: bad.cells.len(),
            });
        }
        Ok(Self { schema, rows })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Open a read cursor positioned at the first row.
    pub fn cursor(&self) -> RowCursor<'_> {
        trace!(rows = self.rows.len(), "opening row cursor");
        RowCursor {
            rows: &self.rows,
            position: 0,
        }
    }
}

/// Forward read cursor over a [`DataTable`]. Dropping it releases the read.
#[derive(Debug)]
pub struct RowCursor<'a> {
    rows: &'a [Row],
    position: usize,
}

impl<'a> RowCursor<'a> {
    /// Offset of the next row this cursor will yield.
    pub fn offset(&self) -> usize {
        self.position
    }

    /// The row at the current position without advancing.
    pub fn peek(&self) -> Option<&'a Row> {
        self.rows.get(self.position)
    }

    /// Move to an absolute offset, clamped to the table length.
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.rows.len());
    }

    pub fn remaining(&self) -> usize {
        self.rows.len() - self.position
    }
}

impl<'a> Iterator for RowCursor<'a> {
    type Item = &'a Row;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.get(self.position)?;
        self.position += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl Drop for RowCursor<'_> {
    fn drop(&mut self) {
        trace!(position = self.position, "closing row cursor");
    }
}
