//! Row to feature-vector extraction.

use crate::convert::{CellFault, Converted, Converter, ConverterRegistry, LookupFailure, Target};
use crate::error::{BatchingError, Result};
use crate::table::{Cell, Row, Schema};
use std::cell::OnceCell;

/// A selected column resolved against a schema.
#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    name: String,
    index: usize,
    converter: Converter,
    width: OnceCell<usize>,
}

impl ResolvedColumn {
    /// Resolve `name` in `schema` to a numeric converter.
    ///
    /// # Errors
    ///
    /// - [`BatchingError::ColumnNotFound`] if the column is absent
    /// - [`BatchingError::UnsupportedColumnType`] if no numeric converter exists
    /// - [`BatchingError::UnsupportedElementType`] for collections of
    ///   non-numeric elements
    pub fn numeric(schema: &Schema, name: &str, registry: &ConverterRegistry) -> Result<Self> {
        let (index, spec) = schema.require(name)?;
        let converter = registry
            .resolve(&spec.cell_type, Target::Number)
            .map_err(|failure| match failure {
                LookupFailure::NoConverter => BatchingError::UnsupportedColumnType {
                    column: name.to_string(),
                    actual: spec.cell_type.to_string(),
                    required: Target::Number.to_string(),
                },
                LookupFailure::UnsupportedElement { element } => {
                    BatchingError::UnsupportedElementType {
                        column: name.to_string(),
                        element_type: element.to_string(),
                        collection_type: spec.cell_type.to_string(),
                    }
                }
            })?;

        let width = OnceCell::new();
        if !spec.cell_type.is_collection() {
            let _ = width.set(1);
        } else if let Some(arity) = spec.arity {
            let _ = width.set(arity);
        }

        Ok(Self {
            name: name.to_string(),
            index,
            converter,
            width,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Width, if declared or already observed.
    pub fn width(&self) -> Option<usize> {
        self.width.get().copied()
    }

    fn append(&self, row: &Row, out: &mut Vec<f64>) -> Result<()> {
        let cell = row.cell(self.index).unwrap_or(&Cell::Missing);
        let converted = self
            .converter
            .convert(cell)
            .map_err(|fault| self.fault_error(row, fault))?;

        let values = match converted {
            Converted::Scalar(value) => vec![value],
            Converted::Vector(values) => values,
            Converted::Text(_) => {
                return Err(self.fault_error(row, CellFault::WrongShape { found: "String" }));
            }
        };

        let expected = *self.width.get_or_init(|| values.len());
        if values.len() != expected {
            return Err(BatchingError::WidthMismatch {
                row: row.key().to_string(),
                column: self.name.clone(),
                expected,
                actual: values.len(),
            });
        }

        out.extend(values);
        Ok(())
    }

    fn fault_error(&self, row: &Row, fault: CellFault) -> BatchingError {
        let row = row.key().to_string();
        let column = self.name.clone();
        let cell_type = self.converter.source_type().to_string();
        match fault {
            CellFault::Missing => BatchingError::MissingCell { row, column },
            CellFault::WrongShape { found } => BatchingError::ConversionFailed {
                row,
                column,
                cell_type,
                reason: format!("found a {found} value"),
            },
            CellFault::UnsupportedElement {
                element,
                collection,
            } => BatchingError::ConversionFailed {
                row,
                column,
                cell_type,
                reason: format!("unsupported element type {element} in {collection}"),
            },
        }
    }
}

/// Concatenates the numeric values of the selected columns into one vector.
///
/// The width of each column is fixed by the schema (scalars are 1, collections
/// use their declared arity) or by the first row extracted; a row of a
/// different width is a [`BatchingError::WidthMismatch`].
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    columns: Vec<ResolvedColumn>,
}

impl FeatureExtractor {
    /// Resolve every column up front; nothing is read from rows here.
    pub fn new<S: AsRef<str>>(
        schema: &Schema,
        columns: &[S],
        registry: &ConverterRegistry,
    ) -> Result<Self> {
        let columns = columns
            .iter()
            .map(|name| ResolvedColumn::numeric(schema, name.as_ref(), registry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ResolvedColumn] {
        &self.columns
    }

    /// Schema positions of the selected columns.
    pub fn column_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.iter().map(ResolvedColumn::index)
    }

    /// Total vector width, once every column's width is known.
    pub fn width(&self) -> Option<usize> {
        self.columns.iter().map(ResolvedColumn::width).sum()
    }

    /// Flat feature vector for one row.
    pub fn extract(&self, row: &Row) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(self.width().unwrap_or(self.columns.len()));
        for column in &self.columns {
            column.append(row, &mut values)?;
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{CellType, ColumnSpec};

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnSpec::new("x", CellType::Double),
            ColumnSpec::new("flag", CellType::Boolean),
            ColumnSpec::new("v", CellType::list(CellType::Int)),
            ColumnSpec::new("name", CellType::String),
            ColumnSpec::new("tags", CellType::list(CellType::String)),
        ])
        .unwrap()
    }

    fn row(key: &str, x: Cell, v: Vec<i32>) -> Row {
        Row::new(
            key,
            vec![
                x,
                Cell::Boolean(true),
                Cell::Collection(v.into_iter().map(Cell::Int).collect()),
                Cell::from("n"),
                Cell::Collection(vec![]),
            ],
        )
    }

    fn registry() -> &'static ConverterRegistry {
        ConverterRegistry::global()
    }

    #[test]
    fn test_concatenates_in_column_order() {
        let ex = FeatureExtractor::new(&schema(), &["v", "x", "flag"], registry()).unwrap();
        let values = ex.extract(&row("Row0", Cell::Double(0.5), vec![7, 8])).unwrap();
        assert_eq!(values, vec![7.0, 8.0, 0.5, 1.0]);
        assert_eq!(ex.width(), Some(4));
    }

    #[test]
    fn test_width_unknown_until_first_row() {
        let ex = FeatureExtractor::new(&schema(), &["x", "v"], registry()).unwrap();
        assert_eq!(ex.width(), None);
        ex.extract(&row("Row0", Cell::Double(1.0), vec![1, 2, 3])).unwrap();
        assert_eq!(ex.width(), Some(4));
    }

    #[test]
    fn test_width_mismatch_mid_table() {
        let ex = FeatureExtractor::new(&schema(), &["v"], registry()).unwrap();
        ex.extract(&row("Row0", Cell::Double(1.0), vec![1, 2])).unwrap();
        let err = ex.extract(&row("Row1", Cell::Double(1.0), vec![1])).unwrap_err();
        assert!(matches!(
            err,
            BatchingError::WidthMismatch { expected: 2, actual: 1, .. }
        ));
    }

    #[test]
    fn test_declared_arity_is_enforced_from_the_first_row() {
        let schema = Schema::new(vec![
            ColumnSpec::new("v", CellType::list(CellType::Int)).with_arity(3),
        ])
        .unwrap();
        let ex = FeatureExtractor::new(&schema, &["v"], registry()).unwrap();
        assert_eq!(ex.width(), Some(3));
        let r = Row::new("Row0", vec![Cell::Collection(vec![Cell::Int(1)])]);
        assert!(matches!(
            ex.extract(&r),
            Err(BatchingError::WidthMismatch { expected: 3, actual: 1, .. })
        ));
    }

    #[test]
    fn test_missing_cell_names_row_and_column() {
        let ex = FeatureExtractor::new(&schema(), &["x"], registry()).unwrap();
        let err = ex.extract(&row("Row9", Cell::Missing, vec![])).unwrap_err();
        match err {
            BatchingError::MissingCell { row, column } => {
                assert_eq!(row, "Row9");
                assert_eq!(column, "x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_string_column_is_rejected_at_construction() {
        let err = FeatureExtractor::new(&schema(), &["x", "name"], registry()).unwrap_err();
        assert!(matches!(
            err,
            BatchingError::UnsupportedColumnType { ref column, .. } if column == "name"
        ));
    }

    #[test]
    fn test_collection_of_strings_names_element_and_collection() {
        let err = FeatureExtractor::new(&schema(), &["tags"], registry()).unwrap_err();
        match err {
            BatchingError::UnsupportedElementType {
                column,
                element_type,
                collection_type,
            } => {
                assert_eq!(column, "tags");
                assert_eq!(element_type, "String");
                assert_eq!(collection_type, "List<String>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_absent_column() {
        let err = FeatureExtractor::new(&schema(), &["nope"], registry()).unwrap_err();
        assert!(matches!(err, BatchingError::ColumnNotFound(_)));
    }

    #[test]
    fn test_runtime_shape_error_is_conversion_failure() {
        let ex = FeatureExtractor::new(&schema(), &["x"], registry()).unwrap();
        let err = ex
            .extract(&row("Row3", Cell::from("oops"), vec![]))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONVERSION_FAILED");
        assert!(err.to_string().contains("Row3"));
    }
}
