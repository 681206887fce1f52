//! The batch iterator state machine.
//!
//! [`TableBatchIterator`] pulls rows from a [`DataTable`] through a consume
//! cursor and hands them to a [`BatchAssembler`]. In skip-missing mode a
//! second, independent peek cursor looks ahead past incomplete rows so that
//! [`has_next`](TableBatchIterator::has_next) only reports `true` when a row
//! that will actually be used is left.
//!
//! ```text
//!   Fresh ──next_batch──▶ Active ──last row consumed──▶ Exhausted
//!     ▲                     │                              │
//!     └───────── reset ─────┴──────────── reset ───────────┘
//! ```

use crate::batch::{Batch, BatchAssembler};
use crate::config::BatchConfig;
use crate::convert::ConverterRegistry;
use crate::error::{BatchingError, Result};
use crate::label::LabelVocabulary;
use crate::selection::ColumnSelection;
use crate::table::{Cell, DataTable, Row, RowCursor};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, trace};

/// Where an iterator is in its pass over the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IteratorState {
    /// No row consumed since construction or the last reset.
    Fresh,
    /// Some rows consumed, some left.
    Active,
    /// Every row consumed or skipped.
    Exhausted,
}

impl fmt::Display for IteratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IteratorState::Fresh => "fresh",
            IteratorState::Active => "active",
            IteratorState::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// Pull-based iterator producing [`Batch`]es from a borrowed table.
///
/// Column resolution and vocabulary capture happen once in the constructor;
/// [`reset`](Self::reset) only rewinds the cursors.
///
/// # Example
///
/// ```
/// use lex_batching::{BatchConfig, Cell, CellType, ColumnSpec, DataTable, Row, Schema, TableBatchIterator};
///
/// let schema = Schema::new(vec![
///     ColumnSpec::new("x", CellType::Double),
///     ColumnSpec::new("label", CellType::String).with_domain(["cat", "dog"]),
/// ])?;
/// let table = DataTable::new(schema, vec![
///     Row::new("Row0", vec![Cell::Double(1.0), Cell::from("dog")]),
/// ])?;
/// let config = BatchConfig::builder()
///     .feature_columns(["x"])
///     .label_column("label")
///     .build()?;
///
/// let mut batches = TableBatchIterator::new(&table, &config)?;
/// while batches.has_next() {
///     let batch = batches.next_batch()?;
///     assert_eq!(batch.num_examples(), 1);
/// }
/// # Ok::<(), lex_batching::BatchingError>(())
/// ```
pub struct TableBatchIterator<'a> {
    table: &'a DataTable,
    assembler: BatchAssembler,
    batch_size: usize,
    skip_missing: bool,
    required: Vec<usize>,
    consume: Option<RowCursor<'a>>,
    peek: Option<RowCursor<'a>>,
    failed: bool,
}

impl<'a> TableBatchIterator<'a> {
    /// Build an iterator using the default converter registry.
    ///
    /// # Errors
    ///
    /// Any configuration error from resolving the selected columns against
    /// the table's schema. A table with zero rows is not an error.
    pub fn new(table: &'a DataTable, config: &BatchConfig) -> Result<Self> {
        Self::with_registry(table, config, ConverterRegistry::global())
    }

    pub fn with_registry(
        table: &'a DataTable,
        config: &BatchConfig,
        registry: &ConverterRegistry,
    ) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(BatchingError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let assembler = ColumnSelection::from_config(config).resolve(table.schema(), registry)?;
        let required = assembler.required_columns();

        info!(
            rows = table.row_count(),
            batch_size = config.batch_size,
            skip_missing = config.skip_missing,
            "created batch iterator"
        );

        Ok(Self {
            table,
            assembler,
            batch_size: config.batch_size,
            skip_missing: config.skip_missing,
            required,
            consume: None,
            peek: None,
            failed: false,
        })
    }

    /// Current state.
    ///
    /// In skip-missing mode an iterator whose remaining rows are all
    /// incomplete reports [`IteratorState::Exhausted`] without waiting for
    /// [`has_next`](Self::has_next) to move the cursor.
    pub fn state(&self) -> IteratorState {
        let position = self.cursor();
        if position >= self.table.row_count() {
            IteratorState::Exhausted
        } else if position == 0 {
            IteratorState::Fresh
        } else if self.skip_missing && !self.usable_row_from(position) {
            IteratorState::Exhausted
        } else {
            IteratorState::Active
        }
    }

    fn usable_row_from(&self, position: usize) -> bool {
        let start = self
            .peek
            .as_ref()
            .map_or(position, |peek| peek.offset().max(position));
        (start..self.table.row_count())
            .filter_map(|i| self.table.row(i))
            .any(|row| !has_missing(row, &self.required))
    }

    /// Whether another batch is available.
    ///
    /// In skip-missing mode this advances the peek cursor past incomplete rows.
    /// When none but incomplete rows remain the consume cursor is moved to
    /// the end, so the iterator reports [`IteratorState::Exhausted`].
    pub fn has_next(&mut self) -> bool {
        let table = self.table;
        let consume = self.consume.get_or_insert_with(|| table.cursor());
        if !self.skip_missing {
            return consume.remaining() > 0;
        }

        let peek = self.peek.get_or_insert_with(|| table.cursor());
        if peek.offset() < consume.offset() {
            peek.seek(consume.offset());
        }
        while let Some(row) = peek.peek() {
            if !has_missing(row, &self.required) {
                return true;
            }
            trace!(row = %row.key(), "lookahead skipping row with missing value");
            peek.next();
        }

        consume.seek(peek.offset());
        false
    }

    /// Assemble the next batch.
    ///
    /// The batch holds up to `batch_size` rows; only the last one may be
    /// shorter. If any row fails to convert, no batch is returned and both
    /// cursors stay where they were before the call.
    ///
    /// # Errors
    ///
    /// - [`BatchingError::Exhausted`] if [`has_next`](Self::has_next) is `false`
    /// - any data error raised while converting the batch's rows
    pub fn next_batch(&mut self) -> Result<Batch> {
        if !self.has_next() {
            return Err(BatchingError::Exhausted);
        }

        let table = self.table;
        let consume = self.consume.get_or_insert_with(|| table.cursor());
        let start = consume.offset();

        let mut rows: Vec<&'a Row> = Vec::with_capacity(self.batch_size);
        let mut skipped = 0usize;
        while rows.len() < self.batch_size {
            let Some(row) = consume.next() else {
                break;
            };
            if self.skip_missing && has_missing(row, &self.required) {
                skipped += 1;
                continue;
            }
            rows.push(row);
        }

        match self.assembler.assemble(&rows) {
            Ok(batch) => {
                let end = consume.offset();
                if let Some(peek) = self.peek.as_mut() {
                    peek.seek(end);
                }
                if skipped > 0 {
                    debug!(skipped, "skipped rows with missing values");
                }
                debug!(rows = batch.num_examples(), cursor = end, "produced batch");
                Ok(batch)
            }
            Err(err) => {
                consume.seek(start);
                if let Some(peek) = self.peek.as_mut() {
                    peek.seek(start);
                }
                Err(err)
            }
        }
    }

    /// Rewind to [`IteratorState::Fresh`], releasing any open cursors.
    pub fn reset(&mut self) {
        self.consume = None;
        self.peek = None;
        self.failed = false;
        debug!("reset batch iterator");
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Offset of the consume cursor.
    pub fn cursor(&self) -> usize {
        self.consume.as_ref().map_or(0, RowCursor::offset)
    }

    pub fn total_rows(&self) -> usize {
        self.table.row_count()
    }

    pub fn skip_missing(&self) -> bool {
        self.skip_missing
    }

    /// Feature vector width, once known.
    ///
    /// Known up front for scalar columns and collections with a declared
    /// arity, otherwise after the first batch.
    pub fn feature_width(&self) -> Option<usize> {
        self.assembler.features().width()
    }

    /// Label vector width, or `None` without a target.
    pub fn label_width(&self) -> Option<usize> {
        self.assembler.target().and_then(|target| target.width())
    }

    pub fn vocabulary(&self) -> Option<&LabelVocabulary> {
        self.assembler.target().and_then(|target| target.vocabulary())
    }

    pub fn assembler(&self) -> &BatchAssembler {
        &self.assembler
    }

    pub fn table(&self) -> &'a DataTable {
        self.table
    }
}

/// Yields `Ok` batches until the table is exhausted.
///
/// The first `Err` ends the iteration; later calls return `None` until
/// [`reset`](TableBatchIterator::reset).
impl Iterator for TableBatchIterator<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.has_next() {
            return None;
        }
        let result = self.next_batch();
        self.failed = result.is_err();
        Some(result)
    }
}

impl fmt::Debug for TableBatchIterator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableBatchIterator")
            .field("total_rows", &self.total_rows())
            .field("cursor", &self.cursor())
            .field("state", &self.state())
            .field("batch_size", &self.batch_size)
            .field("skip_missing", &self.skip_missing)
            .finish_non_exhaustive()
    }
}

fn has_missing(row: &Row, columns: &[usize]) -> bool {
    columns
        .iter()
        .any(|&i| row.cell(i).is_none_or(cell_has_missing))
}

fn cell_has_missing(cell: &Cell) -> bool {
    match cell {
        Cell::Missing => true,
        Cell::Collection(items) => items.iter().any(cell_has_missing),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetSpec;
    use crate::table::{CellType, ColumnSpec, Schema};
    use ndarray::array;
    use pretty_assertions::assert_eq;

    fn pets(n: usize) -> DataTable {
        let schema = Schema::new(vec![
            ColumnSpec::new("weight", CellType::Double),
            ColumnSpec::new("legs", CellType::Int),
            ColumnSpec::new("label", CellType::String).with_domain(["cat", "dog"]),
        ])
        .unwrap();
        let rows = (0..n)
            .map(|i| {
                let label = if i % 2 == 0 { "cat" } else { "dog" };
                Row::new(
                    format!("Row{i}"),
                    vec![Cell::Double(i as f64), Cell::Int(4), Cell::from(label)],
                )
            })
            .collect();
        DataTable::new(schema, rows).unwrap()
    }

    fn config(batch_size: usize) -> BatchConfig {
        BatchConfig::builder()
            .feature_columns(["weight", "legs"])
            .label_column("label")
            .batch_size(batch_size)
            .build()
            .unwrap()
    }

    fn drain(iter: &mut TableBatchIterator<'_>) -> Vec<Batch> {
        let mut batches = Vec::new();
        while iter.has_next() {
            batches.push(iter.next_batch().unwrap());
        }
        batches
    }

    #[test]
    fn test_five_rows_batch_two() {
        let table = pets(5);
        let mut iter = TableBatchIterator::new(&table, &config(2)).unwrap();

        let vocabulary = iter.vocabulary().unwrap();
        assert_eq!(vocabulary.values(), &["cat".to_string(), "dog".to_string()]);
        assert_eq!(vocabulary.encode("dog").unwrap(), vec![0.0, 1.0]);
        assert_eq!(vocabulary.decode(&[0.1, 0.9]).unwrap(), "dog");

        let batches = drain(&mut iter);
        let sizes: Vec<usize> = batches.iter().map(Batch::num_examples).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(batches[0].labels, Some(array![[1.0, 0.0], [0.0, 1.0]]));
        assert_eq!(batches[2].features, array![[4.0, 4.0]]);
    }

    #[test]
    fn test_zero_rows_is_exhausted_immediately() {
        let table = pets(0);
        let mut iter = TableBatchIterator::new(&table, &config(3)).unwrap();
        assert_eq!(iter.state(), IteratorState::Exhausted);
        assert!(!iter.has_next());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_next_batch_after_exhaustion_is_contract_error() {
        let table = pets(1);
        let mut iter = TableBatchIterator::new(&table, &config(3)).unwrap();
        iter.next_batch().unwrap();
        let err = iter.next_batch().unwrap_err();
        assert!(matches!(err, BatchingError::Exhausted));
        assert_eq!(err.kind(), crate::error::ErrorKind::Contract);
    }

    #[test]
    fn test_batch_count_is_ceil_n_over_b() {
        for n in [1usize, 2, 7, 10, 11] {
            for b in [1usize, 3, 5, 16] {
                let table = pets(n);
                let mut iter = TableBatchIterator::new(&table, &config(b)).unwrap();
                let batches = drain(&mut iter);
                assert_eq!(batches.len(), n.div_ceil(b), "n={n} b={b}");
                let total: usize = batches.iter().map(Batch::num_examples).sum();
                assert_eq!(total, n);
                let last = batches.last().unwrap().num_examples();
                assert_eq!(last, if n % b == 0 { b } else { n % b });
                assert!(batches.iter().all(|batch| batch.feature_width() == 2));
            }
        }
    }

    #[test]
    fn test_state_transitions() {
        let table = pets(3);
        let mut iter = TableBatchIterator::new(&table, &config(2)).unwrap();
        assert_eq!(iter.state(), IteratorState::Fresh);
        iter.next_batch().unwrap();
        assert_eq!(iter.state(), IteratorState::Active);
        assert_eq!(iter.cursor(), 2);
        iter.next_batch().unwrap();
        assert_eq!(iter.state(), IteratorState::Exhausted);
        iter.reset();
        assert_eq!(iter.state(), IteratorState::Fresh);
        assert_eq!(iter.cursor(), 0);
    }

    #[test]
    fn test_reset_replays_identical_batches() {
        let table = pets(7);
        let mut iter = TableBatchIterator::new(&table, &config(3)).unwrap();
        let first = drain(&mut iter);
        iter.reset();
        let second = drain(&mut iter);
        assert_eq!(first, second);
    }

    fn with_gap() -> DataTable {
        let schema = Schema::new(vec![
            ColumnSpec::new("x", CellType::Double),
            ColumnSpec::new("label", CellType::String).with_domain(["cat", "dog"]),
        ])
        .unwrap();
        DataTable::new(
            schema,
            vec![
                Row::new("A", vec![Cell::Double(1.0), Cell::from("cat")]),
                Row::new("B", vec![Cell::Double(2.0), Cell::Missing]),
                Row::new("C", vec![Cell::Double(3.0), Cell::from("dog")]),
            ],
        )
        .unwrap()
    }

    fn gap_config(batch_size: usize, skip_missing: bool) -> BatchConfig {
        BatchConfig::builder()
            .feature_columns(["x"])
            .label_column("label")
            .batch_size(batch_size)
            .skip_missing(skip_missing)
            .build()
            .unwrap()
    }

    #[test]
    fn test_skip_missing_surfaces_complete_rows_in_order() {
        let table = with_gap();
        let mut iter = TableBatchIterator::new(&table, &gap_config(1, true)).unwrap();

        let mut keys = Vec::new();
        while iter.has_next() {
            let batch = iter.next_batch().expect("has_next promised a usable row");
            keys.extend(batch.row_keys.iter().map(|k| k.to_string()));
        }
        assert_eq!(keys, vec!["A", "C"]);
        assert_eq!(iter.state(), IteratorState::Exhausted);
    }

    #[test]
    fn test_skip_missing_consumes_skipped_rows_with_the_next_batch() {
        let table = with_gap();
        let mut iter = TableBatchIterator::new(&table, &gap_config(1, true)).unwrap();
        iter.next_batch().unwrap();
        assert_eq!(iter.cursor(), 1);
        // B is skipped, C is returned
        let batch = iter.next_batch().unwrap();
        assert_eq!(batch.row_keys[0].as_str(), "C");
        assert!(!iter.has_next());
    }

    #[test]
    fn test_trailing_incomplete_rows_report_exhausted() {
        let schema = Schema::new(vec![
            ColumnSpec::new("x", CellType::Double),
            ColumnSpec::new("label", CellType::String).with_domain(["cat", "dog"]),
        ])
        .unwrap();
        let table = DataTable::new(
            schema,
            vec![
                Row::new("A", vec![Cell::Double(1.0), Cell::from("cat")]),
                Row::new("B", vec![Cell::Double(2.0), Cell::Missing]),
                Row::new("C", vec![Cell::Missing, Cell::from("dog")]),
            ],
        )
        .unwrap();
        let mut iter = TableBatchIterator::new(&table, &gap_config(1, true)).unwrap();

        iter.next_batch().unwrap();
        assert_eq!(iter.cursor(), 1);
        assert_eq!(iter.state(), IteratorState::Exhausted);
        assert!(!iter.has_next());
        assert_eq!(iter.state(), IteratorState::Exhausted);
    }

    #[test]
    fn test_missing_cell_aborts_without_skip_mode() {
        let table = with_gap();
        let mut iter = TableBatchIterator::new(&table, &gap_config(2, false)).unwrap();
        let err = iter.next_batch().unwrap_err();
        assert!(err.is_missing_cell());
        assert!(err.to_string().contains("'B'"));
        // the failed batch did not move the cursor
        assert_eq!(iter.cursor(), 0);
        assert_eq!(iter.state(), IteratorState::Fresh);
    }

    #[test]
    fn test_iterator_stops_after_first_error() {
        let table = with_gap();
        let iter = TableBatchIterator::new(&table, &gap_config(2, false)).unwrap();
        let results: Vec<_> = iter.collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_conversion_failure_is_not_skipped() {
        let schema = Schema::new(vec![
            ColumnSpec::new("v", CellType::list(CellType::Double)),
        ])
        .unwrap();
        let table = DataTable::new(
            schema,
            vec![Row::new(
                "Row0",
                vec![Cell::Collection(vec![Cell::from("x")])],
            )],
        )
        .unwrap();
        let config = BatchConfig::builder()
            .feature_columns(["v"])
            .skip_missing(true)
            .build()
            .unwrap();
        let mut iter = TableBatchIterator::new(&table, &config).unwrap();
        assert!(iter.has_next());
        let err = iter.next_batch().unwrap_err();
        assert_eq!(err.error_code(), "CONVERSION_FAILED");
    }

    #[test]
    fn test_missing_collection_element_counts_as_missing() {
        let schema = Schema::new(vec![
            ColumnSpec::new("v", CellType::list(CellType::Double)),
        ])
        .unwrap();
        let table = DataTable::new(
            schema,
            vec![
                Row::new("Row0", vec![Cell::Collection(vec![Cell::Missing])]),
                Row::new("Row1", vec![Cell::Collection(vec![Cell::Double(1.0)])]),
            ],
        )
        .unwrap();
        let config = BatchConfig::builder()
            .feature_columns(["v"])
            .skip_missing(true)
            .build()
            .unwrap();
        let mut iter = TableBatchIterator::new(&table, &config).unwrap();
        let batch = iter.next_batch().unwrap();
        assert_eq!(batch.row_keys[0].as_str(), "Row1");
        assert_eq!(iter.feature_width(), Some(1));
    }

    #[test]
    fn test_pretraining_has_no_labels() {
        let table = pets(4);
        let config = BatchConfig::builder()
            .feature_columns(["weight"])
            .target(TargetSpec::None)
            .batch_size(4)
            .build()
            .unwrap();
        let mut iter = TableBatchIterator::new(&table, &config).unwrap();
        assert_eq!(iter.label_width(), None);
        assert!(iter.vocabulary().is_none());
        let batch = iter.next_batch().unwrap();
        assert!(batch.labels.is_none());
        assert_eq!(batch.features.column(0).to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_configuration_errors_before_any_row() {
        let table = pets(2);
        let config = BatchConfig::builder()
            .feature_columns(["label"])
            .build()
            .unwrap();
        let err = TableBatchIterator::new(&table, &config).unwrap_err();
        assert!(matches!(err, BatchingError::UnsupportedColumnType { .. }));
    }

    #[test]
    fn test_widths_known_up_front_for_scalars() {
        let table = pets(2);
        let iter = TableBatchIterator::new(&table, &config(2)).unwrap();
        assert_eq!(iter.feature_width(), Some(2));
        assert_eq!(iter.label_width(), Some(2));
        assert_eq!(iter.total_rows(), 2);
        assert_eq!(iter.batch_size(), 2);
    }
}
