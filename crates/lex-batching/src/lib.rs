//! Table-to-Batch Iteration Library
//!
//! Turns an in-memory data table into fixed-size numeric mini-batches for
//! neural network training and prediction.
//!
//! # Overview
//!
//! - **Converter Registry**: maps a column's declared cell type to a numeric
//!   or text conversion; collections flatten to vectors
//! - **Value Extraction**: concatenates the selected columns of a row into
//!   one feature vector of fixed width
//! - **Label Encoding**: one-hot encoding over a vocabulary captured from the
//!   label column's domain, and arg-max decoding back to labels
//! - **Batch Assembly**: stacks rows into `ndarray` matrices, all or nothing
//! - **Iteration**: a `Fresh → Active → Exhausted` state machine with reset
//!   and an optional mode that skips rows with missing values
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_batching::{BatchConfig, DataTable, FrameOptions, TableBatchIterator};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("iris.csv".into()))?
//!     .finish()?;
//! let table = DataTable::from_dataframe(&df, &FrameOptions::new())?;
//!
//! let config = BatchConfig::builder()
//!     .feature_columns(["sepal_length", "sepal_width", "petal_length", "petal_width"])
//!     .label_column("species")
//!     .batch_size(16)
//!     .build()?;
//!
//! let mut batches = TableBatchIterator::new(&table, &config)?;
//! while batches.has_next() {
//!     let batch = batches.next_batch()?;
//!     println!("{} examples", batch.num_examples());
//! }
//! ```
//!
//! # Errors
//!
//! Every error carries an [`ErrorKind`]: configuration errors are raised by
//! the iterator constructor before any row is read, data errors name the row
//! and column that failed, and contract errors mean the caller misused the
//! iterator (for example [`BatchingError::Exhausted`]).

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod iterator;
pub mod label;
pub mod selection;
pub mod table;

// Re-exports for convenient access
pub use batch::{Batch, BatchAssembler, TargetEncoder};
pub use config::{BatchConfig, BatchConfigBuilder, DEFAULT_BATCH_SIZE, TargetSpec};
pub use convert::{
    CellFault, Converted, Converter, ConverterRegistry, Target, TypeEquivalence, TypeFamily,
};
pub use error::{BatchingError, ErrorKind, Result as BatchingResult, ResultExt};
pub use extract::{FeatureExtractor, ResolvedColumn};
pub use iterator::{IteratorState, TableBatchIterator};
pub use label::{LabelEncoder, LabelVocabulary};
pub use selection::ColumnSelection;
pub use table::{Cell, CellType, ColumnSpec, DataTable, FrameOptions, Row, RowCursor, RowKey, Schema};
