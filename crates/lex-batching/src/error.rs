//! Error types for table-to-batch conversion.
//!
//! Every failure is a [`BatchingError`] variant and every variant belongs to
//! one [`ErrorKind`], so callers can tell a configuration problem (fix the
//! column selection) from a data problem (fix the table) from a contract
//! violation (fix the calling code).
//!
//! Errors are serializable as `{ code, message }` so they can be forwarded to
//! a frontend or written into a JSON report unchanged.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Broad category of a [`BatchingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The column selection or options do not fit the table. Reported before
    /// any row is read.
    Configuration,
    /// A specific row or cell could not be turned into numbers.
    Data,
    /// The caller broke the iterator protocol (e.g. `next` after exhaustion).
    Contract,
    /// The operation was stopped through a cancellation token. Never raised
    /// by the iterator itself; consumers polling a token report it.
    Cancelled,
    /// Failure inside a collaborator (polars, I/O, JSON).
    External,
}

/// The main error type for batch iteration.
#[derive(Error, Debug)]
pub enum BatchingError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A selected column does not exist in the schema.
    #[error("Column '{0}' not found in table schema")]
    ColumnNotFound(String),

    /// A selected column has no converter to the required destination type.
    #[error("Column '{column}' of type {actual} cannot be converted to {required}")]
    UnsupportedColumnType {
        column: String,
        actual: String,
        required: String,
    },

    /// A collection column whose elements cannot be converted to numbers.
    #[error(
        "Unsupported element type {element_type} in collection type {collection_type} of column '{column}'"
    )]
    UnsupportedElementType {
        column: String,
        element_type: String,
        collection_type: String,
    },

    /// A column's declared type is not equivalent to the expected one.
    #[error("Column '{column}' has type {actual}, expected {expected}")]
    SchemaMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    /// Label column has no domain, or an empty one.
    #[error("Label column '{0}' has no domain values")]
    EmptyVocabulary(String),

    /// A row has a different number of cells than the schema has columns.
    #[error("Row '{row}' has {actual} cells but the schema has {expected} columns")]
    RowArity {
        row: String,
        expected: usize,
        actual: usize,
    },

    /// A required cell is missing.
    #[error("Missing value in column '{column}' of row '{row}'")]
    MissingCell { row: String, column: String },

    /// A cell's runtime value does not match what its converter accepts.
    #[error("Cannot convert {cell_type} cell in column '{column}' of row '{row}': {reason}")]
    ConversionFailed {
        row: String,
        column: String,
        cell_type: String,
        reason: String,
    },

    /// A row produced a feature vector of a different width than earlier rows.
    #[error("Row '{row}' produced {actual} values for column '{column}', expected {expected}")]
    WidthMismatch {
        row: String,
        column: String,
        expected: usize,
        actual: usize,
    },

    /// A label value outside of the captured vocabulary.
    #[error("Unknown label '{value}' (vocabulary has {vocabulary_size} entries)")]
    UnknownLabel {
        value: String,
        vocabulary_size: usize,
    },

    /// `next_batch` called while `has_next` reports false.
    #[error("No more batches: iterator is exhausted")]
    Exhausted,

    /// An activation vector handed to the decoder has the wrong width.
    #[error("Cannot decode vector of width {actual}, vocabulary has {expected} entries")]
    DecodeWidth { expected: usize, actual: usize },

    /// Matrix assembly failed.
    #[error("Failed to assemble batch matrix: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<BatchingError>,
    },
}

impl BatchingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        BatchingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::UnsupportedColumnType { .. } => "UNSUPPORTED_COLUMN_TYPE",
            Self::UnsupportedElementType { .. } => "UNSUPPORTED_ELEMENT_TYPE",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::EmptyVocabulary(_) => "EMPTY_VOCABULARY",
            Self::RowArity { .. } => "ROW_ARITY",
            Self::MissingCell { .. } => "MISSING_CELL",
            Self::ConversionFailed { .. } => "CONVERSION_FAILED",
            Self::WidthMismatch { .. } => "WIDTH_MISMATCH",
            Self::UnknownLabel { .. } => "UNKNOWN_LABEL",
            Self::Exhausted => "EXHAUSTED",
            Self::DecodeWidth { .. } => "DECODE_WIDTH",
            Self::Shape(_) => "SHAPE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_)
            | Self::ColumnNotFound(_)
            | Self::UnsupportedColumnType { .. }
            | Self::UnsupportedElementType { .. }
            | Self::SchemaMismatch { .. }
            | Self::EmptyVocabulary(_) => ErrorKind::Configuration,
            Self::RowArity { .. }
            | Self::MissingCell { .. }
            | Self::ConversionFailed { .. }
            | Self::WidthMismatch { .. }
            | Self::UnknownLabel { .. } => ErrorKind::Data,
            Self::Exhausted | Self::DecodeWidth { .. } | Self::Shape(_) => ErrorKind::Contract,
            Self::Io(_) | Self::Polars(_) | Self::Json(_) => ErrorKind::External,
            Self::WithContext { source, .. } => source.kind(),
        }
    }

    /// Returns `true` for a missing-cell error, the only kind skip-missing mode absorbs.
    pub fn is_missing_cell(&self) -> bool {
        match self {
            Self::MissingCell { .. } => true,
            Self::WithContext { source, .. } => source.is_missing_cell(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code`, `kind` and `message` fields.
impl Serialize for BatchingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("BatchingError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for batching operations.
pub type Result<T> = std::result::Result<T, BatchingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| BatchingError::Polars(e).with_context(context))
    }
}
