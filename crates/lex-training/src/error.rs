//! Error types for the lex-training crate.
//!
//! This module defines [`TrainingError`], the main error type used throughout
//! the crate. Errors from the batching layer are wrapped unchanged so their
//! row and column details survive.
//!
//! # Example
//!
//! ```
//! use lex_training::{TrainingConfig, TrainingError};
//!
//! fn configure() -> Result<TrainingConfig, TrainingError> {
//!     let config = TrainingConfig::builder().epochs(10).build()?;
//!     Ok(config)
//! }
//! ```

use lex_batching::{BatchingError, ErrorKind};
use thiserror::Error;

/// The main error type for lex-training operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TrainingError {
    /// Invalid configuration provided to the trainer or a task.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The data cannot be trained on, e.g. it has no usable rows.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Reading or encoding batches failed.
    #[error(transparent)]
    Batching(#[from] BatchingError),

    /// The learner could not be constructed.
    #[error("Learner construction failed: {0}")]
    Construction(String),

    /// The learner reported a failure while fitting or predicting.
    #[error("Learner failed: {0}")]
    Learner(String),

    /// The learner returned an output matrix of the wrong shape.
    #[error("Learner returned {actual} output rows for a batch of {expected}")]
    OutputShape { expected: usize, actual: usize },

    /// The operation was stopped through its cancellation token.
    ///
    /// Not a failure of the data or the learner.
    #[error("Training cancelled")]
    Cancelled,

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrainingError {
    /// Stable error code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::Batching(err) => err.error_code(),
            Self::Construction(_) => "CONSTRUCTION_FAILED",
            Self::Learner(_) => "LEARNER_FAILED",
            Self::OutputShape { .. } => "OUTPUT_SHAPE",
            Self::Cancelled => "CANCELLED",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::InvalidData(_) => ErrorKind::Data,
            Self::Batching(err) => err.kind(),
            Self::OutputShape { .. } => ErrorKind::Contract,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Construction(_) | Self::Learner(_) | Self::Json(_) => ErrorKind::External,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for training operations.
pub type Result<T> = std::result::Result<T, TrainingError>;
