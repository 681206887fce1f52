//! Configuration for the batch iterator.
//!
//! This module provides [`BatchConfig`] and its builder, and the
//! [`TargetSpec`] enum that selects pretraining, classification or regression
//! targets.
//!
//! # Example
//!
//! ```
//! use lex_batching::{BatchConfig, TargetSpec};
//!
//! let config = BatchConfig::builder()
//!     .feature_columns(["sepal_length", "sepal_width"])
//!     .target(TargetSpec::categorical("species"))
//!     .batch_size(16)
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::{BatchingError, Result};
use crate::label::LabelVocabulary;
use std::collections::HashSet;

/// Default number of rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// What, if anything, each batch carries as targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetSpec {
    /// Features only (unsupervised pretraining).
    #[default]
    None,

    /// One nominal column, one-hot encoded over its vocabulary.
    Categorical(String),

    /// One or more numeric columns used as regression targets.
    Numeric(Vec<String>),
}

impl TargetSpec {
    pub fn categorical(column: impl Into<String>) -> Self {
        TargetSpec::Categorical(column.into())
    }

    pub fn numeric<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TargetSpec::Numeric(columns.into_iter().map(Into::into).collect())
    }

    /// Names of the columns the target reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            TargetSpec::None => Vec::new(),
            TargetSpec::Categorical(column) => vec![column.as_str()],
            TargetSpec::Numeric(columns) => columns.iter().map(String::as_str).collect(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetSpec::None => "none",
            TargetSpec::Categorical(_) => "categorical",
            TargetSpec::Numeric(_) => "numeric",
        }
    }
}

/// Configuration for [`TableBatchIterator`](crate::TableBatchIterator).
///
/// Use [`BatchConfig::builder()`] to construct one. [`build()`](BatchConfigBuilder::build)
/// checks everything that can be checked without a table:
/// - at least one feature column, no duplicates
/// - `batch_size` at least 1
/// - target columns are not also feature columns
/// - a vocabulary is only given together with a categorical target
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Feature columns, in the order their values appear in each vector.
    pub feature_columns: Vec<String>,

    /// Target columns and how they are encoded.
    pub target: TargetSpec,

    /// Rows per batch (default: 32). The last batch may be shorter.
    pub batch_size: usize,

    /// Silently skip rows with a missing feature or target cell (default: false).
    ///
    /// Only missing cells are skipped; any other conversion failure still aborts.
    pub skip_missing: bool,

    /// Pre-captured label vocabulary.
    ///
    /// When `None`, the vocabulary is read from the label column's domain. Set
    /// this at prediction time to reuse the vocabulary a model was trained with.
    pub vocabulary: Option<LabelVocabulary>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            feature_columns: Vec::new(),
            target: TargetSpec::None,
            batch_size: DEFAULT_BATCH_SIZE,
            skip_missing: false,
            vocabulary: None,
        }
    }
}

impl BatchConfig {
    #[must_use]
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::default()
    }

    /// Label column, if the target is categorical.
    pub fn label_column(&self) -> Option<&str> {
        match &self.target {
            TargetSpec::Categorical(column) => Some(column),
            _ => None,
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug, Clone, Default)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    /// Set the feature columns, replacing any set before.
    #[must_use]
    pub fn feature_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.feature_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append one feature column.
    #[must_use]
    pub fn feature_column(mut self, column: impl Into<String>) -> Self {
        self.config.feature_columns.push(column.into());
        self
    }

    #[must_use]
    pub fn target(mut self, target: TargetSpec) -> Self {
        self.config.target = target;
        self
    }

    /// Shorthand for `target(TargetSpec::categorical(column))`.
    #[must_use]
    pub fn label_column(self, column: impl Into<String>) -> Self {
        self.target(TargetSpec::categorical(column))
    }

    /// Set the batch size (default: 32).
    ///
    /// [`build()`](Self::build) returns an error if `size` is 0.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    #[must_use]
    pub fn skip_missing(mut self, skip: bool) -> Self {
        self.config.skip_missing = skip;
        self
    }

    #[must_use]
    pub fn vocabulary(mut self, vocabulary: LabelVocabulary) -> Self {
        self.config.vocabulary = Some(vocabulary);
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`BatchingError::InvalidConfig`] if:
    /// - no feature column is selected, or one is selected twice
    /// - `batch_size` is 0
    /// - a target column is also a feature column
    /// - a numeric target names no column, or one column twice
    /// - a vocabulary is set without a categorical target
    pub fn build(self) -> Result<BatchConfig> {
        let config = self.config;

        if config.feature_columns.is_empty() {
            return Err(BatchingError::InvalidConfig(
                "at least one feature column is required".to_string(),
            ));
        }

        let mut features = HashSet::new();
        for column in &config.feature_columns {
            if !features.insert(column.as_str()) {
                return Err(BatchingError::InvalidConfig(format!(
                    "feature column '{column}' is selected more than once"
                )));
            }
        }

        if config.batch_size == 0 {
            return Err(BatchingError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }

        if let TargetSpec::Numeric(columns) = &config.target {
            if columns.is_empty() {
                return Err(BatchingError::InvalidConfig(
                    "numeric target needs at least one column".to_string(),
                ));
            }
            let distinct: HashSet<_> = columns.iter().collect();
            if distinct.len() != columns.len() {
                return Err(BatchingError::InvalidConfig(
                    "numeric target columns must be distinct".to_string(),
                ));
            }
        }

        if let Some(column) = config
            .target
            .columns()
            .into_iter()
            .find(|c| features.contains(c))
        {
            return Err(BatchingError::InvalidConfig(format!(
                "column '{column}' cannot be both a feature and a target"
            )));
        }

        if config.vocabulary.is_some() && config.label_column().is_none() {
            return Err(BatchingError::InvalidConfig(
                "a label vocabulary requires a categorical target".to_string(),
            ));
        }

        Ok(config)
    }
}
