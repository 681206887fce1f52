//! Column selection checked against a schema.
//!
//! A [`ColumnSelection`] is the part of a [`BatchConfig`] that names columns.
//! It can be validated against any schema on its own, which is what a task's
//! configure step needs, and resolved into a [`BatchAssembler`] when rows are
//! about to be read.

use crate::batch::{BatchAssembler, TargetEncoder};
use crate::config::{BatchConfig, TargetSpec};
use crate::convert::ConverterRegistry;
use crate::error::Result;
use crate::extract::FeatureExtractor;
use crate::label::{LabelEncoder, LabelVocabulary};
use crate::table::Schema;
use tracing::debug;

/// Feature and target columns, plus an optional fixed vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSelection {
    features: Vec<String>,
    target: TargetSpec,
    vocabulary: Option<LabelVocabulary>,
}

impl ColumnSelection {
    pub fn new(features: Vec<String>, target: TargetSpec) -> Self {
        Self {
            features,
            target,
            vocabulary: None,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            features: config.feature_columns.clone(),
            target: config.target.clone(),
            vocabulary: config.vocabulary.clone(),
        }
    }

    /// Use `vocabulary` instead of the label column's domain.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: LabelVocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    /// Every selected column name, features first.
    pub fn columns(&self) -> Vec<&str> {
        self.features
            .iter()
            .map(String::as_str)
            .chain(self.target.columns())
            .collect()
    }

    /// Check the selection against `schema` with the default registry.
    ///
    /// Reads no rows. Fails with the same error [`resolve`](Self::resolve)
    /// would return.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        self.resolve(schema, ConverterRegistry::global()).map(|_| ())
    }

    /// Resolve every column and build the assembler.
    pub fn resolve(&self, schema: &Schema, registry: &ConverterRegistry) -> Result<BatchAssembler> {
        let features = FeatureExtractor::new(schema, &self.features, registry)?;

        let target = match &self.target {
            TargetSpec::None => None,
            TargetSpec::Categorical(column) => {
                let vocabulary = match &self.vocabulary {
                    Some(vocabulary) => vocabulary.clone(),
                    None => {
                        let (_, spec) = schema.require(column)?;
                        LabelVocabulary::from_column(spec)?
                    }
                };
                let encoder = LabelEncoder::new(schema, column, vocabulary, registry)?;
                Some(TargetEncoder::Categorical(encoder))
            }
            TargetSpec::Numeric(columns) => Some(TargetEncoder::Numeric(FeatureExtractor::new(
                schema, columns, registry,
            )?)),
        };

        debug!(
            features = self.features.len(),
            target = self.target.as_str(),
            "resolved column selection"
        );
        Ok(BatchAssembler::new(features, target))
    }
}

impl From<&BatchConfig> for ColumnSelection {
    fn from(config: &BatchConfig) -> Self {
        Self::from_config(config)
    }
}
