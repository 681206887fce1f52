//! Batch assembly.
//!
//! [`BatchAssembler`] turns a slice of rows into one [`Batch`]: a features
//! matrix and, when a target is configured, a labels matrix with the same
//! number of rows. Assembly is all-or-nothing; the first row that fails to
//! convert aborts the whole batch.

use crate::error::Result;
use crate::extract::FeatureExtractor;
use crate::label::{LabelEncoder, LabelVocabulary};
use crate::table::{Row, RowKey};
use ndarray::Array2;
use serde::Serialize;
use tracing::trace;

/// One mini-batch of examples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    /// `rows × feature width`, row-major.
    pub features: Array2<f64>,

    /// `rows × label width`, present when a target is configured.
    pub labels: Option<Array2<f64>>,

    /// Key of the source row for each example, in order.
    pub row_keys: Vec<RowKey>,
}

impl Batch {
    /// Number of examples in this batch.
    pub fn num_examples(&self) -> usize {
        self.features.nrows()
    }

    pub fn feature_width(&self) -> usize {
        self.features.ncols()
    }

    pub fn label_width(&self) -> Option<usize> {
        self.labels.as_ref().map(Array2::ncols)
    }

    pub fn into_parts(self) -> (Array2<f64>, Option<Array2<f64>>, Vec<RowKey>) {
        (self.features, self.labels, self.row_keys)
    }
}

/// How the target vector of a row is produced.
#[derive(Debug, Clone)]
pub enum TargetEncoder {
    /// One-hot over a label vocabulary.
    Categorical(LabelEncoder),
    /// Raw numeric values of one or more columns.
    Numeric(FeatureExtractor),
}

impl TargetEncoder {
    pub fn encode(&self, row: &Row) -> Result<Vec<f64>> {
        match self {
            TargetEncoder::Categorical(encoder) => encoder.encode(row),
            TargetEncoder::Numeric(extractor) => extractor.extract(row),
        }
    }

    /// Target width, if known before the first row.
    pub fn width(&self) -> Option<usize> {
        match self {
            TargetEncoder::Categorical(encoder) => Some(encoder.vocabulary().len()),
            TargetEncoder::Numeric(extractor) => extractor.width(),
        }
    }

    pub fn column_indices(&self) -> Vec<usize> {
        match self {
            TargetEncoder::Categorical(encoder) => vec![encoder.column_index()],
            TargetEncoder::Numeric(extractor) => extractor.column_indices().collect(),
        }
    }

    pub fn vocabulary(&self) -> Option<&LabelVocabulary> {
        match self {
            TargetEncoder::Categorical(encoder) => Some(encoder.vocabulary()),
            TargetEncoder::Numeric(_) => None,
        }
    }
}

/// Stacks per-row feature and target vectors into matrices.
#[derive(Debug, Clone)]
pub struct BatchAssembler {
    features: FeatureExtractor,
    target: Option<TargetEncoder>,
}

impl BatchAssembler {
    pub fn new(features: FeatureExtractor, target: Option<TargetEncoder>) -> Self {
        Self { features, target }
    }

    pub fn features(&self) -> &FeatureExtractor {
        &self.features
    }

    pub fn target(&self) -> Option<&TargetEncoder> {
        self.target.as_ref()
    }

    /// Schema positions of every column a row must provide, features first.
    pub fn required_columns(&self) -> Vec<usize> {
        let mut columns: Vec<usize> = self.features.column_indices().collect();
        if let Some(target) = &self.target {
            columns.extend(target.column_indices());
        }
        columns
    }

    /// Build one batch from `rows`.
    ///
    /// Nothing is returned unless every row converts; the caller decides what
    /// happens to its cursor on error.
    pub fn assemble(&self, rows: &[&Row]) -> Result<Batch> {
        let mut features = Vec::new();
        let mut labels = self.target.as_ref().map(|_| Vec::new());
        let mut row_keys = Vec::with_capacity(rows.len());

        for row in rows {
            features.extend(self.features.extract(row)?);
            if let (Some(target), Some(labels)) = (&self.target, labels.as_mut()) {
                labels.extend(target.encode(row)?);
            }
            row_keys.push(row.key().clone());
        }

        let n = rows.len();
        let feature_width = self.features.width().unwrap_or(0);
        let features = Array2::from_shape_vec((n, feature_width), features)?;
        let labels = match (labels, &self.target) {
            (Some(values), Some(target)) => {
                let width = target.width().unwrap_or(0);
                Some(Array2::from_shape_vec((n, width), values)?)
            }
            _ => None,
        };

        trace!(rows = n, feature_width, "assembled batch");
        Ok(Batch {
            features,
            labels,
            row_keys,
        })
    }
}
