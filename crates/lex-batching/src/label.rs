//! Categorical label encoding.
//!
//! A [`LabelVocabulary`] fixes the class order once; [`LabelEncoder`] turns a
//! row's label cell into a one-hot vector of vocabulary width, and
//! [`LabelVocabulary::decode`] maps an activation vector back to a label.
//!
//! The vocabulary order is part of the output contract: the same vocabulary
//! must be used for training targets and for decoding predictions.

use crate::convert::{CellFault, Converted, Converter, ConverterRegistry, Target};
use crate::error::{BatchingError, Result};
use crate::table::{ColumnSpec, Row, Schema};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Ordered set of distinct class labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelVocabulary {
    values: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelVocabulary {
    /// Build a vocabulary from values in canonical order.
    ///
    /// # Errors
    ///
    /// [`BatchingError::InvalidConfig`] if `values` is empty or contains a
    /// duplicate.
    pub fn new<I, S>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(BatchingError::InvalidConfig(
                "label vocabulary must not be empty".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            if index.insert(value.clone(), i).is_some() {
                return Err(BatchingError::InvalidConfig(format!(
                    "duplicate label '{value}' in vocabulary"
                )));
            }
        }
        Ok(Self { values, index })
    }

    /// Capture the vocabulary from a nominal column's declared domain.
    pub fn from_column(column: &ColumnSpec) -> Result<Self> {
        let domain = column
            .domain
            .as_ref()
            .ok_or_else(|| BatchingError::UnsupportedColumnType {
                column: column.name.clone(),
                actual: column.cell_type.to_string(),
                required: "a nominal column with a declared domain".to_string(),
            })?;
        if domain.is_empty() {
            return Err(BatchingError::EmptyVocabulary(column.name.clone()));
        }
        let vocabulary = Self::new(domain.iter().cloned())?;
        debug!(column = %column.name, classes = vocabulary.len(), "captured label vocabulary");
        Ok(vocabulary)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`; an empty vocabulary cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    /// One-hot encode a label value.
    ///
    /// # Errors
    ///
    /// [`BatchingError::UnknownLabel`] if `value` is not in the vocabulary.
    pub fn encode(&self, value: &str) -> Result<Vec<f64>> {
        let idx = self
            .index_of(value)
            .ok_or_else(|| BatchingError::UnknownLabel {
                value: value.to_string(),
                vocabulary_size: self.len(),
            })?;
        let mut one_hot = vec![0.0; self.len()];
        one_hot[idx] = 1.0;
        Ok(one_hot)
    }

    /// Label at the position of the largest activation.
    ///
    /// Ties go to the lowest index. `NaN` never wins; an all-`NaN` vector
    /// decodes to the first label.
    pub fn decode(&self, activations: &[f64]) -> Result<&str> {
        if activations.len() != self.len() {
            return Err(BatchingError::DecodeWidth {
                expected: self.len(),
                actual: activations.len(),
            });
        }

        let mut best = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (i, &value) in activations.iter().enumerate() {
            if value > best_value {
                best = i;
                best_value = value;
            }
        }
        Ok(&self.values[best])
    }

    /// Decode every row of an activation matrix.
    pub fn decode_rows(&self, activations: ArrayView2<'_, f64>) -> Result<Vec<String>> {
        activations
            .rows()
            .into_iter()
            .map(|row| {
                let row = row.to_vec();
                self.decode(&row).map(str::to_string)
            })
            .collect()
    }
}

impl TryFrom<Vec<String>> for LabelVocabulary {
    type Error = BatchingError;

    fn try_from(values: Vec<String>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<LabelVocabulary> for Vec<String> {
    fn from(vocabulary: LabelVocabulary) -> Self {
        vocabulary.values
    }
}

/// Binds a vocabulary to the label column of a schema.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    column: String,
    index: usize,
    converter: Converter,
    vocabulary: LabelVocabulary,
}

impl LabelEncoder {
    /// Resolve the label column and its text converter.
    pub fn new(
        schema: &Schema,
        column: &str,
        vocabulary: LabelVocabulary,
        registry: &ConverterRegistry,
    ) -> Result<Self> {
        let (index, spec) = schema.require(column)?;
        let converter = registry
            .converter_for(&spec.cell_type, Target::Text)
            .ok_or_else(|| BatchingError::UnsupportedColumnType {
                column: column.to_string(),
                actual: spec.cell_type.to_string(),
                required: Target::Text.to_string(),
            })?;
        Ok(Self {
            column: column.to_string(),
            index,
            converter,
            vocabulary,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn column_index(&self) -> usize {
        self.index
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    /// One-hot vector for a row's label cell.
    pub fn encode(&self, row: &Row) -> Result<Vec<f64>> {
        let cell = row.cell(self.index).ok_or_else(|| BatchingError::MissingCell {
            row: row.key().to_string(),
            column: self.column.clone(),
        })?;

        let text = match self.converter.convert(cell) {
            Ok(Converted::Text(text)) => text,
            Ok(other) => {
                return Err(BatchingError::ConversionFailed {
                    row: row.key().to_string(),
                    column: self.column.clone(),
                    cell_type: self.converter.source_type().to_string(),
                    reason: format!("expected text, converter produced {other:?}"),
                });
            }
            Err(CellFault::Missing) => {
                return Err(BatchingError::MissingCell {
                    row: row.key().to_string(),
                    column: self.column.clone(),
                });
            }
            Err(fault) => {
                return Err(BatchingError::ConversionFailed {
                    row: row.key().to_string(),
                    column: self.column.clone(),
                    cell_type: self.converter.source_type().to_string(),
                    reason: format!("{fault:?}"),
                });
            }
        };

        self.vocabulary.encode(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, CellType};
    use ndarray::array;

    fn cat_dog() -> LabelVocabulary {
        LabelVocabulary::new(["cat", "dog"]).unwrap()
    }

    #[test]
    fn test_encode_is_one_hot_in_vocabulary_order() {
        let vocab = cat_dog();
        assert_eq!(vocab.encode("dog").unwrap(), vec![0.0, 1.0]);
        assert_eq!(vocab.encode("cat").unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_unknown_label_is_an_error() {
        let err = cat_dog().encode("fox").unwrap_err();
        assert!(matches!(
            err,
            BatchingError::UnknownLabel { ref value, vocabulary_size: 2 } if value == "fox"
        ));
    }

    #[test]
    fn test_decode_picks_arg_max() {
        assert_eq!(cat_dog().decode(&[0.1, 0.9]).unwrap(), "dog");
        assert_eq!(cat_dog().decode(&[0.7, 0.3]).unwrap(), "cat");
    }

    #[test]
    fn test_decode_ties_go_to_lowest_index() {
        let vocab = LabelVocabulary::new(["a", "b", "c"]).unwrap();
        assert_eq!(vocab.decode(&[0.2, 0.4, 0.4]).unwrap(), "b");
        assert_eq!(vocab.decode(&[0.5, 0.5, 0.5]).unwrap(), "a");
    }

    #[test]
    fn test_decode_ignores_nan() {
        let vocab = LabelVocabulary::new(["a", "b", "c"]).unwrap();
        assert_eq!(vocab.decode(&[f64::NAN, 0.1, 0.0]).unwrap(), "b");
        assert_eq!(vocab.decode(&[f64::NAN; 3]).unwrap(), "a");
    }

    #[test]
    fn test_decode_width_mismatch() {
        let err = cat_dog().decode(&[1.0]).unwrap_err();
        assert!(matches!(err, BatchingError::DecodeWidth { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_round_trip_every_label() {
        let vocab = LabelVocabulary::new(["north", "east", "south", "west"]).unwrap();
        for label in vocab.values() {
            let encoded = vocab.encode(label).unwrap();
            assert_eq!(vocab.decode(&encoded).unwrap(), label);
        }
    }

    #[test]
    fn test_decode_rows() {
        let out = array![[0.9, 0.1], [0.2, 0.8], [0.5, 0.5]];
        assert_eq!(cat_dog().decode_rows(out.view()).unwrap(), vec!["cat", "dog", "cat"]);
    }

    #[test]
    fn test_vocabulary_rejects_empty_and_duplicates() {
        assert!(LabelVocabulary::new(Vec::<String>::new()).is_err());
        assert!(LabelVocabulary::new(["a", "a"]).is_err());
    }

    #[test]
    fn test_from_column_uses_domain_order() {
        let spec = ColumnSpec::new("label", CellType::String).with_domain(["zebra", "ant"]);
        let vocab = LabelVocabulary::from_column(&spec).unwrap();
        assert_eq!(vocab.values(), &["zebra".to_string(), "ant".to_string()]);
    }

    #[test]
    fn test_from_column_without_domain() {
        let spec = ColumnSpec::new("label", CellType::String);
        assert!(matches!(
            LabelVocabulary::from_column(&spec),
            Err(BatchingError::UnsupportedColumnType { .. })
        ));

        let empty = ColumnSpec::new("label", CellType::String).with_domain(Vec::<String>::new());
        assert!(matches!(
            LabelVocabulary::from_column(&empty),
            Err(BatchingError::EmptyVocabulary(_))
        ));
    }

    #[test]
    fn test_encoder_converts_numeric_labels_to_text() {
        let schema = Schema::new(vec![ColumnSpec::new("digit", CellType::Int)]).unwrap();
        let vocab = LabelVocabulary::new(["0", "1", "2"]).unwrap();
        let encoder =
            LabelEncoder::new(&schema, "digit", vocab, ConverterRegistry::global()).unwrap();

        let row = Row::new("Row0", vec![Cell::Int(2)]);
        assert_eq!(encoder.encode(&row).unwrap(), vec![0.0, 0.0, 1.0]);

        let missing = Row::new("Row1", vec![Cell::Missing]);
        assert!(encoder.encode(&missing).unwrap_err().is_missing_cell());
    }

    #[test]
    fn test_vocabulary_serde_round_trip() {
        let json = serde_json::to_string(&cat_dog()).unwrap();
        assert_eq!(json, r#"["cat","dog"]"#);
        let back: LabelVocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cat_dog());
        assert!(serde_json::from_str::<LabelVocabulary>(r#"["a","a"]"#).is_err());
    }
}
