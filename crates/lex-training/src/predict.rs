//! Running a trained learner over new rows.

use crate::cancellation::CancellationToken;
use crate::error::{Result, TrainingError};
use crate::learner::Learner;
use crate::types::Prediction;
use lex_batching::{LabelVocabulary, TableBatchIterator};
use tracing::{debug, info};

/// Turns learner output into [`Prediction`]s.
///
/// With a vocabulary, each output row is decoded to the label at its largest
/// activation, using the vocabulary the learner was trained with. With an
/// input width, every batch must have exactly that many features.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    vocabulary: Option<LabelVocabulary>,
    input_width: Option<usize>,
}

impl Predictor {
    pub fn new(vocabulary: Option<LabelVocabulary>) -> Self {
        Self {
            vocabulary,
            input_width: None,
        }
    }

    #[must_use]
    pub fn with_input_width(mut self, width: usize) -> Self {
        self.input_width = Some(width);
        self
    }

    pub fn vocabulary(&self) -> Option<&LabelVocabulary> {
        self.vocabulary.as_ref()
    }

    pub fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    /// Predict every row the iterator yields, in table order.
    ///
    /// The iterator is reset first. A table with no rows gives an empty
    /// result.
    ///
    /// # Errors
    ///
    /// - [`TrainingError::Cancelled`] if the token was cancelled
    /// - [`TrainingError::InvalidData`] if a batch's feature width differs
    ///   from the input width
    /// - [`TrainingError::OutputShape`] if the learner returns a different
    ///   number of rows than it was given
    /// - a decode-width error if an output row does not match the vocabulary
    pub fn predict<L: Learner + ?Sized>(
        &self,
        learner: &L,
        batches: &mut TableBatchIterator<'_>,
        token: &CancellationToken,
    ) -> Result<Vec<Prediction>> {
        batches.reset();
        let mut predictions = Vec::with_capacity(batches.total_rows());

        loop {
            token.check()?;
            if !batches.has_next() {
                break;
            }
            let batch = batches.next_batch()?;
            if let Some(expected) = self.input_width.filter(|w| *w != batch.feature_width()) {
                return Err(TrainingError::InvalidData(format!(
                    "input rows have {} features, the model was trained on {expected}",
                    batch.feature_width()
                )));
            }
            let output = learner.predict(batch.features.view())?;
            if output.nrows() != batch.num_examples() {
                return Err(TrainingError::OutputShape {
                    expected: batch.num_examples(),
                    actual: output.nrows(),
                });
            }

            for (key, row) in batch.row_keys.iter().zip(output.rows()) {
                let values = row.to_vec();
                let label = match &self.vocabulary {
                    Some(vocabulary) => Some(vocabulary.decode(&values)?.to_string()),
                    None => None,
                };
                predictions.push(Prediction {
                    row_key: key.to_string(),
                    label,
                    values,
                });
            }
            debug!(rows = batch.num_examples(), "predicted batch");
        }

        info!(rows = predictions.len(), "prediction complete");
        Ok(predictions)
    }
}
