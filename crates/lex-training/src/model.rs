//! A learner together with everything needed to feed it new rows.
//!
//! [`TrainedModel`] is returned by [`TrainingTask`](crate::TrainingTask) and
//! consumed by [`PredictionTask`](crate::PredictionTask). It keeps the schema
//! and label vocabulary captured at training time, so prediction input is
//! checked against the columns the learner actually saw and decoded with the
//! same label order.

use crate::learner::{Learner, LearnerSpec};
use crate::types::TrainingSummary;
use lex_batching::{LabelVocabulary, Schema, TargetSpec};

#[derive(Debug)]
pub struct TrainedModel<L> {
    learner: L,
    spec: LearnerSpec,
    schema: Schema,
    feature_columns: Vec<String>,
    target: TargetSpec,
    vocabulary: Option<LabelVocabulary>,
    summary: TrainingSummary,
}

impl<L: Learner> TrainedModel<L> {
    pub(crate) fn new(
        learner: L,
        spec: LearnerSpec,
        schema: Schema,
        feature_columns: Vec<String>,
        target: TargetSpec,
        vocabulary: Option<LabelVocabulary>,
        summary: TrainingSummary,
    ) -> Self {
        Self {
            learner,
            spec,
            schema,
            feature_columns,
            target,
            vocabulary,
            summary,
        }
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    pub fn learner_mut(&mut self) -> &mut L {
        &mut self.learner
    }

    #[must_use]
    pub fn into_learner(self) -> L {
        self.learner
    }

    /// Dimensions the learner was built for.
    pub fn spec(&self) -> &LearnerSpec {
        &self.spec
    }

    /// Schema of the table the model was trained on.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    /// Label vocabulary captured at training time, for categorical targets.
    pub fn vocabulary(&self) -> Option<&LabelVocabulary> {
        self.vocabulary.as_ref()
    }

    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }
}
