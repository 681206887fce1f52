//! Training and prediction as runnable tasks.
//!
//! A [`Task`] is validated against a schema before it reads any row, then
//! run over a table with an explicit cancellation token. Both tasks build
//! on [`ColumnSelection`] for their column checks.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_training::{PredictionTask, Task, TrainingTask};
//!
//! let training = TrainingTask::new(batch_config, TrainingConfig::default(), factory);
//! training.validate(table.schema())?;
//! let model = training.run(&table, &token)?;
//!
//! let predictions = PredictionTask::new(&model).run(&new_rows, &token)?;
//! ```

use crate::cancellation::CancellationToken;
use crate::config::TrainingConfig;
use crate::error::{Result, TrainingError};
use crate::learner::{Learner, LearnerFactory, LearnerSpec, construct_learner};
use crate::model::TrainedModel;
use crate::predict::Predictor;
use crate::progress::{ProgressCallback, ProgressUpdate};
use crate::trainer::Trainer;
use crate::types::Prediction;
use lex_batching::{
    BatchConfig, ColumnSelection, DEFAULT_BATCH_SIZE, DataTable, Schema, TableBatchIterator,
    TargetSpec, TypeEquivalence,
};
use tracing::{debug, info};

/// A unit of work over a data table.
pub trait Task {
    type Output;

    /// Check the task against a schema without reading rows.
    fn validate(&self, schema: &Schema) -> Result<()>;

    /// Validate, then run over every row of `table`.
    fn run(&self, table: &DataTable, token: &CancellationToken) -> Result<Self::Output>;
}

/// Builds a learner sized to the table and trains it.
pub struct TrainingTask<F> {
    batch: BatchConfig,
    training: TrainingConfig,
    factory: F,
    progress_callback: Option<ProgressCallback>,
}

impl<F> std::fmt::Debug for TrainingTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingTask")
            .field("batch", &self.batch)
            .field("training", &self.training)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl<F: LearnerFactory> TrainingTask<F> {
    pub fn new(batch: BatchConfig, training: TrainingConfig, factory: F) -> Self {
        Self {
            batch,
            training,
            factory,
            progress_callback: None,
        }
    }

    #[must_use]
    pub fn on_progress<C>(mut self, callback: C) -> Self
    where
        C: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(std::sync::Arc::new(callback));
        self
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch
    }

    pub fn training_config(&self) -> &TrainingConfig {
        &self.training
    }

    /// Input and output widths, reading the first batch if a collection
    /// column has no declared arity.
    fn learner_spec(
        &self,
        batches: &mut TableBatchIterator<'_>,
        token: &CancellationToken,
    ) -> Result<LearnerSpec> {
        let has_target = batches.assembler().target().is_some();
        let known = batches.feature_width().is_some()
            && (!has_target || batches.label_width().is_some());

        if !known {
            token.check()?;
            if !batches.has_next() {
                return Err(TrainingError::InvalidData(
                    "no usable rows to size the learner".to_string(),
                ));
            }
            let first = batches.next_batch()?;
            debug!(
                features = first.feature_width(),
                labels = ?first.label_width(),
                "learned widths from first batch"
            );
            batches.reset();
        }

        let input_width = batches.feature_width().ok_or_else(|| {
            TrainingError::InvalidData("feature width is unknown".to_string())
        })?;
        let output_width = if has_target {
            batches.label_width()
        } else {
            None
        };

        Ok(LearnerSpec {
            input_width,
            output_width,
            mode: self.training.mode,
        })
    }
}

impl<F: LearnerFactory> Task for TrainingTask<F> {
    type Output = TrainedModel<F::Learner>;

    fn validate(&self, schema: &Schema) -> Result<()> {
        if self.training.mode.needs_labels() && self.batch.target == TargetSpec::None {
            return Err(TrainingError::InvalidConfig(format!(
                "{} training needs a target column",
                self.training.mode.as_str()
            )));
        }
        ColumnSelection::from_config(&self.batch).validate(schema)?;
        Ok(())
    }

    fn run(&self, table: &DataTable, token: &CancellationToken) -> Result<Self::Output> {
        self.validate(table.schema())?;
        if table.is_empty() {
            return Err(TrainingError::InvalidData(
                "the table has no rows".to_string(),
            ));
        }

        let mut batches = TableBatchIterator::new(table, &self.batch)?;
        let spec = self.learner_spec(&mut batches, token)?;
        let mut learner = construct_learner(&self.factory, &spec)?;

        let trainer = Trainer::builder()
            .config(self.training.clone())
            .progress_callback(self.progress_callback.clone())
            .cancellation_token(token.clone())
            .build()?;
        let summary = trainer.train(&mut learner, &mut batches)?;

        info!(
            input_width = spec.input_width,
            output_width = ?spec.output_width,
            epochs = summary.epochs,
            "training task finished"
        );
        Ok(TrainedModel::new(
            learner,
            spec,
            table.schema().clone(),
            self.batch.feature_columns.clone(),
            self.batch.target.clone(),
            batches.vocabulary().cloned(),
            summary,
        ))
    }
}

/// Runs a trained model over new rows.
///
/// The input table needs the model's feature columns, with types equal to
/// the training types or declared equivalent. It does not need the target
/// column.
#[derive(Debug)]
pub struct PredictionTask<'m, L> {
    model: &'m TrainedModel<L>,
    equivalence: TypeEquivalence,
    batch_size: usize,
}

impl<'m, L: Learner> PredictionTask<'m, L> {
    pub fn new(model: &'m TrainedModel<L>) -> Self {
        Self {
            model,
            equivalence: TypeEquivalence::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_equivalence(mut self, equivalence: TypeEquivalence) -> Self {
        self.equivalence = equivalence;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn batch_config(&self) -> Result<BatchConfig> {
        Ok(BatchConfig::builder()
            .feature_columns(self.model.feature_columns().iter().cloned())
            .batch_size(self.batch_size)
            .build()?)
    }
}

impl<L: Learner> Task for PredictionTask<'_, L> {
    type Output = Vec<Prediction>;

    fn validate(&self, schema: &Schema) -> Result<()> {
        let features = self.model.feature_columns();
        self.equivalence.validate_columns(
            self.model.schema(),
            schema,
            features.iter().map(String::as_str),
        )?;
        ColumnSelection::new(features.to_vec(), TargetSpec::None).validate(schema)?;
        Ok(())
    }

    fn run(&self, table: &DataTable, token: &CancellationToken) -> Result<Self::Output> {
        self.validate(table.schema())?;
        let config = self.batch_config()?;
        if table.is_empty() {
            return Ok(Vec::new());
        }

        let mut batches = TableBatchIterator::new(table, &config)?;
        let trained_width = self.model.spec().input_width;
        if let Some(width) = batches.feature_width().filter(|w| *w != trained_width) {
            return Err(TrainingError::InvalidData(format!(
                "input rows have {width} features, the model was trained on {trained_width}"
            )));
        }

        Predictor::new(self.model.vocabulary().cloned())
            .with_input_width(trained_width)
            .predict(self.model.learner(), &mut batches, token)
    }
}
