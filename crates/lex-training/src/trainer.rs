//! The epoch loop.
//!
//! This module provides [`Trainer`] and its builder. A trainer pulls batches
//! from a [`TableBatchIterator`], hands them to a [`Learner`], and reports
//! progress after every epoch.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_training::{CancellationToken, Trainer, TrainingConfig};
//!
//! let token = CancellationToken::new();
//! let trainer = Trainer::builder()
//!     .config(TrainingConfig::builder().epochs(10).build()?)
//!     .on_progress(|update| println!("{:.0}% - {}", update.progress * 100.0, update.message))
//!     .cancellation_token(token.clone())
//!     .build()?;
//!
//! let summary = trainer.train(&mut learner, &mut batches)?;
//! println!("final loss: {:?}", summary.final_loss);
//! ```
//!
//! # Cancellation
//!
//! The token is polled before every batch. A cancelled run returns
//! [`TrainingError::Cancelled`] without starting another batch; the learner
//! keeps whatever it learned from the batches it already saw.

use crate::cancellation::CancellationToken;
use crate::config::TrainingConfig;
use crate::error::{Result, TrainingError};
use crate::learner::Learner;
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingPhase};
use crate::types::{EpochStats, TrainingSummary};
use chrono::Utc;
use lex_batching::TableBatchIterator;
use tracing::{debug, info, warn};

/// Runs training epochs over a batch iterator.
///
/// Use [`Trainer::builder()`] to construct a trainer.
pub struct Trainer {
    config: TrainingConfig,
    progress_callback: Option<ProgressCallback>,
    cancellation_token: Option<CancellationToken>,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field(
                "cancellation_token",
                &self.cancellation_token.as_ref().map(|_| "<token>"),
            )
            .finish()
    }
}

/// Running totals of one epoch.
#[derive(Default)]
struct EpochTotals {
    batches: usize,
    examples: usize,
    loss: f64,
}

impl Trainer {
    /// Create a new builder for `Trainer`.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run every epoch of the configured schedule.
    ///
    /// The iterator is reset before each epoch, so one iterator serves all
    /// passes. With pretraining followed by fine-tuning, the pretraining
    /// epochs run first.
    ///
    /// # Errors
    ///
    /// - [`TrainingError::InvalidData`] if the table has no rows, or none
    ///   survive skip-missing. The learner is not called.
    /// - [`TrainingError::InvalidConfig`] if the mode needs labels and the
    ///   iterator has no target.
    /// - [`TrainingError::Cancelled`] if the token was cancelled.
    /// - any error from the iterator or the learner.
    pub fn train<L: Learner + ?Sized>(
        &self,
        learner: &mut L,
        batches: &mut TableBatchIterator<'_>,
    ) -> Result<TrainingSummary> {
        let started_at = Utc::now();
        self.report(ProgressUpdate {
            phase: TrainingPhase::Initializing,
            message: "Checking training data".to_string(),
            ..ProgressUpdate::default()
        });

        let result = self
            .check_trainable(batches)
            .and_then(|()| self.run_schedule(learner, batches));

        let epoch_stats = match result {
            Ok(stats) => stats,
            Err(err) => {
                let phase = if err.is_cancelled() {
                    TrainingPhase::Cancelled
                } else {
                    TrainingPhase::Failed
                };
                warn!(error = %err, "training stopped");
                self.report(ProgressUpdate {
                    phase,
                    message: err.to_string(),
                    ..ProgressUpdate::default()
                });
                return Err(err);
            }
        };

        let summary = TrainingSummary {
            mode: self.config.mode,
            epochs: epoch_stats.len(),
            batches_processed: epoch_stats.iter().map(|s| s.batches).sum(),
            examples_processed: epoch_stats.iter().map(|s| s.examples).sum(),
            final_loss: epoch_stats.last().map(|s| s.mean_loss),
            epoch_stats,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            mode = summary.mode.as_str(),
            epochs = summary.epochs,
            batches = summary.batches_processed,
            final_loss = ?summary.final_loss,
            "training complete"
        );
        self.report(ProgressUpdate {
            phase: TrainingPhase::Complete,
            progress: 1.0,
            message: "Training complete".to_string(),
            epoch: None,
            mean_loss: summary.final_loss,
        });
        Ok(summary)
    }

    fn check_trainable(&self, batches: &mut TableBatchIterator<'_>) -> Result<()> {
        if batches.total_rows() == 0 {
            return Err(TrainingError::InvalidData(
                "the table has no rows".to_string(),
            ));
        }
        if self.config.mode.needs_labels() && batches.assembler().target().is_none() {
            return Err(TrainingError::InvalidConfig(format!(
                "{} training needs a target column",
                self.config.mode.as_str()
            )));
        }

        batches.reset();
        let usable = batches.has_next();
        batches.reset();
        if !usable {
            return Err(TrainingError::InvalidData(
                "every row has a missing value in a selected column".to_string(),
            ));
        }
        Ok(())
    }

    fn run_schedule<L: Learner + ?Sized>(
        &self,
        learner: &mut L,
        batches: &mut TableBatchIterator<'_>,
    ) -> Result<Vec<EpochStats>> {
        let total = self.config.total_epochs();
        let mut stats = Vec::with_capacity(total);

        for (phase, epochs) in self.config.schedule() {
            info!(phase = phase.as_str(), epochs, "starting phase");
            for epoch in 1..=epochs {
                let totals = self.run_epoch(phase, learner, batches)?;
                let mean_loss = totals.loss / totals.batches.max(1) as f64;
                debug!(
                    phase = phase.as_str(),
                    epoch,
                    batches = totals.batches,
                    mean_loss,
                    "epoch finished"
                );

                stats.push(EpochStats {
                    phase,
                    epoch,
                    batches: totals.batches,
                    examples: totals.examples,
                    mean_loss,
                });
                self.report(ProgressUpdate {
                    phase,
                    progress: stats.len() as f64 / total as f64,
                    message: format!("Epoch {epoch}/{epochs}"),
                    epoch: Some((epoch, epochs)),
                    mean_loss: Some(mean_loss),
                });
            }
        }

        Ok(stats)
    }

    fn run_epoch<L: Learner + ?Sized>(
        &self,
        phase: TrainingPhase,
        learner: &mut L,
        batches: &mut TableBatchIterator<'_>,
    ) -> Result<EpochTotals> {
        batches.reset();
        let mut totals = EpochTotals::default();

        loop {
            if let Some(token) = &self.cancellation_token {
                token.check()?;
            }
            if !batches.has_next() {
                break;
            }
            let batch = batches.next_batch()?;
            let loss = match phase {
                TrainingPhase::Pretraining => learner.pretrain(&batch)?,
                TrainingPhase::Finetuning => learner.finetune(&batch)?,
                _ => learner.fit(&batch)?,
            };
            totals.batches += 1;
            totals.examples += batch.num_examples();
            totals.loss += loss;
        }

        Ok(totals)
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(callback) = &self.progress_callback {
            callback(update);
        }
    }
}

/// Builder for [`Trainer`].
///
/// # Required Configuration
///
/// - [`config()`](Self::config)
///
/// # Optional Configuration
///
/// - [`on_progress()`](Self::on_progress)
/// - [`cancellation_token()`](Self::cancellation_token)
#[derive(Default)]
pub struct TrainerBuilder {
    config: Option<TrainingConfig>,
    progress_callback: Option<ProgressCallback>,
    cancellation_token: Option<CancellationToken>,
}

impl std::fmt::Debug for TrainerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainerBuilder")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field(
                "cancellation_token",
                &self.cancellation_token.as_ref().map(|_| "<token>"),
            )
            .finish()
    }
}

impl TrainerBuilder {
    /// Set the training configuration (required).
    #[must_use]
    pub fn config(mut self, config: TrainingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the progress callback (optional).
    ///
    /// Called once before the first epoch, after every epoch, and once with
    /// a terminal phase.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(std::sync::Arc::new(callback));
        self
    }

    /// Set an already shared progress callback (optional).
    #[must_use]
    pub fn progress_callback(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress_callback = callback;
        self
    }

    /// Set the cancellation token (optional).
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the trainer.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] if no configuration was set
    /// or it has zero epochs.
    pub fn build(self) -> Result<Trainer> {
        let config = self.config.ok_or_else(|| {
            TrainingError::InvalidConfig("config is required for Trainer".to_string())
        })?;
        if config.epochs == 0 || config.pretrain_epochs == Some(0) {
            return Err(TrainingError::InvalidConfig(
                "epochs must be at least 1".to_string(),
            ));
        }

        Ok(Trainer {
            config,
            progress_callback: self.progress_callback,
            cancellation_token: self.cancellation_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningMode;
    use lex_batching::{
        Batch, BatchConfig, Cell, CellType, ColumnSpec, DataTable, Row, Schema,
    };
    use ndarray::{Array2, ArrayView2};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records the rows of every batch it sees.
    #[derive(Default)]
    struct Recorder {
        fitted: Vec<usize>,
        pretrained: Vec<usize>,
    }

    impl Learner for Recorder {
        fn fit(&mut self, batch: &Batch) -> Result<f64> {
            self.fitted.push(batch.num_examples());
            Ok(batch.num_examples() as f64)
        }

        fn pretrain(&mut self, batch: &Batch) -> Result<f64> {
            self.pretrained.push(batch.num_examples());
            Ok(0.5)
        }

        fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
            Ok(Array2::zeros((features.nrows(), 1)))
        }
    }

    fn table(rows: usize) -> DataTable {
        let schema = Schema::new(vec![
            ColumnSpec::new("x", CellType::Double),
            ColumnSpec::new("label", CellType::String).with_domain(["a", "b"]),
        ])
        .unwrap();
        let rows = (0..rows)
            .map(|i| {
                let label = if i % 2 == 0 { "a" } else { "b" };
                Row::new(format!("Row{i}"), vec![Cell::Double(i as f64), Cell::from(label)])
            })
            .collect();
        DataTable::new(schema, rows).unwrap()
    }

    fn batch_config(batch_size: usize) -> BatchConfig {
        BatchConfig::builder()
            .feature_columns(["x"])
            .label_column("label")
            .batch_size(batch_size)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_config() {
        let err = Trainer::builder().build().unwrap_err();
        assert!(err.to_string().contains("config is required"));
    }

    #[test]
    fn test_debug_hides_callback() {
        let trainer = Trainer::builder()
            .config(TrainingConfig::default())
            .on_progress(|_| {})
            .build()
            .unwrap();
        let debug = format!("{trainer:?}");
        assert!(debug.contains("<callback>"));
    }

    #[test]
    fn test_epochs_reset_the_iterator() {
        let table = table(5);
        let mut batches = TableBatchIterator::new(&table, &batch_config(2)).unwrap();
        let trainer = Trainer::builder()
            .config(TrainingConfig::builder().epochs(3).build().unwrap())
            .build()
            .unwrap();

        let mut learner = Recorder::default();
        let summary = trainer.train(&mut learner, &mut batches).unwrap();

        assert_eq!(learner.fitted, vec![2, 2, 1, 2, 2, 1, 2, 2, 1]);
        assert_eq!(summary.epochs, 3);
        assert_eq!(summary.batches_processed, 9);
        assert_eq!(summary.examples_processed, 15);
        assert_eq!(summary.final_loss, Some(5.0 / 3.0));
    }

    #[test]
    fn test_pretrain_then_finetune_order() {
        let table = table(4);
        let mut batches = TableBatchIterator::new(&table, &batch_config(4)).unwrap();
        let config = TrainingConfig::builder()
            .mode(LearningMode::PretrainThenFinetune)
            .epochs(1)
            .pretrain_epochs(2)
            .build()
            .unwrap();
        let trainer = Trainer::builder().config(config).build().unwrap();

        let mut learner = Recorder::default();
        let summary = trainer.train(&mut learner, &mut batches).unwrap();

        assert_eq!(learner.pretrained, vec![4, 4]);
        assert_eq!(learner.fitted, vec![4]);
        assert_eq!(summary.phase_stats(TrainingPhase::Pretraining).count(), 2);
        assert_eq!(summary.phase_stats(TrainingPhase::Finetuning).count(), 1);
    }

    #[test]
    fn test_zero_rows_is_invalid_data() {
        let table = table(0);
        let mut batches = TableBatchIterator::new(&table, &batch_config(2)).unwrap();
        let trainer = Trainer::builder()
            .config(TrainingConfig::default())
            .build()
            .unwrap();

        let mut learner = Recorder::default();
        let err = trainer.train(&mut learner, &mut batches).unwrap_err();
        assert!(matches!(err, TrainingError::InvalidData(_)));
        assert!(learner.fitted.is_empty());
    }

    #[test]
    fn test_supervised_without_target_is_invalid_config() {
        let table = table(3);
        let config = BatchConfig::builder().feature_columns(["x"]).build().unwrap();
        let mut batches = TableBatchIterator::new(&table, &config).unwrap();
        let trainer = Trainer::builder()
            .config(TrainingConfig::default())
            .build()
            .unwrap();

        let err = trainer
            .train(&mut Recorder::default(), &mut batches)
            .unwrap_err();
        assert!(matches!(err, TrainingError::InvalidConfig(_)));
    }

    #[test]
    fn test_cancelled_before_first_batch() {
        let table = table(6);
        let mut batches = TableBatchIterator::new(&table, &batch_config(2)).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let phases = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&phases);
        let trainer = Trainer::builder()
            .config(TrainingConfig::default())
            .cancellation_token(token)
            .on_progress(move |update| seen.lock().push(update.phase))
            .build()
            .unwrap();

        let mut learner = Recorder::default();
        let err = trainer.train(&mut learner, &mut batches).unwrap_err();
        assert!(err.is_cancelled());
        assert!(learner.fitted.is_empty());
        assert_eq!(
            *phases.lock(),
            vec![TrainingPhase::Initializing, TrainingPhase::Cancelled]
        );
    }

    #[test]
    fn test_progress_is_monotonic() {
        let table = table(3);
        let mut batches = TableBatchIterator::new(&table, &batch_config(1)).unwrap();
        let progress = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&progress);
        let trainer = Trainer::builder()
            .config(TrainingConfig::builder().epochs(4).build().unwrap())
            .on_progress(move |update| seen.lock().push(update.progress))
            .build()
            .unwrap();

        trainer
            .train(&mut Recorder::default(), &mut batches)
            .unwrap();

        let progress = progress.lock();
        assert_eq!(progress.first(), Some(&0.0));
        assert_eq!(progress.last(), Some(&1.0));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }
}
