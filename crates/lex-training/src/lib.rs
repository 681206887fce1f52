//! lex-training: epoch loop and prediction on top of `lex-batching`.
//!
//! This crate drives a caller-supplied [`Learner`] over the batches a
//! [`TableBatchIterator`](lex_batching::TableBatchIterator) produces. It owns
//! everything around the iterator that a training host needs, and nothing
//! about how a model learns.
//!
//! # Features
//!
//! - **Epoch Loop**: [`Trainer`] resets the iterator each epoch and supports
//!   supervised, pretraining and pretrain-then-finetune schedules
//! - **Cancellation**: a [`CancellationToken`] polled before every batch
//! - **Progress Reporting**: [`ProgressUpdate`] callbacks after every epoch
//! - **Serialized Construction**: [`construct_learner`] builds learners under
//!   one process-wide lock
//! - **Prediction**: [`Predictor`] decodes output rows with the vocabulary
//!   captured at training time
//! - **Tasks**: [`TrainingTask`] and [`PredictionTask`] share the
//!   `validate`/`run` interface of [`Task`]
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_training::{CancellationToken, PredictionTask, Task, TrainingConfig, TrainingTask};
//!
//! let batch_config = BatchConfig::builder()
//!     .feature_columns(["x", "y"])
//!     .label_column("species")
//!     .build()?;
//! let training = TrainingConfig::builder().epochs(10).build()?;
//!
//! let token = CancellationToken::new();
//! let model = TrainingTask::new(batch_config, training, |spec: &LearnerSpec| {
//!     MyNetwork::new(spec.input_width, spec.output_width.unwrap_or(1))
//! })
//! .on_progress(|u| println!("{:.0}% - {}", u.progress * 100.0, u.message))
//! .run(&table, &token)?;
//!
//! for prediction in PredictionTask::new(&model).run(&new_rows, &token)? {
//!     println!("{} -> {:?}", prediction.row_key, prediction.label);
//! }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, TrainingError>`](TrainingError).
//! Errors from the batching layer pass through unchanged in
//! [`TrainingError::Batching`], and every error reports an
//! [`ErrorKind`](lex_batching::ErrorKind) so callers can tell a configuration
//! problem from a data problem or a cancellation.
//!
//! # Thread Safety
//!
//! Training is single-threaded: one consumer pulls batches synchronously.
//! [`CancellationToken`] is `Send + Sync` and is meant to be cancelled from
//! another thread.

mod cancellation;
mod config;
mod error;
mod learner;
mod model;
mod predict;
mod progress;
mod task;
mod trainer;
mod types;

// Re-export public API
//
// Configuration types
pub use config::{LearningMode, TrainingConfig, TrainingConfigBuilder};
// Cancellation token
pub use cancellation::CancellationToken;
// Error types
pub use error::{Result, TrainingError};
// Learner seam
pub use learner::{Learner, LearnerFactory, LearnerSpec, construct_learner};
// Model types
pub use model::TrainedModel;
// Epoch loop and prediction
pub use predict::Predictor;
pub use trainer::{Trainer, TrainerBuilder};
// Tasks
pub use task::{PredictionTask, Task, TrainingTask};
// Progress reporting types
pub use progress::{ParseTrainingPhaseError, ProgressCallback, ProgressUpdate, TrainingPhase};
// Result types
pub use types::{EpochStats, Prediction, TrainingSummary};

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Trainer: Send, Sync);
    assert_impl_all!(TrainingSummary: Send, Sync);
    assert_impl_all!(ProgressUpdate: Send, Sync);
    assert_impl_all!(Box<dyn Learner>: Send);
}
