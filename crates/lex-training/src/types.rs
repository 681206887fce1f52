//! Result types returned by the trainer and the predictor.
//!
//! - [`TrainingSummary`]: returned by [`Trainer::train()`](crate::Trainer::train)
//! - [`EpochStats`]: one entry per completed epoch
//! - [`Prediction`]: one decoded output row

use crate::config::LearningMode;
use crate::progress::TrainingPhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics for one pass over the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub phase: TrainingPhase,

    /// 1-based epoch number within the phase.
    pub epoch: usize,

    pub batches: usize,

    pub examples: usize,

    /// Mean of the per-batch losses.
    pub mean_loss: f64,
}

/// Result of a completed training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TrainingSummary {
    pub mode: LearningMode,

    /// Epochs completed over all phases.
    pub epochs: usize,

    pub batches_processed: usize,

    pub examples_processed: usize,

    pub epoch_stats: Vec<EpochStats>,

    /// Mean loss of the last epoch.
    pub final_loss: Option<f64>,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,
}

impl TrainingSummary {
    /// Wall-clock duration of the run in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Per-epoch statistics of one phase.
    pub fn phase_stats(&self, phase: TrainingPhase) -> impl Iterator<Item = &EpochStats> {
        self.epoch_stats.iter().filter(move |stats| stats.phase == phase)
    }
}

/// One row of learner output.
///
/// For categorical targets `label` holds the decoded vocabulary entry; for
/// numeric or absent targets it is `None` and `values` carries the raw output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub row_key: String,
    pub label: Option<String>,
    pub values: Vec<f64>,
}
