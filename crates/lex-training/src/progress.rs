//! Progress reporting types for the epoch loop.
//!
//! This module defines [`TrainingPhase`], [`ProgressUpdate`], and the
//! [`ProgressCallback`] type alias.
//!
//! # Example
//!
//! ```
//! use lex_training::{ProgressUpdate, Trainer, TrainingConfig};
//!
//! let trainer = Trainer::builder()
//!     .config(TrainingConfig::default())
//!     .on_progress(|update: ProgressUpdate| {
//!         println!("[{}] {:.0}% - {}", update.phase, update.progress * 100.0, update.message);
//!     })
//!     .build()
//!     .expect("valid trainer");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The phase a training or prediction run is in.
///
/// Terminal states: [`Complete`](Self::Complete), [`Failed`](Self::Failed),
/// [`Cancelled`](Self::Cancelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TrainingPhase {
    /// Resolving columns and constructing the learner.
    #[default]
    Initializing,

    /// Unsupervised passes over the features.
    Pretraining,

    /// Supervised passes over features and targets.
    Training,

    /// Supervised passes after pretraining.
    Finetuning,

    /// Running a trained learner over new rows.
    Predicting,

    Complete,

    Failed,

    Cancelled,
}

impl TrainingPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingPhase::Initializing => "initializing",
            TrainingPhase::Pretraining => "pretraining",
            TrainingPhase::Training => "training",
            TrainingPhase::Finetuning => "finetuning",
            TrainingPhase::Predicting => "predicting",
            TrainingPhase::Complete => "complete",
            TrainingPhase::Failed => "failed",
            TrainingPhase::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrainingPhase::Complete | TrainingPhase::Failed | TrainingPhase::Cancelled
        )
    }
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a [`TrainingPhase`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTrainingPhaseError {
    invalid_value: String,
}

impl ParseTrainingPhaseError {
    /// Returns the invalid value that caused the parse error.
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl fmt::Display for ParseTrainingPhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid training phase: '{}'. Valid values are: initializing, pretraining, \
             training, finetuning, predicting, complete, failed, cancelled",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseTrainingPhaseError {}

impl FromStr for TrainingPhase {
    type Err = ParseTrainingPhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initializing" => Ok(TrainingPhase::Initializing),
            "pretraining" => Ok(TrainingPhase::Pretraining),
            "training" => Ok(TrainingPhase::Training),
            "finetuning" => Ok(TrainingPhase::Finetuning),
            "predicting" => Ok(TrainingPhase::Predicting),
            "complete" => Ok(TrainingPhase::Complete),
            "failed" => Ok(TrainingPhase::Failed),
            "cancelled" => Ok(TrainingPhase::Cancelled),
            _ => Err(ParseTrainingPhaseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// A progress update from the epoch loop.
///
/// # Example
///
/// ```
/// use lex_training::{ProgressUpdate, TrainingPhase};
///
/// let update = ProgressUpdate {
///     phase: TrainingPhase::Training,
///     progress: 0.5,
///     message: "Epoch 5/10".to_string(),
///     epoch: Some((5, 10)),
///     mean_loss: Some(0.31),
/// };
///
/// println!("{:.0}% complete", update.progress * 100.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// The current phase.
    pub phase: TrainingPhase,

    /// Overall progress from 0.0 to 1.0 across all phases.
    ///
    /// Increases monotonically during a run that is not cancelled.
    pub progress: f64,

    /// Human-readable status message.
    pub message: String,

    /// Epochs completed in the current phase and the phase's total:
    /// `(completed, total)`.
    pub epoch: Option<(usize, usize)>,

    /// Mean of the losses the learner reported over the last epoch.
    pub mean_loss: Option<f64>,
}

impl Default for ProgressUpdate {
    fn default() -> Self {
        Self {
            phase: TrainingPhase::default(),
            progress: 0.0,
            message: String::new(),
            epoch: None,
            mean_loss: None,
        }
    }
}

/// Type alias for a progress callback function.
///
/// Callbacks must be thread-safe (`Send + Sync`) and should return quickly;
/// the loop calls them between batches.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use lex_training::{ProgressCallback, ProgressUpdate};
///
/// let callback: ProgressCallback = Arc::new(|update: ProgressUpdate| {
///     println!("[{}] {} - {}", update.phase, update.progress, update.message);
/// });
/// ```
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;
