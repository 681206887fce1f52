//! Configuration types for the epoch loop.
//!
//! This module provides [`TrainingConfig`] and its builder, as well as the
//! [`LearningMode`] enum.
//!
//! # Example
//!
//! ```
//! use lex_training::{LearningMode, TrainingConfig};
//!
//! let config = TrainingConfig::builder()
//!     .mode(LearningMode::PretrainThenFinetune)
//!     .epochs(20)
//!     .pretrain_epochs(5)
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::{Result, TrainingError};
use crate::progress::TrainingPhase;
use serde::{Deserialize, Serialize};

/// How batches are fed to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum LearningMode {
    /// Supervised passes only. Needs a target.
    #[default]
    Supervised,

    /// Unsupervised passes over the features only.
    Pretrain,

    /// Unsupervised passes, then supervised passes. Needs a target.
    PretrainThenFinetune,
}

impl LearningMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningMode::Supervised => "supervised",
            LearningMode::Pretrain => "pretrain",
            LearningMode::PretrainThenFinetune => "pretrain_then_finetune",
        }
    }

    /// Whether the batches must carry labels.
    #[must_use]
    pub fn needs_labels(&self) -> bool {
        !matches!(self, LearningMode::Pretrain)
    }
}

/// Configuration for the [`Trainer`](crate::Trainer).
///
/// # Validation
///
/// [`build()`](TrainingConfigBuilder::build) checks that `epochs` and
/// `pretrain_epochs` are at least 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// How batches are fed to the learner (default: supervised).
    pub mode: LearningMode,

    /// Supervised passes over the table (default: 1).
    ///
    /// In [`LearningMode::Pretrain`] this is the number of pretraining passes.
    pub epochs: usize,

    /// Pretraining passes before fine-tuning (default: same as `epochs`).
    ///
    /// Only used in [`LearningMode::PretrainThenFinetune`].
    pub pretrain_epochs: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            mode: LearningMode::default(),
            epochs: 1,
            pretrain_epochs: None,
        }
    }
}

impl TrainingConfig {
    /// Create a new builder for `TrainingConfig`.
    #[must_use]
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }

    /// The phases a run goes through, with the number of epochs in each.
    pub fn schedule(&self) -> Vec<(TrainingPhase, usize)> {
        match self.mode {
            LearningMode::Supervised => vec![(TrainingPhase::Training, self.epochs)],
            LearningMode::Pretrain => vec![(TrainingPhase::Pretraining, self.epochs)],
            LearningMode::PretrainThenFinetune => vec![
                (
                    TrainingPhase::Pretraining,
                    self.pretrain_epochs.unwrap_or(self.epochs),
                ),
                (TrainingPhase::Finetuning, self.epochs),
            ],
        }
    }

    /// Total epochs over all phases.
    pub fn total_epochs(&self) -> usize {
        self.schedule().iter().map(|(_, epochs)| epochs).sum()
    }
}

/// Builder for [`TrainingConfig`].
#[derive(Debug, Clone, Default)]
pub struct TrainingConfigBuilder {
    config: TrainingConfig,
}

impl TrainingConfigBuilder {
    #[must_use]
    pub fn mode(mut self, mode: LearningMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the number of epochs (default: 1).
    ///
    /// [`build()`](Self::build) returns an error if `epochs` is 0.
    #[must_use]
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.config.epochs = epochs;
        self
    }

    #[must_use]
    pub fn pretrain_epochs(mut self, epochs: usize) -> Self {
        self.config.pretrain_epochs = Some(epochs);
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] if `epochs` or
    /// `pretrain_epochs` is 0.
    pub fn build(self) -> Result<TrainingConfig> {
        let config = self.config;

        if config.epochs == 0 {
            return Err(TrainingError::InvalidConfig(
                "epochs must be at least 1".to_string(),
            ));
        }
        if config.pretrain_epochs == Some(0) {
            return Err(TrainingError::InvalidConfig(
                "pretrain_epochs must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.mode, LearningMode::Supervised);
        assert_eq!(config.epochs, 1);
        assert!(config.pretrain_epochs.is_none());
    }

    #[test]
    fn test_builder() {
        let config = TrainingConfig::builder()
            .mode(LearningMode::Pretrain)
            .epochs(7)
            .build()
            .unwrap();
        assert_eq!(config.mode, LearningMode::Pretrain);
        assert_eq!(config.epochs, 7);
    }

    #[test]
    fn test_invalid_epochs() {
        let result = TrainingConfig::builder().epochs(0).build();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("epochs"));

        let result = TrainingConfig::builder().pretrain_epochs(0).build();
        assert!(result.unwrap_err().to_string().contains("pretrain_epochs"));
    }

    #[test]
    fn test_schedule() {
        let config = TrainingConfig::builder()
            .mode(LearningMode::PretrainThenFinetune)
            .epochs(4)
            .pretrain_epochs(2)
            .build()
            .unwrap();
        assert_eq!(
            config.schedule(),
            vec![(TrainingPhase::Pretraining, 2), (TrainingPhase::Finetuning, 4)]
        );
        assert_eq!(config.total_epochs(), 6);

        let supervised = TrainingConfig::default();
        assert_eq!(supervised.schedule(), vec![(TrainingPhase::Training, 1)]);
    }

    #[test]
    fn test_learning_mode_needs_labels() {
        assert!(LearningMode::Supervised.needs_labels());
        assert!(LearningMode::PretrainThenFinetune.needs_labels());
        assert!(!LearningMode::Pretrain.needs_labels());
        assert_eq!(LearningMode::PretrainThenFinetune.as_str(), "pretrain_then_finetune");
    }
}
