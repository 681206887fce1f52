//! The learner seam and serialized learner construction.
//!
//! The epoch loop knows nothing about how a model learns. It hands batches to
//! a [`Learner`] and reads back a loss. Construction goes through
//! [`construct_learner`], which holds one process-wide lock so that backends
//! with non-reentrant initialization are never built concurrently. Batch
//! iteration itself is not serialized.

use crate::config::LearningMode;
use crate::error::{Result, TrainingError};
use lex_batching::Batch;
use ndarray::{Array2, ArrayView2};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static CONSTRUCTION_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// A model that learns from batches.
///
/// Only [`fit`](Self::fit) and [`predict`](Self::predict) are required.
/// Learners that support unsupervised pretraining override
/// [`pretrain`](Self::pretrain).
pub trait Learner: Send {
    /// One supervised step on a batch with labels. Returns the batch loss.
    fn fit(&mut self, batch: &Batch) -> Result<f64>;

    /// One unsupervised step on the features of a batch.
    fn pretrain(&mut self, batch: &Batch) -> Result<f64> {
        let _ = batch;
        Err(TrainingError::Learner(
            "learner does not support pretraining".to_string(),
        ))
    }

    /// One supervised step after pretraining. Defaults to [`fit`](Self::fit).
    fn finetune(&mut self, batch: &Batch) -> Result<f64> {
        self.fit(batch)
    }

    /// One output row per feature row.
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

impl<L: Learner + ?Sized> Learner for Box<L> {
    fn fit(&mut self, batch: &Batch) -> Result<f64> {
        (**self).fit(batch)
    }

    fn pretrain(&mut self, batch: &Batch) -> Result<f64> {
        (**self).pretrain(batch)
    }

    fn finetune(&mut self, batch: &Batch) -> Result<f64> {
        (**self).finetune(batch)
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        (**self).predict(features)
    }
}

/// Dimensions a learner is built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerSpec {
    pub input_width: usize,

    /// `None` when training without a target.
    pub output_width: Option<usize>,

    pub mode: LearningMode,
}

/// Builds learners from a [`LearnerSpec`].
///
/// Implemented for every `Fn(&LearnerSpec) -> Result<L>`.
pub trait LearnerFactory {
    type Learner: Learner;

    fn build(&self, spec: &LearnerSpec) -> Result<Self::Learner>;
}

impl<F, L> LearnerFactory for F
where
    F: Fn(&LearnerSpec) -> Result<L>,
    L: Learner,
{
    type Learner = L;

    fn build(&self, spec: &LearnerSpec) -> Result<L> {
        self(spec)
    }
}

/// Build a learner while holding the process-wide construction lock.
///
/// Errors from the factory other than [`TrainingError::Construction`] are
/// wrapped in it.
pub fn construct_learner<F: LearnerFactory + ?Sized>(
    factory: &F,
    spec: &LearnerSpec,
) -> Result<F::Learner> {
    let _guard = CONSTRUCTION_LOCK.lock();
    debug!(
        input_width = spec.input_width,
        output_width = ?spec.output_width,
        mode = spec.mode.as_str(),
        "constructing learner"
    );
    factory.build(spec).map_err(|err| match err {
        TrainingError::Construction(_) => err,
        other => TrainingError::Construction(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[derive(Debug)]
    struct Constant {
        width: usize,
    }

    impl Learner for Constant {
        fn fit(&mut self, _batch: &Batch) -> Result<f64> {
            Ok(0.0)
        }

        fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
            Ok(Array2::zeros((features.nrows(), self.width)))
        }
    }

    fn spec() -> LearnerSpec {
        LearnerSpec {
            input_width: 3,
            output_width: Some(2),
            mode: LearningMode::Supervised,
        }
    }

    #[test]
    fn test_closure_factory() {
        let factory = |spec: &LearnerSpec| -> Result<Constant> {
            Ok(Constant {
                width: spec.output_width.unwrap_or(1),
            })
        };
        let learner = construct_learner(&factory, &spec()).unwrap();
        let out = learner.predict(Array2::zeros((4, 3)).view()).unwrap();
        assert_eq!(out.dim(), (4, 2));
    }

    #[test]
    fn test_factory_errors_become_construction_errors() {
        let factory = |_: &LearnerSpec| -> Result<Constant> {
            Err(TrainingError::Learner("out of memory".to_string()))
        };
        let err = construct_learner(&factory, &spec()).unwrap_err();
        assert!(matches!(err, TrainingError::Construction(_)));
        assert!(err.to_string().contains("out of memory"));
    }

    #[test]
    fn test_default_pretrain_is_unsupported() {
        let mut learner = Constant { width: 1 };
        let batch = Batch {
            features: Array2::zeros((1, 1)),
            labels: None,
            row_keys: vec![lex_batching::RowKey::new("Row0")],
        };
        assert!(matches!(
            learner.pretrain(&batch),
            Err(TrainingError::Learner(_))
        ));
        assert_eq!(learner.finetune(&batch).unwrap(), 0.0);
    }

    #[test]
    fn test_construction_is_serialized() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let factory = move |_: &LearnerSpec| -> Result<Constant> {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(10));
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(Constant { width: 1 })
                    };
                    construct_learner(&factory, &spec()).map(|_| ())
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
