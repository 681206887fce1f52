//! Cancellation token for stopping long-running operations.
//!
//! This module provides [`CancellationToken`], a thread-safe flag that is
//! passed explicitly into every long-running call. The epoch loop polls it at
//! each batch boundary; the batch iterator itself knows nothing about it.
//!
//! # Example
//!
//! ```
//! use lex_training::CancellationToken;
//!
//! let token = CancellationToken::new();
//! assert!(!token.is_cancelled());
//!
//! token.cancel();
//! assert!(token.is_cancelled());
//! assert!(token.check().is_err());
//!
//! token.reset();
//! assert!(token.check().is_ok());
//! ```
//!
//! # Thread Safety
//!
//! `CancellationToken` is `Send + Sync`, allowing safe use across threads.

use crate::error::{Result, TrainingError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A token that can be used to signal cancellation of an operation.
///
/// Created via [`CancellationToken::new()`]. Clones share one flag, so a
/// clone handed to another thread can stop a loop running here.
///
/// # Example
///
/// ```rust,ignore
/// let token = CancellationToken::new();
/// let stop = token.clone();
///
/// std::thread::spawn(move || {
///     std::thread::sleep(std::time::Duration::from_secs(10));
///     stop.cancel();
/// });
///
/// trainer.train(&mut learner, &mut batches)?; // returns Err(Cancelled)
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

// Tokens are cancelled from a different thread than the one training
static_assertions::assert_impl_all!(CancellationToken: Send, Sync);

impl CancellationToken {
    /// Creates a new cancellation token in the non-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation of the operation.
    ///
    /// Thread-safe; can be called from any thread. Operations observe it at
    /// their next check.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if [`cancel()`](Self::cancel) has been called on this
    /// token or any of its clones.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another operation.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// `Err(TrainingError::Cancelled)` once cancellation has been requested.
    ///
    /// # Example
    ///
    /// ```
    /// use lex_training::{CancellationToken, TrainingError};
    ///
    /// fn step(token: &CancellationToken) -> Result<(), TrainingError> {
    ///     token.check()?;
    ///     // ... one unit of work
    ///     Ok(())
    /// }
    ///
    /// let token = CancellationToken::new();
    /// assert!(step(&token).is_ok());
    /// token.cancel();
    /// assert!(step(&token).unwrap_err().is_cancelled());
    /// ```
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TrainingError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_default_not_cancelled() {
        let token = CancellationToken::default();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancellation_token_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(TrainingError::Cancelled)));
    }

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_reset() {
        let token = CancellationToken::new();
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_thread_safe() {
        use std::thread;

        let token = CancellationToken::new();
        let token_clone = token.clone();

        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(50));
            token_clone.cancel();
        });

        for _ in 0..100 {
            if token.is_cancelled() {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(1));
        }

        handle.join().unwrap();
        assert!(token.is_cancelled());
    }
}
