//! Per-operation deadline and cancellation

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why an operation stopped before completing
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,
}

/// Bounded-time context passed into every record operation.
///
/// When the deadline passes or the token is cancelled, the running
/// operation future is dropped, which aborts any store or cache call it has
/// in flight.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl OpContext {
    /// No deadline of its own; the service default applies
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Same context with `default_timeout` fixed as the deadline if it had
    /// none. Shares the cancellation token.
    pub fn or_timeout(&self, default_timeout: Duration) -> Self {
        Self {
            deadline: Some(
                self.deadline
                    .unwrap_or_else(|| Instant::now() + default_timeout),
            ),
            cancel: self.cancel.clone(),
        }
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// A handle that cancels this context (and every clone of it)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Drive `fut` until it completes, the deadline passes or the context is
    /// cancelled. `default_timeout` is used when the context has no deadline.
    pub async fn run<F>(&self, default_timeout: Duration, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        let deadline = self
            .deadline
            .unwrap_or_else(|| Instant::now() + default_timeout);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            res = tokio::time::timeout_at(deadline, fut) => res.map_err(|_| Interrupted::DeadlineExceeded),
        }
    }
}
