//! Per-call evaluation context
//!
//! The engine threads an [`EvaluationContext`] through every `evaluate` call
//! down to [`VariableResolver::get_variable`](crate::VariableResolver). The
//! engine never inspects it; resolvers that perform I/O may use it to honour
//! cancellation or a deadline.

use crate::error::EvalError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared flag a caller flips to ask resolvers to stop work
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Cancellation and deadline information for one evaluation call
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl EvaluationContext {
    /// A context with no deadline and no cancellation token
    pub fn background() -> Self {
        Self::default()
    }

    /// Set an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach a cancellation token shared with the caller
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when no deadline is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fail with `Cancelled` or `DeadlineExceeded` when the caller has given up.
    ///
    /// Intended for resolver implementations; the engine does not call it.
    pub fn check(&self) -> Result<(), EvalError> {
        if self.is_cancelled() {
            return Err(EvalError::Cancelled);
        }
        if self.deadline_exceeded() {
            return Err(EvalError::DeadlineExceeded);
        }
        Ok(())
    }
}
