//! Cancellation and progress plumbing for apply operations
//!
//! These traits allow the declarative crate to be driven without
//! depending on a particular terminal UI.

use crate::executor::OperationResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Why an operation stopped before finishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("operation timed out")]
    TimedOut,
    #[error("operation cancelled")]
    Cancelled,
}

/// Cooperative deadline shared by a chain of operations.
///
/// Collaborators call [`Deadline::check`] before starting work and pass
/// [`Deadline::remaining`] down to blocking calls. Cancelling any clone
/// cancels all of them.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

impl Deadline {
    /// Never expires (can still be cancelled)
    pub fn none() -> Self {
        Self {
            expires_at: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A deadline no later than this one, sharing its cancel flag
    pub fn child(&self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        let expires_at = match (self.expires_at, candidate) {
            (Some(parent), Some(child)) => Some(parent.min(child)),
            (Some(parent), None) => Some(parent),
            (None, child) => child,
        };
        Self {
            expires_at,
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            Err(Interrupted::Cancelled)
        } else if self.is_expired() {
            Err(Interrupted::TimedOut)
        } else {
            Ok(())
        }
    }
}

/// Progress callback for apply operations
///
/// Implement this trait to receive progress updates while a domain
/// applies its changes.
pub trait ProgressCallback {
    /// Called before a domain starts working through `count` changes
    fn on_domain_start(&mut self, domain: &str, count: usize);

    /// Called when starting a single change
    fn on_item_start(&mut self, description: &str);

    /// Called when a change completes, whatever the outcome
    fn on_item_complete(&mut self, result: &OperationResult);

    /// Called when the domain is done
    fn on_domain_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_domain_start(&mut self, _domain: &str, _count: usize) {}
    fn on_item_start(&mut self, _description: &str) {}
    fn on_item_complete(&mut self, _result: &OperationResult) {}
    fn on_domain_complete(&mut self) {}
}
