//! Request-scoped execution context.
//!
//! # Responsibility
//! - Carry caller cancellation and an optional deadline into storage calls.
//! - Abort in-flight SQLite statements once the request is cancelled or its
//!   deadline passes.
//!
//! # Invariants
//! - Clones share state: cancelling any clone cancels all of them.
//! - A connection has at most one context attached at a time; pooled
//!   connections detach on return to the pool.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of SQLite VM instructions between two cancellation checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

/// Reason a request stopped before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    Cancelled,
    DeadlineExceeded,
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "request cancelled"),
            Self::DeadlineExceeded => write!(f, "request deadline exceeded"),
        }
    }
}

impl Error for ContextError {}

#[derive(Debug, Default)]
struct ContextState {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

impl ContextState {
    fn check(&self) -> Result<(), ContextError> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// Cancellable, optionally time-bounded request context.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    state: Arc<ContextState>,
}

impl RequestContext {
    /// Context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            state: Arc::new(ContextState {
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
            }),
        }
    }

    /// Context that expires `timeout` from now.
    ///
    /// A timeout too large to represent yields a context without deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::background(),
        }
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.state.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.state
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns an error once the context is cancelled or expired.
    pub fn check(&self) -> Result<(), ContextError> {
        self.state.check()
    }

    /// Installs a progress handler that interrupts statements on `conn`
    /// when this context stops being active.
    pub(crate) fn attach(&self, conn: &Connection) {
        let state = Arc::clone(&self.state);
        conn.progress_handler(PROGRESS_CHECK_OPS, Some(move || state.check().is_err()));
    }

    /// Removes any progress handler previously installed by [`attach`].
    ///
    /// [`attach`]: RequestContext::attach
    pub(crate) fn detach(conn: &Connection) {
        conn.progress_handler(PROGRESS_CHECK_OPS, None::<fn() -> bool>);
    }
}
