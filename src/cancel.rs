//! Cooperative cancellation and per-repository deadlines
//!
//! Every blocking step of a repository's unit of work receives a `Deadline`.
//! Git subprocesses poll it while they run and HTTP requests take the time it
//! has left as their timeout, so an expired deadline or a cancelled token
//! stops the unit at the next step boundary at the latest.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Shared flag that asks every unit of work holding it to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Point in time after which a unit of work must give up, combined with the
/// fleet-wide cancellation token.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    timeout: Option<Duration>,
    token: CancellationToken,
}

impl Deadline {
    /// Start a deadline now. `None` means the unit may run indefinitely and
    /// only the token can stop it.
    pub fn start(timeout: Option<Duration>, token: CancellationToken) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            token,
        }
    }

    /// A deadline that never expires and cannot be cancelled from outside.
    pub fn unbounded() -> Self {
        Self::start(None, CancellationToken::new())
    }

    /// Time left before expiry, or `None` when there is no timeout.
    pub fn remaining(&self) -> Option<Duration> {
        self.timeout
            .map(|timeout| timeout.saturating_sub(self.started.elapsed()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail if the token was cancelled or the deadline has passed.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled {
                operation: operation.to_string(),
            });
        }
        if self.is_expired() {
            return Err(self.timeout_error(operation));
        }
        Ok(())
    }

    /// Build the timeout error for `operation`.
    pub fn timeout_error(&self, operation: &str) -> Error {
        Error::Timeout {
            operation: operation.to_string(),
            seconds: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
        }
    }
}
