// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote state convergence.
//!
//! Remote resources change state on their own schedule. Brickyard waits for
//! them by checking their state at a fixed interval until a check reports
//! that the desired state was reached. There is no backoff and no retry of a
//! failed check. A query error ends the wait immediately.
//!
//! # Deadlines and Cancellation
//!
//! A [`WaitPolicy`] without deadline waits forever, which is what job control
//! does by default. A deadline turns a wait that overstays into
//! [`WaitError::TimedOut`]. Every wait also observes a
//! [`CancellationToken`], so a caller can stop all outstanding waits at once.

use crate::remote::RemoteError;

use std::{future::Future, time::Duration};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default interval between two checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Result of checking remote state once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed<T> {
    /// Desired state reached.
    Ready(T),

    /// Still waiting, with a short description of the state observed.
    Waiting(String),
}

/// How long and how often to wait for convergence.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    interval: Duration,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl WaitPolicy {
    /// Construct policy that checks at interval without any deadline.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Give up on waits still running at deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Observe cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

/// Check remote state until it converges.
///
/// The first check happens right away. Between two checks the wait sleeps
/// for the policy interval, unless the deadline or a cancellation comes
/// first.
///
/// # Errors
///
/// - Return [`WaitError::Query`] if remote state cannot be queried.
/// - Return [`WaitError::TimedOut`] if the policy deadline passes.
/// - Return [`WaitError::Cancelled`] if the policy token gets cancelled.
pub async fn converge<T, P, F>(policy: &WaitPolicy, subject: &str, mut check: P) -> Result<T>
where
    P: FnMut() -> F,
    F: Future<Output = Result<Observed<T>, RemoteError>>,
{
    loop {
        if policy.cancel.is_cancelled() {
            return Err(WaitError::Cancelled {
                subject: subject.to_string(),
            });
        }

        let observed = match check().await {
            Ok(Observed::Ready(value)) => return Ok(value),
            Ok(Observed::Waiting(observed)) => observed,
            Err(err) => {
                return Err(WaitError::Query {
                    source: err,
                    subject: subject.to_string(),
                })
            }
        };

        let wake = Instant::now() + policy.interval;
        if policy.deadline.is_some_and(|deadline| deadline < wake) {
            return Err(WaitError::TimedOut {
                subject: subject.to_string(),
            });
        }

        debug!("{subject} is {observed}, checking again in {:?}", policy.interval);
        tokio::select! {
            _ = sleep(policy.interval) => {}
            _ = policy.cancel.cancelled() => {
                return Err(WaitError::Cancelled {
                    subject: subject.to_string(),
                });
            }
        }
    }
}

/// Convergence error types.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// Deadline passed before remote state converged.
    #[error("timed out waiting for {subject}")]
    TimedOut { subject: String },

    /// Wait was cancelled.
    #[error("cancelled waiting for {subject}")]
    Cancelled { subject: String },

    /// Remote state could not be queried.
    #[error("failed to query state of {subject}")]
    Query {
        #[source]
        source: RemoteError,
        subject: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = WaitError> = std::result::Result<T, E>;
