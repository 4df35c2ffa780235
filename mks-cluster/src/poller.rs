//! Bounded wait-until-status polling.
//!
//! A [`Convergence`] repeatedly calls a refresh function and classifies the
//! status it returns. Pending statuses keep the loop going, target statuses
//! end it. A refresh error, an unknown status, the timeout or cancellation
//! end it with an error. Refreshes run one at a time; nothing is polled in
//! the background.

use std::fmt;
use std::future::Future;

use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PollTimings;
use crate::error::{Error, Result};

/// One wait operation: which statuses to wait through and which end it.
#[derive(Debug, Clone)]
pub struct Convergence<S> {
    waiting_for: String,
    pending: Vec<S>,
    target: Vec<S>,
    timings: PollTimings,
}

impl<S> Convergence<S>
where
    S: PartialEq + fmt::Display,
{
    pub fn new(
        waiting_for: impl Into<String>,
        pending: impl IntoIterator<Item = S>,
        target: impl IntoIterator<Item = S>,
        timings: PollTimings,
    ) -> Self {
        Self {
            waiting_for: waiting_for.into(),
            pending: pending.into_iter().collect(),
            target: target.into_iter().collect(),
            timings,
        }
    }

    /// Poll `refresh` until it reports a target status and return the value
    /// observed alongside it.
    pub async fn wait<T, F, Fut>(&self, cancel: &CancellationToken, mut refresh: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(T, S)>>,
    {
        let deadline = Instant::now() + self.timings.timeout;
        let mut pause = self.timings.delay;
        let mut last_status = String::from("none");
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let wake = Instant::now() + pause;
            if wake > deadline {
                return Err(self.timed_out(last_status));
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = sleep_until(wake) => {}
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            attempt += 1;
            let observed = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                res = timeout_at(deadline, refresh()) => match res {
                    Ok(observed) => observed,
                    Err(_) => return Err(self.timed_out(last_status)),
                },
            };

            let (value, status) = observed.map_err(|e| match e {
                Error::Cancelled => Error::Cancelled,
                e => Error::Convergence {
                    waiting_for: self.waiting_for.clone(),
                    source: Box::new(e),
                },
            })?;
            debug!(
                waiting_for = %self.waiting_for,
                attempt,
                status = %status,
                "Poll observation"
            );

            if self.target.contains(&status) {
                return Ok(value);
            }
            if !self.pending.contains(&status) {
                return Err(Error::UnexpectedStatus {
                    waiting_for: self.waiting_for.clone(),
                    status: status.to_string(),
                });
            }

            last_status = status.to_string();
            pause = self.timings.interval();
        }
    }

    fn timed_out(&self, last_status: String) -> Error {
        Error::ConvergenceTimeout {
            waiting_for: self.waiting_for.clone(),
            timeout: self.timings.timeout,
            last_status,
        }
    }
}
