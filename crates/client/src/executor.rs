//! Retrying request executor.
//!
//! Timeouts are retried up to the budget of the request's phase; every
//! other transport failure and every answered request ends the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use elliptics_protocol::{Method, Phase};
use tracing::{debug, error, warn};

use crate::error::Error;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// Timeout and attempt budget for one class of requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Attempts allowed; 0 is treated as 1.
    pub retries: u32,
    /// Delay after the first timed-out attempt; doubles per attempt, capped at `timeout`.
    pub backoff: Duration,
}

impl RetryBudget {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// GET/HEAD defaults: 3 s, 3 attempts.
    pub fn read_default() -> Self {
        Self::new(Duration::from_secs(3), 3)
    }

    /// POST defaults: 5 s, 9 attempts.
    pub fn write_default() -> Self {
        Self::new(Duration::from_secs(5), 9)
    }

    pub fn attempts(&self) -> u32 {
        self.retries.max(1)
    }

    /// Delay to wait after `attempt` (1-based) timed out.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.backoff.is_zero() {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff
            .saturating_mul(1u32 << exp)
            .min(self.timeout)
    }

    /// Worst-case time all attempts may take, excluding backoff.
    pub fn worst_case(&self) -> Duration {
        self.timeout.saturating_mul(self.attempts())
    }
}

/// Outcome of the retry loop, with the attempt count carried explicitly.
struct Attempted {
    result: Result<HttpResponse, TransportError>,
    attempts_made: u32,
}

/// Issues requests through a [`Transport`] under per-phase retry budgets.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    read: RetryBudget,
    write: RetryBudget,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, read: RetryBudget, write: RetryBudget) -> Self {
        Self {
            transport,
            read,
            write,
        }
    }

    /// Budget applied to `method`.
    pub fn budget(&self, method: Method) -> RetryBudget {
        match method.phase() {
            Phase::Read => self.read,
            Phase::Write => self.write,
        }
    }

    /// Sends the request, retrying timeouts, and returns whatever the store answered.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
    ) -> Result<HttpResponse, Error> {
        let budget = self.budget(method);
        let allowed = budget.attempts();
        let started = Instant::now();

        let Attempted {
            result,
            attempts_made,
        } = self.attempt_loop(method, url, body, budget).await;

        match result {
            Ok(resp) => {
                debug!(
                    %method,
                    url,
                    attempt = attempts_made,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "request succeeded"
                );
                if attempts_made > 1 {
                    warn!(
                        failed = attempts_made - 1,
                        allowed,
                        %method,
                        url,
                        timeout = ?budget.timeout,
                        "request needed retries"
                    );
                }
                Ok(resp)
            }
            Err(TransportError::Timeout(message)) => {
                error!(
                    failed = attempts_made,
                    allowed,
                    %method,
                    url,
                    timeout = ?budget.timeout,
                    %message,
                    "retry budget exhausted"
                );
                Err(Error::Timeout {
                    phase: method.phase(),
                    method,
                    url: url.to_string(),
                    attempts: attempts_made,
                    allowed,
                    timeout: budget.timeout,
                    message,
                })
            }
            Err(TransportError::Rejected(message)) => Err(Error::Network {
                method,
                url: url.to_string(),
                message,
            }),
        }
    }

    /// Like [`execute`](Self::execute) but any status other than 200 is an error.
    pub async fn execute_ok(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
    ) -> Result<Bytes, Error> {
        let resp = self.execute(method, url, body).await?;
        if !resp.is_ok() {
            warn!(status = resp.status, %method, url, "unexpected status");
            return Err(Error::RemoteStatus {
                phase: method.phase(),
                status: resp.status,
                url: url.to_string(),
                body: resp.body,
            });
        }
        Ok(resp.body)
    }

    async fn attempt_loop(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        budget: RetryBudget,
    ) -> Attempted {
        let allowed = budget.attempts();
        let mut attempts_made = 0;

        loop {
            attempts_made += 1;
            debug!(%method, url, attempt = attempts_made, "sending request");

            let request = HttpRequest {
                method,
                url: url.to_string(),
                body: body.clone(),
                timeout: budget.timeout,
            };
            let result = self.transport.send(request).await;

            match result {
                Err(TransportError::Timeout(_)) if attempts_made < allowed => {
                    let delay = budget.delay_after(attempts_made);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                result => {
                    return Attempted {
                        result,
                        attempts_made,
                    };
                }
            }
        }
    }
}
