//! Retry utilities for registry requests.
//!
//! A request is retried only when the registry answers with a transient
//! status (501 and above; 500 is an application error and final). Requests
//! that never got a response are not retried here.

use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::errors::RegistryError;
use crate::util::mask_api_key;
use std::time::{Duration, Instant};
use tracing::{debug, error};

pub const MAX_RETRIES_DEFAULT: u32 = 5;
pub const RETRY_INTERVAL_DEFAULT: Duration = Duration::from_secs(5);

/// Time source for retry waits and probe deadlines.
pub trait Clock {
    /// Monotonic time elapsed since the clock was created.
    fn elapsed(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Whether a status should be retried.
pub fn is_transient(status: u16) -> bool {
    status >= 501
}

/// Fixed-interval retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts including the first try (minimum 1).
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES_DEFAULT,
            retry_interval: RETRY_INTERVAL_DEFAULT,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Send `request`, retrying transient statuses.
    ///
    /// Returns the first non-transient response. Connection-level failures
    /// propagate immediately; running out of attempts yields
    /// [`RegistryError::RetriesExhausted`].
    pub fn send<T, C>(
        &self,
        transport: &T,
        clock: &C,
        request: &HttpRequest,
    ) -> Result<HttpResponse, RegistryError>
    where
        T: Transport + ?Sized,
        C: Clock + ?Sized,
    {
        let max_attempts = self.max_attempts();
        let url = mask_api_key(&request.url);

        for attempt in 1..=max_attempts {
            debug!(
                method = %request.method,
                url = %url,
                attempt,
                max_attempts,
                "Sending registry request"
            );

            let response = transport.send(request).map_err(|e| {
                error!(url = %url, error = %e, "Failed to reach registry");
                RegistryError::Transport(e)
            })?;

            if !is_transient(response.status) {
                return Ok(response);
            }

            error!(
                url = %url,
                status = response.status,
                attempt,
                max_attempts,
                "Request attempt failed"
            );
            if attempt < max_attempts {
                debug!(
                    delay_secs = self.retry_interval.as_secs_f64(),
                    "Retrying after interval"
                );
                clock.sleep(self.retry_interval);
            }
        }

        error!(url = %url, attempts = max_attempts, "Retry attempts exceeded");
        Err(RegistryError::RetriesExhausted {
            attempts: max_attempts,
            url,
        })
    }
}
