use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::EnrichError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
        }
    }

    pub const fn with_attempts(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
        }
    }

    pub fn backoff(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.base_delay_ms * attempt as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicies {
    pub submit: RetryPolicy,
    pub verify: RetryPolicy,
    pub fetch: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            submit: RetryPolicy::once(),
            verify: RetryPolicy::once(),
            fetch: RetryPolicy::with_attempts(5, 500),
        }
    }
}

pub trait Pacer {
    fn pause(&self, duration: Duration);
}

impl<P: Pacer + ?Sized> Pacer for &P {
    fn pause(&self, duration: Duration) {
        (**self).pause(duration);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoPause;

impl Pacer for NoPause {
    fn pause(&self, _duration: Duration) {}
}

pub fn with_retries<T, F>(
    policy: RetryPolicy,
    pacer: &dyn Pacer,
    mut op: F,
) -> Result<T, (EnrichError, usize)>
where
    F: FnMut(usize) -> Result<T, EnrichError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1usize;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !is_retryable(&err) {
                    return Err((err, attempt));
                }
                warn!(attempt, max_attempts, error = %err, "request failed, retrying");
                pacer.pause(policy.backoff(attempt));
                attempt += 1;
            }
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

pub fn is_retryable(err: &EnrichError) -> bool {
    match err {
        EnrichError::EnrichrHttp(_) | EnrichError::BiomartHttp(_) => true,
        EnrichError::EnrichrStatus { status, .. } | EnrichError::BiomartStatus { status, .. } => {
            is_retryable_status(*status)
        }
        _ => false,
    }
}
