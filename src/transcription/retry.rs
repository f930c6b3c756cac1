/*!
 * Retry policy for calls to the transcription API.
 *
 * A policy is an attempt budget plus two functions: one that classifies a
 * failure as recoverable or not, and one that computes the wait before the
 * next attempt. `RetryContext` is the state machine behind it and can be
 * stepped without a runtime:
 *
 * ```text
 * ATTEMPT(n) -> success                         -> DONE
 *            -> non-recoverable                 -> FAIL
 *            -> recoverable, n + 1 < budget     -> WAIT(delay) -> ATTEMPT(n + 1)
 *            -> recoverable, n + 1 == budget    -> FAIL
 * ```
 *
 * On FAIL the original error is returned unchanged.
 */

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::app_config::RetryConfig;
use crate::errors::{ProviderError, TranscriptionError};

/// Wait used when the API does not suggest one
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 15.0;

/// Longest wait honoured between two transport attempts
pub const MAX_RETRY_DELAY_SECS: f64 = 3600.0;

/// Whether a failure is worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recoverability {
    Recoverable,
    NonRecoverable,
}

/// Result of one attempt, as seen by the state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptOutcome {
    Success,
    Failure {
        recoverability: Recoverability,
        delay: Duration,
    },
}

/// Next state after an attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryStep {
    Done,
    Fail,
    Wait { delay: Duration },
}

/// Per-call retry state
#[derive(Debug, Clone)]
pub struct RetryContext {
    attempt: u32,
    max_attempts: u32,
    last_recoverability: Option<Recoverability>,
    last_delay: Option<Duration>,
}

impl RetryContext {
    /// `max_attempts` is the total number of attempts, at least one is made
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            last_recoverability: None,
            last_delay: None,
        }
    }

    /// Zero-based number of the current attempt
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn last_recoverability(&self) -> Option<Recoverability> {
        self.last_recoverability
    }

    pub fn last_delay(&self) -> Option<Duration> {
        self.last_delay
    }

    /// Feed the outcome of the current attempt and get the next step
    pub fn advance(&mut self, outcome: AttemptOutcome) -> RetryStep {
        match outcome {
            AttemptOutcome::Success => RetryStep::Done,
            AttemptOutcome::Failure { recoverability, delay } => {
                self.last_recoverability = Some(recoverability);
                match recoverability {
                    Recoverability::NonRecoverable => RetryStep::Fail,
                    Recoverability::Recoverable if self.attempt + 1 < self.max_attempts => {
                        self.attempt += 1;
                        self.last_delay = Some(delay);
                        RetryStep::Wait { delay }
                    }
                    Recoverability::Recoverable => RetryStep::Fail,
                }
            }
        }
    }
}

/// Bounded retry loop around an async operation
#[derive(Debug, Clone)]
pub struct RetryPolicy<C, D> {
    name: String,
    max_attempts: u32,
    classify: C,
    delay: D,
}

impl<C, D> RetryPolicy<C, D> {
    pub fn new(name: impl Into<String>, max_attempts: u32, classify: C, delay: D) -> Self {
        Self {
            name: name.into(),
            max_attempts,
            classify,
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run `operation` until it succeeds, fails for good, or the budget runs out
    ///
    /// The operation receives the zero-based attempt number.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        C: Fn(&E) -> Recoverability,
        D: Fn(&E, u32) -> Duration,
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut context = RetryContext::new(self.max_attempts);

        loop {
            let attempt = context.attempt();
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let recoverability = (self.classify)(&error);
            let delay = match recoverability {
                Recoverability::Recoverable => (self.delay)(&error, attempt),
                Recoverability::NonRecoverable => Duration::ZERO,
            };

            match context.advance(AttemptOutcome::Failure { recoverability, delay }) {
                RetryStep::Wait { delay } => {
                    warn!(
                        "{}: attempt {}/{} failed: {}. Retrying in {:.1}s",
                        self.name,
                        attempt + 1,
                        context.max_attempts(),
                        error,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryStep::Fail | RetryStep::Done => return Err(error),
            }
        }
    }
}

/// Classify a transport failure
///
/// Only quota exhaustion over a daily window stops retries. Everything else,
/// including per-minute quotas, server faults and client errors, is retried.
pub fn classify_provider_error(error: &ProviderError) -> Recoverability {
    let daily_quota = error
        .details()
        .map(|details| details.quota_violations.iter().any(|v| v.quota_id.contains("PerDay")))
        .unwrap_or(false);

    if daily_quota {
        Recoverability::NonRecoverable
    } else {
        Recoverability::Recoverable
    }
}

/// Parse a protobuf duration string such as `"33s"` or `"1.5s"` into seconds
pub fn parse_retry_delay(value: &str) -> Option<f64> {
    let seconds: f64 = value.trim().strip_suffix('s')?.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

/// Seconds to wait after a transport failure
pub fn extract_retry_delay(error: &ProviderError, default_secs: f64) -> f64 {
    error
        .details()
        .and_then(|details| details.retry_delay.as_deref())
        .and_then(parse_retry_delay)
        .unwrap_or(default_secs)
}

/// Wait before resending a request after a transport failure
///
/// Suggested delays are capped at `MAX_RETRY_DELAY_SECS`. A value that is not
/// a valid duration falls back to `DEFAULT_RETRY_DELAY_SECS`.
pub fn transport_delay(error: &ProviderError, default_secs: f64) -> Duration {
    let fallback = Duration::from_secs(DEFAULT_RETRY_DELAY_SECS as u64);
    let secs = extract_retry_delay(error, default_secs);
    if secs.is_nan() {
        return fallback;
    }
    Duration::try_from_secs_f64(secs.min(MAX_RETRY_DELAY_SECS)).unwrap_or(fallback)
}

/// Exponential wait for regenerating an invalid transcript
///
/// `base * 2^min(attempt, max_exponent)`, capped at `max`.
pub fn validation_backoff(attempt: u32, base_ms: u64, max_exponent: u32, max_ms: u64) -> Duration {
    let factor = 1u64 << attempt.min(max_exponent).min(32);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}

/// Only invalid transcripts are regenerated; transport errors already had their retries
pub fn classify_transcription_error(error: &TranscriptionError) -> Recoverability {
    match error.root() {
        TranscriptionError::InvalidOutput(_) => Recoverability::Recoverable,
        _ => Recoverability::NonRecoverable,
    }
}

/// Policy for a single request to the transcription API
pub fn transport_policy(
    config: &RetryConfig,
) -> RetryPolicy<impl Fn(&ProviderError) -> Recoverability, impl Fn(&ProviderError, u32) -> Duration> {
    let default_secs = config.default_delay_secs;
    RetryPolicy::new(
        "API request",
        config.transport_attempts,
        classify_provider_error,
        move |error: &ProviderError, _attempt: u32| transport_delay(error, default_secs),
    )
}

/// Policy for regenerating a transcript until it passes validation
pub fn validation_policy(
    config: &RetryConfig,
) -> RetryPolicy<impl Fn(&TranscriptionError) -> Recoverability, impl Fn(&TranscriptionError, u32) -> Duration> {
    let (base_ms, max_exponent, max_ms) = (
        config.backoff_base_ms,
        config.backoff_max_exponent,
        config.backoff_max_ms,
    );
    RetryPolicy::new(
        "Transcript validation",
        config.validation_attempts,
        classify_transcription_error,
        move |_error: &TranscriptionError, attempt: u32| {
            validation_backoff(attempt, base_ms, max_exponent, max_ms)
        },
    )
}
