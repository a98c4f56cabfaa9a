//! Bounded retry with Fibonacci backoff for remote forge calls.
//!
//! Rate limits are the only retryable condition: any other error returns
//! to the caller immediately, unwrapped. Each invocation owns its backoff
//! state, so concurrent walks retry independently without coordination;
//! the platform's own limiter is the source of truth.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{FibonacciBuilder, Retryable};

use crate::remote::{FetchError, short_error_message};
use crate::walk::{FetchProgress, ProgressCallback, emit};

/// First backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 100;

/// Ceiling on a single backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 10_000;

/// Total attempts for one logical call, the first included.
pub const MAX_ATTEMPTS: usize = 10;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Total attempts, the first call included.
    pub max_attempts: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_attempts: MAX_ATTEMPTS,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_attempts: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_attempts,
            with_jitter: true,
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build a Fibonacci backoff strategy from this configuration.
    ///
    /// backon counts retries after the first attempt, hence the
    /// subtraction when translating the attempt cap.
    #[must_use]
    pub fn into_backoff(self) -> FibonacciBuilder {
        let mut builder = FibonacciBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1));

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Build the default backoff strategy for remote calls.
///
/// - Initial delay: 100 milliseconds
/// - Maximum delay: 10 seconds
/// - Total attempts: 10
/// - Jitter: enabled
#[must_use]
pub fn default_backoff() -> FibonacciBuilder {
    RetryConfig::default().into_backoff()
}

/// Execute a remote operation, retrying while the platform reports a
/// spent request quota.
///
/// Exhausting the attempt cap surfaces the last rate-limit error to the
/// caller. Retry waits are reported through `on_progress` and logged at
/// debug level.
///
/// # Arguments
///
/// * `operation` - The async operation to retry. Must be a closure that
///   returns a `Future`.
/// * `target` - What is being fetched, for progress reporting and logs.
/// * `on_progress` - Optional callback for reporting retry waits.
pub async fn execute<T, F, Fut>(
    mut operation: F,
    target: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let target = target.to_string();

    // Track attempt number for progress reporting
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(default_backoff())
        .notify(|err: &FetchError, dur| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            emit(
                on_progress,
                FetchProgress::RateLimitBackoff {
                    target: target.clone(),
                    retry_after_ms: dur.as_millis() as u64,
                    attempt: current_attempt,
                },
            );
            tracing::debug!(
                "Rate limited on {}, retrying in {:?} (attempt {}): {}",
                target,
                dur,
                current_attempt,
                short_error_message(err)
            );
        })
        .when(FetchError::is_rate_limited)
        .await
}
