//! Adaptive retry around single fetch operations
//!
//! Implements exponential backoff with optional jitter. Classification comes
//! from [`FetchError`]: transient failures retry, block signals short-circuit
//! back to the caller for the cooldown + fallback path, everything else
//! propagates immediately.

use crate::config::RetryPolicy;
use crate::types::FetchError;
use rand::Rng;
use std::time::{Duration, Instant};

/// Retry a fetch operation with exponential backoff.
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If successful, return result
/// 3. If the error is a block signal: return it untouched. The caller owns
///    the cooldown and fallback escalation, re-retrying a blocking source
///    only deepens the ban
/// 4. If the error is retryable and attempts remain: log, backoff, retry
/// 5. Otherwise return the error
///
/// **Backoff:** `delay = min(delay * multiplier, max_delay)` between
/// attempts, starting at `base_delay`, plus 0-50% random jitter when enabled.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g. "naver search", "dataset page")
/// * `policy` - Retry policy (attempt budget, delays)
/// * `operation` - Async closure performing one fetch attempt
pub async fn retry_fetch<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    let start_time = Instant::now();
    let max_attempts = policy.max_retries + 1;
    let mut attempt = 0u32;
    let mut delay_ms = policy.base_delay_ms;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(
                operation = operation_name,
                attempt,
                "Retrying fetch operation"
            );
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    let elapsed_ms = start_time.elapsed().as_millis();
                    if elapsed_ms > 10_000 {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = elapsed_ms,
                            "Fetch succeeded after extended retry period"
                        );
                    } else {
                        tracing::info!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = elapsed_ms,
                            "Fetch succeeded after retry"
                        );
                    }
                }
                return Ok(result);
            }
            Err(err) => {
                if err.is_blocked() {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        "Source sent a block signal, deferring to fallback"
                    );
                    return Err(err);
                }

                if !err.is_retryable() {
                    return Err(err);
                }

                if attempt >= max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis(),
                        error = %err,
                        "Fetch failed: retry budget exhausted"
                    );
                    return Err(err);
                }

                let sleep_ms = jittered(delay_ms, policy.jitter);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = sleep_ms,
                    error = %err,
                    "Transient fetch failure, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;

                delay_ms = ((delay_ms as f64 * policy.multiplier) as u64).min(policy.max_delay_ms);
            }
        }
    }
}

fn jittered(delay_ms: u64, jitter: bool) -> u64 {
    if !jitter || delay_ms == 0 {
        return delay_ms;
    }
    delay_ms + rand::thread_rng().gen_range(0..=delay_ms / 2)
}
