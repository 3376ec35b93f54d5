//! Bounded exponential backoff around fallible async operations.

use crate::error::{TransferError, TransferResult};
use launchpad_core::RetryPolicy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fraction of the backoff delay used as the jitter amplitude.
pub const JITTER_FRACTION: f64 = 0.25;

/// Run `operation`, retrying errors tagged [`TransferError::Retryable`].
///
/// Jitter comes from a generator seeded for this call only.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: F,
) -> TransferResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TransferResult<T>>,
{
    let mut rng = StdRng::from_rng(&mut rand::rng());
    with_retry_rng(policy, cancel, &mut rng, operation).await
}

/// [`with_retry`] with a caller-supplied jitter source.
///
/// Attempts run strictly one after another. Both the attempt itself and
/// the wait before the next one end as soon as `cancel` fires.
pub async fn with_retry_rng<T, F, Fut, R>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    rng: &mut R,
    mut operation: F,
) -> TransferResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TransferResult<T>>,
    R: Rng,
{
    let policy = policy.normalized();
    let limit = policy.retry_limit();
    let mut retries: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            result = operation() => result,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => err,
            Err(err) => return Err(err),
        };

        if retries >= limit {
            return Err(TransferError::RetryExhausted {
                attempts: retries + 1,
                source: Box::new(err.into_inner()),
            });
        }

        // A zero hint (`Retry-After: 0` or a past date) counts as no hint.
        let delay = match err.retry_after() {
            Some(hint) if !hint.is_zero() => hint,
            _ => apply_jitter(
                backoff_delay(&policy, retries),
                rng.random_range(-1.0..=1.0),
            ),
        };

        if policy.log_retries {
            tracing::warn!(
                attempt = retries + 1,
                max_retries = limit,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after transient failure"
            );
        } else {
            tracing::debug!(
                attempt = retries + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after transient failure"
            );
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        retries += 1;
    }
}

/// Backoff before jitter for retry `n` (0-indexed): `min(base * 2^n, max)`.
pub fn backoff_delay(policy: &RetryPolicy, n: u32) -> Duration {
    let policy = policy.normalized();
    1u32.checked_shl(n)
        .and_then(|factor| policy.base_delay.checked_mul(factor))
        .map_or(policy.max_delay, |delay| delay.min(policy.max_delay))
}

/// Shift `delay` by `unit * 25%`, with `unit` in `[-1, 1]`.
///
/// A result below zero falls back to half the unjittered delay.
pub fn apply_jitter(delay: Duration, unit: f64) -> Duration {
    let unit = unit.clamp(-1.0, 1.0);
    let base = delay.as_secs_f64();
    let jittered = base + base * JITTER_FRACTION * unit;
    if jittered < 0.0 || !jittered.is_finite() {
        return delay / 2;
    }
    Duration::from_secs_f64(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn policy(max_retries: i32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            log_retries: false,
        }
    }

    fn transient() -> TransferError {
        TransferError::retryable(
            TransferError::Status {
                method: "GET".to_string(),
                url: "https://api.example.com/v1/apps".to_string(),
                status: 429,
                body: String::new(),
            },
            None,
        )
    }

    fn counting_op(
        calls: Arc<AtomicU32>,
        fail_times: u32,
        retryable: bool,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = TransferResult<u32>> + Send>> {
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= fail_times {
                    if retryable {
                        Err(transient())
                    } else {
                        Err(TransferError::InvalidRequest("bad".to_string()))
                    }
                } else {
                    Ok(n)
                }
            })
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            log_retries: false,
        };
        let expected = [1, 2, 4, 8, 16, 30, 30];
        for (n, secs) in expected.iter().enumerate() {
            assert_eq!(backoff_delay(&policy, n as u32), Duration::from_secs(*secs));
        }
        assert_eq!(backoff_delay(&policy, 64), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_within_quarter() {
        let mut rng = StdRng::seed_from_u64(42);
        let policy = RetryPolicy::default();
        for n in 0..8 {
            let delay = backoff_delay(&policy, n);
            for _ in 0..200 {
                let jittered = apply_jitter(delay, rng.random_range(-1.0..=1.0));
                assert!(jittered >= delay.mul_f64(0.75) - Duration::from_micros(1));
                assert!(jittered <= delay.mul_f64(1.25) + Duration::from_micros(1));
            }
        }
        assert_eq!(apply_jitter(Duration::from_secs(4), -1.0), Duration::from_secs(3));
        assert_eq!(apply_jitter(Duration::from_secs(4), 1.0), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let result = with_retry(&policy(3), &cancel, counting_op(calls.clone(), 2, true)).await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let err = with_retry(&policy(2), &cancel, counting_op(calls.clone(), u32::MAX, true))
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            TransferError::RetryExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, TransferError::Status { status: 429, .. }));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_invokes_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let err = with_retry(&policy(0), &cancel, counting_op(calls.clone(), u32::MAX, true))
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, TransferError::RetryExhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_negative_retries_use_default() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let result = with_retry(&policy(-1), &cancel, counting_op(calls.clone(), u32::MAX, true)).await;
        assert!(matches!(result, Err(TransferError::RetryExhausted { attempts: 4, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let err = with_retry(&policy(5), &cancel, counting_op(calls.clone(), u32::MAX, false))
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, TransferError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_retry_after_hint_honored() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let counter = calls.clone();
        let result = with_retry(&policy(1), &cancel, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransferError::retryable(
                        TransferError::InvalidRequest("slow down".to_string()),
                        Some(Duration::from_millis(50)),
                    ))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_zero_hint_falls_back_to_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let slow = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(1),
            log_retries: false,
        };
        let started = Instant::now();
        let counter = calls.clone();
        let err = with_retry(&slow, &cancel, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TransferError::retryable(
                    TransferError::InvalidRequest("slow down".to_string()),
                    Some(Duration::ZERO),
                ))
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, TransferError::RetryExhausted { attempts: 2, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_millis(140));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_wait() {
        let cancel = CancellationToken::new();
        let long_wait = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
            log_retries: true,
        };
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let calls = Arc::new(AtomicU32::new(0));
        let err = with_retry(&long_wait, &cancel, counting_op(calls.clone(), u32::MAX, true))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_runs() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let err = with_retry(&policy(3), &cancel, counting_op(calls.clone(), 0, true))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let delays = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..5)
                .map(|n| {
                    apply_jitter(
                        backoff_delay(&RetryPolicy::default(), n),
                        rng.random_range(-1.0..=1.0),
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(delays(7), delays(7));
    }
}
