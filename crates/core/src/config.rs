//! Retry and timeout configuration resolved from environment overrides.

use std::time::Duration;

/// Environment variable overriding the retry count.
pub const ENV_MAX_RETRIES: &str = "LAUNCHPAD_MAX_RETRIES";
/// Environment variable overriding the initial backoff delay.
pub const ENV_BASE_DELAY: &str = "LAUNCHPAD_BASE_DELAY";
/// Environment variable overriding the backoff cap.
pub const ENV_MAX_DELAY: &str = "LAUNCHPAD_MAX_DELAY";
/// Environment variable enabling verbose retry logging.
pub const ENV_RETRY_LOG: &str = "LAUNCHPAD_RETRY_LOG";
/// Environment variable overriding the request timeout (duration string).
pub const ENV_TIMEOUT: &str = "LAUNCHPAD_TIMEOUT";
/// Environment variable overriding the request timeout (integer seconds).
pub const ENV_TIMEOUT_SECONDS: &str = "LAUNCHPAD_TIMEOUT_SECONDS";

pub const DEFAULT_MAX_RETRIES: i32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Backoff settings for one retried operation.
///
/// `max_retries == 0` disables retries entirely. A negative value means
/// "not configured" and is replaced by [`DEFAULT_MAX_RETRIES`] when the
/// policy is normalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: i32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub log_retries: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            log_retries: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Resolve the policy from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the policy from an arbitrary key lookup.
    ///
    /// Unparsable or out-of-range values are ignored and the default kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut policy = Self::default();

        if let Some(raw) = lookup(ENV_MAX_RETRIES)
            && let Ok(value) = raw.trim().parse::<i32>()
            && value >= 0
        {
            policy.max_retries = value;
        }
        if let Some(delay) = lookup(ENV_BASE_DELAY).and_then(|raw| positive_duration(&raw)) {
            policy.base_delay = delay;
        }
        if let Some(delay) = lookup(ENV_MAX_DELAY).and_then(|raw| positive_duration(&raw)) {
            policy.max_delay = delay;
        }
        if let Some(raw) = lookup(ENV_RETRY_LOG) {
            policy.log_retries = !raw.trim().is_empty();
        }

        policy
    }

    /// Replace unset values with defaults.
    pub fn normalized(mut self) -> Self {
        if self.max_retries < 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if self.base_delay.is_zero() {
            self.base_delay = DEFAULT_BASE_DELAY;
        }
        if self.max_delay.is_zero() {
            self.max_delay = DEFAULT_MAX_DELAY;
        }
        self
    }

    /// Number of retries after the first attempt, after normalization.
    pub fn retry_limit(&self) -> u32 {
        let max = self.normalized().max_retries;
        u32::try_from(max).unwrap_or(0)
    }
}

/// Resolve the HTTP request timeout from process environment variables.
pub fn resolve_timeout() -> Duration {
    resolve_timeout_from(|key| std::env::var(key).ok())
}

/// Resolve the HTTP request timeout from an arbitrary key lookup.
///
/// A non-empty duration variable decides the timeout on its own, falling back
/// to the default when invalid. Whole seconds are read only when it is unset.
pub fn resolve_timeout_from<F>(lookup: F) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_TIMEOUT).filter(|raw| !raw.trim().is_empty()) {
        return positive_duration(&raw).unwrap_or(DEFAULT_TIMEOUT);
    }
    if let Some(raw) = lookup(ENV_TIMEOUT_SECONDS)
        && let Ok(secs) = raw.trim().parse::<u64>()
        && secs > 0
    {
        return Duration::from_secs(secs);
    }
    DEFAULT_TIMEOUT
}

fn positive_duration(raw: &str) -> Option<Duration> {
    parse_duration(raw).ok().filter(|d| !d.is_zero())
}

/// Parse a duration such as `"1s"`, `"250ms"`, `"1m30s"` or `"1.5h"`.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `"0"` is zero.
/// Negative durations are rejected.
pub fn parse_duration(input: &str) -> crate::Result<Duration> {
    let s = input.trim();
    let invalid = || crate::Error::InvalidDuration(input.to_string());

    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() || s.starts_with('-') {
        return Err(invalid());
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    let mut total_nanos: f64 = 0.0;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1_000.0,
            "ms" => 1_000_000.0,
            "s" => 1_000_000_000.0,
            "m" => 60.0 * 1_000_000_000.0,
            "h" => 3600.0 * 1_000_000_000.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total_nanos += value * nanos_per_unit;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::from_lookup(lookup(&[]));
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert!(!policy.log_retries);
    }

    #[test]
    fn test_retry_policy_overrides() {
        let policy = RetryPolicy::from_lookup(lookup(&[
            (ENV_MAX_RETRIES, "5"),
            (ENV_BASE_DELAY, "200ms"),
            (ENV_MAX_DELAY, "1m"),
            (ENV_RETRY_LOG, "1"),
        ]));
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(200));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert!(policy.log_retries);
    }

    #[test]
    fn test_retry_policy_zero_retries_override_kept() {
        let policy = RetryPolicy::from_lookup(lookup(&[(ENV_MAX_RETRIES, "0")]));
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.retry_limit(), 0);
    }

    #[test]
    fn test_retry_policy_invalid_overrides_ignored() {
        let policy = RetryPolicy::from_lookup(lookup(&[
            (ENV_MAX_RETRIES, "-2"),
            (ENV_BASE_DELAY, "0s"),
            (ENV_MAX_DELAY, "soon"),
        ]));
        assert_eq!(policy, RetryPolicy::default());

        let policy = RetryPolicy::from_lookup(lookup(&[(ENV_MAX_RETRIES, "lots")]));
        assert_eq!(policy.max_retries, 3);
    }

    #[test]
    fn test_negative_retries_normalize_to_default() {
        let policy = RetryPolicy {
            max_retries: -1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            log_retries: false,
        };
        let normalized = policy.normalized();
        assert_eq!(normalized.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(normalized.base_delay, DEFAULT_BASE_DELAY);
        assert_eq!(normalized.max_delay, DEFAULT_MAX_DELAY);
        assert_eq!(policy.retry_limit(), 3);
    }

    #[test]
    fn test_timeout_resolution_order() {
        assert_eq!(resolve_timeout_from(lookup(&[])), DEFAULT_TIMEOUT);
        assert_eq!(
            resolve_timeout_from(lookup(&[(ENV_TIMEOUT_SECONDS, "90")])),
            Duration::from_secs(90)
        );
        assert_eq!(
            resolve_timeout_from(lookup(&[(ENV_TIMEOUT, "2m"), (ENV_TIMEOUT_SECONDS, "90")])),
            Duration::from_secs(120)
        );
        assert_eq!(
            resolve_timeout_from(lookup(&[(ENV_TIMEOUT, "nope"), (ENV_TIMEOUT_SECONDS, "0")])),
            DEFAULT_TIMEOUT
        );
    }

    #[test]
    fn test_invalid_timeout_does_not_defer_to_seconds() {
        assert_eq!(
            resolve_timeout_from(lookup(&[(ENV_TIMEOUT, "nope"), (ENV_TIMEOUT_SECONDS, "90")])),
            DEFAULT_TIMEOUT
        );
        assert_eq!(
            resolve_timeout_from(lookup(&[(ENV_TIMEOUT, "0s"), (ENV_TIMEOUT_SECONDS, "90")])),
            DEFAULT_TIMEOUT
        );
        assert_eq!(
            resolve_timeout_from(lookup(&[(ENV_TIMEOUT, "  "), (ENV_TIMEOUT_SECONDS, "90")])),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for input in ["", "5", "s", "-1s", "1x", "1s2", "1..5s"] {
            assert!(parse_duration(input).is_err(), "accepted {input:?}");
        }
    }
}
