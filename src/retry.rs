//! When to re-issue a failed request.

use crate::conduit::ConduitError;

pub trait RetryPolicy {
    /// Whether the error from the `attempt`-th try (1-based) should be retried.
    fn should_retry(&self, err: &ConduitError, attempt: u32) -> bool;
}

/// Re-issue timed out requests forever, immediately. Everything else is fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOnTimeout;

impl RetryPolicy for RetryOnTimeout {
    fn should_retry(&self, err: &ConduitError, _attempt: u32) -> bool {
        err.is_timeout()
    }
}

/// Never retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _err: &ConduitError, _attempt: u32) -> bool {
        false
    }
}

/// Retry timeouts until `attempts` tries have been made in total.
#[derive(Debug, Clone, Copy)]
pub struct MaxAttempts(pub u32);

impl RetryPolicy for MaxAttempts {
    fn should_retry(&self, err: &ConduitError, attempt: u32) -> bool {
        err.is_timeout() && attempt < self.0
    }
}

/// Run `op` until it succeeds or `policy` gives up on its error.
pub fn with_retry<T>(
    policy: &dyn RetryPolicy,
    mut op: impl FnMut() -> Result<T, ConduitError>,
) -> Result<T, ConduitError> {
    let mut attempt = 1u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if policy.should_retry(&err, attempt) => {
                tracing::warn!(attempt, "{err}, retrying");
                attempt = attempt.saturating_add(1);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn timeout() -> ConduitError {
        ConduitError::Timeout {
            method: "maniphest.search".to_string(),
        }
    }

    fn api_error() -> ConduitError {
        ConduitError::Api {
            method: "maniphest.search".to_string(),
            code: "ERR".to_string(),
            info: "boom".to_string(),
        }
    }

    #[test]
    fn test_timeouts_are_retried_until_success() {
        let calls = Cell::new(0);
        let result = with_retry(&RetryOnTimeout, || {
            calls.set(calls.get() + 1);
            if calls.get() < 5 { Err(timeout()) } else { Ok(calls.get()) }
        });
        assert_eq!(result.unwrap(), 5);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&RetryOnTimeout, || {
            calls.set(calls.get() + 1);
            Err(api_error())
        });
        assert!(matches!(result, Err(ConduitError::Api { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_max_attempts_bounds_timeouts() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&MaxAttempts(3), || {
            calls.set(calls.get() + 1);
            Err(timeout())
        });
        assert!(result.unwrap_err().is_timeout());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_no_retry_surfaces_first_timeout() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&NoRetry, || {
            calls.set(calls.get() + 1);
            Err(timeout())
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
