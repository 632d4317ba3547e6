use std::time::Duration;

use crate::error::{RetryFailure, Transience};

pub const MAX_TRIES: usize = 5;
pub const BACKOFF: Duration = Duration::from_secs(2);

/// Bounded retry with a fixed sleep between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_tries: usize,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: MAX_TRIES,
            backoff: BACKOFF,
        }
    }
}

/// A successful result together with the number of failed attempts before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub retries: usize,
}

impl RetryPolicy {
    pub fn new(max_tries: usize, backoff: Duration) -> Self {
        Self {
            max_tries: max_tries.max(1),
            backoff,
        }
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or runs
    /// out of attempts. `op` receives the 1-based attempt number.
    pub fn run<T, E, F>(&self, label: &str, mut op: F) -> Result<Retried<T>, RetryFailure<E>>
    where
        E: Transience + std::fmt::Display,
        F: FnMut(usize) -> Result<T, E>,
    {
        let max_tries = self.max_tries.max(1);
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let err = match op(attempt) {
                Ok(value) => {
                    return Ok(Retried {
                        value,
                        retries: attempt - 1,
                    });
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                tracing::warn!(label, attempt, error = %err, "non-transient failure; not retrying");
                return Err(RetryFailure::Aborted(err));
            }

            if attempt >= max_tries {
                tracing::error!(label, attempts = attempt, error = %err, "max tries reached");
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            tracing::warn!(
                label,
                attempt,
                max_tries,
                backoff_ms = self.backoff.as_millis() as u64,
                error = %err,
                "transient failure; retrying"
            );
            if !self.backoff.is_zero() {
                std::thread::sleep(self.backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    fn transient() -> FetchError {
        FetchError::Transport {
            url: "http://stub".to_owned(),
            reason: "connection reset".to_owned(),
        }
    }

    fn fatal() -> FetchError {
        FetchError::Status {
            url: "http://stub".to_owned(),
            status: 404,
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(MAX_TRIES, Duration::ZERO)
    }

    #[test]
    fn succeeds_on_last_attempt_with_four_retries() {
        let mut calls = 0;
        let out = policy()
            .run("stub", |_| {
                calls += 1;
                if calls < 5 { Err(transient()) } else { Ok("payload") }
            })
            .expect("fifth attempt succeeds");

        assert_eq!(out.value, "payload");
        assert_eq!(out.retries, 4);
        assert_eq!(calls, 5);
    }

    #[test]
    fn exhausts_after_max_tries() {
        let mut calls = 0;
        let err = policy()
            .run::<(), _, _>("stub", |_| {
                calls += 1;
                Err(transient())
            })
            .unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(calls, MAX_TRIES);
        match err {
            RetryFailure::Exhausted { attempts, .. } => assert_eq!(attempts, MAX_TRIES),
            RetryFailure::Aborted(_) => panic!("expected exhaustion"),
        }
    }

    #[test]
    fn non_transient_aborts_immediately() {
        let mut calls = 0;
        let err = policy()
            .run::<(), _, _>("stub", |_| {
                calls += 1;
                Err(fatal())
            })
            .unwrap_err();

        assert!(matches!(err, RetryFailure::Aborted(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_tries_still_attempts_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_tries, 1);
        let out = policy.run::<_, FetchError, _>("stub", |attempt| Ok(attempt));
        assert_eq!(out.unwrap().value, 1);
    }
}
