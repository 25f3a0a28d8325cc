//! Bounded retry for optimistic writes

use std::thread;
use std::time::Duration;

use crate::error::{ImportError, Result};

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Policy without pauses between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Verdict of one failed attempt
#[derive(Debug)]
pub enum Attempt<E> {
    /// A conflict that another attempt may resolve
    Retry(E),
    /// A failure no retry will fix
    Abort(E),
}

/// How a retried operation ended
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded(T),
    /// Every attempt hit a conflict; holds the last one
    Exhausted { attempts: u32, last: E },
    Aborted(E),
}

impl<T, E> RetryOutcome<T, E>
where
    E: Into<ImportError> + std::fmt::Display,
{
    /// Exhaustion becomes a concurrent-write conflict; aborts keep their own error
    pub fn into_result(self) -> Result<T> {
        match self {
            RetryOutcome::Succeeded(value) => Ok(value),
            RetryOutcome::Exhausted { attempts, last } => {
                log::warn!("giving up after {} attempts: {}", attempts, last);
                Err(ImportError::ConcurrentWriteConflict { attempts })
            }
            RetryOutcome::Aborted(e) => Err(e.into()),
        }
    }
}

/// Run `op` until it succeeds, aborts, or the policy runs out of attempts
///
/// The closure receives the 1-based attempt number. Delays double between
/// attempts up to `max_delay`.
pub fn retry_with_policy<T, E, F>(policy: &RetryPolicy, mut op: F) -> RetryOutcome<T, E>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> std::result::Result<T, Attempt<E>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 1;

    loop {
        match op(attempt) {
            Ok(value) => return RetryOutcome::Succeeded(value),
            Err(Attempt::Abort(e)) => return RetryOutcome::Aborted(e),
            Err(Attempt::Retry(e)) => {
                if attempt >= attempts {
                    return RetryOutcome::Exhausted { attempts, last: e };
                }
                log::debug!("attempt {} of {} conflicted: {}", attempt, attempts, e);
            }
        }

        if !delay.is_zero() {
            thread::sleep(delay);
            delay = (delay * 2).min(policy.max_delay);
        }
        attempt += 1;
    }
}
