//! Bounded polling
//!
//! `wait_for` polls a predicate until it yields a truthy value or the
//! deadline passes. It never spins unbounded and never retries after a
//! timeout; callers decide whether to try again.

use std::fmt::{self, Debug, Display};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

/// Values that can signal "done" from a polled predicate
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl<T> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.is_some()
    }
}

impl<T> Truthy for Vec<T> {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

macro_rules! truthy_int {
    ($($t:ty),*) => {
        $(impl Truthy for $t {
            fn is_truthy(&self) -> bool {
                *self != 0
            }
        })*
    };
}

truthy_int!(u8, u16, u32, u64, usize, i32, i64);

/// Polling parameters
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Overall deadline
    pub timeout: Duration,

    /// Pause between polls
    pub delay: Duration,

    /// Treat predicate errors as "not yet" until the deadline
    pub handle_exception: bool,

    /// What is being waited for, used in logs and errors
    pub message: String,
}

impl WaitOptions {
    pub fn new(timeout: Duration, delay: Duration) -> Self {
        Self {
            timeout,
            delay,
            handle_exception: false,
            message: "condition".to_string(),
        }
    }

    pub fn handle_exception(mut self, handle: bool) -> Self {
        self.handle_exception = handle;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(120), Duration::from_secs(1))
    }
}

/// Failure of a bounded wait
#[derive(Error, Debug)]
pub enum WaitError<E> {
    #[error("Timed out after {elapsed:?} ({polls} polls) waiting for {message}; last observed: {}", .last_observed.as_deref().unwrap_or("nothing"))]
    Timeout {
        message: String,
        elapsed: Duration,
        polls: usize,
        last_observed: Option<String>,
        last_error: Option<String>,
    },

    #[error("Predicate failed while waiting: {0}")]
    Predicate(E),
}

impl<E> WaitError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    /// Convert the predicate error type, keeping timeout details
    pub fn map_err<F, O>(self, f: F) -> WaitError<O>
    where
        F: FnOnce(E) -> O,
    {
        match self {
            WaitError::Timeout {
                message,
                elapsed,
                polls,
                last_observed,
                last_error,
            } => WaitError::Timeout {
                message,
                elapsed,
                polls,
                last_observed,
                last_error,
            },
            WaitError::Predicate(e) => WaitError::Predicate(f(e)),
        }
    }
}

/// Successful outcome of a wait
#[derive(Debug)]
pub struct Waited<T> {
    pub value: T,
    pub polls: usize,
    pub elapsed: Duration,
}

/// Poll `predicate` until it returns a truthy value.
///
/// The predicate is evaluated once immediately and then every `delay`. The
/// final poll happens at the deadline, so a predicate that never becomes true
/// fails after at least `timeout` and at most `timeout + delay`.
pub async fn wait_for<T, E, F, Fut>(options: &WaitOptions, predicate: F) -> Result<T, WaitError<E>>
where
    T: Truthy + Debug,
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    wait_for_detailed(options, predicate).await.map(|w| w.value)
}

/// Same as [`wait_for`] but also reports poll count and elapsed time
pub async fn wait_for_detailed<T, E, F, Fut>(
    options: &WaitOptions,
    mut predicate: F,
) -> Result<Waited<T>, WaitError<E>>
where
    T: Truthy + Debug,
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let deadline = start + options.timeout;
    let mut polls = 0usize;
    let mut last_observed: Option<String> = None;
    let mut last_error: Option<String> = None;

    loop {
        polls += 1;
        match predicate().await {
            Ok(value) if value.is_truthy() => {
                trace!("{} satisfied after {} poll(s)", options.message, polls);
                return Ok(Waited {
                    value,
                    polls,
                    elapsed: start.elapsed(),
                });
            }
            Ok(value) => {
                last_observed = Some(format!("{:?}", value));
            }
            Err(e) if options.handle_exception => {
                trace!("{}: ignoring predicate error: {}", options.message, e);
                last_error = Some(e.to_string());
            }
            Err(e) => return Err(WaitError::Predicate(e)),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::Timeout {
                message: options.message.clone(),
                elapsed: now - start,
                polls,
                last_observed,
                last_error,
            });
        }

        tokio::time::sleep(options.delay.min(deadline - now)).await;
    }
}

/// Human form of a duration for log lines
pub struct Pretty(pub Duration);

impl fmt::Display for Pretty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs_f64();
        if secs >= 60.0 {
            write!(f, "{:.1}m", secs / 60.0)
        } else {
            write!(f, "{:.1}s", secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn opts(timeout_ms: u64, delay_ms: u64) -> WaitOptions {
        WaitOptions::new(Duration::from_millis(timeout_ms), Duration::from_millis(delay_ms))
            .message("test condition")
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_after_k_polls() {
        let calls = Cell::new(0u32);
        let waited = wait_for_detailed(&opts(10_000, 100), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Ok::<_, String>(n >= 4) }
        })
        .await
        .unwrap();

        assert!(waited.value);
        assert_eq!(waited.polls, 4);
        // three sleeps between four polls
        assert_eq!(waited.elapsed, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_window() {
        let options = opts(1_000, 300);
        let start = Instant::now();
        let err = wait_for(&options, || async { Ok::<_, String>(false) })
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(err.is_timeout());
        assert!(elapsed >= options.timeout);
        assert!(elapsed <= options.timeout + options.delay);
        match err {
            WaitError::Timeout { last_observed, .. } => {
                assert_eq!(last_observed.as_deref(), Some("false"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_error_is_fatal_by_default() {
        let err = wait_for(&opts(1_000, 100), || async { Err::<bool, _>("boom".to_string()) })
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Predicate(ref e) if e == "boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_exception_keeps_polling() {
        let calls = Cell::new(0u32);
        let options = opts(5_000, 100).handle_exception(true);
        let value = wait_for(&options, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err("not ready".to_string())
                } else {
                    Ok(Some(n))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_exception_timeout_keeps_last_error() {
        let options = opts(500, 100).handle_exception(true);
        let err = wait_for(&options, || async { Err::<bool, _>("still broken".to_string()) })
            .await
            .unwrap_err();
        match err {
            WaitError::Timeout { last_error, .. } => {
                assert_eq!(last_error.as_deref(), Some("still broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Vec::<u8>::new().is_truthy());
        assert!(vec![1].is_truthy());
        assert!(!String::new().is_truthy());
        assert!(!0usize.is_truthy());
        assert!(Some(()).is_truthy());
    }
}
