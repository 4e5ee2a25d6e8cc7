//! Suspend until a predicate holds or a deadline passes.
//!
//! Every long wait in the client (attestation round finalization, underlying
//! transaction finalization) goes through [`poll_until`]: check, sleep for the
//! interval, re-check, and give up with a typed timeout. The future can be
//! dropped at any await point to cancel the wait.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Interval and total budget of a bounded wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("wait timed out after {waited:?}")]
pub struct WaitTimedOut {
    pub waited: Duration,
}

/// Outcome of a failed [`poll_until`].
#[derive(Debug, Error)]
pub enum PollError<E> {
    #[error(transparent)]
    TimedOut(#[from] WaitTimedOut),

    #[error("poll check failed: {0}")]
    Check(E),
}

/// Run `check` until it returns `Ok(Some(_))`, sleeping `settings.interval`
/// between attempts. A check error aborts the wait immediately.
pub async fn poll_until<T, E, F, Fut>(settings: PollSettings, mut check: F) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + settings.timeout;
    loop {
        if let Some(value) = check().await.map_err(PollError::Check)? {
            return Ok(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(WaitTimedOut {
                waited: now - started,
            }
            .into());
        }
        tokio::time::sleep(settings.interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> PollSettings {
        PollSettings::new(Duration::from_millis(5), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_returns_once_predicate_holds() {
        let calls = AtomicU32::new(0);
        let got: Result<u32, PollError<()>> = poll_until(quick(), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(if n >= 3 { Some(n) } else { None })
        })
        .await;
        assert_eq!(got.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_times_out_with_typed_error() {
        let got: Result<(), PollError<()>> =
            poll_until(quick(), || async { Ok(None) }).await;
        match got {
            Err(PollError::TimedOut(t)) => assert!(t.waited >= Duration::from_millis(200)),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_check_error_aborts() {
        let calls = AtomicU32::new(0);
        let got: Result<(), PollError<&str>> = poll_until(quick(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        })
        .await;
        assert!(matches!(got, Err(PollError::Check("boom"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sleeps_between_checks() {
        let calls = AtomicU32::new(0);
        let settings = PollSettings::new(Duration::from_millis(50), Duration::from_millis(120));
        let _: Result<(), PollError<()>> = poll_until(settings, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        })
        .await;
        // 0ms, 50ms, 100ms, 120ms: never a tight loop.
        assert!(calls.load(Ordering::SeqCst) <= 5);
    }
}
