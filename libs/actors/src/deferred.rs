//! Deferred result
//!
//! A timeout-bounded result handed to the transport layer. The deadline is
//! fixed when the result is created. Exactly one terminal outcome is ever
//! delivered: the first of a value, an error, or the timeout. Anything set
//! after that is discarded and reported as `false` to the setter.

use crate::error::{ActorError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, Sleep};
use tracing::debug;

struct DeferredState<T> {
    sender: Mutex<Option<oneshot::Sender<Result<T>>>>,
    deadline: Instant,
    timeout: Duration,
}

impl<T> DeferredState<T> {
    fn settle(&self, outcome: Result<T>) -> bool {
        let mut sender = self.sender.lock();
        let Some(tx) = sender.take() else {
            debug!("Deferred result already set or expired, discarding outcome");
            return false;
        };
        if Instant::now() >= self.deadline {
            debug!(timeout_ms = self.timeout.as_millis() as u64, "Outcome arrived after deadline");
            let _ = tx.send(Err(self.timeout_error()));
            return false;
        }
        let _ = tx.send(outcome);
        true
    }

    fn expire(&self) {
        if let Some(tx) = self.sender.lock().take() {
            let _ = tx.send(Err(self.timeout_error()));
        }
    }

    fn is_set_or_expired(&self) -> bool {
        self.sender.lock().is_none() || Instant::now() >= self.deadline
    }

    fn timeout_error(&self) -> ActorError {
        ActorError::timeout("deferred result", self.timeout)
    }
}

/// Awaitable result with a deadline, consumed once by the transport layer
pub struct DeferredResult<T> {
    state: Arc<DeferredState<T>>,
    receiver: oneshot::Receiver<Result<T>>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl<T> DeferredResult<T> {
    /// Create a deferred result whose deadline starts now
    pub fn new(timeout: Duration) -> Self {
        let (sender, receiver) = oneshot::channel();
        let state = Arc::new(DeferredState {
            sender: Mutex::new(Some(sender)),
            deadline: Instant::now() + timeout,
            timeout,
        });
        Self {
            state,
            receiver,
            sleep: None,
        }
    }

    /// Write handle used to resolve this result
    pub fn setter(&self) -> DeferredSetter<T> {
        DeferredSetter {
            state: Arc::clone(&self.state),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.state.timeout
    }

    pub fn is_set_or_expired(&self) -> bool {
        self.state.is_set_or_expired()
    }
}

impl<T> Future for DeferredResult<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        if let Poll::Ready(outcome) = Pin::new(&mut this.receiver).poll(cx) {
            return Poll::Ready(flatten(outcome));
        }

        let deadline = this.state.deadline;
        let sleep = this
            .sleep
            .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
        ready!(sleep.as_mut().poll(cx));

        this.state.expire();
        // Either the expiry above or a racing setter has filled the channel
        Pin::new(&mut this.receiver).poll(cx).map(flatten)
    }
}

impl<T> fmt::Debug for DeferredResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredResult")
            .field("timeout", &self.state.timeout)
            .field("set_or_expired", &self.state.is_set_or_expired())
            .finish()
    }
}

fn flatten<T>(outcome: std::result::Result<Result<T>, oneshot::error::RecvError>) -> Result<T> {
    outcome.unwrap_or_else(|_| {
        Err(ActorError::worker_failure(
            "deferred result",
            "result abandoned before resolution",
        ))
    })
}

/// Write handle of a [`DeferredResult`]
pub struct DeferredSetter<T> {
    state: Arc<DeferredState<T>>,
}

impl<T> DeferredSetter<T> {
    /// Resolve with a value. Returns false if already set or expired.
    pub fn set_result(&self, value: T) -> bool {
        self.state.settle(Ok(value))
    }

    /// Resolve with an error. Returns false if already set or expired.
    pub fn set_error_result(&self, error: ActorError) -> bool {
        self.state.settle(Err(error))
    }

    pub fn is_set_or_expired(&self) -> bool {
        self.state.is_set_or_expired()
    }
}

impl<T> Clone for DeferredSetter<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_value_before_deadline() {
        let deferred = DeferredResult::new(Duration::from_millis(500));
        let setter = deferred.setter();

        assert!(setter.set_result("done"));
        assert!(setter.is_set_or_expired());
        assert_eq!(deferred.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_error_before_deadline() {
        let deferred: DeferredResult<u32> = DeferredResult::new(Duration::from_millis(500));
        let setter = deferred.setter();

        assert!(setter.set_error_result(ActorError::worker_failure("w", "boom")));
        let err = deferred.await.unwrap_err();
        assert!(matches!(err, ActorError::WorkerFailure { .. }));
    }

    #[tokio::test]
    async fn test_only_first_outcome_counts() {
        let deferred = DeferredResult::new(Duration::from_millis(500));
        let setter = deferred.setter();

        assert!(setter.set_result(1));
        assert!(!setter.set_result(2));
        assert!(!setter.set_error_result(ActorError::AlreadyCompleted));
        assert_eq!(deferred.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_times_out_without_outcome() {
        let deferred: DeferredResult<u32> = DeferredResult::new(Duration::from_millis(30));
        let started = std::time::Instant::now();

        let err = deferred.await.unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(err.to_string(), "Timeout error: deferred result exceeded 30ms");
    }

    #[tokio::test]
    async fn test_late_outcome_is_discarded() {
        let deferred = DeferredResult::new(Duration::from_millis(20));
        let setter = deferred.setter();

        let err = deferred.await.unwrap_err();
        assert!(err.is_timeout());

        // Worker finishing afterwards must not resolve again
        assert!(!setter.set_result(5));
        assert!(setter.is_set_or_expired());
    }

    #[tokio::test]
    async fn test_late_outcome_before_anyone_polls() {
        let deferred = DeferredResult::new(Duration::from_millis(10));
        let setter = deferred.setter();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!setter.set_result(5));
        assert!(deferred.await.unwrap_err().is_timeout());
    }
}
