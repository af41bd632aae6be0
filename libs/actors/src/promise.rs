//! Single-assignment promise
//!
//! [`Promise`] is the write side, [`Completion`] the read side. A promise
//! can be completed once, with a value or a failure; later attempts return
//! [`ActorError::AlreadyCompleted`] and leave the first outcome in place.
//! A promise dropped without completion resolves its completion to a
//! worker failure, so a reader never waits on a promise nobody holds.

use crate::error::{ActorError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Create a connected promise/completion pair
pub fn promise<T>() -> (Promise<T>, Completion<T>) {
    let (sender, receiver) = oneshot::channel();
    (
        Promise {
            sender: Mutex::new(Some(sender)),
        },
        Completion { receiver },
    )
}

/// Write side of a single-assignment result
pub struct Promise<T> {
    sender: Mutex<Option<oneshot::Sender<Result<T>>>>,
}

impl<T> Promise<T> {
    /// Fulfill with a value
    pub fn complete(&self, value: T) -> Result<()> {
        self.settle(Ok(value))
    }

    /// Fulfill with a failure
    pub fn fail(&self, error: ActorError) -> Result<()> {
        self.settle(Err(error))
    }

    pub fn is_completed(&self) -> bool {
        self.sender.lock().is_none()
    }

    fn settle(&self, outcome: Result<T>) -> Result<()> {
        let sender = self.sender.lock().take().ok_or(ActorError::AlreadyCompleted)?;
        // The reader may be gone (timed out); the promise still counts as completed
        let _ = sender.send(outcome);
        Ok(())
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Read side of a single-assignment result
#[derive(Debug)]
pub struct Completion<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|outcome| match outcome {
            Ok(result) => result,
            Err(_) => Err(ActorError::worker_failure(
                "promise",
                "promise dropped without completion",
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_delivers_value() {
        let (promise, completion) = promise::<u32>();
        promise.complete(7).unwrap();

        assert!(promise.is_completed());
        assert_eq!(completion.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_second_completion_is_rejected() {
        let (promise, completion) = promise::<u32>();
        promise.complete(1).unwrap();

        assert_eq!(promise.complete(2), Err(ActorError::AlreadyCompleted));
        assert_eq!(
            promise.fail(ActorError::worker_failure("w", "late")),
            Err(ActorError::AlreadyCompleted)
        );
        assert_eq!(completion.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_delivered() {
        let (promise, completion) = promise::<u32>();
        promise.fail(ActorError::worker_failure("w", "boom")).unwrap();

        let err = completion.await.unwrap_err();
        assert!(matches!(err, ActorError::WorkerFailure { .. }));
    }

    #[tokio::test]
    async fn test_dropped_promise_fails_completion() {
        let (promise, completion) = promise::<u32>();
        drop(promise);

        let err = completion.await.unwrap_err();
        assert!(err.to_string().contains("dropped without completion"));
    }

    #[test]
    fn test_completion_pending_until_fulfilled() {
        use tokio_test::{assert_pending, assert_ready_ok, task};

        let (promise, completion) = promise::<u32>();
        let mut completion = task::spawn(completion);

        assert_pending!(completion.poll());
        promise.complete(3).unwrap();
        assert!(completion.is_woken());
        assert_eq!(assert_ready_ok!(completion.poll()), 3);
    }

    #[test]
    fn test_completion_after_reader_gone() {
        let (promise, completion) = promise::<u32>();
        drop(completion);

        // Still single-assignment even with nobody listening
        assert!(promise.complete(1).is_ok());
        assert!(promise.complete(2).is_err());
    }
}
