//! One-shot completion worker
//!
//! Built with a promise, handles exactly one message and stops. A
//! delivered [`Message`] fulfils the promise with that message; any other
//! message is reported unhandled and fails the promise. The promise never
//! outlives the worker pending: if the worker stops for any other reason,
//! it fails the promise on its way out.

use crate::business::{SharedBusinessAction, BUSINESS_SERVICE};
use crate::components::ComponentDefinition;
use crate::error::{ActorError, Result};
use crate::messages::{ActorMessage, Message, WorkerMessage};
use crate::promise::Promise;
use crate::system::{ActorBehavior, ActorContext, BoxedBehavior, Flow};

use async_trait::async_trait;
use tracing::{debug, warn};

pub struct CompletionWorker {
    promise: Promise<Message>,
    business: SharedBusinessAction,
    path: Option<String>,
}

impl CompletionWorker {
    pub fn new(promise: Promise<Message>, business: SharedBusinessAction) -> Self {
        Self {
            promise,
            business,
            path: None,
        }
    }

    /// Prototype component taking the promise as its only argument
    pub fn definition(name: &str) -> ComponentDefinition<BoxedBehavior<WorkerMessage, ()>> {
        ComponentDefinition::behavior::<Self>(name).constructor_with(
            |ctx, promise: Promise<Message>| {
                let business: SharedBusinessAction = ctx.component(BUSINESS_SERVICE)?;
                Ok(Self::new(promise, business).boxed())
            },
        )
    }
}

#[async_trait]
impl ActorBehavior for CompletionWorker {
    type Message = WorkerMessage;
    type Reply = ();

    async fn handle(&mut self, msg: WorkerMessage, ctx: &mut ActorContext<()>) -> Result<Flow> {
        let path = ctx.path();
        self.business.perform(&format_args!("{} {}", path, msg));

        let outcome = match msg {
            WorkerMessage::Deliver(message) => self.promise.complete(message),
            other => {
                ctx.unhandled(&other);
                self.promise
                    .fail(ActorError::unhandled(path.clone(), other.message_type()))
            }
        };
        if let Err(e) = outcome {
            warn!(actor = %path, error = %e, "Promise was already completed");
        }

        self.path = Some(path);
        Ok(Flow::Stop)
    }

    async fn on_stop(&mut self) -> Result<()> {
        if !self.promise.is_completed() {
            let actor = self.path.as_deref().unwrap_or("completion-worker");
            debug!(actor = %actor, "Stopping with a pending promise, failing it");
            let _ = self.promise.fail(ActorError::worker_failure(
                actor,
                "worker stopped before completing its promise",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Request;
    use crate::promise::promise;
    use crate::system::ActorSystem;
    use crate::workers::testing::RecordingAction;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_delivered_message_completes_promise() {
        let system = ActorSystem::new("test");
        let business = Arc::new(RecordingAction::default());
        let (promise, completion) = promise();

        let worker = system
            .spawn_named(
                "worker-actor-0",
                CompletionWorker::new(promise, business.clone()),
            )
            .unwrap();
        worker.send(Message::new("async-non-blocking", 0)).unwrap();

        let message = completion.await.unwrap();
        assert_eq!(message, Message::new("async-non-blocking", 0));

        tokio::time::timeout(Duration::from_secs(1), worker.terminated())
            .await
            .unwrap();
        assert!(system.get_actor(worker.id()).is_none());
        assert_eq!(
            business.observations(),
            vec!["worker-actor-0 Message{payload='async-non-blocking', id=0}".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unhandled_message_fails_promise_and_stops() {
        let system = ActorSystem::new("test");
        let (promise, completion) = promise();

        let worker = system
            .spawn(CompletionWorker::new(promise, Arc::new(RecordingAction::default())))
            .unwrap();
        worker.send(Request).unwrap();

        let err = completion.await.unwrap_err();
        assert!(matches!(err, ActorError::UnhandledMessage { .. }));

        tokio::time::timeout(Duration::from_secs(1), worker.terminated())
            .await
            .unwrap();
        assert_eq!(system.metrics().snapshot().unhandled_messages, 1);
        // A second message finds the mailbox closed
        assert!(worker.send(Message::new("late", 1)).is_err());
    }

    #[tokio::test]
    async fn test_stop_before_message_fails_promise() {
        let system = ActorSystem::new("test");
        let (promise, completion) = promise();

        let worker = system
            .spawn(CompletionWorker::new(promise, Arc::new(RecordingAction::default())))
            .unwrap();
        system.stop(&worker).await.unwrap();

        let err = completion.await.unwrap_err();
        assert!(matches!(err, ActorError::WorkerFailure { .. }));
    }
}
