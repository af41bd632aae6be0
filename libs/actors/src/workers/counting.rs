//! Counting worker
//!
//! Long-lived worker holding a single counter. `Request` increments it and
//! reports the new value to the business service; `Response` replies with
//! the current value. Anything else is unhandled. The worker never stops
//! on its own.

use crate::business::{SharedBusinessAction, BUSINESS_SERVICE};
use crate::components::ComponentDefinition;
use crate::error::Result;
use crate::messages::WorkerMessage;
use crate::system::{ActorBehavior, ActorContext, BoxedBehavior, Flow};

use async_trait::async_trait;
use tracing::debug;

pub struct CountingWorker {
    count: i64,
    business: SharedBusinessAction,
}

impl CountingWorker {
    pub fn new(business: SharedBusinessAction) -> Self {
        Self::with_initial_count(business, 0)
    }

    pub fn with_initial_count(business: SharedBusinessAction, count: i64) -> Self {
        Self { count, business }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    /// Prototype component with a default and an initial-count constructor
    pub fn definition(name: &str) -> ComponentDefinition<BoxedBehavior<WorkerMessage, i64>> {
        ComponentDefinition::behavior::<Self>(name)
            .constructor(|ctx| {
                let business: SharedBusinessAction = ctx.component(BUSINESS_SERVICE)?;
                Ok(Self::new(business).boxed())
            })
            .constructor_with(|ctx, initial: i64| {
                let business: SharedBusinessAction = ctx.component(BUSINESS_SERVICE)?;
                Ok(Self::with_initial_count(business, initial).boxed())
            })
    }
}

#[async_trait]
impl ActorBehavior for CountingWorker {
    type Message = WorkerMessage;
    type Reply = i64;

    async fn handle(&mut self, msg: WorkerMessage, ctx: &mut ActorContext<i64>) -> Result<Flow> {
        match msg {
            WorkerMessage::Request(_) => {
                self.count += 1;
                self.business
                    .perform(&format_args!("{} {}", ctx.path(), self.count));
            }
            WorkerMessage::Response(_) => {
                if !ctx.reply(self.count) {
                    debug!(actor = %ctx.path(), count = self.count, "Count reply had no receiver");
                }
            }
            other => ctx.unhandled(&other),
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Message, Request, Response};
    use crate::system::ActorSystem;
    use crate::workers::testing::RecordingAction;
    use std::sync::Arc;
    use std::time::Duration;

    const ASK_TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_requests_then_response() {
        let system = ActorSystem::new("test");
        let business = Arc::new(RecordingAction::default());
        let worker = system
            .spawn_named("counter", CountingWorker::new(business.clone()))
            .unwrap();

        worker.send(Request).unwrap();
        worker.send(Request).unwrap();
        assert_eq!(worker.ask(Response, ASK_TIMEOUT).await.unwrap(), 2);

        worker.send(Request).unwrap();
        assert_eq!(worker.ask(Response, ASK_TIMEOUT).await.unwrap(), 3);
        assert_eq!(
            business.observations(),
            vec!["counter 1", "counter 2", "counter 3"]
        );
    }

    #[tokio::test]
    async fn test_initial_count() {
        let system = ActorSystem::new("test");
        let worker = system
            .spawn(CountingWorker::with_initial_count(
                Arc::new(RecordingAction::default()),
                10,
            ))
            .unwrap();

        worker.send(Request).unwrap();
        assert_eq!(worker.ask(Response, ASK_TIMEOUT).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_message_is_unhandled_and_count_unchanged() {
        let system = ActorSystem::new("test");
        let business = Arc::new(RecordingAction::default());
        let worker = system.spawn(CountingWorker::new(business.clone())).unwrap();

        worker.send(Message::new("ignored", 7)).unwrap();
        assert_eq!(worker.ask(Response, ASK_TIMEOUT).await.unwrap(), 0);

        assert!(worker.is_alive());
        assert!(business.observations().is_empty());
        assert_eq!(system.metrics().snapshot().unhandled_messages, 1);
    }

    #[tokio::test]
    async fn test_told_response_does_not_change_count() {
        let system = ActorSystem::new("test");
        let worker = system
            .spawn(CountingWorker::new(Arc::new(RecordingAction::default())))
            .unwrap();

        worker.send(Response).unwrap();
        worker.send(Request).unwrap();
        assert_eq!(worker.ask(Response, ASK_TIMEOUT).await.unwrap(), 1);
    }
}
