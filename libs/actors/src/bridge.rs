//! Completion Bridge
//!
//! Connects callers that want a timeout-bounded answer to one-shot workers
//! that produce it:
//!
//! ```text
//! RequestHandler ──> CompletionService ──> CompletionWorker
//!       │                  │ promise              │
//!       │                  └── Completion <───────┘ complete / fail
//!       └── CompletionBridge: Completion ──> DeferredResult (deadline)
//! ```
//!
//! The deferred result's deadline starts before any worker is spawned.
//! Outcomes arriving after it are discarded; a timeout never stops or
//! cancels the worker.

use crate::components::{ConstructorArgs, Identity};
use crate::deferred::{DeferredResult, DeferredSetter};
use crate::error::Result;
use crate::factory::{ActorFactory, WorkerDescriptor};
use crate::messages::{Message, WorkerMessage};
use crate::promise::{promise, Completion};
use crate::system::{ActorRef, ActorSystem};

use deferred_config::BridgeSettings;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Spawns one completion worker per call and hands back its completion
#[derive(Debug, Clone)]
pub struct CompletionService {
    system: ActorSystem,
    factory: ActorFactory,
    component: Identity,
}

impl CompletionService {
    pub fn new(system: ActorSystem, factory: ActorFactory, component: impl Into<String>) -> Self {
        Self {
            system,
            factory,
            component: Identity::name(component),
        }
    }

    /// Start a worker for `payload` and return the completion it will fulfil.
    ///
    /// Resolution and spawn failures are returned here; nothing is left
    /// running for them. The worker is named `worker-actor-{id}` while it
    /// lives, so `id` must not be reused by a request still in flight.
    pub fn get(&self, payload: &str, id: u64) -> Result<Completion<Message>> {
        let (promise, completion) = promise();
        let descriptor = WorkerDescriptor::new(self.component.clone())
            .with_args(ConstructorArgs::new().with(promise));

        let worker: ActorRef<WorkerMessage, ()> =
            self.factory
                .spawn(&self.system, descriptor, Some(format!("worker-actor-{}", id)))?;
        worker.send(Message::new(payload, id))?;

        debug!(actor = %worker.path(), id = id, "Dispatched message to completion worker");
        // Dropping the ref is fine: the worker stops after its one message
        Ok(completion)
    }
}

/// Adapts completions into deferred results
#[derive(Debug, Clone, Copy)]
pub struct CompletionBridge {
    timeout: Duration,
}

impl CompletionBridge {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `work` under a fresh deferred result.
    ///
    /// The deadline starts before `work` runs. An error from `work` rejects
    /// the result at once. Must be called inside a Tokio runtime.
    pub fn submit<T, F>(&self, work: F) -> DeferredResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<Completion<T>>,
    {
        let deferred = DeferredResult::new(self.timeout);
        let setter = deferred.setter();

        match work() {
            Ok(completion) => self.forward(completion, setter),
            Err(e) => {
                warn!(error = %e, error_category = e.category(), "Deferred work failed to start");
                setter.set_error_result(e);
            }
        }
        deferred
    }

    fn forward<T: Send + 'static>(&self, completion: Completion<T>, setter: DeferredSetter<T>) {
        let timeout = self.timeout;
        tokio::spawn(async move {
            // Bounded so the adapter does not outlive the deadline by much
            let outcome = match tokio::time::timeout(timeout, completion).await {
                Ok(outcome) => outcome,
                Err(_) => return,
            };
            let accepted = match outcome {
                Ok(value) => setter.set_result(value),
                Err(e) => setter.set_error_result(e),
            };
            if !accepted {
                debug!("Completion arrived after the deferred result was settled");
            }
        });
    }
}

/// Entry point for async requests: one id, one worker, one deferred result
/// per call.
#[derive(Debug)]
pub struct RequestHandler {
    service: CompletionService,
    bridge: CompletionBridge,
    payload: String,
    next_id: AtomicU64,
}

impl RequestHandler {
    pub fn new(service: CompletionService, bridge: CompletionBridge, payload: impl Into<String>) -> Self {
        Self {
            service,
            bridge,
            payload: payload.into(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Handler wired from the bridge section of the service configuration
    pub fn from_settings(system: ActorSystem, factory: ActorFactory, settings: &BridgeSettings) -> Self {
        Self::new(
            CompletionService::new(system, factory, settings.worker_component.clone()),
            CompletionBridge::new(settings.deferred_timeout()),
            settings.payload.clone(),
        )
    }

    /// Handle a request with the configured payload
    pub fn handle(&self) -> DeferredResult<Message> {
        self.handle_request(&self.payload)
    }

    /// Handle a request under the next id. Ids start at 0 and are never reused.
    pub fn handle_request(&self, payload: &str) -> DeferredResult<Message> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handle_request_with_id(payload, id)
    }

    /// Handle a request under a caller-supplied correlation id
    pub fn handle_request_with_id(&self, payload: &str, correlation_id: u64) -> DeferredResult<Message> {
        debug!(id = correlation_id, payload = payload, "Handling deferred request");
        self.bridge
            .submit(|| self.service.get(payload, correlation_id))
    }

    /// Next id `handle_request` will assign
    pub fn peek_next_id(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::InMemoryRegistry;
    use crate::error::ActorError;
    use crate::workers::testing::RecordingAction;
    use crate::workers::{register_workers, COMPLETION_WORKER};
    use std::sync::Arc;

    fn handler(timeout: Duration) -> (ActorSystem, RequestHandler) {
        let registry = InMemoryRegistry::new();
        register_workers(&registry, Arc::new(RecordingAction::default())).unwrap();
        let system = ActorSystem::new("test");
        let factory = ActorFactory::new(Arc::new(registry));
        let handler = RequestHandler::new(
            CompletionService::new(system.clone(), factory, COMPLETION_WORKER),
            CompletionBridge::new(timeout),
            "async-non-blocking",
        );
        (system, handler)
    }

    #[tokio::test]
    async fn test_handle_resolves_with_message() {
        let (system, handler) = handler(Duration::from_secs(1));

        let message = handler.handle().await.unwrap();

        assert_eq!(message, Message::new("async-non-blocking", 0));
        assert_eq!(handler.peek_next_id(), 1);
        // The worker stopped after its one message
        for _ in 0..100 {
            if system.actor_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(system.actor_count(), 0);
    }

    #[tokio::test]
    async fn test_correlation_id_is_passed_through() {
        let (_system, handler) = handler(Duration::from_secs(1));

        let message = handler.handle_request_with_id("custom", 42).await.unwrap();
        assert_eq!(message.id(), 42);
        assert_eq!(message.payload(), "custom");
        assert_eq!(handler.peek_next_id(), 0);
    }

    #[tokio::test]
    async fn test_unknown_component_rejects_immediately() {
        let registry = InMemoryRegistry::new();
        let system = ActorSystem::new("test");
        let service = CompletionService::new(
            system.clone(),
            ActorFactory::new(Arc::new(registry)),
            "missing",
        );
        let handler = RequestHandler::new(service, CompletionBridge::new(Duration::from_secs(5)), "p");

        let started = std::time::Instant::now();
        let err = handler.handle().await.unwrap_err();

        assert!(err.is_resolution());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(system.actor_count(), 0);
    }

    #[tokio::test]
    async fn test_bridge_times_out_without_completion() {
        let bridge = CompletionBridge::new(Duration::from_millis(30));
        let (promise, completion) = promise::<u32>();

        let deferred = bridge.submit(|| Ok(completion));
        let err = deferred.await.unwrap_err();
        assert!(err.is_timeout());

        // Completing late is still allowed on the promise side
        assert!(promise.complete(1).is_ok());
    }

    #[tokio::test]
    async fn test_bridge_forwards_failure() {
        let bridge = CompletionBridge::new(Duration::from_secs(1));
        let (promise, completion) = promise::<u32>();

        let deferred = bridge.submit(|| Ok(completion));
        promise.fail(ActorError::worker_failure("w", "boom")).unwrap();

        let err = deferred.await.unwrap_err();
        assert!(matches!(err, ActorError::WorkerFailure { .. }));
    }
}
