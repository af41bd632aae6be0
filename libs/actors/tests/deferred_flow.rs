//! End-to-end request flow: handler -> factory -> completion worker ->
//! promise -> deferred result

use async_trait::async_trait;
use deferred_actors::{
    register_workers, ActorBehavior, ActorContext, ActorError, ActorFactory, ActorSystem,
    BoxedBehavior, BusinessAction, CompletionBridge, CompletionService, ComponentDefinition, Flow,
    InMemoryRegistry, Message, Promise, RequestHandler, Result, WorkerMessage, COMPLETION_WORKER,
};
use deferred_config::BridgeSettings;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct RecordingAction {
    observations: Mutex<Vec<String>>,
}

impl BusinessAction for RecordingAction {
    fn perform(&self, observation: &dyn fmt::Display) {
        self.observations.lock().push(observation.to_string());
    }
}

/// Completes its promise only after a delay
struct SlowWorker {
    promise: Promise<Message>,
    delay: Duration,
}

#[async_trait]
impl ActorBehavior for SlowWorker {
    type Message = WorkerMessage;
    type Reply = ();

    async fn handle(&mut self, msg: WorkerMessage, ctx: &mut ActorContext<()>) -> Result<Flow> {
        tokio::time::sleep(self.delay).await;
        match msg {
            WorkerMessage::Deliver(message) => {
                let _ = self.promise.complete(message);
            }
            other => ctx.unhandled(&other),
        }
        Ok(Flow::Stop)
    }
}

/// Holds its promise and fails while handling, without completing it
struct BrokenWorker {
    _promise: Promise<Message>,
    panics: bool,
}

#[async_trait]
impl ActorBehavior for BrokenWorker {
    type Message = WorkerMessage;
    type Reply = ();

    async fn handle(&mut self, _msg: WorkerMessage, ctx: &mut ActorContext<()>) -> Result<Flow> {
        if self.panics {
            panic!("worker blew up");
        }
        Err(ActorError::worker_failure(ctx.path(), "cannot process"))
    }
}

fn broken_worker(panics: bool) -> ComponentDefinition<BoxedBehavior<WorkerMessage, ()>> {
    let name = if panics { "panickingWorker" } else { "erroringWorker" };
    ComponentDefinition::behavior::<BrokenWorker>(name).constructor_with(
        move |_, promise: Promise<Message>| {
            Ok(BrokenWorker {
                _promise: promise,
                panics,
            }
            .boxed())
        },
    )
}

fn registry(business: Arc<RecordingAction>) -> InMemoryRegistry {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("deferred_actors=debug")
        .with_test_writer()
        .try_init();

    let registry = InMemoryRegistry::new();
    register_workers(&registry, business).unwrap();
    registry
        .register(
            ComponentDefinition::behavior::<SlowWorker>("slowWorker").constructor_with(
                |_, promise: Promise<Message>| {
                    Ok(SlowWorker {
                        promise,
                        delay: Duration::from_millis(150),
                    }
                    .boxed())
                },
            ),
        )
        .unwrap();
    registry.register(broken_worker(true)).unwrap();
    registry.register(broken_worker(false)).unwrap();
    registry
}

async fn wait_until_idle(system: &ActorSystem) {
    for _ in 0..200 {
        if system.actor_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{} actors still running", system.actor_count());
}

#[tokio::test]
async fn test_three_concurrent_requests_get_ids_in_order() {
    let business = Arc::new(RecordingAction::default());
    let system = ActorSystem::new("test");
    let factory = ActorFactory::new(Arc::new(registry(business.clone())));
    let handler = RequestHandler::from_settings(system.clone(), factory, &BridgeSettings::default());

    let deferred: Vec<_> = (0..3).map(|_| handler.handle()).collect();
    let results = futures::future::join_all(deferred).await;

    for (expected_id, result) in results.into_iter().enumerate() {
        let message = result.unwrap();
        assert_eq!(message, Message::new("async-non-blocking", expected_id as u64));
    }

    wait_until_idle(&system).await;
    let stats = system.metrics().snapshot();
    assert_eq!(stats.actors_spawned, 3);
    assert_eq!(stats.actors_stopped, 3);

    let mut observed = business.observations.lock().clone();
    observed.sort();
    assert_eq!(
        observed,
        vec![
            "worker-actor-0 Message{payload='async-non-blocking', id=0}",
            "worker-actor-1 Message{payload='async-non-blocking', id=1}",
            "worker-actor-2 Message{payload='async-non-blocking', id=2}",
        ]
    );
}

#[tokio::test]
async fn test_timeout_then_late_success_is_discarded() {
    let system = ActorSystem::new("test");
    let factory = ActorFactory::new(Arc::new(registry(Arc::default())));
    let handler = RequestHandler::new(
        CompletionService::new(system.clone(), factory, "slowWorker"),
        CompletionBridge::new(Duration::from_millis(50)),
        "slow",
    );

    let started = std::time::Instant::now();
    let err = handler.handle().await.unwrap_err();

    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_millis(150));
    // The worker is not cancelled by the timeout and still finishes
    assert_eq!(system.actor_count(), 1);
    wait_until_idle(&system).await;
    assert_eq!(system.metrics().snapshot().worker_failures, 0);
}

#[tokio::test]
async fn test_unknown_worker_rejects_without_spawning() {
    let system = ActorSystem::new("test");
    let factory = ActorFactory::new(Arc::new(InMemoryRegistry::new()));
    let handler = RequestHandler::new(
        CompletionService::new(system.clone(), factory, COMPLETION_WORKER),
        CompletionBridge::new(Duration::from_secs(1)),
        "p",
    );

    let err = handler.handle().await.unwrap_err();
    assert!(matches!(err, ActorError::Resolution { .. }));
    assert_eq!(system.actor_count(), 0);

    // Ids are consumed even by failed requests
    assert_eq!(handler.peek_next_id(), 1);
}

#[tokio::test]
async fn test_slow_request_does_not_delay_others() {
    let system = ActorSystem::new("test");
    let factory = ActorFactory::new(Arc::new(registry(Arc::default())));
    let slow = RequestHandler::new(
        CompletionService::new(system.clone(), factory.clone(), "slowWorker"),
        CompletionBridge::new(Duration::from_secs(1)),
        "slow",
    );
    let fast = RequestHandler::new(
        CompletionService::new(system.clone(), factory, COMPLETION_WORKER),
        CompletionBridge::new(Duration::from_secs(1)),
        "fast",
    );

    let slow_result = slow.handle_request_with_id("slow", 100);
    let fast_started = std::time::Instant::now();
    let fast_message = fast.handle().await.unwrap();

    assert_eq!(fast_message.payload(), "fast");
    assert!(fast_started.elapsed() < Duration::from_millis(150));
    assert_eq!(slow_result.await.unwrap().id(), 100);
}

#[tokio::test]
async fn test_worker_failure_reaches_caller_before_deadline() {
    for worker in ["panickingWorker", "erroringWorker"] {
        let system = ActorSystem::new("test");
        let factory = ActorFactory::new(Arc::new(registry(Arc::default())));
        let handler = RequestHandler::new(
            CompletionService::new(system.clone(), factory, worker),
            CompletionBridge::new(Duration::from_secs(2)),
            "doomed",
        );

        let started = std::time::Instant::now();
        let err = handler.handle().await.unwrap_err();

        assert!(
            matches!(err, ActorError::WorkerFailure { .. }),
            "{}: {:?}",
            worker,
            err
        );
        assert!(!err.is_timeout());
        assert!(started.elapsed() < Duration::from_millis(500), "{}", worker);
        wait_until_idle(&system).await;
        assert_eq!(system.metrics().snapshot().worker_failures, 1);
    }
}
