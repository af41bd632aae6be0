//! Deferred Actors
//!
//! Actor runtime with a registry-driven worker factory and a bridge that
//! turns one-shot worker results into timeout-bounded deferred results.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐    ┌──────────────────────┐
//! │  ComponentRegistry   │    │     ActorSystem      │
//! │  name / type lookup  │    │                      │
//! │  singleton/prototype │    │  ┌────────────────┐  │
//! └──────────┬───────────┘    │  │ mailbox (ctrl, │  │
//!            │                │  │  user) ─> task │  │
//!  ┌─────────▼──────────┐     │  └────────────────┘  │
//!  │    ActorFactory    │─────┼─> spawn_props        │
//!  │ descriptor -> Props│     └──────────────────────┘
//!  └─────────▲──────────┘
//!            │
//!  ┌─────────┴──────────┐     ┌──────────────────────┐
//!  │ CompletionService  │────>│ Promise / Completion │
//!  └─────────▲──────────┘     └──────────┬───────────┘
//!            │                           │
//!  ┌─────────┴──────────┐     ┌──────────▼───────────┐
//!  │   RequestHandler   │────>│   DeferredResult     │
//!  └────────────────────┘     └──────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use deferred_actors::{
//!     register_workers, ActorFactory, ActorSystem, BusinessService, InMemoryRegistry,
//!     Request, Response, WorkerDescriptor, WorkerMessage, COUNTING_WORKER,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> deferred_actors::Result<()> {
//! let registry = InMemoryRegistry::new();
//! register_workers(&registry, BusinessService::shared())?;
//! let factory = ActorFactory::new(Arc::new(registry));
//!
//! let system = ActorSystem::new("demo-actor-system");
//! let counter = factory.spawn::<WorkerMessage, i64>(
//!     &system,
//!     WorkerDescriptor::named(COUNTING_WORKER),
//!     Some("counter".to_string()),
//! )?;
//!
//! counter.send(Request)?;
//! let count = counter.ask(Response, Duration::from_secs(1)).await?;
//! assert_eq!(count, 1);
//! system.shutdown().await
//! # }
//! ```

pub mod bridge;
pub mod business;
pub mod components;
pub mod deferred;
pub mod error;
pub mod factory;
pub mod messages;
pub mod promise;
pub mod registry;
pub mod system;
pub mod workers;

pub use bridge::{CompletionBridge, CompletionService, RequestHandler};
pub use business::{BusinessAction, BusinessService, SharedBusinessAction, BUSINESS_SERVICE};
pub use components::{
    ComponentContext, ComponentDefinition, ComponentRegistry, ComponentRegistryExt,
    ConstructorArgs, Identity, InMemoryRegistry, Scope,
};
pub use deferred::{DeferredResult, DeferredSetter};
pub use error::{ActorError, Result};
pub use factory::{ActorFactory, Props, WorkerDescriptor};
pub use messages::{ActorMessage, Envelope, Message, Request, Response, WorkerMessage};
pub use promise::{promise, Completion, Promise};
pub use registry::{ActorId, ActorRegistry};
pub use system::{
    ActorBehavior, ActorContext, ActorRef, ActorStatus, ActorSystem, BoxedBehavior, Flow,
    SupervisorDirective, SystemMetrics, SystemStats,
};
pub use workers::{
    register_workers, CompletionWorker, CountingWorker, COMPLETION_WORKER, COUNTING_WORKER,
};
