//! Actor System Core
//!
//! Actor runtime with lifecycle management, mailbox delivery and failure
//! isolation. Every actor runs as its own Tokio task and processes its
//! mailbox one envelope at a time, so behaviour state needs no locking.
//!
//! ## Mailbox
//!
//! Each mailbox has two lanes:
//! - **control**: bounded, carries stop signals, always polled first
//! - **user**: unbounded, carries envelopes in per-sender FIFO order
//!
//! Envelopes still queued when an actor stops are counted as dead letters.
//! Pending `ask` replies on them fail at once instead of waiting for
//! their timeout.
//!
//! ## Termination
//!
//! An actor stops when its behaviour returns [`Flow::Stop`], when a failure
//! is not resumed, when [`ActorSystem::stop`] is called, or when every
//! [`ActorRef`] to it has been dropped (nothing could reach it again).
//! A timed-out `ask` or deferred result does not stop the actor.
//!
//! # Lock Ordering
//!
//! When acquiring multiple locks, ALWAYS follow this order:
//! 1. `actors`
//! 2. `task_registry`
//!
//! No lock is held across an `.await`.

use crate::error::{ActorError, Result};
use crate::factory::Props;
use crate::messages::{ActorMessage, Envelope};
use crate::registry::{ActorId, ActorRegistry};

use async_trait::async_trait;
use deferred_config::{defaults, RuntimeSettings, ServiceConfig};
use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Boxed behaviour as produced by the factory
pub type BoxedBehavior<M, R> = Box<dyn ActorBehavior<Message = M, Reply = R>>;

/// Core actor system managing actor lifecycles and routing
pub struct ActorSystem {
    /// All live actors in the system
    actors: Arc<RwLock<HashMap<ActorId, ActorHandle>>>,

    /// Id and name directory
    registry: Arc<ActorRegistry>,

    /// System-wide metrics
    metrics: Arc<SystemMetrics>,

    /// Task registry for proper cleanup on shutdown
    task_registry: Arc<RwLock<HashMap<ActorId, JoinHandle<()>>>>,

    settings: RuntimeSettings,

    /// Configured system name
    name: String,

    /// System ID for debugging
    system_id: String,
}

/// Handle to a running actor
#[derive(Debug, Clone)]
pub struct ActorHandle {
    pub id: ActorId,
    pub name: Option<String>,
    pub status: ActorStatus,
    pub start_time: Instant,
    control: mpsc::Sender<SystemSignal>,
}

/// Actor status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    Starting,
    Running,
    Stopping,
}

/// Signals carried on the control lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SystemSignal {
    Stop,
}

/// System-wide metrics
#[derive(Debug, Default)]
pub struct SystemMetrics {
    pub actors_spawned: AtomicU64,
    pub actors_stopped: AtomicU64,
    pub messages_processed: AtomicU64,
    pub total_processing_time_ns: AtomicU64,
    pub unhandled_messages: AtomicU64,
    pub worker_failures: AtomicU64,
    pub dead_letters: AtomicU64,
}

impl SystemMetrics {
    pub fn record_message_handled(&self, duration: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_unhandled(&self) {
        self.unhandled_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.worker_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_letter(&self) {
        self.dead_letters.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let count = self.messages_processed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_processing_time_ns.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> SystemStats {
        SystemStats {
            actors_spawned: self.actors_spawned.load(Ordering::Relaxed),
            actors_stopped: self.actors_stopped.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            unhandled_messages: self.unhandled_messages.load(Ordering::Relaxed),
            worker_failures: self.worker_failures.load(Ordering::Relaxed),
            dead_letters: self.dead_letters.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
        }
    }
}

/// Basic system statistics
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub actors_spawned: u64,
    pub actors_stopped: u64,
    pub messages_processed: u64,
    pub unhandled_messages: u64,
    pub worker_failures: u64,
    pub dead_letters: u64,
    pub avg_processing_time_ns: f64,
}

impl ActorSystem {
    /// Create new actor system with default runtime settings
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, RuntimeSettings::default())
    }

    /// Create new actor system
    pub fn with_settings(name: impl Into<String>, settings: RuntimeSettings) -> Self {
        let name = name.into();
        let system_id = format!("{}-{}", name, Uuid::new_v4().simple());
        info!(system_id = %system_id, "Creating new actor system");

        Self {
            actors: Arc::new(RwLock::new(HashMap::new())),
            registry: Arc::new(ActorRegistry::new()),
            metrics: Arc::new(SystemMetrics::default()),
            task_registry: Arc::new(RwLock::new(HashMap::new())),
            settings,
            name,
            system_id,
        }
    }

    /// Create actor system from loaded service configuration
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::with_settings(config.global.system_name.clone(), config.runtime.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn a new anonymous actor
    pub fn spawn<A>(&self, actor: A) -> Result<ActorRef<A::Message, A::Reply>>
    where
        A: ActorBehavior,
    {
        self.spawn_boxed(Box::new(actor), None)
    }

    /// Spawn a new actor under a unique logical name
    pub fn spawn_named<A>(
        &self,
        name: impl Into<String>,
        actor: A,
    ) -> Result<ActorRef<A::Message, A::Reply>>
    where
        A: ActorBehavior,
    {
        self.spawn_boxed(Box::new(actor), Some(name.into()))
    }

    /// Spawn from a factory-resolved constructor.
    ///
    /// Construction errors surface here, synchronously, and nothing is
    /// registered for a failed attempt.
    pub fn spawn_props<M, R>(&self, props: Props<M, R>, name: Option<String>) -> Result<ActorRef<M, R>>
    where
        M: ActorMessage,
        R: Send + 'static,
    {
        let actor_type = props.actor_type();
        let behavior = props.produce().map_err(|e| {
            warn!(
                actor_type = actor_type,
                error = %e,
                error_category = e.category(),
                "Failed to produce actor behavior"
            );
            e
        })?;
        self.spawn_boxed(behavior, name)
    }

    /// Spawn an already constructed behaviour.
    ///
    /// Does not block: the actor task is scheduled on the current Tokio
    /// runtime and this returns immediately.
    pub fn spawn_boxed<M, R>(
        &self,
        behavior: BoxedBehavior<M, R>,
        name: Option<String>,
    ) -> Result<ActorRef<M, R>>
    where
        M: ActorMessage,
        R: Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ActorError::configuration("Actors can only be spawned inside a Tokio runtime", None)
        })?;

        let actor_id = ActorId::new();
        let start_time = Instant::now();

        debug!(
            actor_id = %actor_id,
            system_id = %self.system_id,
            name = ?name,
            "Spawning new actor in system"
        );

        // Claims the name; fails before anything else is created
        self.registry.register_actor(actor_id.clone(), name.clone())?;

        let path = name.clone().unwrap_or_else(|| actor_id.to_string());
        let (mailbox, receiver) = Mailbox::new(self.settings.control_capacity.max(1), path);
        let (ready_tx, ready_rx) = oneshot::channel();

        let actor_task = ActorTask {
            id: actor_id.clone(),
            name: name.clone(),
            behavior,
            receiver,
            system: self.clone(),
            metrics: Arc::clone(&self.metrics),
        };

        let handle = ActorHandle {
            id: actor_id.clone(),
            name: name.clone(),
            status: ActorStatus::Starting,
            start_time,
            control: mailbox.control.clone(),
        };
        self.actors.write().insert(actor_id.clone(), handle);

        // The task waits for `ready` so it cannot finalize before its
        // join handle is stored
        let task_handle = runtime.spawn(actor_task.run(ready_rx));
        self.task_registry.write().insert(actor_id.clone(), task_handle);
        let _ = ready_tx.send(());

        self.metrics.actors_spawned.fetch_add(1, Ordering::Relaxed);

        let actor_ref = ActorRef {
            id: actor_id,
            name,
            mailbox,
        };

        info!(
            actor_id = %actor_ref.id,
            actor = %actor_ref.path(),
            system_id = %self.system_id,
            "Actor spawned successfully"
        );
        Ok(actor_ref)
    }

    /// Request termination of the actor behind `actor_ref`
    pub async fn stop<M, R>(&self, actor_ref: &ActorRef<M, R>) -> Result<()>
    where
        M: ActorMessage,
        R: Send + 'static,
    {
        self.stop_actor(actor_ref.id()).await
    }

    /// Stop an actor with proper task cleanup.
    ///
    /// The actor finishes the message it is processing, then stops.
    /// If it does not stop within the configured grace period its task is
    /// aborted.
    pub async fn stop_actor(&self, actor_id: &ActorId) -> Result<()> {
        debug!(actor_id = %actor_id, "Stopping actor");

        let control = {
            let mut actors = self.actors.write();
            match actors.get_mut(actor_id) {
                Some(handle) => {
                    handle.status = ActorStatus::Stopping;
                    handle.control.clone()
                }
                None => {
                    warn!(actor_id = %actor_id, "Attempted to stop unknown actor");
                    return Err(ActorError::not_found(actor_id.to_string()));
                }
            }
        };
        let task_handle = self.task_registry.write().remove(actor_id);

        match control.try_send(SystemSignal::Stop) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(actor_id = %actor_id, "Stop already pending");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(actor_id = %actor_id, "Actor already terminating");
            }
        }

        if let Some(mut task_handle) = task_handle {
            match tokio::time::timeout(self.settings.stop_grace(), &mut task_handle).await {
                Ok(Ok(())) => debug!(actor_id = %actor_id, "Actor task completed"),
                Ok(Err(e)) if e.is_cancelled() => {
                    debug!(actor_id = %actor_id, "Actor task cancelled as expected")
                }
                Ok(Err(e)) => warn!(actor_id = %actor_id, error = %e, "Actor task finished with error"),
                Err(_) => {
                    warn!(
                        actor_id = %actor_id,
                        grace_ms = self.settings.stop_grace_ms,
                        "Actor did not stop within grace period, aborting task"
                    );
                    task_handle.abort();
                }
            }
        } else {
            warn!(actor_id = %actor_id, "No task handle found for actor (already stopping?)");
        }

        // No-op when the task already cleaned up after itself
        self.finalize(actor_id);
        info!(actor_id = %actor_id, "Actor stopped and cleaned up");
        Ok(())
    }

    /// Remove every trace of a terminated actor. Idempotent.
    fn finalize(&self, actor_id: &ActorId) {
        let removed = self.actors.write().remove(actor_id).is_some();
        self.task_registry.write().remove(actor_id);
        self.registry.unregister_actor(actor_id);
        if removed {
            self.metrics.actors_stopped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn set_status(&self, actor_id: &ActorId, status: ActorStatus) {
        if let Some(handle) = self.actors.write().get_mut(actor_id) {
            // A pending stop request wins over the running transition
            if handle.status != ActorStatus::Stopping {
                handle.status = status;
            }
        }
    }

    /// Get actor handle by ID
    pub fn get_actor(&self, actor_id: &ActorId) -> Option<ActorHandle> {
        self.actors.read().get(actor_id).cloned()
    }

    /// Find a live actor by logical name
    pub fn lookup(&self, name: &str) -> Option<ActorId> {
        self.registry.lookup(name)
    }

    /// List all actors
    pub fn list_actors(&self) -> Vec<ActorId> {
        self.actors.read().keys().cloned().collect()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.read().len()
    }

    /// Get system metrics
    pub fn metrics(&self) -> Arc<SystemMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Shutdown the entire actor system with proper cleanup
    pub async fn shutdown(&self) -> Result<()> {
        info!(system_id = %self.system_id, "Shutting down actor system");

        let actor_ids = self.list_actors();
        let stop_futures: Vec<_> = actor_ids.iter().map(|id| self.stop_actor(id)).collect();

        for (id, stop_result) in actor_ids
            .iter()
            .zip(futures::future::join_all(stop_futures).await)
        {
            // Actors may stop on their own while the shutdown is in flight
            if let Err(e) = stop_result {
                debug!(actor_id = %id, error = %e, "Actor already gone during shutdown");
            }
        }

        // Final cleanup - abort any remaining tasks
        let remaining_tasks: Vec<_> = self.task_registry.write().drain().collect();
        if !remaining_tasks.is_empty() {
            warn!("Aborting {} remaining tasks during shutdown", remaining_tasks.len());
            for (actor_id, task_handle) in remaining_tasks {
                task_handle.abort();
                self.finalize(&actor_id);
            }
        }

        info!(
            system_id = %self.system_id,
            stats = ?self.metrics.snapshot(),
            "Actor system shutdown complete"
        );
        Ok(())
    }
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new(defaults::runtime::SYSTEM_NAME)
    }
}

impl Clone for ActorSystem {
    fn clone(&self) -> Self {
        Self {
            actors: Arc::clone(&self.actors),
            registry: Arc::clone(&self.registry),
            metrics: Arc::clone(&self.metrics),
            task_registry: Arc::clone(&self.task_registry),
            settings: self.settings.clone(),
            name: self.name.clone(),
            system_id: self.system_id.clone(),
        }
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("system_id", &self.system_id)
            .field("actors", &self.actor_count())
            .finish()
    }
}

/// What the runtime does after a message has been processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep the actor running
    Continue,
    /// Tear the actor down once this message is done
    Stop,
}

/// Supervision directive for error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorDirective {
    /// Resume processing
    Resume,
    /// Stop the actor
    Stop,
}

/// Trait for actor behavior
#[async_trait]
pub trait ActorBehavior: Send + 'static {
    type Message: ActorMessage;
    type Reply: Send + 'static;

    /// Handle incoming message
    async fn handle(
        &mut self,
        msg: Self::Message,
        ctx: &mut ActorContext<Self::Reply>,
    ) -> Result<Flow>;

    /// Called when actor starts
    async fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called before actor stops, whatever the reason
    async fn on_stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Handle failure - return supervision directive.
    ///
    /// The runtime has already logged `error` when this runs.
    async fn on_error(&mut self, _error: &ActorError) -> SupervisorDirective {
        SupervisorDirective::Stop
    }

    fn boxed(self) -> BoxedBehavior<Self::Message, Self::Reply>
    where
        Self: Sized,
    {
        Box::new(self)
    }
}

/// Per-message context handed to a behaviour
pub struct ActorContext<R> {
    id: ActorId,
    name: Option<String>,
    reply_to: Option<oneshot::Sender<R>>,
    metrics: Arc<SystemMetrics>,
}

impl<R> ActorContext<R> {
    fn new(
        id: ActorId,
        name: Option<String>,
        reply_to: Option<oneshot::Sender<R>>,
        metrics: Arc<SystemMetrics>,
    ) -> Self {
        Self {
            id,
            name,
            reply_to,
            metrics,
        }
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Logical name if the actor has one, otherwise its id
    pub fn path(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Whether the current message was sent with `ask`
    pub fn has_sender(&self) -> bool {
        self.reply_to.is_some()
    }

    /// Answer the asking party. Returns false if there is none or it
    /// stopped waiting.
    pub fn reply(&mut self, value: R) -> bool {
        match self.reply_to.take() {
            Some(reply_to) => reply_to.send(value).is_ok(),
            None => {
                debug!(actor = %self.path(), "No sender to reply to");
                false
            }
        }
    }

    /// Report a message the behaviour has no arm for
    pub fn unhandled(&self, message: &dyn ActorMessage) {
        self.metrics.record_unhandled();
        let error = ActorError::unhandled(self.path(), message.message_type());
        warn!(
            actor_id = %self.id,
            message = ?message,
            error_category = error.category(),
            "{}", error
        );
    }
}

/// Actor reference for sending messages
pub struct ActorRef<M, R = ()> {
    id: ActorId,
    name: Option<String>,
    mailbox: Mailbox<M, R>,
}

impl<M, R> ActorRef<M, R>
where
    M: ActorMessage,
    R: Send + 'static,
{
    /// Send message to actor without waiting
    pub fn send(&self, msg: impl Into<M>) -> Result<()> {
        self.mailbox.deliver(Envelope::tell(msg.into()))
    }

    /// Send message and wait for the actor's reply, bounded by `timeout`.
    ///
    /// A timeout only ends this wait; the actor keeps running.
    pub async fn ask(&self, msg: impl Into<M>, timeout: Duration) -> Result<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox.deliver(Envelope::ask(msg.into(), reply_tx))?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ActorError::worker_failure(
                self.path(),
                "actor dropped the request without replying",
            )),
            Err(_) => Err(ActorError::timeout(format!("ask {}", self.path()), timeout)),
        }
    }

    /// Resolves once the actor has terminated
    pub async fn terminated(&self) {
        self.mailbox.user.closed().await
    }
}

impl<M, R> ActorRef<M, R> {
    /// Get actor ID
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Logical name if the actor has one, otherwise its id
    pub fn path(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Whether the actor still accepts messages
    pub fn is_alive(&self) -> bool {
        !self.mailbox.user.is_closed()
    }
}

impl<M, R> Clone for ActorRef<M, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            mailbox: self.mailbox.clone(),
        }
    }
}

impl<M, R> fmt::Debug for ActorRef<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Actor mailbox sender side
struct Mailbox<M, R> {
    control: mpsc::Sender<SystemSignal>,
    user: mpsc::UnboundedSender<Envelope<M, R>>,
    path: Arc<str>,
}

impl<M, R> Clone for Mailbox<M, R> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
            user: self.user.clone(),
            path: Arc::clone(&self.path),
        }
    }
}

/// Mailbox receiver
struct MailboxReceiver<M, R> {
    control: mpsc::Receiver<SystemSignal>,
    user: mpsc::UnboundedReceiver<Envelope<M, R>>,
}

impl<M, R> Mailbox<M, R> {
    fn new(control_capacity: usize, path: String) -> (Self, MailboxReceiver<M, R>) {
        let (control_tx, control_rx) = mpsc::channel(control_capacity);
        let (user_tx, user_rx) = mpsc::unbounded_channel();

        let mailbox = Self {
            control: control_tx,
            user: user_tx,
            path: Arc::from(path),
        };
        let receiver = MailboxReceiver {
            control: control_rx,
            user: user_rx,
        };
        (mailbox, receiver)
    }

    fn deliver(&self, envelope: Envelope<M, R>) -> Result<()> {
        self.user
            .send(envelope)
            .map_err(|_| ActorError::mailbox_closed(self.path.to_string()))
    }
}

/// Next thing an actor task has to deal with
enum Incoming<M, R> {
    Signal(SystemSignal),
    Envelope(Envelope<M, R>),
    Closed,
}

impl<M, R> MailboxReceiver<M, R> {
    async fn recv(&mut self) -> Incoming<M, R> {
        // Control signals always go first
        tokio::select! {
            biased;

            Some(signal) = self.control.recv() => Incoming::Signal(signal),
            envelope = self.user.recv() => match envelope {
                Some(envelope) => Incoming::Envelope(envelope),
                None => Incoming::Closed,
            },
        }
    }
}

/// Actor task runner
struct ActorTask<M: ActorMessage, R: Send + 'static> {
    id: ActorId,
    name: Option<String>,
    behavior: BoxedBehavior<M, R>,
    receiver: MailboxReceiver<M, R>,
    system: ActorSystem,
    metrics: Arc<SystemMetrics>,
}

impl<M: ActorMessage, R: Send + 'static> ActorTask<M, R> {
    async fn run(mut self, ready: oneshot::Receiver<()>) {
        let _ = ready.await;
        let task_start = Instant::now();

        // Lifecycle: Start
        if let Err(e) = self.behavior.on_start().await {
            error!(
                actor_id = %self.id,
                error = %e,
                "Actor failed to start during initialization"
            );
            self.metrics.record_failure();
            self.system.finalize(&self.id);
            self.drain_dead_letters();
            return;
        }
        self.system.set_status(&self.id, ActorStatus::Running);
        debug!(actor_id = %self.id, "Actor started, entering message loop");

        // Main message loop
        loop {
            match self.receiver.recv().await {
                Incoming::Signal(SystemSignal::Stop) => {
                    debug!(actor_id = %self.id, "Stop signal received");
                    break;
                }
                Incoming::Envelope(envelope) => {
                    if self.process(envelope).await == Flow::Stop {
                        break;
                    }
                }
                Incoming::Closed => {
                    debug!(actor_id = %self.id, "All references dropped, stopping actor");
                    break;
                }
            }
        }

        // Lifecycle: Stop
        if let Err(e) = self.behavior.on_stop().await {
            error!(actor_id = %self.id, error = %e, "Actor failed to stop cleanly");
        }
        self.system.finalize(&self.id);
        // Closing the mailbox is what `ActorRef::terminated` observes
        self.drain_dead_letters();

        info!(
            actor_id = %self.id,
            name = ?self.name,
            total_runtime_ms = task_start.elapsed().as_millis(),
            "Actor task execution completed"
        );
    }

    /// Process one envelope; the only place behaviour state is touched
    async fn process(&mut self, envelope: Envelope<M, R>) -> Flow {
        let Envelope { message, reply_to } = envelope;
        let message_type = message.message_type();
        let mut ctx = ActorContext::new(
            self.id.clone(),
            self.name.clone(),
            reply_to,
            Arc::clone(&self.metrics),
        );

        let start = Instant::now();
        let outcome = AssertUnwindSafe(self.behavior.handle(message, &mut ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(flow)) => {
                self.metrics.record_message_handled(start.elapsed());
                if flow == Flow::Stop {
                    debug!(actor_id = %self.id, "Actor requested its own termination");
                }
                flow
            }
            Ok(Err(e)) => {
                self.metrics.record_failure();
                error!(
                    actor_id = %self.id,
                    message_type = message_type,
                    error = %e,
                    error_category = e.category(),
                    "Actor message processing failed"
                );
                match self.behavior.on_error(&e).await {
                    SupervisorDirective::Resume => {
                        debug!(actor_id = %self.id, directive = "Resume", "Actor resumed after error");
                        Flow::Continue
                    }
                    SupervisorDirective::Stop => {
                        warn!(actor_id = %self.id, directive = "Stop", "Stopping actor due to error");
                        Flow::Stop
                    }
                }
            }
            Err(panic) => {
                self.metrics.record_failure();
                let failure = ActorError::worker_failure(ctx.path(), panic_message(panic.as_ref()));
                error!(
                    actor_id = %self.id,
                    message_type = message_type,
                    error = %failure,
                    "Actor panicked while processing message, stopping"
                );
                Flow::Stop
            }
        }
    }

    /// Drop whatever is still queued; waiting askers are released
    fn drain_dead_letters(&mut self) {
        self.receiver.user.close();
        while let Ok(envelope) = self.receiver.user.try_recv() {
            self.metrics.record_dead_letter();
            debug!(
                actor_id = %self.id,
                message_type = envelope.message.message_type(),
                "Dead letter"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
