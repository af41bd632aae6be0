//! Actor Factory
//!
//! Bridges the component registry and the actor runtime. The factory turns
//! a [`WorkerDescriptor`] into [`Props`]: a deferred, one-shot constructor
//! the runtime invokes when it spawns the actor. The factory never builds
//! worker logic itself, the registry does, and it never tracks the actors
//! it helped create.

use crate::components::{
    ComponentDefinition, ComponentRegistry, ComponentRegistryExt, ConstructorArgs, Identity,
};
use crate::error::{ActorError, Result};
use crate::messages::ActorMessage;
use crate::system::{ActorBehavior, ActorRef, ActorSystem, BoxedBehavior};

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Which component to build and what to build it with
#[derive(Debug)]
pub struct WorkerDescriptor {
    identity: Identity,
    args: ConstructorArgs,
}

impl WorkerDescriptor {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            args: ConstructorArgs::new(),
        }
    }

    /// Describe the component registered under `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(Identity::name(name))
    }

    /// Describe the component declared with type tag `A`
    pub fn of<A: Any>() -> Self {
        Self::new(Identity::of::<A>())
    }

    /// Append a constructor argument
    pub fn arg<T: Any + Send>(mut self, value: T) -> Self {
        self.args.push(value);
        self
    }

    pub fn with_args(mut self, args: ConstructorArgs) -> Self {
        self.args = args;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// Deferred constructor for one actor, consumed at spawn time
pub struct Props<M, R> {
    identity: Identity,
    actor_type: &'static str,
    producer: Box<dyn FnOnce() -> Result<BoxedBehavior<M, R>> + Send>,
}

impl<M, R> Props<M, R>
where
    M: ActorMessage,
    R: Send + 'static,
{
    /// Props from a plain closure, bypassing the registry
    pub fn from_fn<A, F>(produce: F) -> Self
    where
        A: ActorBehavior<Message = M, Reply = R>,
        F: FnOnce() -> Result<A> + Send + 'static,
    {
        Self {
            identity: Identity::of::<A>(),
            actor_type: std::any::type_name::<A>(),
            producer: Box::new(move || produce().map(|actor| actor.boxed())),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Declared type of the behaviour these props produce
    pub fn actor_type(&self) -> &'static str {
        self.actor_type
    }

    /// Build the behaviour
    pub fn produce(self) -> Result<BoxedBehavior<M, R>> {
        (self.producer)()
    }
}

impl<M, R> fmt::Debug for Props<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("identity", &self.identity)
            .field("actor_type", &self.actor_type)
            .finish()
    }
}

/// Registers actor behaviours as registry components
impl<M, R> ComponentDefinition<BoxedBehavior<M, R>>
where
    M: ActorMessage,
    R: Send + 'static,
{
    /// Prototype-scoped behaviour component declared as `A`
    pub fn behavior<A>(name: impl Into<String>) -> Self
    where
        A: ActorBehavior<Message = M, Reply = R>,
    {
        Self::prototype(name).declared_as::<A>()
    }
}

/// Resolves worker descriptors to spawnable props
#[derive(Clone)]
pub struct ActorFactory {
    registry: Arc<dyn ComponentRegistry>,
}

impl ActorFactory {
    pub fn new(registry: Arc<dyn ComponentRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn ComponentRegistry> {
        &self.registry
    }

    /// Resolve `descriptor` to props.
    ///
    /// Unknown identities fail here. Constructor matching and construction
    /// itself happen when the props are produced, at spawn time.
    pub fn resolve<M, R>(&self, descriptor: WorkerDescriptor) -> Result<Props<M, R>>
    where
        M: ActorMessage,
        R: Send + 'static,
    {
        let WorkerDescriptor { identity, args } = descriptor;
        let actor_type = self.registry.component_type(&identity).ok_or_else(|| {
            ActorError::resolution(identity.to_string(), "no component registered")
        })?;

        debug!(identity = %identity, actor_type = actor_type, args = ?args, "Resolved worker descriptor");

        let registry = Arc::clone(&self.registry);
        let target = identity.clone();
        Ok(Props {
            identity,
            actor_type,
            producer: Box::new(move || registry.resolve::<BoxedBehavior<M, R>>(&target, args)),
        })
    }

    /// Resolve and spawn in one step
    pub fn spawn<M, R>(
        &self,
        system: &ActorSystem,
        descriptor: WorkerDescriptor,
        name: Option<String>,
    ) -> Result<ActorRef<M, R>>
    where
        M: ActorMessage,
        R: Send + 'static,
    {
        let props = self.resolve(descriptor)?;
        system.spawn_props(props, name)
    }
}

impl fmt::Debug for ActorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorFactory").finish_non_exhaustive()
    }
}
