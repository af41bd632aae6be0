//! Component Registry
//!
//! Boundary to the container that holds named, typed components and knows
//! how to construct them. The runtime and the factory only ever see the
//! [`ComponentRegistry`] trait; [`InMemoryRegistry`] is the implementation
//! used by the demo service and the tests.
//!
//! Components are looked up by logical name or by declared type and built
//! by the constructor whose argument signature matches the supplied
//! [`ConstructorArgs`] exactly. Scope is fixed at registration:
//! - **Singleton**: built on first lookup, the same instance handed out
//!   (cloned) on every later lookup. Concurrent first lookups wait for a
//!   single construction.
//! - **Prototype**: built fresh on every lookup
//!
//! Callers cannot tell the two apart.

use crate::error::{ActorError, Result};
use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Logical identity of a component
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Registered logical name
    Name(String),
    /// Declared type tag
    Type { id: TypeId, name: &'static str },
}

impl Identity {
    pub fn name(name: impl Into<String>) -> Self {
        Identity::Name(name.into())
    }

    pub fn of<T: Any>() -> Self {
        Identity::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Name(name) => write!(f, "name:{}", name),
            Identity::Type { name, .. } => write!(f, "type:{}", name),
        }
    }
}

/// Registration scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Singleton,
    Prototype,
}

/// Ordered, type-tagged constructor arguments
#[derive(Default)]
pub struct ConstructorArgs {
    values: Vec<Option<Box<dyn Any + Send>>>,
    types: Vec<(TypeId, &'static str)>,
}

impl ConstructorArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument. Arguments match constructor parameters by exact type.
    pub fn with<T: Any + Send>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    pub fn push<T: Any + Send>(&mut self, value: T) {
        self.values.push(Some(Box::new(value)));
        self.types
            .push((TypeId::of::<T>(), std::any::type_name::<T>()));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn signature(&self) -> Vec<TypeId> {
        self.types.iter().map(|(id, _)| *id).collect()
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.types.iter().map(|(_, name)| *name).collect()
    }

    /// Move the argument at `index` out as a `T`
    pub fn take<T: Any>(&mut self, index: usize) -> Result<T> {
        let slot = self.values.get_mut(index).ok_or_else(|| {
            ActorError::resolution("constructor", format!("missing argument {}", index))
        })?;
        let value = slot.take().ok_or_else(|| {
            ActorError::resolution("constructor", format!("argument {} already taken", index))
        })?;
        value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            ActorError::resolution(
                "constructor",
                format!(
                    "argument {} is not a {}",
                    index,
                    std::any::type_name::<T>()
                ),
            )
        })
    }
}

impl fmt::Debug for ConstructorArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}

/// Registry boundary the factory resolves components through
pub trait ComponentRegistry: Send + Sync {
    /// Produce the component registered under `identity`, built from `args`
    fn lookup(&self, identity: &Identity, args: ConstructorArgs) -> Result<Box<dyn Any + Send>>;

    /// Whether anything is registered under `identity`
    fn contains(&self, identity: &Identity) -> bool {
        self.component_type(identity).is_some()
    }

    /// Declared type name of the registration behind `identity`
    fn component_type(&self, identity: &Identity) -> Option<&'static str>;
}

/// Typed lookups for any registry
pub trait ComponentRegistryExt: ComponentRegistry {
    fn resolve<T: Any>(&self, identity: &Identity, args: ConstructorArgs) -> Result<T> {
        let component = self.lookup(identity, args)?;
        component.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            ActorError::resolution(
                identity.to_string(),
                format!(
                    "component is a {}, not a {}",
                    self.component_type(identity).unwrap_or("unknown type"),
                    std::any::type_name::<T>()
                ),
            )
        })
    }
}

impl<R: ComponentRegistry + ?Sized> ComponentRegistryExt for R {}

/// What a constructor sees while it runs: the registry, for collaborators
pub struct ComponentContext<'a> {
    registry: &'a dyn ComponentRegistry,
    identity: &'a Identity,
}

impl<'a> ComponentContext<'a> {
    pub fn new(registry: &'a dyn ComponentRegistry, identity: &'a Identity) -> Self {
        Self { registry, identity }
    }

    /// Identity being constructed
    pub fn identity(&self) -> &Identity {
        self.identity
    }

    pub fn registry(&self) -> &dyn ComponentRegistry {
        self.registry
    }

    /// Zero-argument lookup of a named collaborator
    pub fn component<T: Any>(&self, name: &str) -> Result<T> {
        self.registry
            .resolve(&Identity::name(name), ConstructorArgs::new())
    }

    pub fn resolve<T: Any>(&self, identity: &Identity, args: ConstructorArgs) -> Result<T> {
        self.registry.resolve(identity, args)
    }
}

type BuildFn =
    dyn Fn(&mut ConstructorArgs, &ComponentContext<'_>) -> Result<Box<dyn Any + Send>> + Send + Sync;
type ShareFn = fn(&(dyn Any + Send)) -> Option<Box<dyn Any + Send>>;

struct Constructor {
    signature: Vec<TypeId>,
    type_names: Vec<&'static str>,
    build: Box<BuildFn>,
}

fn share<T: Any + Send + Clone>(instance: &(dyn Any + Send)) -> Option<Box<dyn Any + Send>> {
    instance
        .downcast_ref::<T>()
        .map(|value| Box::new(value.clone()) as Box<dyn Any + Send>)
}

/// Typed registration of one component
pub struct ComponentDefinition<T> {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    scope: Scope,
    share: Option<ShareFn>,
    constructors: Vec<Constructor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send> ComponentDefinition<T> {
    /// Component built fresh on every lookup
    pub fn prototype(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            scope: Scope::Prototype,
            share: None,
            constructors: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Register under type tag `D` instead of the produced type
    pub fn declared_as<D: Any>(mut self) -> Self {
        self.type_id = TypeId::of::<D>();
        self.type_name = std::any::type_name::<D>();
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Zero-argument constructor
    pub fn constructor<F>(self, build: F) -> Self
    where
        F: Fn(&ComponentContext<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.add_constructor(Vec::new(), Vec::new(), move |_args, ctx| build(ctx))
    }

    /// One-argument constructor
    pub fn constructor_with<A, F>(self, build: F) -> Self
    where
        A: Any + Send,
        F: Fn(&ComponentContext<'_>, A) -> Result<T> + Send + Sync + 'static,
    {
        self.add_constructor(
            vec![TypeId::of::<A>()],
            vec![std::any::type_name::<A>()],
            move |args, ctx| {
                let a = args.take::<A>(0)?;
                build(ctx, a)
            },
        )
    }

    /// Two-argument constructor
    pub fn constructor_with2<A, B, F>(self, build: F) -> Self
    where
        A: Any + Send,
        B: Any + Send,
        F: Fn(&ComponentContext<'_>, A, B) -> Result<T> + Send + Sync + 'static,
    {
        self.add_constructor(
            vec![TypeId::of::<A>(), TypeId::of::<B>()],
            vec![std::any::type_name::<A>(), std::any::type_name::<B>()],
            move |args, ctx| {
                let a = args.take::<A>(0)?;
                let b = args.take::<B>(1)?;
                build(ctx, a, b)
            },
        )
    }

    fn add_constructor<F>(
        mut self,
        signature: Vec<TypeId>,
        type_names: Vec<&'static str>,
        build: F,
    ) -> Self
    where
        F: Fn(&mut ConstructorArgs, &ComponentContext<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.constructors.push(Constructor {
            signature,
            type_names,
            build: Box::new(move |args: &mut ConstructorArgs, ctx: &ComponentContext<'_>| {
                build(args, ctx).map(|value| Box::new(value) as Box<dyn Any + Send>)
            }),
        });
        self
    }
}

impl<T: Any + Send + Clone> ComponentDefinition<T> {
    /// Component built once and shared by every lookup.
    ///
    /// The constructor runs under the registration's lock, so it must not
    /// resolve its own component.
    pub fn singleton(name: impl Into<String>) -> Self {
        let mut definition = Self::prototype(name);
        definition.scope = Scope::Singleton;
        definition.share = Some(share::<T>);
        definition
    }
}

struct Registration {
    name: String,
    type_name: &'static str,
    scope: Scope,
    share: Option<ShareFn>,
    constructors: Vec<Constructor>,
    instance: Mutex<Option<Box<dyn Any + Send>>>,
}

impl Registration {
    fn produce(
        &self,
        mut args: ConstructorArgs,
        ctx: &ComponentContext<'_>,
    ) -> Result<Box<dyn Any + Send>> {
        let share = match (self.scope, self.share) {
            (Scope::Singleton, Some(share)) => share,
            _ => return self.construct(&mut args, ctx),
        };

        // Held across construction so racing first lookups build exactly once
        let mut cached = self.instance.lock();
        if cached.is_none() {
            *cached = Some(self.construct(&mut args, ctx)?);
        } else if !args.is_empty() {
            debug!(component = %self.name, "Singleton already built, ignoring constructor arguments");
        }
        cached
            .as_deref()
            .and_then(share)
            .ok_or_else(|| self.type_mismatch())
    }

    fn construct(
        &self,
        args: &mut ConstructorArgs,
        ctx: &ComponentContext<'_>,
    ) -> Result<Box<dyn Any + Send>> {
        let signature = args.signature();
        let constructor = self
            .constructors
            .iter()
            .find(|c| c.signature == signature)
            .ok_or_else(|| self.no_matching_constructor(args))?;

        debug!(
            component = %self.name,
            scope = ?self.scope,
            args = ?args,
            "Constructing component"
        );
        (constructor.build)(args, ctx)
    }

    fn no_matching_constructor(&self, args: &ConstructorArgs) -> ActorError {
        let available: Vec<String> = self
            .constructors
            .iter()
            .map(|c| format!("({})", c.type_names.join(", ")))
            .collect();
        ActorError::resolution(
            format!("name:{}", self.name),
            format!(
                "no matching constructor for ({}); available: {}",
                args.type_names().join(", "),
                if available.is_empty() {
                    "none".to_string()
                } else {
                    available.join(" ")
                }
            ),
        )
    }

    fn type_mismatch(&self) -> ActorError {
        ActorError::resolution(
            format!("name:{}", self.name),
            "cached singleton has an unexpected type",
        )
    }
}

/// In-process component registry
#[derive(Default)]
pub struct InMemoryRegistry {
    by_name: RwLock<HashMap<String, Arc<Registration>>>,
    by_type: RwLock<HashMap<TypeId, Vec<String>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component. Names must be unique.
    pub fn register<T: Any + Send>(&self, definition: ComponentDefinition<T>) -> Result<()> {
        let ComponentDefinition {
            name,
            type_id,
            type_name,
            scope,
            share,
            constructors,
            ..
        } = definition;

        if constructors.is_empty() {
            return Err(ActorError::configuration(
                format!("Component '{}' has no constructor", name),
                Some("constructors"),
            ));
        }

        let mut by_name = self.by_name.write();
        if by_name.contains_key(&name) {
            return Err(ActorError::configuration(
                format!("Component '{}' is already registered", name),
                Some("name"),
            ));
        }

        debug!(component = %name, component_type = type_name, scope = ?scope, "Registering component");
        by_name.insert(
            name.clone(),
            Arc::new(Registration {
                name: name.clone(),
                type_name,
                scope,
                share,
                constructors,
                instance: Mutex::new(None),
            }),
        );
        self.by_type.write().entry(type_id).or_default().push(name);
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.by_name.read().keys().cloned().collect()
    }

    fn registration(&self, identity: &Identity) -> Result<Arc<Registration>> {
        let name = match identity {
            Identity::Name(name) => name.clone(),
            Identity::Type { id, .. } => {
                let by_type = self.by_type.read();
                match by_type.get(id).map(Vec::as_slice) {
                    Some([name]) => name.clone(),
                    Some(names) if names.len() > 1 => {
                        return Err(ActorError::resolution(
                            identity.to_string(),
                            format!("ambiguous type, candidates: {}", names.join(", ")),
                        ))
                    }
                    _ => {
                        return Err(ActorError::resolution(
                            identity.to_string(),
                            "no component registered",
                        ))
                    }
                }
            }
        };

        self.by_name
            .read()
            .get(&name)
            .cloned()
            .ok_or_else(|| ActorError::resolution(identity.to_string(), "no component registered"))
    }
}

impl ComponentRegistry for InMemoryRegistry {
    fn lookup(&self, identity: &Identity, args: ConstructorArgs) -> Result<Box<dyn Any + Send>> {
        // Cloned out so constructors can look up collaborators without a held lock
        let registration = self.registration(identity)?;
        let ctx = ComponentContext::new(self, identity);
        registration.produce(args, &ctx)
    }

    fn component_type(&self, identity: &Identity) -> Option<&'static str> {
        self.registration(identity).ok().map(|r| r.type_name)
    }
}

impl fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by_name = self.by_name.read();
        f.debug_map()
            .entries(by_name.iter().map(|(name, r)| (name, (r.type_name, r.scope))))
            .finish()
    }
}
