//! Actor Registry
//!
//! Directory of live actors: ids, optional logical names and spawn times.
//! The runtime keeps workers here for as long as they run; the factory
//! never does.

use crate::error::{ActorError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// Unique actor identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId {
    id: Uuid,
}

impl ActorId {
    /// Create new actor ID
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Create from UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self { id }
    }

    /// Get UUID
    pub fn uuid(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.id.simple())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration record for a live actor
#[derive(Debug, Clone)]
pub struct ActorEntry {
    pub id: ActorId,
    pub name: Option<String>,
    pub registered_at: Instant,
}

/// Live actor directory with unique logical names
#[derive(Debug, Default)]
pub struct ActorRegistry {
    actors: RwLock<HashMap<ActorId, ActorEntry>>,
    names: RwLock<HashMap<String, ActorId>>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register actor, claiming `name` if given
    pub fn register_actor(&self, id: ActorId, name: Option<String>) -> Result<()> {
        if let Some(name) = &name {
            let mut names = self.names.write();
            if names.contains_key(name) {
                tracing::warn!(name = %name, "Actor name already in use");
                return Err(ActorError::configuration(
                    format!("Actor name '{}' is already in use", name),
                    Some("name"),
                ));
            }
            names.insert(name.clone(), id.clone());
        }

        tracing::debug!(actor_id = %id, name = ?name, "Registering actor");
        let entry = ActorEntry {
            id: id.clone(),
            name,
            registered_at: Instant::now(),
        };
        self.actors.write().insert(id, entry);
        Ok(())
    }

    /// Unregister actor, releasing its name. Returns the removed entry.
    pub fn unregister_actor(&self, id: &ActorId) -> Option<ActorEntry> {
        let entry = self.actors.write().remove(id)?;
        if let Some(name) = &entry.name {
            let mut names = self.names.write();
            if names.get(name) == Some(id) {
                names.remove(name);
            }
        }
        tracing::debug!(actor_id = %id, "Unregistered actor");
        Some(entry)
    }

    /// Find a live actor by logical name
    pub fn lookup(&self, name: &str) -> Option<ActorId> {
        self.names.read().get(name).cloned()
    }

    /// Get the registration of a live actor
    pub fn find_actor(&self, id: &ActorId) -> Option<ActorEntry> {
        self.actors.read().get(id).cloned()
    }

    /// List all live actors
    pub fn list_actors(&self) -> Vec<ActorId> {
        self.actors.read().keys().cloned().collect()
    }

    /// Get total actor count
    pub fn total_actors(&self) -> usize {
        self.actors.read().len()
    }

    /// Check if actor exists
    pub fn contains_actor(&self, id: &ActorId) -> bool {
        self.actors.read().contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_creation() {
        let id1 = ActorId::new();
        let id2 = ActorId::new();

        assert_ne!(id1, id2);
        assert_ne!(id1.uuid(), id2.uuid());
    }

    #[test]
    fn test_actor_id_display() {
        let id = ActorId::new();
        let display = format!("{}", id);
        assert!(display.starts_with("actor-"));
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = ActorRegistry::new();
        let actor_id = ActorId::new();

        registry.register_actor(actor_id.clone(), None).unwrap();
        assert!(registry.contains_actor(&actor_id));
        assert_eq!(registry.total_actors(), 1);

        let entry = registry.unregister_actor(&actor_id).unwrap();
        assert_eq!(entry.id, actor_id);
        assert!(!registry.contains_actor(&actor_id));
        assert_eq!(registry.total_actors(), 0);

        // Second removal is a no-op
        assert!(registry.unregister_actor(&actor_id).is_none());
    }

    #[test]
    fn test_names_are_unique_while_live() {
        let registry = ActorRegistry::new();
        let first = ActorId::new();
        let second = ActorId::new();

        registry
            .register_actor(first.clone(), Some("singleton-worker-actor".to_string()))
            .unwrap();
        assert_eq!(registry.lookup("singleton-worker-actor"), Some(first.clone()));

        let err = registry
            .register_actor(second.clone(), Some("singleton-worker-actor".to_string()))
            .unwrap_err();
        assert!(matches!(err, ActorError::Configuration { .. }));
        assert!(!registry.contains_actor(&second));

        // Name is released on unregister
        registry.unregister_actor(&first);
        assert!(registry.lookup("singleton-worker-actor").is_none());
        registry
            .register_actor(second.clone(), Some("singleton-worker-actor".to_string()))
            .unwrap();
        assert_eq!(registry.lookup("singleton-worker-actor"), Some(second));
    }

    #[test]
    fn test_registry_lists() {
        let registry = ActorRegistry::new();
        let named = ActorId::new();
        let anonymous = ActorId::new();

        registry.register_actor(named.clone(), Some("a".to_string())).unwrap();
        registry.register_actor(anonymous.clone(), None).unwrap();

        let actors = registry.list_actors();
        assert_eq!(actors.len(), 2);
        assert!(actors.contains(&named));
        assert!(actors.contains(&anonymous));
        assert_eq!(registry.find_actor(&named).unwrap().name.as_deref(), Some("a"));
        assert!(registry.find_actor(&anonymous).unwrap().name.is_none());
    }
}
