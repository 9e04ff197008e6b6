//! Producer roster
//!
//! Maps each role to the producer that speaks for it. A roster is assembled
//! before a pipeline is built and never changes afterwards.

use council_core::{Error, Producer, Result, Role, RoleMap};
use std::sync::Arc;

/// Producers keyed by role
#[derive(Clone, Default)]
pub struct Roster {
    producers: RoleMap<Arc<dyn Producer>>,
}

impl std::fmt::Debug for Roster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Roster")
            .field("roles", &self.producers.roles().collect::<Vec<_>>())
            .finish()
    }
}

impl Roster {
    /// Create an empty roster
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a producer under its own role, replacing any previous one
    pub fn with(mut self, producer: Arc<dyn Producer>) -> Self {
        self.register(producer);
        self
    }

    /// Register a producer under its own role
    pub fn register(&mut self, producer: Arc<dyn Producer>) {
        self.producers.insert(producer.role(), producer);
    }

    /// Get the producer for a role
    pub fn get(&self, role: Role) -> Option<Arc<dyn Producer>> {
        self.producers.get(role).cloned()
    }

    /// Resolve producers for the given roles, in the given order
    pub fn resolve(&self, roles: &[Role]) -> Result<Vec<(Role, Arc<dyn Producer>)>> {
        roles
            .iter()
            .map(|role| {
                self.get(*role)
                    .map(|producer| (*role, producer))
                    .ok_or_else(|| {
                        Error::Configuration(format!("no producer registered for role '{role}'"))
                    })
            })
            .collect()
    }

    /// Registered roles, in registration order
    pub fn roles(&self) -> Vec<Role> {
        self.producers.roles().collect()
    }

    /// Number of registered producers
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// Check if the roster is empty
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProducer;

    #[test]
    fn test_resolve_in_requested_order() {
        let roster = Roster::new()
            .with(Arc::new(ScriptedProducer::buy(Role::Technical, 0.8)))
            .with(Arc::new(ScriptedProducer::sell(Role::Fundamental, 0.6)));

        let resolved = roster
            .resolve(&[Role::Fundamental, Role::Technical])
            .unwrap();
        let roles: Vec<Role> = resolved.iter().map(|(r, _)| *r).collect();
        assert_eq!(roles, vec![Role::Fundamental, Role::Technical]);
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_resolve_missing_role() {
        let roster = Roster::new().with(Arc::new(ScriptedProducer::buy(Role::News, 0.5)));
        let Err(err) = roster.resolve(&[Role::News, Role::Technical]) else {
            panic!("resolving an unregistered role should fail");
        };
        assert!(err.to_string().contains("technical"));
    }
}
