//! Agent registry -- a named collection of agents with a capability index.
//!
//! The index maps each capability to the names of agents advertising it, in
//! registration order, so candidate selection is deterministic.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Agent, Capability};

/// A collection of registered [`Agent`] implementations, keyed by name.
///
/// # Example
///
/// ```ignore
/// let mut registry = AgentRegistry::new();
/// registry.register(Arc::new(DeveloperAgent::new()));
/// let candidates = registry.agents_by_capability(Capability::Coding);
/// ```
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
    /// Registration order of agent names; drives deterministic listings.
    order: Vec<String>,
    capability_index: HashMap<Capability, Vec<String>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under the name returned by [`Agent::name`].
    ///
    /// If an agent with the same name is already registered, it is replaced
    /// (and removed from the capability index) and the old one is returned.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        let name = agent.name().to_string();
        let previous = self.remove_entry(&name);

        for capability in agent.capabilities() {
            let names = self.capability_index.entry(*capability).or_default();
            if !names.contains(&name) {
                names.push(name.clone());
            }
        }
        self.order.push(name.clone());
        self.agents.insert(name, agent);
        previous
    }

    /// Unregister an agent by name, returning it if it was present.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Agent>> {
        self.remove_entry(name)
    }

    fn remove_entry(&mut self, name: &str) -> Option<Arc<dyn Agent>> {
        let agent = self.agents.remove(name)?;
        self.order.retain(|n| n != name);
        for capability in agent.capabilities() {
            if let Some(names) = self.capability_index.get_mut(capability) {
                names.retain(|n| n != name);
            }
        }
        Some(agent)
    }

    /// Look up an agent by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.get(name)
    }

    /// Return `true` if an agent with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Agents advertising the given capability, in registration order.
    pub fn agents_by_capability(&self, capability: Capability) -> Vec<Arc<dyn Agent>> {
        self.capability_index
            .get(&capability)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| self.agents.get(name).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of all registered agents, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// All registered agents, in registration order.
    pub fn all(&self) -> Vec<Arc<dyn Agent>> {
        self.order
            .iter()
            .filter_map(|name| self.agents.get(name).cloned())
            .collect()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Return `true` if no agents are registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.order)
            .finish()
    }
}
