//! Sub-agent registry and the closed set of agent variants.

use std::collections::HashSet;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::ai::{Content, Role, Transcript};

use super::base::{Agent, PlainAgent};
use super::plan::RouteTarget;
use super::supervisor::Supervisor;
use super::tool::ToolAgent;
use super::AgentError;

/// Registry key reserved for the owning supervisor.
pub const SELF_KEY: &str = "self";

/// Any agent a supervisor can delegate to.
#[derive(Debug)]
pub enum SubAgent {
    Plain(PlainAgent),
    Tool(ToolAgent),
    Supervisor(Box<Supervisor>),
}

impl From<PlainAgent> for SubAgent {
    fn from(agent: PlainAgent) -> Self {
        Self::Plain(agent)
    }
}

impl From<ToolAgent> for SubAgent {
    fn from(agent: ToolAgent) -> Self {
        Self::Tool(agent)
    }
}

impl From<Supervisor> for SubAgent {
    fn from(agent: Supervisor) -> Self {
        Self::Supervisor(Box::new(agent))
    }
}

#[async_trait]
impl Agent for SubAgent {
    fn name(&self) -> &str {
        match self {
            Self::Plain(a) => a.name(),
            Self::Tool(a) => a.name(),
            Self::Supervisor(a) => a.name(),
        }
    }

    fn info(&self) -> String {
        match self {
            Self::Plain(a) => a.info(),
            Self::Tool(a) => a.info(),
            Self::Supervisor(a) => a.info(),
        }
    }

    fn echo(&self) -> bool {
        match self {
            Self::Plain(a) => a.echo(),
            Self::Tool(a) => a.echo(),
            Self::Supervisor(a) => a.echo(),
        }
    }

    fn set_echo(&mut self, echo: bool) {
        match self {
            Self::Plain(a) => a.set_echo(echo),
            Self::Tool(a) => a.set_echo(echo),
            Self::Supervisor(a) => a.set_echo(echo),
        }
    }

    fn transcript(&self) -> &Transcript {
        match self {
            Self::Plain(a) => a.transcript(),
            Self::Tool(a) => a.transcript(),
            Self::Supervisor(a) => a.transcript(),
        }
    }

    async fn add(&mut self, content: Content, source: Option<Role>) -> Result<(), AgentError> {
        match self {
            Self::Plain(a) => a.add(content, source).await,
            Self::Tool(a) => a.add(content, source).await,
            Self::Supervisor(a) => a.add(content, source).await,
        }
    }
}

/// Sub-agents of one supervisor, in registration order.
///
/// The reserved `self` entry always resolves to the owning supervisor and is
/// counted by [`AgentRegistry::len`]. Membership is fixed at construction.
#[derive(Debug)]
pub struct AgentRegistry {
    agents: IndexMap<String, SubAgent>,
}

impl AgentRegistry {
    /// Build a registry for the supervisor named `owner`.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::DuplicateAgentName` if a name repeats, equals
    /// `self`, or equals `owner`.
    pub fn new(owner: &str, agents: Vec<SubAgent>) -> Result<Self, AgentError> {
        let mut seen = HashSet::new();
        for agent in &agents {
            let name = agent.name();
            if name == SELF_KEY || name == owner || !seen.insert(name) {
                return Err(AgentError::DuplicateAgentName {
                    name: name.to_string(),
                });
            }
        }

        let agents = agents
            .into_iter()
            .map(|agent| (agent.name().to_string(), agent))
            .collect();
        Ok(Self { agents })
    }

    /// Number of entries, `self` included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len() + 1
    }

    /// Always false: the registry holds at least `self`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of sub-agents, `self` excluded.
    #[must_use]
    pub fn sub_agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Sub-agent names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    /// Every routable name: sub-agents in registration order, then `self`.
    #[must_use]
    pub fn route_choices(&self) -> Vec<String> {
        self.names()
            .map(String::from)
            .chain(std::iter::once(SELF_KEY.to_string()))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        name == SELF_KEY || self.agents.contains_key(name)
    }

    /// Map a routing choice onto a target.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<RouteTarget> {
        if name == SELF_KEY {
            Some(RouteTarget::Myself)
        } else if self.agents.contains_key(name) {
            Some(RouteTarget::Agent(name.to_string()))
        } else {
            None
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SubAgent> {
        self.agents.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SubAgent> {
        self.agents.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubAgent> {
        self.agents.values()
    }

    /// Set the echo flag of every sub-agent.
    pub fn set_echo(&mut self, echo: bool) {
        for agent in self.agents.values_mut() {
            agent.set_echo(echo);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ai::{Model, ScriptedModel};

    fn plain(name: &str) -> SubAgent {
        let lm = Model::new(Arc::new(ScriptedModel::default()));
        PlainAgent::new(name, "prompt", format!("{name} info"), &lm)
            .unwrap()
            .into()
    }

    #[test]
    fn test_registry_keeps_order_and_self() {
        let registry = AgentRegistry::new("boss", vec![plain("b"), plain("a")]).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.sub_agent_count(), 2);
        assert_eq!(registry.route_choices(), vec!["b", "a", "self"]);
        assert!(registry.contains(SELF_KEY));
        assert_eq!(registry.resolve("self"), Some(RouteTarget::Myself));
        assert_eq!(registry.resolve("a"), Some(RouteTarget::Agent("a".to_string())));
        assert_eq!(registry.resolve("c"), None);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        for names in [vec!["a", "a"], vec!["self"], vec!["boss"]] {
            let agents = names.into_iter().map(plain).collect();
            let err = AgentRegistry::new("boss", agents).unwrap_err();
            assert!(matches!(err, AgentError::DuplicateAgentName { .. }));
        }
    }

    #[test]
    fn test_set_echo_applies_to_all() {
        let mut registry = AgentRegistry::new("boss", vec![plain("a"), plain("b")]).unwrap();
        registry.set_echo(false);
        assert!(registry.iter().all(|agent| !agent.echo()));
    }
}
