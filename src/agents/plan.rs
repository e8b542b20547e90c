//! Delegation plans and routing decisions.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use super::AgentError;

/// Planning decision for one sub-agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    #[serde(rename = "sa_name")]
    pub agent: String,
    #[serde(rename = "sa_required")]
    pub required: bool,
    /// Context to relay; blank or non-text values count as no context.
    #[serde(rename = "sa_context_relay", default, deserialize_with = "lenient_text")]
    pub relay_context: Option<String>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    })
}

/// Which sub-agents the latest message needs, one entry per sub-agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationPlan {
    pub delegations: Vec<Delegation>,
}

impl DelegationPlan {
    /// True if at least one sub-agent is required.
    #[must_use]
    pub fn is_delegating(&self) -> bool {
        self.delegations.iter().any(|d| d.required)
    }

    /// Names of required sub-agents, in plan order.
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.delegations
            .iter()
            .filter(|d| d.required)
            .map(|d| d.agent.as_str())
    }

    /// Planned relay context for `agent`, if any.
    #[must_use]
    pub fn relay_context_for(&self, agent: &str) -> Option<&str> {
        self.delegations
            .iter()
            .find(|d| d.agent == agent)
            .and_then(|d| d.relay_context.as_deref())
    }

    /// One line per entry, for the routing prompt.
    #[must_use]
    pub fn summary(&self) -> String {
        self.delegations
            .iter()
            .map(|d| match (d.required, &d.relay_context) {
                (true, Some(context)) => format!("- {}: required ({context})", d.agent),
                (true, None) => format!("- {}: required", d.agent),
                (false, _) => format!("- {}: not required", d.agent),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// JSON schema for delegation plans over a fixed set of sub-agents.
///
/// Built once per supervisor and reused for every planning call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSchema {
    names: Vec<String>,
    schema: Value,
}

impl PlanSchema {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let count = names.len();
        let schema = json!({
            "type": "object",
            "properties": {
                "delegations": {
                    "type": "array",
                    "minItems": count,
                    "maxItems": count,
                    "items": {
                        "type": "object",
                        "properties": {
                            "sa_name": { "type": "string", "enum": &names },
                            "sa_required": { "type": "boolean" },
                            "sa_context_relay": {
                                "description":
                                    "Message for the sub-agent, or null when not required"
                            }
                        },
                        "required": ["sa_name", "sa_required"]
                    }
                }
            },
            "required": ["delegations"]
        });
        Self { names, schema }
    }

    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Turn validated output into a plan covering every sub-agent exactly once.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::SchemaValidation` if the value cannot be read as a
    /// plan or does not name each sub-agent exactly once.
    pub fn parse(&self, value: Value) -> Result<DelegationPlan, AgentError> {
        let plan: DelegationPlan = serde_json::from_value(value)
            .map_err(|e| AgentError::SchemaValidation(e.to_string()))?;

        let mut seen = HashSet::new();
        for delegation in &plan.delegations {
            if !self.names.contains(&delegation.agent) {
                return Err(AgentError::SchemaValidation(format!(
                    "unknown sub-agent `{}` in plan",
                    delegation.agent
                )));
            }
            if !seen.insert(delegation.agent.as_str()) {
                return Err(AgentError::SchemaValidation(format!(
                    "sub-agent `{}` planned more than once",
                    delegation.agent
                )));
            }
        }
        if let Some(missing) = self.names.iter().find(|name| !seen.contains(name.as_str())) {
            return Err(AgentError::SchemaValidation(format!(
                "sub-agent `{missing}` missing from plan"
            )));
        }
        Ok(plan)
    }
}

/// Who acts next in the routing loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// The supervisor answers itself and routing ends.
    Myself,
    /// Delegate to the named sub-agent.
    Agent(String),
}

/// One routing step: the target plus context to relay to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub target: RouteTarget,
    pub relay_context: Option<String>,
}
