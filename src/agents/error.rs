//! Error types for agents and supervisors.

use thiserror::Error;

use crate::ai::AiError;

/// Error returned by a tool invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Invalid tool input: {0}")]
    InvalidInput(String),
    #[error("Tool failed: {0}")]
    Failed(String),
}

/// Errors from agent construction and conversation handling.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Agent names must be non-empty.
    #[error("Agent name must not be empty")]
    EmptyAgentName,

    /// Agent names must not shadow the built-in conversation roles.
    #[error("Agent name `{name}` is a reserved role name")]
    ReservedAgentName { name: String },

    /// Two registry entries share a name, or a sub-agent uses `self`.
    #[error("Duplicate agent name: {name}")]
    DuplicateAgentName { name: String },

    /// The agent has no handler for this content type.
    #[error("Agent `{agent}` cannot handle {kind} content")]
    UnsupportedContent { agent: String, kind: String },

    /// Structured model output did not match the expected schema.
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// A routing target is not in the registry.
    #[error("Unknown agent: {name}")]
    UnknownAgent { name: String },

    /// A tool selection does not name a registered tool.
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    /// A tool call failed.
    #[error("Tool `{name}` failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: ToolError,
    },

    /// The model backend failed.
    #[error("Model error: {0}")]
    Model(AiError),
}

impl From<AiError> for AgentError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::SchemaValidation(message) => Self::SchemaValidation(message),
            other => Self::Model(other),
        }
    }
}
