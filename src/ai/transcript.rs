//! Role-tagged conversation transcripts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker that opens a turn in a flattened transcript.
const TURN_START: &str = "<|im_start|>";

/// Marker that closes a turn in a flattened transcript.
const TURN_END: &str = "<|im_end|>";

/// Speaker of a transcript turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    /// A named agent or tool.
    Named(String),
}

impl Role {
    /// Create a role for a named participant.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    /// Role name as it appears in transcripts.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Named(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            _ => Self::Named(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Named(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text forwarded from one agent to another, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayedMessage {
    /// Name of the agent that produced the relay.
    pub source: String,
    /// Relayed text.
    pub text: String,
}

impl RelayedMessage {
    #[must_use]
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Non-conversational structured input such as a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Kind tag used to pick a handler.
    pub kind: String,
    /// Structured body.
    pub body: serde_json::Value,
}

impl Payload {
    #[must_use]
    pub fn new(kind: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            body,
        }
    }
}

/// Content of a single turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text { text: String },
    Relay(RelayedMessage),
    Payload(Payload),
}

impl Content {
    /// Short name of the content variant, used in errors and logs.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Relay(_) => "relay",
            Self::Payload(payload) => &payload.kind,
        }
    }

    /// Render the content as text for a model prompt or a display.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Relay(relay) => format!("[relayed from {}] {}", relay.source, relay.text),
            Self::Payload(payload) => format!("[{}] {}", payload.kind, payload.body),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text {
            text: text.to_string(),
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text { text }
    }
}

impl From<RelayedMessage> for Content {
    fn from(relay: RelayedMessage) -> Self {
        Self::Relay(relay)
    }
}

impl From<Payload> for Content {
    fn from(payload: Payload) -> Self {
        Self::Payload(payload)
    }
}

/// One role-tagged entry of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Content,
}

impl Turn {
    #[must_use]
    pub fn new(role: Role, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Rendered text of this turn.
    #[must_use]
    pub fn text(&self) -> String {
        self.content.render()
    }
}

/// Append-only ordered sequence of turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn spoken under `role`.
    #[must_use]
    pub fn last_by(&self, role: &Role) -> Option<&Turn> {
        self.turns.iter().rev().find(|turn| &turn.role == role)
    }

    /// Iterate over turns spoken under `role`, oldest first.
    pub fn by_role<'a>(&'a self, role: &'a Role) -> impl Iterator<Item = &'a Turn> + 'a {
        self.turns.iter().filter(move |turn| &turn.role == role)
    }

    /// Flatten the transcript into marker-delimited text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str(&role_start_marker(&turn.role));
            out.push_str(&turn.text());
            out.push_str(TURN_END);
            out.push('\n');
        }
        out
    }
}

/// Literal text that opens a turn for `role` in [`Transcript::render`].
#[must_use]
pub fn role_start_marker(role: &Role) -> String {
    format!("{TURN_START}{role}\n")
}
