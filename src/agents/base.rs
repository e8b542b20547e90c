//! The agent capability interface and the plain conversational agent.

use async_trait::async_trait;

use crate::ai::{Content, Model, RelayedMessage, Role, Transcript};

use super::AgentError;

/// A named conversational participant.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name, used as routing key and role tag.
    fn name(&self) -> &str;

    /// Short description used by supervisors to make routing decisions.
    ///
    /// Keep it to a few sentences; verbose descriptions degrade routing.
    fn info(&self) -> String;

    /// Whether turns appended from now on are passed to the observer.
    fn echo(&self) -> bool;

    fn set_echo(&mut self, echo: bool);

    /// Read-only view of the agent's transcript.
    fn transcript(&self) -> &Transcript;

    /// Add content to the conversation.
    ///
    /// Text is appended under `source` (`user` when `None`). Other content is
    /// handed to a type-specific handler.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::UnsupportedContent` when the agent has no handler
    /// for the content type, and propagates model failures from handlers.
    async fn add(&mut self, content: Content, source: Option<Role>) -> Result<(), AgentError>;

    /// Role the agent speaks under.
    fn role(&self) -> Role {
        Role::named(self.name())
    }

    /// Text of the most recent turn under the agent's own role, or an empty
    /// string if it has not spoken.
    fn last_response(&self) -> String {
        self.transcript()
            .last_by(&self.role())
            .map(|turn| turn.text())
            .unwrap_or_default()
    }

    /// Tag `text` with this agent as its origin, for forwarding to another agent.
    fn format_relay(&self, text: &str) -> RelayedMessage {
        RelayedMessage::new(self.name(), text)
    }
}

/// Check that `name` can serve as an agent name.
///
/// # Errors
///
/// Returns `AgentError::EmptyAgentName` for blank names and
/// `AgentError::ReservedAgentName` for built-in role names.
pub fn validate_name(name: &str) -> Result<(), AgentError> {
    if name.trim().is_empty() {
        return Err(AgentError::EmptyAgentName);
    }
    if !matches!(Role::named(name), Role::Named(_)) {
        return Err(AgentError::ReservedAgentName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// State shared by every agent type: identity plus its own model handle.
#[derive(Debug, Clone)]
pub struct AgentCore {
    name: String,
    system_prompt: String,
    lm: Model,
}

impl AgentCore {
    /// Adopt a copy of `lm` and append `system_text` as the system turn.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid agent name.
    pub fn new(
        name: String,
        system_prompt: String,
        lm: &Model,
        echo: bool,
        system_text: &str,
    ) -> Result<Self, AgentError> {
        validate_name(&name)?;
        let mut lm = lm.clone();
        lm.set_echo(echo);
        let lm = lm.append(Role::System, system_text);
        Ok(Self {
            name,
            system_prompt,
            lm,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    #[must_use]
    pub fn role(&self) -> Role {
        Role::named(&self.name)
    }

    #[must_use]
    pub fn lm(&self) -> &Model {
        &self.lm
    }

    /// Replace the handle with one derived from it.
    pub fn set_lm(&mut self, lm: Model) {
        self.lm = lm;
    }

    pub fn append(&mut self, role: Role, content: impl Into<Content>) {
        self.lm = self.lm.clone().append(role, content);
    }

    /// Generate a reply under the agent's own role.
    ///
    /// # Errors
    ///
    /// Propagates model failures; the transcript is unchanged on error.
    pub async fn respond(&mut self) -> Result<(), AgentError> {
        self.lm = self.lm.clone().generate(self.role()).await?;
        Ok(())
    }

    #[must_use]
    pub fn echo(&self) -> bool {
        self.lm.echo()
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.lm.set_echo(echo);
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        self.lm.transcript()
    }
}

/// Conversational agent described by a configured `info` text.
///
/// Text input is appended to the transcript. A relayed message is appended
/// and answered with a generated reply.
#[derive(Debug, Clone)]
pub struct PlainAgent {
    core: AgentCore,
    info: String,
}

impl PlainAgent {
    /// Create an agent with echo enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid agent name.
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        info: impl Into<String>,
        lm: &Model,
    ) -> Result<Self, AgentError> {
        Self::with_echo(name, system_prompt, info, lm, true)
    }

    /// Create an agent with an explicit echo setting.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid agent name.
    pub fn with_echo(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        info: impl Into<String>,
        lm: &Model,
        echo: bool,
    ) -> Result<Self, AgentError> {
        let system_prompt = system_prompt.into();
        let core = AgentCore::new(name.into(), system_prompt.clone(), lm, echo, &system_prompt)?;
        Ok(Self {
            core,
            info: info.into(),
        })
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        self.core.system_prompt()
    }

    /// Generate a reply under the agent's own role.
    ///
    /// # Errors
    ///
    /// Propagates model failures.
    pub async fn respond(&mut self) -> Result<(), AgentError> {
        self.core.respond().await
    }
}

#[async_trait]
impl Agent for PlainAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn info(&self) -> String {
        self.info.clone()
    }

    fn echo(&self) -> bool {
        self.core.echo()
    }

    fn set_echo(&mut self, echo: bool) {
        self.core.set_echo(echo);
    }

    fn transcript(&self) -> &Transcript {
        self.core.transcript()
    }

    async fn add(&mut self, content: Content, source: Option<Role>) -> Result<(), AgentError> {
        match content {
            Content::Text { .. } => {
                self.core.append(source.unwrap_or(Role::User), content);
                Ok(())
            }
            Content::Relay(relay) => {
                let role = source.unwrap_or_else(|| Role::named(&relay.source));
                tracing::debug!(
                    agent = %self.core.name(),
                    from = %relay.source,
                    "Handling relayed message"
                );
                self.core.append(role, relay);
                self.core.respond().await
            }
            Content::Payload(_) => Err(AgentError::UnsupportedContent {
                agent: self.core.name().to_string(),
                kind: content.kind().to_string(),
            }),
        }
    }
}
