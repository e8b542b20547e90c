//! Agents that own a registry of callable tools.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::json;

use crate::ai::prompts::{role_block, roster_entry, TOOLS_HEADER};
use crate::ai::{Content, Model, Payload, Role, Transcript};

use super::base::{Agent, AgentCore};
use super::registry::SELF_KEY;
use super::{AgentError, ToolError};

/// Payload kind used for tool output.
pub const TOOL_RESULT_KIND: &str = "tool_result";

/// Capture name for the tool selection.
const TOOL_CAPTURE: &str = "tool";

/// A capability a [`ToolAgent`] can invoke.
///
/// Tools without both a name and an info text are not registered.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> Option<&str>;

    /// Short description used when choosing a tool.
    fn info(&self) -> Option<&str>;

    /// Run the tool on a free-text request.
    async fn call(&self, input: &str) -> Result<String, ToolError>;
}

/// Outcome of [`ToolAgent::determine_tool`] when a tool is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSelection {
    pub name: String,
}

/// Agent that picks and calls tools before answering.
#[derive(Clone)]
pub struct ToolAgent {
    core: AgentCore,
    info: String,
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl fmt::Debug for ToolAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolAgent")
            .field("core", &self.core)
            .field("info", &self.info)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolAgent {
    /// Create a tool agent with echo enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid agent name.
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        info: impl Into<String>,
        lm: &Model,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Result<Self, AgentError> {
        let name = name.into();
        let system_prompt = system_prompt.into();
        let info = info.into();

        let mut registry: IndexMap<String, Arc<dyn Tool>> = IndexMap::new();
        for tool in tools {
            match (tool.name(), tool.info()) {
                (Some(tool_name), Some(_)) if tool_name != SELF_KEY => {
                    registry.insert(tool_name.to_string(), tool);
                }
                (tool_name, _) => {
                    tracing::warn!(
                        agent = %name,
                        tool = ?tool_name,
                        "Skipping tool without a usable name and info"
                    );
                }
            }
        }

        let system_text = Self::system_text(&name, &system_prompt, &info, &registry);
        let core = AgentCore::new(name, system_prompt, lm, true, &system_text)?;
        Ok(Self {
            core,
            info,
            tools: registry,
        })
    }

    fn system_text(
        name: &str,
        system_prompt: &str,
        info: &str,
        tools: &IndexMap<String, Arc<dyn Tool>>,
    ) -> String {
        let mut entries: Vec<String> = tools
            .iter()
            .map(|(tool_name, tool)| {
                roster_entry("Tool", tool_name, tool.info().unwrap_or_default())
            })
            .collect();
        entries.push(roster_entry("Tool", SELF_KEY, info));
        format!(
            "{system_prompt}\n\n{TOOLS_HEADER}\n{}\n\n{}",
            entries.join("\n"),
            role_block(name)
        )
    }

    /// Registered tool names followed by `self`.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.tools
            .keys()
            .cloned()
            .chain(std::iter::once(SELF_KEY.to_string()))
            .collect()
    }

    /// Ask the model which tool to use; `None` means no tool is needed.
    ///
    /// Appends only the selection turn.
    ///
    /// # Errors
    ///
    /// Propagates model failures, including a choice outside the registry.
    pub async fn determine_tool(&mut self) -> Result<Option<ToolSelection>, AgentError> {
        let choices = self.tool_names();
        let lm = self
            .core
            .lm()
            .clone()
            .select(self.core.role(), &choices, TOOL_CAPTURE)
            .await?;
        let selection = lm
            .capture_str(TOOL_CAPTURE)
            .filter(|name| *name != SELF_KEY)
            .map(|name| ToolSelection {
                name: name.to_string(),
            });
        self.core.set_lm(lm);
        tracing::debug!(agent = %self.core.name(), tool = ?selection, "Tool selected");
        Ok(selection)
    }

    /// Invoke the selected tool and record its output as a tool result.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::UnknownTool` for unregistered tools and
    /// `AgentError::Tool` when the call fails.
    pub async fn call_tool(
        &mut self,
        selection: &ToolSelection,
        input: &str,
    ) -> Result<String, AgentError> {
        let tool = self
            .tools
            .get(&selection.name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownTool {
                name: selection.name.clone(),
            })?;
        let output = tool.call(input).await.map_err(|source| AgentError::Tool {
            name: selection.name.clone(),
            source,
        })?;
        let payload = Payload::new(
            TOOL_RESULT_KIND,
            json!({ "tool": selection.name, "input": input, "output": output }),
        );
        self.core.append(Role::named(&selection.name), payload);
        Ok(output)
    }
}

#[async_trait]
impl Agent for ToolAgent {
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
                let request = relay.text.clone();
                self.core.append(role, relay);
                if let Some(selection) = self.determine_tool().await? {
                    self.call_tool(&selection, &request).await?;
                }
                self.core.respond().await
            }
            Content::Payload(ref payload) if payload.kind == TOOL_RESULT_KIND => {
                let role = source
                    .or_else(|| payload.body["tool"].as_str().map(Role::named))
                    .unwrap_or(Role::User);
                self.core.append(role, content);
                Ok(())
            }
            Content::Payload(_) => Err(AgentError::UnsupportedContent {
                agent: self.core.name().to_string(),
                kind: content.kind().to_string(),
            }),
        }
    }
}
