//! Supervisor agents: plan, route and relay.
//!
//! A supervisor answers each incoming message in two phases. Planning asks
//! the model for a [`DelegationPlan`] that marks every sub-agent as required
//! or not. If nothing is required the supervisor replies itself. Otherwise it
//! runs a bounded routing loop: each iteration selects one target from the
//! registry, relays context to it, and copies the target's response into the
//! supervisor's transcript, until `self` is selected or the loop has run once
//! per registry entry.

use async_trait::async_trait;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::ai::prompts::{
    prompt_wrap, role_block, roster_entry, routing_breadcrumb, CLOSING_REMARK, DEFAULT_WRAP_WIDTH,
    PLANNING_PROMPT, RELAY_PROMPT, ROUTING_PROMPT, SUB_AGENTS_HEADER,
};
use crate::ai::{Content, Model, Role, Transcript};

use super::base::{validate_name, Agent, AgentCore};
use super::plan::{DelegationPlan, PlanSchema, RouteDecision, RouteTarget};
use super::registry::{AgentRegistry, SubAgent, SELF_KEY};
use super::AgentError;

/// Capture name for the delegation plan.
const PLAN_CAPTURE: &str = "delegation_plan";

/// Capture name for the routing choice.
const ROUTE_CAPTURE: &str = "route";

/// Capture name for the relay context.
const RELAY_CAPTURE: &str = "relay";

/// Default routing description of a supervisor.
pub const SUPERVISOR_INFO: &str = "Primary point of contact between the user and the agents. \
Serves as a router and delegates appropriate actions towards various agents under its command.";

/// Construction options for a [`Supervisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Echo the supervisor's own turns.
    pub echo: bool,
    /// Echo applied to every sub-agent.
    pub sub_agent_verbosity: bool,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            echo: true,
            sub_agent_verbosity: false,
        }
    }
}

/// Where a supervisor is in handling the current message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DelegationState {
    #[default]
    Idle,
    Received,
    Planning,
    Routing {
        iteration: usize,
    },
    SelfRespond,
    Terminated,
}

/// Summary of the most recent conversational `add`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegationOutcome {
    /// Sub-agents routed to, in order.
    pub routed: Vec<String>,
    /// The loop stopped because it reached the registry size.
    pub forced_stop: bool,
    /// The supervisor replied without delegating.
    pub answered_directly: bool,
}

/// Routes conversation between the user and a fixed set of sub-agents.
#[derive(Debug)]
pub struct Supervisor {
    core: AgentCore,
    info: String,
    registry: AgentRegistry,
    plan_schema: PlanSchema,
    state: DelegationState,
    last_outcome: Option<DelegationOutcome>,
}

impl Supervisor {
    /// Create a supervisor over `sub_agents`.
    ///
    /// No model call is made during construction.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::DuplicateAgentName` if two sub-agents share a
    /// name or a sub-agent is named `self` or after the supervisor, and a
    /// name error if `name` itself is invalid.
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        lm: &Model,
        sub_agents: Vec<SubAgent>,
        options: SupervisorOptions,
    ) -> Result<Self, AgentError> {
        let name = name.into();
        let system_prompt = system_prompt.into();
        validate_name(&name)?;

        let mut registry = AgentRegistry::new(&name, sub_agents)?;
        registry.set_echo(options.sub_agent_verbosity);

        let plan_schema = PlanSchema::new(registry.names().map(String::from).collect());
        let system_text = Self::system_text(&name, &system_prompt, &registry);
        let core = AgentCore::new(name, system_prompt, lm, options.echo, &system_text)?;

        tracing::debug!(
            agent = %core.name(),
            sub_agents = ?plan_schema.names(),
            "Supervisor created"
        );

        Ok(Self {
            core,
            info: SUPERVISOR_INFO.to_string(),
            registry,
            plan_schema,
            state: DelegationState::Idle,
            last_outcome: None,
        })
    }

    /// Replace the routing description used when this supervisor is itself
    /// a sub-agent.
    #[must_use]
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    fn system_text(name: &str, system_prompt: &str, registry: &AgentRegistry) -> String {
        let roster: Vec<String> = registry
            .iter()
            .map(|agent| roster_entry("Agent", agent.name(), &agent.info()))
            .collect();
        format!(
            "{system_prompt}\n\n{SUB_AGENTS_HEADER}\n{}\n\n{}",
            roster.join("\n"),
            role_block(name)
        )
    }

    #[must_use]
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Sub-agent registered under `name`.
    #[must_use]
    pub fn sub_agent(&self, name: &str) -> Option<&SubAgent> {
        self.registry.get(name)
    }

    #[must_use]
    pub fn plan_schema(&self) -> &PlanSchema {
        &self.plan_schema
    }

    #[must_use]
    pub fn state(&self) -> DelegationState {
        self.state
    }

    #[must_use]
    pub fn last_outcome(&self) -> Option<&DelegationOutcome> {
        self.last_outcome.as_ref()
    }

    /// Answer to show for the latest message.
    ///
    /// Normally the supervisor's last response. When routing was stopped by
    /// the bound, the supervisor's last turn is a breadcrumb, so the response
    /// of the last sub-agent routed to is returned instead.
    #[must_use]
    pub fn final_response(&self) -> String {
        let last_routed = self
            .last_outcome
            .as_ref()
            .filter(|outcome| outcome.forced_stop)
            .and_then(|outcome| outcome.routed.last());
        match last_routed {
            Some(name) => self
                .transcript()
                .last_by(&Role::named(name.as_str()))
                .map(|turn| turn.text())
                .unwrap_or_default(),
            None => self.last_response(),
        }
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        self.core.system_prompt()
    }

    fn transition(&mut self, new_state: DelegationState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }

    async fn converse(&mut self, content: Content, source: Role) -> Result<(), AgentError> {
        self.last_outcome = None;
        self.transition(DelegationState::Received);
        self.core.append(source, content);

        self.transition(DelegationState::Planning);
        let plan = self.plan().await?;

        let mut outcome = DelegationOutcome::default();
        match plan.filter(DelegationPlan::is_delegating) {
            None => {
                self.transition(DelegationState::SelfRespond);
                self.core.respond().await?;
                outcome.answered_directly = true;
            }
            Some(plan) => self.route_loop(&plan, &mut outcome).await?,
        }

        self.transition(DelegationState::Terminated);
        tracing::info!(
            routed = ?outcome.routed,
            forced_stop = outcome.forced_stop,
            answered_directly = outcome.answered_directly,
            "Message handled"
        );
        self.last_outcome = Some(outcome);
        Ok(())
    }

    /// Ask the model which sub-agents the latest message needs.
    ///
    /// Runs on a silenced copy so the supervisor's transcript is unchanged.
    /// Returns `None` when there are no sub-agents to plan for.
    async fn plan(&self) -> Result<Option<DelegationPlan>, AgentError> {
        if self.registry.sub_agent_count() == 0 {
            return Ok(None);
        }

        let scratch = self
            .core
            .lm()
            .silenced()
            .append(Role::System, self.planning_text())
            .json(self.core.role(), self.plan_schema.schema(), PLAN_CAPTURE)
            .await?;
        let value = scratch.capture(PLAN_CAPTURE).cloned().unwrap_or(Value::Null);
        let plan = self.plan_schema.parse(value)?;

        tracing::debug!(required = ?plan.required().collect::<Vec<_>>(), "Delegation plan");
        Ok(Some(plan))
    }

    fn planning_text(&self) -> String {
        let roster: Vec<String> = self
            .registry
            .iter()
            .map(|agent| roster_entry("Agent", agent.name(), &agent.info()))
            .collect();
        format!(
            "{}\n\n{SUB_AGENTS_HEADER}\n{}",
            prompt_wrap(PLANNING_PROMPT, DEFAULT_WRAP_WIDTH).trim(),
            roster.join("\n")
        )
    }

    async fn route_loop(
        &mut self,
        plan: &DelegationPlan,
        outcome: &mut DelegationOutcome,
    ) -> Result<(), AgentError> {
        let bound = self.registry.len();
        for iteration in 1..=bound {
            self.transition(DelegationState::Routing { iteration });
            let decision = self.route(plan, &outcome.routed).await?;
            match decision.target {
                RouteTarget::Myself => {
                    let lm = self
                        .core
                        .lm()
                        .clone()
                        .generate_with_prefix(self.core.role(), CLOSING_REMARK)
                        .await?;
                    self.core.set_lm(lm);
                    return Ok(());
                }
                RouteTarget::Agent(target) => {
                    let context = decision
                        .relay_context
                        .or_else(|| plan.relay_context_for(&target).map(String::from))
                        .unwrap_or_default();
                    tracing::info!(target = %target, iteration, bound, "Routing to sub-agent");
                    self.delegate(&target, &context).await?;
                    outcome.routed.push(target);
                }
            }
        }

        tracing::warn!(bound, "Routing bound reached without returning to self");
        outcome.forced_stop = true;
        Ok(())
    }

    /// Select the next target on a silenced copy, plus relay context for it.
    async fn route(
        &self,
        plan: &DelegationPlan,
        routed: &[String],
    ) -> Result<RouteDecision, AgentError> {
        let role = self.core.role();
        let scratch = self
            .core
            .lm()
            .silenced()
            .append(Role::System, Self::routing_text(plan, routed))
            .select(role.clone(), &self.registry.route_choices(), ROUTE_CAPTURE)
            .await?;
        let choice = scratch.capture_str(ROUTE_CAPTURE).unwrap_or(SELF_KEY);
        let target = self
            .registry
            .resolve(choice)
            .ok_or_else(|| AgentError::UnknownAgent {
                name: choice.to_string(),
            })?;

        let relay_context = match &target {
            RouteTarget::Myself => None,
            RouteTarget::Agent(name) => {
                let scratch = scratch
                    .append(
                        Role::System,
                        format!(
                            "{}\nChosen sub-agent: {name}",
                            prompt_wrap(RELAY_PROMPT, DEFAULT_WRAP_WIDTH).trim()
                        ),
                    )
                    .generate_into(role, RELAY_CAPTURE)
                    .await?;
                scratch
                    .capture_str(RELAY_CAPTURE)
                    .filter(|text| !text.is_empty())
                    .map(String::from)
            }
        };

        Ok(RouteDecision {
            target,
            relay_context,
        })
    }

    fn routing_text(plan: &DelegationPlan, routed: &[String]) -> String {
        let history = if routed.is_empty() {
            "none".to_string()
        } else {
            routed.join(", ")
        };
        format!(
            "{}\n\n### Delegation Plan\n{}\n\n### Routed So Far\n{history}",
            prompt_wrap(ROUTING_PROMPT, DEFAULT_WRAP_WIDTH).trim(),
            plan.summary()
        )
    }

    /// Relay `context` to `target` and copy its response into the transcript.
    async fn delegate(&mut self, target: &str, context: &str) -> Result<(), AgentError> {
        let role = self.core.role();
        self.core.append(role.clone(), routing_breadcrumb(target));

        let relay = self.format_relay(context);
        let agent = self
            .registry
            .get_mut(target)
            .ok_or_else(|| AgentError::UnknownAgent {
                name: target.to_string(),
            })?;
        agent.add(Content::Relay(relay), Some(role)).await?;
        let response = agent.last_response();

        self.core.append(Role::named(target), response);
        Ok(())
    }
}

#[async_trait]
impl Agent for Supervisor {
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

    /// Text and relayed messages go through planning and routing. Payloads
    /// are appended as they are.
    async fn add(&mut self, content: Content, source: Option<Role>) -> Result<(), AgentError> {
        let source = source.unwrap_or(Role::User);
        if let Content::Payload(_) = &content {
            tracing::debug!(
                agent = %self.core.name(),
                kind = content.kind(),
                "Appending payload without routing"
            );
            self.core.append(source, content);
            return Ok(());
        }

        let span = tracing::info_span!(
            "supervisor",
            agent = %self.core.name(),
            request = %Uuid::new_v4()
        );
        self.converse(content, source).instrument(span).await
    }
}
