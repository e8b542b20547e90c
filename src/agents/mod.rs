//! Agents, tool agents and supervisors.
//!
//! Every agent owns its own [`Model`](crate::ai::Model) handle and transcript.
//! A [`Supervisor`] delegates to the agents in its [`AgentRegistry`], which may
//! themselves be supervisors.

mod base;
mod error;
mod plan;
mod registry;
mod supervisor;
mod tool;

pub use base::{validate_name, Agent, AgentCore, PlainAgent};
pub use error::{AgentError, ToolError};
pub use plan::{Delegation, DelegationPlan, PlanSchema, RouteDecision, RouteTarget};
pub use registry::{AgentRegistry, SubAgent, SELF_KEY};
pub use supervisor::{
    DelegationOutcome, DelegationState, Supervisor, SupervisorOptions, SUPERVISOR_INFO,
};
pub use tool::{Tool, ToolAgent, ToolSelection, TOOL_RESULT_KIND};
