//! Agent and supervisor tests.

mod supervisor_test;
mod tool_agent_test;

use std::sync::{Arc, Mutex};

use agent_relay::ai::{Model, ScriptedModel, Turn, TurnObserver};

/// Observer that keeps every echoed turn.
#[derive(Default)]
pub struct Recorder(Mutex<Vec<Turn>>);

impl Recorder {
    pub fn turns(&self) -> Vec<Turn> {
        self.0.lock().unwrap().clone()
    }
}

impl TurnObserver for Recorder {
    fn on_turn(&self, turn: &Turn) {
        self.0.lock().unwrap().push(turn.clone());
    }
}

/// Root model over a scripted backend.
pub fn scripted(replies: &[&str]) -> (Model, Arc<ScriptedModel>) {
    let backend = Arc::new(ScriptedModel::new(replies.iter().copied()));
    (Model::new(backend.clone()), backend)
}

/// Verify all public agent types are exported from the library.
#[test]
fn test_all_agent_types_exported() {
    use agent_relay::agents::{
        Agent, AgentError, AgentRegistry, Delegation, DelegationOutcome, DelegationPlan,
        DelegationState, PlainAgent, PlanSchema, RouteDecision, RouteTarget, SubAgent, Supervisor,
        SupervisorOptions, Tool, ToolAgent, ToolError, ToolSelection, SELF_KEY, TOOL_RESULT_KIND,
    };

    let (lm, _) = scripted(&[]);
    let agent = PlainAgent::new("a", "p", "i", &lm).unwrap();
    assert_eq!(agent.name(), "a");

    let _ = PlanSchema::new(vec!["a".to_string()]);
    let _ = AgentRegistry::new("boss", vec![SubAgent::from(agent)]).unwrap();
    let _ = SupervisorOptions::default();
    let _ = DelegationOutcome::default();
    let _ = DelegationState::default();
    let _ = RouteDecision {
        target: RouteTarget::Myself,
        relay_context: None,
    };
    let _: Option<DelegationPlan> = None;
    let _: Option<Delegation> = None;
    let _: Option<ToolSelection> = None;
    let _: Option<Arc<dyn Tool>> = None;
    let _: Option<ToolAgent> = None;
    let _: Option<Supervisor> = None;
    let _: fn() -> AgentError = || AgentError::EmptyAgentName;
    let _: fn() -> ToolError = || ToolError::Failed(String::new());
    assert_eq!(SELF_KEY, "self");
    assert_eq!(TOOL_RESULT_KIND, "tool_result");
}
