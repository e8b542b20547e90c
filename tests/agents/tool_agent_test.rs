//! Tool agent tests, standalone and under a supervisor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use agent_relay::agents::{
    Agent, AgentError, SubAgent, Supervisor, SupervisorOptions, Tool, ToolAgent, ToolError,
    ToolSelection,
};
use agent_relay::ai::{Constraint, Content, RelayedMessage, Role};

use super::scripted;

/// Tool that counts its invocations.
#[derive(Default)]
struct RunLookup {
    calls: AtomicUsize,
}

#[async_trait]
impl Tool for RunLookup {
    fn name(&self) -> Option<&str> {
        Some("run-lookup")
    }

    fn info(&self) -> Option<&str> {
        Some("Finds MLflow runs for an experiment id.")
    }

    async fn call(&self, input: &str) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if input.is_empty() {
            return Err(ToolError::InvalidInput("experiment id required".to_string()));
        }
        Ok(format!("runs of {input}: 7, 8"))
    }
}

/// Tool with a name but no description.
struct Undocumented;

#[async_trait]
impl Tool for Undocumented {
    fn name(&self) -> Option<&str> {
        Some("undocumented")
    }

    fn info(&self) -> Option<&str> {
        None
    }

    async fn call(&self, _input: &str) -> Result<String, ToolError> {
        Ok(String::new())
    }
}

#[test]
fn test_undocumented_tools_are_skipped() {
    let (lm, _) = scripted(&[]);
    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(Undocumented), Arc::new(RunLookup::default())];
    let agent = ToolAgent::new("tracker", "You track runs.", "Finds runs.", &lm, tools).unwrap();

    assert_eq!(agent.tool_names(), vec!["run-lookup", "self"]);
    assert!(!agent.transcript().turns()[0].text().contains("undocumented"));
}

#[tokio::test]
async fn test_determine_tool_offers_tools_and_self() {
    let (lm, backend) = scripted(&["run-lookup"]);
    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(RunLookup::default())];
    let mut agent = ToolAgent::new("tracker", "p", "i", &lm, tools).unwrap();

    let selection = agent.determine_tool().await.unwrap();
    assert_eq!(
        selection,
        Some(ToolSelection {
            name: "run-lookup".to_string()
        })
    );
    assert!(matches!(
        &backend.requests()[0].constraint,
        Constraint::Choice(choices) if choices == &["run-lookup", "self"]
    ));
    assert_eq!(agent.transcript().len(), 2);
}

#[tokio::test]
async fn test_tool_failure_is_reported() {
    let (lm, _) = scripted(&["run-lookup"]);
    let tool = Arc::new(RunLookup::default());
    let mut agent =
        ToolAgent::new("tracker", "p", "i", &lm, vec![tool.clone() as Arc<dyn Tool>]).unwrap();

    let err = agent
        .add(RelayedMessage::new("boss", "").into(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::Tool {
            source: ToolError::InvalidInput(_),
            ..
        }
    ));
    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_supervisor_delegates_to_tool_agent() {
    let plan = serde_json::json!({"delegations": [
        {"sa_name": "tracker", "sa_required": true, "sa_context_relay": "exp-3"}
    ]})
    .to_string();
    let (lm, backend) = scripted(&[
        &plan,
        "tracker",
        "exp-3",
        "run-lookup",
        "Experiment 3 has runs 7 and 8.",
        "self",
        "Experiment 3 has two runs.",
    ]);
    let tool = Arc::new(RunLookup::default());
    let tracker = ToolAgent::new(
        "tracker",
        "You track runs.",
        "Looks up MLflow runs.",
        &lm,
        vec![tool.clone() as Arc<dyn Tool>],
    )
    .unwrap();
    let mut sup =
        Supervisor::new("boss", "p", &lm, vec![tracker.into()], SupervisorOptions::default())
            .unwrap();

    sup.add("What runs does experiment 3 have?".into(), None).await.unwrap();

    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    let SubAgent::Tool(tracker) = sup.sub_agent("tracker").unwrap() else {
        panic!("expected tool agent");
    };
    let result = tracker.transcript().last_by(&Role::named("run-lookup")).unwrap();
    assert!(matches!(
        &result.content,
        Content::Payload(p) if p.body["output"] == "runs of exp-3: 7, 8"
    ));
    assert_eq!(
        sup.transcript().last_by(&Role::named("tracker")).unwrap().text(),
        "Experiment 3 has runs 7 and 8."
    );
    assert_eq!(backend.remaining(), 0);
}
