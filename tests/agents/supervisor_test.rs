//! Supervisor planning and routing tests.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use agent_relay::agents::{
    Agent, AgentError, DelegationOutcome, PlainAgent, SubAgent, Supervisor, SupervisorOptions,
};
use agent_relay::ai::prompts::CLOSING_REMARK;
use agent_relay::ai::{Constraint, Content, Model, Role, Turn};

use super::{scripted, Recorder};

fn plain(name: &str, lm: &Model) -> SubAgent {
    PlainAgent::new(name, format!("You are {name}."), format!("Handles {name} requests."), lm)
        .unwrap()
        .into()
}

fn supervisor(lm: &Model, names: &[&str]) -> Supervisor {
    let agents = names.iter().map(|name| plain(name, lm)).collect();
    Supervisor::new("boss", "You coordinate a team.", lm, agents, SupervisorOptions::default())
        .unwrap()
}

fn plan(entries: &[(&str, bool, Option<&str>)]) -> String {
    let delegations: Vec<_> = entries
        .iter()
        .map(|(name, required, context)| {
            serde_json::json!({
                "sa_name": name,
                "sa_required": required,
                "sa_context_relay": context,
            })
        })
        .collect();
    serde_json::json!({ "delegations": delegations }).to_string()
}

fn sub_transcript_len(sup: &Supervisor, name: &str) -> usize {
    sup.sub_agent(name).unwrap().transcript().len()
}

#[test]
fn test_fresh_supervisor_has_one_system_turn() {
    let (lm, backend) = scripted(&[]);
    let sup = supervisor(&lm, &["mlflow-agent", "notifier", "archivist"]);

    let turns = sup.transcript().turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::System);

    let text = turns[0].text();
    assert!(text.starts_with("You coordinate a team.\n\n### Sub Agents:"));
    let positions: Vec<usize> = ["mlflow-agent", "notifier", "archivist"]
        .iter()
        .map(|name| text.find(&format!("Agent: {name}")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(backend.requests().is_empty());
}

#[test]
fn test_sub_agent_verbosity_controls_sub_agents_only() {
    let (lm, _) = scripted(&[]);
    let quiet = supervisor(&lm, &["a", "b"]);
    assert!(quiet.echo());
    assert!(quiet.registry().iter().all(|agent| !agent.echo()));

    let options = SupervisorOptions {
        echo: false,
        sub_agent_verbosity: true,
    };
    let loud = Supervisor::new("boss", "p", &lm, vec![plain("a", &lm)], options).unwrap();
    assert!(!loud.echo());
    assert!(loud.sub_agent("a").unwrap().echo());
}

#[tokio::test]
async fn test_no_delegation_answers_directly() {
    let reply_plan = plan(&[("a", false, None), ("b", false, None)]);
    let (lm, backend) = scripted(&[&reply_plan, "Hello! How can I help?"]);
    let mut sup = supervisor(&lm, &["a", "b"]);

    sup.add("hi".into(), None).await.unwrap();

    let turns = sup.transcript().turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[1], Turn::new(Role::User, "hi"));
    assert_eq!(turns[2], Turn::new(Role::named("boss"), "Hello! How can I help?"));
    assert_eq!(sub_transcript_len(&sup, "a"), 1);
    assert_eq!(sub_transcript_len(&sup, "b"), 1);
    assert_eq!(
        sup.last_outcome(),
        Some(&DelegationOutcome {
            routed: vec![],
            forced_stop: false,
            answered_directly: true,
        })
    );
    assert_eq!(sup.final_response(), "Hello! How can I help?");
    assert_eq!(backend.remaining(), 0);
}

#[tokio::test]
async fn test_delegation_round_trip() {
    let reply_plan = plan(&[("a", true, Some("list the latest runs")), ("b", false, None)]);
    let (lm, backend) = scripted(&[
        &reply_plan,
        "a",
        "list the latest runs",
        "Runs 7 and 8 finished.",
        "self",
        "Runs 7 and 8 are done.",
    ]);
    let mut sup = supervisor(&lm, &["a", "b"]);

    sup.add("what finished?".into(), None).await.unwrap();

    let a = sup.sub_agent("a").unwrap();
    let a_reply = a.last_response();
    assert_eq!(a_reply, "Runs 7 and 8 finished.");
    assert_eq!(
        a.transcript().turns()[1],
        Turn::new(Role::named("boss"), sup.format_relay("list the latest runs"))
    );

    let turns = sup.transcript().turns();
    assert_eq!(turns.len(), 5);
    assert_eq!(turns[1], Turn::new(Role::User, "what finished?"));
    assert_eq!(turns[2], Turn::new(Role::named("boss"), "Routing to a > "));
    assert_eq!(turns[3], Turn::new(Role::named("a"), a_reply));
    assert_eq!(
        turns[4],
        Turn::new(Role::named("boss"), format!("{CLOSING_REMARK}Runs 7 and 8 are done."))
    );
    assert_eq!(sub_transcript_len(&sup, "b"), 1);
    assert_eq!(sup.last_outcome().unwrap().routed, vec!["a".to_string()]);
    assert_eq!(backend.remaining(), 0);
}

#[tokio::test]
async fn test_routing_stops_at_registry_size() {
    let reply_plan = plan(&[("a", true, Some("x")), ("b", true, Some("y"))]);
    let (lm, backend) = scripted(&[
        &reply_plan,
        "a", "go a", "a done",
        "b", "go b", "b done",
        "a", "again a", "a done again",
    ]);
    let mut sup = supervisor(&lm, &["a", "b"]);
    assert_eq!(sup.registry().len(), 3);

    sup.add("do everything".into(), None).await.unwrap();

    let outcome = sup.last_outcome().unwrap();
    assert!(outcome.forced_stop);
    assert_eq!(outcome.routed, vec!["a", "b", "a"]);
    assert_eq!(sup.last_response(), "Routing to a > ");
    assert_eq!(sup.transcript().last_by(&Role::named("a")).unwrap().text(), "a done again");
    assert_eq!(sup.final_response(), "a done again");
    assert_eq!(backend.remaining(), 0);
}

#[tokio::test]
async fn test_duplicate_names_fail_before_model_calls() {
    let (lm, backend) = scripted(&["unused"]);
    for names in [vec!["a", "a"], vec!["self"], vec!["a", "boss"]] {
        let agents = names.iter().map(|name| plain(name, &lm)).collect();
        let err =
            Supervisor::new("boss", "p", &lm, agents, SupervisorOptions::default()).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateAgentName { .. }), "{names:?}");
    }
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_planning_and_routing_use_scratch_copies() {
    let reply_plan = plan(&[("a", true, None)]);
    let (lm, backend) = scripted(&[&reply_plan, "a", "", "ok", "self", "Done."]);
    let mut sup = supervisor(&lm, &["a"]);

    sup.add("go".into(), Some(Role::named("caller"))).await.unwrap();

    let requests = backend.requests();
    assert!(matches!(requests[0].constraint, Constraint::Json(_)));
    assert!(matches!(requests[1].constraint, Constraint::Choice(ref c) if c == &["a", "self"]));
    // No scratch turns leak into the transcript.
    assert!(sup
        .transcript()
        .turns()
        .iter()
        .skip(1)
        .all(|turn| turn.role != Role::System));
    assert_eq!(sup.transcript().turns()[1].role, Role::named("caller"));
    // Empty relay and no planned context relay empty text.
    let relay = &sup.sub_agent("a").unwrap().transcript().turns()[1];
    assert_eq!(relay.content, Content::Relay(sup.format_relay("")));
}

#[tokio::test]
async fn test_echo_reaches_observer_for_supervisor_only() {
    let recorder = Arc::new(Recorder::default());
    let reply_plan = plan(&[("a", true, Some("x"))]);
    let (lm, _) = scripted(&[&reply_plan, "a", "x", "a reply", "self", "final"]);
    let lm = lm.with_observer(recorder.clone());
    let mut sup = supervisor(&lm, &["a"]);
    let before = recorder.turns().len();

    sup.add("hello".into(), None).await.unwrap();

    let echoed: Vec<Role> = recorder.turns()[before..].iter().map(|t| t.role.clone()).collect();
    assert_eq!(
        echoed,
        vec![Role::User, Role::named("boss"), Role::named("a"), Role::named("boss")]
    );
}

#[tokio::test]
async fn test_nested_supervisor_relays_through() {
    let outer_plan = plan(&[("team", true, Some("ask the leaf"))]);
    let inner_plan = plan(&[("leaf", true, Some("do the thing"))]);
    let (lm, backend) = scripted(&[
        &outer_plan,
        "team",
        "ask the leaf",
        &inner_plan,
        "leaf",
        "do the thing",
        "thing done",
        "self",
        "the leaf did it",
        "self",
        "all done",
    ]);

    let team = Supervisor::new(
        "team",
        "You run a team.",
        &lm,
        vec![plain("leaf", &lm)],
        SupervisorOptions::default(),
    )
    .unwrap()
    .with_info("Runs the leaf team.");
    let mut outer =
        Supervisor::new("boss", "p", &lm, vec![team.into()], SupervisorOptions::default()).unwrap();

    outer.add("please".into(), None).await.unwrap();

    let SubAgent::Supervisor(team) = outer.sub_agent("team").unwrap() else {
        panic!("expected nested supervisor");
    };
    assert_eq!(team.info(), "Runs the leaf team.");
    assert_eq!(team.transcript().turns()[1].role, Role::named("boss"));
    assert_eq!(team.last_response(), format!("{CLOSING_REMARK}the leaf did it"));
    assert_eq!(team.sub_agent("leaf").unwrap().last_response(), "thing done");
    assert_eq!(
        outer.transcript().last_by(&Role::named("team")).unwrap().text(),
        team.last_response()
    );
    assert_eq!(outer.last_response(), format!("{CLOSING_REMARK}all done"));
    assert_eq!(backend.remaining(), 0);
}

#[tokio::test]
async fn test_plan_reply_without_json_is_schema_error() {
    let (lm, backend) = scripted(&["I would rather not plan."]);
    let mut sup = supervisor(&lm, &["a", "b"]);
    let err = sup.add("hi".into(), None).await.unwrap_err();

    assert!(matches!(err, AgentError::SchemaValidation(_)));
    assert_eq!(backend.requests().len(), 1);
    assert_eq!(sub_transcript_len(&sup, "a"), 1);
}

#[tokio::test]
async fn test_model_failure_propagates() {
    let (lm, _) = scripted(&[]);
    let mut sup = supervisor(&lm, &["a"]);
    let err = sup.add("hi".into(), None).await.unwrap_err();
    assert!(matches!(err, AgentError::Model(_)));
}
