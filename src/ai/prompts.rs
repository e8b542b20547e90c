//! Prompt text and formatting helpers for supervisors and agents.

/// Column width prompts are wrapped to.
pub const DEFAULT_WRAP_WIDTH: usize = 120;

/// Dedent `text`, then wrap every line to at most `width` columns.
///
/// Existing newlines are kept as hard breaks; lines are never merged.
#[must_use]
pub fn prompt_wrap(text: &str, width: usize) -> String {
    let dedented = textwrap::dedent(text);
    dedented
        .split('\n')
        .map(|line| textwrap::fill(line, width.max(1)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Planning instructions. The roster and schema are supplied alongside.
pub const PLANNING_PROMPT: &str = r#"
    ### Task
    Decide, for every sub-agent listed below, whether the latest message needs that sub-agent.

    ### Guidelines
    - Set `sa_required` to false when the message can be handled without the sub-agent. Leave `sa_context_relay` null.
    - Set `sa_required` to true only when the sub-agent's capabilities are needed to answer. In that case
      `sa_context_relay` must be a message to the sub-agent containing why it is needed and every input it
      requires to act.
    - Keep the plan consistent with the intent of the message. Do not delegate without need and do not skip a
      sub-agent whose capabilities are needed.

    ### Response
    Return a JSON object with a `delegations` list holding exactly one entry per sub-agent:
    `{ "sa_name": <name>, "sa_required": <true|false>, "sa_context_relay": <text or null> }`.
"#;

/// Routing instructions shown before each target selection.
pub const ROUTING_PROMPT: &str = r"
    ### Routing
    Choose who acts next. Pick a sub-agent name to hand the conversation to that sub-agent, or `self` when the
    delegated work is finished and you should answer the user yourself. Answer with the name only.
";

/// Instruction for writing the context relayed to the chosen sub-agent.
pub const RELAY_PROMPT: &str = r"
    ### Relay
    Write the message for the chosen sub-agent. Include what it has to do and every input it needs. Do not
    address the user.
";

/// Opening of the Supervisor's final turn after delegation.
pub const CLOSING_REMARK: &str = "Delegated work is complete.\n";

/// Header of the sub-agent roster in a supervisor's system turn.
pub const SUB_AGENTS_HEADER: &str = "### Sub Agents:";

/// Header of the tool roster in a tool agent's system turn.
pub const TOOLS_HEADER: &str = "### Available Tools:";

/// Role block equating the generic assistant role with `role`.
#[must_use]
pub fn role_block(role: &str) -> String {
    format!("### Role Block\nConsider `assistant` and `{role}` roles to be identical.")
}

/// One roster entry: `-\t{label}: {name}` followed by the tab-indented info.
#[must_use]
pub fn roster_entry(label: &str, name: &str, info: &str) -> String {
    format!("-\t{label}: {name}\n\t{}", info.trim().replace('\n', "\n\t"))
}

/// Breadcrumb appended under the supervisor's role before relaying.
#[must_use]
pub fn routing_breadcrumb(target: &str) -> String {
    format!("Routing to {target} > ")
}
