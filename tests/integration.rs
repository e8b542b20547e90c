//! Integration tests for agent-relay.

mod agents;

#[test]
fn test_cli_help_lists_commands() {
    use std::process::Command;

    let output = Command::new(env!("CARGO_BIN_EXE_agent-relay"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for command in ["chat", "ask", "config"] {
        assert!(stdout.contains(command), "Help should mention `{command}`");
    }
}
