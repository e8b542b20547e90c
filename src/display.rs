//! Colored console output for echoed turns.
//!
//! [`ConsoleObserver`] is attached to the root model handle, so every agent
//! that echoes prints its turns here as `timestamp [ROLE] text`.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::ai::{Content, Role, Turn, TurnObserver};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Default maximum length for system and payload turns.
const DEFAULT_MAX_LEN: usize = 200;

/// Truncate a string to at most `max_len` characters, adding an ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Role label as printed, e.g. `[MLFLOW-AGENT]`.
#[must_use]
pub fn role_label(role: &Role) -> String {
    format!("[{}]", role.as_str().to_uppercase())
}

/// Prints echoed turns to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver {
    /// Print system and payload turns in full.
    raw_mode: bool,
}

impl ConsoleObserver {
    #[must_use]
    pub fn new(raw_mode: bool) -> Self {
        Self { raw_mode }
    }

    /// Text as printed: conversational turns in full, the rest truncated.
    #[must_use]
    pub fn format_text(&self, turn: &Turn) -> String {
        match (&turn.role, &turn.content) {
            (Role::System, _) | (_, Content::Payload(_)) => {
                truncate(&turn.text(), DEFAULT_MAX_LEN, self.raw_mode)
            }
            _ => turn.text(),
        }
    }
}

impl TurnObserver for ConsoleObserver {
    fn on_turn(&self, turn: &Turn) {
        let label = role_label(&turn.role);
        let label = match &turn.role {
            Role::System => label.dimmed().to_string(),
            Role::User => label.green().bold().to_string(),
            Role::Assistant => label.cyan().bold().to_string(),
            Role::Named(_) => label.magenta().bold().to_string(),
        };
        let text = self.format_text(turn);
        let text = match turn.role {
            Role::System => text.dimmed().to_string(),
            _ => text,
        };
        println!("{} {label} {text}", timestamp().dimmed());
        let _ = io::stdout().flush();
    }
}

/// Print the provider in use.
pub fn print_provider(provider: &str, model: &str) {
    println!(
        "{} {} {} ({})",
        timestamp().dimmed(),
        "[AI]".magenta().bold(),
        provider.cyan(),
        model.dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
