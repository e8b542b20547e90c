//! Transcript-bearing model handles.
//!
//! A [`Model`] pairs a [`Transcript`] with a [`LanguageModel`] backend. Every
//! operation that changes the transcript consumes the handle and returns the
//! updated one, so a failed backend call leaves the caller's previous handle
//! untouched. Cloning a handle yields an independent transcript.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::client::{extract_json, AiError};
use super::schema;
use super::transcript::{role_start_marker, Content, Role, Transcript, Turn};

/// Shape the next completion must take.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Unconstrained text.
    Free,
    /// Exactly one of the listed choices.
    Choice(Vec<String>),
    /// A JSON value conforming to the schema.
    Json(Value),
}

/// Everything a backend needs to produce one completion.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Conversation so far.
    pub transcript: &'a Transcript,
    /// Role the completion is produced under.
    pub role: &'a Role,
    /// Text the completion continues from.
    pub prefix: &'a str,
    /// Required shape of the completion.
    pub constraint: &'a Constraint,
}

impl CompletionRequest<'_> {
    /// Instruction describing the constraint, for backends that cannot
    /// enforce it natively.
    #[must_use]
    pub fn constraint_instruction(&self) -> Option<String> {
        match self.constraint {
            Constraint::Free => None,
            Constraint::Choice(choices) => Some(format!(
                "Respond with exactly one of the following options and nothing else: {}",
                choices.join(", ")
            )),
            Constraint::Json(schema) => Some(format!(
                "Respond with only a JSON object that conforms to this JSON schema:\n{}",
                serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
            )),
        }
    }
}

/// Backend that produces completions for a transcript.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce the text that continues `request.prefix` under `request.role`.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, AiError>;
}

/// Receives turns appended to handles that have echo enabled.
pub trait TurnObserver: Send + Sync {
    fn on_turn(&self, turn: &Turn);
}

/// Transcript plus backend, threaded by value through every operation.
#[derive(Clone)]
pub struct Model {
    backend: Arc<dyn LanguageModel>,
    transcript: Transcript,
    captures: HashMap<String, Value>,
    echo: bool,
    observer: Option<Arc<dyn TurnObserver>>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("turns", &self.transcript.len())
            .field("captures", &self.captures.keys().collect::<Vec<_>>())
            .field("echo", &self.echo)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Create an empty handle over `backend` with echo enabled.
    #[must_use]
    pub fn new(backend: Arc<dyn LanguageModel>) -> Self {
        Self {
            backend,
            transcript: Transcript::new(),
            captures: HashMap::new(),
            echo: true,
            observer: None,
        }
    }

    /// Attach an observer that receives echoed turns.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Copy of this handle that never echoes, for scratch work.
    #[must_use]
    pub fn silenced(&self) -> Self {
        let mut copy = self.clone();
        copy.echo = false;
        copy
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn echo(&self) -> bool {
        self.echo
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Value captured under `name` by a previous select, json or generate.
    #[must_use]
    pub fn capture(&self, name: &str) -> Option<&Value> {
        self.captures.get(name)
    }

    /// Captured value as text, if it is a string.
    #[must_use]
    pub fn capture_str(&self, name: &str) -> Option<&str> {
        self.capture(name).and_then(Value::as_str)
    }

    /// Marker text that opens a turn for `role` in the flattened transcript.
    #[must_use]
    pub fn role_start_marker(&self, role: &Role) -> String {
        role_start_marker(role)
    }

    /// Append a turn.
    #[must_use]
    pub fn append(mut self, role: Role, content: impl Into<Content>) -> Self {
        self.push(Turn::new(role, content));
        self
    }

    /// Append a model-produced turn under `role`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn generate(self, role: Role) -> Result<Self, AiError> {
        self.generate_with_prefix(role, "").await
    }

    /// Append one turn under `role` whose text is `prefix` followed by the
    /// completion.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn generate_with_prefix(mut self, role: Role, prefix: &str) -> Result<Self, AiError> {
        let completion = self.complete(&role, prefix, &Constraint::Free).await?;
        self.push(Turn::new(role, format!("{prefix}{completion}")));
        Ok(self)
    }

    /// Generate a turn under `role` and capture its text under `name`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn generate_into(mut self, role: Role, name: &str) -> Result<Self, AiError> {
        let completion = self.complete(&role, "", &Constraint::Free).await?;
        self.captures
            .insert(name.to_string(), Value::String(completion.trim().to_string()));
        self.push(Turn::new(role, completion));
        Ok(self)
    }

    /// Constrain the next turn to one of `choices` and capture it under `name`.
    ///
    /// # Errors
    ///
    /// Returns `AiError::InvalidChoice` if the completion is not one of the
    /// choices, and propagates backend failures.
    pub async fn select(
        mut self,
        role: Role,
        choices: &[String],
        name: &str,
    ) -> Result<Self, AiError> {
        let constraint = Constraint::Choice(choices.to_vec());
        let completion = self.complete(&role, "", &constraint).await?;
        let choice = match_choice(&completion, choices).ok_or_else(|| AiError::InvalidChoice {
            choice: completion.trim().to_string(),
            allowed: choices.to_vec(),
        })?;
        self.captures
            .insert(name.to_string(), Value::String(choice.clone()));
        self.push(Turn::new(role, choice));
        Ok(self)
    }

    /// Constrain the next turn to JSON matching `schema` and capture the
    /// parsed value under `name`.
    ///
    /// # Errors
    ///
    /// Returns `AiError::SchemaValidation` if the completion holds no JSON
    /// object or the object does not conform to the schema, and propagates
    /// backend failures.
    pub async fn json(mut self, role: Role, schema: &Value, name: &str) -> Result<Self, AiError> {
        let constraint = Constraint::Json(schema.clone());
        let completion = self.complete(&role, "", &constraint).await?;
        let value: Value = extract_json(&completion).map_err(|e| match e {
            AiError::ParseError(message) => AiError::SchemaValidation(message),
            other => other,
        })?;
        schema::validate(schema, &value).map_err(AiError::SchemaValidation)?;
        self.push(Turn::new(role, value.to_string()));
        self.captures.insert(name.to_string(), value);
        Ok(self)
    }

    async fn complete(
        &self,
        role: &Role,
        prefix: &str,
        constraint: &Constraint,
    ) -> Result<String, AiError> {
        tracing::trace!(role = %role, turns = self.transcript.len(), "Requesting completion");
        self.backend
            .complete(CompletionRequest {
                transcript: &self.transcript,
                role,
                prefix,
                constraint,
            })
            .await
    }

    fn push(&mut self, turn: Turn) {
        if self.echo {
            if let Some(observer) = &self.observer {
                observer.on_turn(&turn);
            }
        }
        self.transcript.push(turn);
    }
}

/// Match a completion against a closed set of choices.
///
/// Surrounding whitespace, quotes and backticks are ignored; the remainder
/// must equal a choice exactly.
fn match_choice(completion: &str, choices: &[String]) -> Option<String> {
    let cleaned = completion
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();
    choices.iter().find(|choice| choice.as_str() == cleaned).cloned()
}
