//! Model layer: transcripts, model handles and provider backends.

mod client;
mod model;
pub mod prompts;
mod schema;
mod scripted;
mod transcript;

pub use client::*;
pub use model::{CompletionRequest, Constraint, LanguageModel, Model, TurnObserver};
pub use prompts::{prompt_wrap, DEFAULT_WRAP_WIDTH};
pub use schema::validate as validate_schema;
pub use scripted::{RecordedRequest, ScriptedModel};
pub use transcript::{role_start_marker, Content, Payload, RelayedMessage, Role, Transcript, Turn};
