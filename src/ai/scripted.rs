//! Deterministic backend that replays queued completions.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::AiError;
use super::model::{CompletionRequest, Constraint, LanguageModel};
use super::transcript::Role;

/// What a scripted backend was asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Role the completion was requested under.
    pub role: Role,
    /// Prefix the completion continues.
    pub prefix: String,
    /// Constraint on the completion.
    pub constraint: Constraint,
    /// Number of turns in the transcript at request time.
    pub turns: usize,
}

/// Backend that answers each request with the next queued completion.
///
/// Used for offline runs and tests. Once the queue is empty every request
/// fails with `AiError::RequestFailed`.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    #[must_use]
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another completion.
    pub fn push(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(reply.into());
    }

    /// Number of completions not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, AiError> {
        lock(&self.requests).push(RecordedRequest {
            role: request.role.clone(),
            prefix: request.prefix.to_string(),
            constraint: request.constraint.clone(),
            turns: request.transcript.len(),
        });
        lock(&self.replies)
            .pop_front()
            .ok_or_else(|| AiError::RequestFailed("Scripted replies exhausted".to_string()))
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
