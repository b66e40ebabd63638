//! Scripted gateway for tests and offline runs

use super::{CompletionRequest, LlmGateway};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Replays queued responses in order and records every request it receives
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion
    pub fn reply(self, content: impl Into<String>) -> Self {
        lock(&self.responses).push_back(Ok(content.into()));
        self
    }

    /// Queue an upstream failure
    pub fn fail(self, message: impl Into<String>) -> Self {
        lock(&self.responses).push_back(Err(message.into()));
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl LlmGateway for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        lock(&self.requests).push(request);

        match lock(&self.responses).pop_front() {
            Some(Ok(content)) => Ok(content),
            Some(Err(message)) => Err(AppError::llm(message)),
            None => Err(AppError::llm("No scripted response left")),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
