//! LLM gateway abstraction
//!
//! Provides:
//! - A provider-neutral chat completion request (text and image parts)
//! - JSON-object or free-text response modes
//! - An OpenAI-compatible HTTP client
//! - A scripted gateway for tests

mod openai;
mod scripted;

pub use openai::OpenAiClient;
pub use scripted::ScriptedLlm;

use crate::errors::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Trait for chat completion providers
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Run a completion and return the first choice's content.
    /// Absent content is returned as an empty string.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Either plain text or a list of typed parts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message carrying an instruction and an image
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }

    /// Text portions of the message, concatenated
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Requested shape of the completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    JsonObject,
}

/// A single completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Label used for logs and metrics ("parse_query", "chat", ...)
    pub operation: &'static str,
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            messages: Vec::new(),
            response_format: ResponseFormat::Text,
        }
    }

    /// Add a message to the conversation.
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Ask for a JSON object response
    pub fn json(mut self) -> Self {
        self.response_format = ResponseFormat::JsonObject;
        self
    }
}
