//! Wire types and errors shared by the inference client.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while talking to the inference service.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The service is unreachable or misconfigured (missing credential,
    /// transport failure). Fatal to the calling operation, not retried.
    #[error("inference service unavailable: {0}")]
    Unavailable(String),
    /// The service responded with an unexpected status code.
    #[error("unexpected inference response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The response parsed but did not carry the expected content.
    #[error("inference response was missing {0}")]
    MalformedResponse(&'static str),
}

impl From<reqwest::Error> for InferenceError {
    fn from(error: reqwest::Error) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// One chat-style message exchanged with the completion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Message author role: `system`, `user`, or `assistant`.
    pub role: &'static str,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Build a system-role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    /// Build a user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    /// Build an assistant-role message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct EmbeddingsRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) input: &'a [String],
}

#[derive(Deserialize)]
pub(crate) struct EmbeddingsResponse {
    pub(crate) data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
pub(crate) struct EmbeddingRow {
    pub(crate) embedding: Vec<f32>,
}

#[derive(Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) messages: &'a [ChatMessage],
    pub(crate) max_tokens: u32,
    pub(crate) temperature: f32,
}

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub(crate) choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub(crate) message: ChatChoiceMessage,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoiceMessage {
    pub(crate) content: String,
}
