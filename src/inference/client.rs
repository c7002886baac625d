//! HTTP client for an OpenAI-compatible inference API.

use crate::config::get_config;
use crate::inference::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, EmbeddingsRequest,
    EmbeddingsResponse, InferenceError,
};
use crate::inference::{CompletionClient, EmbeddingClient};
use async_trait::async_trait;
use reqwest::Client;

/// Client for the `embeddings` and `chat/completions` endpoints of an
/// OpenAI-style API. Model names, output ceiling, and temperature come from
/// configuration; the base URL is overridable so tests can point the client
/// at a local mock server.
pub struct OpenAiClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) embedding_model: String,
    pub(crate) chat_model: String,
    pub(crate) max_tokens: u32,
    pub(crate) temperature: f32,
}

impl OpenAiClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn from_config() -> Result<Self, InferenceError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("docchat/0.1")
            .build()
            .map_err(InferenceError::from)?;
        let base_url = normalize_base_url(&config.openai_base_url)
            .map_err(InferenceError::Unavailable)?;

        tracing::debug!(
            url = %base_url,
            embedding_model = %config.embedding_model,
            chat_model = %config.chat_model,
            has_api_key = config.openai_api_key.is_some(),
            "Initialized inference HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.openai_api_key.clone(),
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            max_tokens: config.completion_max_tokens,
            temperature: config.completion_temperature,
        })
    }

    fn request(&self, path: &str) -> Result<reqwest::RequestBuilder, InferenceError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            InferenceError::Unavailable("OPENAI_API_KEY is not configured".to_string())
        })?;
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(self
            .client
            .post(format!("{base}/{path}"))
            .bearer_auth(api_key))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, InferenceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            model = %self.embedding_model,
            batch = texts.len(),
            "Requesting embeddings"
        );

        let response = self
            .request("embeddings")?
            .json(&EmbeddingsRequest {
                model: &self.embedding_model,
                input: &texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = InferenceError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Embedding request failed");
            return Err(error);
        }

        let payload: EmbeddingsResponse = response.json().await?;
        if payload.data.len() != texts.len() {
            return Err(InferenceError::MalformedResponse(
                "one embedding per input text",
            ));
        }

        Ok(payload.data.into_iter().map(|row| row.embedding).collect())
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, InferenceError> {
        tracing::debug!(
            model = %self.chat_model,
            turns = messages.len(),
            max_tokens = self.max_tokens,
            "Requesting completion"
        );

        let response = self
            .request("chat/completions")?
            .json(&ChatCompletionRequest {
                model: &self.chat_model,
                messages: &messages,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = InferenceError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Completion request failed");
            return Err(error);
        }

        let payload: ChatCompletionResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(InferenceError::MalformedResponse("completion choices"))
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}
