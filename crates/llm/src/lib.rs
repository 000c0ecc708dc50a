pub mod gemini;
pub mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which hosted model family serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAi,
    Google,
}

impl Default for ModelProvider {
    fn default() -> Self {
        ModelProvider::OpenAi
    }
}

/// API keys for the supported providers.
///
/// Keys are threaded explicitly into client construction; nothing here is
/// read from process-wide state.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub google: Option<String>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("response contained no text")]
    EmptyResponse,
    #[error("missing api key for provider '{0}'")]
    MissingApiKey(&'static str),
}

/// A single chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    /// Optional system/instruction prefix.
    pub system: Option<String>,
    /// The user-turn payload.
    pub user: String,
    /// Ask the provider to return a JSON object rather than prose.
    pub json_response: bool,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            user: user.into(),
            json_response: false,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn expect_json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

/// Trait for pluggable chat-completion backends.
#[async_trait]
pub trait ChatClient: Send + Sync + 'static {
    /// Sends one request and returns the model's text output.
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;

    /// Human-readable client name.
    fn name(&self) -> &str;
}

/// Builds the client for a provider, failing fast when its key is absent.
pub fn build_client(
    provider: ModelProvider,
    keys: &ApiKeys,
) -> Result<Arc<dyn ChatClient>, LlmError> {
    match provider {
        ModelProvider::OpenAi => {
            let key = keys
                .openai
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or(LlmError::MissingApiKey("openai"))?;
            Ok(Arc::new(OpenAiClient::new(key)))
        }
        ModelProvider::Google => {
            let key = keys
                .google
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or(LlmError::MissingApiKey("google"))?;
            Ok(Arc::new(GeminiClient::new(key)))
        }
    }
}
