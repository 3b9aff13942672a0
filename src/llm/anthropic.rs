//! Anthropic Messages API backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::BackendError;
use crate::llm::http::HttpClient;
use crate::llm::{GenerationRequest, GenerationResponse, Message, Role, TextBackend};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Sampling parameters applied to every request.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// HTTP backend for Anthropic's Messages API.
#[derive(Clone)]
pub struct AnthropicBackend {
    client: HttpClient,
    base_url: String,
    api_key: String,
    default_model: String,
    params: GenerationParams,
}

impl AnthropicBackend {
    /// # Errors
    ///
    /// Returns [`BackendError::Misconfigured`] if the HTTP client cannot be
    /// constructed.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        default_model: String,
        params: GenerationParams,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model,
            params,
        })
    }

    /// Build from configuration, reading the API key from the configured
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Misconfigured`] if the key variable is unset.
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let anthropic = config.llm.anthropic.as_ref();

        let api_key_env = anthropic
            .and_then(|a| a.api_key_env.as_deref())
            .unwrap_or("ANTHROPIC_API_KEY");

        let api_key = std::env::var(api_key_env).map_err(|_| {
            BackendError::Misconfigured(format!(
                "Anthropic API key not found in environment variable '{api_key_env}'. \
                 Set it, or configure a different api_key_env under [llm.anthropic]."
            ))
        })?;

        let base_url = anthropic.and_then(|a| a.base_url.clone());

        let params = GenerationParams {
            max_tokens: anthropic
                .and_then(|a| a.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: anthropic
                .and_then(|a| a.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
        };

        Self::new(api_key, base_url, config.model(), params)
    }

    /// Split system messages into the `system` field and keep the rest as
    /// the conversation. Multiple system messages are concatenated.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<ApiMessage>) {
        let mut system: Option<String> = None;
        let mut conversation = Vec::new();

        for message in messages {
            match message.role {
                Role::System => {
                    if let Some(existing) = system.as_mut() {
                        existing.push_str("\n\n");
                        existing.push_str(&message.content);
                    } else {
                        system = Some(message.content.clone());
                    }
                }
                Role::User => conversation.push(ApiMessage {
                    role: "user".to_string(),
                    content: message.content.clone(),
                }),
                Role::Assistant => conversation.push(ApiMessage {
                    role: "assistant".to_string(),
                    content: message.content.clone(),
                }),
            }
        }

        (system, conversation)
    }
}

#[async_trait]
impl TextBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, BackendError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        debug!(
            provider = "anthropic",
            model = %model,
            stage = %request.stage,
            max_tokens = self.params.max_tokens,
            temperature = self.params.temperature,
            timeout_secs = request.timeout.as_secs(),
            "invoking Anthropic backend"
        );

        let (system, messages) = Self::convert_messages(&request.messages);

        let body = ApiRequest {
            model: model.clone(),
            messages,
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            system,
        };

        let builder = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let response = self
            .client
            .execute(builder, request.timeout, "anthropic")
            .await?;

        let body: ApiResponse = response.json().await.map_err(|e| {
            BackendError::Unavailable(format!("failed to parse Anthropic response: {e}"))
        })?;

        let mut parts = Vec::new();
        for block in &body.content {
            if block.content_type == "text"
                && let Some(text) = &block.text
            {
                parts.push(text.clone());
            }
        }
        let text = parts.join("");

        if text.is_empty() {
            return Err(BackendError::Unavailable(
                "Anthropic response missing text content".to_string(),
            ));
        }

        let mut result = GenerationResponse::new(text);
        if let Some(usage) = body.usage {
            result.tokens_input = Some(usage.input_tokens);
            result.tokens_output = Some(usage.output_tokens);
        }

        debug!(
            provider = "anthropic",
            stage = %request.stage,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Anthropic invocation completed"
        );

        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}
