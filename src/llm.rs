//! Text generation backends.
//!
//! Every stage talks to an LLM through the [`TextBackend`] trait so the
//! pipeline can run against the real Anthropic Messages API or a scripted
//! stand-in with identical control flow. Backends return raw text; parsing
//! and validation stay in the stage runner.

pub mod anthropic;
pub mod http;
pub mod scripted;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, Provider};
use crate::error::{BackendError, ConfigError, PipelineError};
use crate::types::StageId;

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// One generation call, fully resolved: the runner renders templates and
/// picks the model before constructing this.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Topic display name, for logging only.
    pub topic: String,
    pub stage: StageId,
    pub model: String,
    pub timeout: Duration,
    pub messages: Vec<Message>,
}

/// Raw backend output plus token counts when the provider reports them.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

impl GenerationResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_input: None,
            tokens_output: None,
        }
    }
}

/// A text generation provider.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Stable provider name for logs and receipts.
    fn name(&self) -> &'static str;

    async fn generate(&self, request: GenerationRequest)
    -> Result<GenerationResponse, BackendError>;
}

/// Construct the backend selected by configuration.
pub fn build_backend(config: &Config) -> Result<Arc<dyn TextBackend>, PipelineError> {
    match config.provider()? {
        Provider::Anthropic => Ok(Arc::new(anthropic::AnthropicBackend::from_config(config)?)),
        Provider::Scripted => {
            let path = config.script_path().ok_or_else(|| ConfigError::InvalidValue {
                key: "llm.scripted.script".to_string(),
                reason: "the scripted backend requires a script file (--script or \
                         [llm.scripted] script in parkbook.toml)"
                    .to_string(),
            })?;
            Ok(Arc::new(scripted::ScriptedBackend::from_script_file(
                &path,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(Message::system("rules").role, Role::System);
        assert_eq!(Message::user("go").role, Role::User);
        assert_eq!(Message::new(Role::Assistant, "ok").role, Role::Assistant);
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
