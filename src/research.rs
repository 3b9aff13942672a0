//! Research acquisition.
//!
//! A run starts from free-form research text about the park. It can come
//! from a local file or from Perplexity's Sonar API; either way the pipeline
//! only sees a [`ResearchInput`].

use async_trait::async_trait;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{BackendError, PipelineError, ResearchError};
use crate::llm::http::HttpClient;
use crate::topic::TopicName;
use crate::types::ResearchInput;

const SONAR_URL: &str = "https://api.perplexity.ai/chat/completions";
const SONAR_MODEL: &str = "sonar-pro";
const SONAR_TEMPERATURE: f32 = 0.3;

const RESEARCH_SYSTEM_PROMPT: &str = "\
You are a research assistant gathering accurate, engaging information about \
national parks for children's educational content aimed at ages 2-5. Cover:\n\
- 7-10 iconic natural landmarks and geographic features\n\
- 5-10 animals children would recognize or find exciting\n\
- 3-7 notable plants or trees\n\
- 3-7 memorable facts that would delight a young child\n\
Keep descriptions concrete and sensory. Do not mention any man-made \
structures, visitor centers, or facilities.";

/// Supplies the research text that seeds a pipeline run.
#[async_trait]
pub trait ResearchSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn research(&self, topic: &TopicName) -> Result<ResearchInput, ResearchError>;
}

/// Reads research from a local text file.
pub struct FileSource {
    path: Utf8PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResearchSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn research(&self, topic: &TopicName) -> Result<ResearchInput, ResearchError> {
        debug!(topic = %topic, path = %self.path, "reading research file");

        let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResearchError::Misconfigured(format!("research file not found: {}", self.path))
            } else {
                ResearchError::Unavailable {
                    topic: topic.display().to_string(),
                    reason: format!("failed to read {}: {e}", self.path),
                }
            }
        })?;

        let input = ResearchInput::new(body);
        if input.is_empty() {
            return Err(ResearchError::Empty {
                topic: topic.display().to_string(),
            });
        }
        Ok(input)
    }
}

/// Fetches research from Perplexity's Sonar API.
pub struct SonarSource {
    client: HttpClient,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl SonarSource {
    /// # Errors
    ///
    /// Returns [`ResearchError::Misconfigured`] if the API key variable is
    /// unset or the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self, ResearchError> {
        let api_key_env = config
            .research
            .api_key_env
            .as_deref()
            .unwrap_or("PPLX_API_KEY");

        let api_key = std::env::var(api_key_env).map_err(|_| {
            ResearchError::Misconfigured(format!(
                "Sonar API key not found in environment variable '{api_key_env}'. \
                 Set it, or configure a different api_key_env under [research]."
            ))
        })?;

        let client = HttpClient::new()
            .map_err(|e| ResearchError::Misconfigured(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: config
                .research
                .model
                .clone()
                .unwrap_or_else(|| SONAR_MODEL.to_string()),
            timeout: config.request_timeout(),
        })
    }

    fn user_prompt(topic: &TopicName) -> String {
        format!(
            "Please research {} National Park with a focus on material for a \
             children's board book for ages 2-5. Emphasize what a small child \
             could see, hear, or imagine there.",
            topic.display()
        )
    }
}

#[async_trait]
impl ResearchSource for SonarSource {
    fn name(&self) -> &'static str {
        "sonar"
    }

    async fn research(&self, topic: &TopicName) -> Result<ResearchInput, ResearchError> {
        info!(topic = %topic, model = %self.model, "fetching research from Sonar");

        let body = SonarRequest {
            model: self.model.clone(),
            temperature: SONAR_TEMPERATURE,
            messages: vec![
                SonarMessage {
                    role: "system".to_string(),
                    content: RESEARCH_SYSTEM_PROMPT.to_string(),
                },
                SonarMessage {
                    role: "user".to_string(),
                    content: Self::user_prompt(topic),
                },
            ],
        };

        let builder = self
            .client
            .post(SONAR_URL)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body);

        let response = self
            .client
            .execute(builder, self.timeout, "sonar")
            .await
            .map_err(|e| match e {
                BackendError::Misconfigured(msg) => ResearchError::Misconfigured(msg),
                other => ResearchError::Unavailable {
                    topic: topic.display().to_string(),
                    reason: other.to_string(),
                },
            })?;

        let body: SonarResponse = response.json().await.map_err(|e| {
            ResearchError::Unavailable {
                topic: topic.display().to_string(),
                reason: format!("failed to parse Sonar response: {e}"),
            }
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let input = ResearchInput::new(content);
        if input.is_empty() {
            return Err(ResearchError::Empty {
                topic: topic.display().to_string(),
            });
        }
        Ok(input)
    }
}

#[derive(Debug, Clone, Serialize)]
struct SonarMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct SonarRequest {
    model: String,
    temperature: f32,
    messages: Vec<SonarMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct SonarResponse {
    choices: Vec<SonarChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct SonarChoice {
    message: SonarChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct SonarChoiceMessage {
    content: String,
}

/// Construct the research source selected by configuration. An explicit
/// research file always wins over the remote provider.
pub fn build_research_source(config: &Config) -> Result<Arc<dyn ResearchSource>, PipelineError> {
    if let Some(path) = config.research_file() {
        return Ok(Arc::new(FileSource::new(path)));
    }
    match config.research.provider.as_deref() {
        None | Some("sonar") => Ok(Arc::new(SonarSource::from_config(config)?)),
        Some("file") => Err(PipelineError::Config(crate::error::ConfigError::InvalidValue {
            key: "research.file".to_string(),
            reason: "research provider 'file' requires a file path".to_string(),
        })),
        Some(other) => Err(PipelineError::Config(crate::error::ConfigError::InvalidValue {
            key: "research.provider".to_string(),
            reason: format!("unknown research provider '{other}' (expected 'sonar' or 'file')"),
        })),
    }
}
