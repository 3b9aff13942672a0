//! Configuration for parkbook.
//!
//! Settings come from a TOML file with precedence CLI > file > defaults.
//! The file is `parkbook.toml` in the working directory unless an explicit
//! path is given. Every field is optional; accessors fill in the defaults so
//! the rest of the crate never sees an `Option` for a value that always has
//! one.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Model used when neither the file nor the CLI picks one.
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Per-request timeout when unconfigured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Attempt bound per generation stage when unconfigured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;
const DEFAULT_OUT_DIR: &str = "books";

/// Text generation provider selected by `[llm] provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Scripted,
}

/// Root configuration. Unknown keys in the file are ignored so configs stay
/// forward compatible.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub book: BookSection,
    pub llm: LlmSection,
    pub research: ResearchSection,
}

/// `[book]` section: where finished books land.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BookSection {
    pub out_dir: Option<Utf8PathBuf>,
}

/// `[llm]` section: provider selection, model, timeouts, and retry tuning.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmSection {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
    pub anthropic: Option<AnthropicSection>,
    pub scripted: Option<ScriptedSection>,
}

/// `[llm.anthropic]` section. The API key itself never appears in the file,
/// only the name of the environment variable holding it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnthropicSection {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// `[llm.scripted]` section: path to a JSON reply script.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScriptedSection {
    pub script: Option<Utf8PathBuf>,
}

/// `[research]` section: where the source text comes from.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResearchSection {
    pub provider: Option<String>,
    pub file: Option<Utf8PathBuf>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
}

impl Config {
    /// Default configuration file name, looked up in the working directory.
    pub const DEFAULT_FILE: &'static str = "parkbook.toml";

    /// Load configuration from an explicit file. The file must exist.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_string(),
                }
            } else {
                ConfigError::InvalidFile {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::InvalidFile {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load with file discovery: an explicit path must exist, otherwise
    /// `parkbook.toml` in the working directory is used when present, and
    /// built-in defaults apply when it is not.
    pub fn discover(explicit: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => Self::discover_from(Utf8Path::new(".")),
        }
    }

    /// Path-driven variant of [`Config::discover`], used by tests to avoid
    /// depending on the process working directory.
    pub fn discover_from(dir: &Utf8Path) -> Result<Self, ConfigError> {
        let candidate = dir.join(Self::DEFAULT_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate value ranges. Called on load; the CLI calls it again after
    /// applying its overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "llm.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.llm.request_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "llm.request_timeout_secs".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        if let Some(anthropic) = &self.llm.anthropic {
            if let Some(temperature) = anthropic.temperature
                && !(0.0..=1.0).contains(&temperature)
            {
                return Err(ConfigError::InvalidValue {
                    key: "llm.anthropic.temperature".to_string(),
                    reason: format!("{temperature} is outside the range 0.0..=1.0"),
                });
            }
            if anthropic.max_tokens == Some(0) {
                return Err(ConfigError::InvalidValue {
                    key: "llm.anthropic.max_tokens".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        // Provider names are checked eagerly so a typo fails at startup, not
        // mid-pipeline.
        self.provider().map(|_| ())
    }

    /// The selected text generation provider. Defaults to Anthropic.
    pub fn provider(&self) -> Result<Provider, ConfigError> {
        match self.llm.provider.as_deref() {
            None | Some("anthropic") => Ok(Provider::Anthropic),
            Some("scripted") => Ok(Provider::Scripted),
            Some(other) => Err(ConfigError::InvalidValue {
                key: "llm.provider".to_string(),
                reason: format!("unknown provider '{other}' (expected 'anthropic' or 'scripted')"),
            }),
        }
    }

    pub fn model(&self) -> String {
        self.llm
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.llm
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.llm.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(
            self.llm
                .retry_base_delay_ms
                .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
        )
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(
            self.llm
                .retry_max_delay_ms
                .unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
        )
    }

    /// Script file for the scripted backend, when configured.
    pub fn script_path(&self) -> Option<Utf8PathBuf> {
        self.llm.scripted.as_ref().and_then(|s| s.script.clone())
    }

    /// Research file override, when configured.
    pub fn research_file(&self) -> Option<Utf8PathBuf> {
        self.research.file.clone()
    }

    /// Root directory for persisted books.
    pub fn out_dir(&self) -> Utf8PathBuf {
        self.book
            .out_dir
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUT_DIR))
    }
}

#[cfg(test)]
impl Config {
    /// Minimal configuration for unit tests that bypass file discovery.
    pub fn minimal_for_testing() -> Self {
        Self::default()
    }
}
