//! Deterministic scripted backend.
//!
//! Replays a fixed sequence of replies instead of calling a provider, so
//! pipeline behavior (retries, exhaustion, state transitions) can be tested
//! without a network. Also reachable from the CLI via `--backend scripted`
//! for offline dry runs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BackendError, ConfigError};
use crate::llm::{GenerationRequest, GenerationResponse, TextBackend};
use crate::types::StageId;

/// One scripted turn. Serialized form is tagged, so a script file is a JSON
/// array like `[{"kind":"text","text":"..."},{"kind":"timeout"}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedReply {
    Text { text: String },
    Unavailable,
    Timeout,
    RateLimited,
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Record of one generation call, kept for assertions on stage ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCall {
    pub stage: StageId,
    pub model: String,
}

pub struct ScriptedBackend {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<ScriptedCall>>,
}

impl ScriptedBackend {
    pub fn from_replies(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Load a script from a JSON file.
    pub fn from_script_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
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

        let replies: Vec<ScriptedReply> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidFile {
                path: path.to_string(),
                reason: format!("invalid script JSON: {e}"),
            })?;

        Ok(Self::from_replies(replies))
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stage ids in call order, for asserting how far a run progressed.
    pub fn stages_invoked(&self) -> Vec<StageId> {
        self.calls().into_iter().map(|c| c.stage).collect()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, BackendError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ScriptedCall {
                stage: request.stage,
                model: request.model.clone(),
            });

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        debug!(stage = %request.stage, reply = ?reply, "scripted backend replying");

        match reply {
            Some(ScriptedReply::Text { text }) => Ok(GenerationResponse::new(text)),
            Some(ScriptedReply::Unavailable) => Err(BackendError::Unavailable(
                "scripted backend outage".to_string(),
            )),
            Some(ScriptedReply::Timeout) => Err(BackendError::Timeout {
                duration: request.timeout,
            }),
            Some(ScriptedReply::RateLimited) => Err(BackendError::RateLimited(
                "scripted backend rate limit".to_string(),
            )),
            // Running off the end of the script is a test-setup bug, not a
            // provider fault; fail fast instead of retrying.
            None => Err(BackendError::Misconfigured(
                "scripted backend has no replies left".to_string(),
            )),
        }
    }
}
