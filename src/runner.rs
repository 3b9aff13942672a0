//! Stage runner: the render-invoke-parse-validate cycle.
//!
//! One runner drives every stage the same way. Templates render once per
//! run (a missing placeholder is a setup error, so retrying cannot help);
//! the invoke-parse-validate loop retries transient backend errors, parse
//! errors, and validation errors up to the attempt bound, with exponential
//! backoff between attempts. Validation rejections are fed back verbatim:
//! the retry prompt carries every violated constraint.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{BackendError, PipelineError, StageError};
use crate::llm::{GenerationRequest, Message, Role, TextBackend};
use crate::stages::{JSON_RESPONSE_RULES, Stage};
use crate::template::render;
use crate::topic::TopicName;

/// Bounded retry with exponential backoff. Defaults: 3 attempts, delays of
/// 1s then 2s, capped at 10s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (1-based count of completed attempts).
    /// Doubles per retry: base, base*2, base*4, ... capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, completed_attempts: u32) -> Duration {
        let exponent = completed_attempts.saturating_sub(1).min(30);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }
}

/// Outcome of a successful stage run.
#[derive(Debug, Clone)]
pub struct StageSuccess<T> {
    pub output: T,
    /// Attempts consumed, 1 when the first reply was accepted.
    pub attempts: u32,
}

/// Drives stages against a backend with a shared retry policy.
pub struct StageRunner {
    backend: Arc<dyn TextBackend>,
    model: String,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl StageRunner {
    pub fn new(
        backend: Arc<dyn TextBackend>,
        model: impl Into<String>,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            request_timeout,
            retry,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one stage to acceptance or exhaustion.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Template`] if a template placeholder has no
    ///   binding; nothing is sent to the backend.
    /// - [`PipelineError::StageFailed`] when a non-transient backend error
    ///   occurs, or when the attempt bound is exhausted; carries the last
    ///   error seen and the attempt count.
    pub async fn run<S: Stage>(
        &self,
        topic: &TopicName,
        stage: &S,
    ) -> Result<StageSuccess<S::Output>, PipelineError> {
        let stage_id = stage.id();
        let vars = stage.vars();

        let system = render(stage.system_template(), &vars)
            .map(|rendered| rendered + JSON_RESPONSE_RULES)
            .map_err(|source| PipelineError::Template {
                stage: stage_id,
                source,
            })?;
        let user = render(stage.user_template(), &vars).map_err(|source| {
            PipelineError::Template {
                stage: stage_id,
                source,
            }
        })?;

        let mut messages = vec![Message::system(system), Message::user(user)];
        let mut attempts: u32 = 0;
        let mut last_error: Option<StageError> = None;

        while attempts < self.retry.max_attempts {
            attempts += 1;

            debug!(
                stage = %stage_id,
                persona = stage.persona().name,
                attempt = attempts,
                max_attempts = self.retry.max_attempts,
                "invoking stage"
            );

            let request = GenerationRequest {
                topic: topic.display().to_string(),
                stage: stage_id,
                model: self.model.clone(),
                timeout: self.request_timeout,
                messages: messages.clone(),
            };

            let error = match self.backend.generate(request).await {
                Ok(response) => {
                    let raw = response.text;
                    let rejection = match stage.parse(&raw) {
                        Ok(output) => {
                            let violations = stage.validate(&output);
                            if violations.is_empty() {
                                debug!(stage = %stage_id, attempts, "stage accepted");
                                return Ok(StageSuccess { output, attempts });
                            }
                            StageError::Validation { violations }
                        }
                        Err(parse) => StageError::Parse(parse),
                    };
                    // Keep the rejected reply in the conversation, then tell
                    // the model what was wrong with it. Turns stay
                    // alternating for providers that require it.
                    messages.push(Message::new(Role::Assistant, raw));
                    messages.push(Message::user(retry_feedback(&rejection)));
                    rejection
                }
                Err(backend) => {
                    if !backend.is_transient() {
                        return Err(PipelineError::StageFailed {
                            stage: stage_id,
                            attempts,
                            source: StageError::Backend(backend),
                        });
                    }
                    StageError::Backend(backend)
                }
            };

            warn!(
                stage = %stage_id,
                attempt = attempts,
                error = %error,
                "stage attempt rejected"
            );

            last_error = Some(error);

            if attempts < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_for(attempts)).await;
            }
        }

        // Loop ran at least once, so last_error is set; the unreachable arm
        // keeps the invariant explicit without panicking.
        let source = last_error.unwrap_or(StageError::Backend(BackendError::Unavailable(
            "no attempts were made".to_string(),
        )));

        Err(PipelineError::StageFailed {
            stage: stage_id,
            attempts,
            source,
        })
    }
}

fn retry_feedback(error: &StageError) -> String {
    match error {
        StageError::Validation { violations } => {
            let mut feedback = String::from(
                "Your previous response violated these constraints. Fix every one of \
                 them and respond again with the full corrected JSON object:\n",
            );
            for violation in violations {
                feedback.push_str("- ");
                feedback.push_str(&violation.to_string());
                feedback.push('\n');
            }
            feedback
        }
        StageError::Parse(parse) => format!(
            "Your previous response could not be read: {parse}. Respond again with a \
             single valid JSON object and nothing else."
        ),
        StageError::Backend(_) => String::new(),
    }
}
