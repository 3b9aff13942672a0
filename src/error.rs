//! Error taxonomy for the book pipeline.
//!
//! Each failure class gets its own enum; [`PipelineError`] composes them and
//! is what callers of the orchestrator see. The split that matters at
//! runtime is retryable versus fatal: transient backend conditions, parse
//! failures, and contract violations are retried by the stage runner up to
//! its attempt bound, while template errors, misconfiguration, and
//! cross-stage consistency failures abort immediately. Nothing in this
//! module (or anywhere else) coerces invalid output into validity.

use std::time::Duration;

use thiserror::Error;

use crate::topic::TopicError;
use crate::types::{PipelineState, StageId};
use crate::validation::Violation;

/// Top-level error for pipeline runs.
///
/// Library code returns `PipelineError` and never calls
/// `std::process::exit()`; the CLI maps variants to exit codes.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("topic error: {0}")]
    Topic(#[from] TopicError),

    #[error("research error: {0}")]
    Research(#[from] ResearchError),

    /// Backend construction or misconfiguration before any stage ran.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A stage prompt failed to render. Always a configuration bug; the
    /// runner does not retry these.
    #[error("template error in stage {stage}: {source}")]
    Template {
        stage: StageId,
        #[source]
        source: TemplateError,
    },

    /// A stage exhausted its retry budget or hit a fatal per-attempt error.
    /// Carries the stage, how many attempts were spent, and the last error
    /// (for validation failures, the full violation list).
    #[error("stage {stage} failed after {attempts} attempt(s): {source}")]
    StageFailed {
        stage: StageId,
        attempts: u32,
        #[source]
        source: StageError,
    },

    /// Outputs that each passed their own stage validation do not agree
    /// with each other. Indicates a pipeline bug, not a bad generation, so
    /// it is never retried.
    #[error(
        "cross-stage consistency check failed after {state}: {}",
        join_violations(violations)
    )]
    Inconsistent {
        state: PipelineState,
        violations: Vec<Violation>,
    },

    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// One failed attempt inside a stage run.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The parsed output broke one or more structural contracts. Every
    /// violated constraint is listed, not just the first.
    #[error(
        "output violates {} constraint(s): {}",
        violations.len(),
        join_violations(violations)
    )]
    Validation { violations: Vec<Violation> },
}

impl StageError {
    /// Whether another attempt with the same inputs can reasonably succeed.
    /// Generation is non-deterministic, so parse and validation failures
    /// qualify; backend errors defer to [`BackendError::is_transient`].
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend(err) => err.is_transient(),
            Self::Parse(_) | Self::Validation { .. } => true,
        }
    }
}

/// Text-generation backend failures. The first three are transient and
/// distinguishable so retry policy can treat them individually.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend request timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("backend rate limited: {0}")]
    RateLimited(String),

    /// Bad or missing credentials, malformed requests, unknown providers.
    /// Retrying cannot help.
    #[error("backend misconfigured: {0}")]
    Misconfigured(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Misconfigured(_))
    }
}

/// Prompt template rendering failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("no value bound for placeholder {{{name}}}")]
    MissingVariable { name: String },

    #[error("placeholder name is empty at byte {position}")]
    EmptyPlaceholder { position: usize },

    #[error("unmatched '{{' at byte {position}")]
    UnmatchedOpenBrace { position: usize },

    #[error("unmatched '}}' at byte {position}")]
    UnmatchedCloseBrace { position: usize },
}

/// Backend response text that could not be decoded into a stage's output
/// contract. Snippets are bounded before they get here.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{stage} response contains no JSON object")]
    MissingJson { stage: StageId },

    #[error("{stage} response does not decode as the expected contract: {reason} (got: {snippet:?})")]
    InvalidJson {
        stage: StageId,
        reason: String,
        snippet: String,
    },
}

/// Page-numbering defects found while assembling the final document.
/// Per-stage validation should make these unreachable, which is exactly why
/// they are fatal: hitting one means a cross-stage consistency bug.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("wrong number of content pages: expected {expected}, got {actual}")]
    WrongPageCount { expected: u32, actual: usize },

    #[error("content page {page_number} appears more than once")]
    DuplicatePage { page_number: u32 },

    #[error("content page {page_number} is missing")]
    MissingPage { page_number: u32 },

    #[error("page number {page_number} is outside the content range 1..={last}")]
    PageOutOfRange { page_number: u32, last: u32 },

    #[error("front cover page number is {actual}, expected {expected}")]
    FrontCoverPage { expected: u32, actual: u32 },

    #[error("back cover page number is {actual}, expected {expected}")]
    BackCoverPage { expected: u32, actual: u32 },
}

/// Research source failures.
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("research for {topic:?} is unavailable: {reason}")]
    Unavailable { topic: String, reason: String },

    #[error("research source returned empty text for {topic:?}")]
    Empty { topic: String },

    #[error("research source misconfigured: {0}")]
    Misconfigured(String),
}

/// Artifact persistence failures.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration file {path}: {reason}")]
    InvalidFile { path: String, reason: String },

    #[error("configuration file not found at {path}")]
    NotFound { path: String },

    #[error("invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_transience_split() {
        assert!(BackendError::Unavailable("503".into()).is_transient());
        assert!(
            BackendError::Timeout {
                duration: Duration::from_secs(30)
            }
            .is_transient()
        );
        assert!(BackendError::RateLimited("429".into()).is_transient());
        assert!(!BackendError::Misconfigured("no api key".into()).is_transient());
    }

    #[test]
    fn stage_error_retryability() {
        let parse = StageError::Parse(ParseError::MissingJson {
            stage: StageId::CoverDesign,
        });
        assert!(parse.is_retryable());

        let validation = StageError::Validation {
            violations: vec![Violation::ChapterPageSum {
                expected: 10,
                actual: 9,
            }],
        };
        assert!(validation.is_retryable());

        let fatal = StageError::Backend(BackendError::Misconfigured("bad key".into()));
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn validation_error_enumerates_every_violation() {
        let err = StageError::Validation {
            violations: vec![
                Violation::ChapterPageSum {
                    expected: 10,
                    actual: 9,
                },
                Violation::ChapterNumbering {
                    expected: 2,
                    actual: 3,
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("2 constraint(s)"));
        assert!(message.contains("sum to 9"));
        assert!(message.contains("expected chapter 2"));
    }

    #[test]
    fn stage_failed_reports_stage_and_attempts() {
        let err = PipelineError::StageFailed {
            stage: StageId::ChapterStructure,
            attempts: 3,
            source: StageError::Validation {
                violations: vec![Violation::ChapterPageSum {
                    expected: 10,
                    actual: 9,
                }],
            },
        };
        let message = err.to_string();
        assert!(message.contains("chapter_structure"));
        assert!(message.contains("3 attempt(s)"));
    }

    #[test]
    fn template_error_names_the_placeholder() {
        let err = TemplateError::MissingVariable {
            name: "research".into(),
        };
        assert_eq!(err.to_string(), "no value bound for placeholder {research}");
    }
}
