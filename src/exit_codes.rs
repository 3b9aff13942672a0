//! Exit code constants and the error-to-exit-code mapping.
//!
//! Each failure mode maps to a stable process exit code so wrapper scripts
//! can branch on outcomes without parsing stderr.

use crate::error::{BackendError, PipelineError, ResearchError, StageError};

/// Process exit code with named constants for every failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Operation completed successfully.
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Generation or verification failed: a stage exhausted its retry
    /// budget on parse/validation errors, assembly found an inconsistent
    /// document, or the artifact could not be written.
    pub const FAILURE: ExitCode = ExitCode(1);

    /// Invalid command-line arguments or configuration.
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// A stage gave up with a backend timeout as its last error.
    pub const STAGE_TIMEOUT: ExitCode = ExitCode(10);

    /// The text backend or research provider failed after retries.
    pub const PROVIDER_FAILURE: ExitCode = ExitCode(70);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

/// Raw exit code constants for callers that work with plain `i32`.
pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const CLI_ARGS: i32 = 2;
    pub const STAGE_TIMEOUT: i32 = 10;
    pub const PROVIDER_FAILURE: i32 = 70;
}

impl PipelineError {
    /// Map this error to its process exit code.
    ///
    /// Setup problems (config, topic, templates, misconfigured providers)
    /// are caller errors; an exhausted stage is classified by the last
    /// error it saw, so a run that kept timing out exits differently from
    /// one that kept producing invalid output.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            PipelineError::Config(_) | PipelineError::Topic(_) | PipelineError::Template { .. } => {
                ExitCode::CLI_ARGS
            }

            PipelineError::Backend(backend) | PipelineError::StageFailed {
                source: StageError::Backend(backend),
                ..
            } => match backend {
                BackendError::Misconfigured(_) => ExitCode::CLI_ARGS,
                BackendError::Timeout { .. } => ExitCode::STAGE_TIMEOUT,
                BackendError::Unavailable(_) | BackendError::RateLimited(_) => {
                    ExitCode::PROVIDER_FAILURE
                }
            },

            PipelineError::Research(ResearchError::Misconfigured(_)) => ExitCode::CLI_ARGS,
            PipelineError::Research(_) => ExitCode::PROVIDER_FAILURE,

            PipelineError::StageFailed { .. }
            | PipelineError::Inconsistent { .. }
            | PipelineError::Assembly(_)
            | PipelineError::Sink(_) => ExitCode::FAILURE,
        }
    }
}
