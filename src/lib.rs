//! parkbook - Staged generation of validated children's books about national parks
//!
//! This crate turns free-form research text about a national park into a
//! fixed-length illustrated children's book through a structured, validated
//! pipeline: planning, cover design, content writing, and assembly.
//!
//! parkbook can be used in two ways:
//! - **CLI**: Run `parkbook generate` from the command line
//! - **Library**: Add as a dependency and drive [`Pipeline`] directly
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Generate a book from a local research file
//! parkbook generate "Yellowstone" --research-file notes/yellowstone.txt
//!
//! # Re-validate a generated document
//! parkbook check books/yellowstone/content/book.json
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use parkbook::config::Config;
//! use parkbook::llm::build_backend;
//! use parkbook::orchestrator::Pipeline;
//! use parkbook::research::build_research_source;
//! use parkbook::runner::{RetryPolicy, StageRunner};
//! use parkbook::topic::TopicName;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::discover(None)?;
//!     let topic = TopicName::new("Yellowstone")?;
//!     let research = build_research_source(&config)?.research(&topic).await?;
//!
//!     let runner = StageRunner::new(
//!         build_backend(&config)?,
//!         config.model(),
//!         config.request_timeout(),
//!         RetryPolicy {
//!             max_attempts: config.max_attempts(),
//!             base_delay: config.retry_base_delay(),
//!             max_delay: config.retry_max_delay(),
//!         },
//!     );
//!     let outcome = Pipeline::new(runner).run(&topic, &research).await?;
//!     println!("generated \"{}\"", outcome.document.park_name);
//!     Ok(())
//! }
//! ```
//!
//! # Pipeline Shape
//!
//! Every book has exactly one front cover, ten content pages, and one back
//! cover. Each generation stage renders a prompt, invokes the text backend,
//! parses the reply as JSON, and validates it against the layout constraints;
//! rejected output is retried with the violations quoted back to the model.
//! Retry exhaustion fails the run, and nothing is written to disk unless the
//! whole document assembles cleanly.

pub mod assembly;
pub mod cli;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod research;
pub mod runner;
pub mod sink;
pub mod stages;
pub mod template;
pub mod topic;
pub mod types;
pub mod validation;

/// Hierarchical configuration with discovery and precedence:
/// CLI arguments > config file > built-in defaults.
pub use config::Config;

/// Pipeline error type with exit code mapping via
/// [`to_exit_code()`](error::PipelineError::to_exit_code).
///
/// Library code returns `PipelineError` and does NOT call `std::process::exit()`.
pub use error::PipelineError;

/// Exit codes matching the documented exit code table.
///
/// Use named constants (e.g., [`ExitCode::SUCCESS`], [`ExitCode::PROVIDER_FAILURE`])
/// or [`as_i32()`](ExitCode::as_i32) to get the numeric value.
pub use exit_codes::ExitCode;

/// The staged generation pipeline and its result.
pub use orchestrator::{Pipeline, RunOutcome};

/// Atomic persistence of finished books and their run receipts.
pub use sink::BookSink;

/// Validated park name, also the storage key for persisted artifacts.
pub use topic::TopicName;

/// The assembled document: front cover, ten pages, back cover.
pub use types::BookDocument;
