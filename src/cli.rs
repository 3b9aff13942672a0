//! Command-line interface.
//!
//! `run()` owns all terminal output. `main.rs` only converts the returned
//! exit code into a process exit, so every user-facing message lives here.

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::Config;
use crate::exit_codes::ExitCode;
use crate::llm::build_backend;
use crate::logging::init_tracing;
use crate::orchestrator::Pipeline;
use crate::research::build_research_source;
use crate::runner::{RetryPolicy, StageRunner};
use crate::sink::{load_document, BookSink};
use crate::topic::TopicName;
use crate::validation::validate_document;

#[derive(Parser)]
#[command(name = "parkbook")]
#[command(about = "Generate validated picture books about national parks")]
#[command(long_about = r#"parkbook turns free-form research text about a national park into a
fixed-length illustrated children's book: a front cover, ten content
pages, and a back cover, generated stage by stage and checked against
hard layout constraints before anything is written to disk.

EXAMPLES:
  # Generate a book from a local research file
  parkbook generate "Yellowstone" --research-file notes/yellowstone.txt

  # Generate with research fetched from Perplexity Sonar (PPLX_API_KEY)
  parkbook generate "Great Smoky Mountains"

  # Resolve configuration and research, then stop before generating
  parkbook generate "Yosemite" --research-file notes/yosemite.txt --dry-run

  # Replay canned replies instead of calling a live model
  parkbook generate "Yellowstone" --backend scripted \
      --script fixtures/replies.json --research-file notes/yellowstone.txt

  # Re-validate a previously generated document
  parkbook check books/yellowstone/content/book.json

CONFIGURATION:
  Settings resolve with precedence: CLI flags > parkbook.toml > built-in
  defaults. Pass --config to name an explicit file. API keys are read
  from the environment (ANTHROPIC_API_KEY, PPLX_API_KEY by default),
  never from the configuration file.

STAGES:
  Planning -> Cover design -> Content writing -> Assembly
  Each stage's output is validated on arrival; rejected output is
  retried with the violations quoted back to the model, and retry
  exhaustion fails the whole run without leaving a partial book behind."#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (default: parkbook.toml in the working directory)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Model used for generation calls
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a complete book for one park
    Generate {
        /// Park name, e.g. "Yellowstone" or "Great Smoky Mountains"
        topic: String,

        /// Read research from a local file instead of the research provider
        #[arg(long)]
        research_file: Option<Utf8PathBuf>,

        /// Root directory for finished books
        #[arg(long)]
        out_dir: Option<Utf8PathBuf>,

        /// Text backend: anthropic or scripted
        #[arg(long)]
        backend: Option<String>,

        /// Reply script for the scripted backend
        #[arg(long)]
        script: Option<Utf8PathBuf>,

        /// Attempt bound per generation stage
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_attempts: Option<u32>,

        /// Resolve configuration and research, then stop before generating
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a previously generated book document
    Check {
        /// Path to a book.json produced by `generate`
        path: Utf8PathBuf,
    },
}

/// CLI entry point. Handles all output; the caller only exits with the code.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("✗ Failed to initialize logging: {e}");
        return Err(ExitCode::FAILURE);
    }

    let mut config = match Config::discover(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("✗ {err}");
            return Err(ExitCode::CLI_ARGS);
        }
    };
    if cli.model.is_some() {
        config.llm.model = cli.model.clone();
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::FAILURE);
        }
    };

    rt.block_on(async {
        match cli.command {
            Commands::Generate {
                topic,
                research_file,
                out_dir,
                backend,
                script,
                max_attempts,
                dry_run,
            } => {
                apply_overrides(
                    &mut config,
                    research_file,
                    out_dir,
                    backend,
                    script,
                    max_attempts,
                )?;
                generate(&config, &topic, dry_run).await
            }
            Commands::Check { path } => check(&path),
        }
    })
}

/// Folds `generate` flags into the loaded config, then re-validates so a
/// bad flag value fails exactly like a bad file value.
fn apply_overrides(
    config: &mut Config,
    research_file: Option<Utf8PathBuf>,
    out_dir: Option<Utf8PathBuf>,
    backend: Option<String>,
    script: Option<Utf8PathBuf>,
    max_attempts: Option<u32>,
) -> Result<(), ExitCode> {
    if research_file.is_some() {
        config.research.file = research_file;
    }
    if out_dir.is_some() {
        config.book.out_dir = out_dir;
    }
    if backend.is_some() {
        config.llm.provider = backend;
    }
    if let Some(script) = script {
        config.llm.scripted.get_or_insert_with(Default::default).script = Some(script);
    }
    if max_attempts.is_some() {
        config.llm.max_attempts = max_attempts;
    }

    if let Err(err) = config.validate() {
        eprintln!("✗ {err}");
        return Err(ExitCode::CLI_ARGS);
    }
    Ok(())
}

async fn generate(config: &Config, topic: &str, dry_run: bool) -> Result<(), ExitCode> {
    let topic = match TopicName::new(topic) {
        Ok(topic) => topic,
        Err(err) => {
            eprintln!("✗ {err}");
            return Err(ExitCode::CLI_ARGS);
        }
    };

    let source = match build_research_source(config) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("✗ {err}");
            return Err(err.to_exit_code());
        }
    };
    let research = match source.research(&topic).await {
        Ok(research) => research,
        Err(err) => {
            eprintln!("✗ Research failed: {err}");
            return Err(crate::error::PipelineError::from(err).to_exit_code());
        }
    };
    debug!(
        topic = %topic,
        research_bytes = research.body.len(),
        "research resolved"
    );

    if dry_run {
        println!("✓ Dry run for \"{}\"", topic.display());
        println!("  Backend:   {} ({})", provider_label(config), config.model());
        println!("  Research:  {} bytes", research.body.len());
        println!("  Output:    {}", BookSink::new(config.out_dir()).document_path(&topic));
        return Ok(());
    }

    let backend = match build_backend(config) {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("✗ {err}");
            return Err(err.to_exit_code());
        }
    };
    let runner = StageRunner::new(
        backend,
        config.model(),
        config.request_timeout(),
        RetryPolicy {
            max_attempts: config.max_attempts(),
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
        },
    );

    let outcome = match Pipeline::new(runner).run(&topic, &research).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("✗ {err}");
            return Err(err.to_exit_code());
        }
    };

    let sink = BookSink::new(config.out_dir());
    let document_path = match sink.write_document(&topic, &outcome.document) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("✗ {err}");
            return Err(ExitCode::FAILURE);
        }
    };
    let receipt_path = match sink.write_receipt(&topic, &outcome.receipt) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("✗ {err}");
            return Err(ExitCode::FAILURE);
        }
    };

    println!(
        "✓ Generated \"{}\" ({} pages + covers)",
        outcome.document.park_name,
        outcome.document.pages.len()
    );
    println!("  Document: {document_path}");
    println!("  Receipt:  {receipt_path}");
    Ok(())
}

fn check(path: &Utf8Path) -> Result<(), ExitCode> {
    let document = match load_document(path) {
        Ok(document) => document,
        Err(err) => {
            eprintln!("✗ {err}");
            return Err(ExitCode::FAILURE);
        }
    };

    let violations = validate_document(&document);
    if violations.is_empty() {
        println!("✓ {path}: valid book for \"{}\"", document.park_name);
        Ok(())
    } else {
        eprintln!("✗ {path}: {} constraint violation(s)", violations.len());
        for violation in &violations {
            eprintln!("  - {violation}");
        }
        Err(ExitCode::FAILURE)
    }
}

fn provider_label(config: &Config) -> &'static str {
    match config.provider() {
        Ok(crate::config::Provider::Anthropic) => "anthropic",
        Ok(crate::config::Provider::Scripted) => "scripted",
        Err(_) => "unknown",
    }
}
