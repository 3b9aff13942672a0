//! Stage contracts for the book pipeline.
//!
//! Every structural object exchanged between stages is defined here, along
//! with the fixed page-number and word-count constants the validators
//! enforce. These shapes are a stable contract: `BookDocument` is persisted
//! as-is and consumed by downstream tooling (e.g. an illustration renderer),
//! so field names and nesting must not drift.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of content pages in every book. Covers are extra.
pub const CONTENT_PAGE_COUNT: u32 = 10;

/// Front cover page number, fixed.
pub const FRONT_COVER_PAGE_NUMBER: u32 = 0;

/// Back cover page number, fixed: one past the last content page.
pub const BACK_COVER_PAGE_NUMBER: u32 = CONTENT_PAGE_COUNT + 1;

/// Upper bound on words per content page. Pre-readers get short sentences.
pub const PAGE_TEXT_MAX_WORDS: usize = 12;

/// Lower bound on words in any illustration description.
pub const ILLUSTRATION_MIN_WORDS: usize = 30;

/// Back cover text must stay strictly under this many words.
pub const BACK_COVER_WORD_LIMIT: usize = 15;

/// Current `RunReceipt` schema version.
pub const RECEIPT_SCHEMA_VERSION: u32 = 1;

/// The exact front-cover text required for a topic. Byte-for-byte; the
/// validator rejects anything else rather than rewriting it.
pub fn front_cover_text(topic_name: &str) -> String {
    format!("{topic_name} National Park")
}

/// Raw research text about one topic, supplied once at pipeline start and
/// read by every stage. Opaque to the pipeline beyond a non-empty check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchInput {
    pub body: String,
}

impl ResearchInput {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// Narrative skeleton produced by the outline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryOutline {
    /// Beginning/middle/end description of the book's arc.
    pub narrative_flow: String,
    /// Ordered themes the chapters elaborate.
    pub key_themes: Vec<String>,
}

/// One chapter of the plan. Chapter numbering is contiguous from 1 and the
/// `page_count` values across a plan sum to [`CONTENT_PAGE_COUNT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDefinition {
    pub chapter_number: u32,
    pub theme: String,
    pub key_elements: Vec<String>,
    pub page_count: u32,
}

/// Planner output wrapper for the chapter-structure stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPlan {
    pub chapters: Vec<ChapterDefinition>,
}

/// Planned specification for one content page. `subject` is the literal
/// string the finished page's illustration description must start with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConcept {
    pub page_number: u32,
    pub chapter_number: u32,
    pub subject: String,
    pub core_idea: String,
}

/// Planner output wrapper for one chapter's page-concept batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptBatch {
    pub concepts: Vec<PageConcept>,
}

/// Everything the planning state produces, threaded into later stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningOutput {
    pub outline: StoryOutline,
    pub chapters: Vec<ChapterDefinition>,
    pub concepts: Vec<PageConcept>,
}

/// One cover. The front cover carries page number 0 and an exact required
/// text; the back cover carries page number 11 and a short blurb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverSpec {
    pub page_number: u32,
    pub illustration_description: String,
    pub text: String,
}

/// Output of the cover-design stage: both covers, produced together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverPair {
    pub front_cover: CoverSpec,
    pub back_cover: CoverSpec,
}

/// One finished content page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPage {
    pub page_number: u32,
    pub text: String,
    pub illustration_description: String,
}

/// The final assembled artifact. Never mutated after assembly; re-running
/// the pipeline re-derives it from scratch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDocument {
    pub park_name: String,
    pub front_cover: CoverSpec,
    /// Exactly [`CONTENT_PAGE_COUNT`] pages, sorted ascending by page number.
    pub pages: Vec<ContentPage>,
    pub back_cover: CoverSpec,
}

/// Identifies one runner-level generation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    NarrativeOutline,
    ChapterStructure,
    PageConcepts,
    CoverDesign,
    PageWriting,
}

impl StageId {
    /// Returns the string representation of the stage
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NarrativeOutline => "narrative_outline",
            Self::ChapterStructure => "chapter_structure",
            Self::PageConcepts => "page_concepts",
            Self::CoverDesign => "cover_design",
            Self::PageWriting => "page_writing",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator states. Linear on the happy path; `Failed` is reachable
/// from any generation or assembly state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Planning,
    CoverDesign,
    ContentWriting,
    Assembling,
    Done,
    Failed,
}

impl PipelineState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::CoverDesign => "cover_design",
            Self::ContentWriting => "content_writing",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one successful pipeline run, persisted next to the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReceipt {
    pub schema_version: u32,
    pub topic: String,
    pub topic_key: String,
    pub provider: String,
    pub model: String,
    /// Total backend attempts per stage id, retries included.
    pub stage_attempts: BTreeMap<String, u32>,
    pub duration_ms: u64,
    /// Blake3 hex digest of the persisted document JSON.
    pub document_blake3: String,
    pub created_at: DateTime<Utc>,
}
