//! Pipeline orchestration.
//!
//! Drives the fixed state sequence Planning -> CoverDesign ->
//! ContentWriting -> Assembling -> Done. Each state either completes fully
//! or the run fails; there is no partial progression and no artifact is
//! produced by a failed run. Planning itself is three runner passes (the
//! outline, the chapter split, then one concept batch per chapter) followed
//! by a whole-plan consistency gate.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use tracing::info;

use crate::assembly;
use crate::error::{PipelineError, SinkError};
use crate::runner::StageRunner;
use crate::stages::{ChapterStage, ConceptStage, CoverStage, OutlineStage, PageStage};
use crate::topic::TopicName;
use crate::types::{
    BookDocument, CONTENT_PAGE_COUNT, CoverPair, PipelineState, PlanningOutput,
    RECEIPT_SCHEMA_VERSION, ResearchInput, RunReceipt, StageId,
};
use crate::validation;

/// A completed run: the document plus the receipt describing how it was
/// produced. Persisting both is the caller's job.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub document: BookDocument,
    pub receipt: RunReceipt,
}

pub struct Pipeline {
    runner: StageRunner,
}

impl Pipeline {
    pub fn new(runner: StageRunner) -> Self {
        Self { runner }
    }

    /// Generate a complete book document for the topic.
    pub async fn run(
        &self,
        topic: &TopicName,
        research: &ResearchInput,
    ) -> Result<RunOutcome, PipelineError> {
        let started = Instant::now();
        let mut stage_attempts: BTreeMap<String, u32> = BTreeMap::new();

        info!(topic = %topic, state = %PipelineState::Planning, "entering state");
        let plan = self.plan(topic, research, &mut stage_attempts).await?;

        info!(topic = %topic, state = %PipelineState::CoverDesign, "entering state");
        let covers = self.design_covers(topic, research, &mut stage_attempts).await?;

        info!(topic = %topic, state = %PipelineState::ContentWriting, "entering state");
        let pages = self
            .write_pages(topic, research, &plan, &covers, &mut stage_attempts)
            .await?;

        info!(topic = %topic, state = %PipelineState::Assembling, "entering state");
        let document = assembly::assemble(topic, covers, pages)?;

        let json = serde_json::to_string_pretty(&document).map_err(SinkError::from)?;
        let receipt = RunReceipt {
            schema_version: RECEIPT_SCHEMA_VERSION,
            topic: topic.display().to_string(),
            topic_key: topic.storage_key(),
            provider: self.runner.backend_name().to_string(),
            model: self.runner.model().to_string(),
            stage_attempts,
            duration_ms: started.elapsed().as_millis() as u64,
            document_blake3: blake3::hash(json.as_bytes()).to_hex().to_string(),
            created_at: Utc::now(),
        };

        info!(topic = %topic, state = %PipelineState::Done, "entering state");
        Ok(RunOutcome { document, receipt })
    }

    async fn plan(
        &self,
        topic: &TopicName,
        research: &ResearchInput,
        stage_attempts: &mut BTreeMap<String, u32>,
    ) -> Result<PlanningOutput, PipelineError> {
        let outline_stage = OutlineStage { topic, research };
        let outline = self.runner.run(topic, &outline_stage).await?;
        record(stage_attempts, StageId::NarrativeOutline, outline.attempts);

        let chapter_stage = ChapterStage {
            topic,
            research,
            outline: &outline.output,
            target_page_count: CONTENT_PAGE_COUNT,
        };
        let chapters = self.runner.run(topic, &chapter_stage).await?;
        record(stage_attempts, StageId::ChapterStructure, chapters.attempts);

        let mut concepts = Vec::with_capacity(CONTENT_PAGE_COUNT as usize);
        let mut first_page = 1u32;
        for chapter in &chapters.output.chapters {
            let concept_stage = ConceptStage {
                topic,
                research,
                chapter,
                first_page,
            };
            let batch = self.runner.run(topic, &concept_stage).await?;
            record(stage_attempts, StageId::PageConcepts, batch.attempts);
            concepts.extend(batch.output.concepts);
            first_page += chapter.page_count;
        }

        let plan = PlanningOutput {
            outline: outline.output,
            chapters: chapters.output.chapters,
            concepts,
        };

        // Each piece validated on arrival; this gate catches anything that
        // only shows up across pieces.
        let violations = validation::validate_plan(&plan);
        if !violations.is_empty() {
            return Err(PipelineError::Inconsistent {
                state: PipelineState::Planning,
                violations,
            });
        }

        Ok(plan)
    }

    async fn design_covers(
        &self,
        topic: &TopicName,
        research: &ResearchInput,
        stage_attempts: &mut BTreeMap<String, u32>,
    ) -> Result<CoverPair, PipelineError> {
        let stage = CoverStage { topic, research };
        let covers = self.runner.run(topic, &stage).await?;
        record(stage_attempts, StageId::CoverDesign, covers.attempts);
        Ok(covers.output)
    }

    async fn write_pages(
        &self,
        topic: &TopicName,
        research: &ResearchInput,
        plan: &PlanningOutput,
        covers: &CoverPair,
        stage_attempts: &mut BTreeMap<String, u32>,
    ) -> Result<Vec<crate::types::ContentPage>, PipelineError> {
        let mut pages = Vec::with_capacity(plan.concepts.len());
        for concept in &plan.concepts {
            let stage = PageStage {
                topic,
                research,
                concept,
                covers,
            };
            let page = self.runner.run(topic, &stage).await?;
            record(stage_attempts, StageId::PageWriting, page.attempts);
            pages.push(page.output);
        }
        Ok(pages)
    }
}

/// Attempts accumulate per stage id: stages invoked repeatedly (concepts,
/// pages) report the total across invocations.
fn record(stage_attempts: &mut BTreeMap<String, u32>, stage: StageId, attempts: u32) {
    *stage_attempts.entry(stage.as_str().to_string()).or_insert(0) += attempts;
}
