//! Generation stages.
//!
//! Each stage bundles a persona, prompt templates, template variables,
//! parsing, and validation for one LLM invocation. Stages are plain data
//! holders borrowing their context; the runner drives them through the
//! render-invoke-parse-validate cycle.
//!
//! Prompt templates request a single JSON object whose field names match the
//! serde structs in [`crate::types`], so parsing is one `serde_json` decode
//! after the JSON body is located in the raw reply.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::ParseError;
use crate::template::TemplateVars;
use crate::topic::TopicName;
use crate::types::{
    BACK_COVER_PAGE_NUMBER, ChapterDefinition, ChapterPlan, ConceptBatch, ContentPage, CoverPair,
    PageConcept, ResearchInput, StageId, StoryOutline, front_cover_text,
};
use crate::validation::{self, Violation};

/// Fixed writing persona for a stage. Personas are static configuration;
/// they are not generated or negotiated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    /// Short name used in logs.
    pub name: &'static str,
    /// How the persona is introduced in the system prompt.
    pub voice: &'static str,
}

pub const STORYTELLER: Persona = Persona {
    name: "storyteller",
    voice: "a national park storyteller and children's book narrative expert",
};

pub const EDITOR: Persona = Persona {
    name: "editor",
    voice: "a children's book editor who excels at organizing narratives",
};

pub const PLANNER: Persona = Persona {
    name: "planner",
    voice: "a creative planner for children's books",
};

pub const COVER_DESIGNER: Persona = Persona {
    name: "cover-designer",
    voice: "a cover designer for toddler board books",
};

pub const AUTHOR: Persona = Persona {
    name: "author",
    voice: "a children's book author writing for very young readers",
};

/// One generation stage: everything the runner needs to build the prompt,
/// decode the reply, and judge it.
pub trait Stage {
    type Output: DeserializeOwned;

    fn id(&self) -> StageId;

    fn persona(&self) -> Persona;

    fn system_template(&self) -> &'static str;

    fn user_template(&self) -> &'static str;

    /// Variable bindings for both templates.
    fn vars(&self) -> TemplateVars;

    /// Decode the raw reply. The default locates the JSON body and decodes
    /// it with serde.
    fn parse(&self, raw: &str) -> Result<Self::Output, ParseError> {
        decode(self.id(), raw)
    }

    /// Every constraint the output violates; empty means accepted.
    fn validate(&self, output: &Self::Output) -> Vec<Violation>;
}

/// Matches a fenced code block holding a JSON object.
static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("JSON_FENCE regex is valid")
});

/// Locate the JSON object in a raw model reply. Prefers a fenced block;
/// otherwise takes the span from the first `{` to the last `}`.
fn extract_json(raw: &str) -> Option<&str> {
    if let Some(captures) = JSON_FENCE.captures(raw) {
        return captures.get(1).map(|m| m.as_str());
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

const SNIPPET_MAX_CHARS: usize = 160;

fn snippet_of(text: &str) -> String {
    if text.chars().count() <= SNIPPET_MAX_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
    format!("{cut}…")
}

/// Decode a model reply into `T`, reporting what was found when it fails.
pub fn decode<T: DeserializeOwned>(stage: StageId, raw: &str) -> Result<T, ParseError> {
    let candidate = extract_json(raw).ok_or(ParseError::MissingJson { stage })?;
    serde_json::from_str(candidate).map_err(|e| ParseError::InvalidJson {
        stage,
        reason: e.to_string(),
        snippet: snippet_of(candidate),
    })
}

/// Appended to every rendered system prompt by the runner, which owns the
/// parse step and therefore the response contract.
pub(crate) const JSON_RESPONSE_RULES: &str = "\n\nRespond with a single JSON object and nothing \
else: no prose before or after it, and exactly the field names requested.";

// ---------------------------------------------------------------------------
// Narrative outline

const OUTLINE_SYSTEM: &str = "You are a national park storyteller and children's book \
narrative expert. Create a high-level story outline for a toddler's board book (ages 2-5) \
about the given national park. Use the simplest possible language, favor clear bold \
imagery, and never include people as characters.";

const OUTLINE_USER: &str = r#"Create an inspiring, educational story outline for a children's book about {park_name} National Park.

Research:
{research}

The outline should:
1. Showcase the park's unique natural features and what makes them valuable.
2. Move through a clear beginning, middle, and end that reveals the park's wonder.
3. Let the park and its natural elements tell the story, with no people as characters.

Respond with:
{{"narrative_flow": "<the story progression>", "key_themes": ["<theme>", "<theme>"]}}"#;

/// Produces the story outline from topic and research.
pub struct OutlineStage<'a> {
    pub topic: &'a TopicName,
    pub research: &'a ResearchInput,
}

impl Stage for OutlineStage<'_> {
    type Output = StoryOutline;

    fn id(&self) -> StageId {
        StageId::NarrativeOutline
    }

    fn persona(&self) -> Persona {
        STORYTELLER
    }

    fn system_template(&self) -> &'static str {
        OUTLINE_SYSTEM
    }

    fn user_template(&self) -> &'static str {
        OUTLINE_USER
    }

    fn vars(&self) -> TemplateVars {
        TemplateVars::new()
            .set("park_name", self.topic.display())
            .set("research", &self.research.body)
    }

    fn validate(&self, output: &Self::Output) -> Vec<Violation> {
        validation::validate_outline(output)
    }
}

// ---------------------------------------------------------------------------
// Chapter structure

const CHAPTERS_SYSTEM: &str = "You are a children's book editor who excels at organizing \
narratives. Divide a story into chapters for a fixed-length children's book about a \
national park. Each chapter covers one distinct aspect of the park's natural features, \
such as landmarks, wildlife, or geology.";

const CHAPTERS_USER: &str = r#"Create the chapter structure for a {target_page_count}-page children's book about {park_name} National Park, following this narrative flow:
"{narrative_flow}"

Key themes: {key_themes}

Research:
{research}

For each chapter:
1. Give it a theme drawn from the park's natural wonders (e.g. "Majestic Mountains").
2. List 2-4 key elements (landmarks, animals, plants) supporting the theme.
3. Set page_count to the exact number of pages the chapter gets.
4. Number chapters sequentially starting at 1, in reading order.
5. No people as characters.

IMPORTANT: the page_count values MUST sum to EXACTLY {target_page_count}. Count carefully before answering.

Respond with:
{{"chapters": [{{"chapter_number": 1, "theme": "<theme>", "key_elements": ["<element>"], "page_count": 2}}]}}"#;

/// Breaks the outline into chapters whose page counts sum to the budget.
pub struct ChapterStage<'a> {
    pub topic: &'a TopicName,
    pub research: &'a ResearchInput,
    pub outline: &'a StoryOutline,
    pub target_page_count: u32,
}

impl Stage for ChapterStage<'_> {
    type Output = ChapterPlan;

    fn id(&self) -> StageId {
        StageId::ChapterStructure
    }

    fn persona(&self) -> Persona {
        EDITOR
    }

    fn system_template(&self) -> &'static str {
        CHAPTERS_SYSTEM
    }

    fn user_template(&self) -> &'static str {
        CHAPTERS_USER
    }

    fn vars(&self) -> TemplateVars {
        TemplateVars::new()
            .set("park_name", self.topic.display())
            .set("research", &self.research.body)
            .set("narrative_flow", &self.outline.narrative_flow)
            .set("key_themes", self.outline.key_themes.join(", "))
            .set("target_page_count", self.target_page_count.to_string())
    }

    fn validate(&self, output: &Self::Output) -> Vec<Violation> {
        validation::validate_chapters(&output.chapters)
    }
}

// ---------------------------------------------------------------------------
// Page concepts (one chapter at a time)

const CONCEPTS_SYSTEM: &str = "You are a creative planner for children's books. Develop \
specific page concepts for one chapter of a children's book about a national park. Each \
concept states exactly what appears on that page, centered on nature and wildlife, never \
people.";

const CONCEPTS_USER: &str = r#"Create page concepts for chapter {chapter_number} ("{chapter_theme}") of a children's book about {park_name} National Park.

Key elements to feature: {key_elements}

This chapter covers pages {first_page} through {last_page} ({page_count} pages). For each page provide:
1. "subject": the specific thing on the page (e.g. "Elk grazing in a meadow").
2. "core_idea": what the page should convey and why the subject is special.

Research:
{research}

Produce exactly {page_count} concepts, numbered {first_page} through {last_page} in order, each with chapter_number {chapter_number}. No people.

Respond with:
{{"concepts": [{{"page_number": {first_page}, "chapter_number": {chapter_number}, "subject": "<subject>", "core_idea": "<idea>"}}]}}"#;

/// Produces the page concepts for one chapter's page range.
pub struct ConceptStage<'a> {
    pub topic: &'a TopicName,
    pub research: &'a ResearchInput,
    pub chapter: &'a ChapterDefinition,
    /// First page number assigned to this chapter.
    pub first_page: u32,
}

impl ConceptStage<'_> {
    fn last_page(&self) -> u32 {
        self.first_page + self.chapter.page_count.saturating_sub(1)
    }
}

impl Stage for ConceptStage<'_> {
    type Output = ConceptBatch;

    fn id(&self) -> StageId {
        StageId::PageConcepts
    }

    fn persona(&self) -> Persona {
        PLANNER
    }

    fn system_template(&self) -> &'static str {
        CONCEPTS_SYSTEM
    }

    fn user_template(&self) -> &'static str {
        CONCEPTS_USER
    }

    fn vars(&self) -> TemplateVars {
        TemplateVars::new()
            .set("park_name", self.topic.display())
            .set("research", &self.research.body)
            .set("chapter_number", self.chapter.chapter_number.to_string())
            .set("chapter_theme", &self.chapter.theme)
            .set("key_elements", self.chapter.key_elements.join(", "))
            .set("page_count", self.chapter.page_count.to_string())
            .set("first_page", self.first_page.to_string())
            .set("last_page", self.last_page().to_string())
    }

    fn validate(&self, output: &Self::Output) -> Vec<Violation> {
        validation::validate_concepts_for_chapter(self.chapter, self.first_page, &output.concepts)
    }
}

// ---------------------------------------------------------------------------
// Cover design

const COVER_SYSTEM: &str = "You are a cover designer for toddler board books. Design \
eye-catching front and back covers with bold colors, simple shapes, and clear focal \
points that grab a young child's attention instantly.";

const COVER_USER: &str = r#"Design the front and back covers for a toddler's board book about {park_name} National Park.

Research:
{research}

Guidelines:
1. Each cover illustration shows an iconic scene with 1-2 instantly recognizable elements, vibrant saturated colors, and bold outlines. An animal or natural element may act as the "character" of the book. No people. Each illustration description must be at least 30 words.
2. The front cover text must be exactly "{front_cover_text}".
3. The back cover text is a very brief summary, fewer than 15 words, of why the park is special.
4. The front cover is page 0; the back cover is page {back_cover_page}.

Respond with:
{{"front_cover": {{"page_number": 0, "illustration_description": "<scene>", "text": "{front_cover_text}"}},
 "back_cover": {{"page_number": {back_cover_page}, "illustration_description": "<scene>", "text": "<summary>"}}}}"#;

/// Produces both covers in a single invocation.
pub struct CoverStage<'a> {
    pub topic: &'a TopicName,
    pub research: &'a ResearchInput,
}

impl Stage for CoverStage<'_> {
    type Output = CoverPair;

    fn id(&self) -> StageId {
        StageId::CoverDesign
    }

    fn persona(&self) -> Persona {
        COVER_DESIGNER
    }

    fn system_template(&self) -> &'static str {
        COVER_SYSTEM
    }

    fn user_template(&self) -> &'static str {
        COVER_USER
    }

    fn vars(&self) -> TemplateVars {
        TemplateVars::new()
            .set("park_name", self.topic.display())
            .set("research", &self.research.body)
            .set("front_cover_text", front_cover_text(self.topic.display()))
            .set("back_cover_page", BACK_COVER_PAGE_NUMBER.to_string())
    }

    fn validate(&self, output: &Self::Output) -> Vec<Violation> {
        validation::validate_cover_pair(self.topic.display(), output)
    }
}

// ---------------------------------------------------------------------------
// Page writing (one page at a time)

const PAGE_SYSTEM: &str = "You are a children's book author writing for very young readers \
(ages 2-5). Write the text and illustration description for a single page of a toddler's \
board book about a national park. Text stays under a dozen words; illustrations are \
vibrant and simple with bold outlines and a clear focal point.";

const PAGE_USER: &str = r#"Write page {page_number} of a toddler's board book about {park_name} National Park.

Subject: {subject}
Core idea: {core_idea}

The book's covers are already designed; keep the page art consistent with them.
Front cover art: {front_cover_illustration}
Back cover art: {back_cover_illustration}

Research:
{research}

Guidelines:
1. "text": no more than 12 words, rhythmic and simple enough for a toddler.
2. "illustration_description": MUST start with exactly "{subject}", then describe the scene in at least 30 words with bright high-contrast colors, 1-2 bold focal elements, and a perspective that delights a young child. No people.

Respond with:
{{"page_number": {page_number}, "text": "<short line>", "illustration_description": "{subject} <rest of scene>"}}"#;

/// Writes one content page from its concept.
pub struct PageStage<'a> {
    pub topic: &'a TopicName,
    pub research: &'a ResearchInput,
    pub concept: &'a PageConcept,
    pub covers: &'a CoverPair,
}

impl Stage for PageStage<'_> {
    type Output = ContentPage;

    fn id(&self) -> StageId {
        StageId::PageWriting
    }

    fn persona(&self) -> Persona {
        AUTHOR
    }

    fn system_template(&self) -> &'static str {
        PAGE_SYSTEM
    }

    fn user_template(&self) -> &'static str {
        PAGE_USER
    }

    fn vars(&self) -> TemplateVars {
        TemplateVars::new()
            .set("park_name", self.topic.display())
            .set("research", &self.research.body)
            .set("page_number", self.concept.page_number.to_string())
            .set("subject", &self.concept.subject)
            .set("core_idea", &self.concept.core_idea)
            .set(
                "front_cover_illustration",
                &self.covers.front_cover.illustration_description,
            )
            .set(
                "back_cover_illustration",
                &self.covers.back_cover.illustration_description,
            )
    }

    fn validate(&self, output: &Self::Output) -> Vec<Violation> {
        validation::validate_content_page(self.concept, output)
    }
}
