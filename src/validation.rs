//! Structural contract validation.
//!
//! One validator per stage output, each returning every violated constraint
//! rather than stopping at the first. The runner turns a non-empty result
//! into a retryable stage error; the `check` command reuses
//! [`validate_document`] against persisted artifacts. Validators never
//! repair their input.

use thiserror::Error;

use crate::types::{
    BACK_COVER_PAGE_NUMBER, BACK_COVER_WORD_LIMIT, BookDocument, ChapterDefinition, ContentPage,
    CONTENT_PAGE_COUNT, CoverPair, FRONT_COVER_PAGE_NUMBER, ILLUSTRATION_MIN_WORDS,
    PAGE_TEXT_MAX_WORDS, PageConcept, PlanningOutput, StoryOutline, front_cover_text,
};

/// A single violated constraint, with the observed values. The Display
/// implementation is the constraint's user-facing name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("narrative flow is empty")]
    EmptyNarrativeFlow,

    #[error("outline lists no key themes")]
    NoKeyThemes,

    #[error("key theme {index} is blank")]
    BlankKeyTheme { index: usize },

    #[error("plan contains no chapters")]
    NoChapters,

    #[error("chapter numbering is not contiguous: expected chapter {expected}, found {actual}")]
    ChapterNumbering { expected: u32, actual: u32 },

    #[error("chapter {chapter} has a page count of zero")]
    ZeroPageCount { chapter: u32 },

    #[error("chapter {chapter} has a blank theme")]
    BlankChapterTheme { chapter: u32 },

    #[error("chapter page counts sum to {actual}, expected exactly {expected}")]
    ChapterPageSum { expected: u32, actual: u32 },

    #[error("chapter {chapter} produced {actual} page concept(s), expected {expected}")]
    ConceptCount {
        chapter: u32,
        expected: u32,
        actual: usize,
    },

    #[error("page concept {page_number} references chapter {actual}, expected chapter {expected}")]
    ChapterReferenceMismatch {
        page_number: u32,
        expected: u32,
        actual: u32,
    },

    #[error("page concept {page_number} references unknown chapter {chapter}")]
    UnknownChapterReference { page_number: u32, chapter: u32 },

    #[error("page concept for page {page_number} is missing")]
    MissingConcept { page_number: u32 },

    #[error("page {page_number} has more than one page concept")]
    DuplicateConcept { page_number: u32 },

    #[error("page concept {page_number} is outside pages {first}..={last}")]
    ConceptOutOfRange {
        page_number: u32,
        first: u32,
        last: u32,
    },

    #[error("page concept {page_number} has a blank subject")]
    BlankSubject { page_number: u32 },

    #[error("front cover page number is {actual}, expected {expected}")]
    FrontCoverPageNumber { expected: u32, actual: u32 },

    #[error("back cover page number is {actual}, expected {expected}")]
    BackCoverPageNumber { expected: u32, actual: u32 },

    #[error("front cover text must be exactly {expected:?}, got {actual:?}")]
    FrontCoverTextMismatch { expected: String, actual: String },

    #[error("back cover text has {words} word(s), must stay under {limit}")]
    BackCoverTooLong { words: usize, limit: usize },

    #[error("{cover} cover illustration description has {words} word(s), minimum is {minimum}")]
    CoverIllustrationTooShort {
        cover: &'static str,
        words: usize,
        minimum: usize,
    },

    #[error("content page number is {actual}, expected {expected}")]
    PageNumberMismatch { expected: u32, actual: u32 },

    #[error("page {page_number} has no text")]
    EmptyPageText { page_number: u32 },

    #[error("page {page_number} text has {words} word(s), maximum is {maximum}")]
    PageTextTooLong {
        page_number: u32,
        words: usize,
        maximum: usize,
    },

    #[error("page {page_number} illustration description has {words} word(s), minimum is {minimum}")]
    IllustrationTooShort {
        page_number: u32,
        words: usize,
        minimum: usize,
    },

    #[error("page {page_number} illustration description must start with subject {subject:?}")]
    SubjectPrefixMissing { page_number: u32, subject: String },

    #[error("document topic name is blank")]
    BlankTopicName,

    #[error("document has {actual} content page(s), expected exactly {expected}")]
    PageCount { expected: u32, actual: usize },

    #[error("pages[{index}] has page number {actual}, expected {expected} (pages are sorted 1..={last})")]
    PageNumbering {
        index: usize,
        expected: u32,
        actual: u32,
        last: u32,
    },
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Outline contract: a non-empty arc and at least one usable theme.
pub fn validate_outline(outline: &StoryOutline) -> Vec<Violation> {
    let mut violations = Vec::new();
    if outline.narrative_flow.trim().is_empty() {
        violations.push(Violation::EmptyNarrativeFlow);
    }
    if outline.key_themes.is_empty() {
        violations.push(Violation::NoKeyThemes);
    }
    for (index, theme) in outline.key_themes.iter().enumerate() {
        if theme.trim().is_empty() {
            violations.push(Violation::BlankKeyTheme { index });
        }
    }
    violations
}

/// Chapter contract: contiguous numbering from 1, positive page counts,
/// non-blank themes, and page counts summing to the fixed budget.
pub fn validate_chapters(chapters: &[ChapterDefinition]) -> Vec<Violation> {
    if chapters.is_empty() {
        return vec![Violation::NoChapters];
    }

    let mut violations = Vec::new();
    for (index, chapter) in chapters.iter().enumerate() {
        let expected = index as u32 + 1;
        if chapter.chapter_number != expected {
            violations.push(Violation::ChapterNumbering {
                expected,
                actual: chapter.chapter_number,
            });
        }
        if chapter.page_count == 0 {
            violations.push(Violation::ZeroPageCount {
                chapter: chapter.chapter_number,
            });
        }
        if chapter.theme.trim().is_empty() {
            violations.push(Violation::BlankChapterTheme {
                chapter: chapter.chapter_number,
            });
        }
    }

    let total: u32 = chapters.iter().map(|c| c.page_count).sum();
    if total != CONTENT_PAGE_COUNT {
        violations.push(Violation::ChapterPageSum {
            expected: CONTENT_PAGE_COUNT,
            actual: total,
        });
    }
    violations
}

/// Per-chapter concept contract: exactly `page_count` concepts covering the
/// chapter's assigned page range `first_page..`, each referencing the
/// requesting chapter and carrying a usable subject.
pub fn validate_concepts_for_chapter(
    chapter: &ChapterDefinition,
    first_page: u32,
    concepts: &[PageConcept],
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if concepts.len() != chapter.page_count as usize {
        violations.push(Violation::ConceptCount {
            chapter: chapter.chapter_number,
            expected: chapter.page_count,
            actual: concepts.len(),
        });
    }
    if chapter.page_count == 0 {
        violations.push(Violation::ZeroPageCount {
            chapter: chapter.chapter_number,
        });
    }

    // Exclusive end, so a zero-page chapter owns an empty range.
    let end_page = first_page.saturating_add(chapter.page_count);
    let mut seen = vec![0u32; chapter.page_count as usize];

    for concept in concepts {
        if concept.chapter_number != chapter.chapter_number {
            violations.push(Violation::ChapterReferenceMismatch {
                page_number: concept.page_number,
                expected: chapter.chapter_number,
                actual: concept.chapter_number,
            });
        }
        if concept.subject.trim().is_empty() {
            violations.push(Violation::BlankSubject {
                page_number: concept.page_number,
            });
        }
        if (first_page..end_page).contains(&concept.page_number) {
            seen[(concept.page_number - first_page) as usize] += 1;
        } else {
            violations.push(Violation::ConceptOutOfRange {
                page_number: concept.page_number,
                first: first_page,
                last: end_page.saturating_sub(1),
            });
        }
    }

    for (offset, count) in seen.iter().enumerate() {
        let page_number = first_page + offset as u32;
        match count {
            0 => violations.push(Violation::MissingConcept { page_number }),
            1 => {}
            _ => violations.push(Violation::DuplicateConcept { page_number }),
        }
    }

    violations
}

/// Whole-plan cross-check, run after every chapter's concepts are in:
/// concept page numbers are exactly 1..=10, every chapter reference
/// resolves, and per-chapter concept counts match the chapter plan.
pub fn validate_plan(plan: &PlanningOutput) -> Vec<Violation> {
    let mut violations = validate_chapters(&plan.chapters);

    let mut seen = [0u32; CONTENT_PAGE_COUNT as usize];
    for concept in &plan.concepts {
        if (1..=CONTENT_PAGE_COUNT).contains(&concept.page_number) {
            seen[(concept.page_number - 1) as usize] += 1;
        } else {
            violations.push(Violation::ConceptOutOfRange {
                page_number: concept.page_number,
                first: 1,
                last: CONTENT_PAGE_COUNT,
            });
        }

        if !plan
            .chapters
            .iter()
            .any(|c| c.chapter_number == concept.chapter_number)
        {
            violations.push(Violation::UnknownChapterReference {
                page_number: concept.page_number,
                chapter: concept.chapter_number,
            });
        }

        if concept.subject.trim().is_empty() {
            violations.push(Violation::BlankSubject {
                page_number: concept.page_number,
            });
        }
    }

    for (index, count) in seen.iter().enumerate() {
        let page_number = index as u32 + 1;
        match count {
            0 => violations.push(Violation::MissingConcept { page_number }),
            1 => {}
            _ => violations.push(Violation::DuplicateConcept { page_number }),
        }
    }

    for chapter in &plan.chapters {
        let actual = plan
            .concepts
            .iter()
            .filter(|c| c.chapter_number == chapter.chapter_number)
            .count();
        if actual != chapter.page_count as usize {
            violations.push(Violation::ConceptCount {
                chapter: chapter.chapter_number,
                expected: chapter.page_count,
                actual,
            });
        }
    }

    violations
}

/// Cover contract: fixed page numbers, byte-exact front text for the topic,
/// bounded back-cover blurb, detailed illustration descriptions on both.
pub fn validate_cover_pair(topic_name: &str, covers: &CoverPair) -> Vec<Violation> {
    let mut violations = Vec::new();
    let front = &covers.front_cover;
    let back = &covers.back_cover;

    if front.page_number != FRONT_COVER_PAGE_NUMBER {
        violations.push(Violation::FrontCoverPageNumber {
            expected: FRONT_COVER_PAGE_NUMBER,
            actual: front.page_number,
        });
    }

    let expected_text = front_cover_text(topic_name);
    if front.text != expected_text {
        violations.push(Violation::FrontCoverTextMismatch {
            expected: expected_text,
            actual: front.text.clone(),
        });
    }

    let front_words = word_count(&front.illustration_description);
    if front_words < ILLUSTRATION_MIN_WORDS {
        violations.push(Violation::CoverIllustrationTooShort {
            cover: "front",
            words: front_words,
            minimum: ILLUSTRATION_MIN_WORDS,
        });
    }

    if back.page_number != BACK_COVER_PAGE_NUMBER {
        violations.push(Violation::BackCoverPageNumber {
            expected: BACK_COVER_PAGE_NUMBER,
            actual: back.page_number,
        });
    }

    let back_words = word_count(&back.text);
    if back_words >= BACK_COVER_WORD_LIMIT {
        violations.push(Violation::BackCoverTooLong {
            words: back_words,
            limit: BACK_COVER_WORD_LIMIT,
        });
    }

    let back_illustration_words = word_count(&back.illustration_description);
    if back_illustration_words < ILLUSTRATION_MIN_WORDS {
        violations.push(Violation::CoverIllustrationTooShort {
            cover: "back",
            words: back_illustration_words,
            minimum: ILLUSTRATION_MIN_WORDS,
        });
    }

    violations
}

/// Content page contract against its driving concept: echoed page number,
/// word bounds, and the byte-exact subject prefix on the illustration
/// description.
pub fn validate_content_page(concept: &PageConcept, page: &ContentPage) -> Vec<Violation> {
    let mut violations = Vec::new();

    if page.page_number != concept.page_number {
        violations.push(Violation::PageNumberMismatch {
            expected: concept.page_number,
            actual: page.page_number,
        });
    }

    let words = word_count(&page.text);
    if words == 0 {
        violations.push(Violation::EmptyPageText {
            page_number: concept.page_number,
        });
    } else if words > PAGE_TEXT_MAX_WORDS {
        violations.push(Violation::PageTextTooLong {
            page_number: concept.page_number,
            words,
            maximum: PAGE_TEXT_MAX_WORDS,
        });
    }

    let illustration_words = word_count(&page.illustration_description);
    if illustration_words < ILLUSTRATION_MIN_WORDS {
        violations.push(Violation::IllustrationTooShort {
            page_number: concept.page_number,
            words: illustration_words,
            minimum: ILLUSTRATION_MIN_WORDS,
        });
    }

    // Byte-exact prefix; case or punctuation drift is a violation, never
    // something to normalize away.
    if !page.illustration_description.starts_with(&concept.subject) {
        violations.push(Violation::SubjectPrefixMissing {
            page_number: concept.page_number,
            subject: concept.subject.clone(),
        });
    }

    violations
}

/// Full recheck of an assembled or persisted document. Concepts are not
/// persisted, so the subject-prefix rule is enforced at generation time
/// only; everything else is re-verifiable here.
pub fn validate_document(doc: &BookDocument) -> Vec<Violation> {
    let mut violations = Vec::new();

    if doc.park_name.trim().is_empty() {
        violations.push(Violation::BlankTopicName);
    }

    violations.extend(validate_cover_pair(
        &doc.park_name,
        &CoverPair {
            front_cover: doc.front_cover.clone(),
            back_cover: doc.back_cover.clone(),
        },
    ));

    if doc.pages.len() != CONTENT_PAGE_COUNT as usize {
        violations.push(Violation::PageCount {
            expected: CONTENT_PAGE_COUNT,
            actual: doc.pages.len(),
        });
    }

    for (index, page) in doc.pages.iter().enumerate() {
        let expected = index as u32 + 1;
        if page.page_number != expected {
            violations.push(Violation::PageNumbering {
                index,
                expected,
                actual: page.page_number,
                last: CONTENT_PAGE_COUNT,
            });
        }

        let words = word_count(&page.text);
        if words == 0 {
            violations.push(Violation::EmptyPageText {
                page_number: page.page_number,
            });
        } else if words > PAGE_TEXT_MAX_WORDS {
            violations.push(Violation::PageTextTooLong {
                page_number: page.page_number,
                words,
                maximum: PAGE_TEXT_MAX_WORDS,
            });
        }

        let illustration_words = word_count(&page.illustration_description);
        if illustration_words < ILLUSTRATION_MIN_WORDS {
            violations.push(Violation::IllustrationTooShort {
                page_number: page.page_number,
                words: illustration_words,
                minimum: ILLUSTRATION_MIN_WORDS,
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CoverSpec;
    use proptest::prelude::*;

    fn chapter(number: u32, pages: u32) -> ChapterDefinition {
        ChapterDefinition {
            chapter_number: number,
            theme: format!("Theme {number}"),
            key_elements: vec!["element".to_string()],
            page_count: pages,
        }
    }

    fn concept(page: u32, chapter: u32) -> PageConcept {
        PageConcept {
            page_number: page,
            chapter_number: chapter,
            subject: format!("Subject {page}"),
            core_idea: format!("Idea {page}"),
        }
    }

    fn long_description(prefix: &str) -> String {
        let filler =
            "painted in warm daylight colors with one large friendly shape in the center, \
             a wide open sky behind it, soft rounded hills at the bottom, and a few small \
             animals tucked into the corners";
        format!("{prefix} {filler}")
    }

    fn valid_covers(topic: &str) -> CoverPair {
        CoverPair {
            front_cover: CoverSpec {
                page_number: FRONT_COVER_PAGE_NUMBER,
                illustration_description: long_description("A grand waterfall"),
                text: front_cover_text(topic),
            },
            back_cover: CoverSpec {
                page_number: BACK_COVER_PAGE_NUMBER,
                illustration_description: long_description("A sleepy bison"),
                text: "Come explore wonders big and small".to_string(),
            },
        }
    }

    #[test]
    fn chapters_summing_to_nine_name_the_sum_constraint() {
        let chapters = vec![chapter(1, 3), chapter(2, 3), chapter(3, 3)];
        let violations = validate_chapters(&chapters);
        assert_eq!(
            violations,
            vec![Violation::ChapterPageSum {
                expected: 10,
                actual: 9
            }]
        );
        assert!(violations[0].to_string().contains("sum to 9"));
        assert!(violations[0].to_string().contains("exactly 10"));
    }

    #[test]
    fn every_chapter_violation_is_reported() {
        let chapters = vec![
            ChapterDefinition {
                chapter_number: 1,
                theme: "  ".to_string(),
                key_elements: vec![],
                page_count: 0,
            },
            chapter(3, 4),
        ];
        let violations = validate_chapters(&chapters);
        assert!(violations.contains(&Violation::ZeroPageCount { chapter: 1 }));
        assert!(violations.contains(&Violation::BlankChapterTheme { chapter: 1 }));
        assert!(violations.contains(&Violation::ChapterNumbering {
            expected: 2,
            actual: 3
        }));
        assert!(violations.contains(&Violation::ChapterPageSum {
            expected: 10,
            actual: 4
        }));
    }

    #[test]
    fn empty_chapter_list_is_rejected() {
        assert_eq!(validate_chapters(&[]), vec![Violation::NoChapters]);
    }

    #[test]
    fn concept_batch_must_cover_the_assigned_range() {
        let ch = chapter(2, 3);
        // Pages 4..=6 assigned; page 5 duplicated, page 6 missing, one stray.
        let concepts = vec![concept(4, 2), concept(5, 2), concept(5, 2), concept(9, 2)];
        let violations = validate_concepts_for_chapter(&ch, 4, &concepts);
        assert!(violations.contains(&Violation::ConceptCount {
            chapter: 2,
            expected: 3,
            actual: 4
        }));
        assert!(violations.contains(&Violation::DuplicateConcept { page_number: 5 }));
        assert!(violations.contains(&Violation::MissingConcept { page_number: 6 }));
        assert!(violations.contains(&Violation::ConceptOutOfRange {
            page_number: 9,
            first: 4,
            last: 6
        }));
    }

    #[test]
    fn zero_page_chapter_owns_no_page_range() {
        let ch = chapter(2, 0);
        let violations = validate_concepts_for_chapter(&ch, 3, &[concept(3, 2)]);
        assert!(violations.contains(&Violation::ZeroPageCount { chapter: 2 }));
        assert!(violations.contains(&Violation::ConceptCount {
            chapter: 2,
            expected: 0,
            actual: 1
        }));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::ConceptOutOfRange { page_number: 3, .. })));
    }

    #[test]
    fn concept_from_wrong_chapter_is_flagged() {
        let ch = chapter(1, 1);
        let violations = validate_concepts_for_chapter(&ch, 1, &[concept(1, 2)]);
        assert!(violations.contains(&Violation::ChapterReferenceMismatch {
            page_number: 1,
            expected: 1,
            actual: 2
        }));
    }

    #[test]
    fn whole_plan_passes_when_consistent() {
        let chapters = vec![chapter(1, 4), chapter(2, 6)];
        let concepts: Vec<PageConcept> = (1..=10)
            .map(|p| concept(p, if p <= 4 { 1 } else { 2 }))
            .collect();
        let plan = PlanningOutput {
            outline: StoryOutline {
                narrative_flow: "Dawn to dusk across the park".to_string(),
                key_themes: vec!["wildlife".to_string()],
            },
            chapters,
            concepts,
        };
        assert!(validate_plan(&plan).is_empty());
    }

    #[test]
    fn plan_flags_unknown_chapter_reference() {
        let mut concepts: Vec<PageConcept> = (1..=10).map(|p| concept(p, 1)).collect();
        concepts[9].chapter_number = 7;
        let plan = PlanningOutput {
            outline: StoryOutline {
                narrative_flow: "Across the park".to_string(),
                key_themes: vec!["water".to_string()],
            },
            chapters: vec![chapter(1, 10)],
            concepts,
        };
        let violations = validate_plan(&plan);
        assert!(violations.contains(&Violation::UnknownChapterReference {
            page_number: 10,
            chapter: 7
        }));
    }

    #[test]
    fn front_cover_text_is_byte_exact() {
        let mut covers = valid_covers("Yellowstone");
        covers.front_cover.text = "Yellowstone national Park".to_string();
        let violations = validate_cover_pair("Yellowstone", &covers);
        assert_eq!(
            violations,
            vec![Violation::FrontCoverTextMismatch {
                expected: "Yellowstone National Park".to_string(),
                actual: "Yellowstone national Park".to_string(),
            }]
        );
    }

    #[test]
    fn cover_word_bounds_are_boundary_exact() {
        let mut covers = valid_covers("Denali");
        // 14 words stays under the limit of 15.
        covers.back_cover.text = (1..=14).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        assert!(validate_cover_pair("Denali", &covers).is_empty());

        covers.back_cover.text = (1..=15).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let violations = validate_cover_pair("Denali", &covers);
        assert_eq!(
            violations,
            vec![Violation::BackCoverTooLong {
                words: 15,
                limit: 15
            }]
        );
    }

    #[test]
    fn short_cover_illustrations_are_flagged() {
        let mut covers = valid_covers("Zion");
        covers.front_cover.illustration_description = "A canyon".to_string();
        let violations = validate_cover_pair("Zion", &covers);
        assert_eq!(
            violations,
            vec![Violation::CoverIllustrationTooShort {
                cover: "front",
                words: 2,
                minimum: ILLUSTRATION_MIN_WORDS
            }]
        );
    }

    #[test]
    fn subject_prefix_is_case_sensitive() {
        let c = PageConcept {
            page_number: 3,
            chapter_number: 1,
            subject: "A red fox".to_string(),
            core_idea: "The fox wakes up".to_string(),
        };
        let page = ContentPage {
            page_number: 3,
            text: "Fox wakes up slowly".to_string(),
            illustration_description: long_description("a red fox"),
        };
        let violations = validate_content_page(&c, &page);
        assert_eq!(
            violations,
            vec![Violation::SubjectPrefixMissing {
                page_number: 3,
                subject: "A red fox".to_string()
            }]
        );

        let good = ContentPage {
            page_number: 3,
            text: "Fox wakes up slowly".to_string(),
            illustration_description: long_description("A red fox"),
        };
        assert!(validate_content_page(&c, &good).is_empty());
    }

    #[test]
    fn page_text_word_bound_is_boundary_exact() {
        let c = concept(1, 1);
        let twelve = (1..=12).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let page = ContentPage {
            page_number: 1,
            text: twelve,
            illustration_description: long_description("Subject 1"),
        };
        assert!(validate_content_page(&c, &page).is_empty());

        let thirteen = (1..=13).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let page = ContentPage {
            page_number: 1,
            text: thirteen,
            illustration_description: long_description("Subject 1"),
        };
        let violations = validate_content_page(&c, &page);
        assert_eq!(
            violations,
            vec![Violation::PageTextTooLong {
                page_number: 1,
                words: 13,
                maximum: 12
            }]
        );
    }

    #[test]
    fn blank_page_text_is_rejected() {
        let c = concept(2, 1);
        let page = ContentPage {
            page_number: 2,
            text: "   ".to_string(),
            illustration_description: long_description("Subject 2"),
        };
        let violations = validate_content_page(&c, &page);
        assert!(violations.contains(&Violation::EmptyPageText { page_number: 2 }));
    }

    fn valid_document() -> BookDocument {
        BookDocument {
            park_name: "Yellowstone".to_string(),
            front_cover: valid_covers("Yellowstone").front_cover,
            pages: (1..=10)
                .map(|n| ContentPage {
                    page_number: n,
                    text: format!("Short line for page {n}"),
                    illustration_description: long_description(&format!("Scene {n}")),
                })
                .collect(),
            back_cover: valid_covers("Yellowstone").back_cover,
        }
    }

    #[test]
    fn valid_document_passes_full_recheck() {
        assert!(validate_document(&valid_document()).is_empty());
    }

    #[test]
    fn document_page_order_is_enforced() {
        let mut doc = valid_document();
        doc.pages.swap(2, 7);
        let violations = validate_document(&doc);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::PageNumbering { .. })));
    }

    #[test]
    fn document_with_nine_pages_is_rejected() {
        let mut doc = valid_document();
        doc.pages.pop();
        let violations = validate_document(&doc);
        assert!(violations.contains(&Violation::PageCount {
            expected: 10,
            actual: 9
        }));
    }

    proptest! {
        #[test]
        fn any_partition_of_the_page_budget_passes(counts in prop::collection::vec(1u32..=10, 1..=10)
            .prop_filter("sums to the page budget", |v| v.iter().sum::<u32>() == 10))
        {
            let chapters: Vec<ChapterDefinition> = counts
                .iter()
                .enumerate()
                .map(|(i, pages)| chapter(i as u32 + 1, *pages))
                .collect();
            prop_assert!(validate_chapters(&chapters).is_empty());
        }

        #[test]
        fn perturbed_concept_numbering_is_caught(dup in 1u32..=10, hole in 1u32..=10) {
            prop_assume!(dup != hole);
            let chapters = vec![chapter(1, 10)];
            let concepts: Vec<PageConcept> = (1..=10)
                .map(|p| concept(if p == hole { dup } else { p }, 1))
                .collect();
            let plan = PlanningOutput {
                outline: StoryOutline {
                    narrative_flow: "arc".to_string(),
                    key_themes: vec!["theme".to_string()],
                },
                chapters,
                concepts,
            };
            let violations = validate_plan(&plan);
            let missing = Violation::MissingConcept { page_number: hole };
            let duplicate = Violation::DuplicateConcept { page_number: dup };
            prop_assert!(violations.contains(&missing));
            prop_assert!(violations.contains(&duplicate));
        }
    }
}
