//! Deterministic document assembly.
//!
//! No generation happens here: assembly orders the content pages, verifies
//! that the pieces form the complete page sequence 0 through 11, and builds
//! the final document. Any defect at this point means an upstream stage
//! accepted something it should not have, so assembly errors are fatal.

use crate::error::AssemblyError;
use crate::topic::TopicName;
use crate::types::{
    BACK_COVER_PAGE_NUMBER, BookDocument, CONTENT_PAGE_COUNT, ContentPage, CoverPair,
    FRONT_COVER_PAGE_NUMBER,
};

/// Assemble the validated pieces into a [`BookDocument`].
///
/// Pages may arrive in any order; they are sorted by page number before the
/// contiguity check.
pub fn assemble(
    topic: &TopicName,
    covers: CoverPair,
    mut pages: Vec<ContentPage>,
) -> Result<BookDocument, AssemblyError> {
    if covers.front_cover.page_number != FRONT_COVER_PAGE_NUMBER {
        return Err(AssemblyError::FrontCoverPage {
            expected: FRONT_COVER_PAGE_NUMBER,
            actual: covers.front_cover.page_number,
        });
    }
    if covers.back_cover.page_number != BACK_COVER_PAGE_NUMBER {
        return Err(AssemblyError::BackCoverPage {
            expected: BACK_COVER_PAGE_NUMBER,
            actual: covers.back_cover.page_number,
        });
    }

    if pages.len() != CONTENT_PAGE_COUNT as usize {
        return Err(AssemblyError::WrongPageCount {
            expected: CONTENT_PAGE_COUNT,
            actual: pages.len(),
        });
    }

    pages.sort_by_key(|p| p.page_number);

    let mut seen = [0u32; CONTENT_PAGE_COUNT as usize];
    for page in &pages {
        if !(1..=CONTENT_PAGE_COUNT).contains(&page.page_number) {
            return Err(AssemblyError::PageOutOfRange {
                page_number: page.page_number,
                last: CONTENT_PAGE_COUNT,
            });
        }
        seen[(page.page_number - 1) as usize] += 1;
    }
    for (index, count) in seen.iter().enumerate() {
        let page_number = index as u32 + 1;
        if *count > 1 {
            return Err(AssemblyError::DuplicatePage { page_number });
        }
        if *count == 0 {
            return Err(AssemblyError::MissingPage { page_number });
        }
    }

    Ok(BookDocument {
        park_name: topic.display().to_string(),
        front_cover: covers.front_cover,
        pages,
        back_cover: covers.back_cover,
    })
}
