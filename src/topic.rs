//! Topic name normalization.
//!
//! A topic arrives as free text ("yellowstone", "  GREAT smoky MOUNTAINS ")
//! and is normalized exactly once, at pipeline entry. The display form
//! (trimmed, title-cased words) threads through every prompt and into the
//! persisted `park_name`; the storage key (lowercase, `[a-z0-9_]` only) is
//! derived on demand for the persistence sink.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static NON_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("NON_KEY_CHARS regex is valid"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("topic name is empty")]
    Empty,
    #[error("topic name {0:?} has no characters usable in a storage key")]
    Unkeyable(String),
}

/// A validated, display-normalized topic name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicName {
    display: String,
}

impl TopicName {
    /// Normalizes raw user input. Trims surrounding whitespace, collapses
    /// inner runs of whitespace, and title-cases each word. Blank input is
    /// rejected here so no later stage sees an empty topic.
    pub fn new(raw: &str) -> Result<Self, TopicError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TopicError::Empty);
        }

        let display = trimmed
            .split_whitespace()
            .map(title_case_word)
            .collect::<Vec<_>>()
            .join(" ");

        let topic = Self { display };
        if topic.storage_key().is_empty() {
            return Err(TopicError::Unkeyable(topic.display));
        }
        Ok(topic)
    }

    /// The normalized human-readable name, e.g. "Great Smoky Mountains".
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Derives the sink storage key: lowercase, with every run of
    /// non-alphanumeric characters folded to a single underscore.
    /// "Great Smoky Mountains" becomes "great_smoky_mountains".
    pub fn storage_key(&self) -> String {
        let lowered = self.display.to_lowercase();
        let keyed = NON_KEY_CHARS.replace_all(&lowered, "_");
        keyed.trim_matches('_').to_string()
    }
}

impl std::fmt::Display for TopicName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
