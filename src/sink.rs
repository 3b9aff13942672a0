//! Persistence sink.
//!
//! Owns the on-disk layout and the storage-key mapping from topic names.
//! Documents are written atomically (temp file in the target directory,
//! fsync, rename), so an interrupted run leaves either the previous
//! artifact or none, never a partial file.
//!
//! Layout under the sink root:
//!
//! ```text
//! <root>/<topic_key>/content/book.json
//! <root>/<topic_key>/receipts/latest.json
//! ```

use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::SinkError;
use crate::topic::TopicName;
use crate::types::{BookDocument, RunReceipt};

pub struct BookSink {
    root: Utf8PathBuf,
}

impl BookSink {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Where the document for this topic lives.
    pub fn document_path(&self, topic: &TopicName) -> Utf8PathBuf {
        self.root
            .join(topic.storage_key())
            .join("content")
            .join("book.json")
    }

    /// Where the latest run receipt for this topic lives.
    pub fn receipt_path(&self, topic: &TopicName) -> Utf8PathBuf {
        self.root
            .join(topic.storage_key())
            .join("receipts")
            .join("latest.json")
    }

    /// Persist the document, returning its path.
    pub fn write_document(
        &self,
        topic: &TopicName,
        document: &BookDocument,
    ) -> Result<Utf8PathBuf, SinkError> {
        let path = self.document_path(topic);
        let json = serde_json::to_string_pretty(document)?;
        write_atomic(&path, &json)?;
        info!(topic = %topic, path = %path, "book document written");
        Ok(path)
    }

    /// Persist the run receipt, returning its path.
    pub fn write_receipt(
        &self,
        topic: &TopicName,
        receipt: &RunReceipt,
    ) -> Result<Utf8PathBuf, SinkError> {
        let path = self.receipt_path(topic);
        let json = serde_json::to_string_pretty(receipt)?;
        write_atomic(&path, &json)?;
        Ok(path)
    }
}

/// Load a persisted document, for verification.
pub fn load_document(path: &Utf8Path) -> Result<BookDocument, SinkError> {
    let raw = fs::read_to_string(path).map_err(|source| SinkError::Io {
        path: path.to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_atomic(path: &Utf8Path, content: &str) -> Result<(), SinkError> {
    let io_err = |source: std::io::Error| SinkError::Io {
        path: path.to_string(),
        source,
    };

    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(parent).map_err(io_err)?;

    let mut temp = NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(content.as_bytes()).map_err(io_err)?;
    temp.write_all(b"\n").map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentPage, CoverSpec};

    fn topic() -> TopicName {
        TopicName::new("Great Smoky Mountains").unwrap()
    }

    fn document() -> BookDocument {
        BookDocument {
            park_name: "Great Smoky Mountains".to_string(),
            front_cover: CoverSpec {
                page_number: 0,
                illustration_description: "Blue ridges under morning mist".to_string(),
                text: "Great Smoky Mountains National Park".to_string(),
            },
            pages: (1..=10)
                .map(|n| ContentPage {
                    page_number: n,
                    text: format!("Line {n}"),
                    illustration_description: format!("Scene {n}"),
                })
                .collect(),
            back_cover: CoverSpec {
                page_number: 11,
                illustration_description: "Fireflies blinking in a dark forest".to_string(),
                text: "Mist, mountains, and more".to_string(),
            },
        }
    }

    fn sink() -> (tempfile::TempDir, BookSink) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, BookSink::new(root))
    }

    #[test]
    fn paths_are_keyed_by_storage_key() {
        let (_dir, sink) = sink();
        let doc_path = sink.document_path(&topic());
        assert!(doc_path
            .as_str()
            .ends_with("great_smoky_mountains/content/book.json"));
        let receipt_path = sink.receipt_path(&topic());
        assert!(receipt_path
            .as_str()
            .ends_with("great_smoky_mountains/receipts/latest.json"));
    }

    #[test]
    fn document_round_trips_through_disk() {
        let (_dir, sink) = sink();
        let doc = document();

        let path = sink.write_document(&topic(), &doc).unwrap();
        assert!(path.exists());

        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn written_json_has_stable_top_level_shape() {
        let (_dir, sink) = sink();
        let path = sink.write_document(&topic(), &document()).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("park_name").is_some());
        assert!(value.get("front_cover").is_some());
        assert_eq!(value["pages"].as_array().unwrap().len(), 10);
        assert!(value.get("back_cover").is_some());
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn rewrite_replaces_existing_document() {
        let (_dir, sink) = sink();
        let mut doc = document();
        sink.write_document(&topic(), &doc).unwrap();

        doc.back_cover.text = "Second edition".to_string();
        let path = sink.write_document(&topic(), &doc).unwrap();

        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded.back_cover.text, "Second edition");
    }

    #[test]
    fn no_stray_files_after_write() {
        let (_dir, sink) = sink();
        let path = sink.write_document(&topic(), &document()).unwrap();

        // Only book.json in the content directory; the temp file is gone.
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("book.json")]);
    }

    #[test]
    fn load_missing_document_is_io_error() {
        let err = load_document(Utf8Path::new("/nonexistent/book.json")).unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
    }
}
