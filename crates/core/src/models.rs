use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Folder label used for files that sit directly in the ingestion root.
pub const ROOT_FOLDER: &str = "root";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Figure {
    pub title: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DocumentMetadata {
    #[serde(alias = "file_name")]
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// One extracted source file, as written to the intermediate corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    pub folder_name: String,
    #[serde(default)]
    pub figures: Vec<Figure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_vector: Option<Vec<f32>>,
}

impl Document {
    /// Store key for this document. Identical content always yields the same key.
    pub fn identifier(&self) -> String {
        content_identifier(&self.content)
    }
}

pub fn content_identifier(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StoredMetadata {
    #[serde(default)]
    pub filename: String,
}

/// The store-side shape of a document; mirrors the index mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct IndexedDocument {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: StoredMetadata,
    #[serde(default)]
    pub folder_name: String,
    #[serde(default)]
    pub figures: Vec<Figure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_vector: Option<Vec<f32>>,
}

impl From<Document> for IndexedDocument {
    fn from(document: Document) -> Self {
        Self {
            content: document.content,
            metadata: StoredMetadata {
                filename: document.metadata.filename,
            },
            folder_name: document.folder_name,
            figures: document.figures,
            content_vector: document.content_vector,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: String,
    pub document: IndexedDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultView {
    pub filename: String,
    pub content_snippet: String,
    pub figures: Vec<Figure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchResponse {
    pub results: Vec<ResultView>,
    /// Always empty; folder statistics moved to the dashboard.
    pub stats: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatEntry {
    pub label: String,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_documents: u64,
    pub folder_stats: Vec<StatEntry>,
    pub file_type_stats: Vec<StatEntry>,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub image_output_dir: PathBuf,
    /// Emit documents whose extracted text is empty instead of dropping them.
    pub keep_empty_documents: bool,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            image_output_dir: PathBuf::from("extracted_images"),
            keep_empty_documents: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_depends_only_on_content() {
        let first = Document {
            content: "pump layout".to_string(),
            metadata: DocumentMetadata {
                filename: "a.pdf".to_string(),
                file_path: None,
            },
            folder_name: "A".to_string(),
            figures: Vec::new(),
            content_vector: None,
        };
        let mut second = first.clone();
        second.metadata.filename = "b.docx".to_string();
        second.folder_name = "B".to_string();

        assert_eq!(first.identifier(), second.identifier());
        assert_eq!(first.identifier().len(), 64);
    }

    #[test]
    fn empty_content_has_a_well_defined_identifier() {
        assert_eq!(
            content_identifier(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn metadata_accepts_legacy_file_name_key() -> Result<(), serde_json::Error> {
        let raw = r#"{
            "content": "x",
            "metadata": {"file_name": "manual.pdf", "file_path": "/data/manual.pdf"},
            "folder_name": "root",
            "figures": [{"title": "Figure 1: A", "path": "img.png"}]
        }"#;
        let document: Document = serde_json::from_str(raw)?;
        assert_eq!(document.metadata.filename, "manual.pdf");
        assert_eq!(document.metadata.file_path.as_deref(), Some("/data/manual.pdf"));
        assert!(document.content_vector.is_none());
        Ok(())
    }

    #[test]
    fn indexed_document_drops_source_path() {
        let document = Document {
            content: "x".to_string(),
            metadata: DocumentMetadata {
                filename: "x.pdf".to_string(),
                file_path: Some("/tmp/x.pdf".to_string()),
            },
            folder_name: "root".to_string(),
            figures: Vec::new(),
            content_vector: Some(vec![0.5, 0.5]),
        };
        let indexed = IndexedDocument::from(document);
        assert_eq!(indexed.metadata.filename, "x.pdf");
        assert_eq!(indexed.content_vector, Some(vec![0.5, 0.5]));
    }
}
