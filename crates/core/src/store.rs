use crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS;
use crate::models::IndexedDocument;

pub const FOLDER_FIELD: &str = "folder_name";
pub const FILENAME_FIELD: &str = "metadata.filename";
pub const UNKNOWN_FILE_TYPE: &str = "UNKNOWN";

/// Fields searched by the lexical clause.
pub const LEXICAL_FIELDS: [&str; 2] = ["content", "figures.title"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSchema {
    pub vector_dimensions: usize,
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self {
            vector_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

/// One retrieval request: lexical match OR cosine scoring, scores added.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridQuery {
    pub text: String,
    /// Absent when semantic search is disabled; the query is then lexical only.
    pub query_vector: Option<Vec<f32>>,
    pub semantic_offset: f32,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct StoreHit {
    pub id: String,
    pub score: f64,
    pub document: IndexedDocument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermsSource {
    Field(&'static str),
    /// Upper-cased extension of `metadata.filename`, computed by the store.
    FileExtension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
    /// Writes that replaced an existing record with the same id.
    pub overwritten: usize,
}

/// Extension label for dashboard grouping: text after the last `.`,
/// upper-cased (empty for a trailing dot), or `UNKNOWN` without any `.`.
pub fn file_extension_label(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, extension)) => extension.to_uppercase(),
        None => UNKNOWN_FILE_TYPE.to_string(),
    }
}

/// Terms buckets ordered by descending count, then ascending key.
pub fn sort_buckets(buckets: &mut [Bucket]) {
    buckets.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| left.key.cmp(&right.key))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_label_uses_last_dot() {
        assert_eq!(file_extension_label("report.final.pdf"), "PDF");
        assert_eq!(file_extension_label("Plan.Dwg"), "DWG");
        assert_eq!(file_extension_label("README"), "UNKNOWN");
        assert_eq!(file_extension_label("trailing."), "");
        assert_eq!(file_extension_label(".bashrc"), "BASHRC");
    }

    #[test]
    fn buckets_sort_by_count_then_key() {
        let mut buckets = vec![
            Bucket { key: "B".to_string(), count: 2 },
            Bucket { key: "C".to_string(), count: 3 },
            Bucket { key: "A".to_string(), count: 2 },
        ];
        sort_buckets(&mut buckets);
        let keys: Vec<_> = buckets.iter().map(|bucket| bucket.key.as_str()).collect();
        assert_eq!(keys, vec!["C", "A", "B"]);
    }
}
