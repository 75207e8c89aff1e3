use crate::embeddings::Embedder;
use crate::models::{ResultView, SearchResponse};
use crate::store::{HybridQuery, StoreHit};
use crate::traits::DocumentStore;
use crate::SearchError;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAX_RESULTS: usize = 100;
pub const SNIPPET_CHARS: usize = 250;
pub const SNIPPET_ELLIPSIS: &str = "...";
/// Added to cosine similarity so semantic scores stay non-negative.
pub const SEMANTIC_OFFSET: f32 = 1.0;

/// Turns a query string into one hybrid store request and maps the hits.
pub struct HybridQueryPlanner {
    store: Arc<dyn DocumentStore>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl HybridQueryPlanner {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn plan(&self, text: &str, query_vector: Option<Vec<f32>>) -> HybridQuery {
        HybridQuery {
            text: text.to_string(),
            query_vector,
            semantic_offset: SEMANTIC_OFFSET,
            size: MAX_RESULTS,
        }
    }

    /// An empty (or blank) query returns no results without touching the store.
    pub async fn search(&self, text: &str) -> Result<SearchResponse, SearchError> {
        if text.trim().is_empty() {
            return Ok(SearchResponse::default());
        }

        let query_vector = match &self.embedder {
            Some(embedder) => Some(embedder.embed(text).await?),
            None => None,
        };

        let query = self.plan(text, query_vector);
        let hits = self.store.search(&query).await.map_err(|error| {
            warn!(%error, "hybrid search failed");
            error
        })?;
        debug!(hits = hits.len(), "hybrid search finished");

        Ok(SearchResponse {
            results: hits.into_iter().map(result_view).collect(),
            stats: Vec::new(),
        })
    }
}

pub fn result_view(hit: StoreHit) -> ResultView {
    let document = hit.document;
    ResultView {
        filename: display_filename(&document.metadata.filename),
        content_snippet: snippet(&document.content),
        figures: document.figures,
    }
}

fn display_filename(filename: &str) -> String {
    if filename.is_empty() {
        return "N/A".to_string();
    }

    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filename)
        .to_string()
}

/// First 250 characters, with `...` appended only when text was cut.
pub fn snippet(content: &str) -> String {
    match content.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}{SNIPPET_ELLIPSIS}", &content[..cut]),
        None => content.to_string(),
    }
}
