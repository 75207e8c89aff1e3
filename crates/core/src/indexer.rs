use crate::embeddings::Embedder;
use crate::models::{Document, IndexRecord, IndexedDocument};
use crate::store::IndexSchema;
use crate::traits::DocumentStore;
use crate::SearchError;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Records that replaced an earlier record with identical content.
    pub overwritten: usize,
}

/// Writes a corpus into the document store, keyed by content hash.
pub struct Indexer {
    store: Arc<dyn DocumentStore>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl Indexer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            embedder: None,
        }
    }

    /// Enables semantic indexing: every document gets a `content_vector`.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn schema(&self) -> IndexSchema {
        match &self.embedder {
            Some(embedder) => IndexSchema {
                vector_dimensions: embedder.dimensions(),
            },
            None => IndexSchema::default(),
        }
    }

    /// Creates the index; an index that is already present is refused.
    pub async fn create_index(&self) -> Result<(), SearchError> {
        if self.store.index_exists().await? {
            return Err(SearchError::IndexAlreadyExists(
                self.store.index_name().to_string(),
            ));
        }
        self.store.create_index(&self.schema()).await
    }

    /// One-shot run: create the index, then bulk-write the corpus.
    pub async fn index_corpus(&self, documents: Vec<Document>) -> Result<IndexReport, SearchError> {
        self.create_index().await?;
        self.index(documents).await
    }

    pub async fn index(&self, documents: Vec<Document>) -> Result<IndexReport, SearchError> {
        let mut report = IndexReport::default();
        let mut records = Vec::with_capacity(documents.len());

        for mut document in documents {
            if let Some(embedder) = &self.embedder {
                match embedder.embed(&document.content).await {
                    Ok(vector) => document.content_vector = Some(vector),
                    Err(error) => {
                        warn!(
                            filename = %document.metadata.filename,
                            %error,
                            "embedding failed, document not indexed"
                        );
                        report.failed += 1;
                        continue;
                    }
                }
            }

            records.push(IndexRecord {
                id: document.identifier(),
                document: IndexedDocument::from(document),
            });
        }

        let outcome = self.store.bulk_write(&records).await?;
        report.succeeded += outcome.succeeded;
        report.failed += outcome.failed;
        report.overwritten += outcome.overwritten;

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            overwritten = report.overwritten,
            "bulk indexing finished"
        );
        if report.overwritten > 0 {
            warn!(
                overwritten = report.overwritten,
                "documents with identical content collapsed into one record"
            );
        }

        Ok(report)
    }
}
