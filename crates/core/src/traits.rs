use crate::models::IndexRecord;
use crate::store::{Bucket, BulkOutcome, HybridQuery, IndexSchema, StoreHit, TermsSource};
use crate::SearchError;
use async_trait::async_trait;

/// The search engine holding indexed documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn index_name(&self) -> &str;

    async fn index_exists(&self) -> Result<bool, SearchError>;

    async fn create_index(&self, schema: &IndexSchema) -> Result<(), SearchError>;

    /// Writes every record; per-record failures are counted, not raised.
    async fn bulk_write(&self, records: &[IndexRecord]) -> Result<BulkOutcome, SearchError>;

    async fn search(&self, query: &HybridQuery) -> Result<Vec<StoreHit>, SearchError>;

    async fn count(&self) -> Result<u64, SearchError>;

    async fn aggregate_terms(
        &self,
        source: TermsSource,
        size: usize,
    ) -> Result<Vec<Bucket>, SearchError>;

    /// Every stored `metadata.filename`, one entry per document.
    async fn filenames(&self) -> Result<Vec<String>, SearchError>;
}
