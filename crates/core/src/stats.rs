use crate::models::{DashboardStats, StatEntry};
use crate::store::{file_extension_label, sort_buckets, Bucket, TermsSource, FOLDER_FIELD};
use crate::traits::DocumentStore;
use crate::SearchError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Upper bound on buckets per terms aggregation.
pub const MAX_BUCKETS: usize = 1_000;

/// Where file extensions are computed. Both give the same groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileTypeStrategy {
    /// Pull every filename and tally extensions locally.
    #[default]
    ClientTally,
    /// Let the store derive the extension with a field script.
    StoreScript,
}

pub struct StatsAggregator {
    store: Arc<dyn DocumentStore>,
    strategy: FileTypeStrategy,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            strategy: FileTypeStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: FileTypeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Index-wide counts. Any failing call fails the whole dashboard.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, SearchError> {
        let collected = async {
            let total_documents = self.store.count().await?;
            let folders = self
                .store
                .aggregate_terms(TermsSource::Field(FOLDER_FIELD), MAX_BUCKETS)
                .await?;
            let file_types = self.file_type_buckets().await?;

            Ok::<_, SearchError>(DashboardStats {
                total_documents,
                folder_stats: entries(folders),
                file_type_stats: entries(file_types),
            })
        }
        .await;

        if let Err(error) = &collected {
            warn!(%error, "dashboard aggregation failed");
        }
        collected
    }

    async fn file_type_buckets(&self) -> Result<Vec<Bucket>, SearchError> {
        match self.strategy {
            FileTypeStrategy::StoreScript => {
                self.store
                    .aggregate_terms(TermsSource::FileExtension, MAX_BUCKETS)
                    .await
            }
            FileTypeStrategy::ClientTally => {
                let filenames = self.store.filenames().await?;
                Ok(tally_extensions(&filenames))
            }
        }
    }
}

pub fn tally_extensions(filenames: &[String]) -> Vec<Bucket> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for filename in filenames {
        *counts.entry(file_extension_label(filename)).or_default() += 1;
    }

    let mut buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(key, count)| Bucket { key, count })
        .collect();
    sort_buckets(&mut buckets);
    buckets
}

fn entries(buckets: Vec<Bucket>) -> Vec<StatEntry> {
    buckets
        .into_iter()
        .map(|bucket| StatEntry {
            label: bucket.key,
            value: bucket.count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndexRecord, IndexedDocument, StoredMetadata};
    use crate::store::{BulkOutcome, HybridQuery, IndexSchema, StoreHit};
    use crate::stores::InMemoryStore;
    use async_trait::async_trait;

    fn record(filename: &str, folder: &str) -> IndexRecord {
        let content = format!("{folder}/{filename}");
        IndexRecord {
            id: crate::models::content_identifier(&content),
            document: IndexedDocument {
                content,
                metadata: StoredMetadata {
                    filename: filename.to_string(),
                },
                folder_name: folder.to_string(),
                figures: Vec::new(),
                content_vector: None,
            },
        }
    }

    async fn seeded_store() -> Result<Arc<InMemoryStore>, SearchError> {
        let store = Arc::new(InMemoryStore::with_index(IndexSchema::default()));
        store
            .bulk_write(&[
                record("a.pdf", "A"),
                record("b.PDF", "A"),
                record("c.docx", "A"),
                record("d.pdf", "B"),
                record("Makefile", "B"),
            ])
            .await?;
        Ok(store)
    }

    fn entry(label: &str, value: u64) -> StatEntry {
        StatEntry {
            label: label.to_string(),
            value,
        }
    }

    #[tokio::test]
    async fn folder_and_file_type_counts() -> Result<(), SearchError> {
        let store = seeded_store().await?;
        let stats = StatsAggregator::new(store).dashboard_stats().await?;

        assert_eq!(stats.total_documents, 5);
        assert_eq!(stats.folder_stats, vec![entry("A", 3), entry("B", 2)]);
        assert_eq!(
            stats.file_type_stats,
            vec![entry("PDF", 3), entry("DOCX", 1), entry("UNKNOWN", 1)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn both_strategies_agree() -> Result<(), SearchError> {
        let store = seeded_store().await?;
        let client = StatsAggregator::new(store.clone())
            .with_strategy(FileTypeStrategy::ClientTally)
            .dashboard_stats()
            .await?;
        let script = StatsAggregator::new(store)
            .with_strategy(FileTypeStrategy::StoreScript)
            .dashboard_stats()
            .await?;

        assert_eq!(client, script);
        Ok(())
    }

    #[tokio::test]
    async fn empty_index_has_zero_totals() -> Result<(), SearchError> {
        let store = Arc::new(InMemoryStore::with_index(IndexSchema::default()));
        let stats = StatsAggregator::new(store).dashboard_stats().await?;
        assert_eq!(stats.total_documents, 0);
        assert!(stats.folder_stats.is_empty());
        assert!(stats.file_type_stats.is_empty());
        Ok(())
    }

    struct BrokenAggregations;

    #[async_trait]
    impl DocumentStore for BrokenAggregations {
        fn index_name(&self) -> &str {
            "broken"
        }

        async fn index_exists(&self) -> Result<bool, SearchError> {
            Ok(true)
        }

        async fn create_index(&self, _schema: &IndexSchema) -> Result<(), SearchError> {
            Ok(())
        }

        async fn bulk_write(&self, _records: &[IndexRecord]) -> Result<BulkOutcome, SearchError> {
            Ok(BulkOutcome::default())
        }

        async fn search(&self, _query: &HybridQuery) -> Result<Vec<StoreHit>, SearchError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<u64, SearchError> {
            Ok(12)
        }

        async fn aggregate_terms(
            &self,
            _source: TermsSource,
            _size: usize,
        ) -> Result<Vec<Bucket>, SearchError> {
            Err(SearchError::backend("broken", "search_phase_execution_exception"))
        }

        async fn filenames(&self) -> Result<Vec<String>, SearchError> {
            Ok(vec!["a.pdf".to_string()])
        }
    }

    #[tokio::test]
    async fn one_failing_aggregation_fails_the_dashboard() {
        let result = StatsAggregator::new(Arc::new(BrokenAggregations))
            .dashboard_stats()
            .await;
        assert!(matches!(result, Err(SearchError::BackendResponse { .. })));
    }

    #[tokio::test]
    async fn trailing_dot_gets_an_empty_label() -> Result<(), SearchError> {
        let store = Arc::new(InMemoryStore::with_index(IndexSchema::default()));
        store
            .bulk_write(&[record("draft.", "A"), record("Makefile", "A")])
            .await?;

        for strategy in [FileTypeStrategy::ClientTally, FileTypeStrategy::StoreScript] {
            let stats = StatsAggregator::new(store.clone())
                .with_strategy(strategy)
                .dashboard_stats()
                .await?;
            assert_eq!(
                stats.file_type_stats,
                vec![entry("", 1), entry("UNKNOWN", 1)]
            );
        }
        Ok(())
    }

    #[test]
    fn tally_orders_by_count() {
        let filenames = vec![
            "x.dwg".to_string(),
            "y.pdf".to_string(),
            "z.PDF".to_string(),
        ];
        assert_eq!(
            tally_extensions(&filenames),
            vec![
                Bucket { key: "PDF".to_string(), count: 2 },
                Bucket { key: "DWG".to_string(), count: 1 },
            ]
        );
    }
}
