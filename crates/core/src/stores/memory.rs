use crate::embeddings::cosine_similarity;
use crate::models::{IndexRecord, IndexedDocument};
use crate::store::{
    file_extension_label, sort_buckets, Bucket, BulkOutcome, HybridQuery, IndexSchema, StoreHit,
    TermsSource, FILENAME_FIELD, FOLDER_FIELD,
};
use crate::traits::DocumentStore;
use crate::SearchError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

const BACKEND: &str = "memory";

#[derive(Default)]
struct MemoryState {
    schema: Option<IndexSchema>,
    documents: BTreeMap<String, IndexedDocument>,
}

/// In-process document store with the same query semantics as the
/// Elasticsearch store: token-overlap lexical scoring OR cosine + offset.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose index already exists with the given schema.
    pub fn with_index(schema: IndexSchema) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                schema: Some(schema),
                documents: BTreeMap::new(),
            }),
        }
    }

    pub async fn get(&self, id: &str) -> Option<IndexedDocument> {
        self.state.read().await.documents.get(id).cloned()
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

fn lexical_score(document: &IndexedDocument, query_tokens: &HashSet<String>) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }

    let searchable = std::iter::once(document.content.as_str())
        .chain(document.figures.iter().map(|figure| figure.title.as_str()));

    searchable
        .flat_map(tokens)
        .filter(|token| query_tokens.contains(token))
        .count() as f64
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn index_name(&self) -> &str {
        BACKEND
    }

    async fn index_exists(&self) -> Result<bool, SearchError> {
        Ok(self.state.read().await.schema.is_some())
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<(), SearchError> {
        let mut state = self.state.write().await;
        if state.schema.is_some() {
            return Err(SearchError::IndexAlreadyExists(BACKEND.to_string()));
        }
        state.schema = Some(*schema);
        Ok(())
    }

    async fn bulk_write(&self, records: &[IndexRecord]) -> Result<BulkOutcome, SearchError> {
        let mut state = self.state.write().await;
        let schema = state
            .schema
            .ok_or_else(|| SearchError::backend(BACKEND, "index does not exist"))?;

        let mut outcome = BulkOutcome::default();
        for record in records {
            let dimension_ok = record
                .document
                .content_vector
                .as_ref()
                .map_or(true, |vector| vector.len() == schema.vector_dimensions);
            if !dimension_ok {
                outcome.failed += 1;
                continue;
            }

            if state
                .documents
                .insert(record.id.clone(), record.document.clone())
                .is_some()
            {
                outcome.overwritten += 1;
            }
            outcome.succeeded += 1;
        }

        Ok(outcome)
    }

    async fn search(&self, query: &HybridQuery) -> Result<Vec<StoreHit>, SearchError> {
        let state = self.state.read().await;
        let query_tokens: HashSet<String> = tokens(&query.text).collect();

        let mut hits: Vec<StoreHit> = state
            .documents
            .iter()
            .filter_map(|(id, document)| {
                let lexical = lexical_score(document, &query_tokens);
                let semantic = match (&query.query_vector, &document.content_vector) {
                    (Some(query_vector), Some(vector)) => Some(
                        cosine_similarity(query_vector, vector) as f64
                            + query.semantic_offset as f64,
                    ),
                    (Some(_), None) => Some(0.0),
                    (None, _) => None,
                };

                if lexical == 0.0 && semantic.is_none() {
                    return None;
                }

                Some(StoreHit {
                    id: id.clone(),
                    score: lexical + semantic.unwrap_or(0.0),
                    document: document.clone(),
                })
            })
            .collect();

        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.id.cmp(&right.id))
        });
        hits.truncate(query.size);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, SearchError> {
        Ok(self.state.read().await.documents.len() as u64)
    }

    async fn aggregate_terms(
        &self,
        source: TermsSource,
        size: usize,
    ) -> Result<Vec<Bucket>, SearchError> {
        let key_of: fn(&IndexedDocument) -> String = match source {
            TermsSource::Field(FOLDER_FIELD) => {
                |document: &IndexedDocument| document.folder_name.clone()
            }
            TermsSource::Field(FILENAME_FIELD) => {
                |document: &IndexedDocument| document.metadata.filename.clone()
            }
            TermsSource::Field(other) => {
                return Err(SearchError::backend(
                    BACKEND,
                    format!("field `{other}` is not aggregatable"),
                ))
            }
            TermsSource::FileExtension => {
                |document: &IndexedDocument| file_extension_label(&document.metadata.filename)
            }
        };

        let state = self.state.read().await;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for document in state.documents.values() {
            *counts.entry(key_of(document)).or_default() += 1;
        }

        let mut buckets: Vec<Bucket> = counts
            .into_iter()
            .map(|(key, count)| Bucket { key, count })
            .collect();
        sort_buckets(&mut buckets);
        buckets.truncate(size);
        Ok(buckets)
    }

    async fn filenames(&self) -> Result<Vec<String>, SearchError> {
        Ok(self
            .state
            .read()
            .await
            .documents
            .values()
            .map(|document| document.metadata.filename.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Figure, StoredMetadata};

    fn record(id: &str, content: &str, vector: Option<Vec<f32>>) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            document: IndexedDocument {
                content: content.to_string(),
                metadata: StoredMetadata {
                    filename: format!("{id}.pdf"),
                },
                folder_name: "root".to_string(),
                figures: vec![Figure {
                    title: "Figure 9: Valve".to_string(),
                    path: None,
                }],
                content_vector: vector,
            },
        }
    }

    #[tokio::test]
    async fn create_index_twice_reports_existing_index() -> Result<(), SearchError> {
        let store = InMemoryStore::new();
        assert!(!store.index_exists().await?);
        store.create_index(&IndexSchema::default()).await?;
        assert!(store.index_exists().await?);
        assert!(matches!(
            store.create_index(&IndexSchema::default()).await,
            Err(SearchError::IndexAlreadyExists(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_dimension_is_a_per_record_failure() -> Result<(), SearchError> {
        let store = InMemoryStore::with_index(IndexSchema {
            vector_dimensions: 2,
        });
        let outcome = store
            .bulk_write(&[
                record("a", "one", Some(vec![1.0, 0.0])),
                record("b", "two", Some(vec![1.0])),
                record("a", "one", Some(vec![0.0, 1.0])),
            ])
            .await?;

        assert_eq!(
            outcome,
            BulkOutcome {
                succeeded: 2,
                failed: 1,
                overwritten: 1
            }
        );
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn lexical_matches_content_and_figure_titles() -> Result<(), SearchError> {
        let store = InMemoryStore::with_index(IndexSchema::default());
        store
            .bulk_write(&[record("a", "pump station", None), record("b", "roof", None)])
            .await?;

        let query = HybridQuery {
            text: "Pump".to_string(),
            query_vector: None,
            semantic_offset: 1.0,
            size: 10,
        };
        let hits = store.search(&query).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");

        let by_title = HybridQuery {
            text: "valve".to_string(),
            ..query
        };
        assert_eq!(store.search(&by_title).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn semantic_clause_scores_every_document() -> Result<(), SearchError> {
        let store = InMemoryStore::with_index(IndexSchema {
            vector_dimensions: 2,
        });
        store
            .bulk_write(&[
                record("near", "alpha", Some(vec![1.0, 0.0])),
                record("far", "beta", Some(vec![-1.0, 0.0])),
            ])
            .await?;

        let query = HybridQuery {
            text: "unrelated".to_string(),
            query_vector: Some(vec![1.0, 0.0]),
            semantic_offset: 1.0,
            size: 1,
        };
        let hits = store.search(&query).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "near");
        assert!((hits[0].score - 2.0).abs() < 1e-6);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_aggregation_field_is_rejected_even_when_empty() -> Result<(), SearchError> {
        let store = InMemoryStore::with_index(IndexSchema::default());
        assert!(store
            .aggregate_terms(TermsSource::Field("content"), 10)
            .await
            .is_err());

        store.bulk_write(&[record("a", "pump", None)]).await?;
        assert!(store
            .aggregate_terms(TermsSource::Field("content"), 10)
            .await
            .is_err());
        assert_eq!(
            store
                .aggregate_terms(TermsSource::Field(FOLDER_FIELD), 10)
                .await?,
            vec![Bucket {
                key: "root".to_string(),
                count: 1
            }]
        );
        Ok(())
    }
}
