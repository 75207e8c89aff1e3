use crate::models::{IndexRecord, IndexedDocument};
use crate::store::{
    Bucket, BulkOutcome, HybridQuery, IndexSchema, StoreHit, TermsSource, FILENAME_FIELD,
    UNKNOWN_FILE_TYPE,
};
use crate::traits::DocumentStore;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const BACKEND: &str = "elasticsearch";
const FILENAME_PAGE_SIZE: usize = 1_000;

pub struct ElasticsearchStore {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
}

impl ElasticsearchStore {
    pub fn new(
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Result<Self, SearchError> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)?;

        Ok(Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index_name: index_name.into(),
        })
    }

    fn index_url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.endpoint, self.index_name, suffix)
    }

    async fn post_json(&self, suffix: &str, body: &Value) -> Result<Value, SearchError> {
        let response = self
            .client
            .post(self.index_url(suffix))
            .json(body)
            .send()
            .await?;
        checked_json(response).await
    }
}

async fn checked_json(response: Response) -> Result<Value, SearchError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SearchError::backend(BACKEND, format!("{status}: {body}")));
    }

    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn index_exists(&self) -> Result<bool, SearchError> {
        let response = self.client.head(self.index_url("")).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(SearchError::backend(BACKEND, other.to_string())),
        }
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<(), SearchError> {
        let response = self
            .client
            .put(self.index_url(""))
            .json(&index_mapping(schema))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception")
        {
            return Err(SearchError::IndexAlreadyExists(self.index_name.clone()));
        }

        Err(SearchError::backend(
            BACKEND,
            format!("index setup failed with {status}: {body}"),
        ))
    }

    async fn bulk_write(&self, records: &[IndexRecord]) -> Result<BulkOutcome, SearchError> {
        if records.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let payload = bulk_payload(&self.index_name, records)?;
        let response = self
            .client
            .post(format!("{}/_bulk?refresh=wait_for", self.endpoint))
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        let parsed = checked_json(response).await?;
        Ok(parse_bulk_response(&parsed))
    }

    async fn search(&self, query: &HybridQuery) -> Result<Vec<StoreHit>, SearchError> {
        let body = search_body(query);
        debug!(size = query.size, semantic = query.query_vector.is_some(), "hybrid search");
        let parsed = self.post_json("/_search", &body).await?;
        parse_hits(&parsed)
    }

    async fn count(&self) -> Result<u64, SearchError> {
        let parsed = self.post_json("/_count", &json!({"query": {"match_all": {}}})).await?;
        parsed
            .pointer("/count")
            .and_then(Value::as_u64)
            .ok_or_else(|| SearchError::backend(BACKEND, "count response without `count`"))
    }

    async fn aggregate_terms(
        &self,
        source: TermsSource,
        size: usize,
    ) -> Result<Vec<Bucket>, SearchError> {
        let parsed = self.post_json("/_search", &terms_body(source, size)).await?;
        parse_buckets(&parsed)
    }

    async fn filenames(&self) -> Result<Vec<String>, SearchError> {
        let mut filenames = Vec::new();
        let mut search_after: Option<Value> = None;

        loop {
            let body = filename_page_body(search_after.as_ref());
            let parsed = self.post_json("/_search", &body).await?;
            let hits = parsed
                .pointer("/hits/hits")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for hit in &hits {
                let filename = hit
                    .pointer("/_source/metadata/filename")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                filenames.push(filename.to_string());
            }

            if hits.len() < FILENAME_PAGE_SIZE {
                break;
            }
            search_after = hits.last().and_then(|hit| hit.get("sort")).cloned();
            if search_after.is_none() {
                break;
            }
        }

        Ok(filenames)
    }
}

pub fn index_mapping(schema: &IndexSchema) -> Value {
    json!({
        "mappings": {
            "properties": {
                "content": {"type": "text"},
                "metadata": {
                    "properties": {
                        "filename": {"type": "keyword"}
                    }
                },
                "folder_name": {"type": "keyword"},
                "figures": {
                    "type": "nested",
                    "properties": {
                        "title": {"type": "text"},
                        "path": {"type": "keyword"}
                    }
                },
                "content_vector": {
                    "type": "dense_vector",
                    "dims": schema.vector_dimensions,
                    "index": true,
                    "similarity": "cosine"
                }
            }
        }
    })
}

fn bulk_payload(index_name: &str, records: &[IndexRecord]) -> Result<String, SearchError> {
    let mut lines = Vec::with_capacity(records.len() * 2);

    for record in records {
        lines.push(serde_json::to_string(&json!({
            "index": {
                "_index": index_name,
                "_id": record.id,
            }
        }))?);
        lines.push(serde_json::to_string(&record.document)?);
    }

    Ok(lines.join("\n") + "\n")
}

fn parse_bulk_response(parsed: &Value) -> BulkOutcome {
    let items = parsed
        .pointer("/items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut outcome = BulkOutcome::default();
    for item in items {
        let status = item
            .pointer("/index/status")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        if (200..300).contains(&status) {
            outcome.succeeded += 1;
            if item.pointer("/index/result").and_then(Value::as_str) == Some("updated") {
                outcome.overwritten += 1;
            }
        } else {
            outcome.failed += 1;
        }
    }

    outcome
}

pub fn search_body(query: &HybridQuery) -> Value {
    let lexical = json!({
        "bool": {
            "should": [
                {"match": {"content": query.text}},
                {
                    "nested": {
                        "path": "figures",
                        "query": {"match": {"figures.title": query.text}}
                    }
                }
            ]
        }
    });

    let combined = match &query.query_vector {
        Some(vector) => json!({
            "bool": {
                "should": [
                    lexical,
                    {
                        "script_score": {
                            "query": {"match_all": {}},
                            "script": {
                                "source": "doc['content_vector'].size() == 0 ? 0 : cosineSimilarity(params.query_vector, 'content_vector') + params.offset",
                                "params": {
                                    "query_vector": vector,
                                    "offset": query.semantic_offset
                                }
                            }
                        }
                    }
                ]
            }
        }),
        None => lexical,
    };

    json!({
        "size": query.size,
        "query": combined,
        "_source": {"excludes": ["content_vector"]}
    })
}

fn parse_hits(parsed: &Value) -> Result<Vec<StoreHit>, SearchError> {
    let hits = parsed
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::backend(BACKEND, "search response without hits"))?;

    hits.iter()
        .map(|raw| {
            let id = raw
                .pointer("/_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let score = raw.pointer("/_score").and_then(Value::as_f64).unwrap_or(0.0);
            let source = raw.pointer("/_source").cloned().unwrap_or(Value::Null);
            let document: IndexedDocument = if source.is_null() {
                IndexedDocument::default()
            } else {
                serde_json::from_value(source)?
            };

            Ok(StoreHit {
                id,
                score,
                document,
            })
        })
        .collect()
}

fn extension_script() -> String {
    format!(
        "def name = doc['{FILENAME_FIELD}'].size() == 0 ? '' : doc['{FILENAME_FIELD}'].value; \
         int dot = name.lastIndexOf('.'); \
         if (dot < 0) {{ return '{UNKNOWN_FILE_TYPE}'; }} \
         return name.substring(dot + 1).toUpperCase();"
    )
}

pub fn terms_body(source: TermsSource, size: usize) -> Value {
    let terms = match source {
        TermsSource::Field(field) => json!({"field": field, "size": size}),
        TermsSource::FileExtension => json!({
            "script": {"source": extension_script(), "lang": "painless"},
            "size": size
        }),
    };

    json!({
        "size": 0,
        "aggs": {
            "buckets": {"terms": terms}
        }
    })
}

fn parse_buckets(parsed: &Value) -> Result<Vec<Bucket>, SearchError> {
    let buckets = parsed
        .pointer("/aggregations/buckets/buckets")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::backend(BACKEND, "aggregation response without buckets"))?;

    Ok(buckets
        .iter()
        .map(|bucket| Bucket {
            key: match bucket.get("key") {
                Some(Value::String(key)) => key.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            },
            count: bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
        })
        .collect())
}

fn filename_page_body(search_after: Option<&Value>) -> Value {
    let mut body = json!({
        "size": FILENAME_PAGE_SIZE,
        "_source": [FILENAME_FIELD],
        "query": {"match_all": {}},
        "sort": ["_doc"]
    });
    if let Some(after) = search_after {
        body["search_after"] = after.clone();
    }
    body
}
