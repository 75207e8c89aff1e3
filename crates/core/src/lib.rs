pub mod corpus;
pub mod docx;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod figures;
pub mod indexer;
pub mod ingest;
pub mod models;
pub mod pdf;
pub mod planner;
pub mod stats;
pub mod store;
pub mod stores;
pub mod traits;

pub use corpus::{read_corpus, write_corpus};
pub use embeddings::{
    cosine_similarity, CharacterNgramEmbedder, Embedder, HttpEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{IngestError, SearchError};
pub use extractor::{
    ContentExtractor, ExtractedContent, Extraction, ExtractionIssue, FileContentExtractor, FileKind,
};
pub use figures::{FigureCorrelator, FigureDetector, OrderBasedPairing};
pub use indexer::{IndexReport, Indexer};
pub use ingest::{discover_files, folder_name, DocumentBuilder, IngestionReport, SkippedFile};
pub use models::{
    DashboardStats, Document, DocumentMetadata, Figure, IndexedDocument, IngestionOptions,
    ResultView, SearchResponse, StatEntry, ROOT_FOLDER,
};
pub use planner::{HybridQueryPlanner, MAX_RESULTS, SEMANTIC_OFFSET, SNIPPET_CHARS};
pub use stats::{FileTypeStrategy, StatsAggregator, MAX_BUCKETS};
pub use store::{Bucket, BulkOutcome, HybridQuery, IndexSchema, StoreHit, TermsSource};
pub use stores::{ElasticsearchStore, InMemoryStore};
pub use traits::DocumentStore;
