mod server;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use docsearch_core::{
    read_corpus, write_corpus, CharacterNgramEmbedder, DocumentBuilder, DocumentStore, Embedder,
    ElasticsearchStore, FileTypeStrategy, HttpEmbedder, HybridQueryPlanner, Indexer,
    IngestionOptions, SearchError, StatsAggregator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docsearch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Elasticsearch base URL
    #[arg(long, env = "DOCSEARCH_ES_URL", default_value = "http://localhost:9200", global = true)]
    es_url: String,

    /// Index holding the documents
    #[arg(long, env = "DOCSEARCH_INDEX", default_value = "documents", global = true)]
    index: String,

    /// Index content vectors and add the semantic clause to queries.
    #[arg(long, env = "DOCSEARCH_SEMANTIC", default_value_t = false, global = true)]
    semantic: bool,

    /// Remote embedding endpoint. The local n-gram embedder is used when absent.
    #[arg(long, env = "DOCSEARCH_EMBEDDING_ENDPOINT", global = true)]
    embedding_endpoint: Option<String>,

    #[arg(long, default_value_t = docsearch_core::DEFAULT_EMBEDDING_DIMENSIONS, global = true)]
    embedding_dims: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Extract text and figures from a folder tree into a corpus file.
    Prepare {
        /// Root folder, walked recursively.
        root: PathBuf,
        #[arg(long, default_value = "prepared_data.json")]
        output: PathBuf,
        #[arg(long, default_value = "extracted_images")]
        images_dir: PathBuf,
        /// Keep documents that produced no text.
        #[arg(long, default_value_t = false)]
        keep_empty: bool,
    },
    /// Create the index and bulk-load a prepared corpus.
    Index {
        #[arg(default_value = "prepared_data.json")]
        corpus: PathBuf,
    },
    /// Run one hybrid query and print the JSON response.
    Search { query: String },
    /// Print dashboard statistics as JSON.
    Stats {
        #[arg(long, value_enum, default_value_t = Strategy::Client)]
        strategy: Strategy,
    },
    /// Serve search, statistics and extracted images over HTTP.
    Serve {
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: String,
        #[arg(long, default_value = "extracted_images")]
        images_dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    /// Tally extensions from every stored filename.
    Client,
    /// Let Elasticsearch compute extensions with a script.
    Script,
}

impl From<Strategy> for FileTypeStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Client => FileTypeStrategy::ClientTally,
            Strategy::Script => FileTypeStrategy::StoreScript,
        }
    }
}

impl Cli {
    fn store(&self) -> anyhow::Result<Arc<dyn DocumentStore>> {
        Ok(Arc::new(ElasticsearchStore::new(&self.es_url, &self.index)?))
    }

    fn embedder(&self) -> anyhow::Result<Option<Arc<dyn Embedder>>> {
        if !self.semantic {
            return Ok(None);
        }

        let embedder: Arc<dyn Embedder> = match &self.embedding_endpoint {
            Some(endpoint) => Arc::new(HttpEmbedder::new(endpoint, self.embedding_dims)?),
            None => Arc::new(CharacterNgramEmbedder {
                dimensions: self.embedding_dims,
            }),
        };
        Ok(Some(embedder))
    }

    fn planner(&self) -> anyhow::Result<HybridQueryPlanner> {
        let planner = HybridQueryPlanner::new(self.store()?);
        Ok(match self.embedder()? {
            Some(embedder) => planner.with_embedder(embedder),
            None => planner,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docsearch boot"
    );

    match &cli.command {
        Command::Prepare {
            root,
            output,
            images_dir,
            keep_empty,
        } => {
            let options = IngestionOptions {
                image_output_dir: images_dir.clone(),
                keep_empty_documents: *keep_empty,
            };
            let report = DocumentBuilder::from_options(&options)?.build(root)?;

            for skipped in &report.skipped_files {
                info!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
            }
            for failed in &report.failed_files {
                warn!(path = %failed.path.display(), reason = %failed.reason, "extraction failed");
            }
            for (path, issue) in &report.issues {
                warn!(path = %path.display(), %issue, "extraction issue");
            }

            write_corpus(output, &report.documents)?;
            println!(
                "{} documents written to {} ({} skipped, {} failed)",
                report.documents.len(),
                output.display(),
                report.skipped_files.len(),
                report.failed_files.len()
            );
        }
        Command::Index { corpus } => {
            let documents = read_corpus(corpus)?;
            let mut indexer = Indexer::new(cli.store()?);
            if let Some(embedder) = cli.embedder()? {
                indexer = indexer.with_embedder(embedder);
            }

            info!(corpus = %corpus.display(), documents = documents.len(), "indexing corpus");
            let report = match indexer.index_corpus(documents).await {
                Ok(report) => report,
                Err(SearchError::IndexAlreadyExists(index)) => {
                    anyhow::bail!(
                        "index `{index}` already exists; delete it first \
                         (curl -X DELETE {}/{index}) or pass --index",
                        cli.es_url.trim_end_matches('/')
                    );
                }
                Err(error) => return Err(error.into()),
            };

            println!(
                "indexed: {} succeeded, {} failed, {} overwritten",
                report.succeeded, report.failed, report.overwritten
            );
        }
        Command::Search { query } => {
            let response = cli.planner()?.search(query).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Stats { strategy } => {
            let stats = StatsAggregator::new(cli.store()?)
                .with_strategy((*strategy).into())
                .dashboard_stats()
                .await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Serve { bind, images_dir } => {
            let store = cli.store()?;
            let state = server::AppState {
                planner: Arc::new(cli.planner()?),
                stats: Arc::new(StatsAggregator::new(store)),
                images_dir: images_dir.clone(),
            };

            let listener = tokio::net::TcpListener::bind(bind).await?;
            info!(addr = %listener.local_addr()?, "serving");
            axum::serve(listener, server::router(state)).await?;
        }
    }

    Ok(())
}
