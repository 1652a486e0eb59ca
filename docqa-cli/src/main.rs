//! DocQA CLI - ask questions about PDF documents
//!
//! # Commands
//!
//! ```bash
//! # Chunk a document and show results
//! docqa chunk --strategy paragraph manual.pdf
//!
//! # Build the default index from a PDF
//! docqa ingest manual.pdf
//!
//! # Ask a question against it (needs WATSONX_API_KEY and WATSONX_PROJECT_ID)
//! docqa ask "What is the warranty period?"
//!
//! # Serve /upload_pdf/ and /ask_question/ over HTTP
//! docqa serve --addr 0.0.0.0:8000
//! ```

mod server;

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use docqa_lib::{
    config::{
        ChunkStrategy, ChunkingConfig, PipelineConfig, Secret, WatsonxConfig, DEFAULT_API_VERSION,
        DEFAULT_IAM_URL, DEFAULT_MODEL_ID, DEFAULT_WATSONX_URL,
    },
    embed::{HashEmbedder, MiniLmEmbedder, SharedEmbedder},
    extract::{PdfExtractor, TextExtractor},
    generate::{Generator, RetryPolicy, WatsonxClient},
    pipeline::DocumentQa,
    store::{IndexId, IndexRegistry},
    Error,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Question answering over PDF documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a document and print the chunks
    Chunk {
        /// Input file (.pdf is extracted, anything else is read as text)
        input: PathBuf,

        #[command(flatten)]
        chunking: ChunkArgs,

        /// Only read this many pages of a PDF
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Extract, chunk, and embed a PDF, replacing the index
    Ingest {
        /// PDF to index
        input: PathBuf,

        /// Index to build
        #[arg(short, long, default_value_t = IndexId::default())]
        index: IndexId,

        #[command(flatten)]
        chunking: ChunkArgs,

        #[command(flatten)]
        store: StoreArgs,

        /// Only read this many pages of the PDF
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Answer a question from an ingested document
    Ask {
        /// Question to ask
        question: String,

        /// Index to search
        #[arg(short, long, default_value_t = IndexId::default())]
        index: IndexId,

        /// Number of passages given to the model
        #[arg(short, long, default_value = "3")]
        k: usize,

        /// Also print the retrieved passages
        #[arg(long)]
        show_context: bool,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        watsonx: WatsonxArgs,
    },

    /// Serve the upload and question endpoints over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, env = "DOCQA_ADDR", default_value = "127.0.0.1:8000")]
        addr: SocketAddr,

        /// Largest accepted upload in megabytes
        #[arg(long, default_value = "50")]
        max_upload_mb: usize,

        /// Number of passages given to the model
        #[arg(short, long, default_value = "3")]
        k: usize,

        /// Only read this many pages of each uploaded PDF
        #[arg(long, env = "DOCQA_MAX_PAGES")]
        max_pages: Option<usize>,

        #[command(flatten)]
        chunking: ChunkArgs,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        watsonx: WatsonxArgs,
    },
}

#[derive(Args)]
struct ChunkArgs {
    /// Chunking strategy: "fixed" or "paragraph"
    #[arg(short, long, default_value_t = ChunkStrategy::Fixed)]
    strategy: ChunkStrategy,

    /// Maximum characters per chunk
    #[arg(long, default_value = "1000")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value = "200")]
    chunk_overlap: usize,
}

impl ChunkArgs {
    fn config(&self) -> ChunkingConfig {
        ChunkingConfig {
            strategy: self.strategy,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

#[derive(Args)]
struct StoreArgs {
    /// Directory holding persisted indexes
    #[arg(long, env = "DOCQA_INDEX_DIR", default_value = "vector_store")]
    index_dir: PathBuf,

    /// Use the model-free hashing embedder (no download, lower quality)
    #[arg(long, env = "DOCQA_HASH_EMBEDDER")]
    hash_embedder: bool,

    /// Where the embedding model is cached
    #[arg(long, env = "FASTEMBED_CACHE_DIR")]
    model_cache: Option<PathBuf>,
}

impl StoreArgs {
    fn embedder(&self) -> Result<SharedEmbedder> {
        if self.hash_embedder {
            return Ok(SharedEmbedder::new(HashEmbedder::default()));
        }
        println!("Loading all-MiniLM-L6-v2 (first run downloads ~90MB)...");
        let model = MiniLmEmbedder::new(self.model_cache.clone())
            .context("failed to load the embedding model")?;
        Ok(SharedEmbedder::new(model))
    }

    fn registry(&self) -> Arc<IndexRegistry> {
        Arc::new(IndexRegistry::new(&self.index_dir))
    }
}

#[derive(Args)]
struct WatsonxArgs {
    /// IBM Cloud API key
    #[arg(long, env = "WATSONX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// watsonx.ai project
    #[arg(long, env = "WATSONX_PROJECT_ID")]
    project_id: Option<String>,

    /// watsonx.ai service URL
    #[arg(long, env = "WATSONX_URL", default_value = DEFAULT_WATSONX_URL)]
    watsonx_url: String,

    /// IAM token endpoint
    #[arg(long, env = "WATSONX_IAM_URL", default_value = DEFAULT_IAM_URL)]
    iam_url: String,

    /// Generation model
    #[arg(long, env = "WATSONX_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    model_id: String,

    #[arg(long, default_value = "1024")]
    max_new_tokens: u32,

    /// watsonx.ai API version date
    #[arg(long, default_value = DEFAULT_API_VERSION)]
    api_version: String,

    /// Seconds to wait for each watsonx call
    #[arg(long, env = "WATSONX_TIMEOUT_SECS", default_value = "60")]
    timeout_secs: u64,

    /// Attempts per generation call; timeouts and 5xx answers are retried
    #[arg(long, default_value = "1")]
    attempts: u32,
}

impl WatsonxArgs {
    fn config(&self) -> WatsonxConfig {
        WatsonxConfig {
            base_url: self.watsonx_url.clone(),
            iam_url: self.iam_url.clone(),
            api_key: Secret::new(self.api_key.clone().unwrap_or_default()),
            project_id: self.project_id.clone().unwrap_or_default(),
            model_id: self.model_id.clone(),
            max_new_tokens: self.max_new_tokens,
            api_version: self.api_version.clone(),
            timeout_secs: self.timeout_secs,
        }
    }

    /// The watsonx client, or a stand-in whose answers fail with a
    /// credential error when the settings are incomplete.
    fn generator(&self) -> Result<Arc<dyn Generator>> {
        let config = self.config();
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "watsonx is not configured, questions will fail");
            return Ok(Arc::new(Unconfigured {
                reason: e.to_string(),
                model_id: config.model_id,
            }));
        }

        let client = WatsonxClient::new(config)?
            .with_retry(RetryPolicy::bounded(self.attempts, Duration::from_millis(500)));
        Ok(Arc::new(client))
    }
}

/// Lets the server accept uploads before credentials are set up.
struct Unconfigured {
    reason: String,
    model_id: String,
}

#[async_trait]
impl Generator for Unconfigured {
    async fn generate(&self, _prompt: &str) -> docqa_lib::Result<String> {
        Err(Error::Credential {
            status: None,
            message: self.reason.clone(),
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Ingest does not generate, so it runs without watsonx settings.
struct NoGeneration;

#[async_trait]
impl Generator for NoGeneration {
    async fn generate(&self, _prompt: &str) -> docqa_lib::Result<String> {
        Err(Error::InvalidInput("generation is not available here".to_string()))
    }

    fn model_id(&self) -> &str {
        "none"
    }
}

fn read_document(path: &Path, max_pages: Option<usize>) -> Result<String> {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(PdfExtractor.extract(&bytes, max_pages)?)
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chunk {
            input,
            chunking,
            max_pages,
        } => {
            let text = read_document(&input, max_pages)?;
            let chunker = chunking.config().chunker()?;
            let chunks = chunker.chunk(&text, Default::default());

            println!(
                "Chunked '{}' into {} chunks using {} strategy:\n",
                input.display(),
                chunks.len(),
                chunker.name()
            );
            for chunk in &chunks {
                println!(
                    "--- Chunk {} ({} chars at {}, id: {}) ---",
                    chunk.sequence_index + 1,
                    chunk.text.chars().count(),
                    chunk.metadata.position,
                    &chunk.id[..8.min(chunk.id.len())]
                );
                // Show preview (first 200 chars)
                let preview: String = chunk.text.chars().take(200).collect();
                let ellipsis = if chunk.text.chars().count() > 200 { "..." } else { "" };
                println!("{preview}{ellipsis}\n");
            }
        }

        Commands::Ingest {
            input,
            index,
            chunking,
            store,
            max_pages,
        } => {
            let bytes =
                fs::read(&input).with_context(|| format!("failed to read {}", input.display()))?;
            let config = PipelineConfig {
                chunking: chunking.config(),
                max_pages,
                ..Default::default()
            };
            let qa = DocumentQa::new(
                config,
                store.embedder()?,
                store.registry(),
                Arc::new(NoGeneration),
            )?;

            println!("Indexing '{}'...", input.display());
            let report = qa.ingest_pdf(&index, bytes).await?;
            println!("{}", report.message());
            println!("  Dimensions: {}", report.dimension);
            println!("  Saved to: {}", report.path.display());
        }

        Commands::Ask {
            question,
            index,
            k,
            show_context,
            store,
            watsonx,
        } => {
            let config = PipelineConfig {
                top_k: k,
                ..Default::default()
            };
            let qa = DocumentQa::new(
                config,
                store.embedder()?,
                store.registry(),
                watsonx.generator()?,
            )?;

            let answer = qa.ask(&index, &question).await?;

            if show_context {
                println!("=== Context ===\n");
                for (i, passage) in answer.context.passages().iter().enumerate() {
                    println!("#{} (score: {:.4})", i + 1, passage.score);
                    println!("---");
                    let preview: String = passage.text.chars().take(300).collect();
                    let ellipsis = if passage.text.chars().count() > 300 { "..." } else { "" };
                    println!("{preview}{ellipsis}\n");
                }
                println!("=== Answer ===\n");
            }
            println!("{}", answer.text);
        }

        Commands::Serve {
            addr,
            max_upload_mb,
            k,
            max_pages,
            chunking,
            store,
            watsonx,
        } => {
            let config = PipelineConfig {
                chunking: chunking.config(),
                top_k: k,
                max_pages,
                ..Default::default()
            };
            let qa = DocumentQa::new(
                config,
                store.embedder()?,
                store.registry(),
                watsonx.generator()?,
            )?;
            let app = server::router(Arc::new(qa), upload_limit_bytes(max_upload_mb));

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            let local_addr = listener.local_addr()?;
            println!("Serving on http://{local_addr}");
            println!("  Indexes: {}", store.index_dir.display());
            println!("Try: curl -F file=@manual.pdf http://{local_addr}/upload_pdf/");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

/// Upload limit in bytes, clamped instead of wrapping on huge values.
fn upload_limit_bytes(megabytes: usize) -> usize {
    megabytes.saturating_mul(1024 * 1024)
}
