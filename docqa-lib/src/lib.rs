//! DocQA - question answering over uploaded PDF documents
//!
//! # Architecture
//!
//! ```text
//! PDF -> Extractor -> Chunker -> Embedder -> VectorIndex (persisted)
//!                                                 |
//! Question -> Embedder -> Search <----------------+
//!                           |
//!                PromptAssembler -> Generator -> Answer
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docqa_lib::config::{PipelineConfig, WatsonxConfig};
//! use docqa_lib::embed::{MiniLmEmbedder, SharedEmbedder};
//! use docqa_lib::generate::WatsonxClient;
//! use docqa_lib::pipeline::DocumentQa;
//! use docqa_lib::store::{IndexId, IndexRegistry};
//!
//! let embedder = SharedEmbedder::new(MiniLmEmbedder::new(None)?);
//! let indexes = Arc::new(IndexRegistry::new("vector_store"));
//! let generator = Arc::new(WatsonxClient::new(WatsonxConfig::default())?);
//! let qa = DocumentQa::new(PipelineConfig::default(), embedder, indexes, generator)?;
//!
//! // Index a document
//! let report = qa.ingest_pdf(&IndexId::default(), pdf_bytes).await?;
//!
//! // Ask about it
//! let answer = qa.ask(&IndexId::default(), "What is the warranty period?").await?;
//! ```

pub mod chunk;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod generate;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
pub mod store;

pub use error::{Error, Result};
