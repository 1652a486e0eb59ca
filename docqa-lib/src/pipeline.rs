//! End-to-end document question answering.
//!
//! ```text
//! PDF bytes -> Extractor -> Chunker -> Embedder -> IndexRegistry
//!                                                       |
//! Question -> Embedder -> search <----------------------+
//!                            |
//!                  PromptAssembler -> Generator -> Answer
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::chunk::{ChunkMetadata, Chunker};
use crate::config::PipelineConfig;
use crate::embed::SharedEmbedder;
use crate::extract::{PdfExtractor, TextExtractor};
use crate::generate::Generator;
use crate::prompt::PromptAssembler;
use crate::retrieve::{RetrievedContext, Retriever};
use crate::store::{IndexId, IndexRegistry};
use crate::{Error, Result};

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub index: IndexId,
    pub chunks: usize,
    pub dimension: usize,
    pub path: PathBuf,
}

impl IngestReport {
    pub fn message(&self) -> String {
        format!(
            "PDF processed and index '{}' built from {} chunks.",
            self.index, self.chunks
        )
    }
}

/// Generated answer and the passages it was conditioned on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub context: RetrievedContext,
}

pub struct DocumentQa {
    config: PipelineConfig,
    chunker: Box<dyn Chunker>,
    extractor: Arc<dyn TextExtractor>,
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
}

impl DocumentQa {
    pub fn new(
        config: PipelineConfig,
        embedder: SharedEmbedder,
        indexes: Arc<IndexRegistry>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        if config.top_k == 0 {
            return Err(Error::InvalidInput("top_k must be greater than 0".into()));
        }

        Ok(Self {
            chunker: config.chunking.chunker()?,
            extractor: Arc::new(PdfExtractor),
            retriever: Retriever::new(embedder, indexes),
            assembler: PromptAssembler::new(config.instruction.clone()),
            generator,
            config,
        })
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Extract, chunk, embed, and replace index `id` with the document.
    pub async fn ingest_pdf(&self, id: &IndexId, bytes: Vec<u8>) -> Result<IngestReport> {
        let extractor = Arc::clone(&self.extractor);
        let max_pages = self.config.max_pages;
        let text = tokio::task::spawn_blocking(move || extractor.extract(&bytes, max_pages))
            .await
            .map_err(|e| Error::Extraction(format!("extraction task failed: {e}")))??;

        self.ingest_text(id, &text).await
    }

    /// Chunk, embed, and replace index `id` with `text`.
    pub async fn ingest_text(&self, id: &IndexId, text: &str) -> Result<IngestReport> {
        // scanned PDFs extract to whitespace only
        if text.trim().is_empty() {
            return Err(Error::IndexBuild("document contains no text".to_string()));
        }

        let metadata = ChunkMetadata {
            source_id: Some(id.to_string()),
            ..Default::default()
        };
        let chunks = self.chunker.chunk(text, metadata);
        tracing::info!(
            index = %id,
            chunks = chunks.len(),
            strategy = self.chunker.name(),
            "chunked document"
        );

        let index = self.retriever.index(id, &chunks).await?;

        Ok(IngestReport {
            index: id.clone(),
            chunks: index.len(),
            dimension: index.dimension(),
            path: self.retriever.indexes().path_for(id),
        })
    }

    /// Answer `question` from the passages of index `id`.
    ///
    /// Leading and trailing whitespace is trimmed from the question before
    /// it is embedded and placed in the prompt.
    pub async fn ask(&self, id: &IndexId, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question is empty".to_string()));
        }

        let context = self
            .retriever
            .retrieve(id, question, self.config.top_k)
            .await?;
        let prompt = self.assembler.assemble(question, &context);

        tracing::debug!(
            index = %id,
            passages = context.len(),
            model = self.generator.model_id(),
            "generating answer"
        );
        let text = self.generator.generate(&prompt).await?;

        Ok(Answer { text, context })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Echoes the prompt back and remembers it.
    #[derive(Default)]
    struct EchoGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(format!("echo: {}", prompt.len()))
        }

        fn model_id(&self) -> &str {
            "echo"
        }
    }

    /// Treats the uploaded bytes as UTF-8 text.
    struct PlainText;

    impl TextExtractor for PlainText {
        fn extract(&self, bytes: &[u8], _max_pages: Option<usize>) -> Result<String> {
            String::from_utf8(bytes.to_vec()).map_err(|e| Error::Extraction(e.to_string()))
        }
    }

    fn pipeline(root: &std::path::Path, generator: Arc<EchoGenerator>) -> DocumentQa {
        let config = PipelineConfig {
            chunking: crate::config::ChunkingConfig {
                chunk_size: 20,
                chunk_overlap: 0,
                ..Default::default()
            },
            top_k: 1,
            ..Default::default()
        };
        DocumentQa::new(
            config,
            SharedEmbedder::new(HashEmbedder::new(256)),
            Arc::new(IndexRegistry::new(root)),
            generator,
        )
        .unwrap()
        .with_extractor(Arc::new(PlainText))
    }

    #[tokio::test]
    async fn test_ingest_then_ask() {
        let dir = tempdir().unwrap();
        let generator = Arc::new(EchoGenerator::default());
        let qa = pipeline(dir.path(), Arc::clone(&generator));
        let id = IndexId::default();

        let report = qa
            .ingest_pdf(&id, b"The sky is blue.    Grass is green.  ".to_vec())
            .await
            .unwrap();
        assert_eq!(report.chunks, 2);
        assert_eq!(report.dimension, 256);
        assert!(report.path.is_file());
        assert!(report.message().contains("2 chunks"));

        let answer = qa.ask(&id, "  What color is the sky?  ").await.unwrap();
        assert_eq!(answer.context.len(), 1);
        assert!(answer.context.texts()[0].contains("sky is blue"));

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Question:\nWhat color is the sky?\n\nAnswer:"));
        assert!(prompts[0].contains("The sky is blue."));
        assert!(!prompts[0].contains("Grass"));
        assert_eq!(answer.text, format!("echo: {}", prompts[0].len()));
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected_before_generation() {
        let dir = tempdir().unwrap();
        let generator = Arc::new(EchoGenerator::default());
        let qa = pipeline(dir.path(), Arc::clone(&generator));

        let err = qa.ask(&IndexId::default(), " \n ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ask_without_index() {
        let dir = tempdir().unwrap();
        let qa = pipeline(dir.path(), Arc::default());

        let err = qa.ask(&IndexId::default(), "anything?").await.unwrap_err();
        assert!(matches!(err, Error::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_document_keeps_previous_index() {
        let dir = tempdir().unwrap();
        let qa = pipeline(dir.path(), Arc::default());
        let id = IndexId::default();

        qa.ingest_text(&id, "Warranty lasts two years.").await.unwrap();
        let err = qa.ingest_text(&id, "   \n\n  ").await.unwrap_err();
        assert!(matches!(err, Error::IndexBuild(_)));

        let answer = qa.ask(&id, "How long is the warranty?").await.unwrap();
        assert!(answer.context.texts()[0].contains("Warranty"));
    }

    #[tokio::test]
    async fn test_indexes_are_independent() {
        let dir = tempdir().unwrap();
        let qa = pipeline(dir.path(), Arc::default());
        let manuals: IndexId = "manuals".parse().unwrap();
        let recipes: IndexId = "recipes".parse().unwrap();

        qa.ingest_text(&manuals, "Reset the router.").await.unwrap();
        qa.ingest_text(&recipes, "Bake the bread.").await.unwrap();

        let answer = qa.ask(&recipes, "How do I bake bread?").await.unwrap();
        assert_eq!(answer.context.texts(), vec!["Bake the bread."]);
    }

    #[test]
    fn test_zero_top_k_is_rejected() {
        let config = PipelineConfig {
            top_k: 0,
            ..Default::default()
        };
        let result = DocumentQa::new(
            config,
            SharedEmbedder::new(HashEmbedder::default()),
            Arc::new(IndexRegistry::new("unused")),
            Arc::new(EchoGenerator::default()),
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
