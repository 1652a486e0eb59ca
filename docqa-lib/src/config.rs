//! Pipeline and watsonx.ai settings with their production defaults.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunk::{Chunker, FixedSizeChunker, ParagraphChunker};
use crate::prompt::DEFAULT_INSTRUCTION;
use crate::{Error, Result};

/// A string that never shows up in logs or debug output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Sliding character window
    #[default]
    Fixed,
    /// Whole paragraphs packed under the size bound
    Paragraph,
}

impl FromStr for ChunkStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "paragraph" => Ok(Self::Paragraph),
            other => Err(Error::InvalidInput(format!(
                "unknown chunk strategy {other:?} (expected \"fixed\" or \"paragraph\")"
            ))),
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fixed => "fixed",
            Self::Paragraph => "paragraph",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub strategy: ChunkStrategy,
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters repeated between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Fixed,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn chunker(&self) -> Result<Box<dyn Chunker>> {
        Ok(match self.strategy {
            ChunkStrategy::Fixed => Box::new(FixedSizeChunker::new(self.chunk_size, self.chunk_overlap)?),
            ChunkStrategy::Paragraph => {
                Box::new(ParagraphChunker::new(self.chunk_size, self.chunk_overlap)?)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    /// Passages retrieved per question
    pub top_k: usize,
    /// Only read this many pages of an uploaded PDF
    pub max_pages: Option<usize>,
    /// First paragraph of every prompt
    pub instruction: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: 3,
            max_pages: None,
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }
}

pub const DEFAULT_WATSONX_URL: &str = "https://us-south.ml.cloud.ibm.com";
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";
pub const DEFAULT_MODEL_ID: &str = "meta-llama/llama-3-3-70b-instruct";
pub const DEFAULT_API_VERSION: &str = "2024-03-29";

/// Settings for the watsonx.ai text generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatsonxConfig {
    /// Service root, e.g. `https://us-south.ml.cloud.ibm.com`
    pub base_url: String,
    /// IAM token endpoint
    pub iam_url: String,
    pub api_key: Secret,
    pub project_id: String,
    pub model_id: String,
    pub max_new_tokens: u32,
    pub api_version: String,
    /// Time budget for each outbound request
    pub timeout_secs: u64,
}

impl Default for WatsonxConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WATSONX_URL.to_string(),
            iam_url: DEFAULT_IAM_URL.to_string(),
            api_key: Secret::default(),
            project_id: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            max_new_tokens: 1024,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: 60,
        }
    }
}

impl WatsonxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        let missing = [
            ("api_key", self.api_key.is_empty()),
            ("project_id", self.project_id.is_empty()),
            ("base_url", self.base_url.is_empty()),
            ("iam_url", self.iam_url.is_empty()),
            ("model_id", self.model_id.is_empty()),
        ];
        if let Some((name, _)) = missing.iter().find(|(_, empty)| *empty) {
            return Err(Error::InvalidInput(format!("watsonx {name} is not configured")));
        }
        if self.max_new_tokens == 0 {
            return Err(Error::InvalidInput("max_new_tokens must be greater than 0".into()));
        }
        Ok(())
    }
}
