//! Prompt construction for the generation call.
//!
//! The prompt is an observable artifact: given the same question and context
//! it is byte-for-byte the same string.

use crate::retrieve::RetrievedContext;

/// Instruction used when none is configured.
pub const DEFAULT_INSTRUCTION: &str =
    "You are an AI assistant. Answer the question based only on the following PDF context.";

/// Formats retrieved passages and a question into a generation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAssembler {
    instruction: String,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTION)
    }
}

impl PromptAssembler {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Passages are kept in rank order, whole, separated by a blank line.
    pub fn assemble(&self, question: &str, context: &RetrievedContext) -> String {
        let context = context.texts().join("\n\n");
        format!(
            "{instruction}\n\nContext:\n{context}\n\nQuestion:\n{question}\n\nAnswer:",
            instruction = self.instruction,
        )
    }
}
