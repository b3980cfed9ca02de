//! Knowledge-base reply path
//!
//! Answers messages the order flow does not handle:
//! - Keyword retrieval over a tenant's knowledge documents
//! - Prompt construction around the retrieved snippets
//! - OpenAI-compatible chat completion backend
//! - `KnowledgeResponder`, which degrades to the best snippet when the
//!   backend is unavailable

pub mod backend;
pub mod knowledge;
pub mod prompt;
pub mod responder;

pub use backend::{FinishReason, GenerationResult, LlmBackend, OpenAIBackend, OpenAIConfig};
pub use knowledge::{InMemoryKnowledgeBase, KnowledgeDocument, KnowledgeRetriever, SearchResult};
pub use prompt::{Message, PromptBuilder, Role};
pub use responder::KnowledgeResponder;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}
