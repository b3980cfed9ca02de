//! Knowledge-base reply generation with fallbacks

use std::sync::Arc;

use wa_agent_core::BusinessProfile;

use crate::backend::LlmBackend;
use crate::knowledge::{KnowledgeRetriever, SearchResult};
use crate::prompt::PromptBuilder;

/// Reply used when neither the backend nor retrieval produced anything
pub const APOLOGY_REPLY: &str =
    "Maaf, kami belum bisa menjawab pertanyaan itu sekarang. Ketik *menu* untuk melihat daftar menu atau coba tanyakan lagi nanti ya 🙏";

/// Answers general questions for a tenant.
///
/// Retrieves the top-k documents and asks the backend for a reply. Without a
/// backend, or when it fails, the best snippet is returned as-is; with no
/// snippet either, a static apology.
pub struct KnowledgeResponder {
    retriever: Arc<dyn KnowledgeRetriever>,
    backend: Option<Arc<dyn LlmBackend>>,
    top_k: usize,
}

impl KnowledgeResponder {
    pub fn new(retriever: Arc<dyn KnowledgeRetriever>, top_k: usize) -> Self {
        Self {
            retriever,
            backend: None,
            top_k: top_k.max(1),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn LlmBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Produce a reply. Never fails.
    pub async fn reply(
        &self,
        profile: &BusinessProfile,
        message: &str,
        customer_name: Option<&str>,
    ) -> String {
        let results = match self
            .retriever
            .search(&profile.tenant_id, message, self.top_k)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(tenant_id = %profile.tenant_id, error = %e, "Knowledge retrieval failed");
                Vec::new()
            }
        };

        if let Some(backend) = &self.backend {
            let messages = PromptBuilder::new()
                .system_prompt(profile)
                .with_context(&results)
                .with_customer(customer_name)
                .user_message(message)
                .build();

            match backend.generate(&messages).await {
                Ok(result) => return result.text,
                Err(e) => {
                    tracing::warn!(
                        tenant_id = %profile.tenant_id,
                        model = %backend.model_name(),
                        error = %e,
                        "LLM generation failed, falling back to retrieved snippet"
                    );
                }
            }
        }

        Self::fallback(&results)
    }

    fn fallback(results: &[SearchResult]) -> String {
        match results.first() {
            Some(best) => format!("*{}*\n{}", best.title, best.content),
            None => APOLOGY_REPLY.to_string(),
        }
    }
}
