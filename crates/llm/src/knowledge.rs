//! Tenant knowledge documents and retrieval

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::LlmError;

/// A knowledge document (FAQ entry, opening hours, policy text)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub tenant_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// A retrieved document with its relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub content: String,
    pub score: f32,
}

/// Ranked retrieval of a tenant's documents
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, LlmError>;
}

/// Words too common in chat to carry meaning
const QUERY_STOPWORDS: &[&str] = &[
    "yang", "dan", "di", "ke", "dari", "apa", "apakah", "ada", "ini", "itu", "saya", "aku",
    "mau", "kak", "min", "dong", "ya", "gak", "tidak", "bisa", "untuk", "berapa", "kapan",
];

fn terms(text: &str) -> HashSet<String> {
    text.unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= 2 && !QUERY_STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Keyword-overlap retriever over documents held in memory.
///
/// Score is the fraction of query terms found in the document, with title
/// hits counted double.
#[derive(Default)]
pub struct InMemoryKnowledgeBase {
    documents: RwLock<Vec<KnowledgeDocument>>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<KnowledgeDocument>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Add or replace a document by id
    pub fn upsert(&self, document: KnowledgeDocument) {
        let mut documents = self.documents.write();
        match documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    fn score(query_terms: &HashSet<String>, document: &KnowledgeDocument) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let title = terms(&document.title);
        let content = terms(&document.content);

        let hits: f32 = query_terms
            .iter()
            .map(|t| {
                let mut s = 0.0;
                if title.contains(t) {
                    s += 2.0;
                }
                if content.contains(t) {
                    s += 1.0;
                }
                s
            })
            .sum();

        hits / (query_terms.len() as f32 * 3.0)
    }
}

#[async_trait]
impl KnowledgeRetriever for InMemoryKnowledgeBase {
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, LlmError> {
        let query_terms = terms(query);
        let documents = self.documents.read();

        let mut results: Vec<SearchResult> = documents
            .iter()
            .filter(|d| d.tenant_id == tenant_id)
            .filter_map(|d| {
                let score = Self::score(&query_terms, d);
                (score > 0.0).then(|| SearchResult {
                    id: d.id.clone(),
                    title: d.title.clone(),
                    content: d.content.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }
}
