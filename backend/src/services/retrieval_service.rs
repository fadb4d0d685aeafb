//! Retrieval context for RAG-enabled requests
//!
//! Documents are chunked and embedded once at startup into an in-memory
//! index; queries are embedded per request and ranked by cosine similarity.
//! Nothing is persisted.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::llm::{LLMClient, LLMError};
use super::prompt_service::PromptService;
use crate::config::RetrievalConfig;

const MAX_CHUNK_CHARS: usize = 1000;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] LLMError),

    #[error("Failed to read documents: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Documents relevant to `query`, best first. Empty means no context.
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, RetrievalError>;
}

/// Retriever that never has context.
pub struct NoopRetriever;

#[async_trait]
impl ContextRetriever for NoopRetriever {
    async fn retrieve(&self, _query: &str) -> Result<Vec<String>, RetrievalError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    chunks: Vec<IndexedChunk>,
}

impl DocumentIndex {
    pub fn from_chunks(chunks: Vec<IndexedChunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embed every `.txt` / `.md` file directly under `dir`.
    pub async fn build(dir: &Path, client: &dyn LLMClient) -> Result<Self, RetrievalError> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_text = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"));
            if is_text {
                paths.push(path);
            }
        }
        paths.sort();

        let mut chunks = Vec::new();
        for path in &paths {
            let text = tokio::fs::read_to_string(path).await?;
            for chunk in chunk_paragraphs(&text, MAX_CHUNK_CHARS) {
                let embedding = client.embed(&chunk).await?;
                chunks.push(IndexedChunk { text: chunk, embedding });
            }
        }

        tracing::info!(
            "Indexed {} chunk(s) from {} document(s) in {}",
            chunks.len(),
            paths.len(),
            dir.display()
        );
        Ok(Self { chunks })
    }

    /// Top `top_k` chunks scoring at least `min_score`, best first.
    pub fn search(&self, query_embedding: &[f32], top_k: usize, min_score: f32) -> Vec<(f32, &str)> {
        let mut scored: Vec<(f32, &str)> = self
            .chunks
            .iter()
            .map(|c| (cosine_similarity(query_embedding, &c.embedding), c.text.as_str()))
            .filter(|(score, _)| *score >= min_score)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);
        scored
    }
}

pub struct EmbeddingRetriever {
    client: Arc<dyn LLMClient>,
    index: DocumentIndex,
    top_k: usize,
    min_score: f32,
}

impl EmbeddingRetriever {
    pub fn new(client: Arc<dyn LLMClient>, index: DocumentIndex, config: &RetrievalConfig) -> Self {
        Self { client, index, top_k: config.top_k, min_score: config.min_score }
    }

    /// Build the retriever from config, indexing `documents_dir` when set.
    pub async fn from_config(
        client: Arc<dyn LLMClient>,
        config: &RetrievalConfig,
    ) -> Result<Self, RetrievalError> {
        let index = match &config.documents_dir {
            Some(dir) => DocumentIndex::build(Path::new(dir), client.as_ref()).await?,
            None => {
                tracing::info!("No retrieval documents configured; RAG requests get no context");
                DocumentIndex::default()
            },
        };
        Ok(Self::new(client, index, config))
    }
}

#[async_trait]
impl ContextRetriever for EmbeddingRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, RetrievalError> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!("Getting RAG context");
        let enhanced = PromptService::enhance_query_for_retrieval(query);
        let embedding = self.client.embed(&enhanced).await?;

        let hits = self.index.search(&embedding, self.top_k, self.min_score);
        tracing::debug!("Retrieved {} chunk(s)", hits.len());
        Ok(hits.into_iter().map(|(_, text)| text.to_string()).collect())
    }
}

/// Split on blank lines, packing consecutive paragraphs up to `max_chars`.
/// Paragraphs longer than `max_chars` are cut on word boundaries, or inside a
/// word when a single word is still too long.
pub fn chunk_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let text = text.replace("\r\n", "\n");
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let para_len = para.chars().count();
        if para_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(hard_split(para, max_chars));
            continue;
        }
        if !current.is_empty() && current.chars().count() + para_len + 2 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn hard_split(para: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in para.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }
        if !current.is_empty() && current_len + 1 + word_len > max_chars {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
