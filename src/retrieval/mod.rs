//! Hybrid passage retrieval
//!
//! The engine walks an ordered ladder of strategies and answers with the
//! first one that is available and succeeds:
//!
//! 1. [`VectorSearch`] over a ranked-search service (needs an index and an encoder)
//! 2. [`Bm25Search`] over the in-memory corpus
//! 3. [`LexicalOverlap`] counting shared query/document words
//!
//! Every strategy returns passages best-first with "higher is better" scores.
//! Scores are only comparable within one result set.

mod bm25;
mod embedder;
mod index;
mod overlap;
mod vector;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use bm25::{Bm25Params, Bm25Search};
pub use embedder::{EMBEDDING_MODEL, Embedder, unit_normalize};
pub use index::{CorpusIndex, chunk_text, load_text_files};
pub use overlap::{LexicalOverlap, overlap_score, rank_by_overlap};
pub use vector::{FlatIndex, NearestNeighbors, Neighbor, TextEncoder, VectorSearch};

use crate::Result;

/// A candidate passage with its relevance score (higher is better)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    /// Relevance score on the producing scorer's scale
    pub score: f32,
    /// Passage text
    pub text: String,
}

impl ScoredPassage {
    /// Create a scored passage
    #[must_use]
    pub fn new(score: f32, text: impl Into<String>) -> Self {
        Self {
            score,
            text: text.into(),
        }
    }
}

/// Sort passages best-first
///
/// The sort is stable, so equal scores keep their incoming (corpus) order.
pub fn sort_best_first(passages: &mut [ScoredPassage]) {
    passages.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// One rung of the retrieval ladder
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether the strategy's backing resource is loaded
    fn is_available(&self) -> bool;

    /// Return up to `k` passages ordered best-first
    ///
    /// # Errors
    ///
    /// Returns error if the backing service fails; the engine then moves on
    /// to the next strategy
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>>;
}

/// Retrieval engine holding an explicit, ordered strategy ladder
pub struct HybridRetriever {
    strategies: Vec<Box<dyn RetrievalStrategy>>,
}

impl HybridRetriever {
    /// Create an engine from an explicit strategy order
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn RetrievalStrategy>>) -> Self {
        Self { strategies }
    }

    /// Lexical-only engine (BM25, then word overlap) over `corpus`
    #[must_use]
    pub fn lexical(corpus: Vec<String>, params: Bm25Params) -> Self {
        let corpus: Arc<[String]> = corpus.into();
        Self::new(vec![
            Box::new(Bm25Search::new(Arc::clone(&corpus), params)),
            Box::new(LexicalOverlap::new(corpus)),
        ])
    }

    /// Build the full ladder from a persisted corpus index
    ///
    /// Vector search is only placed on the ladder when the index carries
    /// embeddings and an encoder is supplied.
    #[must_use]
    pub fn from_index(
        index: CorpusIndex,
        encoder: Option<Arc<dyn TextEncoder>>,
        params: Bm25Params,
    ) -> Self {
        let flat = index.flat_index();
        let corpus: Arc<[String]> = index.chunks.into();

        let mut strategies: Vec<Box<dyn RetrievalStrategy>> = Vec::with_capacity(3);
        match (flat, encoder) {
            (Some(flat), Some(encoder)) => {
                strategies.push(Box::new(VectorSearch::new(
                    encoder,
                    Arc::new(flat),
                    Arc::clone(&corpus),
                )));
            }
            (Some(_), None) => {
                tracing::info!("index has embeddings but no encoder configured, vector search disabled");
            }
            _ => {}
        }
        strategies.push(Box::new(Bm25Search::new(Arc::clone(&corpus), params)));
        strategies.push(Box::new(LexicalOverlap::new(corpus)));

        Self::new(strategies)
    }

    /// An engine with no strategies; every search returns nothing
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Whether at least one strategy can serve a search
    #[must_use]
    pub fn ready(&self) -> bool {
        self.strategies.iter().any(|s| s.is_available())
    }

    /// Name of the strategy that would be tried first
    #[must_use]
    pub fn active_strategy(&self) -> Option<&'static str> {
        self.strategies
            .iter()
            .find(|s| s.is_available())
            .map(|s| s.name())
    }

    /// Search for up to `k` passages, best-first
    ///
    /// Strategy failures are logged and fall through to the next rung. When
    /// nothing is available or everything fails the result is empty.
    pub async fn search(&self, query: &str, k: usize) -> Vec<ScoredPassage> {
        if k == 0 {
            return Vec::new();
        }

        for strategy in &self.strategies {
            if !strategy.is_available() {
                continue;
            }

            match strategy.search(query, k).await {
                Ok(mut passages) => {
                    sort_best_first(&mut passages);
                    passages.truncate(k);
                    tracing::debug!(
                        strategy = strategy.name(),
                        results = passages.len(),
                        "retrieval complete"
                    );
                    return passages;
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        error = %e,
                        "retrieval strategy failed, falling back"
                    );
                }
            }
        }

        Vec::new()
    }
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("HybridRetriever")
            .field("strategies", &names)
            .finish()
    }
}
