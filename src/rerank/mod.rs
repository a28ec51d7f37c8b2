//! Second-pass relevance reranking
//!
//! Candidates from retrieval are rescored with a pairwise relevance model
//! when one is configured. Without a model, or when it fails, word overlap
//! decides the order.

mod http;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;

pub use http::{DEFAULT_RERANK_MODEL, HttpCrossEncoder};

use crate::Result;
use crate::retrieval::{ScoredPassage, rank_by_overlap, sort_best_first};

/// Pairwise (query, candidate) relevance model
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Relevance of `candidate` to `query`, higher is better
    ///
    /// # Errors
    ///
    /// Returns error if the model call fails
    async fn score(&self, query: &str, candidate: &str) -> Result<f32>;

    /// Score every candidate, preserving input order
    ///
    /// # Errors
    ///
    /// Returns error if any pair fails to score
    async fn score_batch(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        try_join_all(candidates.iter().map(|c| self.score(query, c))).await
    }
}

/// One rung of the rerank ladder
#[derive(Clone)]
enum RerankStep {
    Model(Arc<dyn RelevanceScorer>),
    Overlap,
}

/// Reorders and truncates retrieval candidates
#[derive(Clone)]
pub struct Reranker {
    steps: Vec<RerankStep>,
}

impl Default for Reranker {
    fn default() -> Self {
        Self::lexical()
    }
}

impl Reranker {
    /// Reranker that only uses word overlap
    #[must_use]
    pub fn lexical() -> Self {
        Self {
            steps: vec![RerankStep::Overlap],
        }
    }

    /// Reranker that tries `scorer` first and falls back to word overlap
    #[must_use]
    pub fn with_scorer(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            steps: vec![RerankStep::Model(scorer), RerankStep::Overlap],
        }
    }

    /// Whether a relevance model is configured
    #[must_use]
    pub fn has_model(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, RerankStep::Model(_)))
    }

    /// Return at most `top_k` candidates ordered best-first
    ///
    /// Empty input returns immediately without touching the model.
    pub async fn rerank(&self, query: &str, candidates: &[String], top_k: usize) -> Vec<ScoredPassage> {
        if candidates.is_empty() || top_k == 0 {
            return Vec::new();
        }

        for step in &self.steps {
            match step {
                RerankStep::Model(scorer) => match scorer.score_batch(query, candidates).await {
                    Ok(scores) if scores.len() == candidates.len() => {
                        let mut ranked: Vec<ScoredPassage> = scores
                            .into_iter()
                            .zip(candidates)
                            .map(|(score, text)| ScoredPassage::new(score, text.as_str()))
                            .collect();
                        sort_best_first(&mut ranked);
                        ranked.truncate(top_k);
                        tracing::debug!(scorer = scorer.name(), kept = ranked.len(), "reranked");
                        return ranked;
                    }
                    Ok(scores) => {
                        tracing::warn!(
                            scorer = scorer.name(),
                            expected = candidates.len(),
                            got = scores.len(),
                            "rerank score count mismatch, falling back"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(scorer = scorer.name(), error = %e, "rerank model failed, falling back");
                    }
                },
                RerankStep::Overlap => {
                    let mut ranked = rank_by_overlap(query, candidates);
                    ranked.truncate(top_k);
                    return ranked;
                }
            }
        }

        Vec::new()
    }
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("has_model", &self.has_model())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::Error;

    /// Scores by candidate length and counts calls
    #[derive(Default)]
    struct LengthScorer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RelevanceScorer for LengthScorer {
        fn name(&self) -> &'static str {
            "length"
        }

        #[allow(clippy::cast_precision_loss)]
        async fn score(&self, _query: &str, candidate: &str) -> Result<f32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(candidate.len() as f32)
        }
    }

    struct BrokenScorer;

    #[async_trait]
    impl RelevanceScorer for BrokenScorer {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn score(&self, _query: &str, _candidate: &str) -> Result<f32> {
            Err(Error::Rerank("model not loaded".to_string()))
        }
    }

    fn candidates() -> Vec<String> {
        vec![
            "the red car costs a lot".to_string(),
            "blue bike".to_string(),
            "a shiny red car".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_model() {
        let scorer = Arc::new(LengthScorer::default());
        let reranker = Reranker::with_scorer(scorer.clone());

        assert!(reranker.rerank("query", &[], 3).await.is_empty());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_scores_sorted() {
        let scorer = Arc::new(LengthScorer::default());
        let reranker = Reranker::with_scorer(scorer.clone());

        let ranked = reranker.rerank("red car", &candidates(), 2).await;
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "the red car costs a lot");
        assert_eq!(ranked[1].text, "a shiny red car");
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_broken_model_falls_back_to_overlap() {
        let reranker = Reranker::with_scorer(Arc::new(BrokenScorer));
        let ranked = reranker.rerank("red car price", &candidates(), 3).await;

        let texts: Vec<&str> = ranked.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["the red car costs a lot", "a shiny red car"]);
    }

    #[tokio::test]
    async fn test_lexical_overlap_example() {
        let reranker = Reranker::lexical();
        let docs = vec!["the red car costs a lot".to_string(), "blue bike".to_string()];
        let ranked = reranker.rerank("red car price", &docs, 3).await;

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].text, "the red car costs a lot");
        assert!(ranked[0].score >= 2.0);
        assert!(!reranker.has_model());
    }
}
