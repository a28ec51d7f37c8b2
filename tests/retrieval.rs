//! Retrieval, reranking and rewriting integration tests

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use voice_rag_agent::retrieval::{
    Bm25Params, CorpusIndex, HybridRetriever, ScoredPassage, TextEncoder, load_text_files,
    rank_by_overlap,
};
use voice_rag_agent::{Error, QueryRewriter, RelevanceScorer, Reranker, Result};

/// Keyword-count embedding over a fixed vocabulary
struct KeywordEncoder {
    fail: bool,
}

const VOCABULARY: [&str; 3] = ["refund", "shipping", "gift"];

#[async_trait]
impl TextEncoder for KeywordEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(Error::Embedding("encoder offline".to_string()));
        }
        let lower = text.to_lowercase();
        Ok(VOCABULARY
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect())
    }
}

fn write_corpus(dir: &Path) {
    std::fs::write(
        dir.join("returns.md"),
        "Request a refund within 30 days. The refund goes to the original card.",
    )
    .unwrap();
    std::fs::write(
        dir.join("shipping.txt"),
        "Standard shipping takes five days. Express shipping takes two.",
    )
    .unwrap();
    std::fs::write(dir.join("gifts.txt"), "A gift card never expires.").unwrap();
    std::fs::write(dir.join("manual.pdf"), "not text").unwrap();
}

fn assert_best_first(passages: &[ScoredPassage]) {
    assert!(
        passages.windows(2).all(|w| w[0].score >= w[1].score),
        "scores not non-increasing: {passages:?}"
    );
}

async fn ingested_index(dir: &Path) -> CorpusIndex {
    write_corpus(dir);
    let documents = load_text_files(dir).unwrap();
    assert_eq!(documents.len(), 3);

    let mut index = CorpusIndex::build(&documents, 200, 50);
    index
        .embed(&KeywordEncoder { fail: false }, "keywords")
        .await
        .unwrap();

    let path = dir.join("index").join("index.json");
    index.save(&path).unwrap();
    CorpusIndex::load(&path).unwrap()
}

#[tokio::test]
async fn test_ingested_index_serves_vector_search() {
    let dir = tempfile::TempDir::new().unwrap();
    let index = ingested_index(dir.path()).await;
    assert_eq!(index.chunks.len(), 3);
    assert_eq!(index.embedding_model.as_deref(), Some("keywords"));

    let retriever = HybridRetriever::from_index(
        index,
        Some(Arc::new(KeywordEncoder { fail: false })),
        Bm25Params::default(),
    );
    assert_eq!(retriever.active_strategy(), Some("vector"));

    let results = retriever.search("how do I get a refund", 8).await;
    assert_eq!(results.len(), 3);
    assert!(results[0].text.contains("refund"));
    assert!((results[0].score - 1.0).abs() < 1e-5);
    assert_best_first(&results);

    let top_one = retriever.search("shipping", 1).await;
    assert_eq!(top_one.len(), 1);
    assert!(top_one[0].text.contains("shipping"));
}

#[tokio::test]
async fn test_failing_encoder_falls_back_to_bm25() {
    let dir = tempfile::TempDir::new().unwrap();
    let index = ingested_index(dir.path()).await;

    let retriever = HybridRetriever::from_index(
        index,
        Some(Arc::new(KeywordEncoder { fail: true })),
        Bm25Params::default(),
    );

    let results = retriever.search("express shipping", 8).await;
    assert_eq!(results.len(), 3);
    assert!(results[0].text.starts_with("Standard shipping"));
    assert!(results[0].score > 0.0);
    assert_best_first(&results);
}

#[tokio::test]
async fn test_index_without_encoder_is_lexical() {
    let dir = tempfile::TempDir::new().unwrap();
    let index = ingested_index(dir.path()).await;

    let retriever = HybridRetriever::from_index(index, None, Bm25Params::default());
    assert_eq!(retriever.active_strategy(), Some("bm25"));

    let results = retriever.search("gift card", 2).await;
    assert_eq!(results.len(), 2);
    assert!(results[0].text.starts_with("A gift card"));
}

#[tokio::test]
async fn test_empty_corpus_returns_nothing() {
    let retriever = HybridRetriever::lexical(Vec::new(), Bm25Params::default());
    assert!(!retriever.ready());
    assert!(retriever.search("returns policy", 8).await.is_empty());
}

#[test]
fn test_overlap_ranks_matching_candidate_first() {
    let ranked = rank_by_overlap("red car price", &["the red car costs a lot", "blue bike"]);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].text, "the red car costs a lot");
    assert!(ranked[0].score >= 2.0);
}

/// Scores by candidate length, counting calls
struct LengthScorer {
    calls: AtomicUsize,
    fail: bool,
}

impl LengthScorer {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }
}

#[async_trait]
impl RelevanceScorer for LengthScorer {
    fn name(&self) -> &'static str {
        "length"
    }

    async fn score(&self, _query: &str, candidate: &str) -> Result<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Rerank("model unavailable".to_string()));
        }
        Ok(candidate.len() as f32)
    }
}

fn candidates() -> Vec<String> {
    vec![
        "red car".to_string(),
        "a very long red car description".to_string(),
        "blue bike".to_string(),
        "medium red car text".to_string(),
    ]
}

#[tokio::test]
async fn test_model_rerank_orders_and_truncates() {
    let scorer = LengthScorer::new(false);
    let reranker = Reranker::with_scorer(scorer.clone());

    let ranked = reranker.rerank("red car", &candidates(), 3).await;
    let texts: Vec<&str> = ranked.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["a very long red car description", "medium red car text", "blue bike"]
    );
    assert_best_first(&ranked);
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_failing_model_falls_back_to_overlap() {
    let reranker = Reranker::with_scorer(LengthScorer::new(true));

    let ranked = reranker.rerank("red car", &candidates(), 3).await;
    let texts: Vec<&str> = ranked.iter().map(|p| p.text.as_str()).collect();
    // Overlap excludes "blue bike"; equal scores keep candidate order
    assert_eq!(
        texts,
        vec!["red car", "a very long red car description", "medium red car text"]
    );
    assert_best_first(&ranked);
}

#[tokio::test]
async fn test_empty_candidates_skip_the_model() {
    let scorer = LengthScorer::new(false);
    let reranker = Reranker::with_scorer(scorer.clone());

    assert!(reranker.rerank("anything", &[], 3).await.is_empty());
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_rewriter_attaches_last_turn() {
    let rewriter = QueryRewriter::new();
    let rewritten = rewriter.rewrite("what about it?", &["I bought a car".to_string()]);
    assert!(rewritten.contains("what about it?"));
    assert!(rewritten.contains("I bought a car"));

    assert_eq!(rewriter.rewrite("hello", &[]), "hello");
    assert_eq!(
        rewriter.rewrite("tell me about pricing", &["I bought a car".to_string()]),
        "tell me about pricing"
    );
}
