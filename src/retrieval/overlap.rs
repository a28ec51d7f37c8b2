//! Word-overlap scoring, the last rung of both ladders

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{RetrievalStrategy, ScoredPassage, sort_best_first};
use crate::Result;
use crate::text::tokenize;

/// Number of distinct lowercase words shared by `query` and `document`
#[must_use]
pub fn overlap_score(query: &str, document: &str) -> usize {
    let query_words: HashSet<String> = tokenize(query).into_iter().collect();
    let document_words: HashSet<String> = tokenize(document).into_iter().collect();
    query_words.intersection(&document_words).count()
}

/// Score `documents` by word overlap with `query`
///
/// Documents sharing no words are dropped; ties keep their input order.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rank_by_overlap<S: AsRef<str>>(query: &str, documents: &[S]) -> Vec<ScoredPassage> {
    let query_words: HashSet<String> = tokenize(query).into_iter().collect();

    let mut scored: Vec<ScoredPassage> = documents
        .iter()
        .filter_map(|doc| {
            let doc = doc.as_ref();
            let shared = tokenize(doc)
                .into_iter()
                .collect::<HashSet<_>>()
                .intersection(&query_words)
                .count();
            (shared > 0).then(|| ScoredPassage::new(shared as f32, doc))
        })
        .collect();

    sort_best_first(&mut scored);
    scored
}

/// Overlap ranking over the in-memory corpus
pub struct LexicalOverlap {
    corpus: Arc<[String]>,
}

impl LexicalOverlap {
    /// Create an overlap ranker over `corpus`
    #[must_use]
    pub const fn new(corpus: Arc<[String]>) -> Self {
        Self { corpus }
    }
}

#[async_trait]
impl RetrievalStrategy for LexicalOverlap {
    fn name(&self) -> &'static str {
        "overlap"
    }

    fn is_available(&self) -> bool {
        !self.corpus.is_empty()
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>> {
        let mut ranked = rank_by_overlap(query, &self.corpus[..]);
        ranked.truncate(k);
        Ok(ranked)
    }
}
