//! Okapi BM25 ranking over the in-memory corpus

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{RetrievalStrategy, ScoredPassage, sort_best_first};
use crate::Result;
use crate::text::tokenize;

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f64,
    /// Document length normalization
    pub b: f64,
    /// Floor for negative idf values, as a fraction of the mean non-negative idf
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// BM25 index built once over a tokenized corpus
pub struct Bm25Search {
    corpus: Arc<[String]>,
    params: Bm25Params,
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
}

impl Bm25Search {
    /// Tokenize `corpus` and precompute term statistics
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(corpus: Arc<[String]>, params: Bm25Params) -> Self {
        let mut term_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lens = Vec::with_capacity(corpus.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in corpus.iter() {
            let tokens = tokenize(doc);
            doc_lens.push(tokens.len());

            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_default() += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
            term_freqs.push(freqs);
        }

        let doc_count = corpus.len() as f64;
        let avg_doc_len = if corpus.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<usize>() as f64 / doc_count
        };

        // Terms present in more than half the corpus get a negative raw idf;
        // those are lifted to a small positive floor
        let mut idf = HashMap::with_capacity(doc_freq.len());
        let mut positive_sum = 0.0;
        let mut positive_count = 0_usize;
        let mut negative = Vec::new();
        for (term, freq) in doc_freq {
            let freq = freq as f64;
            let value = (doc_count - freq + 0.5).ln() - (freq + 0.5).ln();
            if value < 0.0 {
                negative.push(term.clone());
            } else {
                positive_sum += value;
                positive_count += 1;
            }
            idf.insert(term, value);
        }

        let floor = if positive_count == 0 {
            params.epsilon
        } else {
            params.epsilon * positive_sum / positive_count as f64
        };
        for term in negative {
            idf.insert(term, floor);
        }

        Self {
            corpus,
            params,
            term_freqs,
            doc_lens,
            avg_doc_len,
            idf,
        }
    }

    /// BM25 score of every corpus document for `query`, in corpus order
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let query_terms = tokenize(query);
        let Bm25Params { k1, b, .. } = self.params;
        let avg_doc_len = if self.avg_doc_len > 0.0 {
            self.avg_doc_len
        } else {
            1.0
        };

        self.term_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(freqs, &len)| {
                let norm = k1 * (1.0 - b + b * len as f64 / avg_doc_len);
                // Absent terms contribute nothing; skipping them also keeps an
                // empty document at b = 1 away from 0/0
                query_terms
                    .iter()
                    .filter_map(|term| {
                        let tf = *freqs.get(term)? as f64;
                        let idf = self.idf.get(term).copied().unwrap_or(0.0);
                        Some(idf * (tf * (k1 + 1.0)) / (tf + norm))
                    })
                    .sum()
            })
            .collect()
    }
}

#[async_trait]
impl RetrievalStrategy for Bm25Search {
    fn name(&self) -> &'static str {
        "bm25"
    }

    fn is_available(&self) -> bool {
        !self.corpus.is_empty()
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>> {
        let mut ranked: Vec<ScoredPassage> = self
            .scores(query)
            .into_iter()
            .zip(self.corpus.iter())
            .map(|(score, doc)| ScoredPassage::new(score as f32, doc.as_str()))
            .collect();

        sort_best_first(&mut ranked);
        ranked.truncate(k);
        Ok(ranked)
    }
}
