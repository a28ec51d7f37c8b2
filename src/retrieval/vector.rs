//! Vector search over a ranked nearest-neighbour service

use std::sync::Arc;

use async_trait::async_trait;

use super::{RetrievalStrategy, ScoredPassage, sort_best_first};
use crate::{Error, Result};

/// Turns text into an embedding vector
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Encode a single text
    ///
    /// # Errors
    ///
    /// Returns error if the embedding backend fails
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode many texts, preserving input order
    ///
    /// # Errors
    ///
    /// Returns error if any encoding fails
    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.encode(text).await?);
        }
        Ok(out)
    }
}

/// One hit reported by a nearest-neighbour service
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position in the passage list; may be out of range (e.g. `-1` padding)
    pub index: i64,
    /// Distance to the query, lower is closer
    pub distance: f32,
}

/// Opaque ranked-search service
pub trait NearestNeighbors: Send + Sync {
    /// Number of stored vectors
    fn len(&self) -> usize;

    /// Whether the service holds no vectors
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` neighbours of `query`, closest first
    ///
    /// # Errors
    ///
    /// Returns error if the query cannot be served (e.g. dimension mismatch)
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// Exhaustive inner-product index
///
/// Vectors are expected to be unit-normalized at build time. Distances are
/// reported as the negated inner product so that closer means smaller.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Build an index from equally sized vectors
    ///
    /// # Errors
    ///
    /// Returns error if the vectors do not share one dimension
    pub fn new(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dim = vectors.first().map_or(0, Vec::len);
        if let Some(bad) = vectors.iter().position(|v| v.len() != dim) {
            return Err(Error::Index(format!(
                "vector {bad} has dimension {}, expected {dim}",
                vectors[bad].len()
            )));
        }
        Ok(Self { dim, vectors })
    }

    /// Vector dimension (0 when empty)
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }
}

impl NearestNeighbors for FlatIndex {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    #[allow(clippy::cast_possible_wrap)]
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(Error::Index(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dim
            )));
        }

        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| Neighbor {
                index: i as i64,
                distance: -v.iter().zip(query).map(|(a, b)| a * b).sum::<f32>(),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }
}

/// First rung of the retrieval ladder
pub struct VectorSearch {
    encoder: Arc<dyn TextEncoder>,
    index: Arc<dyn NearestNeighbors>,
    corpus: Arc<[String]>,
}

impl VectorSearch {
    /// Create a vector search over `corpus`, whose i-th passage is the
    /// index's i-th vector
    #[must_use]
    pub fn new(
        encoder: Arc<dyn TextEncoder>,
        index: Arc<dyn NearestNeighbors>,
        corpus: Arc<[String]>,
    ) -> Self {
        Self {
            encoder,
            index,
            corpus,
        }
    }
}

#[async_trait]
impl RetrievalStrategy for VectorSearch {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn is_available(&self) -> bool {
        !self.corpus.is_empty() && !self.index.is_empty()
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>> {
        let embedding = self.encoder.encode(query).await?;
        let neighbors = self.index.search(&embedding, k)?;

        let mut passages: Vec<ScoredPassage> = neighbors
            .into_iter()
            .filter_map(|n| {
                let i = usize::try_from(n.index).ok()?;
                let text = self.corpus.get(i)?;
                Some(ScoredPassage::new(-n.distance, text.as_str()))
            })
            .collect();

        sort_best_first(&mut passages);
        Ok(passages)
    }
}
