//! Cross-encoder reranking over a `/rerank` HTTP endpoint
//!
//! Speaks the request/response shape shared by the common hosted and
//! self-hosted rerank servers: `{model, query, documents}` in,
//! `{results: [{index, relevance_score}]}` out.

use std::time::Duration;

use async_trait::async_trait;

use super::RelevanceScorer;
use crate::{Error, Result};

/// Default cross-encoder model name
pub const DEFAULT_RERANK_MODEL: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

/// Remote cross-encoder
#[derive(Debug, Clone)]
pub struct HttpCrossEncoder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpCrossEncoder {
    /// Create a client for the rerank endpoint at `url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn new(
        url: String,
        model: Option<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(Error::Config("rerank URL must not be empty".to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url,
            model: model.unwrap_or_else(|| DEFAULT_RERANK_MODEL.to_string()),
            api_key,
        })
    }
}

#[derive(serde::Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(serde::Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(serde::Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// Map `results` back onto candidate positions
fn scores_by_index(results: Vec<RerankResult>, expected: usize) -> Result<Vec<f32>> {
    let mut scores = vec![None; expected];
    for result in results {
        let slot = scores
            .get_mut(result.index)
            .ok_or_else(|| Error::Rerank(format!("result index {} out of range", result.index)))?;
        *slot = Some(result.relevance_score);
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| Error::Rerank(format!("no score for candidate {i}"))))
        .collect()
}

#[async_trait]
impl RelevanceScorer for HttpCrossEncoder {
    fn name(&self) -> &'static str {
        "cross-encoder"
    }

    async fn score(&self, query: &str, candidate: &str) -> Result<f32> {
        let scores = self.score_batch(query, &[candidate.to_string()]).await?;
        scores
            .into_iter()
            .next()
            .ok_or_else(|| Error::Rerank("empty rerank response".to_string()))
    }

    async fn score_batch(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        let request = RerankRequest {
            model: &self.model,
            query,
            documents: candidates,
        };

        let mut req = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rerank(format!("rerank API error {status}: {body}")));
        }

        let parsed: RerankResponse = response.json().await?;
        scores_by_index(parsed.results, candidates.len())
    }
}
