//! Text embedding for vector retrieval

use async_trait::async_trait;

use super::vector::TextEncoder;
use crate::{Error, Result};

/// Default embedding model
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Text embedder using `OpenAI`'s embedding API
#[derive(Debug, Clone)]
pub struct Embedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Embedder {
    /// Create a new embedder with `OpenAI` API key
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_model(api_key, EMBEDDING_MODEL.to_string())
    }

    /// Create an embedder with a custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn with_model(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for embeddings".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    /// Point the embedder at an OpenAI-compatible server
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Model used for embeddings
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate embeddings for multiple texts
    ///
    /// # Errors
    ///
    /// Returns error if API call fails
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            input: &'a [&'a str],
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
            index: usize,
        }

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("embedding API error {status}: {body}")));
        }

        let mut result: EmbeddingResponse = response.json().await?;

        // Sort by index to maintain input order
        result.data.sort_by_key(|d| d.index);

        if result.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl TextEncoder for Embedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
    }

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.embed_batch(texts).await
    }
}

/// Scale `vector` to unit length in place; zero vectors are left untouched
pub fn unit_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key() {
        assert!(Embedder::new(String::new()).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let embedder = Embedder::new("key".to_string())
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(embedder.base_url, "http://localhost:8080/v1");
        assert_eq!(embedder.model(), EMBEDDING_MODEL);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let embedder = Embedder::new("key".to_string()).unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_unit_normalize() {
        let mut v = vec![3.0, 4.0];
        unit_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        unit_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
