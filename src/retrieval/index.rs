//! Corpus ingest and the persisted passage index
//!
//! Source documents are split into overlapping word windows, optionally
//! embedded, and written as a single JSON file that the retrieval engine
//! loads at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::embedder::unit_normalize;
use super::vector::{FlatIndex, TextEncoder};
use crate::{Error, Result};

/// File extensions picked up by [`load_text_files`]
const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Chunks embedded per encoder request during ingest
const EMBED_BATCH: usize = 64;

/// Persisted passage index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusIndex {
    /// Passage texts
    pub chunks: Vec<String>,
    /// For each chunk, the position of its source in `source_docs`
    pub sources: Vec<usize>,
    /// Source file paths
    pub source_docs: Vec<String>,
    /// Unit-normalized chunk embeddings, parallel to `chunks`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<Vec<Vec<f32>>>,
    /// Model that produced `embeddings`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

impl CorpusIndex {
    /// Chunk `documents` (path, text) into a lexical-only index
    #[must_use]
    pub fn build(documents: &[(PathBuf, String)], chunk_words: usize, stride: usize) -> Self {
        let mut index = Self::default();

        for (doc_idx, (path, text)) in documents.iter().enumerate() {
            index.source_docs.push(path.display().to_string());
            for chunk in chunk_text(text, chunk_words, stride) {
                index.chunks.push(chunk);
                index.sources.push(doc_idx);
            }
        }

        tracing::info!(
            chunks = index.chunks.len(),
            documents = documents.len(),
            "built corpus index"
        );
        index
    }

    /// Embed every chunk with `encoder`, unit-normalizing the vectors
    ///
    /// # Errors
    ///
    /// Returns error if the encoder fails or returns the wrong count
    pub async fn embed(&mut self, encoder: &dyn TextEncoder, model: &str) -> Result<()> {
        let mut embeddings = Vec::with_capacity(self.chunks.len());

        for batch in self.chunks.chunks(EMBED_BATCH) {
            let texts: Vec<&str> = batch.iter().map(String::as_str).collect();
            let vectors = encoder.encode_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(Error::Embedding(format!(
                    "encoder returned {} vectors for {} chunks",
                    vectors.len(),
                    texts.len()
                )));
            }
            embeddings.extend(vectors);
            tracing::debug!(done = embeddings.len(), total = self.chunks.len(), "embedded chunks");
        }

        for vector in &mut embeddings {
            unit_normalize(vector);
        }

        self.embeddings = Some(embeddings);
        self.embedding_model = Some(model.to_string());
        Ok(())
    }

    /// Inner-product index over the embeddings, if present and consistent
    #[must_use]
    pub fn flat_index(&self) -> Option<FlatIndex> {
        let embeddings = self.embeddings.as_ref()?;
        if embeddings.len() != self.chunks.len() {
            tracing::warn!(
                embeddings = embeddings.len(),
                chunks = self.chunks.len(),
                "embedding count does not match chunk count, ignoring embeddings"
            );
            return None;
        }

        match FlatIndex::new(embeddings.clone()) {
            Ok(index) => Some(index),
            Err(e) => {
                tracing::warn!(error = %e, "invalid embeddings in index");
                None
            }
        }
    }

    /// Write the index as JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec(self)?)?;
        tracing::info!(path = %path.display(), chunks = self.chunks.len(), "saved corpus index");
        Ok(())
    }

    /// Read an index written by [`CorpusIndex::save`]
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or malformed
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let index: Self = serde_json::from_slice(&bytes)?;
        if index.sources.len() != index.chunks.len() {
            return Err(Error::Index(format!(
                "{}: {} chunks but {} source entries",
                path.display(),
                index.chunks.len(),
                index.sources.len()
            )));
        }
        Ok(index)
    }
}

/// Split `text` into windows of `max_words` words overlapping by `stride`
///
/// The last window ends at the final word; no trailing fragment is emitted
/// once a window reaches the end.
#[must_use]
pub fn chunk_text(text: &str, max_words: usize, stride: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let max_words = max_words.max(1);
    let step = max_words.saturating_sub(stride).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + max_words).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Read `.txt` and `.md` files from `dir` in file-name order
///
/// A missing directory yields no documents. Invalid UTF-8 is replaced
/// rather than rejected.
///
/// # Errors
///
/// Returns error if the directory exists but cannot be listed
pub fn load_text_files(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    if !dir.exists() {
        tracing::warn!(path = %dir.display(), "data directory does not exist");
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_text_extension(p))
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match std::fs::read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                documents.push((path, text));
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read document");
            }
        }
    }

    Ok(documents)
}

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TEXT_EXTENSIONS.iter().any(|t| e.eq_ignore_ascii_case(t)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_chunk_short_text() {
        assert_eq!(chunk_text("a b c", 200, 50), vec!["a b c"]);
        assert!(chunk_text("   ", 200, 50).is_empty());
    }

    #[test]
    fn test_chunk_windows_overlap() {
        let chunks = chunk_text(&words(10), 4, 1);
        assert_eq!(
            chunks,
            vec!["w0 w1 w2 w3", "w3 w4 w5 w6", "w6 w7 w8 w9"]
        );
    }

    #[test]
    fn test_chunk_stride_not_smaller_than_window() {
        // Would never advance with step 0; must still terminate
        let chunks = chunk_text(&words(3), 2, 5);
        assert_eq!(chunks, vec!["w0 w1", "w1 w2"]);
    }

    #[test]
    fn test_build_tracks_sources() {
        let docs = vec![
            (PathBuf::from("a.txt"), words(5)),
            (PathBuf::from("b.txt"), "short".to_string()),
        ];
        let index = CorpusIndex::build(&docs, 3, 1);

        assert_eq!(index.chunks.len(), 3);
        assert_eq!(index.sources, vec![0, 0, 1]);
        assert_eq!(index.source_docs, vec!["a.txt", "b.txt"]);
        assert!(index.flat_index().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("index.json");

        let mut index = CorpusIndex::build(&[(PathBuf::from("a.md"), words(4))], 200, 50);
        index.embeddings = Some(vec![vec![1.0, 0.0]]);
        index.save(&path).unwrap();

        let loaded = CorpusIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.flat_index().unwrap().dim(), 2);
    }

    #[test]
    fn test_mismatched_embeddings_ignored() {
        let mut index = CorpusIndex::build(&[(PathBuf::from("a.md"), words(4))], 200, 50);
        index.embeddings = Some(Vec::new());
        assert!(index.flat_index().is_none());
    }

    #[test]
    fn test_load_text_files_filters_and_sorts() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "second").unwrap();
        std::fs::write(dir.path().join("a.MD"), "first").unwrap();
        std::fs::write(dir.path().join("c.json"), "{}").unwrap();
        std::fs::write(dir.path().join("d.txt"), b"f\xffo").unwrap();

        let docs = load_text_files(dir.path()).unwrap();
        let texts: Vec<&str> = docs.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "f\u{fffd}o"]);
    }

    #[test]
    fn test_missing_data_dir() {
        let docs = load_text_files(Path::new("/nonexistent/voicerag/data")).unwrap();
        assert!(docs.is_empty());
    }
}
