//! TOML configuration file loading
//!
//! Supports `~/.config/voice-rag-agent/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice output configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Retrieval and reranking configuration
    #[serde(default)]
    pub retrieval: RetrievalFileConfig,

    /// Speculative pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// OpenAI-compatible base URL
    pub base_url: Option<String>,

    /// Model identifier (e.g. "openai/gpt-oss-120b")
    pub model: Option<String>,

    /// API key
    pub api_key: Option<String>,

    /// Max tokens per completion
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Voice output configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable spoken output
    pub enabled: Option<bool>,

    /// TTS provider ("openai" or "elevenlabs")
    pub provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
}

/// Retrieval configuration
#[derive(Debug, Default, Deserialize)]
pub struct RetrievalFileConfig {
    /// Path of the JSON corpus index
    pub index_path: Option<String>,

    /// Directory of source documents for ingest
    pub data_dir: Option<String>,

    /// Embedding model
    pub embedding_model: Option<String>,

    /// Embedding API key
    pub embedding_api_key: Option<String>,

    /// Embedding base URL (OpenAI-compatible)
    pub embedding_base_url: Option<String>,

    pub bm25_k1: Option<f64>,
    pub bm25_b: Option<f64>,

    /// Words per ingest chunk
    pub chunk_words: Option<usize>,

    /// Overlapping words between consecutive chunks
    pub chunk_stride: Option<usize>,

    /// Cross-encoder `/rerank` endpoint
    pub reranker_url: Option<String>,

    /// Cross-encoder model name
    pub reranker_model: Option<String>,

    pub reranker_api_key: Option<String>,
}

/// Pipeline tuning
#[derive(Debug, Default, Deserialize)]
pub struct PipelineFileConfig {
    /// Candidates fetched from retrieval
    pub retrieval_k: Option<usize>,

    /// Passages kept after reranking
    pub rerank_top_k: Option<usize>,

    /// Max words per spoken sentence in the final answer
    pub max_sentence_words: Option<usize>,

    /// Filler spoken when filler generation fails
    pub default_filler: Option<String>,

    /// Where metrics are dumped
    pub metrics_path: Option<String>,
}

/// Load the TOML config file from `path`, or the standard path when `None`
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file(path: Option<&Path>) -> ConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voice-rag-agent/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-rag-agent").join("config.toml"))
}
