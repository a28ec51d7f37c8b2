//! Configuration management
//!
//! Values resolve env > TOML file > default. The environment lookup is
//! injectable so resolution can be tested without touching process state.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::{DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL};
use crate::retrieval::{Bm25Params, EMBEDDING_MODEL};
use crate::voice::TtsProvider;
use crate::{Error, Result};

use file::ConfigFile;

/// Agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Language model settings
    pub llm: LlmConfig,

    /// Spoken output settings
    pub voice: VoiceConfig,

    /// Retrieval and reranking settings
    pub retrieval: RetrievalConfig,

    /// Speculative pipeline tuning
    pub pipeline: PipelineConfig,
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// API key (`VOICERAG_LLM_API_KEY`, `GROQ_API_KEY` or `OPENAI_API_KEY`)
    pub api_key: Option<String>,

    /// Max tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Per-request timeout; unbounded when `None`
    pub timeout: Option<Duration>,
}

/// Voice output configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Speak through TTS; when false output is only logged
    pub enabled: bool,

    /// TTS backend
    pub provider: TtsProvider,

    /// TTS model (e.g. "tts-1", "eleven_monolingual_v1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Per-request timeout; unbounded when `None`
    pub timeout: Option<Duration>,

    /// `OpenAI` API key for TTS
    pub openai_api_key: Option<String>,

    /// ElevenLabs API key for TTS
    pub elevenlabs_api_key: Option<String>,
}

/// Retrieval configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// JSON corpus index written by `ingest`
    pub index_path: PathBuf,

    /// Source documents for `ingest`
    pub data_dir: PathBuf,

    /// Embedding model
    pub embedding_model: String,

    /// Embedding API key; vector search is disabled without one
    pub embedding_api_key: Option<String>,

    /// Embedding base URL override
    pub embedding_base_url: Option<String>,

    /// BM25 parameters
    pub bm25: Bm25Params,

    /// Words per ingest chunk
    pub chunk_words: usize,

    /// Overlapping words between consecutive chunks
    pub chunk_stride: usize,

    /// Cross-encoder `/rerank` endpoint; lexical reranking without one
    pub reranker_url: Option<String>,

    /// Cross-encoder model name
    pub reranker_model: Option<String>,

    /// Cross-encoder API key
    pub reranker_api_key: Option<String>,
}

/// Speculative pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Candidates fetched from retrieval
    pub retrieval_k: usize,

    /// Passages kept after reranking
    pub rerank_top_k: usize,

    /// Max words per spoken sentence in the final answer
    pub max_sentence_words: usize,

    /// Filler spoken when filler generation fails; empty means stay silent
    pub default_filler: String,

    /// Where metrics are dumped
    pub metrics_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval_k: 8,
            rerank_top_k: 3,
            max_sentence_words: 18,
            default_filler: "Let me check that for you.".to_string(),
            metrics_path: PathBuf::from("realtime_metrics.json"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(ConfigFile::default(), |_| None)
    }
}

/// Return the data directory (`~/.local/share/voice-rag-agent` on Linux)
#[must_use]
pub fn data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/voice-rag-agent"),
        |d| d.data_dir().join("voice-rag-agent"),
    )
}

fn parse_secs(value: Option<String>) -> Option<u64> {
    value.and_then(|s| s.trim().parse().ok())
}

impl Config {
    /// Load configuration from the environment and the TOML file
    ///
    /// `path` overrides the default config file location.
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(path);
        let config = Self::resolve(fc, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Resolve a config from a parsed file and an environment lookup
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn resolve(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let openai_key = env("OPENAI_API_KEY");

        let llm = LlmConfig {
            base_url: env("VOICERAG_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: env("VOICERAG_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            api_key: env("VOICERAG_LLM_API_KEY")
                .or_else(|| env("GROQ_API_KEY"))
                .or(fc.llm.api_key)
                .or_else(|| openai_key.clone()),
            max_tokens: fc.llm.max_tokens.unwrap_or(1024),
            temperature: fc.llm.temperature.unwrap_or(0.7),
            timeout: parse_secs(env("VOICERAG_LLM_TIMEOUT_SECS"))
                .or(fc.llm.timeout_secs)
                .map(Duration::from_secs),
        };

        let provider_name = env("VOICERAG_TTS_PROVIDER").or(fc.voice.provider);
        let provider = provider_name
            .as_deref()
            .and_then(TtsProvider::from_name)
            .unwrap_or(TtsProvider::OpenAI);
        let default_tts_model = match provider {
            TtsProvider::OpenAI => "tts-1",
            TtsProvider::ElevenLabs => "eleven_monolingual_v1",
        };

        let voice = VoiceConfig {
            enabled: fc.voice.enabled.unwrap_or(true),
            provider,
            tts_model: env("VOICERAG_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| default_tts_model.to_string()),
            tts_voice: env("VOICERAG_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            timeout: fc.voice.timeout_secs.map(Duration::from_secs),
            openai_api_key: openai_key.clone().or(fc.voice.openai_api_key),
            elevenlabs_api_key: env("ELEVENLABS_API_KEY").or(fc.voice.elevenlabs_api_key),
        };

        let defaults = Bm25Params::default();
        let retrieval = RetrievalConfig {
            index_path: env("VOICERAG_INDEX_PATH")
                .or(fc.retrieval.index_path)
                .map_or_else(|| data_dir().join("index.json"), PathBuf::from),
            data_dir: env("VOICERAG_DATA_DIR")
                .or(fc.retrieval.data_dir)
                .map_or_else(|| PathBuf::from("data"), PathBuf::from),
            embedding_model: fc
                .retrieval
                .embedding_model
                .unwrap_or_else(|| EMBEDDING_MODEL.to_string()),
            embedding_api_key: fc.retrieval.embedding_api_key.or(openai_key),
            embedding_base_url: fc.retrieval.embedding_base_url,
            bm25: Bm25Params {
                k1: fc.retrieval.bm25_k1.unwrap_or(defaults.k1),
                b: fc.retrieval.bm25_b.unwrap_or(defaults.b),
                ..defaults
            },
            chunk_words: fc.retrieval.chunk_words.unwrap_or(200),
            chunk_stride: fc.retrieval.chunk_stride.unwrap_or(50),
            reranker_url: env("VOICERAG_RERANK_URL").or(fc.retrieval.reranker_url),
            reranker_model: fc.retrieval.reranker_model,
            reranker_api_key: env("VOICERAG_RERANK_API_KEY").or(fc.retrieval.reranker_api_key),
        };

        let pipeline_defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            retrieval_k: fc.pipeline.retrieval_k.unwrap_or(pipeline_defaults.retrieval_k),
            rerank_top_k: fc.pipeline.rerank_top_k.unwrap_or(pipeline_defaults.rerank_top_k),
            max_sentence_words: fc
                .pipeline
                .max_sentence_words
                .unwrap_or(pipeline_defaults.max_sentence_words),
            default_filler: fc
                .pipeline
                .default_filler
                .unwrap_or(pipeline_defaults.default_filler),
            metrics_path: env("VOICERAG_METRICS_PATH")
                .or(fc.pipeline.metrics_path)
                .map_or(pipeline_defaults.metrics_path, PathBuf::from),
        };

        if let Some(name) = provider_name.filter(|n| TtsProvider::from_name(n).is_none()) {
            tracing::warn!(provider = %name, "unknown TTS provider, using openai");
        }

        Self {
            llm,
            voice,
            retrieval,
            pipeline,
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.retrieval_k == 0 {
            return Err(Error::Config("pipeline.retrieval_k must be at least 1".to_string()));
        }
        if self.pipeline.rerank_top_k == 0 {
            return Err(Error::Config("pipeline.rerank_top_k must be at least 1".to_string()));
        }
        if self.pipeline.max_sentence_words == 0 {
            return Err(Error::Config(
                "pipeline.max_sentence_words must be at least 1".to_string(),
            ));
        }
        if self.retrieval.chunk_stride >= self.retrieval.chunk_words {
            return Err(Error::Config(format!(
                "retrieval.chunk_stride ({}) must be smaller than chunk_words ({})",
                self.retrieval.chunk_stride, self.retrieval.chunk_words
            )));
        }
        let bm25 = &self.retrieval.bm25;
        if !(0.0..=1.0).contains(&bm25.b) {
            return Err(Error::Config(format!("retrieval.bm25_b {} outside 0.0..=1.0", bm25.b)));
        }
        if bm25.k1.is_nan() || bm25.k1 < 0.0 {
            return Err(Error::Config(format!("retrieval.bm25_k1 {} must be non-negative", bm25.k1)));
        }
        if !(0.25..=4.0).contains(&self.voice.tts_speed) {
            return Err(Error::Config(format!(
                "voice.tts_speed {} outside 0.25..=4.0",
                self.voice.tts_speed
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.retrieval_k, 8);
        assert_eq!(config.pipeline.rerank_top_k, 3);
        assert_eq!(config.pipeline.max_sentence_words, 18);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert!(config.llm.timeout.is_none());
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.voice.provider, TtsProvider::OpenAI);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: ConfigFile = toml::from_str(
            r#"
            [llm]
            model = "from-file"
            timeout_secs = 30
            "#,
        )
        .unwrap();

        let config = Config::resolve(
            fc,
            env_from(&[
                ("VOICERAG_LLM_MODEL", "from-env"),
                ("GROQ_API_KEY", "gsk"),
            ]),
        );

        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.llm.api_key.as_deref(), Some("gsk"));
        assert_eq!(config.llm.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_openai_key_is_shared_fallback() {
        let config = Config::resolve(ConfigFile::default(), env_from(&[("OPENAI_API_KEY", "sk")]));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk"));
        assert_eq!(config.voice.openai_api_key.as_deref(), Some("sk"));
        assert_eq!(config.retrieval.embedding_api_key.as_deref(), Some("sk"));
    }

    #[test]
    fn test_elevenlabs_default_model() {
        let config = Config::resolve(
            ConfigFile::default(),
            env_from(&[("VOICERAG_TTS_PROVIDER", "elevenlabs")]),
        );
        assert_eq!(config.voice.provider, TtsProvider::ElevenLabs);
        assert_eq!(config.voice.tts_model, "eleven_monolingual_v1");
    }

    #[test]
    fn test_validate_rejects_bad_chunking() {
        let mut config = Config::default();
        config.retrieval.chunk_stride = config.retrieval.chunk_words;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = Config::default();
        config.pipeline.rerank_top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_bm25_params() {
        let mut config = Config::default();
        config.retrieval.bm25.b = 1.0;
        config.retrieval.bm25.k1 = 0.0;
        assert!(config.validate().is_ok());

        config.retrieval.bm25.b = 1.5;
        assert!(config.validate().is_err());

        config.retrieval.bm25.b = 0.75;
        config.retrieval.bm25.k1 = -1.0;
        assert!(config.validate().is_err());
    }
}
