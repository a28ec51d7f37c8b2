//! Run supersession and shared pipeline state

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use super::history::ConversationHistory;
use super::run::{Run, RunHandle, RunState};
use crate::config::{Config, PipelineConfig, RetrievalConfig, VoiceConfig};
use crate::llm::{ChatClient, ChatSettings, Generator};
use crate::metrics::{MetricsAccumulator, MetricsSummary};
use crate::rerank::{HttpCrossEncoder, Reranker};
use crate::retrieval::{CorpusIndex, Embedder, HybridRetriever, TextEncoder};
use crate::rewrite::QueryRewriter;
use crate::voice::{LogSpeaker, Speaker, TextToSpeech, TtsProvider, TtsSpeaker};
use crate::Result;

/// State shared between the coordinator and its runs
pub(super) struct Shared {
    pub(super) generator: Arc<dyn Generator>,
    pub(super) speaker: Arc<dyn Speaker>,
    pub(super) retriever: HybridRetriever,
    pub(super) reranker: Reranker,
    pub(super) rewriter: QueryRewriter,
    pub(super) settings: PipelineConfig,
    pub(super) history: Mutex<ConversationHistory>,
    pub(super) metrics: Mutex<MetricsAccumulator>,
    /// The current run; held while installing a run and while a run commits
    pub(super) current: Mutex<Option<ActiveRun>>,
    next_generation: AtomicU64,
}

pub(super) struct ActiveRun {
    generation: u64,
    token: CancellationToken,
}

/// Drives speculative runs for one conversation
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    /// Create a coordinator from explicit collaborators
    #[must_use]
    pub fn new(
        generator: Arc<dyn Generator>,
        speaker: Arc<dyn Speaker>,
        retriever: HybridRetriever,
        reranker: Reranker,
        settings: PipelineConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                generator,
                speaker,
                retriever,
                reranker,
                rewriter: QueryRewriter::new(),
                settings,
                history: Mutex::new(ConversationHistory::new()),
                metrics: Mutex::new(MetricsAccumulator::new()),
                current: Mutex::new(None),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Build every collaborator from configuration
    ///
    /// # Errors
    ///
    /// Returns error if a required API key is missing or a client cannot be built
    pub fn from_config(config: &Config) -> Result<Self> {
        let generator = ChatClient::new(ChatSettings {
            base_url: config.llm.base_url.clone(),
            model: config.llm.model.clone(),
            api_key: config.llm.api_key.clone().unwrap_or_default(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            timeout: config.llm.timeout,
        })?;
        tracing::info!(model = %generator.model(), "generator ready");

        let speaker = build_speaker(&config.voice)?;
        let retriever = load_retriever(&config.retrieval)?;

        let reranker = match &config.retrieval.reranker_url {
            Some(url) => Reranker::with_scorer(Arc::new(HttpCrossEncoder::new(
                url.clone(),
                config.retrieval.reranker_model.clone(),
                config.retrieval.reranker_api_key.clone(),
                config.llm.timeout,
            )?)),
            None => Reranker::lexical(),
        };

        Ok(Self::new(
            Arc::new(generator),
            speaker,
            retriever,
            reranker,
            config.pipeline.clone(),
        ))
    }

    /// Start a run for `transcript`, cancelling the current one
    ///
    /// The swap of the current run is serialized, so concurrent callers
    /// always leave exactly one run current.
    pub async fn handle_partial(&self, transcript: impl Into<String>) -> RunHandle {
        let transcript = transcript.into();
        let mut current = self.shared.current.lock().await;

        if let Some(previous) = current.take() {
            previous.token.cancel();
            tracing::debug!(generation = previous.generation, "superseded run");
        }

        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(RunState::Started);

        let run = Run::new(
            generation,
            transcript,
            token.clone(),
            state_tx,
            Arc::clone(&self.shared),
        );
        tokio::spawn(run.execute());

        *current = Some(ActiveRun { generation, token });
        RunHandle::new(generation, state_rx)
    }

    /// Generation id of the most recently started run
    pub async fn current_generation(&self) -> Option<u64> {
        self.shared.current.lock().await.as_ref().map(|r| r.generation)
    }

    /// Snapshot of the conversation so far
    pub async fn history(&self) -> Vec<String> {
        self.shared.history.lock().await.turns().to_vec()
    }

    /// Average latencies, `None` before the first completed run
    pub async fn metrics_summary(&self) -> Option<MetricsSummary> {
        self.shared.metrics.lock().await.summary()
    }

    /// Write accumulated metrics to `path` as JSON
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub async fn dump_metrics(&self, path: &Path) -> Result<()> {
        let metrics = self.shared.metrics.lock().await.clone();
        metrics.dump(path)
    }

    /// Name of the retrieval strategy that would serve the next search
    #[must_use]
    pub fn retrieval_strategy(&self) -> Option<&'static str> {
        self.shared.retriever.active_strategy()
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("retriever", &self.shared.retriever)
            .field("reranker", &self.shared.reranker)
            .field("settings", &self.shared.settings)
            .finish_non_exhaustive()
    }
}

fn build_speaker(voice: &VoiceConfig) -> Result<Arc<dyn Speaker>> {
    if !voice.enabled {
        tracing::info!("voice output disabled, logging responses");
        return Ok(Arc::new(LogSpeaker));
    }

    let tts = match voice.provider {
        TtsProvider::OpenAI => TextToSpeech::new_openai(
            voice.openai_api_key.clone().unwrap_or_default(),
            voice.tts_voice.clone(),
            voice.tts_speed,
            voice.tts_model.clone(),
        )?,
        TtsProvider::ElevenLabs => TextToSpeech::new_elevenlabs(
            voice.elevenlabs_api_key.clone().unwrap_or_default(),
            voice.tts_voice.clone(),
            voice.tts_model.clone(),
        )?,
    };
    let tts = match voice.timeout {
        Some(timeout) => tts.with_timeout(timeout)?,
        None => tts,
    };

    tracing::info!(provider = ?voice.provider, model = %voice.tts_model, "speaker ready");
    Ok(Arc::new(TtsSpeaker::new(tts)))
}

/// Load the corpus index, falling back to an empty engine when none exists
fn load_retriever(config: &RetrievalConfig) -> Result<HybridRetriever> {
    if !config.index_path.exists() {
        tracing::warn!(
            path = %config.index_path.display(),
            "no corpus index, answers will have no context (run `voicerag ingest`)"
        );
        return Ok(HybridRetriever::empty());
    }

    let index = match CorpusIndex::load(&config.index_path) {
        Ok(index) => index,
        Err(e) => {
            tracing::warn!(path = %config.index_path.display(), error = %e, "failed to load corpus index");
            return Ok(HybridRetriever::empty());
        }
    };

    let encoder: Option<Arc<dyn TextEncoder>> =
        match (&index.embeddings, &config.embedding_api_key) {
            (Some(_), Some(key)) => {
                let model = index
                    .embedding_model
                    .clone()
                    .unwrap_or_else(|| config.embedding_model.clone());
                let embedder = Embedder::with_model(key.clone(), model)?;
                let embedder = match &config.embedding_base_url {
                    Some(url) => embedder.with_base_url(url.clone()),
                    None => embedder,
                };
                Some(Arc::new(embedder))
            }
            _ => None,
        };

    let retriever = HybridRetriever::from_index(index, encoder, config.bm25);
    tracing::info!(strategy = ?retriever.active_strategy(), "retrieval ready");
    Ok(retriever)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait::async_trait]
    impl Generator for Echo {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("echo. {}", prompt.len()))
        }
    }

    fn coordinator() -> Coordinator {
        Coordinator::new(
            Arc::new(Echo),
            Arc::new(LogSpeaker),
            HybridRetriever::empty(),
            Reranker::lexical(),
            PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_generations_increase() {
        let coordinator = coordinator();
        assert_eq!(coordinator.current_generation().await, None);

        let first = coordinator.handle_partial("one").await;
        let second = coordinator.handle_partial("two").await;
        assert!(second.generation() > first.generation());
        assert_eq!(coordinator.current_generation().await, Some(second.generation()));

        assert_eq!(first.wait().await, RunState::Cancelled);
        assert_eq!(second.wait().await, RunState::Completed);
    }

    #[tokio::test]
    async fn test_missing_index_gives_empty_retriever() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default().retrieval;
        config.index_path = dir.path().join("missing.json");

        let retriever = load_retriever(&config).unwrap();
        assert!(!retriever.ready());
    }

    #[test]
    fn test_disabled_voice_uses_log_speaker() {
        let mut voice = Config::default().voice;
        voice.enabled = false;
        assert!(build_speaker(&voice).is_ok());
    }
}
