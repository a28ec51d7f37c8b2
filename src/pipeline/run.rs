//! One speculative run: filler and retrieval branches, then the grounded answer

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::coordinator::Shared;
use super::prompt;
use crate::text::{first_sentence, postprocess_for_speech};

/// Lifecycle of a run
///
/// `FillerPlaying` and `ContextReady` come from concurrent branches and may be
/// observed in either order. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Started,
    FillerPlaying,
    ContextReady,
    Completed,
    Cancelled,
}

impl RunState {
    /// Whether the run has finished
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Observer for a spawned run
#[derive(Debug, Clone)]
pub struct RunHandle {
    generation: u64,
    state: watch::Receiver<RunState>,
}

impl RunHandle {
    pub(super) const fn new(generation: u64, state: watch::Receiver<RunState>) -> Self {
        Self { generation, state }
    }

    /// Generation id, increasing with every transcript
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Latest observed state
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Wait until the run completes or is cancelled
    ///
    /// A run whose task vanished without reaching a terminal state reports
    /// `Cancelled`.
    pub async fn wait(&self) -> RunState {
        let mut state = self.state.clone();
        state
            .wait_for(|s| s.is_terminal())
            .await
            .map_or(RunState::Cancelled, |s| *s)
    }
}

/// Publishes state transitions, ignoring anything after a terminal state
struct Progress {
    generation: u64,
    tx: watch::Sender<RunState>,
}

impl Progress {
    fn advance(&self, next: RunState) {
        let changed = self.tx.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            tracing::debug!(generation = self.generation, state = ?next, "run state");
        }
    }
}

pub(super) struct Run {
    generation: u64,
    transcript: String,
    token: CancellationToken,
    progress: Arc<Progress>,
    shared: Arc<Shared>,
}

impl Run {
    pub(super) fn new(
        generation: u64,
        transcript: String,
        token: CancellationToken,
        state: watch::Sender<RunState>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            generation,
            transcript,
            token,
            progress: Arc::new(Progress {
                generation,
                tx: state,
            }),
            shared,
        }
    }

    pub(super) async fn execute(self) {
        let started = Instant::now();
        let generation = self.generation;
        tracing::debug!(generation, transcript = %self.transcript, "run started");

        let filler = tokio::spawn(speak_filler(
            Arc::clone(&self.shared),
            self.transcript.clone(),
            self.token.clone(),
            Arc::clone(&self.progress),
        ));
        let retrieval = tokio::spawn(gather_context(
            Arc::clone(&self.shared),
            self.transcript.clone(),
            self.token.clone(),
            Arc::clone(&self.progress),
            started,
        ));

        let joined = tokio::select! {
            () = self.token.cancelled() => None,
            joined = async { tokio::join!(filler, retrieval) } => Some(joined),
        };
        let Some((filler, retrieval)) = joined else {
            return self.cancelled();
        };

        let filler_speech = filler.unwrap_or_else(|e| {
            tracing::warn!(generation, error = %e, "filler branch failed");
            None
        });
        let (context, retrieval_latency) = match retrieval {
            Ok(Some(ready)) => ready,
            Ok(None) => return self.cancelled(),
            Err(e) => {
                tracing::warn!(generation, error = %e, "retrieval branch failed, answering without context");
                self.progress.advance(RunState::ContextReady);
                (Vec::new(), started.elapsed())
            }
        };

        if self.token.is_cancelled() {
            return self.cancelled();
        }
        let answer = self.answer(&context).await;

        // Final audio must not overlap the filler
        if let Some(speech) = filler_speech {
            tokio::select! {
                () = self.token.cancelled() => return self.cancelled(),
                result = speech => {
                    if let Err(e) = result {
                        tracing::warn!(generation, error = %e, "filler speech task failed");
                    }
                }
            }
        }

        if self.token.is_cancelled() {
            return self.cancelled();
        }
        if !answer.is_empty() {
            if let Err(e) = self.shared.speaker.speak(&answer).await {
                tracing::warn!(generation, error = %e, "answer speech failed");
            }
        }

        self.commit(answer, retrieval_latency, started).await;
    }

    async fn answer(&self, context: &[String]) -> String {
        let prompt = prompt::answer_prompt(context, &self.transcript);
        match self.shared.generator.generate(&prompt).await {
            Ok(text) => postprocess_for_speech(&text, self.shared.settings.max_sentence_words),
            Err(e) => {
                tracing::warn!(generation = self.generation, error = %e, "answer generation failed");
                String::new()
            }
        }
    }

    /// Record metrics and history unless the run was superseded
    ///
    /// Holds the current-run lock so supersession cannot interleave with the
    /// writes.
    async fn commit(self, answer: String, retrieval_latency: Duration, started: Instant) {
        let _current = self.shared.current.lock().await;
        if self.token.is_cancelled() {
            return self.cancelled();
        }

        let total_latency = started.elapsed();
        self.shared
            .metrics
            .lock()
            .await
            .record(retrieval_latency, total_latency);
        self.shared
            .history
            .lock()
            .await
            .push_exchange(self.transcript.clone(), answer);
        self.progress.advance(RunState::Completed);

        tracing::info!(
            generation = self.generation,
            retrieval_time = retrieval_latency.as_secs_f64(),
            total_time = total_latency.as_secs_f64(),
            "run completed"
        );
    }

    fn cancelled(&self) {
        self.progress.advance(RunState::Cancelled);
        tracing::debug!(generation = self.generation, "run cancelled");
    }
}

/// Generate and start speaking the filler
///
/// Returns the in-flight speech task, or `None` when nothing is spoken.
async fn speak_filler(
    shared: Arc<Shared>,
    transcript: String,
    token: CancellationToken,
    progress: Arc<Progress>,
) -> Option<JoinHandle<()>> {
    let generation = progress.generation;
    if token.is_cancelled() {
        return None;
    }

    let text = match shared.generator.generate(&prompt::filler_prompt(&transcript)).await {
        Ok(raw) if !raw.trim().is_empty() => first_sentence(&raw),
        Ok(_) => shared.settings.default_filler.clone(),
        Err(e) => {
            tracing::warn!(generation, error = %e, "filler generation failed, using default");
            shared.settings.default_filler.clone()
        }
    };

    if text.trim().is_empty() || token.is_cancelled() {
        return None;
    }

    progress.advance(RunState::FillerPlaying);
    let speaker = Arc::clone(&shared.speaker);
    Some(tokio::spawn(async move {
        if let Err(e) = speaker.speak(&text).await {
            tracing::warn!(generation, error = %e, "filler speech failed");
        }
    }))
}

/// Rewrite, retrieve and rerank
///
/// Returns the ranked passage texts and the latency to context ready, or
/// `None` if the run was cancelled along the way.
async fn gather_context(
    shared: Arc<Shared>,
    transcript: String,
    token: CancellationToken,
    progress: Arc<Progress>,
    started: Instant,
) -> Option<(Vec<String>, Duration)> {
    let history = shared.history.lock().await.turns().to_vec();
    let query = shared.rewriter.rewrite(&transcript, &history);
    if query != transcript {
        tracing::debug!(generation = progress.generation, query = %query, "rewrote query");
    }

    if token.is_cancelled() {
        return None;
    }
    let candidates: Vec<String> = shared
        .retriever
        .search(&query, shared.settings.retrieval_k)
        .await
        .into_iter()
        .map(|p| p.text)
        .collect();

    if token.is_cancelled() {
        return None;
    }
    let context: Vec<String> = shared
        .reranker
        .rerank(&query, &candidates, shared.settings.rerank_top_k)
        .await
        .into_iter()
        .map(|p| p.text)
        .collect();

    let latency = started.elapsed();
    progress.advance(RunState::ContextReady);
    tracing::debug!(
        generation = progress.generation,
        candidates = candidates.len(),
        passages = context.len(),
        "context ready"
    );
    Some((context, latency))
}
