//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use voice_rag_agent::config::PipelineConfig;
use voice_rag_agent::retrieval::{HybridRetriever, RetrievalStrategy, ScoredPassage};
use voice_rag_agent::{Coordinator, Error, Generator, Reranker, Result, Speaker};

/// Holds answer generation until opened
pub struct Gate {
    open: Semaphore,
    entered: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            open: Semaphore::new(0),
            entered: Notify::new(),
        })
    }

    /// Release every current and future waiter
    pub fn open(&self) {
        self.open.close();
    }

    /// Wait until some caller has reached the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    async fn pass(&self) {
        self.entered.notify_one();
        // Closed means open
        let _ = self.open.acquire().await;
    }
}

/// Generator answering filler and answer prompts from a script
pub struct ScriptedGenerator {
    filler: Option<String>,
    answer: Option<String>,
    gate: Option<Arc<Gate>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(filler: &str, answer: &str) -> Self {
        Self {
            filler: Some(filler.to_string()),
            answer: Some(answer.to_string()),
            gate: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails
    pub fn failing() -> Self {
        Self {
            filler: None,
            answer: None,
            gate: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Block answer generation on `gate`
    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Prompts of the grounded answer calls
    pub fn answer_prompts(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| p.starts_with("Context:"))
            .collect()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let is_answer = prompt.starts_with("Context:");
        if is_answer {
            if let Some(gate) = &self.gate {
                gate.pass().await;
            }
        }

        let scripted = if is_answer { &self.answer } else { &self.filler };
        scripted
            .clone()
            .ok_or_else(|| Error::Generation("scripted failure".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started(String),
    Finished(String),
}

/// Speaker recording when each utterance starts and finishes
#[derive(Default)]
pub struct RecordingSpeaker {
    delay: Duration,
    fail: bool,
    gate: Option<Arc<Gate>>,
    events: Mutex<Vec<SpeechEvent>>,
}

impl RecordingSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every utterance takes `delay` to play
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Every utterance fails after being recorded
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every utterance holds at `gate` once started
    pub fn with_gate(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<SpeechEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Texts in the order they started playing
    pub fn spoken(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SpeechEvent::Started(text) => Some(text),
                SpeechEvent::Finished(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(SpeechEvent::Started(text.to_string()));
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.events
            .lock()
            .unwrap()
            .push(SpeechEvent::Finished(text.to_string()));

        if self.fail {
            Err(Error::Speech("speaker unplugged".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Retrieval strategy recording the queries it receives
pub struct RecordingStrategy {
    queries: Arc<Mutex<Vec<String>>>,
    passages: Vec<ScoredPassage>,
    gate: Option<Arc<Gate>>,
}

impl RecordingStrategy {
    pub fn new(passages: Vec<ScoredPassage>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let queries = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                queries: Arc::clone(&queries),
                passages,
                gate: None,
            },
            queries,
        )
    }

    /// Hold every search at `gate`
    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl RetrievalStrategy for RecordingStrategy {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        Ok(self.passages.iter().take(k).cloned().collect())
    }
}

/// Coordinator over fakes with default pipeline settings
pub fn coordinator(
    generator: Arc<ScriptedGenerator>,
    speaker: Arc<RecordingSpeaker>,
    retriever: HybridRetriever,
) -> Coordinator {
    Coordinator::new(
        generator,
        speaker,
        retriever,
        Reranker::lexical(),
        PipelineConfig::default(),
    )
}
