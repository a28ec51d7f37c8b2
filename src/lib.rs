//! Voice RAG Agent - speculative retrieval-augmented voice responses
//!
//! This library provides the core of a low-latency voice assistant:
//! - Speculative runs that speak a filler while context is gathered
//! - Hybrid retrieval (vector, BM25, word overlap) over an ingested corpus
//! - Cross-encoder or lexical reranking
//! - Conversation-aware query rewriting
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Partial transcripts (stdin)             │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Coordinator                         │
//! │   Filler branch  │  Retrieval branch  │  Answer     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Collaborators                        │
//! │   LLM  │  TTS  │  Vector index  │  Reranker         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod rerank;
pub mod retrieval;
pub mod rewrite;
pub mod text;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use llm::{ChatClient, ChatSettings, Generator};
pub use metrics::{MetricsAccumulator, MetricsSummary};
pub use pipeline::{ConversationHistory, Coordinator, RunHandle, RunState};
pub use rerank::{HttpCrossEncoder, RelevanceScorer, Reranker};
pub use retrieval::{CorpusIndex, HybridRetriever, RetrievalStrategy, ScoredPassage};
pub use rewrite::QueryRewriter;
pub use text::postprocess_for_speech;
pub use voice::{LogSpeaker, Speaker, TtsSpeaker};
