//! Conversation history

/// Ordered user and assistant turns for the current session
///
/// Append-only; the coordinator is the only writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<String>,
}

impl ConversationHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed exchange, user turn first
    pub fn push_exchange(&mut self, transcript: String, answer: String) {
        self.turns.push(transcript);
        self.turns.push(answer);
    }

    #[must_use]
    pub fn turns(&self) -> &[String] {
        &self.turns
    }

    /// Most recent turn, if any
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.turns.last().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
