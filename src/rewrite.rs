//! Conversation-aware query rewriting
//!
//! A deliberately small heuristic: when the query leans on an earlier turn
//! ("what about it?", "the second one"), the most recent turn is attached as a
//! parenthetical so retrieval has something concrete to match against.

use crate::text::word_tokens;

/// Words that signal the query refers back to an earlier turn
pub const REFERENCE_WORDS: [&str; 7] = ["it", "that", "this", "they", "them", "second", "first"];

/// Resolves anaphora against conversation history
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryRewriter;

impl QueryRewriter {
    /// Create a new rewriter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Rewrite `query` using `history` (oldest first, most recent last)
    ///
    /// Returns the query unchanged when history is empty or when the query
    /// contains no reference word.
    #[must_use]
    pub fn rewrite(&self, query: &str, history: &[String]) -> String {
        let Some(last) = history.last() else {
            return query.to_string();
        };

        if refers_back(query) {
            format!("{query} (context: {last})")
        } else {
            query.to_string()
        }
    }
}

/// Whether any word of `query` is one of [`REFERENCE_WORDS`]
#[must_use]
pub fn refers_back(query: &str) -> bool {
    word_tokens(query)
        .iter()
        .any(|token| REFERENCE_WORDS.contains(&token.as_str()))
}
