//! Prompt templates for the two generation calls of a run

/// Prompt for the fast acknowledgement spoken while retrieval runs
#[must_use]
pub fn filler_prompt(transcript: &str) -> String {
    format!("You are a helpful assistant. Give a very short acknowledgement for: {transcript}")
}

/// Join passages best-first into a context block
#[must_use]
pub fn context_block<S: AsRef<str>>(passages: &[S]) -> String {
    passages
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt for the grounded answer
#[must_use]
pub fn answer_prompt<S: AsRef<str>>(passages: &[S], transcript: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {transcript}",
        context_block(passages)
    )
}
