//! Text shaping for spoken output
//!
//! Everything here operates on whitespace-separated words. A sentence ends at
//! a word whose last character is `.`, `!` or `?`, so decimals like `3.5` or
//! inline dots never split a sentence.

/// Characters that end a sentence when they close a word
const SENTENCE_TERMINALS: [char; 3] = ['.', '!', '?'];

/// Marker appended to a sentence that was cut short
pub const TRUNCATION_MARKER: &str = "...";

/// Collapse all runs of whitespace into single spaces and trim the ends
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase whitespace tokens, used by the lexical scorers
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Lowercase word tokens with surrounding punctuation stripped
///
/// `"What about IT?"` becomes `["what", "about", "it"]`.
#[must_use]
pub fn word_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn ends_sentence(word: &str) -> bool {
    word.ends_with(SENTENCE_TERMINALS)
}

/// Split text into sentences, each a list of its words
#[must_use]
pub fn split_sentences(text: &str) -> Vec<Vec<&str>> {
    let mut sentences = Vec::new();
    let mut current = Vec::new();

    for word in text.split_whitespace() {
        current.push(word);
        if ends_sentence(word) {
            sentences.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Keep only the first sentence of `text`
///
/// A first sentence without terminal punctuation gets a trailing `.` so it is
/// spoken as a complete phrase. Blank input yields an empty string.
#[must_use]
pub fn first_sentence(text: &str) -> String {
    let Some(words) = split_sentences(text).into_iter().next() else {
        return String::new();
    };

    let mut sentence = words.join(" ");
    if !words.last().is_some_and(|w| ends_sentence(w)) {
        sentence.push('.');
    }
    sentence
}

/// Bound every sentence to at most `max_words` words
///
/// Whitespace is normalized first. Sentences over the bound keep their first
/// `max_words` words followed by [`TRUNCATION_MARKER`]. Applying this twice
/// with the same bound gives the same result as applying it once.
#[must_use]
pub fn postprocess_for_speech(text: &str, max_words: usize) -> String {
    split_sentences(text)
        .into_iter()
        .map(|words| {
            if words.len() > max_words {
                let mut kept = words[..max_words].join(" ");
                kept.push_str(TRUNCATION_MARKER);
                kept
            } else {
                words.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
