//! Heuristic token estimation.
//!
//! The estimate is a display figure used while a reply is still streaming and
//! as a fallback when the provider does not report usage. It is never exact.

const PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '\'', '"',
];

/// Estimates the number of tokens in `text`.
///
/// Words of up to four characters count as one token, up to eight as two,
/// and longer words as one token per four characters (rounded up). Every
/// punctuation character adds one more. Any non-empty text is at least one
/// token, whitespace included; only empty text is zero.
#[must_use]
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    let words: u32 = text.split_whitespace().map(word_tokens).sum();
    let punctuation = text.chars().filter(|c| PUNCTUATION.contains(c)).count();
    let punctuation = u32::try_from(punctuation).unwrap_or(u32::MAX);

    words.saturating_add(punctuation).max(1)
}

fn word_tokens(word: &str) -> u32 {
    let len = word.chars().count();
    let tokens = match len {
        0..=4 => 1,
        5..=8 => 2,
        _ => len.div_ceil(4),
    };
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

/// Running estimate over a reply that arrives in fragments.
#[derive(Debug, Clone, Default)]
pub struct TokenTally {
    text: String,
}

impl TokenTally {
    /// Creates an empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a streamed fragment and returns the updated estimate.
    pub fn push(&mut self, fragment: &str) -> u32 {
        self.text.push_str(fragment);
        self.estimate()
    }

    /// Estimate for everything pushed so far.
    #[must_use]
    pub fn estimate(&self) -> u32 {
        estimate_tokens(&self.text)
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consumes the tally and returns the accumulated text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}
