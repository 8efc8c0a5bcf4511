//! Text normalization: raw extracted text → canonical token string.
//!
//! ## Rule order
//!
//! 1. Lowercase
//! 2. Replace every character outside `[a-zA-Z0-9]` with a space
//! 3. Split on whitespace
//! 4. Drop English stop words
//! 5. Porter-stem each remaining token (to a fixed point)
//! 6. Drop stems that are themselves stop words
//! 7. Rejoin with single spaces
//!
//! Steps 5 and 6 make the transform idempotent: feeding its output back in
//! yields the same string, because every emitted token is already a stable,
//! non-stop-word stem.

use crate::pipeline::stem::stem;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Upper bound on re-stemming a token until it stops changing.
const MAX_STEM_PASSES: usize = 8;

static RE_NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());

/// The NLTK English stop-word list.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

static STOP_WORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

/// Returns `true` if `token` is in the English stop-word list.
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(token)
}

/// Normalize raw text into its canonical token string.
///
/// Total over any input; the empty string maps to the empty string.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let alnum = RE_NON_ALNUM.replace_all(&lowered, " ");
    alnum
        .split_whitespace()
        .filter(|token| !is_stop_word(token))
        .map(stable_stem)
        .filter(|token| !token.is_empty() && !is_stop_word(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stem until the token stops changing.
fn stable_stem(token: &str) -> String {
    let mut current = stem(token);
    for _ in 0..MAX_STEM_PASSES {
        let next = stem(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}
