//! Text similarity functions.
//!
//! All four return a value in `[0, 1]`, are symmetric, and score any text
//! against itself as `1.0` (Jaccard excepted for the empty string, which has
//! no tokens to share).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

/// Word tokens of two or more word characters.
static RE_TFIDF_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// `1 - edit_distance / max(len)` over Unicode scalar values.
///
/// Two empty strings are identical (`1.0`).
pub fn levenshtein(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(&a, &b) as f64 / longest as f64
}

/// Classic two-row dynamic programme, O(len(a)·len(b)) time.
fn edit_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Cosine of the TF-IDF vectors of `a` and `b`, fitted on the pair alone.
///
/// * vocabulary: lowercase tokens matching `\b\w\w+\b`
/// * tf: raw counts
/// * idf: `ln((1 + n) / (1 + df)) + 1` with `n = 2`
/// * both vectors L2-normalised
///
/// Empty-vocabulary fallbacks: both sides empty → `1.0`, one side empty →
/// `0.0`. A term that occurs in both texts still carries weight (idf = 1),
/// so identical non-empty texts score exactly `1.0` up to rounding; the
/// result is clamped into `[0, 1]`.
pub fn cosine_tfidf(a: &str, b: &str) -> f64 {
    let ta = term_counts(a);
    let tb = term_counts(b);
    match (ta.is_empty(), tb.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let vocabulary: BTreeMap<&str, f64> = ta
        .keys()
        .chain(tb.keys())
        .map(|term| {
            let df = u32::from(ta.contains_key(term)) + u32::from(tb.contains_key(term));
            let idf = (3.0 / (1.0 + f64::from(df))).ln() + 1.0;
            (term.as_str(), idf)
        })
        .collect();

    let weigh = |counts: &BTreeMap<String, u32>| -> Vec<f64> {
        let raw: Vec<f64> = vocabulary
            .iter()
            .map(|(term, idf)| f64::from(counts.get(*term).copied().unwrap_or(0)) * idf)
            .collect();
        let norm = raw.iter().map(|w| w * w).sum::<f64>().sqrt();
        raw.into_iter().map(|w| w / norm).collect()
    };

    let va = weigh(&ta);
    let vb = weigh(&tb);
    let dot: f64 = va.iter().zip(&vb).map(|(x, y)| x * y).sum();
    dot.clamp(0.0, 1.0)
}

fn term_counts(text: &str) -> BTreeMap<String, u32> {
    let lowered = text.to_lowercase();
    let mut counts = BTreeMap::new();
    for m in RE_TFIDF_TOKEN.find_iter(&lowered) {
        *counts.entry(m.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

/// `|A ∩ B| / |A ∪ B|` over whitespace-delimited token sets.
///
/// When both sides have no tokens the union is empty and the score is `0.0`.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let sa: HashSet<&str> = a.split_whitespace().collect();
    let sb: HashSet<&str> = b.split_whitespace().collect();
    let union = sa.union(&sb).count();
    if union == 0 {
        return 0.0;
    }
    sa.intersection(&sb).count() as f64 / union as f64
}

/// Positional character agreement, extended to unequal lengths.
///
/// Mismatches are counted over the common prefix length, every surplus
/// character of the longer string counts as a mismatch, and the total is
/// divided by the longer length. The score is one minus that fraction, so
/// equal strings score `1.0` and two empty strings are identical.
pub fn hamming(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let mismatches = a.iter().zip(&b).filter(|(x, y)| x != y).count();
    let surplus = a.len().abs_diff(b.len());
    1.0 - (mismatches + surplus) as f64 / longest as f64
}
