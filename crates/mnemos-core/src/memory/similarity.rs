//! Similarity measures shared by deduplication, consolidation and search.

use std::collections::HashSet;

use crate::types::LongTermEntry;

/// Compute cosine similarity between two vectors
///
/// Returns a value between -1.0 and 1.0. Vectors of different length or with
/// zero norm have similarity 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Lowercased whitespace tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

/// Token-set Jaccard similarity in [0, 1].
///
/// Texts that are equal after trimming and lowercasing score 1.0, including
/// two empty texts.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a_clean = a.trim().to_lowercase();
    let b_clean = b.trim().to_lowercase();
    if a_clean == b_clean {
        return 1.0;
    }

    let a_words: HashSet<&str> = a_clean.split_whitespace().collect();
    let b_words: HashSet<&str> = b_clean.split_whitespace().collect();
    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }

    let intersection = a_words.intersection(&b_words).count();
    let union = a_words.union(&b_words).count();
    intersection as f64 / union as f64
}

/// Similarity between a text (and optionally its vector) and a stored entry.
///
/// Uses embeddings when both sides have a non-zero one of the same
/// dimension, otherwise falls back to token-set Jaccard.
pub fn text_entry_similarity(text: &str, vector: Option<&[f32]>, entry: &LongTermEntry) -> f64 {
    match vector {
        Some(v) if v.len() == entry.embedding.len() && has_norm(v) && has_norm(&entry.embedding) => {
            cosine_similarity(v, &entry.embedding) as f64
        }
        _ => jaccard_similarity(text, &entry.text),
    }
}

fn has_norm(v: &[f32]) -> bool {
    v.iter().any(|x| *x != 0.0)
}

/// Similarity between two stored entries, by the same rule.
pub fn entry_similarity(a: &LongTermEntry, b: &LongTermEntry) -> f64 {
    text_entry_similarity(&a.text, Some(&a.embedding), b)
}
