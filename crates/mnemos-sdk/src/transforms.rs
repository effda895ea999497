//! Built-in text transforms.
//!
//! Plug into the engine's [`TransformPipeline`](mnemos_core::memory::TransformPipeline)
//! and run on every candidate before deduplication and scoring.

use std::collections::HashSet;

use serde_json::{json, Value};

use mnemos_core::memory::MemoryTransform;
use mnemos_core::Metadata;

/// Collapses runs of spaces and tabs within each line and trims the ends.
///
/// Line breaks are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeWhitespace;

impl MemoryTransform for NormalizeWhitespace {
    fn name(&self) -> &str {
        "normalize_whitespace"
    }

    fn before_storage(&self, text: String, _metadata: &mut Metadata) -> String {
        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "happy", "love", "like", "enjoy", "thanks", "thank", "awesome",
    "glad", "nice", "perfect", "wonderful", "helpful", "pleased",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "sad", "hate", "dislike", "angry", "annoyed", "broken", "wrong",
    "worse", "worst", "disappointed", "frustrated", "upset", "problem",
];

/// Lexicon sentiment written to the `sentiment` metadata key.
///
/// `polarity` is in [-1, 1]; `subjectivity` is the share of tokens that
/// carry sentiment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentTagger;

impl SentimentTagger {
    pub const METADATA_KEY: &'static str = "sentiment";

    pub fn analyze(text: &str) -> (f64, f64) {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return (0.0, 0.0);
        }

        let positive = words.iter().filter(|w| POSITIVE_WORDS.contains(&w.as_str())).count() as f64;
        let negative = words.iter().filter(|w| NEGATIVE_WORDS.contains(&w.as_str())).count() as f64;
        let charged = positive + negative;
        if charged == 0.0 {
            return (0.0, 0.0);
        }

        ((positive - negative) / charged, charged / words.len() as f64)
    }
}

impl MemoryTransform for SentimentTagger {
    fn name(&self) -> &str {
        "sentiment"
    }

    fn before_storage(&self, text: String, metadata: &mut Metadata) -> String {
        let (polarity, subjectivity) = Self::analyze(&text);
        metadata.insert(
            Self::METADATA_KEY.into(),
            json!({ "polarity": polarity, "subjectivity": subjectivity }),
        );
        text
    }
}

/// Capitalised-token entity heuristic.
///
/// Tokens starting with an uppercase letter that do not open a sentence are
/// taken as entities. Writes `entities` (list) and `has_entities`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityTagger;

impl EntityTagger {
    pub fn extract(text: &str) -> Vec<String> {
        let mut entities = Vec::new();
        let mut seen = HashSet::new();
        let mut sentence_start = true;

        for raw in text.split_whitespace() {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            let starts_upper = word.chars().next().is_some_and(char::is_uppercase);
            if starts_upper && !sentence_start && seen.insert(word.to_string()) {
                entities.push(word.to_string());
            }
            sentence_start = raw.ends_with(['.', '!', '?']);
        }
        entities
    }
}

impl MemoryTransform for EntityTagger {
    fn name(&self) -> &str {
        "entities"
    }

    fn before_storage(&self, text: String, metadata: &mut Metadata) -> String {
        let entities = Self::extract(&text);
        metadata.insert("has_entities".into(), Value::Bool(!entities.is_empty()));
        metadata.insert("entities".into(), Value::from(entities));
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::memory::TransformPipeline;
    use std::sync::Arc;

    #[test]
    fn test_normalize_whitespace() {
        let mut metadata = Metadata::new();
        let text = NormalizeWhitespace.before_storage("  call   Bob \t\n\ttomorrow ".into(), &mut metadata);
        assert_eq!(text, "call Bob\ntomorrow");

        let text = NormalizeWhitespace.before_storage("\n\nUser: hi\r\nAssistant:  hello\n".into(), &mut metadata);
        assert_eq!(text, "User: hi\nAssistant: hello");
    }

    #[test]
    fn test_sentiment_polarity() {
        assert_eq!(SentimentTagger::analyze("I love this, great work"), (1.0, 0.4));
        assert_eq!(SentimentTagger::analyze("terrible and broken").0, -1.0);
        assert_eq!(SentimentTagger::analyze("the sky is blue"), (0.0, 0.0));
        assert_eq!(SentimentTagger::analyze(""), (0.0, 0.0));
    }

    #[test]
    fn test_entity_extraction_skips_sentence_starts() {
        let entities = EntityTagger::extract("Meeting with Alice at Acme. Then Alice calls Bob!");
        assert_eq!(entities, vec!["Alice", "Acme", "Bob"]);
        assert!(EntityTagger::extract("nothing here").is_empty());
    }

    #[test]
    fn test_pipeline_annotates_metadata() {
        let pipeline = TransformPipeline::new()
            .with(Arc::new(NormalizeWhitespace))
            .with(Arc::new(SentimentTagger))
            .with(Arc::new(EntityTagger));
        let mut metadata = Metadata::new();

        let text = pipeline.apply_storage("I  enjoy lunch with   Carol".into(), &mut metadata);
        assert_eq!(text, "I enjoy lunch with Carol");
        assert_eq!(metadata["sentiment"]["polarity"], json!(1.0));
        assert_eq!(metadata["entities"], json!(["Carol"]));
        assert_eq!(metadata["has_entities"], json!(true));
    }
}
