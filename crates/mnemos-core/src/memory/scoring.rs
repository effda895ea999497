//! Importance scoring.
//!
//! A pure heuristic over text and caller context. No I/O, no randomness:
//! identical input always yields the identical score.

/// Keywords that mark text as urgent or consequential.
pub const HIGH_IMPORTANCE_KEYWORDS: &[&str] = &[
    "urgent",
    "asap",
    "important",
    "critical",
    "deadline",
    "meeting",
    "call",
    "emergency",
    "fail",
    "error",
    "bug",
];

/// Keywords that mark text as worth following up on.
pub const MEDIUM_IMPORTANCE_KEYWORDS: &[&str] = &[
    "reminder",
    "note",
    "remember",
    "follow up",
    "task",
    "todo",
    "schedule",
    "plan",
];

const HIGH_KEYWORD_WEIGHT: f64 = 0.3;
const MEDIUM_KEYWORD_WEIGHT: f64 = 0.15;

/// Texts longer than this many characters get a length bonus.
///
/// A single tier: long texts of any length share the same bonus.
pub const LENGTH_BONUS_CHARS: usize = 200;
const LENGTH_BONUS: f64 = 0.1;

/// Conversations longer than this many turns get a bonus.
pub const LONG_CONVERSATION_TURNS: usize = 10;
const LONG_CONVERSATION_BONUS: f64 = 0.1;

const EXPLICIT_REMEMBER_BONUS: f64 = 0.4;

const INTERROGATIVES: &[&str] = &["what", "how", "why", "when", "where"];
const QUESTION_BONUS: f64 = 0.1;

/// Caller-supplied context for scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringContext {
    /// Number of turns (or entries) in the surrounding conversation.
    pub conversation_length: usize,
    /// The user explicitly asked for this to be remembered.
    pub user_asked_to_remember: bool,
}

impl ScoringContext {
    pub fn with_conversation_length(conversation_length: usize) -> Self {
        Self {
            conversation_length,
            ..Default::default()
        }
    }

    pub fn remember_requested() -> Self {
        Self {
            user_asked_to_remember: true,
            ..Default::default()
        }
    }
}

/// Score how worth remembering `text` is, in [0, 1].
pub fn score_importance(text: &str, context: &ScoringContext) -> f64 {
    let text_lower = text.to_lowercase();
    let mut score = 0.0;

    // Substring matches, so "call" also fires on "recall".
    let high_matches = HIGH_IMPORTANCE_KEYWORDS
        .iter()
        .filter(|kw| text_lower.contains(*kw))
        .count();
    let medium_matches = MEDIUM_IMPORTANCE_KEYWORDS
        .iter()
        .filter(|kw| text_lower.contains(*kw))
        .count();
    score += high_matches as f64 * HIGH_KEYWORD_WEIGHT;
    score += medium_matches as f64 * MEDIUM_KEYWORD_WEIGHT;

    if text.chars().count() > LENGTH_BONUS_CHARS {
        score += LENGTH_BONUS;
    }

    if context.conversation_length > LONG_CONVERSATION_TURNS {
        score += LONG_CONVERSATION_BONUS;
    }

    if context.user_asked_to_remember {
        score += EXPLICIT_REMEMBER_BONUS;
    }

    if is_question(text, &text_lower) {
        score += QUESTION_BONUS;
    }

    score.clamp(0.0, 1.0)
}

fn is_question(text: &str, text_lower: &str) -> bool {
    text.contains('?') || INTERROGATIVES.iter().any(|w| text_lower.starts_with(w))
}
