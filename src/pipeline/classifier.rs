//! Keyword-based message classification.
//!
//! The pipeline only depends on the [`Classifier`] trait, so the vocabulary
//! heuristics here can be replaced without touching the pipeline shape.

use regex::Regex;

use crate::tickets::Priority;

/// Bare greetings with at most this many tokens are not queries.
const GREETING_MAX_TOKENS: usize = 3;

const GREETING_PATTERN: &str =
    r"(?i)\b(hi|hello|hey|get started|start|good morning|good afternoon)\b";

const QUERY_PATTERN: &str = r"(?i)\b(question|query|help|support|issue|problem|complaint|request|need|want|how|what|when|where|why|can|could|would|please|help me|i need|i want)\b";

const URGENT_PATTERN: &str = r"(?i)\b(urgent|emergency|critical|asap|immediately|broken|down|not working|error|failed)\b";

const IMPORTANT_PATTERN: &str = r"(?i)\b(important|issue|problem|help|support|complaint)\b";

/// All three classification results for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The text contains a greeting word.
    pub is_greeting: bool,
    /// The text is a substantive query rather than a bare greeting.
    pub is_query: bool,
    /// Priority tier for a ticket raised from this text.
    pub priority: Priority,
}

/// Replaceable classification strategy.
pub trait Classifier: Send + Sync {
    /// Whether the text contains a greeting word.
    fn is_greeting(&self, text: &str) -> bool;

    /// Whether the text is a query that should raise or update a ticket.
    fn is_query(&self, text: &str) -> bool;

    /// Priority tier for the text.
    fn priority(&self, text: &str) -> Priority;

    /// Run all three decisions.
    fn classify(&self, text: &str) -> Classification {
        Classification {
            is_greeting: self.is_greeting(text),
            is_query: self.is_query(text),
            priority: self.priority(text),
        }
    }
}

/// Default [`Classifier`] driven by fixed regex vocabularies.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    greeting: Regex,
    query: Regex,
    urgent: Regex,
    important: Regex,
}

impl KeywordClassifier {
    /// Build the classifier with the built-in vocabularies.
    ///
    /// # Errors
    ///
    /// Returns an error if a vocabulary pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            greeting: Regex::new(GREETING_PATTERN)?,
            query: Regex::new(QUERY_PATTERN)?,
            urgent: Regex::new(URGENT_PATTERN)?,
            important: Regex::new(IMPORTANT_PATTERN)?,
        })
    }
}

impl Classifier for KeywordClassifier {
    fn is_greeting(&self, text: &str) -> bool {
        self.greeting.is_match(text)
    }

    fn is_query(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }

        let tokens = token_count(text);

        // Greeting short-circuit comes first.
        if self.is_greeting(text) && tokens <= GREETING_MAX_TOKENS {
            return false;
        }
        if text.contains('?') || text.contains('？') {
            return true;
        }
        if self.query.is_match(text) {
            return true;
        }
        tokens > GREETING_MAX_TOKENS
    }

    fn priority(&self, text: &str) -> Priority {
        if text.trim().is_empty() {
            return Priority::Medium;
        }
        if self.urgent.is_match(text) {
            return Priority::Urgent;
        }
        if self.important.is_match(text) {
            return Priority::High;
        }
        Priority::Medium
    }
}

fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}
