pub mod llm;

pub use llm::LlmCommentGenerator;

use async_trait::async_trait;
use serde::Serialize;

use crate::text::tail_chars;
use crate::{Comment, Event};

/// How much uncommented text grounds the writers.
const GROUNDING_CHARS: usize = 600;
/// Fallback grounding from the historical window when nothing is uncommented.
const FALLBACK_GROUNDING_CHARS: usize = 400;
/// At most this many events are summarized into the prompt.
const MAX_SUMMARIZED_EVENTS: usize = 5;

/// Everything the generator needs for one comment attempt, snapshotted from
/// the buffers at generation time.
#[derive(Debug, Clone, Serialize)]
pub struct CommentContext {
    pub current_text: String,
    pub historical_text: String,
    pub uncommented_text: String,
    pub events: Vec<Event>,
    pub previous_comments: Vec<Comment>,
}

impl CommentContext {
    /// The primary grounding excerpt for the writers: the tail of the
    /// uncommented text, falling back to the tail of the historical window.
    pub fn grounding_excerpt(&self) -> &str {
        if !self.uncommented_text.is_empty() {
            tail_chars(&self.uncommented_text, GROUNDING_CHARS)
        } else {
            tail_chars(&self.historical_text, FALLBACK_GROUNDING_CHARS)
        }
    }

    /// One line per event (capped at five), for the selector/writer prompts.
    pub fn event_summary(&self) -> String {
        let lines: Vec<String> = self
            .events
            .iter()
            .take(MAX_SUMMARIZED_EVENTS)
            .map(|e| {
                format!(
                    "- {}: {} (confidence {:.2})",
                    e.event_type.as_str(),
                    if e.reasoning.is_empty() {
                        "no reasoning given"
                    } else {
                        &e.reasoning
                    },
                    e.confidence,
                )
            })
            .collect();
        lines.join("\n")
    }
}

/// A comment produced by a writer, before the engine wraps it into a
/// [`Comment`] with id and media timestamp.
#[derive(Debug, Clone)]
pub struct GeneratedComment {
    pub content: String,
    pub writer: String,
    pub generation_time_ms: u64,
}

/// Outcome of one generation attempt. A rejection is a normal result, not an
/// error: the selector or writer judged the moment not worth a comment.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Accepted(GeneratedComment),
    Rejected { reason: String },
}

/// Trait for pluggable comment generators.
#[async_trait]
pub trait CommentGenerator: Send + Sync + 'static {
    /// Attempts to produce one comment. Transport failures are errors;
    /// deliberate declines are `Rejected`.
    async fn generate(&self, context: &CommentContext) -> anyhow::Result<GenerationOutcome>;

    /// Human-readable generator name.
    fn name(&self) -> &str;
}
