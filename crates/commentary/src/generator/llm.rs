use std::sync::Arc;

use async_trait::async_trait;
use colorcast_llm::{ChatClient, ChatRequest};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::debug;

use super::{CommentContext, CommentGenerator, GeneratedComment, GenerationOutcome};
use crate::config::{GeneratorConfig, WriterConfig};

const SELECTOR_SYSTEM_PROMPT: &str = "\
You are the editor of a live commentary track. Given the conversation excerpt, \
the detected events, and the available writers, pick the single writer whose \
style fits this moment best, or reject the moment if no comment would help \
the audience. Respond with a single JSON object: {\"writer\": \"name\"} or \
{\"reject\": true, \"reason\": \"...\"}.";

#[derive(Debug, Deserialize)]
struct SelectorResponse {
    #[serde(default)]
    writer: Option<String>,
    #[serde(default)]
    reject: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Comment generator backed by a selector call that hands off to one of the
/// configured writer personas.
pub struct LlmCommentGenerator {
    client: Arc<dyn ChatClient>,
    config: GeneratorConfig,
}

impl LlmCommentGenerator {
    pub fn new(client: Arc<dyn ChatClient>, config: GeneratorConfig) -> Self {
        Self { client, config }
    }

    fn selector_prompt(&self, context: &CommentContext) -> String {
        let writers: Vec<String> = self
            .config
            .writers
            .iter()
            .map(|w| format!("- {}: {}", w.name, w.instructions))
            .collect();
        let mut prompt = format!(
            "Writers:\n{}\n\nDetected events:\n{}\n\nConversation excerpt:\n{}\n\nCurrent turn:\n{}",
            writers.join("\n"),
            context.event_summary(),
            context.grounding_excerpt(),
            context.current_text,
        );
        if !self.config.selector_instructions.is_empty() {
            prompt.push_str("\n\nAdditional instructions:\n");
            prompt.push_str(&self.config.selector_instructions);
        }
        prompt
    }

    fn writer_prompt(writer: &WriterConfig, context: &CommentContext) -> String {
        format!(
            "{}\n\nKeep the comment between {} and {} characters. Write exactly \
             one comment, no preamble, no quotation marks.\n\n\
             Detected events:\n{}\n\nConversation excerpt:\n{}\n\nCurrent turn:\n{}",
            writer.instructions,
            writer.min_length,
            writer.max_length,
            context.event_summary(),
            context.grounding_excerpt(),
            context.current_text,
        )
    }

    fn find_writer(&self, name: &str) -> Option<&WriterConfig> {
        self.config.writers.iter().find(|w| w.name == name)
    }
}

#[async_trait]
impl CommentGenerator for LlmCommentGenerator {
    async fn generate(&self, context: &CommentContext) -> anyhow::Result<GenerationOutcome> {
        let started = Instant::now();

        let selector_request = ChatRequest::new(
            self.config.selector_model.clone(),
            self.selector_prompt(context),
        )
        .with_system(SELECTOR_SYSTEM_PROMPT.to_string())
        .expect_json();

        let selector_text = self.client.complete(selector_request).await?;
        let selection: SelectorResponse = match serde_json::from_str(selector_text.trim()) {
            Ok(s) => s,
            Err(e) => {
                debug!(%e, "selector returned unparseable response");
                return Ok(GenerationOutcome::Rejected {
                    reason: format!("selector response unparseable: {e}"),
                });
            }
        };

        if selection.reject {
            return Ok(GenerationOutcome::Rejected {
                reason: selection
                    .reason
                    .unwrap_or_else(|| "selector declined".to_string()),
            });
        }

        let Some(writer) = selection.writer.as_deref().and_then(|n| self.find_writer(n)) else {
            return Ok(GenerationOutcome::Rejected {
                reason: format!(
                    "selector chose unknown writer '{}'",
                    selection.writer.unwrap_or_default()
                ),
            });
        };

        let model = writer
            .model
            .clone()
            .unwrap_or_else(|| self.config.selector_model.clone());
        let writer_request = ChatRequest::new(model, Self::writer_prompt(writer, context));
        let content = self.client.complete(writer_request).await?.trim().to_string();

        if content.is_empty() {
            return Ok(GenerationOutcome::Rejected {
                reason: format!("writer '{}' returned no content", writer.name),
            });
        }

        let generation_time_ms = started.elapsed().as_millis() as u64;
        debug!(
            writer = %writer.name,
            chars = content.chars().count(),
            generation_time_ms,
            "comment generated"
        );

        Ok(GenerationOutcome::Accepted(GeneratedComment {
            content,
            writer: writer.name.clone(),
            generation_time_ms,
        }))
    }

    fn name(&self) -> &str {
        "llm"
    }
}
