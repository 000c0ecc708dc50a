use std::sync::Arc;

use async_trait::async_trait;
use colorcast_llm::{ChatClient, ChatRequest};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::EventDetector;
use crate::config::DetectorConfig;
use crate::queue::DetectionJob;
use crate::text::tail_chars;
use crate::{Event, EventType};

/// How much of the full context window is quoted into the prompt.
const BROAD_CONTEXT_CHARS: usize = 1500;

const SYSTEM_PROMPT: &str = "\
You are an event detector for live conversation commentary. Given transcript \
context and the current turn, identify noteworthy events. Event types: \
emotion_peak, topic_change, question_raised, conclusion_reached, key_point, \
climax_moment, summary_point. Respond with a single JSON object: \
{\"events\": [{\"type\": \"...\", \"confidence\": 0.0-1.0, \"intensity\": \
0.0-1.0, \"triggers\": [\"short phrase\", ...], \"reasoning\": \"...\", \
\"content_quality_score\": 0-10}], \"context_language\": \"ISO 639-1 code\"}. \
Report only events grounded in the text; an empty events array is a valid \
answer.";

/// Wire shape of one detected event, before filtering and enrichment.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDetectedEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub confidence: f64,
    pub intensity: f64,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub content_quality_score: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetectionResponse {
    #[serde(default)]
    pub events: Vec<RawDetectedEvent>,
    #[serde(default)]
    pub context_language: Option<String>,
}

/// Event detector backed by a chat-completion model.
pub struct LlmEventDetector {
    client: Arc<dyn ChatClient>,
    config: DetectorConfig,
}

impl LlmEventDetector {
    pub fn new(client: Arc<dyn ChatClient>, config: DetectorConfig) -> Self {
        Self { client, config }
    }

    fn build_prompt(job: &DetectionJob) -> String {
        let broad = tail_chars(&job.full_context, BROAD_CONTEXT_CHARS);
        format!(
            "Broad context (older transcript):\n{broad}\n\n\
             Not-yet-commented transcript:\n{immediate}\n\n\
             Current turn:\n{content}",
            immediate = job.uncommented_text,
            content = job.turn.content,
        )
    }
}

#[async_trait]
impl EventDetector for LlmEventDetector {
    async fn detect(&self, job: &DetectionJob) -> anyhow::Result<Vec<Event>> {
        let request = ChatRequest::new(self.config.model.clone(), Self::build_prompt(job))
            .with_system(SYSTEM_PROMPT.to_string())
            .expect_json();

        let text = self.client.complete(request).await?;
        let response = parse_detection_response(&text)?;

        let total = response.events.len();
        let events: Vec<Event> = response
            .events
            .into_iter()
            .filter(|raw| passes_thresholds(raw, &self.config))
            .map(|raw| Event {
                id: Uuid::new_v4().to_string(),
                event_type: raw.event_type,
                confidence: raw.confidence,
                intensity: raw.intensity,
                timestamp: job.turn.end_time,
                duration: 0.0,
                triggers: raw.triggers,
                reasoning: raw.reasoning,
                language: response.context_language.clone(),
                content_quality_score: raw.content_quality_score,
            })
            .collect();

        debug!(
            turn_id = %job.turn.id,
            detected = total,
            kept = events.len(),
            "detection response filtered"
        );
        Ok(events)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Parses the model's JSON answer, tolerating a markdown code fence but
/// nothing else; anything unparseable is an error for the caller to surface.
pub(crate) fn parse_detection_response(text: &str) -> anyhow::Result<DetectionResponse> {
    let trimmed = strip_code_fence(text.trim());
    serde_json::from_str(trimmed)
        .map_err(|e| anyhow::anyhow!("malformed detection response: {e}; body: {trimmed:.200}"))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest).trim();
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest)
}

/// Per-event filter: confidence gate plus type-specific intensity gates.
pub(crate) fn passes_thresholds(event: &RawDetectedEvent, config: &DetectorConfig) -> bool {
    if event.confidence < config.detection_sensitivity {
        return false;
    }
    if matches!(
        event.event_type,
        EventType::EmotionPeak | EventType::TopicChange
    ) && event.intensity < config.emotion_threshold
    {
        return false;
    }
    if matches!(
        event.event_type,
        EventType::TopicChange
            | EventType::QuestionRaised
            | EventType::ConclusionReached
            | EventType::SummaryPoint
    ) && event.intensity < config.topic_transition_threshold
    {
        return false;
    }
    if event.event_type == EventType::KeyPoint
        && event.intensity < config.keypoint_density_threshold
    {
        return false;
    }
    true
}
