pub mod aggregator;
pub mod buffer;
pub mod config;
pub mod decision;
pub mod detector;
pub mod engine;
pub mod generator;
pub mod playback;
pub mod queue;
pub mod scheduler;
pub(crate) mod text;

pub use config::CommentaryConfig;
pub use decision::Decision;
pub use engine::{CommentaryEngine, EngineStatistics};

use serde::{Deserialize, Serialize};

/// A bounded transcription fragment with media-relative timestamps.
///
/// Turns are immutable inputs; `end_time >= start_time` and both are seconds
/// since the media stream started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub content: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl Turn {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        start_time: f64,
        end_time: f64,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            start_time,
            end_time,
        }
    }

    /// Spoken duration of the turn in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        (self.end_time - self.start_time) * 1000.0
    }
}

/// The closed set of observations the detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    EmotionPeak,
    TopicChange,
    QuestionRaised,
    ConclusionReached,
    KeyPoint,
    ClimaxMoment,
    SummaryPoint,
}

impl EventType {
    /// The snake_case wire name, as used in detector responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::EmotionPeak => "emotion_peak",
            EventType::TopicChange => "topic_change",
            EventType::QuestionRaised => "question_raised",
            EventType::ConclusionReached => "conclusion_reached",
            EventType::KeyPoint => "key_point",
            EventType::ClimaxMoment => "climax_moment",
            EventType::SummaryPoint => "summary_point",
        }
    }
}

/// A typed observation about the conversation, produced by the detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// How sure the detector is that the event occurred, in [0, 1].
    pub confidence: f64,
    /// How strong the event is, in [0, 1].
    pub intensity: f64,
    /// Media time of the triggering turn's end, seconds.
    pub timestamp: f64,
    pub duration: f64,
    /// Short phrases that triggered the detection, in order.
    pub triggers: Vec<String>,
    pub reasoning: String,
    pub language: Option<String>,
    /// Detector's judgement of how comment-worthy the content is, in [0, 10].
    pub content_quality_score: f64,
}

/// A comment accepted for emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub content: String,
    /// Name of the writer persona that produced the content.
    pub writer: String,
    /// Content length in characters.
    pub length: usize,
    pub generation_time_ms: u64,
    /// Media time of the triggering turn's end, seconds.
    ///
    /// Always present: the decision engine keys its interval math and
    /// frequency suppression off this value, so it is set by the engine at
    /// emission time rather than left to the generator.
    pub timestamp: f64,
}

/// Events published by the engine facade.
///
/// Delivered over a broadcast channel; each subscriber gets an independent
/// receiver, so a slow or dropped subscriber cannot affect the others.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum CommentaryEvent {
    /// Generation call initiated for a positive decision.
    CommentStarted { turn: Turn },
    /// Generation accepted; history updated and uncommented buffer cleared.
    CommentGenerated { comment: Comment, turn: Turn },
    /// The writer/selector declined to comment.
    CommentRejected { reason: String, turn: Turn },
    /// Detector results for a processed job.
    EventsDetected {
        events: Vec<Event>,
        turn: Turn,
        processing_time_ms: u64,
    },
    /// Decision computed for a processed job.
    DecisionMade {
        decision: Decision,
        turn: Turn,
        processing_time_ms: u64,
    },
    /// Any asynchronous failure (detection transport/parse, generation).
    Error { message: String, turn: Option<Turn> },
}
