//! Shared fixtures: scripted detector/generator stubs and event helpers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use colorcast_commentary::detector::EventDetector;
use colorcast_commentary::generator::{
    CommentContext, CommentGenerator, GeneratedComment, GenerationOutcome,
};
use colorcast_commentary::queue::DetectionJob;
use colorcast_commentary::{CommentaryEvent, Event, EventType, Turn};
use tokio::sync::broadcast;

/// Detector stub that replays scripted responses in order and records every
/// turn it was asked about. Runs out of script -> returns no events.
pub struct ScriptedDetector {
    delay: Duration,
    script: Mutex<VecDeque<anyhow::Result<Vec<Event>>>>,
    calls: Mutex<Vec<Turn>>,
}

impl ScriptedDetector {
    pub fn new(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push_events(&self, events: Vec<Event>) {
        self.script.lock().unwrap().push_back(Ok(events));
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!("{message}")));
    }

    /// Turns passed to `detect`, in call order.
    pub fn calls(&self) -> Vec<Turn> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventDetector for ScriptedDetector {
    async fn detect(&self, job: &DetectionJob) -> anyhow::Result<Vec<Event>> {
        self.calls.lock().unwrap().push(job.turn.clone());
        tokio::time::sleep(self.delay).await;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// What the stub generator does on each call.
#[derive(Clone)]
pub enum GeneratorMode {
    Accept(String),
    Reject(String),
    Fail(String),
}

pub struct StubGenerator {
    mode: GeneratorMode,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubGenerator {
    pub fn accepting(content: &str) -> Arc<Self> {
        Self::with_mode(GeneratorMode::Accept(content.to_string()), 0)
    }

    pub fn rejecting(reason: &str) -> Arc<Self> {
        Self::with_mode(GeneratorMode::Reject(reason.to_string()), 0)
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::with_mode(GeneratorMode::Fail(message.to_string()), 0)
    }

    pub fn with_mode(mode: GeneratorMode, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            mode,
            delay: Duration::from_millis(delay_ms),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommentGenerator for StubGenerator {
    async fn generate(&self, _context: &CommentContext) -> anyhow::Result<GenerationOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.mode {
            GeneratorMode::Accept(content) => {
                Ok(GenerationOutcome::Accepted(GeneratedComment {
                    content: content.clone(),
                    writer: "stub".to_string(),
                    generation_time_ms: self.delay.as_millis() as u64,
                }))
            }
            GeneratorMode::Reject(reason) => Ok(GenerationOutcome::Rejected {
                reason: reason.clone(),
            }),
            GeneratorMode::Fail(message) => Err(anyhow::anyhow!("{message}")),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

pub fn turn(id: &str, content: &str, start: f64, end: f64) -> Turn {
    Turn::new(id, content, start, end)
}

pub fn event(event_type: EventType, confidence: f64, intensity: f64, quality: f64) -> Event {
    Event {
        id: "fixture".to_string(),
        event_type,
        confidence,
        intensity,
        timestamp: 0.0,
        duration: 0.0,
        triggers: Vec::new(),
        reasoning: "fixture event".to_string(),
        language: Some("en".to_string()),
        content_quality_score: quality,
    }
}

/// An event batch strong enough to clear the initial 0.845 threshold even
/// under cold-start timing suppression.
pub fn strong_events() -> Vec<Event> {
    vec![
        event(EventType::ConclusionReached, 1.0, 1.0, 10.0),
        event(EventType::TopicChange, 1.0, 1.0, 10.0),
        event(EventType::EmotionPeak, 1.0, 1.0, 10.0),
        event(EventType::QuestionRaised, 1.0, 1.0, 10.0),
    ]
}

/// Lets queued work settle (paused clock auto-advances through sleeps), then
/// drains everything the engine emitted so far.
pub async fn settle_and_drain(
    rx: &mut broadcast::Receiver<CommentaryEvent>,
    settle: Duration,
) -> Vec<CommentaryEvent> {
    tokio::time::sleep(settle).await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
