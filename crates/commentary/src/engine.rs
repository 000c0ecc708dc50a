use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use colorcast_llm::ApiKeys;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregator::ShortTurnAggregator;
use crate::buffer::{BufferStatistics, TextBuffer};
use crate::config::{CommentaryConfig, ConfigError};
use crate::decision::{Decision, DecisionEngine};
use crate::detector::{EventDetector, LlmEventDetector};
use crate::generator::{
    CommentContext, CommentGenerator, GenerationOutcome, LlmCommentGenerator,
};
use crate::queue::{DetectionJob, DetectionQueue, JobHandler};
use crate::scheduler::CommentScheduler;
use crate::{Comment, CommentaryEvent, Event, Turn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Snapshot of engine state for callers.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatistics {
    pub context_buffer: BufferStatistics,
    pub uncommented_buffer: BufferStatistics,
    pub dropped_stale_jobs: u64,
    pub config: CommentaryConfig,
}

/// State owned by the engine's processing path, guarded by one lock that is
/// never held across an await point.
struct StreamState {
    context_buffer: TextBuffer,
    uncommented_buffer: TextBuffer,
    aggregator: ShortTurnAggregator,
    decision: DecisionEngine,
    debounce: Option<AbortHandle>,
}

impl StreamState {
    fn cancel_debounce(&mut self) {
        if let Some(timer) = self.debounce.take() {
            timer.abort();
        }
    }
}

struct EngineInner {
    config: CommentaryConfig,
    detector: Arc<dyn EventDetector>,
    generator: Arc<dyn CommentGenerator>,
    state: Mutex<StreamState>,
    queue: DetectionQueue,
    scheduler: CommentScheduler,
    event_tx: broadcast::Sender<CommentaryEvent>,
}

/// One commentary stream: buffers, aggregation, detection scheduling,
/// decision making and comment generation behind a single facade.
///
/// Turns go in through [`on_turn_completed`](Self::on_turn_completed);
/// everything observable comes back out through the broadcast event channel.
/// Instances are fully isolated from each other. Methods that spawn work
/// must be called from within a tokio runtime.
pub struct CommentaryEngine {
    inner: Arc<EngineInner>,
}

impl CommentaryEngine {
    /// Creates an engine with explicit detector/generator implementations.
    /// Fails fast on configuration errors.
    pub fn new(
        config: CommentaryConfig,
        detector: Arc<dyn EventDetector>,
        generator: Arc<dyn CommentGenerator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = StreamState {
            context_buffer: TextBuffer::new(config.context_buffer.clone()),
            uncommented_buffer: TextBuffer::new(config.effective_uncommented_buffer()),
            aggregator: ShortTurnAggregator::new(config.aggregator.clone()),
            decision: DecisionEngine::new(config.decision.clone()),
            debounce: None,
        };
        let queue = DetectionQueue::new(Duration::from_millis(
            config.detector.detection_max_staleness_ms,
        ));

        info!(
            detector = detector.name(),
            generator = generator.name(),
            "commentary engine created"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                detector,
                generator,
                state: Mutex::new(state),
                queue,
                scheduler: CommentScheduler::new(),
                event_tx,
            }),
        })
    }

    /// Creates an engine wired to the configured LLM provider for both
    /// detection and generation.
    pub fn with_llm(config: CommentaryConfig, api_keys: ApiKeys) -> anyhow::Result<Self> {
        config.validate()?;
        let client = colorcast_llm::build_client(config.detector.model_provider, &api_keys)?;
        let detector = Arc::new(LlmEventDetector::new(
            Arc::clone(&client),
            config.detector.clone(),
        ));
        let generator = Arc::new(LlmCommentGenerator::new(client, config.generator.clone()));
        Self::new(config, detector, generator).map_err(Into::into)
    }

    /// Returns an independent receiver for the engine's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<CommentaryEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Accepts a completed transcription turn. Returns immediately;
    /// detection and generation run asynchronously.
    pub fn on_turn_completed(&self, turn: Turn) {
        if turn.content.trim().is_empty() {
            debug!(turn_id = %turn.id, "skipping empty turn");
            return;
        }

        let min_duration_ms = self.inner.config.aggregator.min_turn_duration_ms as f64;
        let ready = {
            let mut state = self.inner.state.lock().unwrap();
            state.context_buffer.append(&turn);
            state.uncommented_buffer.append(&turn);

            if turn.duration_ms() >= min_duration_ms {
                // Long enough on its own: any partial aggregation is stale now.
                state.cancel_debounce();
                state.aggregator.clear();
                Some(turn)
            } else {
                match state.aggregator.add(&turn) {
                    Some(ready) => {
                        state.cancel_debounce();
                        Some(ready)
                    }
                    None => {
                        state.cancel_debounce();
                        if state.aggregator.has_pending() {
                            state.debounce = Some(Arc::clone(&self.inner).spawn_debounce());
                        }
                        None
                    }
                }
            }
        };

        if let Some(ready) = ready {
            Arc::clone(&self.inner).enqueue_detection(ready);
        }
    }

    pub fn statistics(&self) -> EngineStatistics {
        let state = self.inner.state.lock().unwrap();
        EngineStatistics {
            context_buffer: state.context_buffer.statistics(),
            uncommented_buffer: state.uncommented_buffer.statistics(),
            dropped_stale_jobs: self.inner.queue.dropped_stale(),
            config: self.inner.config.clone(),
        }
    }

    /// Resets all stream state: buffers, aggregation (timer cancelled), the
    /// pending detection job, any pending generation, and the decision
    /// engine's history and threshold.
    pub fn clear(&self) {
        self.inner.scheduler.abort();
        self.inner.queue.clear();
        let mut state = self.inner.state.lock().unwrap();
        state.cancel_debounce();
        state.aggregator.clear();
        state.context_buffer.clear();
        state.uncommented_buffer.clear();
        state.decision.reset();
        debug!("engine state cleared");
    }
}

impl Drop for CommentaryEngine {
    fn drop(&mut self) {
        self.clear();
        self.inner.queue.shutdown();
        debug!("commentary engine torn down");
    }
}

impl EngineInner {
    fn emit(&self, event: CommentaryEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("no event subscribers");
        }
    }

    /// Arms the aggregation debounce timer. Returns the timer's abort handle;
    /// the caller stores it so any later add/clear can cancel it.
    fn spawn_debounce(self: Arc<Self>) -> AbortHandle {
        let delay = Duration::from_millis(self.config.aggregator.aggregation_max_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            self.on_aggregation_timeout();
        })
        .abort_handle()
    }

    fn on_aggregation_timeout(self: Arc<Self>) {
        let ready = {
            let mut state = self.state.lock().unwrap();
            state.debounce = None;
            state.aggregator.take_on_timeout()
        };
        if let Some(turn) = ready {
            debug!(turn_id = %turn.id, "aggregation debounce elapsed, flushing");
            self.enqueue_detection(turn);
        }
    }

    /// Snapshots both buffer windows and puts a job in the latest-wins slot.
    fn enqueue_detection(self: Arc<Self>, turn: Turn) {
        let (uncommented_text, full_context) = {
            let state = self.state.lock().unwrap();
            (
                state.uncommented_buffer.window(None),
                state.context_buffer.window(None),
            )
        };
        let job = DetectionJob::new(turn, uncommented_text, full_context);
        let handler = Arc::clone(&self) as Arc<dyn JobHandler>;
        self.queue.enqueue(job, handler);
    }

    /// Schedules the delayed, cancellable generation for a positive decision.
    /// A newer positive decision aborts this one, wherever it is.
    fn schedule_generation(self: Arc<Self>, turn: Turn, events: Vec<Event>, decision: Decision) {
        let inner = Arc::clone(&self);
        let delay = Duration::from_millis(decision.suggested_delay_ms);
        self.scheduler.schedule(async move {
            tokio::time::sleep(delay).await;

            let context = {
                let state = inner.state.lock().unwrap();
                CommentContext {
                    current_text: turn.content.clone(),
                    historical_text: state.context_buffer.window(None),
                    uncommented_text: state.uncommented_buffer.window(None),
                    events,
                    previous_comments: Vec::new(),
                }
            };

            inner.emit(CommentaryEvent::CommentStarted { turn: turn.clone() });

            match inner.generator.generate(&context).await {
                Ok(GenerationOutcome::Accepted(generated)) => {
                    let comment = Comment {
                        id: Uuid::new_v4().to_string(),
                        length: generated.content.chars().count(),
                        content: generated.content,
                        writer: generated.writer,
                        generation_time_ms: generated.generation_time_ms,
                        timestamp: turn.end_time,
                    };
                    {
                        // History update and buffer reset are atomic with
                        // respect to incoming appends.
                        let mut state = inner.state.lock().unwrap();
                        state.decision.update_history(comment.clone());
                        state.uncommented_buffer.clear();
                    }
                    info!(
                        writer = %comment.writer,
                        chars = comment.length,
                        "comment emitted"
                    );
                    inner.emit(CommentaryEvent::CommentGenerated { comment, turn });
                }
                Ok(GenerationOutcome::Rejected { reason }) => {
                    debug!(%reason, "comment rejected");
                    inner.emit(CommentaryEvent::CommentRejected { reason, turn });
                }
                Err(error) => {
                    inner.emit(CommentaryEvent::Error {
                        message: error.to_string(),
                        turn: Some(turn),
                    });
                }
            }
        });
    }
}

#[async_trait]
impl JobHandler for EngineInner {
    async fn process(self: Arc<Self>, job: DetectionJob) -> anyhow::Result<()> {
        // Defensive re-check: the job may have aged while earlier work held
        // the worker.
        if job.enqueued_at.elapsed() > self.queue.max_staleness() {
            self.queue.note_dropped_stale();
            debug!(turn_id = %job.turn.id, "job went stale before detection");
            return Ok(());
        }

        let started = Instant::now();
        let events = self.detector.detect(&job).await?;
        self.emit(CommentaryEvent::EventsDetected {
            events: events.clone(),
            turn: job.turn.clone(),
            processing_time_ms: started.elapsed().as_millis() as u64,
        });

        // Evaluate even when no events survived filtering: the dynamic
        // threshold adapts on quiet stretches too.
        let decision = {
            let mut state = self.state.lock().unwrap();
            state.decision.evaluate(&events, job.turn.end_time)
        };
        self.emit(CommentaryEvent::DecisionMade {
            decision: decision.clone(),
            turn: job.turn.clone(),
            processing_time_ms: started.elapsed().as_millis() as u64,
        });

        if decision.should_comment {
            self.schedule_generation(job.turn, events, decision);
        }
        Ok(())
    }

    fn on_error(&self, error: anyhow::Error, job: &DetectionJob) {
        self.emit(CommentaryEvent::Error {
            message: error.to_string(),
            turn: Some(job.turn.clone()),
        });
    }
}
