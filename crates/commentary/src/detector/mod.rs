pub mod llm;

pub use llm::LlmEventDetector;

use async_trait::async_trait;

use crate::Event;
use crate::queue::DetectionJob;

/// Trait for pluggable event detectors.
///
/// Implementations receive a ready turn plus the buffer snapshots captured
/// at enqueue time, and return the events worth scoring. Transport and
/// parse failures propagate as errors; the queue surfaces them on the
/// engine's error channel and moves on.
#[async_trait]
pub trait EventDetector: Send + Sync + 'static {
    async fn detect(&self, job: &DetectionJob) -> anyhow::Result<Vec<Event>>;

    /// Human-readable detector name.
    fn name(&self) -> &str;
}
