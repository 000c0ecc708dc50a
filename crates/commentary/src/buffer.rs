use serde::Serialize;

use crate::Turn;
use crate::config::BufferConfig;

/// One stored fragment of transcript text.
#[derive(Debug, Clone, Serialize)]
pub struct TextSegment {
    pub content: String,
    /// Media time of the source turn's end, seconds.
    pub timestamp: f64,
    /// Monotonic arrival counter, reset by `clear()`.
    pub position: u64,
}

/// Snapshot of a buffer's contents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BufferStatistics {
    pub segment_count: usize,
    pub total_chars: usize,
    pub oldest_timestamp: Option<f64>,
    pub newest_timestamp: Option<f64>,
}

/// Append-only, time-indexed store of transcript segments.
///
/// Segments are kept in arrival order; nothing is evicted automatically, so
/// callers bound retrieved text through `window()`'s time cutoff. All access
/// happens from the engine's processing path under one lock, so the buffer
/// itself is plain single-threaded state.
pub struct TextBuffer {
    segments: Vec<TextSegment>,
    next_position: u64,
    config: BufferConfig,
}

impl TextBuffer {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            segments: Vec::new(),
            next_position: 0,
            config,
        }
    }

    pub fn append(&mut self, turn: &Turn) {
        self.segments.push(TextSegment {
            content: turn.content.clone(),
            timestamp: turn.end_time,
            position: self.next_position,
        });
        self.next_position += 1;
    }

    /// Space-joined content of all segments within `size_secs` of the newest
    /// segment's timestamp. `None` uses the configured window duration.
    ///
    /// The cutoff is `newest - size_secs`: both sides of the subtraction are
    /// media seconds.
    pub fn window(&self, size_secs: Option<f64>) -> String {
        let size = size_secs.unwrap_or(self.config.window_duration);
        let Some(newest) = self.segments.last() else {
            return String::new();
        };
        let cutoff = newest.timestamp - size;
        let parts: Vec<&str> = self
            .segments
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .map(|s| s.content.as_str())
            .collect();
        parts.join(" ")
    }

    /// Segments whose timestamp falls within `[start, end]`.
    pub fn range(&self, start: f64, end: f64) -> Vec<&TextSegment> {
        self.segments
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .collect()
    }

    /// The `n` most recent segments, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<&TextSegment> {
        let skip = self.segments.len().saturating_sub(n);
        self.segments.iter().skip(skip).collect()
    }

    /// Segments matching `pattern`, most recent first, capped at `limit`.
    pub fn search(&self, pattern: &str, limit: usize) -> Result<Vec<&TextSegment>, regex::Error> {
        let re = regex::Regex::new(pattern)?;
        Ok(self
            .segments
            .iter()
            .rev()
            .filter(|s| re.is_match(&s.content))
            .take(limit)
            .collect())
    }

    /// Drops all segments and resets the position counter.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.next_position = 0;
    }

    pub fn statistics(&self) -> BufferStatistics {
        BufferStatistics {
            segment_count: self.segments.len(),
            total_chars: self.segments.iter().map(|s| s.content.chars().count()).sum(),
            oldest_timestamp: self.segments.first().map(|s| s.timestamp),
            newest_timestamp: self.segments.last().map(|s| s.timestamp),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
