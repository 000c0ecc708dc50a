use tracing::debug;

use crate::Turn;
use crate::config::AggregatorConfig;
use crate::text::count_words;

/// Merges consecutive brief turns into one synthetic turn substantial enough
/// to justify a detection call.
///
/// This is a synchronous state machine; the engine owns the debounce timer
/// and calls `take_on_timeout()` when it fires. State is transient per
/// aggregation window.
pub struct ShortTurnAggregator {
    config: AggregatorConfig,
    buffered_content: String,
    buffered_start_time: f64,
    last_turn_end_time: f64,
    word_count: usize,
    active: bool,
}

impl ShortTurnAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            buffered_content: String::new(),
            buffered_start_time: 0.0,
            last_turn_end_time: 0.0,
            word_count: 0,
            active: false,
        }
    }

    /// Adds a short turn to the aggregation.
    ///
    /// Returns the aggregated turn when a flush trigger fires, `None` while
    /// the buffer is still growing. A silence gap larger than the configured
    /// maximum discards the existing buffer and restarts from this turn.
    pub fn add(&mut self, turn: &Turn) -> Option<Turn> {
        if self.active {
            let gap_ms = (turn.start_time - self.last_turn_end_time) * 1000.0;
            if gap_ms > self.config.aggregation_max_gap_ms as f64 {
                debug!(
                    gap_ms,
                    dropped_words = self.word_count,
                    "aggregation gap too large, discarding buffer"
                );
                self.clear();
            }
        }

        if !self.active {
            self.active = true;
            self.buffered_start_time = turn.start_time;
        }
        if !self.buffered_content.is_empty() {
            self.buffered_content.push(' ');
        }
        self.buffered_content.push_str(&turn.content);
        self.last_turn_end_time = turn.end_time;
        self.word_count += count_words(&turn.content);

        let elapsed_ms = (self.last_turn_end_time - self.buffered_start_time) * 1000.0;
        let duration_reached = elapsed_ms >= self.config.min_turn_duration_ms as f64;
        let words_reached = self.config.aggregation_max_words > 0
            && self.word_count >= self.config.aggregation_max_words;
        let total_reached = self.config.aggregation_max_total_duration_ms > 0
            && elapsed_ms >= self.config.aggregation_max_total_duration_ms as f64;

        if duration_reached || words_reached || total_reached {
            debug!(
                elapsed_ms,
                words = self.word_count,
                duration_reached,
                words_reached,
                total_reached,
                "aggregation flushed"
            );
            return Some(self.take(turn.id.clone()));
        }
        None
    }

    /// Flushes the buffered turn when the debounce timer fires.
    ///
    /// The emitted turn's id is the string form of the buffered start time,
    /// since no single input turn triggered it.
    pub fn take_on_timeout(&mut self) -> Option<Turn> {
        if !self.active {
            return None;
        }
        let id = self.buffered_start_time.to_string();
        Some(self.take(id))
    }

    fn take(&mut self, id: String) -> Turn {
        let turn = Turn {
            id,
            content: std::mem::take(&mut self.buffered_content),
            start_time: self.buffered_start_time,
            end_time: self.last_turn_end_time,
        };
        self.clear();
        turn
    }

    /// Whether an aggregation window is currently open.
    pub fn has_pending(&self) -> bool {
        self.active
    }

    pub fn clear(&mut self) {
        self.buffered_content.clear();
        self.buffered_start_time = 0.0;
        self.last_turn_end_time = 0.0;
        self.word_count = 0;
        self.active = false;
    }
}
