use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use crate::config::DecisionConfig;
use crate::{Comment, Event, EventType};

const HISTORY_LIMIT: usize = 10;
const THRESHOLD_FLOOR: f64 = 0.30;
const THRESHOLD_CEIL: f64 = 0.95;
/// Comments within this many media-seconds count toward frequency suppression.
const SUPPRESSION_WINDOW_SECS: f64 = 90.0;
/// Conversation time below which commenting is suppressed outright.
const COLD_START_SECS: f64 = 20.0;
const QUALITY_BONUS_CAP: f64 = 0.3;

/// Whether a comment should be generated and how urgently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Per-dimension scores feeding the weighted base score, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DecisionFactors {
    pub emotion: f64,
    pub topic: f64,
    pub timing: f64,
    pub importance: f64,
    pub keyword: f64,
}

/// Output of one evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub should_comment: bool,
    pub score: f64,
    pub confidence: f64,
    pub factors: DecisionFactors,
    pub priority: Priority,
    pub suggested_delay_ms: u64,
    pub reasoning: String,
}

/// Stateful per-stream scorer.
///
/// Holds the comment history, the time of the last emission, and a dynamic
/// threshold that self-adjusts toward the configured base depending on the
/// recent commenting rate. Pure computation: `evaluate` never fails.
pub struct DecisionEngine {
    config: DecisionConfig,
    /// Media seconds of the last emitted comment; `None` until the first.
    last_comment_time: Option<f64>,
    comment_history: VecDeque<Comment>,
    dynamic_threshold: f64,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        let dynamic_threshold = initial_threshold(&config);
        Self {
            config,
            last_comment_time: None,
            comment_history: VecDeque::new(),
            dynamic_threshold,
        }
    }

    /// Returns the engine to its initial state: no history, no last comment,
    /// threshold back at its starting value.
    pub fn reset(&mut self) {
        self.last_comment_time = None;
        self.comment_history.clear();
        self.dynamic_threshold = initial_threshold(&self.config);
    }

    /// Scores the detected events against the stream state at `timestamp`
    /// (the triggering turn's end time, media seconds).
    pub fn evaluate(&mut self, events: &[Event], timestamp: f64) -> Decision {
        let delta = self
            .last_comment_time
            .map(|last| (timestamp - last).max(0.0))
            .unwrap_or(0.0);

        let factors = self.compute_factors(events, timestamp, delta);
        let quality_bonus = quality_bonus(events);

        let base = factors.emotion * self.config.emotion_weight
            + factors.topic * self.config.topic_weight
            + factors.timing * self.config.timing_weight
            + factors.importance * self.config.importance_weight
            + factors.keyword * self.config.keyword_weight;

        let time_decay = self
            .config
            .time_decay_rate
            .powf((60.0 - delta).max(0.0) / 60.0);
        let suppression = self.frequency_suppression(timestamp);

        let score = (base + quality_bonus) * time_decay * suppression;

        let threshold = self.dynamic_threshold;
        let should_comment = score > threshold;
        let confidence = if threshold > 0.0 {
            (score / threshold).min(1.0)
        } else {
            1.0
        };

        let priority = priority_for(events, score);
        let suggested_delay_ms = self.suggested_delay_ms(priority, delta);

        let reasoning = format!(
            "score {:.3} {} threshold {:.3} (emotion {:.2}, topic {:.2}, timing {:.2}, \
             importance {:.2}, keyword {:.2}; bonus {:.2}, decay {:.3}, suppression {:.2})",
            score,
            if should_comment { "above" } else { "below" },
            threshold,
            factors.emotion,
            factors.topic,
            factors.timing,
            factors.importance,
            factors.keyword,
            quality_bonus,
            time_decay,
            suppression,
        );

        self.update_threshold(should_comment, delta);

        debug!(
            score,
            threshold,
            should_comment,
            ?priority,
            "decision evaluated"
        );

        Decision {
            should_comment,
            score,
            confidence,
            factors,
            priority,
            suggested_delay_ms,
            reasoning,
        }
    }

    /// Records an emitted comment. The comment's media timestamp becomes the
    /// new `last_comment_time`; history is trimmed to the 10 newest.
    pub fn update_history(&mut self, comment: Comment) {
        self.last_comment_time = Some(comment.timestamp);
        self.comment_history.push_back(comment);
        while self.comment_history.len() > HISTORY_LIMIT {
            self.comment_history.pop_front();
        }
    }

    pub fn last_comment_time(&self) -> Option<f64> {
        self.last_comment_time
    }

    pub fn dynamic_threshold(&self) -> f64 {
        self.dynamic_threshold
    }

    pub fn history_len(&self) -> usize {
        self.comment_history.len()
    }

    fn compute_factors(&self, events: &[Event], timestamp: f64, delta: f64) -> DecisionFactors {
        let max_confidence = |pred: &dyn Fn(EventType) -> bool| -> f64 {
            events
                .iter()
                .filter(|e| pred(e.event_type))
                .map(|e| e.confidence)
                .fold(0.0, f64::max)
        };

        DecisionFactors {
            emotion: max_confidence(&|t| t == EventType::EmotionPeak),
            topic: max_confidence(&|t| t == EventType::TopicChange),
            importance: max_confidence(&|t| {
                matches!(
                    t,
                    EventType::ConclusionReached | EventType::KeyPoint | EventType::SummaryPoint
                )
            }),
            keyword: max_confidence(&|t| t == EventType::QuestionRaised),
            timing: self.timing_factor(timestamp, delta),
        }
    }

    fn timing_factor(&self, timestamp: f64, delta: f64) -> f64 {
        if timestamp < COLD_START_SECS {
            return 0.1;
        }
        let min = self.config.min_interval;
        let max = self.config.max_interval;
        if delta < min {
            if min > 0.0 {
                (delta / min * 0.2).max(0.05)
            } else {
                1.0
            }
        } else if delta > max {
            1.0
        } else if max > min {
            (delta - min) / (max - min)
        } else {
            1.0
        }
    }

    /// Suppression by the number of recent history comments within the
    /// 90 media-second window ending at `timestamp`.
    fn frequency_suppression(&self, timestamp: f64) -> f64 {
        let window_start = timestamp - SUPPRESSION_WINDOW_SECS;
        let recent = self
            .comment_history
            .iter()
            .filter(|c| c.timestamp >= window_start && c.timestamp < timestamp)
            .count();
        match recent {
            0 => 1.0,
            1 => 0.6,
            2 => 0.4,
            _ => 0.2,
        }
    }

    fn suggested_delay_ms(&self, priority: Priority, delta: f64) -> u64 {
        let base: u64 = match priority {
            Priority::High => 1500,
            Priority::Medium => 2500,
            Priority::Low => 4000,
        };
        let catch_up = if delta < self.config.min_interval {
            ((self.config.min_interval - delta) * 1000.0) as u64
        } else {
            0
        };
        base + catch_up
    }

    fn update_threshold(&mut self, should_comment: bool, delta: f64) {
        let t = self.dynamic_threshold;
        self.dynamic_threshold = if should_comment && delta < 1.5 * self.config.min_interval {
            // Commenting too often: raise the bar.
            (t * 1.05).min(THRESHOLD_CEIL)
        } else if !should_comment && delta > self.config.max_interval {
            // Too quiet: lower the bar.
            (t * 0.95).max(THRESHOLD_FLOOR)
        } else {
            t + 0.1 * (self.config.base_threshold - t)
        };
    }
}

fn initial_threshold(config: &DecisionConfig) -> f64 {
    (config.base_threshold * 1.3).min(0.85)
}

fn quality_bonus(events: &[Event]) -> f64 {
    let total: f64 = events
        .iter()
        .map(|e| ((e.content_quality_score - 3.0) / 10.0 * 0.3).max(0.0))
        .sum();
    total.min(QUALITY_BONUS_CAP)
}

fn priority_for(events: &[Event], score: f64) -> Priority {
    let has_peak_type = events.iter().any(|e| {
        matches!(
            e.event_type,
            EventType::ConclusionReached | EventType::ClimaxMoment
        )
    });
    if has_peak_type && score > 0.95 {
        Priority::High
    } else if score > 0.85 {
        Priority::Medium
    } else {
        Priority::Low
    }
}
