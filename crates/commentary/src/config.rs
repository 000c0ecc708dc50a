use colorcast_llm::ModelProvider;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a configuration value is out of range at facade creation.
#[derive(Debug, Error)]
#[error("invalid config: {field} {message}")]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Configuration for one text buffer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Advisory capacity in words; the buffer itself never evicts.
    pub buffer_size: usize,
    /// Default window size for `window(None)`, seconds.
    pub window_duration: f64,
    /// Advisory per-segment word cap.
    pub segment_max_size: usize,
    /// Advisory retention horizon, seconds.
    pub retention_time: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: 10_000,
            window_duration: 300.0,
            segment_max_size: 50,
            retention_time: 3600.0,
        }
    }
}

/// Configuration for the short-turn aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Turns at least this long bypass aggregation entirely.
    pub min_turn_duration_ms: u64,
    /// Debounce delay before a partial aggregation is flushed anyway.
    pub aggregation_max_delay_ms: u64,
    /// Silence gap that discards a partial aggregation.
    pub aggregation_max_gap_ms: u64,
    /// Word-count flush trigger; 0 disables.
    pub aggregation_max_words: usize,
    /// Total-duration flush trigger; 0 disables.
    pub aggregation_max_total_duration_ms: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            min_turn_duration_ms: 1200,
            aggregation_max_delay_ms: 800,
            aggregation_max_gap_ms: 400,
            aggregation_max_words: 50,
            aggregation_max_total_duration_ms: 12_000,
        }
    }
}

/// Configuration for the event detector adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum confidence for any event to pass.
    pub detection_sensitivity: f64,
    /// Minimum intensity for emotion-class events.
    pub emotion_threshold: f64,
    /// Minimum intensity for topic-transition-class events.
    pub topic_transition_threshold: f64,
    /// Minimum intensity for key points.
    pub keypoint_density_threshold: f64,
    pub model_provider: ModelProvider,
    pub model: String,
    /// Wall-clock age after which a queued detection job is discarded.
    pub detection_max_staleness_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detection_sensitivity: 0.70,
            emotion_threshold: 0.75,
            topic_transition_threshold: 0.30,
            keypoint_density_threshold: 0.50,
            model_provider: ModelProvider::OpenAi,
            model: "gpt-5-nano".to_string(),
            detection_max_staleness_ms: 5000,
        }
    }
}

/// Configuration for the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub base_threshold: f64,
    /// Target minimum spacing between comments, seconds.
    pub min_interval: f64,
    /// Spacing beyond which the timing factor saturates, seconds.
    pub max_interval: f64,
    pub emotion_weight: f64,
    pub topic_weight: f64,
    pub timing_weight: f64,
    pub importance_weight: f64,
    pub keyword_weight: f64,
    pub frequency_suppression: f64,
    pub time_decay_rate: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            base_threshold: 0.65,
            min_interval: 20.0,
            max_interval: 90.0,
            emotion_weight: 0.20,
            topic_weight: 0.40,
            timing_weight: 0.15,
            importance_weight: 0.60,
            keyword_weight: 0.30,
            frequency_suppression: 0.80,
            time_decay_rate: 0.95,
        }
    }
}

/// One configured comment writer persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    pub name: String,
    pub instructions: String,
    /// Advisory minimum comment length, characters.
    pub min_length: usize,
    /// Advisory maximum comment length, characters.
    pub max_length: usize,
    /// Overrides the generator's default model for this writer.
    #[serde(default)]
    pub model: Option<String>,
}

impl WriterConfig {
    fn builtin(name: &str, instructions: &str, min_length: usize, max_length: usize) -> Self {
        Self {
            name: name.to_string(),
            instructions: instructions.to_string(),
            min_length,
            max_length,
            model: None,
        }
    }
}

/// Configuration for comment generation (writers + selector).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub writers: Vec<WriterConfig>,
    pub selector_model: String,
    pub selector_instructions: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            writers: default_writers(),
            selector_model: "gpt-5-mini".to_string(),
            selector_instructions: String::new(),
        }
    }
}

/// The six built-in writer personas.
pub fn default_writers() -> Vec<WriterConfig> {
    vec![
        WriterConfig::builtin(
            "analyst",
            "Explain what just happened in the conversation and why it matters. \
             Plain, precise language; no speculation beyond the transcript.",
            40,
            160,
        ),
        WriterConfig::builtin(
            "narrator",
            "Recap the current thread of the conversation so a viewer who just \
             arrived can follow along.",
            60,
            200,
        ),
        WriterConfig::builtin(
            "empath",
            "React to the speakers' feelings. Mirror the emotional tone of the \
             moment without exaggerating it.",
            30,
            120,
        ),
        WriterConfig::builtin(
            "skeptic",
            "Point out tension, open questions, or claims in the conversation \
             that deserve a second look.",
            40,
            160,
        ),
        WriterConfig::builtin(
            "hype",
            "Amplify the excitement of a big moment in one punchy line.",
            20,
            80,
        ),
        WriterConfig::builtin(
            "summarizer",
            "Condense the recent discussion into its single most important \
             takeaway.",
            50,
            180,
        ),
    ]
}

/// Top-level configuration for one commentary stream.
///
/// Every field group is optional in serde input; defaults match a live-stream
/// deployment. `validate()` is called at facade creation and fails fast.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentaryConfig {
    pub context_buffer: BufferConfig,
    /// When absent, inherits the context buffer settings.
    pub uncommented_buffer: Option<BufferConfig>,
    pub aggregator: AggregatorConfig,
    pub detector: DetectorConfig,
    pub decision: DecisionConfig,
    pub generator: GeneratorConfig,
}

impl CommentaryConfig {
    /// Effective configuration of the uncommented buffer.
    pub fn effective_uncommented_buffer(&self) -> BufferConfig {
        self.uncommented_buffer
            .clone()
            .unwrap_or_else(|| self.context_buffer.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("context_buffer.window_duration", self.context_buffer.window_duration)?;
        check_non_negative("context_buffer.retention_time", self.context_buffer.retention_time)?;
        if let Some(uncommented) = &self.uncommented_buffer {
            check_non_negative("uncommented_buffer.window_duration", uncommented.window_duration)?;
            check_non_negative("uncommented_buffer.retention_time", uncommented.retention_time)?;
        }

        check_unit("detector.detection_sensitivity", self.detector.detection_sensitivity)?;
        check_unit("detector.emotion_threshold", self.detector.emotion_threshold)?;
        check_unit(
            "detector.topic_transition_threshold",
            self.detector.topic_transition_threshold,
        )?;
        check_unit(
            "detector.keypoint_density_threshold",
            self.detector.keypoint_density_threshold,
        )?;

        check_unit("decision.base_threshold", self.decision.base_threshold)?;
        check_non_negative("decision.min_interval", self.decision.min_interval)?;
        check_non_negative("decision.max_interval", self.decision.max_interval)?;
        if self.decision.max_interval < self.decision.min_interval {
            return Err(ConfigError::new(
                "decision.max_interval",
                format!(
                    "must be >= min_interval ({} < {})",
                    self.decision.max_interval, self.decision.min_interval
                ),
            ));
        }
        check_unit("decision.emotion_weight", self.decision.emotion_weight)?;
        check_unit("decision.topic_weight", self.decision.topic_weight)?;
        check_unit("decision.timing_weight", self.decision.timing_weight)?;
        check_unit("decision.importance_weight", self.decision.importance_weight)?;
        check_unit("decision.keyword_weight", self.decision.keyword_weight)?;
        check_unit("decision.frequency_suppression", self.decision.frequency_suppression)?;
        check_unit("decision.time_decay_rate", self.decision.time_decay_rate)?;

        for writer in &self.generator.writers {
            if writer.name.trim().is_empty() {
                return Err(ConfigError::new("generator.writers", "writer name is empty"));
            }
            if writer.max_length < writer.min_length {
                return Err(ConfigError::new(
                    "generator.writers",
                    format!("writer '{}' has max_length < min_length", writer.name),
                ));
            }
        }
        if self.generator.writers.is_empty() {
            return Err(ConfigError::new("generator.writers", "at least one writer required"));
        }

        Ok(())
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::new(
            field,
            format!("must be within [0, 1], got {value}"),
        ));
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::new(
            field,
            format!("must be a non-negative number, got {value}"),
        ));
    }
    Ok(())
}
