//! Feeds a subtitle transcript into an engine, for demos and batch tests.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::Turn;
use crate::engine::CommentaryEngine;

/// Parses an SRT subtitle file into turns, deduplicated by (start, text) and
/// sorted by start time. A leading `Speaker: ` prefix is stripped from the
/// text; the SRT entry index becomes the turn id.
pub fn parse_srt_turns(path: impl AsRef<Path>) -> anyhow::Result<Vec<Turn>> {
    let content = std::fs::read_to_string(path.as_ref())
        .map_err(|e| anyhow::anyhow!("failed to read SRT '{}': {}", path.as_ref().display(), e))?;

    let mut turns = Vec::new();
    let mut lines = content.lines().peekable();

    while lines.peek().is_some() {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }

        let Some(index_line) = lines.next() else { break };
        if index_line.trim().parse::<usize>().is_err() {
            continue;
        }

        let Some(ts_line) = lines.next() else { break };
        let Some((start_secs, end_secs)) = parse_timestamp_line(ts_line.trim()) else {
            continue;
        };

        let mut text_parts = Vec::new();
        while lines.peek().is_some_and(|l| !l.trim().is_empty()) {
            text_parts.push(lines.next().unwrap().trim().to_string());
        }
        let raw_text = text_parts.join(" ");
        let text = strip_speaker_prefix(&raw_text);

        if !text.is_empty() {
            turns.push(Turn::new("", text, start_secs, end_secs));
        }
    }

    // Deduplicate by (start time rounded to ms, text), then sort and re-id.
    let mut seen = HashSet::new();
    let mut deduped: Vec<Turn> = Vec::new();
    for turn in turns {
        let key = ((turn.start_time * 1000.0).round() as i64, turn.content.clone());
        if seen.insert(key) {
            deduped.push(turn);
        }
    }
    deduped.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap());
    for (i, turn) in deduped.iter_mut().enumerate() {
        turn.id = (i + 1).to_string();
    }

    Ok(deduped)
}

fn strip_speaker_prefix(text: &str) -> String {
    if let Some(colon) = text.find(": ") {
        let candidate = &text[..colon];
        if candidate.len() < 50 && !candidate.contains("  ") {
            return text[colon + 2..].to_string();
        }
    }
    text.to_string()
}

/// Parses a timestamp line like `00:00:02,965 --> 00:00:04,277`.
fn parse_timestamp_line(line: &str) -> Option<(f64, f64)> {
    let parts: Vec<&str> = line.split("-->").collect();
    if parts.len() != 2 {
        return None;
    }
    Some((parse_srt_time(parts[0].trim())?, parse_srt_time(parts[1].trim())?))
}

/// Parses `HH:MM:SS,mmm` (comma or dot separator) to seconds.
fn parse_srt_time(s: &str) -> Option<f64> {
    let s = s.replace(',', ".");
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Drives a parsed transcript into an engine.
pub struct TranscriptPlayback {
    turns: Vec<Turn>,
    /// When set, sleeps out the media gaps between turns instead of feeding
    /// them back to back.
    paced: bool,
}

impl TranscriptPlayback {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            paced: false,
        }
    }

    pub fn from_srt(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self::new(parse_srt_turns(path)?))
    }

    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Feeds every turn into the engine, in order.
    pub async fn run(&self, engine: &CommentaryEngine) {
        info!(turns = self.turns.len(), paced = self.paced, "playback started");
        let mut previous_end: Option<f64> = None;
        for turn in &self.turns {
            if self.paced {
                if let Some(prev) = previous_end {
                    let gap = (turn.start_time - prev).max(0.0);
                    if gap > 0.0 {
                        tokio::time::sleep(Duration::from_secs_f64(gap)).await;
                    }
                }
                previous_end = Some(turn.end_time);
            }
            debug!(turn_id = %turn.id, "playback turn");
            engine.on_turn_completed(turn.clone());
        }
        info!("playback finished");
    }
}
