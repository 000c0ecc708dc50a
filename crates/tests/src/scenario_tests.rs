//! The concrete end-to-end scenarios: cold start, latest-wins, staleness,
//! word-cap aggregation, supersede, and buffer-reset atomicity.

use std::sync::Arc;
use std::time::Duration;

use colorcast_commentary::config::AggregatorConfig;
use colorcast_commentary::{CommentaryConfig, CommentaryEngine, CommentaryEvent, EventType};

use crate::fixtures::{
    ScriptedDetector, StubGenerator, event, settle_and_drain, strong_events, turn,
};

fn engine_with(
    detector: Arc<ScriptedDetector>,
    generator: Arc<StubGenerator>,
) -> CommentaryEngine {
    CommentaryEngine::new(CommentaryConfig::default(), detector, generator).unwrap()
}

#[tokio::test(start_paused = true)]
async fn cold_start_suppresses_early_comment() {
    let detector = ScriptedDetector::new(1);
    detector.push_events(vec![event(EventType::KeyPoint, 0.95, 0.9, 8.0)]);
    let generator = StubGenerator::accepting("too early");
    let engine = engine_with(detector, generator.clone());
    let mut rx = engine.subscribe();

    engine.on_turn_completed(turn("a", "Hello everyone", 0.0, 3.0));
    let events = settle_and_drain(&mut rx, Duration::from_secs(60)).await;

    let decision = events
        .iter()
        .find_map(|e| match e {
            CommentaryEvent::DecisionMade { decision, .. } => Some(decision.clone()),
            _ => None,
        })
        .expect("decision should be made");

    assert!(!decision.should_comment);
    assert!((decision.factors.timing - 0.1).abs() < 1e-9);
    assert!(decision.reasoning.contains("below threshold"));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn latest_wins_when_worker_has_not_picked_up() {
    let detector = ScriptedDetector::new(1);
    let generator = StubGenerator::accepting("ok");
    let engine = engine_with(detector.clone(), generator);
    let mut rx = engine.subscribe();

    // Both enqueued before the worker task runs: the slot is overwritten.
    engine.on_turn_completed(turn("j1", "the first thing said here", 0.0, 3.0));
    engine.on_turn_completed(turn("j2", "the second thing said here", 3.0, 6.0));

    let events = settle_and_drain(&mut rx, Duration::from_millis(200)).await;

    let detected: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CommentaryEvent::EventsDetected { turn, .. } => Some(turn.id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(detected, vec!["j2"]);
    assert_eq!(detector.calls().len(), 1);
    assert_eq!(detector.calls()[0].id, "j2");
}

#[tokio::test(start_paused = true)]
async fn stale_job_dropped_without_events() {
    let detector = ScriptedDetector::new(1000);
    let generator = StubGenerator::accepting("ok");
    let engine = engine_with(detector.clone(), generator);
    let mut rx = engine.subscribe();

    // The first job occupies the worker for 1s inside the detector.
    engine.on_turn_completed(turn("busy", "a long opening statement", 0.0, 3.0));
    tokio::time::sleep(Duration::from_millis(10)).await;
    // The second job sits in the slot while the clock advances past the
    // 5s staleness bound.
    engine.on_turn_completed(turn("late", "too old by pickup time", 3.0, 6.0));
    tokio::time::advance(Duration::from_secs(6)).await;

    let events = settle_and_drain(&mut rx, Duration::from_millis(200)).await;

    assert_eq!(detector.calls().len(), 1);
    assert_eq!(detector.calls()[0].id, "busy");
    assert!(!events.iter().any(|e| matches!(
        e,
        CommentaryEvent::EventsDetected { turn, .. } if turn.id == "late"
    )));
    assert!(!events.iter().any(|e| matches!(
        e,
        CommentaryEvent::DecisionMade { turn, .. } if turn.id == "late"
    )));
    assert_eq!(engine.statistics().dropped_stale_jobs, 1);
}

#[tokio::test(start_paused = true)]
async fn word_cap_flushes_aggregation_synchronously() {
    let mut config = CommentaryConfig::default();
    config.aggregator = AggregatorConfig {
        min_turn_duration_ms: 5000,
        aggregation_max_words: 5,
        ..AggregatorConfig::default()
    };
    let detector = ScriptedDetector::new(1);
    let generator = StubGenerator::accepting("ok");
    let engine = CommentaryEngine::new(config, detector.clone(), generator).unwrap();

    engine.on_turn_completed(turn("w1", "a b", 0.0, 0.3));
    engine.on_turn_completed(turn("w2", "c d e", 0.3, 0.6));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let calls = detector.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].content, "a b c d e");
    assert_eq!(calls[0].id, "w2");
    assert!((calls[0].start_time - 0.0).abs() < 1e-9);
    assert!((calls[0].end_time - 0.6).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn three_recent_comments_suppress_the_next() {
    // A low base threshold lets three comments through back to back, so the
    // history fills at media 100/120/140 through the real emit path.
    let mut config = CommentaryConfig::default();
    config.decision.base_threshold = 0.30;

    let detector = ScriptedDetector::new(1);
    detector.push_events(strong_events());
    detector.push_events(strong_events());
    detector.push_events(strong_events());
    // The probe turn carries a single maxed-out conclusion event.
    detector.push_events(vec![event(EventType::ConclusionReached, 1.0, 1.0, 0.0)]);
    let generator = StubGenerator::accepting("noted");
    let engine = CommentaryEngine::new(config, detector, generator.clone()).unwrap();
    let mut rx = engine.subscribe();

    // Each seed's comment lands (suggested delay included) before the next
    // seed is fed, so the history grows one comment at a time.
    engine.on_turn_completed(turn("s1", "the opening argument lands", 97.0, 100.0));
    tokio::time::sleep(Duration::from_secs(30)).await;
    engine.on_turn_completed(turn("s2", "the counterpoint lands", 117.0, 120.0));
    tokio::time::sleep(Duration::from_secs(10)).await;
    engine.on_turn_completed(turn("s3", "the rebuttal lands", 137.0, 140.0));
    tokio::time::sleep(Duration::from_secs(10)).await;

    engine.on_turn_completed(turn("probe", "and one more strong conclusion", 147.0, 150.0));
    let events = settle_and_drain(&mut rx, Duration::from_secs(10)).await;

    let generated: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CommentaryEvent::CommentGenerated { comment, turn } => {
                Some((turn.id.clone(), comment.timestamp))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        generated,
        vec![
            ("s1".to_string(), 100.0),
            ("s2".to_string(), 120.0),
            ("s3".to_string(), 140.0)
        ]
    );

    let decision = events
        .iter()
        .find_map(|e| match e {
            CommentaryEvent::DecisionMade { decision, turn, .. } if turn.id == "probe" => {
                Some(decision.clone())
            }
            _ => None,
        })
        .expect("probe decision should be made");

    // Three history comments inside the 90s window: suppression 0.2 kills
    // the score despite the maxed-out event.
    assert!(!decision.should_comment);
    assert!(decision.reasoning.contains("suppression 0.20"));
    assert!(decision.reasoning.contains("below threshold"));
    let expected = (1.0 * 0.60 + 0.1 * 0.15) * 0.95f64.powf(50.0 / 60.0) * 0.2;
    assert!((decision.score - expected).abs() < 1e-9);
    assert!(decision.score < 0.2);

    // No fourth comment was generated for the probe.
    assert_eq!(generator.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn newer_positive_decision_supersedes_pending_generation() {
    let detector = ScriptedDetector::new(1);
    detector.push_events(strong_events());
    detector.push_events(strong_events());
    let generator = StubGenerator::accepting("the final word");
    let engine = engine_with(detector, generator.clone());
    let mut rx = engine.subscribe();

    engine.on_turn_completed(turn("first", "an early conclusion", 0.0, 3.0));
    // Let the first decision land and its generation enter the delay.
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.on_turn_completed(turn("second", "an even bigger conclusion", 3.0, 6.0));

    let events = settle_and_drain(&mut rx, Duration::from_secs(120)).await;

    let started: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CommentaryEvent::CommentStarted { turn } => Some(turn.id.clone()),
            _ => None,
        })
        .collect();
    let generated: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CommentaryEvent::CommentGenerated { turn, .. } => Some(turn.id.clone()),
            _ => None,
        })
        .collect();

    // The first pending generation was aborted during its delay; only the
    // second ran to completion.
    assert_eq!(started, vec!["second"]);
    assert_eq!(generated, vec!["second"]);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn emit_clears_uncommented_but_not_context() {
    let detector = ScriptedDetector::new(1);
    detector.push_events(strong_events());
    let generator = StubGenerator::accepting("they wrapped up the debate");
    let engine = engine_with(detector, generator);
    let mut rx = engine.subscribe();

    engine.on_turn_completed(turn("t1", "and that settles it", 0.0, 3.0));
    let events = settle_and_drain(&mut rx, Duration::from_secs(120)).await;

    let comment = events
        .iter()
        .find_map(|e| match e {
            CommentaryEvent::CommentGenerated { comment, .. } => Some(comment.clone()),
            _ => None,
        })
        .expect("comment should be generated");

    assert_eq!(comment.content, "they wrapped up the debate");
    assert_eq!(comment.writer, "stub");
    assert!((comment.timestamp - 3.0).abs() < 1e-9);
    assert_eq!(comment.length, "they wrapped up the debate".chars().count());

    // comment-started precedes comment-generated.
    let started_pos = events
        .iter()
        .position(|e| matches!(e, CommentaryEvent::CommentStarted { .. }))
        .unwrap();
    let generated_pos = events
        .iter()
        .position(|e| matches!(e, CommentaryEvent::CommentGenerated { .. }))
        .unwrap();
    assert!(started_pos < generated_pos);

    // Between the emit and the next turn: uncommented buffer empty, context
    // buffer still holds the turn.
    let stats = engine.statistics();
    assert_eq!(stats.uncommented_buffer.segment_count, 0);
    assert_eq!(stats.context_buffer.segment_count, 1);

    // The next turn starts repopulating the uncommented buffer.
    engine.on_turn_completed(turn("t2", "a fresh topic begins", 3.5, 6.5));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = engine.statistics();
    assert_eq!(stats.uncommented_buffer.segment_count, 1);
    assert_eq!(stats.context_buffer.segment_count, 2);
}
