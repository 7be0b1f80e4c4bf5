//! Integration tests for the session controller
//!
//! Drives a real control task with a scripted generator and a recording
//! sink. Completions are injected through the sink log; time is virtual.

mod helpers;

use helpers::{wait_for, TestSession};
use manifesto_common::events::{SessionEvent, SessionState};
use manifesto_player::controller::ControllerConfig;
use manifesto_player::generation::ScriptedGenerator;
use manifesto_player::sink::SinkCommand;
use manifesto_player::{Error, SessionParams, StartRequest};
use std::time::Duration;

fn request() -> StartRequest {
    StartRequest::new("Ada", "finish the analytical engine")
}

fn generator() -> ScriptedGenerator {
    ScriptedGenerator::new()
        .with_lines(["one", "two", "three", "four", "five", "six", "seven"])
        .with_latency(Duration::from_millis(300))
}

#[tokio::test(start_paused = true)]
async fn test_segments_play_in_generation_order() {
    let mut session = TestSession::spawn(generator());
    session.controller.start(request()).await.unwrap();

    let mut played = Vec::new();
    for expected in 0..5u64 {
        let (slot, sequence_index, script) = session.next_started().await;
        assert_eq!(sequence_index, expected);
        played.push(script);

        // Let the producer catch up, then end the segment
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(session.sink.finish(slot));
    }

    assert_eq!(played[0], "Ada. one");
    assert_eq!(&played[1..], &["two", "three", "four", "five"]);

    // Every call saw a prefix of the play order
    for request in session.generator.requests() {
        assert!(request.history.len() <= played.len() + 2);
        for (seen, expected) in request.history.iter().zip(played.iter()) {
            assert_eq!(seen, expected);
        }
    }
    assert_eq!(session.generator.max_concurrent(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_handoff_is_immediate_when_staging_is_loaded() {
    let mut session = TestSession::spawn(generator());
    session.controller.start(request()).await.unwrap();

    let (first_slot, _, _) = session.next_started().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    session.sink.clear_commands();
    assert!(session.sink.finish(first_slot));
    let (second_slot, sequence_index, _) = session.next_started().await;

    assert_eq!(sequence_index, 1);
    assert_eq!(second_slot, first_slot.other());
    // No load or generation step sits between completion and play
    assert_eq!(session.sink.commands()[0], SinkCommand::Play(second_slot));
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_with_slow_generation() {
    let slow = ScriptedGenerator::new().with_latency(Duration::from_secs(20));
    let mut session = TestSession::spawn(slow);
    session.controller.start(request()).await.unwrap();

    for _ in 0..3 {
        let (slot, _, _) = session.next_started().await;
        // Finish right away: the queue is always starved
        assert!(session.sink.finish(slot));
    }

    assert_eq!(session.generator.max_concurrent(), 1);
    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Streaming);
}

#[tokio::test(start_paused = true)]
async fn test_stall_reported_when_queue_starves() {
    let slow = ScriptedGenerator::new().with_latency(Duration::from_secs(10));
    let mut session = TestSession::spawn(slow);
    session.controller.start(request()).await.unwrap();

    let (slot, _, _) = session.next_started().await;
    assert!(session.sink.finish(slot));

    wait_for(&mut session.events, |e| {
        matches!(e, SessionEvent::StallStarted { .. })
    })
    .await;
    assert!(session.controller.snapshot().await.unwrap().stalled);

    let ended = wait_for(&mut session.events, |e| {
        matches!(e, SessionEvent::StallEnded { .. })
    })
    .await;
    if let SessionEvent::StallEnded { stalled_ms, .. } = ended {
        assert!(stalled_ms > 0);
    }
    assert!(!session.controller.snapshot().await.unwrap().stalled);
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_in_flight_generation() {
    let mut session = TestSession::spawn(
        ScriptedGenerator::new().with_latency(Duration::from_secs(5)),
    );
    session.controller.start(request()).await.unwrap();
    wait_for(&mut session.events, |e| {
        matches!(e, SessionEvent::GenerationRequested { .. })
    })
    .await;

    session.controller.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Stopped);
    assert_eq!(snapshot.queue_depth, 0);
    assert_eq!(snapshot.history_len, 0);
    assert!(!snapshot.generation_in_flight);
    assert_eq!(snapshot.active_slot, 0);
    assert!(session.sink.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop_begins_fresh_session() {
    let mut session = TestSession::spawn(generator());
    session.controller.start(request()).await.unwrap();
    session.next_started().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    session.controller.stop().await.unwrap();
    session
        .controller
        .start(StartRequest::new("Grace", "debug the mark II").with_persona("Hormozi"))
        .await
        .unwrap();

    let (_, sequence_index, script) = session.next_started().await;
    assert_eq!(sequence_index, 0);
    assert_eq!(script, "Grace. one");

    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.epoch, 2);
    assert_eq!(snapshot.state, SessionState::Streaming);

    let last = session.generator.requests().pop().unwrap();
    assert_eq!(last.params.name, "Grace");
    assert_eq!(last.params.persona, "Hormozi");
}

#[tokio::test(start_paused = true)]
async fn test_start_while_streaming_restarts() {
    let mut session = TestSession::spawn(generator());
    session.controller.start(request()).await.unwrap();
    session.next_started().await;

    session.controller.start(request()).await.unwrap();
    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.epoch, 2);
    assert_eq!(snapshot.history_len, 0);

    let (_, sequence_index, _) = session.next_started().await;
    assert_eq!(sequence_index, 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_start_request_rejected() {
    let session = TestSession::spawn(generator());

    let err = session
        .controller
        .start(StartRequest::new("Ada", "   ").with_details("extra"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidStartRequest(_)));

    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert_eq!(snapshot.epoch, 0);
    assert_eq!(session.generator.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pause_resume_preserves_buffers() {
    let mut session = TestSession::spawn(generator());
    session.controller.start(request()).await.unwrap();
    session.next_started().await;

    // Queue full, nothing in flight
    tokio::time::sleep(Duration::from_secs(10)).await;
    let before = session.controller.snapshot().await.unwrap();
    assert!(!before.generation_in_flight);
    assert_eq!(before.queue_depth, 3);

    session.controller.pause().await.unwrap();
    session.controller.pause().await.unwrap();
    assert_eq!(
        session.controller.snapshot().await.unwrap().state,
        SessionState::Paused
    );

    session.controller.resume().await.unwrap();
    let after = session.controller.snapshot().await.unwrap();
    assert_eq!(before, after);

    let commands = session.sink.commands();
    let pauses = commands
        .iter()
        .filter(|c| matches!(c, SinkCommand::Pause(_)))
        .count();
    assert_eq!(pauses, 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_rejected_when_idle() {
    let session = TestSession::spawn(generator());
    assert!(matches!(
        session.controller.pause().await,
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        session.controller.resume().await,
        Err(Error::InvalidState(_))
    ));
    // Stop from Idle is a no-op
    session.controller.stop().await.unwrap();
    assert_eq!(
        session.controller.snapshot().await.unwrap().state,
        SessionState::Idle
    );
}

#[tokio::test(start_paused = true)]
async fn test_generation_failure_does_not_stop_stream() {
    let mut session = TestSession::spawn(generator().fail_on_call(2));
    session.controller.start(request()).await.unwrap();

    let (slot, _, _) = session.next_started().await;
    let failed = wait_for(&mut session.events, |e| {
        matches!(e, SessionEvent::GenerationFailed { .. })
    })
    .await;
    if let SessionEvent::GenerationFailed { message, .. } = failed {
        assert!(message.contains("503"));
    }
    assert_eq!(
        session.controller.snapshot().await.unwrap().state,
        SessionState::Streaming
    );

    // Consumption re-arms generation and the stream continues
    assert!(session.sink.finish(slot));
    let (_, sequence_index, _) = session.next_started().await;
    assert_eq!(sequence_index, 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_call_failure_is_retried_after_backoff() {
    let mut session = TestSession::spawn(generator().fail_on_call(1));
    session.controller.start(request()).await.unwrap();

    wait_for(&mut session.events, |e| {
        matches!(e, SessionEvent::GenerationFailed { .. })
    })
    .await;

    // Nothing plays, so only the delayed re-check can get things moving
    let (_, sequence_index, script) = session.next_started().await;
    assert_eq!(sequence_index, 0);
    assert_eq!(script, "Ada. one");
    assert_eq!(session.generator.requests()[1].history.len(), 0);
    assert_eq!(session.generator.max_concurrent(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_during_stall_does_not_leave_stream_stuck() {
    let mut session = TestSession::spawn(generator().fail_on_call(2));
    session.controller.start(request()).await.unwrap();

    // End S1 before call 2 resolves
    let (slot, _, _) = session.next_started().await;
    assert!(session.sink.finish(slot));
    wait_for(&mut session.events, |e| {
        matches!(e, SessionEvent::StallStarted { .. })
    })
    .await;
    wait_for(&mut session.events, |e| {
        matches!(e, SessionEvent::GenerationFailed { .. })
    })
    .await;

    let (_, sequence_index, _) = session.next_started().await;
    assert_eq!(sequence_index, 1);
    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Streaming);
    assert!(!snapshot.stalled);
    assert_eq!(session.generator.max_concurrent(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_playback_failure_skips_to_next_segment() {
    let mut session = TestSession::spawn(generator());
    session.controller.start(request()).await.unwrap();

    let (slot, _, _) = session.next_started().await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(session.sink.fail(slot, "decoder error"));

    let failed = wait_for(&mut session.events, |e| {
        matches!(e, SessionEvent::PlaybackFailed { .. })
    })
    .await;
    if let SessionEvent::PlaybackFailed { sequence_index, .. } = failed {
        assert_eq!(sequence_index, 0);
    }
    let (_, sequence_index, _) = session.next_started().await;
    assert_eq!(sequence_index, 1);
}

#[tokio::test(start_paused = true)]
async fn test_updated_parameters_reach_next_request() {
    let mut session = TestSession::spawn(generator());
    session.controller.start(request()).await.unwrap();
    session.next_started().await;

    session
        .controller
        .update_parameters(SessionParams {
            name: "Ada".to_string(),
            context: "rest".to_string(),
            persona: "Bible".to_string(),
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    let last = session.generator.requests().pop().unwrap();
    assert_eq!(last.params.persona, "Bible");
    assert_eq!(last.params.context, "rest");
}

#[tokio::test(start_paused = true)]
async fn test_retry_policy_applies_to_controller_calls() {
    let config = ControllerConfig {
        producer: manifesto_player::generation::ProducerConfig {
            max_retries: 1,
            retry_backoff: Duration::from_millis(100),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut session = TestSession::spawn_with(generator().fail_on_call(1), config);
    session.controller.start(request()).await.unwrap();

    let (_, sequence_index, _) = session.next_started().await;
    assert_eq!(sequence_index, 0);
    assert_eq!(session.generator.requests()[1].history.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_ends_control_task() {
    let mut session = TestSession::spawn(generator());
    session.controller.start(request()).await.unwrap();
    session.next_started().await;

    session.controller.shutdown().await.unwrap();
    (&mut session.task).await.unwrap();

    assert!(matches!(
        session.controller.snapshot().await,
        Err(Error::ControllerClosed)
    ));
    // Shutting down twice is fine
    session.controller.shutdown().await.unwrap();
}
