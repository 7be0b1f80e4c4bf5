//! Controller wired to a recording sink and a scripted generator

use manifesto_common::events::SessionEvent;
use manifesto_player::controller::ControllerConfig;
use manifesto_player::generation::{ScriptedGenerator, ScriptedHandle};
use manifesto_player::playback::SlotIndex;
use manifesto_player::sink::{self, RecordingSink, SinkLog};
use manifesto_player::SessionController;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Running controller plus handles onto everything around it
pub struct TestSession {
    pub controller: SessionController,
    pub sink: SinkLog,
    pub generator: ScriptedHandle,
    pub events: broadcast::Receiver<SessionEvent>,
    pub task: JoinHandle<()>,
}

impl TestSession {
    pub fn spawn(generator: ScriptedGenerator) -> Self {
        Self::spawn_with(generator, ControllerConfig::default())
    }

    pub fn spawn_with(generator: ScriptedGenerator, config: ControllerConfig) -> Self {
        let (notifier, sink_events) = sink::channel();
        let recording = RecordingSink::with_notifier(notifier);
        let sink = recording.log();
        let handle = generator.handle();

        let (controller, task) =
            SessionController::spawn(config, Arc::new(generator), recording, sink_events);
        let events = controller.subscribe();

        Self {
            controller,
            sink,
            generator: handle,
            events,
            task,
        }
    }

    /// Wait for the next segment to start; returns (slot, sequence_index, script)
    pub async fn next_started(&mut self) -> (SlotIndex, u64, String) {
        match wait_for(&mut self.events, |e| {
            matches!(e, SessionEvent::SegmentStarted { .. })
        })
        .await
        {
            SessionEvent::SegmentStarted {
                slot,
                sequence_index,
                script_text,
                ..
            } => (SlotIndex::from_index(slot), sequence_index, script_text),
            other => panic!("unexpected event {:?}", other),
        }
    }
}

/// Receive events until one matches `predicate`
///
/// Panics after 10 minutes of (virtual) time.
pub async fn wait_for(
    events: &mut broadcast::Receiver<SessionEvent>,
    predicate: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    let deadline = Duration::from_secs(600);
    tokio::time::timeout(deadline, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
