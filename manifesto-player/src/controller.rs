//! Session controller
//!
//! A single control task owns the [`Scheduler`] and processes, one at a
//! time: user commands, generation outcomes, and sink completion events.
//! Every handler runs to completion before the next event is looked at, so
//! the slot swap on completion happens in the same tick as the completion
//! itself. The only suspension point is waiting for the next event.
//!
//! [`SessionController`] is the cloneable handle; each operation is a
//! command with a oneshot reply.

use crate::error::{Error, Result};
use crate::generation::{GenerationOutcome, Producer, ProducerConfig, SegmentGenerator};
use crate::playback::{Scheduler, DEFAULT_LOW_WATERMARK};
use crate::session::{SessionParams, StartRequest};
use crate::sink::{PlaybackSink, SinkEvent};
use manifesto_common::events::{EventBus, SessionEvent, SessionSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Tunables for a controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub low_watermark: usize,
    /// Per-subscriber buffer of the event bus
    pub event_capacity: usize,
    pub producer: ProducerConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            low_watermark: DEFAULT_LOW_WATERMARK,
            event_capacity: 256,
            producer: ProducerConfig::default(),
        }
    }
}

enum Command {
    Start {
        params: SessionParams,
        response_tx: oneshot::Sender<Result<()>>,
    },
    Pause {
        response_tx: oneshot::Sender<Result<()>>,
    },
    Resume {
        response_tx: oneshot::Sender<Result<()>>,
    },
    Stop {
        response_tx: oneshot::Sender<()>,
    },
    UpdateParameters {
        params: SessionParams,
        response_tx: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        response_tx: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        response_tx: oneshot::Sender<()>,
    },
}

/// Handle onto a running control task
#[derive(Clone)]
pub struct SessionController {
    command_tx: mpsc::Sender<Command>,
    events: EventBus,
}

impl SessionController {
    /// Start the control task
    ///
    /// `sink_events` must be the receiving half of the channel whose
    /// notifier was given to `sink`.
    pub fn spawn<S: PlaybackSink>(
        config: ControllerConfig,
        generator: Arc<dyn SegmentGenerator>,
        sink: S,
        sink_events: mpsc::UnboundedReceiver<SinkEvent>,
    ) -> (Self, JoinHandle<()>) {
        let events = EventBus::new(config.event_capacity);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (recheck_tx, recheck_rx) = mpsc::unbounded_channel();

        let task = ControlTask {
            scheduler: Scheduler::new(sink, events.clone(), config.low_watermark),
            recheck_delay: config.producer.retry_backoff,
            producer: Producer::new(generator, config.producer, outcome_tx),
            generation_task: None,
            recheck_tx,
            recheck_task: None,
        };
        let handle = tokio::spawn(task.run(command_rx, outcome_rx, sink_events, recheck_rx));

        (Self { command_tx, events }, handle)
    }

    /// Validate `request` and begin a new session
    ///
    /// Invalid input is rejected here, before the control task sees it.
    pub async fn start(&self, request: StartRequest) -> Result<()> {
        let params = request.into_params()?;
        self.call(|response_tx| Command::Start {
            params,
            response_tx,
        })
        .await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.call(|response_tx| Command::Pause { response_tx })
            .await?
    }

    pub async fn resume(&self) -> Result<()> {
        self.call(|response_tx| Command::Resume { response_tx })
            .await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.call(|response_tx| Command::Stop { response_tx }).await
    }

    /// Parameters for the next generation call onwards
    pub async fn update_parameters(&self, params: SessionParams) -> Result<()> {
        params.validate()?;
        self.call(|response_tx| Command::UpdateParameters {
            params,
            response_tx,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.call(|response_tx| Command::Snapshot { response_tx })
            .await
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the session and end the control task
    ///
    /// Succeeds if the task is already gone.
    pub async fn shutdown(&self) -> Result<()> {
        match self
            .call(|response_tx| Command::Shutdown { response_tx })
            .await
        {
            Ok(()) | Err(Error::ControllerClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(make(response_tx))
            .await
            .map_err(|_| Error::ControllerClosed)?;
        response_rx.await.map_err(|_| Error::ControllerClosed)
    }
}

/// State owned by the control task
struct ControlTask<S: PlaybackSink> {
    scheduler: Scheduler<S>,
    producer: Producer,
    /// Task running the outstanding generation call
    generation_task: Option<JoinHandle<()>>,
    /// Wait before re-checking the watermark of a starved stream
    recheck_delay: Duration,
    recheck_tx: mpsc::UnboundedSender<u64>,
    recheck_task: Option<JoinHandle<()>>,
}

impl<S: PlaybackSink> ControlTask<S> {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut outcome_rx: mpsc::UnboundedReceiver<GenerationOutcome>,
        mut sink_rx: mpsc::UnboundedReceiver<SinkEvent>,
        mut recheck_rx: mpsc::UnboundedReceiver<u64>,
    ) {
        info!("Session control task started");

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle_command(command) {
                                break;
                            }
                        }
                        None => {
                            debug!("All controller handles dropped");
                            self.stop_session();
                            break;
                        }
                    }
                }
                Some(outcome) = outcome_rx.recv() => {
                    if outcome.epoch == self.scheduler.epoch() {
                        self.generation_task = None;
                    }
                    self.scheduler.handle_generation(outcome);
                }
                Some(event) = sink_rx.recv() => {
                    self.scheduler.handle_sink_event(event);
                }
                Some(epoch) = recheck_rx.recv() => {
                    self.recheck_task = None;
                    self.scheduler.recheck_watermark(epoch);
                }
            }

            self.dispatch_pending();
        }

        info!("Session control task stopped");
    }

    /// Returns false when the task should exit
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start {
                params,
                response_tx,
            } => {
                self.abort_generation();
                self.cancel_recheck();
                let _ = response_tx.send(self.scheduler.start(params));
            }
            Command::Pause { response_tx } => {
                let _ = response_tx.send(self.scheduler.pause());
            }
            Command::Resume { response_tx } => {
                let _ = response_tx.send(self.scheduler.resume());
            }
            Command::Stop { response_tx } => {
                self.stop_session();
                let _ = response_tx.send(());
            }
            Command::UpdateParameters {
                params,
                response_tx,
            } => {
                let _ = response_tx.send(self.scheduler.update_parameters(params));
            }
            Command::Snapshot { response_tx } => {
                let _ = response_tx.send(self.scheduler.snapshot());
            }
            Command::Shutdown { response_tx } => {
                self.stop_session();
                let _ = response_tx.send(());
                return false;
            }
        }
        true
    }

    /// Hand the scheduler's pending request to the producer and arm any
    /// re-check it owes
    fn dispatch_pending(&mut self) {
        if let Some(request) = self.scheduler.take_generation_request() {
            self.cancel_recheck();
            self.generation_task = Some(self.producer.dispatch(request));
        }
        if let Some(epoch) = self.scheduler.take_recheck() {
            self.arm_recheck(epoch);
        }
    }

    fn arm_recheck(&mut self, epoch: u64) {
        self.cancel_recheck();
        debug!("Watermark re-check in {:?}", self.recheck_delay);
        let delay = self.recheck_delay;
        let recheck_tx = self.recheck_tx.clone();
        self.recheck_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = recheck_tx.send(epoch);
        }));
    }

    fn cancel_recheck(&mut self) {
        if let Some(task) = self.recheck_task.take() {
            task.abort();
        }
    }

    fn stop_session(&mut self) {
        self.abort_generation();
        self.cancel_recheck();
        self.scheduler.stop();
    }

    /// Drop the outstanding call; its result would be stale anyway
    fn abort_generation(&mut self) {
        if let Some(task) = self.generation_task.take() {
            debug!("Aborting outstanding generation call");
            task.abort();
        }
    }
}
