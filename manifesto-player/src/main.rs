//! Manifesto Player (manifesto-player) - Main entry point
//!
//! Runs one endless speech session: segments are requested from the
//! generation service just-in-time and played back-to-back through a
//! simulated output. Stops on Ctrl+C or after `--max-segments`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use manifesto_common::events::SessionEvent;
use manifesto_player::config::{log_directives, Config, ConfigOverrides};
use manifesto_player::generation::{HttpGenerator, ScriptedGenerator, SegmentGenerator};
use manifesto_player::sink::{self, TimedSink};
use manifesto_player::{SessionController, StartRequest};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for manifesto-player
#[derive(Parser, Debug)]
#[command(name = "manifesto-player")]
#[command(about = "Endless personalised motivational speech, played gaplessly")]
#[command(version)]
struct Args {
    /// Listener name
    #[arg(short, long)]
    name: String,

    /// What the speech should be about
    #[arg(short, long)]
    context: String,

    /// Speaker persona (e.g. "Steve Jobs", "Hormozi", "Bible")
    #[arg(short, long)]
    persona: Option<String>,

    /// Extra details about the listener, appended to the context
    #[arg(short, long)]
    details: Option<String>,

    /// Generation service endpoint
    #[arg(long, env = "MANIFESTO_ENDPOINT")]
    endpoint: Option<String>,

    /// Path to config file
    #[arg(long, env = "MANIFESTO_CONFIG")]
    config: Option<PathBuf>,

    /// Queue depth that triggers the next generation call
    #[arg(long)]
    low_watermark: Option<usize>,

    /// Use canned speech instead of the generation service
    #[arg(long)]
    simulate: bool,

    /// Simulated generation latency in milliseconds (with --simulate)
    #[arg(long, default_value = "1500")]
    simulated_latency_ms: u64,

    /// Stop after this many segments have finished playing
    #[arg(long)]
    max_segments: Option<u64>,

    /// Print every session event as one JSON line on stdout
    #[arg(long)]
    json_events: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; the configured log level is applied once the
    // config file has been read
    let (filter, filter_handle) = reload::Layer::new(log_filter("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = Config::load(
        args.config.as_deref(),
        ConfigOverrides {
            endpoint: args.endpoint.clone(),
            low_watermark: args.low_watermark,
        },
    )
    .context("Failed to load configuration")?;

    filter_handle
        .reload(log_filter(&config.log_level))
        .context("Failed to apply log level")?;

    info!("Starting Manifesto Player v{}", env!("CARGO_PKG_VERSION"));

    let generator: Arc<dyn SegmentGenerator> = if args.simulate {
        info!("Using simulated generator ({} ms latency)", args.simulated_latency_ms);
        Arc::new(
            ScriptedGenerator::new().with_latency(Duration::from_millis(args.simulated_latency_ms)),
        )
    } else {
        info!("Generation endpoint: {}", config.endpoint);
        Arc::new(
            HttpGenerator::new(config.endpoint.clone(), config.request_timeout)
                .context("Failed to create generation client")?,
        )
    };

    let (notifier, sink_events) = sink::channel();
    let sink = TimedSink::with_words_per_minute(notifier, config.words_per_minute);

    let (controller, control_task) =
        SessionController::spawn(config.controller_config(), generator, sink, sink_events);
    let events = controller.subscribe();

    let mut request = StartRequest::new(args.name, args.context);
    request.persona = args.persona;
    request.details = args.details;
    controller
        .start(request)
        .await
        .context("Failed to start session")?;

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = report_events(events, args.max_segments, args.json_events) => {
            info!("Segment limit reached, shutting down");
        }
    }

    controller.shutdown().await?;
    control_task.await.context("Control task failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Log (or print) session events until `max_segments` have finished
///
/// Never returns without a limit.
async fn report_events(
    mut events: tokio::sync::broadcast::Receiver<SessionEvent>,
    max_segments: Option<u64>,
    json_events: bool,
) {
    let mut finished: u64 = 0;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event reporter lagged, {} events skipped", skipped);
                continue;
            }
            Err(RecvError::Closed) => {
                std::future::pending::<()>().await;
                return;
            }
        };

        if json_events {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        }

        match &event {
            SessionEvent::SegmentStarted {
                sequence_index,
                script_text,
                ..
            } if !json_events => {
                println!("[{}] {}", sequence_index + 1, script_text);
            }
            SessionEvent::GenerationFailed { message, .. } if !json_events => {
                eprintln!("Generation failed: {}", message);
            }
            SessionEvent::SegmentFinished { .. } => {
                finished += 1;
                if max_segments.is_some_and(|max| finished >= max) {
                    return;
                }
            }
            _ => {}
        }
    }
}

/// `RUST_LOG` when set, otherwise `level` for the manifesto crates
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| log_directives(level).into())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
