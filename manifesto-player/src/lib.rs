//! # Manifesto Player Library (manifesto-player)
//!
//! Gapless infinite playback scheduler for generated speech.
//!
//! **Purpose:** Turn a slow, fallible, single-flight generation service into
//! one continuous stream of short audio segments. Segments are requested
//! just-in-time when the queue drains to a low watermark, preloaded into a
//! two-slot buffer, and handed off on completion without a gap.
//!
//! **Architecture:** one control task owns every piece of mutable state
//! (queue, both slots, history, in-flight flag, session state). Generation
//! calls run as independent tokio tasks and report back over a channel;
//! playback sinks report completion over another. Stale results are
//! discarded by comparing session epochs.

pub mod config;
pub mod controller;
pub mod error;
pub mod generation;
pub mod playback;
pub mod session;
pub mod sink;

pub use controller::SessionController;
pub use error::{Error, Result};
pub use session::{SessionParams, StartRequest};
