//! # Manifesto Common Library
//!
//! Shared code for the manifesto workspace including:
//! - Session event types (`SessionEvent` enum) and the `EventBus`
//! - Session state and snapshot projections handed to presentation layers
//! - Configuration file discovery and TOML loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, SessionEvent, SessionState};
