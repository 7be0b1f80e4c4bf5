//! Error types for manifesto-player
//!
//! Errors returned across the controller API. External boundaries
//! (generation service, playback sink) have their own error enums; those
//! failures are reported as session events and never reach a caller.

use thiserror::Error;

/// Main error type for manifesto-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors bubbled up from the common crate
    #[error(transparent)]
    Common(#[from] manifesto_common::Error),

    /// Missing required user input; nothing was mutated
    #[error("Invalid start request: {0}")]
    InvalidStartRequest(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The control task is no longer running
    #[error("Session controller is not running")]
    ControllerClosed,
}

/// Convenience Result type using manifesto-player Error
pub type Result<T> = std::result::Result<T, Error>;
