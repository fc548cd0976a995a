//! Typed error hierarchy for revhook.
//!
//! `RevhookError` covers the five failure classes of a run:
//! - `Configuration` — unknown task kind, missing template, missing model or credentials
//! - `Input` — no file content and no readable path
//! - `Timeout` — a chat request exceeded its upper bound
//! - `Cancelled` — a chat request was cancelled by its caller
//! - `Remote` — any other transport or API failure
//!
//! Prompt building errors surface before any network traffic. The remaining
//! variants abort only the unit being processed; see [`crate::runner`].

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RevhookError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Transport and API failures from the chat backends.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Stream ended before any reply was received")]
    EmptyReply,
}

impl RevhookError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }
}

pub type Result<T, E = RevhookError> = std::result::Result<T, E>;
