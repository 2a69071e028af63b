// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Error types for event translation and topology resolution.

use thiserror::Error;

/// A specialized `Result` type for regionmirror core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur before any storage operation is attempted.
///
/// None of these are retried locally. They are surfaced to the invoking
/// runtime, which owns redelivery.
#[derive(Debug, Error)]
pub enum Error {
    /// The change event is missing a required identity field, or could not be decoded.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// A required configuration key is absent or empty.
    #[error("missing configuration: {key} is not set")]
    MissingConfig {
        /// The configuration key that was missing.
        key: &'static str,
    },

    /// A configuration value is present but cannot be used.
    #[error("malformed configuration {key}: {reason}")]
    MalformedConfig {
        /// The offending configuration key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The optional settings file could not be parsed.
    #[error("settings error: {0}")]
    Settings(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed event error.
    pub fn malformed_event(message: impl Into<String>) -> Self {
        Self::MalformedEvent(message.into())
    }

    /// Create a malformed configuration error.
    pub fn malformed_config(key: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedConfig { key, reason: reason.into() }
    }

    /// Returns true if this error comes from the invocation environment
    /// rather than the event payload.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::MissingConfig { .. } | Self::MalformedConfig { .. } | Self::Settings(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedEvent(err.to_string())
    }
}
