// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Error types for dispatch and invocation handling.

use regionmirror_core::{ActionKind, RegionId};
use thiserror::Error;

/// Result type for storage gateway calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Errors returned by a storage gateway for a single call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The storage service rejected the request.
    #[error("storage service error in {region}: {message}")]
    Service {
        /// The region that served the request.
        region: RegionId,
        /// The service's error message.
        message: String,
    },

    /// The request could not be delivered.
    #[error("transport error to {region}: {message}")]
    Transport {
        /// The region the request was addressed to.
        region: RegionId,
        /// The reason for failure.
        message: String,
    },

    /// The invocation was cancelled before the call completed.
    #[error("operation in {region} cancelled")]
    Cancelled {
        /// The region whose call was abandoned.
        region: RegionId,
    },

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Create a service error.
    pub fn service(region: impl Into<RegionId>, message: impl Into<String>) -> Self {
        Self::Service { region: region.into(), message: message.into() }
    }

    /// Create a transport error.
    pub fn transport(region: impl Into<RegionId>, message: impl Into<String>) -> Self {
        Self::Transport { region: region.into(), message: message.into() }
    }

    /// Returns true if the call was abandoned due to cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// A single destination's replication failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{action} of {object} in {region} failed: {source}")]
pub struct DestinationError {
    /// The destination region.
    pub region: RegionId,
    /// The action being replicated.
    pub action: ActionKind,
    /// The object being replicated.
    pub object: String,
    /// The underlying gateway error.
    pub source: GatewayError,
}

/// Aggregate failure of a dispatch run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// One or more destinations failed. All destinations were still attempted.
    #[error("replication failed for {} of {attempted} destinations: {}", .regions.len(), join(.regions))]
    DestinationsFailed {
        /// Every region whose operation failed, in topology order.
        regions: Vec<RegionId>,
        /// Number of destinations attempted.
        attempted: usize,
    },
}

fn join(regions: &[RegionId]) -> String {
    regions.iter().map(RegionId::as_str).collect::<Vec<_>>().join(", ")
}

/// Errors surfaced to the invoking runtime.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Event decoding, translation or topology resolution failed.
    #[error(transparent)]
    Core(#[from] regionmirror_core::Error),

    /// At least one destination failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Reading the event or writing the response failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    /// Returns true if the invocation environment is misconfigured.
    ///
    /// Redelivering the same event cannot succeed until configuration changes.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Core(err) if err.is_config_error())
    }
}
