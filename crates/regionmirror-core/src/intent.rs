// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Translation of change notifications into replication intents.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use crate::topology::ENV_BUCKET_NAME;

/// Event type emitted when an object is created.
pub const EVENT_TYPE_CREATE: &str = "com.oraclecloud.objectstorage.createobject";

/// Event type emitted when an object is overwritten.
pub const EVENT_TYPE_UPDATE: &str = "com.oraclecloud.objectstorage.updateobject";

/// Event type emitted when an object is deleted.
pub const EVENT_TYPE_DELETE: &str = "com.oraclecloud.objectstorage.deleteobject";

/// The replication action an event calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// A new object; replicated by copy.
    Create,
    /// An overwritten object; replicated by copy.
    Update,
    /// A removed object; replicated by delete.
    Delete,
}

impl ActionKind {
    /// Map an event type to an action, by exact match.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            EVENT_TYPE_CREATE => Some(Self::Create),
            EVENT_TYPE_UPDATE => Some(Self::Update),
            EVENT_TYPE_DELETE => Some(Self::Delete),
            _ => None,
        }
    }

    /// Returns true if this action is replicated by copying the object.
    #[inline]
    pub fn is_copy(&self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }

    /// Returns the name of this action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What replication a single change event requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Object-storage namespace.
    pub namespace: String,
    /// Bucket the object lives in.
    pub bucket: String,
    /// Object name, identical in every region.
    pub object_name: String,
    /// The action to replicate.
    pub action_kind: ActionKind,
}

/// Result of translating a change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// The event requires replication.
    Replicate(Intent),
    /// The event type requires no action.
    NoOp {
        /// The unrecognized event type.
        event_type: String,
    },
}

impl Translation {
    /// Returns the intent, if any.
    pub fn intent(&self) -> Option<&Intent> {
        match self {
            Self::Replicate(intent) => Some(intent),
            Self::NoOp { .. } => None,
        }
    }
}

/// Translate a change event into a replication intent for `bucket`.
///
/// Unknown event types yield [`Translation::NoOp`] without inspecting the
/// rest of the event.
///
/// # Errors
///
/// Returns [`Error::MalformedEvent`] if the object name or namespace is empty.
pub fn translate(event: &ChangeEvent, bucket: &str) -> Result<Translation> {
    let Some(action_kind) = ActionKind::from_event_type(&event.event_type) else {
        debug!(event_type = %event.event_type, event_id = %event.event_id, "Unsupported event type");
        return Ok(Translation::NoOp { event_type: event.event_type.clone() });
    };

    let object_name = event.object_name();
    if object_name.is_empty() {
        return Err(Error::malformed_event("data.resourceName is missing or empty"));
    }

    let namespace = event.namespace();
    if namespace.is_empty() {
        return Err(Error::malformed_event("namespace is missing or empty"));
    }

    if bucket.trim().is_empty() {
        return Err(Error::MissingConfig { key: ENV_BUCKET_NAME });
    }

    Ok(Translation::Replicate(Intent {
        namespace: namespace.to_string(),
        bucket: bucket.to_string(),
        object_name: object_name.to_string(),
        action_kind,
    }))
}
