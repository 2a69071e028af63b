// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Object-storage change notification envelope.
//!
//! Notifications arrive as CloudEvents 0.1 style JSON documents. Only the
//! event type and the object identity are interpreted; everything else is
//! carried for logging. Unknown fields are ignored, absent or `null` fields
//! default, and carried fields accept any JSON scalar.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A decoded change notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangeEvent {
    /// CloudEvents version.
    #[serde(deserialize_with = "lenient_string")]
    pub cloud_events_version: String,
    /// Event identifier assigned by the emitting service.
    #[serde(rename = "eventID", deserialize_with = "lenient_string")]
    pub event_id: String,
    /// Event type, e.g. `com.oraclecloud.objectstorage.createobject`.
    #[serde(deserialize_with = "null_default")]
    pub event_type: String,
    /// Emitting service.
    #[serde(deserialize_with = "lenient_string")]
    pub source: String,
    /// Version of the event type schema.
    #[serde(deserialize_with = "lenient_string")]
    pub event_type_version: String,
    /// When the change happened, if the emitter sent a valid RFC 3339 time.
    #[serde(deserialize_with = "lenient_time")]
    pub event_time: Option<DateTime<Utc>>,
    /// Schema reference. Never interpreted.
    #[serde(rename = "schemaURL", deserialize_with = "opaque_string")]
    pub schema_url: Option<String>,
    /// Content type of `data`.
    #[serde(deserialize_with = "lenient_string")]
    pub content_type: String,
    /// CloudEvents extensions.
    #[serde(deserialize_with = "null_default")]
    pub extensions: EventExtensions,
    /// Resource payload.
    #[serde(deserialize_with = "null_default")]
    pub data: EventData,
}

/// CloudEvents extension attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventExtensions {
    /// Compartment the event was emitted in.
    #[serde(deserialize_with = "lenient_string")]
    pub compartment_id: String,
}

/// Resource payload of a change notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventData {
    /// Compartment holding the bucket.
    #[serde(deserialize_with = "lenient_string")]
    pub compartment_id: String,
    /// Human-readable compartment name.
    #[serde(deserialize_with = "lenient_string")]
    pub compartment_name: String,
    /// Object name.
    #[serde(deserialize_with = "null_default")]
    pub resource_name: String,
    /// Object resource identifier.
    #[serde(deserialize_with = "lenient_string")]
    pub resource_id: String,
    /// Availability domain of the source bucket.
    #[serde(deserialize_with = "lenient_string")]
    pub availability_domain: String,
    /// Object-storage namespace, for emitters that place it at the top level.
    #[serde(deserialize_with = "null_default")]
    pub namespace: String,
    /// Free-form tags on the bucket.
    #[serde(deserialize_with = "null_default")]
    pub free_form_tags: HashMap<String, Value>,
    /// Defined tags on the bucket, keyed by tag namespace.
    #[serde(deserialize_with = "null_default")]
    pub defined_tags: HashMap<String, Value>,
    /// Object-storage specific details.
    #[serde(deserialize_with = "null_default")]
    pub additional_details: AdditionalDetails,
}

/// Object-storage specific details of a change notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdditionalDetails {
    /// Object-storage namespace.
    #[serde(deserialize_with = "null_default")]
    pub namespace: String,
    /// Bucket the object lives in.
    #[serde(deserialize_with = "lenient_string")]
    pub bucket_name: String,
    /// Public access type of the bucket.
    #[serde(deserialize_with = "lenient_string")]
    pub public_access_type: String,
    /// Entity tag of the object.
    #[serde(rename = "eTag", deserialize_with = "lenient_string")]
    pub etag: String,
}

impl ChangeEvent {
    /// Decode a change notification from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedEvent`] if the payload is not a JSON object
    /// of the expected shape.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The object-storage namespace of the affected object.
    ///
    /// Prefers `data.additionalDetails.namespace` and falls back to `data.namespace`.
    pub fn namespace(&self) -> &str {
        if self.data.additional_details.namespace.is_empty() {
            &self.data.namespace
        } else {
            &self.data.additional_details.namespace
        }
    }

    /// The name of the affected object.
    pub fn object_name(&self) -> &str {
        &self.data.resource_name
    }
}

/// Treat `null` like an absent field.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept any JSON value, keeping strings verbatim and rendering anything else as JSON text.
fn opaque_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Like [`opaque_string`], with `null` as the empty string.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opaque_string(deserializer)?.unwrap_or_default())
}

/// An RFC 3339 timestamp, or `None` for anything else.
fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => {
            DateTime::parse_from_rfc3339(&s).ok().map(|time| time.with_timezone(&Utc))
        }
        _ => None,
    })
}
