// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Storage gateway abstraction.
//!
//! The gateway is the only component with side effects. Every call names its
//! target region explicitly, so one gateway can serve all destinations of an
//! invocation, concurrently if needed.

use async_trait::async_trait;
use regionmirror_core::{Intent, RegionId};
use tracing::info;

use super::cancel::Cancellation;
use super::error::GatewayResult;

/// Copy an object from the source region into a destination region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CopyRequest {
    /// Region holding the source object.
    pub source_region: RegionId,
    /// Region receiving the copy.
    pub destination_region: RegionId,
    /// Object-storage namespace, the same in both regions.
    pub namespace: String,
    /// Bucket name, the same in both regions.
    pub bucket: String,
    /// Name of the object in the source region.
    pub source_object: String,
    /// Name of the copy.
    pub destination_object: String,
}

impl CopyRequest {
    /// Build a same-name copy of the intent's object into `destination`.
    pub fn same_name(intent: &Intent, source: &RegionId, destination: &RegionId) -> Self {
        Self {
            source_region: source.clone(),
            destination_region: destination.clone(),
            namespace: intent.namespace.clone(),
            bucket: intent.bucket.clone(),
            source_object: intent.object_name.clone(),
            destination_object: intent.object_name.clone(),
        }
    }
}

/// Delete an object from one region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteRequest {
    /// Region to delete from.
    pub region: RegionId,
    /// Object-storage namespace.
    pub namespace: String,
    /// Bucket name.
    pub bucket: String,
    /// Object name.
    pub object: String,
}

impl DeleteRequest {
    /// Build a delete of the intent's object in `region`.
    pub fn for_intent(intent: &Intent, region: &RegionId) -> Self {
        Self {
            region: region.clone(),
            namespace: intent.namespace.clone(),
            bucket: intent.bucket.clone(),
            object: intent.object_name.clone(),
        }
    }
}

/// Object-storage operations addressed to an explicit region.
///
/// Implementations should stop work once `cancel` fires. The dispatcher
/// abandons a call on cancellation regardless.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Copy an object across regions.
    async fn copy_object(&self, request: &CopyRequest, cancel: &Cancellation) -> GatewayResult<()>;

    /// Delete an object in one region.
    async fn delete_object(&self, request: &DeleteRequest, cancel: &Cancellation) -> GatewayResult<()>;
}

/// A gateway that logs requests and performs nothing. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpGateway;

#[async_trait]
impl StorageGateway for NoOpGateway {
    async fn copy_object(&self, request: &CopyRequest, _cancel: &Cancellation) -> GatewayResult<()> {
        info!(
            source_region = %request.source_region,
            destination_region = %request.destination_region,
            namespace = %request.namespace,
            bucket = %request.bucket,
            object = %request.source_object,
            "Dry run: skipping copy"
        );
        Ok(())
    }

    async fn delete_object(&self, request: &DeleteRequest, _cancel: &Cancellation) -> GatewayResult<()> {
        info!(
            region = %request.region,
            namespace = %request.namespace,
            bucket = %request.bucket,
            object = %request.object,
            "Dry run: skipping delete"
        );
        Ok(())
    }
}
