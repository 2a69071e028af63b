// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Invocation handler: one event in, one completion marker out.

use regionmirror_core::{
    resolve, translate, ChangeEvent, ConfigSource, EnvSource, Topology, Translation,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, info_span, Instrument};

use super::cancel::Cancellation;
use super::dispatcher::{Dispatcher, RunResult};
use super::error::HandlerError;

/// Written to the output stream when an invocation succeeds.
pub const COMPLETION_MARKER: &[u8] = b"Done!";

/// What an invocation did.
#[derive(Debug, Clone)]
pub enum Invocation {
    /// The object was replicated to every destination.
    Replicated(RunResult),
    /// The event type requires no replication.
    Skipped {
        /// The unrecognized event type.
        event_type: String,
    },
}

/// Handles change events using a configuration source and a dispatcher.
pub struct Handler<S = EnvSource> {
    dispatcher: Dispatcher,
    source: S,
}

impl Handler<EnvSource> {
    /// Create a handler that reads its topology from the process environment.
    pub fn from_env(dispatcher: Dispatcher) -> Self {
        Self::new(dispatcher, EnvSource)
    }
}

impl<S: ConfigSource> Handler<S> {
    /// Create a handler.
    pub fn new(dispatcher: Dispatcher, source: S) -> Self {
        Self { dispatcher, source }
    }

    /// Process one raw event payload.
    ///
    /// The topology is resolved before any storage call, so configuration
    /// errors have no side effects.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is malformed, the configuration is
    /// incomplete, or any destination failed.
    pub async fn invoke(&self, payload: &[u8], cancel: &Cancellation) -> Result<Invocation, HandlerError> {
        let event = ChangeEvent::from_slice(payload)?;
        let topology = resolve(&self.source)?;

        let span = info_span!(
            "invocation",
            event_id = %event.event_id,
            event_type = %event.event_type,
            source_region = %topology.source_region,
        );

        self.replicate(&event, &topology, cancel).instrument(span).await
    }

    async fn replicate(
        &self,
        event: &ChangeEvent,
        topology: &Topology,
        cancel: &Cancellation,
    ) -> Result<Invocation, HandlerError> {
        let intent = match translate(event, &topology.bucket_name)? {
            Translation::Replicate(intent) => intent,
            Translation::NoOp { event_type } => {
                debug!(event_type = %event_type, "No replication required");
                return Ok(Invocation::Skipped { event_type });
            }
        };

        info!(
            action = %intent.action_kind,
            namespace = %intent.namespace,
            bucket = %intent.bucket,
            object = %intent.object_name,
            destinations = topology.destination_regions.len(),
            mode = %self.dispatcher.mode(),
            "Replicating object"
        );

        let result = self.dispatcher.dispatch(&intent, topology, cancel).await;
        match result.error() {
            Some(err) => Err(err.into()),
            None => Ok(Invocation::Replicated(result)),
        }
    }

    /// Read one event from `input`, process it, and write the completion
    /// marker to `output` on success.
    ///
    /// On failure nothing is written; the error is logged and returned so the
    /// invoking runtime can decide whether to redeliver.
    ///
    /// # Errors
    ///
    /// See [`Handler::invoke`].
    pub async fn handle<R, W>(
        &self,
        mut input: R,
        mut output: W,
        cancel: &Cancellation,
    ) -> Result<Invocation, HandlerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut payload = Vec::new();
        input.read_to_end(&mut payload).await?;

        match self.invoke(&payload, cancel).await {
            Ok(invocation) => {
                output.write_all(COMPLETION_MARKER).await?;
                output.flush().await?;
                Ok(invocation)
            }
            Err(err) => {
                error!(error = %err, config_error = err.is_config_error(), "Invocation failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use regionmirror_core::intent::{EVENT_TYPE_CREATE, EVENT_TYPE_DELETE};
    use regionmirror_core::topology::{ENV_BUCKET_NAME, ENV_DESTINATION_REGIONS, ENV_SOURCE_REGION};
    use regionmirror_core::{DispatchConfig, MapSource};

    use super::*;
    use crate::error::{DispatchError, GatewayError, GatewayResult};
    use crate::gateway::{CopyRequest, DeleteRequest, StorageGateway};

    /// Counts calls and fails in one region.
    #[derive(Default)]
    struct CountingGateway {
        copies: AtomicUsize,
        deletes: AtomicUsize,
        fail_region: Option<&'static str>,
    }

    impl CountingGateway {
        fn total(&self) -> usize {
            self.copies.load(Ordering::SeqCst) + self.deletes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StorageGateway for CountingGateway {
        async fn copy_object(&self, request: &CopyRequest, _cancel: &Cancellation) -> GatewayResult<()> {
            self.copies.fetch_add(1, Ordering::SeqCst);
            match self.fail_region {
                Some(region) if request.destination_region.as_str() == region => {
                    Err(GatewayError::service(region, "mock failure"))
                }
                _ => Ok(()),
            }
        }

        async fn delete_object(&self, _request: &DeleteRequest, _cancel: &Cancellation) -> GatewayResult<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> MapSource {
        MapSource::new()
            .with(ENV_BUCKET_NAME, "mirror")
            .with(ENV_SOURCE_REGION, "ap-tokyo-1")
            .with(ENV_DESTINATION_REGIONS, "us-1,eu-1")
    }

    fn handler(gateway: Arc<CountingGateway>, source: MapSource) -> Handler<MapSource> {
        Handler::new(Dispatcher::new(gateway, DispatchConfig::default()), source)
    }

    fn payload(event_type: &str) -> Vec<u8> {
        serde_json::json!({
            "eventType": event_type,
            "eventID": "evt-1",
            "data": {
                "compartmentId": "ocid1.compartment.oc1..aaa",
                "resourceName": "a.txt",
                "additionalDetails": { "namespace": "acme" }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_create_writes_marker() {
        let gateway = Arc::new(CountingGateway::default());
        let mut output = Vec::new();

        let invocation = handler(gateway.clone(), config())
            .handle(payload(EVENT_TYPE_CREATE).as_slice(), &mut output, &Cancellation::never())
            .await
            .unwrap();

        assert_eq!(output, COMPLETION_MARKER);
        assert_eq!(gateway.copies.load(Ordering::SeqCst), 2);
        let Invocation::Replicated(result) = invocation else { panic!("Expected replication") };
        assert!(result.is_success());
        assert_eq!(result.intent.object_name, "a.txt");
    }

    #[tokio::test]
    async fn test_delete_event() {
        let gateway = Arc::new(CountingGateway::default());
        handler(gateway.clone(), config()).invoke(&payload(EVENT_TYPE_DELETE), &Cancellation::never()).await.unwrap();
        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 2);
        assert_eq!(gateway.copies.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_event_is_skipped() {
        let gateway = Arc::new(CountingGateway::default());
        let mut output = Vec::new();

        let invocation = handler(gateway.clone(), config())
            .handle(payload("com.oraclecloud.objectstorage.createbucket").as_slice(), &mut output, &Cancellation::never())
            .await
            .unwrap();

        assert!(matches!(invocation, Invocation::Skipped { .. }));
        assert_eq!(output, COMPLETION_MARKER);
        assert_eq!(gateway.total(), 0);
    }

    #[tokio::test]
    async fn test_missing_config_has_no_side_effects() {
        let gateway = Arc::new(CountingGateway::default());
        let source = MapSource::new().with(ENV_BUCKET_NAME, "mirror").with(ENV_SOURCE_REGION, "ap-tokyo-1");
        let mut output = Vec::new();

        let err = handler(gateway.clone(), source)
            .handle(payload(EVENT_TYPE_CREATE).as_slice(), &mut output, &Cancellation::never())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HandlerError::Core(regionmirror_core::Error::MissingConfig { key: ENV_DESTINATION_REGIONS })
        ));
        assert!(err.is_config_error());
        assert!(output.is_empty());
        assert_eq!(gateway.total(), 0);
    }

    #[tokio::test]
    async fn test_partial_failure_writes_nothing() {
        let gateway = Arc::new(CountingGateway { fail_region: Some("eu-1"), ..Default::default() });
        let mut output = Vec::new();

        let err = handler(gateway.clone(), config())
            .handle(payload(EVENT_TYPE_CREATE).as_slice(), &mut output, &Cancellation::never())
            .await
            .unwrap_err();

        assert!(output.is_empty());
        assert!(!err.is_config_error());
        assert_eq!(gateway.copies.load(Ordering::SeqCst), 2);
        match err {
            HandlerError::Dispatch(DispatchError::DestinationsFailed { regions, .. }) => {
                assert_eq!(regions.len(), 1);
                assert_eq!(regions[0].as_str(), "eu-1");
            }
            other => panic!("Expected dispatch failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_event() {
        let gateway = Arc::new(CountingGateway::default());
        let payload = serde_json::json!({ "eventType": EVENT_TYPE_CREATE, "data": {} }).to_string();

        let err = handler(gateway.clone(), config())
            .invoke(payload.as_bytes(), &Cancellation::never())
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Core(regionmirror_core::Error::MalformedEvent(_))));
        assert_eq!(gateway.total(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_payload() {
        let gateway = Arc::new(CountingGateway::default());
        let err = handler(gateway, config()).invoke(b"\x00garbage", &Cancellation::never()).await.unwrap_err();
        assert!(matches!(err, HandlerError::Core(regionmirror_core::Error::MalformedEvent(_))));
    }
}
