// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Multi-destination dispatch of a replication intent.
//!
//! One dispatch runs once per event:
//!
//! ```text
//! Idle ──▶ Routing ──▶ Executing ──▶ Completed
//!            │             │
//!            │             └─ one gateway call per destination, in
//!            │                topology order; failures never stop
//!            │                later destinations
//!            └─ Create/Update ─▶ copy plan
//!               Delete        ─▶ delete plan
//! ```
//!
//! Every destination is attempted exactly once and gets exactly one
//! [`DispatchOutcome`]. The run as a whole fails if any destination failed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use regionmirror_core::{ActionKind, DispatchConfig, DispatchMode, Intent, RegionId, Topology};
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::cancel::Cancellation;
use super::error::{DestinationError, DispatchError, GatewayError};
use super::gateway::{CopyRequest, DeleteRequest, StorageGateway};

/// A storage operation addressed to one destination region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Copy the object into the destination.
    Copy(CopyRequest),
    /// Delete the object from the destination.
    Delete(DeleteRequest),
}

impl Operation {
    /// The destination region this operation targets.
    pub fn region(&self) -> &RegionId {
        match self {
            Self::Copy(request) => &request.destination_region,
            Self::Delete(request) => &request.region,
        }
    }
}

/// Route an intent to one operation per destination region, in topology order.
pub fn plan(intent: &Intent, topology: &Topology) -> Vec<Operation> {
    topology
        .destination_regions
        .iter()
        .map(|destination| {
            if intent.action_kind.is_copy() {
                Operation::Copy(CopyRequest::same_name(intent, &topology.source_region, destination))
            } else {
                Operation::Delete(DeleteRequest::for_intent(intent, destination))
            }
        })
        .collect()
}

/// Result of replicating to one destination region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// The destination region.
    pub region: RegionId,
    /// Whether the operation succeeded.
    pub success: bool,
    /// The failure, if any.
    pub error: Option<DestinationError>,
}

impl DispatchOutcome {
    /// A successful outcome.
    pub fn succeeded(region: RegionId) -> Self {
        Self { region, success: true, error: None }
    }

    /// A failed outcome, attributed to the error's region.
    pub fn failed(error: DestinationError) -> Self {
        Self { region: error.region.clone(), success: false, error: Some(error) }
    }
}

/// Result of one dispatch run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Identifier used to correlate log lines of this run.
    pub run_id: Uuid,
    /// The replicated intent.
    pub intent: Intent,
    /// One outcome per destination, in topology order.
    pub outcomes: Vec<DispatchOutcome>,
    /// When dispatch started.
    pub started_at: DateTime<Utc>,
    /// When the last destination finished.
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// Returns true if every destination succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.success)
    }

    /// Failures in topology order.
    pub fn failures(&self) -> impl Iterator<Item = &DestinationError> {
        self.outcomes.iter().filter_map(|outcome| outcome.error.as_ref())
    }

    /// Regions whose operation failed, in topology order.
    pub fn failed_regions(&self) -> Vec<RegionId> {
        self.outcomes.iter().filter(|o| !o.success).map(|o| o.region.clone()).collect()
    }

    /// The aggregate error naming every failed region, if any destination failed.
    pub fn error(&self) -> Option<DispatchError> {
        let regions = self.failed_regions();
        if regions.is_empty() {
            None
        } else {
            Some(DispatchError::DestinationsFailed { regions, attempted: self.outcomes.len() })
        }
    }

    /// Convert into `Ok(self)` if every destination succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DestinationsFailed`] otherwise.
    pub fn into_result(self) -> Result<Self, DispatchError> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Wall-clock time the run took.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Executes replication intents against every destination region.
pub struct Dispatcher {
    gateway: Arc<dyn StorageGateway>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Creates a new dispatcher.
    pub fn new(gateway: Arc<dyn StorageGateway>, config: DispatchConfig) -> Self {
        Self { gateway, config }
    }

    /// Returns the configured fan-out mode.
    pub fn mode(&self) -> DispatchMode {
        self.config.mode
    }

    /// Replicate `intent` to every destination in `topology`.
    ///
    /// Never short-circuits: a failed or cancelled destination is recorded and
    /// the remaining destinations are still attempted.
    pub async fn dispatch(&self, intent: &Intent, topology: &Topology, cancel: &Cancellation) -> RunResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let operations = plan(intent, topology);

        debug!(
            run_id = %run_id,
            action = %intent.action_kind,
            object = %intent.object_name,
            destinations = operations.len(),
            mode = %self.config.mode,
            "Dispatching replication"
        );

        let outcomes = match self.config.mode {
            DispatchMode::Sequential => self.run_sequential(intent, &operations, cancel).await,
            DispatchMode::Concurrent => self.run_concurrent(intent, operations, cancel).await,
        };

        let result = RunResult { run_id, intent: intent.clone(), outcomes, started_at, finished_at: Utc::now() };

        if result.is_success() {
            info!(
                run_id = %run_id,
                action = %intent.action_kind,
                object = %intent.object_name,
                destinations = result.outcomes.len(),
                elapsed_ms = result.elapsed().num_milliseconds(),
                "Replication completed"
            );
        } else {
            warn!(
                run_id = %run_id,
                action = %intent.action_kind,
                object = %intent.object_name,
                failed = ?result.failed_regions(),
                destinations = result.outcomes.len(),
                "Replication incomplete"
            );
        }

        result
    }

    async fn run_sequential(
        &self,
        intent: &Intent,
        operations: &[Operation],
        cancel: &Cancellation,
    ) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::with_capacity(operations.len());
        for operation in operations {
            outcomes.push(
                execute(self.gateway.as_ref(), intent.action_kind, &intent.object_name, operation, cancel).await,
            );
        }
        outcomes
    }

    async fn run_concurrent(
        &self,
        intent: &Intent,
        operations: Vec<Operation>,
        cancel: &Cancellation,
    ) -> Vec<DispatchOutcome> {
        let regions: Vec<RegionId> = operations.iter().map(|op| op.region().clone()).collect();

        let handles: Vec<_> = operations
            .into_iter()
            .map(|operation| {
                let gateway = Arc::clone(&self.gateway);
                let cancel = cancel.clone();
                let action = intent.action_kind;
                let object = intent.object_name.clone();
                let task = async move {
                    execute(gateway.as_ref(), action, &object, &operation, &cancel).await
                };
                // Tasks keep the invocation's span and its scoped subscriber.
                tokio::spawn(task.in_current_span().with_current_subscriber())
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(regions)
            .map(|(joined, region)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(region = %region, error = %e, "Destination task panicked");
                    DispatchOutcome::failed(DestinationError {
                        region,
                        action: intent.action_kind,
                        object: intent.object_name.clone(),
                        source: GatewayError::Internal(format!("destination task failed: {e}")),
                    })
                }
            })
            .collect()
    }
}

/// Run one operation, racing it against cancellation.
async fn execute(
    gateway: &dyn StorageGateway,
    action: ActionKind,
    object: &str,
    operation: &Operation,
    cancel: &Cancellation,
) -> DispatchOutcome {
    let region = operation.region().clone();

    let result = if cancel.is_cancelled() {
        Err(GatewayError::Cancelled { region: region.clone() })
    } else {
        let call = async {
            match operation {
                Operation::Copy(request) => gateway.copy_object(request, cancel).await,
                Operation::Delete(request) => gateway.delete_object(request, cancel).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled { region: region.clone() }),
            result = call => result,
        }
    };

    match result {
        Ok(()) => {
            debug!(region = %region, action = %action, object = %object, "Destination replicated");
            DispatchOutcome::succeeded(region)
        }
        Err(source) => {
            warn!(region = %region, action = %action, object = %object, error = %source, "Destination failed");
            DispatchOutcome::failed(DestinationError { region, action, object: object.to_string(), source })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::error::GatewayResult;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Copy(CopyRequest),
        Delete(DeleteRequest),
    }

    /// Mock gateway for testing.
    #[derive(Default)]
    struct MockGateway {
        calls: Mutex<Vec<Call>>,
        call_count: AtomicUsize,
        failing: HashSet<String>,
        panicking: HashSet<String>,
        delay_ms: Option<u64>,
    }

    impl MockGateway {
        fn failing(regions: &[&str]) -> Self {
            Self { failing: regions.iter().map(|r| r.to_string()).collect(), ..Default::default() }
        }

        async fn respond(&self, region: &RegionId, call: Call) -> GatewayResult<()> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().await.push(call);

            if let Some(delay) = self.delay_ms {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.panicking.contains(region.as_str()) {
                panic!("mock panic in {region}");
            }
            if self.failing.contains(region.as_str()) {
                return Err(GatewayError::service(region.clone(), "mock failure"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StorageGateway for MockGateway {
        async fn copy_object(&self, request: &CopyRequest, _cancel: &Cancellation) -> GatewayResult<()> {
            self.respond(&request.destination_region, Call::Copy(request.clone())).await
        }

        async fn delete_object(&self, request: &DeleteRequest, _cancel: &Cancellation) -> GatewayResult<()> {
            self.respond(&request.region, Call::Delete(request.clone())).await
        }
    }

    fn intent(action_kind: ActionKind) -> Intent {
        Intent {
            namespace: "acme".to_string(),
            bucket: "mirror".to_string(),
            object_name: "photos/cat.png".to_string(),
            action_kind,
        }
    }

    fn topology(destinations: &[&str]) -> Topology {
        Topology {
            source_region: RegionId::from("ap-tokyo-1"),
            destination_regions: destinations.iter().map(|d| RegionId::from(*d)).collect(),
            bucket_name: "mirror".to_string(),
        }
    }

    fn dispatcher(gateway: Arc<MockGateway>, mode: DispatchMode) -> Dispatcher {
        Dispatcher::new(gateway, DispatchConfig::new().mode(mode))
    }

    #[test]
    fn test_plan_copy() {
        let ops = plan(&intent(ActionKind::Update), &topology(&["us-1", "eu-1"]));
        assert_eq!(ops.len(), 2);
        for (op, region) in ops.iter().zip(["us-1", "eu-1"]) {
            match op {
                Operation::Copy(request) => {
                    assert_eq!(request.destination_region.as_str(), region);
                    assert_eq!(request.source_region.as_str(), "ap-tokyo-1");
                    assert_eq!(request.destination_object, request.source_object);
                }
                Operation::Delete(_) => panic!("Expected copy operation"),
            }
        }
    }

    #[test]
    fn test_plan_delete() {
        let ops = plan(&intent(ActionKind::Delete), &topology(&["us-1", "eu-1"]));
        assert!(ops.iter().all(|op| matches!(op, Operation::Delete(_))));
        assert_eq!(ops[1].region().as_str(), "eu-1");
    }

    #[tokio::test]
    async fn test_copy_to_every_destination() {
        let gateway = Arc::new(MockGateway::default());
        let result = dispatcher(gateway.clone(), DispatchMode::Sequential)
            .dispatch(&intent(ActionKind::Create), &topology(&["us-1", "eu-1", "ap-1"]), &Cancellation::never())
            .await;

        assert!(result.is_success());
        assert!(result.error().is_none());
        assert_eq!(result.outcomes.len(), 3);

        let calls = gateway.calls.lock().await;
        assert_eq!(calls.len(), 3);
        for (call, region) in calls.iter().zip(["us-1", "eu-1", "ap-1"]) {
            let Call::Copy(request) = call else { panic!("Expected copy call") };
            assert_eq!(request.destination_region.as_str(), region);
            assert_eq!(request.destination_object, "photos/cat.png");
            assert_eq!(request.source_object, "photos/cat.png");
        }
    }

    #[tokio::test]
    async fn test_delete_in_every_destination() {
        let gateway = Arc::new(MockGateway::default());
        let result = dispatcher(gateway.clone(), DispatchMode::Sequential)
            .dispatch(&intent(ActionKind::Delete), &topology(&["us-1", "eu-1"]), &Cancellation::never())
            .await;

        assert!(result.is_success());
        let calls = gateway.calls.lock().await;
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| matches!(c, Call::Delete(r) if r.object == "photos/cat.png")));
    }

    #[tokio::test]
    async fn test_partial_failure_attempts_all() {
        for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let gateway = Arc::new(MockGateway::failing(&["us-1"]));
            let result = dispatcher(gateway.clone(), mode)
                .dispatch(&intent(ActionKind::Create), &topology(&["us-1", "eu-1"]), &Cancellation::never())
                .await;

            // First destination failed, second still attempted
            assert_eq!(gateway.call_count.load(Ordering::SeqCst), 2);
            assert!(!result.is_success());
            assert!(!result.outcomes[0].success);
            assert!(result.outcomes[1].success);
            assert_eq!(result.failed_regions(), vec![RegionId::from("us-1")]);

            let failure = result.failures().next().unwrap();
            assert_eq!(failure.region.as_str(), "us-1");
            assert_eq!(failure.action, ActionKind::Create);
            assert!(matches!(failure.source, GatewayError::Service { .. }));
        }
    }

    #[tokio::test]
    async fn test_aggregate_error_names_failed_regions() {
        let gateway = Arc::new(MockGateway::failing(&["eu-1", "ap-1"]));
        let result = dispatcher(gateway, DispatchMode::Sequential)
            .dispatch(&intent(ActionKind::Update), &topology(&["us-1", "eu-1", "ap-1"]), &Cancellation::never())
            .await;

        match result.into_result() {
            Err(DispatchError::DestinationsFailed { regions, attempted }) => {
                assert_eq!(regions, vec![RegionId::from("eu-1"), RegionId::from("ap-1")]);
                assert_eq!(attempted, 3);
            }
            Ok(_) => panic!("Expected DestinationsFailed"),
        }
    }

    #[test]
    fn test_mode_reflects_config() {
        let gateway = Arc::new(MockGateway::default());
        assert_eq!(dispatcher(gateway.clone(), DispatchMode::Sequential).mode(), DispatchMode::Sequential);
        assert_eq!(dispatcher(gateway, DispatchMode::Concurrent).mode(), DispatchMode::Concurrent);
    }

    #[tokio::test]
    async fn test_concurrent_preserves_topology_order() {
        let gateway = Arc::new(MockGateway { delay_ms: Some(10), ..MockGateway::failing(&["eu-1"]) });
        let result = dispatcher(gateway.clone(), DispatchMode::Concurrent)
            .dispatch(&intent(ActionKind::Create), &topology(&["us-1", "eu-1", "ap-1"]), &Cancellation::never())
            .await;

        let regions: Vec<_> = result.outcomes.iter().map(|o| o.region.as_str()).collect();
        assert_eq!(regions, vec!["us-1", "eu-1", "ap-1"]);
        assert_eq!(result.outcomes.iter().filter(|o| o.success).count(), 2);
        assert_eq!(result.failed_regions(), vec![RegionId::from("eu-1")]);
    }

    #[tokio::test]
    async fn test_concurrent_panic_is_attributed() {
        let gateway = Arc::new(MockGateway {
            panicking: ["eu-1".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let result = dispatcher(gateway, DispatchMode::Concurrent)
            .dispatch(&intent(ActionKind::Delete), &topology(&["us-1", "eu-1"]), &Cancellation::never())
            .await;

        assert!(result.outcomes[0].success);
        assert!(!result.outcomes[1].success);
        let error = result.outcomes[1].error.as_ref().unwrap();
        assert_eq!(error.region.as_str(), "eu-1");
        assert!(matches!(error.source, GatewayError::Internal(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (handle, cancel) = Cancellation::new();
        handle.cancel();

        let gateway = Arc::new(MockGateway::default());
        let result = dispatcher(gateway.clone(), DispatchMode::Sequential)
            .dispatch(&intent(ActionKind::Create), &topology(&["us-1", "eu-1"]), &cancel)
            .await;

        // Nothing issued, but every destination reported
        assert_eq!(gateway.call_count.load(Ordering::SeqCst), 0);
        assert_eq!(result.outcomes.len(), 2);
        assert!(result.failures().all(|f| f.source.is_cancelled()));
    }

    #[tokio::test]
    async fn test_cancelled_in_flight() {
        for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let (handle, cancel) = Cancellation::new();
            let gateway = Arc::new(MockGateway { delay_ms: Some(5_000), ..Default::default() });
            let dispatcher = dispatcher(gateway.clone(), mode);

            let canceller = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                handle.cancel();
            });

            let result = tokio::time::timeout(
                Duration::from_secs(2),
                dispatcher.dispatch(&intent(ActionKind::Create), &topology(&["us-1", "eu-1"]), &cancel),
            )
            .await
            .expect("dispatch should abort promptly on cancellation");
            canceller.await.unwrap();

            assert_eq!(result.outcomes.len(), 2);
            assert!(result.outcomes.iter().all(|o| !o.success));
            assert!(result.failures().all(|f| f.source.is_cancelled()));
        }
    }

    #[tokio::test]
    async fn test_replay_is_identical() {
        let gateway = Arc::new(MockGateway::default());
        let dispatcher = dispatcher(gateway.clone(), DispatchMode::Sequential);
        let topology = topology(&["us-1", "eu-1"]);

        dispatcher.dispatch(&intent(ActionKind::Update), &topology, &Cancellation::never()).await;
        dispatcher.dispatch(&intent(ActionKind::Update), &topology, &Cancellation::never()).await;

        let calls = gateway.calls.lock().await;
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[..2], calls[2..]);
    }

    #[tokio::test]
    async fn test_duplicate_destinations_attempted_twice() {
        let gateway = Arc::new(MockGateway::default());
        let result = dispatcher(gateway.clone(), DispatchMode::Sequential)
            .dispatch(&intent(ActionKind::Create), &topology(&["us-1", "us-1"]), &Cancellation::never())
            .await;

        assert!(result.is_success());
        assert_eq!(gateway.call_count.load(Ordering::SeqCst), 2);
    }
}
